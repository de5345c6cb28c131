//! Testing utilities, fixtures, and scripted LLM clients for pilot.
//!
//! - **Fixtures**: temporary project directories with a given file layout
//! - **Providers**: LLM clients that replay scripted answers and record calls
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use pilot_test_utils::{fixtures::TestProject, providers::ScriptedClient};
//!
//! #[tokio::test]
//! async fn test_workspace_scan() {
//!     let project = TestProject::new()
//!         .with_file("src/main.py", "print('hi')")
//!         .build();
//!
//!     let client = ScriptedClient::new().with_response("START");
//!     // Use project.path() and client in the test...
//! }
//! ```

pub mod fixtures;
pub mod providers;

// Re-export commonly used items
pub use fixtures::{BuiltTestProject, TestProject};
pub use providers::{ScriptedClient, ScriptedResponse};
