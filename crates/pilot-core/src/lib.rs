//! Core coordination for pilot.
//!
//! This crate ties the versioned project state to the outside world:
//! - Configuration loading (multi-source, JSONC support)
//! - The user interface port and its console/headless implementations
//! - LLM reachability probing with request logging
//! - The offline-changes check run at startup

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prober;
pub mod request_log;
pub mod ui;

pub use config::{Config, LlmConfig, WorkspaceConfig};
pub use error::{ConfigError, CoreError, CoreResult};
pub use orchestrator::{OfflineCheck, Orchestrator};
pub use prober::{clients_from_configs, LlmProber, ProbeResult};
pub use request_log::{
    BoxedRequestLogger, LlmRequestLog, RequestLogger, RequestStatus, StorageRequestLogger,
    TracingRequestLogger,
};
pub use ui::{AutoUi, BoxedUi, Button, ConsoleUi, Question, Severity, UiPort, UserInput};
