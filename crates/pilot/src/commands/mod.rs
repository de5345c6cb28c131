//! Command handlers for the pilot CLI.

pub mod logging;
pub mod run;
pub mod state;

pub use logging::*;
pub use run::*;
pub use state::*;
