//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in pilot follow the pattern: `prefix_ulid`, for example
//! `sta_01hqxyz...` for project states. ULIDs are time-ordered, so comparing two
//! identifiers of the same prefix as strings orders them by creation time.

use std::sync::{Mutex, OnceLock};
use ulid::{Generator, Ulid};

/// Shared generator so ids created within the same millisecond still ascend.
static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    /// A committed project state (snapshot).
    State,
    /// A logged LLM request.
    Request,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::State => "sta",
            IdPrefix::Request => "req",
        }
    }
}

/// Identifier generation utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        let ulid = GENERATOR
            .get_or_init(|| Mutex::new(Generator::new()))
            .lock()
            .ok()
            .and_then(|mut generator| generator.generate().ok())
            .unwrap_or_else(Ulid::new);
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Generate a project state ID.
    pub fn state() -> String {
        Self::ascending(IdPrefix::State)
    }

    /// Generate an LLM request log ID.
    pub fn request() -> String {
        Self::ascending(IdPrefix::Request)
    }
}
