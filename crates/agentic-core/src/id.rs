//! Run identifiers.
//!
//! A run identifier is 8 lowercase hex characters drawn from the OS-seeded
//! thread RNG. Identifiers name the per-run directory under
//! `agentic/runs/`, so [`RunId::generate_unused`] re-draws on the (rare)
//! collision with an existing directory rather than reusing it.

use std::fmt;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind a generated identifier (2 hex chars each).
const RUN_ID_BYTES: usize = 4;

/// Opaque identifier of a single plan/build run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

/// Error returned when a string cannot be used as a run identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid run id {0:?}: expected letters, digits, '-' or '_'")]
pub struct RunIdError(pub String);

impl RunId {
    /// Length of a freshly generated identifier.
    pub const LEN: usize = RUN_ID_BYTES * 2;

    /// Draw a fresh identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; RUN_ID_BYTES];
        rand::rng().fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Draw identifiers until one does not name an existing entry in
    /// `runs_root`.
    pub fn generate_unused(runs_root: &Path) -> Self {
        loop {
            let id = Self::generate();
            if !runs_root.join(id.as_str()).exists() {
                return id;
            }
            tracing::debug!(run_id = %id, "run id already taken, drawing another");
        }
    }

    /// Validate a user-supplied identifier.
    ///
    /// Accepts any non-empty ASCII alphanumeric string (plus `-` and `_`),
    /// so hand-made run directories keep working. Anything that could
    /// escape the runs directory is rejected.
    pub fn parse(input: &str) -> Result<Self, RunIdError> {
        let valid = !input.is_empty()
            && input
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(input.to_owned()))
        } else {
            Err(RunIdError(input.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = RunIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RunId {
    type Err = RunIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
