//! Harness registry -- the available backend adapters keyed by CLI choice.

use std::collections::HashMap;

use super::claude_code::ClaudeCodeAdapter;
use super::copilot::CopilotAdapter;
use super::gemini::GeminiAdapter;
use super::trait_def::Harness;
use super::types::CliKind;

/// Executable name or path per backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendBinaries {
    pub claude: String,
    pub copilot: String,
    pub gemini: String,
}

impl Default for BackendBinaries {
    fn default() -> Self {
        Self {
            claude: "claude".to_string(),
            copilot: "copilot".to_string(),
            gemini: "gemini".to_string(),
        }
    }
}

/// A collection of registered [`Harness`] implementations, keyed by
/// [`CliKind`].
///
/// # Example
///
/// ```ignore
/// let registry = HarnessRegistry::with_defaults(&BackendBinaries::default());
/// let harness = registry.get(CliKind::Claude).unwrap();
/// ```
#[derive(Default)]
pub struct HarnessRegistry {
    harnesses: HashMap<CliKind, Box<dyn Harness>>,
}

impl HarnessRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding one adapter per known backend.
    pub fn with_defaults(binaries: &BackendBinaries) -> Self {
        let mut registry = Self::new();
        registry.register(ClaudeCodeAdapter::with_binary(&binaries.claude));
        registry.register(CopilotAdapter::with_binary(&binaries.copilot));
        registry.register(GeminiAdapter::with_binary(&binaries.gemini));
        registry
    }

    /// Register a harness adapter under [`Harness::kind`].
    ///
    /// An adapter already registered for the same kind is replaced and
    /// returned.
    pub fn register(&mut self, harness: impl Harness + 'static) -> Option<Box<dyn Harness>> {
        self.harnesses.insert(harness.kind(), Box::new(harness))
    }

    pub fn get(&self, kind: CliKind) -> Option<&dyn Harness> {
        self.harnesses.get(&kind).map(|b| b.as_ref())
    }

    /// Registered kinds, in declaration order.
    pub fn list(&self) -> Vec<CliKind> {
        CliKind::ALL
            .into_iter()
            .filter(|k| self.harnesses.contains_key(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.harnesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harnesses.is_empty()
    }
}

impl std::fmt::Debug for HarnessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessRegistry")
            .field("harnesses", &self.list())
            .finish()
    }
}
