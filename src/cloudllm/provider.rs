//! Provider identity: which vendor backend an [`crate::cloudllm::Agent`] talks to.

use serde::{Deserialize, Serialize};

/// The vendor wire protocol a [`Provider`] normalizes to/from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
}

/// A named backend credential set. Immutable once constructed; a `Router`
/// holds providers by name and looks one up per-agent via `Agent.provider`.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Provider {
    pub fn new(name: impl Into<String>, kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
