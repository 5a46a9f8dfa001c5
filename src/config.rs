//! Runtime configuration.
//!
//! Configuration structs carry sensible defaults and deserialize from JSON
//! with every field optional, so embedding applications can keep them in
//! their own config files.

use serde::{Deserialize, Serialize};

use crate::error::{SwitchError, SwitchResult, ValidationError};

/// Configuration for a [`MatchEngine`](crate::MatchEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name used in log fields and error messages.
    pub name: String,
    /// Permit `evaluate` before `seal`. Results are identical either way.
    pub allow_unsealed_evaluation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "match-engine".to_string(),
            allow_unsealed_evaluation: false,
        }
    }
}

impl EngineConfig {
    /// Creates a default config with the given engine name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Configuration for an [`ObservableCell`](crate::ObservableCell).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Name used in log fields and error messages.
    pub name: String,
    /// Per-subscriber buffer capacity for watch streams.
    pub watch_capacity: usize,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            name: "cell".to_string(),
            watch_capacity: 64,
        }
    }
}

impl CellConfig {
    /// Creates a default config with the given cell name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Parses a config struct from JSON.
///
/// Missing fields take their defaults.
pub fn from_json<C>(json: &str) -> SwitchResult<C>
where
    C: for<'de> Deserialize<'de>,
{
    serde_json::from_str(json).map_err(|e| {
        SwitchError::Validation(ValidationError::InvalidConfig {
            reason: e.to_string(),
        })
    })
}
