//! Evaluator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// Build-time policy for trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Longest root-to-leaf path accepted by the builder.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Default for `guard_entry` on conditional leaves that do not set it.
    pub guard_entry: bool,
}

fn default_max_depth() -> usize {
    64
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            guard_entry: false,
        }
    }
}

impl BehaviorConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}
