//! Replay scripts: the model turns a replayed run will return, in order.
//!
//! ```toml
//! responses = [
//!     "<tool>add</tool> <args>{'a': 2, 'b': 3}</args>",
//!     "End: 5",
//! ]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    pub responses: Vec<String>,
}

/// Script loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to read script at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse script at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Script at {path} has no responses")]
    Empty { path: PathBuf },
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScriptError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let script: Self = toml::from_str(&content).map_err(|e| ScriptError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if script.responses.is_empty() {
            return Err(ScriptError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(script)
    }
}
