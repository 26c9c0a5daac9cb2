use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_GENERATOR: &str = concat!("meta4-core/", env!("CARGO_PKG_VERSION"));

/// Output settings for [`crate::Document::render`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    /// Written to the `generator` element.
    pub generator: String,
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { generator: DEFAULT_GENERATOR.to_string(), indent: 2 }
    }
}

impl RenderConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
