// Persisted file shapes

use crate::pattern::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 2;

/// Text encoding of a persisted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Json,
    Ron,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Ron => "ron",
        }
    }

    /// Format implied by a path's extension (`.ron` or anything else for JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => FileFormat::Ron,
            _ => FileFormat::Json,
        }
    }
}

/// Versioned session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: AppState,
}

impl SessionFile {
    /// Wrap a state in the current format, stamped now
    pub fn new(state: AppState) -> Self {
        Self {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }
}

/// A named pattern snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub state: AppState,
}

impl Preset {
    pub fn new(name: impl Into<String>, state: AppState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

/// The user preset library file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetFile {
    pub version: u32,
    pub presets: Vec<Preset>,
}
