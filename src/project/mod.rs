// Project persistence - Session files, legacy migration and presets

pub mod migration;
pub mod persistence;
pub mod presets;
pub mod types;

pub use migration::{MigrationResult, read_session};
pub use persistence::{
    FilePersistence, MemoryPersistence, Persistence, default_session_path, encode_session,
};
pub use presets::{PresetLibrary, builtin_preset, builtin_preset_names, builtin_presets};
pub use types::{FORMAT_VERSION, FileFormat, Preset, SessionFile};

/// Persistence error types
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("file format v{0} is newer than this build supports")]
    UnsupportedVersion(u32),

    #[error("stored state is invalid: {0}")]
    InvalidState(String),

    #[error("invalid preset name '{0}'")]
    InvalidName(String),

    #[error("no data directory on this platform")]
    NoDataDir,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
