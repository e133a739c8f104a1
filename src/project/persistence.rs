// Persistence - Session snapshot storage

use crate::pattern::AppState;
use crate::project::PersistenceError;
use crate::project::migration::read_session;
use crate::project::types::{FileFormat, SessionFile};
use std::fs;
use std::path::{Path, PathBuf};

/// Session snapshot storage
///
/// `load` is called once at session start, `save` after every committed
/// change and at session end.
pub trait Persistence {
    /// The stored state, or `None` when nothing was saved yet
    fn load(&mut self) -> Result<Option<AppState>, PersistenceError>;

    fn save(&mut self, state: &AppState) -> Result<(), PersistenceError>;
}

/// Default session file: `<data dir>/loopstation/session.json`
pub fn default_session_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("loopstation").join("session.json"))
}

/// Serialize a state in the current versioned shape
pub fn encode_session(state: &AppState, format: FileFormat) -> Result<String, PersistenceError> {
    let file = SessionFile::new(state.clone());
    Ok(match format {
        FileFormat::Json => serde_json::to_string_pretty(&file)?,
        FileFormat::Ron => ron::ser::to_string_pretty(&file, ron::ser::PrettyConfig::default())?,
    })
}

/// Write through a sibling temp file so a crash never leaves half a file
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, contents)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// JSON or RON file on disk
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
    format: FileFormat,
}

impl FilePersistence {
    /// Format follows the extension (`.ron`, otherwise JSON)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// File at the default location
    pub fn default_location() -> Result<Self, PersistenceError> {
        default_session_path()
            .map(Self::new)
            .ok_or(PersistenceError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }
}

impl Persistence for FilePersistence {
    fn load(&mut self) -> Result<Option<AppState>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let result = read_session(&text, self.format)?;
        result
            .state
            .check_invariants()
            .map_err(|e| PersistenceError::InvalidState(e.to_string()))?;

        if result.migrated {
            for message in &result.messages {
                log::info!("{}", message);
            }
            // the legacy shape is never kept on disk
            self.save(&result.state)?;
        }
        log::debug!("Loaded session from {}", self.path.display());
        Ok(Some(result.state))
    }

    fn save(&mut self, state: &AppState) -> Result<(), PersistenceError> {
        let text = encode_session(state, self.format)?;
        write_atomically(&self.path, &text)
    }
}

/// In-memory storage, for tests and hosts without a filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    stored: Option<AppState>,
    saves: usize,
    failing: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that starts out holding `state`
    pub fn with_state(state: AppState) -> Self {
        Self {
            stored: Some(state),
            ..Self::default()
        }
    }

    /// Storage whose every call fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<&AppState> {
        self.stored.as_ref()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Persistence for MemoryPersistence {
    fn load(&mut self) -> Result<Option<AppState>, PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable("storage offline".into()));
        }
        Ok(self.stored.clone())
    }

    fn save(&mut self, state: &AppState) -> Result<(), PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable("storage offline".into()));
        }
        self.stored = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let mut storage = MemoryPersistence::new();
        assert_eq!(storage.load().unwrap(), None);

        let mut state = AppState::new();
        state.bpm = 90.0;
        storage.save(&state).unwrap();
        assert_eq!(storage.load().unwrap(), Some(state));
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_failing_storage() {
        let mut storage = MemoryPersistence::failing();
        assert!(storage.load().is_err());
        assert!(storage.save(&AppState::new()).is_err());
    }

    #[test]
    fn test_default_path_is_under_data_dir() {
        if let Some(path) = default_session_path() {
            assert!(path.ends_with("loopstation/session.json"));
        }
    }
}
