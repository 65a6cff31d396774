use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::domain::types::{BotState, PersistenceError};

/// On-disk store for the reconciliation record. Reads are tolerant: a missing
/// or unreadable record seeds a fresh state from the configured start height.
/// Writes go through a temp file in the same directory and a rename, so a
/// crash mid-save leaves the previous record intact.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
    start_height: u64,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, start_height: u64) -> Self {
        Self {
            path: path.into(),
            start_height,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BotState {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return BotState::seeded(self.start_height);
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "state_record_unreadable");
                return BotState::seeded(self.start_height);
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(state) => state,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "state_record_corrupt");
                BotState::seeded(self.start_height)
            }
        }
    }

    pub fn save(&self, state: &BotState) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_vec_pretty(state)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).map_err(|source| PersistenceError::Io {
            path: temp_path.display().to_string(),
            source,
        })?;
        file.write_all(&encoded)
            .and_then(|()| file.sync_all())
            .map_err(|source| PersistenceError::Io {
                path: temp_path.display().to_string(),
                source,
            })?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|source| PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_record_seeds_from_start_height() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = StateStore::new(dir.path().join("state.json"), 777);

        let state = store.load();
        assert_eq!(state, BotState::seeded(777));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = StateStore::new(dir.path().join("state.json"), 0);

        let state = BotState {
            cursor_height: 130,
            sequence_number: 9,
        };
        store.save(&state).expect("save should succeed");
        assert_eq!(store.load(), state);
    }

    #[test]
    fn corrupt_record_falls_back_to_seed_without_failing() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ not json").expect("fixture write should succeed");

        let store = StateStore::new(&path, 55);
        assert_eq!(store.load(), BotState::seeded(55));
    }

    #[test]
    fn save_replaces_record_without_leaving_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path, 0);

        store
            .save(&BotState::seeded(1))
            .expect("first save should succeed");
        store
            .save(&BotState {
                cursor_height: 2,
                sequence_number: 1,
            })
            .expect("overwrite should succeed");

        assert_eq!(store.load().cursor_height, 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_into_missing_directory_reports_persistence_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = StateStore::new(dir.path().join("missing").join("state.json"), 0);

        let error = store
            .save(&BotState::seeded(0))
            .expect_err("save into a missing directory should fail");
        assert!(matches!(error, PersistenceError::Io { .. }));
    }
}
