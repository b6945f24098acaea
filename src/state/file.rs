//! JSON file backend for alert state

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{AlertState, StateError, StateStore};

/// Stores the alert state as a single JSON object on disk.
///
/// Saves go to a sibling temporary file which is synced and then renamed
/// over the target, so a crash mid-write leaves either the previous or the
/// new content in place.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> AlertState {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No alert state file, starting empty");
                return AlertState::new();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read alert state file, starting empty"
                );
                return AlertState::new();
            }
        };

        match serde_json::from_slice::<AlertState>(&data) {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    signals = state.len(),
                    "Loaded alert state"
                );
                state
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Alert state file is corrupt, starting empty"
                );
                AlertState::new()
            }
        }
    }

    fn save(&self, state: &AlertState) -> Result<(), StateError> {
        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;

        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &self.path)?;

        tracing::debug!(path = %self.path.display(), signals = state.len(), "Saved alert state");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        for content in ["{not json", "[1, 2, 3]", "{\"temp\": \"last tuesday\"}", ""] {
            fs::write(&path, content).unwrap();
            let store = JsonFileStore::new(&path);
            assert!(store.load().is_empty(), "content {content:?} should load as empty");
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);

        let mut state = AlertState::new();
        state.record("temp", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        state.record("humidity", Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
        store.save(&state).unwrap();

        let reloaded = JsonFileStore::new(&path).load();
        assert_eq!(reloaded, state);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_overwrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);

        let mut state = AlertState::new();
        state.record("a", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        store.save(&state).unwrap();

        let mut other = AlertState::new();
        other.record("b", Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());
        store.save(&other).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded, other);
        assert_eq!(reloaded.last_notified("a"), None);
    }

    #[test]
    fn test_concurrent_saves_leave_one_whole_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = Arc::new(JsonFileStore::new(&path));

        let states: Vec<AlertState> = (0..8)
            .map(|i| {
                let mut state = AlertState::new();
                for j in 0..=i {
                    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, i as u32, j as u32).unwrap();
                    state.record(format!("signal-{}", j), t);
                }
                state
            })
            .collect();

        let handles: Vec<_> = states
            .iter()
            .cloned()
            .map(|state| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        store.save(&state).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = store.load();
        assert!(states.contains(&reloaded), "loaded state is not one of the saved states");
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.json");
        let store = JsonFileStore::new(&path);

        store.save(&AlertState::new()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reads_legacy_offset_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"value": "2024-05-01T12:00:00.250000+00:00"}"#).unwrap();

        let state = JsonFileStore::new(&path).load();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(state.last_notified("value"), Some(expected));
    }
}
