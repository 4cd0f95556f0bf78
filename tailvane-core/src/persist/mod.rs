//! Atomic JSON persistence of all zone state.
//!
//! Saves write the full snapshot to `<database>~` and rename it over the
//! database file, so a failed save never corrupts the previous state.

use crate::zone::ZoneData;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// The persisted state format: `{"zones": {<zone>: {public, private, windows}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub zones: BTreeMap<String, ZoneData>,
}

fn temp_path(database: &Path) -> PathBuf {
    let mut name = OsString::from(database.as_os_str());
    name.push("~");
    PathBuf::from(name)
}

/// Write the snapshot atomically. Any error leaves the previous database
/// file intact.
pub fn save_snapshot(database: &Path, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("failed to encode state")?;
    let temp = temp_path(database);
    fs::write(&temp, json)
        .with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, database)
        .with_context(|| format!("failed to rename {} into place", temp.display()))?;
    Ok(())
}

/// Load the snapshot, if the database file exists. A file that exists but
/// does not decode is an error; the caller treats it as fatal.
pub fn load_snapshot(database: &Path) -> Result<Option<Snapshot>> {
    let raw = match fs::read_to_string(database) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", database.display()))
        }
    };
    let snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to decode {}", database.display()))?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Counters;
    use pretty_assertions::assert_eq;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut data = ZoneData::default();
        data.public.insert("http_request".into(), 200.0);
        data.private
            .insert("note".into(), serde_json::json!({"last": "x"}));
        let mut window = Counters::new();
        window.insert("http_request".into(), 12.0);
        data.windows = vec![Counters::new(), window];
        snapshot.zones.insert("a".into(), data);
        snapshot
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("state.json");
        let snapshot = sample_snapshot();

        save_snapshot(&database, &snapshot).unwrap();
        let loaded = load_snapshot(&database).unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        // Byte-equal on re-save: the encoding is deterministic.
        let first = std::fs::read(&database).unwrap();
        save_snapshot(&database, &loaded).unwrap();
        let second = std::fs::read(&database).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_database_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("state.json");
        std::fs::write(&database, "{ not json").unwrap();
        assert!(load_snapshot(&database).is_err());
    }

    #[test]
    fn failed_save_leaves_previous_state_readable() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("state.json");
        let snapshot = sample_snapshot();
        save_snapshot(&database, &snapshot).unwrap();

        // Make the temp file unwritable by pointing the database inside a
        // directory that no longer exists.
        let gone = dir.path().join("missing-dir").join("state.json");
        assert!(save_snapshot(&gone, &Snapshot::default()).is_err());

        let loaded = load_snapshot(&database).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn no_temp_file_left_behind_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("state.json");
        save_snapshot(&database, &sample_snapshot()).unwrap();
        assert!(!temp_path(&database).exists());
    }
}
