//! examforge-store — Durable session stores.
//!
//! Two [`SessionStore`] implementations: a JSON-file store with one file
//! per session signature, and an in-memory store for tests and ephemeral
//! runs. A corrupt file is reported as [`StoreError::Corrupt`] so the
//! session layer can clear it and start fresh instead of crashing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use examforge_core::error::StoreError;
use examforge_core::model::SessionSignature;
use examforge_core::session::SessionRecord;
use examforge_core::traits::SessionStore;

/// One JSON file per signature under a root directory.
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSessionStore { root: root.into() }
    }

    fn path_for(&self, signature: &SessionSignature) -> PathBuf {
        self.root.join(format!("{}.json", signature.slug()))
    }
}

impl SessionStore for FileSessionStore {
    fn load(
        &self,
        signature: &SessionSignature,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(signature);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => Err(StoreError::Corrupt {
                key: signature.slug(),
                message: e.to_string(),
            }),
        }
    }

    fn save(
        &self,
        signature: &SessionSignature,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(signature);
        let json = serde_json::to_string_pretty(record).map_err(|e| StoreError::Corrupt {
            key: signature.slug(),
            message: e.to_string(),
        })?;
        // Write via a sibling temp file and rename, so a crash mid-write
        // never leaves a truncated record behind.
        let tmp = tmp_path(&path);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self, signature: &SessionSignature) -> Result<(), StoreError> {
        let path = self.path_for(signature);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(
        &self,
        signature: &SessionSignature,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| poisoned(signature))?
            .get(&signature.slug())
            .cloned())
    }

    fn save(
        &self,
        signature: &SessionSignature,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| poisoned(signature))?
            .insert(signature.slug(), record.clone());
        Ok(())
    }

    fn clear(&self, signature: &SessionSignature) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| poisoned(signature))?
            .remove(&signature.slug());
        Ok(())
    }
}

fn poisoned(signature: &SessionSignature) -> StoreError {
    StoreError::Corrupt {
        key: signature.slug(),
        message: "store lock poisoned".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examforge_core::answers::AnswerSheet;
    use examforge_core::timer::SessionTimer;

    fn sig() -> SessionSignature {
        SessionSignature::new("Entomology", 1800)
    }

    fn record(signature: &SessionSignature) -> SessionRecord {
        SessionRecord {
            id: uuid::Uuid::new_v4(),
            signature: signature.clone(),
            questions: vec![],
            sheet: AnswerSheet::new(),
            timer: SessionTimer::new(signature.time_limit_secs),
            generation: 0,
            submitted: false,
            grades: None,
            contested: vec![],
            saved_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let signature = sig();

        assert!(store.load(&signature).unwrap().is_none());

        let original = record(&signature);
        store.save(&signature, &original).unwrap();
        let loaded = store.load(&signature).unwrap().unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.signature, signature);

        store.clear(&signature).unwrap();
        assert!(store.load(&signature).unwrap().is_none());
    }

    #[test]
    fn file_store_keys_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let signature = sig();
        store.save(&signature, &record(&signature)).unwrap();

        assert!(dir.path().join("entomology-1800s.json").exists());

        // A different time limit is a different key.
        let other = SessionSignature::new("Entomology", 900);
        assert!(store.load(&other).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let signature = sig();

        std::fs::write(dir.path().join("entomology-1800s.json"), "{not json").unwrap();
        let err = store.load(&signature).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // Clear recovers.
        store.clear(&signature).unwrap();
        assert!(store.load(&signature).unwrap().is_none());
    }

    #[test]
    fn clear_of_missing_record_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.clear(&sig()).unwrap();
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let signature = sig();

        store.save(&signature, &record(&signature)).unwrap();
        assert!(store.load(&signature).unwrap().is_some());
        store.clear(&signature).unwrap();
        assert!(store.load(&signature).unwrap().is_none());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let signature = sig();

        let first = record(&signature);
        store.save(&signature, &first).unwrap();

        let mut second = record(&signature);
        second.generation = 3;
        store.save(&signature, &second).unwrap();

        let loaded = store.load(&signature).unwrap().unwrap();
        assert_eq!(loaded.generation, 3);
        assert_eq!(loaded.id, second.id);
    }
}
