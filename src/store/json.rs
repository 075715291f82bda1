use crate::model::melody::{Melody, NewMelody};
use crate::store::{MelodyStore, newest_first, validate};
use crate::util::now_unix_ms;
use anyhow::{Result, anyhow, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug)]
struct StoreFile {
    next_id: u64,
    melodies: Vec<Melody>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            melodies: Vec::new(),
        }
    }
}

/// Melodies kept in a single pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonMelodyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMelodyStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        let file = store.load()?;
        info!(
            "Opened melody store {} with {} melodies..!",
            store.path.display(),
            file.melodies.len()
        );

        Ok(store)
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read {}: {}", self.path.display(), e))?;

        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("Corrupt melody store {}: {}", self.path.display(), e))
    }

    /// Write to a sibling temp file first so a failed write never truncates the store.
    fn persist(&self, file: &StoreFile) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(file)?)
            .map_err(|e| anyhow!("Failed to write {}: {}", tmp.display(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| anyhow!("Failed to replace {}: {}", self.path.display(), e))?;

        debug!("Wrote {} melodies to {}", file.melodies.len(), self.path.display());
        Ok(())
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut StoreFile) -> Result<(T, bool)>) -> Result<T> {
        let Ok(_guard) = self.lock.lock() else {
            bail!("Failed to lock the melody store..!");
        };

        let mut file = self.load()?;
        let (out, dirty) = f(&mut file)?;

        if dirty {
            self.persist(&file)?;
        }

        Ok(out)
    }
}

impl MelodyStore for JsonMelodyStore {
    fn save(&self, melody: NewMelody) -> Result<Melody> {
        validate(&melody)?;

        self.with_file(|file| {
            let now = now_unix_ms();
            let stored = Melody {
                id: file.next_id,
                name: melody.name.trim().to_owned(),
                notes: melody.notes,
                is_public: melody.is_public,
                user_id: melody.user_id,
                created_at: now,
                updated_at: now,
            };

            file.next_id += 1;
            file.melodies.push(stored.clone());

            Ok((stored, true))
        })
    }

    fn get(&self, id: u64) -> Result<Option<Melody>> {
        self.with_file(|file| {
            let found = file.melodies.iter().find(|m| m.id == id).cloned();
            Ok((found, false))
        })
    }

    fn list(&self, owner_id: &str) -> Result<Vec<Melody>> {
        self.with_file(|file| {
            let mut mine: Vec<Melody> = file
                .melodies
                .iter()
                .filter(|m| m.user_id == owner_id)
                .cloned()
                .collect();
            newest_first(&mut mine);
            Ok((mine, false))
        })
    }

    fn list_public(&self) -> Result<Vec<Melody>> {
        self.with_file(|file| {
            let mut public: Vec<Melody> = file.melodies.iter().filter(|m| m.is_public).cloned().collect();
            newest_first(&mut public);
            Ok((public, false))
        })
    }

    fn delete(&self, id: u64, owner_id: &str) -> Result<()> {
        self.with_file(|file| {
            let Some(idx) = file.melodies.iter().position(|m| m.id == id) else {
                bail!("No melody with id {}..!", id);
            };

            if file.melodies[idx].user_id != owner_id {
                bail!("Melody {} belongs to someone else..!", id);
            }

            let removed = file.melodies.remove(idx);
            info!("Deleted melody '{}' (#{})..!", removed.name, removed.id);

            Ok(((), true))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::melody::NoteEvent;
    use tempfile::tempdir;

    fn tune(name: &str, user_id: &str, is_public: bool) -> NewMelody {
        NewMelody {
            name: name.into(),
            notes: vec![
                NoteEvent::new("F4", 0),
                NoteEvent::new("A4", 250),
                NoteEvent::new("C5", 500),
            ],
            is_public,
            user_id: user_id.into(),
        }
    }

    #[test]
    fn save_then_reopen() {
        env_logger::try_init().unwrap_or(());

        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("melodies.json");

        let saved = {
            let store = JsonMelodyStore::open(&path).unwrap();
            store.save(tune("Funky Tune", "alice", false)).unwrap()
        };
        assert_eq!(saved.id, 1);
        assert!(path.exists());

        let store = JsonMelodyStore::open(&path).unwrap();
        let loaded = store.get(saved.id).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.notes[1], NoteEvent::new("A4", 250));

        let next = store.save(tune("Second", "alice", true)).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn list_is_scoped_to_owner() {
        let dir = tempdir().unwrap();
        let store = JsonMelodyStore::open(dir.path().join("m.json")).unwrap();

        store.save(tune("a1", "alice", true)).unwrap();
        store.save(tune("b1", "bob", true)).unwrap();
        store.save(tune("a2", "alice", false)).unwrap();

        let names: Vec<String> = store.list("alice").unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a2", "a1"]);
        assert!(store.list("carol").unwrap().is_empty());

        let public: Vec<String> = store.list_public().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(public, vec!["b1", "a1"]);
    }

    #[test]
    fn delete_checks_owner() {
        let dir = tempdir().unwrap();
        let store = JsonMelodyStore::open(dir.path().join("m.json")).unwrap();
        let saved = store.save(tune("mine", "alice", true)).unwrap();

        assert!(store.delete(saved.id, "bob").is_err());
        assert!(store.get(saved.id).unwrap().is_some());

        assert!(store.delete(saved.id, "alice").is_ok());
        assert!(store.get(saved.id).unwrap().is_none());
        assert!(store.delete(saved.id, "alice").is_err());
    }

    #[test]
    fn blank_name_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        let store = JsonMelodyStore::open(&path).unwrap();

        let err = store.save(tune("  ", "alice", true)).unwrap_err();
        assert!(err.to_string().contains("name"));
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, "not json").unwrap();

        assert!(JsonMelodyStore::open(&path).is_err());
    }
}
