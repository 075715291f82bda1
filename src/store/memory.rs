use crate::model::melody::{Melody, NewMelody};
use crate::store::{MelodyStore, newest_first, validate};
use anyhow::{Result, bail};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory store that counts saves and can be told to fail the next one.
#[derive(Debug, Default)]
pub struct MemoryMelodyStore {
    melodies: Mutex<Vec<Melody>>,
    save_calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MemoryMelodyStore {
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_save(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl MelodyStore for MemoryMelodyStore {
    fn save(&self, melody: NewMelody) -> Result<Melody> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("Network error..!");
        }
        validate(&melody)?;

        let Ok(mut melodies) = self.melodies.lock() else {
            bail!("Failed to lock melodies..!")
        };

        let id = melodies.len() as u64 + 1;
        let stored = Melody {
            id,
            name: melody.name,
            notes: melody.notes,
            is_public: melody.is_public,
            user_id: melody.user_id,
            created_at: id,
            updated_at: id,
        };
        melodies.push(stored.clone());

        Ok(stored)
    }

    fn get(&self, id: u64) -> Result<Option<Melody>> {
        let Ok(melodies) = self.melodies.lock() else {
            bail!("Failed to lock melodies..!")
        };
        Ok(melodies.iter().find(|m| m.id == id).cloned())
    }

    fn list(&self, owner_id: &str) -> Result<Vec<Melody>> {
        let Ok(melodies) = self.melodies.lock() else {
            bail!("Failed to lock melodies..!")
        };
        let mut mine: Vec<Melody> = melodies.iter().filter(|m| m.user_id == owner_id).cloned().collect();
        newest_first(&mut mine);
        Ok(mine)
    }

    fn list_public(&self) -> Result<Vec<Melody>> {
        let Ok(melodies) = self.melodies.lock() else {
            bail!("Failed to lock melodies..!")
        };
        let mut public: Vec<Melody> = melodies.iter().filter(|m| m.is_public).cloned().collect();
        newest_first(&mut public);
        Ok(public)
    }

    fn delete(&self, id: u64, owner_id: &str) -> Result<()> {
        let Ok(mut melodies) = self.melodies.lock() else {
            bail!("Failed to lock melodies..!")
        };
        let Some(idx) = melodies.iter().position(|m| m.id == id && m.user_id == owner_id) else {
            bail!("No melody {} for {}..!", id, owner_id);
        };
        melodies.remove(idx);
        Ok(())
    }
}
