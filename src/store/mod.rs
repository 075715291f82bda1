use crate::model::melody::{Melody, NewMelody};
use anyhow::bail;

mod json;
#[cfg(test)]
pub(crate) mod memory;

pub use json::JsonMelodyStore;

/// Where finished recordings are kept.
pub trait MelodyStore {
    fn save(&self, melody: NewMelody) -> anyhow::Result<Melody>;

    fn get(&self, id: u64) -> anyhow::Result<Option<Melody>>;

    /// Melodies owned by `owner_id`, newest first.
    fn list(&self, owner_id: &str) -> anyhow::Result<Vec<Melody>>;

    /// Every public melody, newest first.
    fn list_public(&self) -> anyhow::Result<Vec<Melody>>;

    /// Delete a melody. Only its owner may do so.
    fn delete(&self, id: u64, owner_id: &str) -> anyhow::Result<()>;
}

/// Checks every store applies before accepting a melody.
pub fn validate(melody: &NewMelody) -> anyhow::Result<()> {
    if melody.name.trim().is_empty() {
        bail!("Please enter a name for your melody");
    }

    if melody.user_id.is_empty() {
        bail!("A melody needs an owner..!");
    }

    Ok(())
}

pub(crate) fn newest_first(melodies: &mut [Melody]) {
    melodies.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::melody::NoteEvent;

    fn new_melody(name: &str, user_id: &str) -> NewMelody {
        NewMelody {
            name: name.into(),
            notes: vec![NoteEvent::new("C4", 0)],
            is_public: true,
            user_id: user_id.into(),
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate(&new_melody("Tune", "u")).is_ok());
        assert!(validate(&new_melody("", "u")).is_err());
        assert!(validate(&new_melody("   ", "u")).is_err());
        assert!(validate(&new_melody("Tune", "")).is_err());
    }
}
