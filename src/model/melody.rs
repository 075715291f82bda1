use serde::{Deserialize, Serialize};

/// One note played during a recording, `time` ms after recording started.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NoteEvent {
    pub key: String,
    pub time: u64,
}

impl NoteEvent {
    pub fn new(key: impl Into<String>, time: u64) -> Self {
        Self {
            key: key.into(),
            time,
        }
    }
}

/// The signed-in user on whose behalf melodies are saved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// A melody as handed to the store before it has an id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewMelody {
    pub name: String,
    pub notes: Vec<NoteEvent>,
    pub is_public: bool,
    pub user_id: String,
}

/// A stored melody record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Melody {
    pub id: u64,
    pub name: String,
    pub notes: Vec<NoteEvent>,
    pub is_public: bool,
    pub user_id: String,
    /// Unix milliseconds
    pub created_at: u64,
    pub updated_at: u64,
}

impl Melody {
    pub fn visibility(&self) -> &'static str {
        if self.is_public { "Public" } else { "Private" }
    }
}
