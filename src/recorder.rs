//! Capture and replay of timed note sequences.
//!
//! The [`Recorder`] is a small state machine (`Idle`, `Recording`, `Playing`).
//! Calls that the current state doesn't allow are ignored and reported through
//! their return value, never as errors, so a UI can fire them freely. It has one
//! owner; the replay itself is handed off to [`crate::Player`] as a schedule and
//! the owner calls [`Recorder::finish_playback`] once the player reports back.

use crate::model::melody::{Identity, Melody, NewMelody, NoteEvent};
use crate::store::MelodyStore;
use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

/// Source of "now" in milliseconds for recording timestamps.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock counting from its creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Playing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    StateChanged(RecorderState),
    NoteRecorded(NoteEvent),
    Cleared,
    Loaded(usize),
}

/// One step of a replay: wait `wait_ms`, then sound `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNote {
    pub wait_ms: u64,
    pub key: String,
}

/// Turn recorded events into relative waits: `0` before the first note, then the
/// gap since the previous one. Out-of-order times (hand-edited data) wait `0`.
pub fn build_schedule(events: &[NoteEvent]) -> Vec<ScheduledNote> {
    let mut last_time = None;

    events
        .iter()
        .map(|ev| {
            let wait_ms = match last_time {
                None => 0,
                Some(prev) => ev.time.saturating_sub(prev),
            };
            last_time = Some(ev.time);

            ScheduledNote {
                wait_ms,
                key: ev.key.clone(),
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct Recorder<C: Clock = SystemClock> {
    clock: C,
    state: RecorderState,
    origin_ms: Option<u64>,
    events: Vec<NoteEvent>,
    observers: Vec<Sender<RecorderEvent>>,
}

impl Recorder<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for Recorder<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Recorder<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: RecorderState::Idle,
            origin_ms: None,
            events: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state == RecorderState::Playing
    }

    /// The current (or last) recording.
    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn has_recording(&self) -> bool {
        !self.events.is_empty()
    }

    /// Receive every state change and recorded note from now on.
    pub fn subscribe(&mut self) -> Receiver<RecorderEvent> {
        let (tx, rx) = mpsc::channel();
        self.observers.push(tx);
        rx
    }

    fn notify(&mut self, event: RecorderEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_state(&mut self, state: RecorderState) {
        self.state = state;
        self.notify(RecorderEvent::StateChanged(state));
    }

    pub fn start_recording(&mut self) -> bool {
        if self.state != RecorderState::Idle {
            debug!("Ignoring start_recording while {:?}..!", self.state);
            return false;
        }

        self.events.clear();
        self.origin_ms = Some(self.clock.now_ms());
        self.set_state(RecorderState::Recording);
        info!("Recording started..!");

        true
    }

    /// Append a played note, timestamped relative to the start of the recording.
    pub fn record_event(&mut self, key: &str) -> bool {
        let (RecorderState::Recording, Some(origin)) = (self.state, self.origin_ms) else {
            return false;
        };

        let time = self.clock.now_ms().saturating_sub(origin);
        let event = NoteEvent::new(key, time);
        debug!("Recorded {} at {}ms", event.key, event.time);

        self.events.push(event.clone());
        self.notify(RecorderEvent::NoteRecorded(event));

        true
    }

    pub fn stop_recording(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            debug!("Ignoring stop_recording while {:?}..!", self.state);
            return false;
        }

        self.origin_ms = None;
        self.set_state(RecorderState::Idle);
        info!("Recording stopped with {} notes..!", self.events.len());

        true
    }

    /// Enter `Playing` and hand back the replay schedule for the current recording.
    ///
    /// Returns `None` (and stays put) when there is nothing to play or the
    /// recorder is busy. Playback cannot be cancelled once started.
    pub fn play_recording(&mut self) -> Option<Vec<ScheduledNote>> {
        if self.state != RecorderState::Idle {
            debug!("Ignoring play_recording while {:?}..!", self.state);
            return None;
        }

        if self.events.is_empty() {
            debug!("Ignoring play_recording with nothing recorded..!");
            return None;
        }

        let schedule = build_schedule(&self.events);
        self.set_state(RecorderState::Playing);

        Some(schedule)
    }

    /// Called by the owner once the player has triggered the last note.
    pub fn finish_playback(&mut self) -> bool {
        if self.state != RecorderState::Playing {
            return false;
        }

        self.set_state(RecorderState::Idle);
        true
    }

    pub fn clear_recording(&mut self) -> bool {
        if self.state != RecorderState::Idle {
            debug!("Ignoring clear_recording while {:?}..!", self.state);
            return false;
        }

        self.events.clear();
        self.notify(RecorderEvent::Cleared);

        true
    }

    /// Replace the buffer with previously saved notes so they can be replayed.
    pub fn load_notes(&mut self, notes: Vec<NoteEvent>) -> bool {
        if self.state != RecorderState::Idle {
            debug!("Ignoring load_notes while {:?}..!", self.state);
            return false;
        }

        let count = notes.len();
        self.events = notes;
        self.notify(RecorderEvent::Loaded(count));

        true
    }

    /// Persist the current recording for `identity`.
    ///
    /// `Ok(None)` means the save was not allowed (nothing recorded, busy, or
    /// nobody signed in) and the store was not touched. Store errors come back
    /// as `Err`; the recording is never cleared either way.
    pub fn save_recording(
        &self,
        name: &str,
        is_public: bool,
        identity: Option<&Identity>,
        store: &dyn MelodyStore,
    ) -> anyhow::Result<Option<Melody>> {
        if self.state != RecorderState::Idle || self.events.is_empty() {
            debug!(
                "Ignoring save_recording while {:?} with {} notes..!",
                self.state,
                self.events.len()
            );
            return Ok(None);
        }

        let Some(identity) = identity else {
            warn!("Sign in to save melodies..!");
            return Ok(None);
        };

        let melody = store.save(NewMelody {
            name: name.to_owned(),
            notes: self.events.clone(),
            is_public,
            user_id: identity.id.clone(),
        })?;

        info!(
            "Saved melody '{}' ({} notes, {}) as #{}..!",
            melody.name,
            melody.notes.len(),
            melody.visibility(),
            melody.id
        );

        Ok(Some(melody))
    }
}
