use crate::model::note::{NoteName, PitchClass};
use anyhow::bail;
use log::{debug, error, info, warn};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

mod log_engine;
#[cfg(feature = "audio")]
mod synth;

#[cfg(test)]
pub(crate) mod capture;

pub use log_engine::LogEngine;
#[cfg(feature = "audio")]
pub use synth::SynthEngine;

/// An eighth note at 120 BPM.
pub const DEFAULT_NOTE_MS: u64 = 250;

pub trait SoundEngine: Send + Sync {
    /// One-time setup of whatever actually produces sound.
    fn start(&self) -> anyhow::Result<()>;

    /// Sound `note` now and release it after `duration`. Must not block for `duration`.
    fn trigger_attack_release(&self, note: &NoteName, duration: Duration) -> anyhow::Result<()>;
}

/// Owns the sound engine and refuses to play until it has been initialized.
///
/// Shared between live input and replay so both sound through the same path.
#[derive(Debug)]
pub struct AudioTrigger<E: SoundEngine> {
    engine: E,
    ready: AtomicBool,
    init_lock: Mutex<()>,
    note_duration: Duration,
}

impl<E: SoundEngine> AudioTrigger<E> {
    pub fn new(engine: E, note_duration: Duration) -> Self {
        Self {
            engine,
            ready: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            note_duration,
        }
    }

    /// Start the engine. Calling this again once ready does nothing.
    pub fn initialize(&self) -> anyhow::Result<()> {
        let Ok(_guard) = self.init_lock.lock() else {
            bail!("Failed to lock audio init..!")
        };

        if self.ready.load(Ordering::Acquire) {
            debug!("Audio already initialized..!");
            return Ok(());
        }

        self.engine.start()?;
        self.ready.store(true, Ordering::Release);
        info!("Audio initialized..!");

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn note_duration(&self) -> Duration {
        self.note_duration
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Sound a note and return its label (e.g. `"C#4"`), or `None` if nothing sounded.
    pub fn play(&self, pitch: PitchClass, octave: u8, duration: Option<Duration>) -> Option<String> {
        if !self.is_ready() {
            error!("Synth not initialized..!");
            return None;
        }

        let note = NoteName::new(pitch, octave);
        let duration = duration.unwrap_or(self.note_duration);

        if let Err(why) = self.engine.trigger_attack_release(&note, duration) {
            warn!("Failed to trigger {} | why: {:?}", note, why);
            return None;
        }

        Some(note.to_string())
    }
}
