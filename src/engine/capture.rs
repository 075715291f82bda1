use crate::engine::SoundEngine;
use crate::model::note::NoteName;
use anyhow::bail;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Remembers every triggered note instead of sounding it.
#[derive(Debug)]
pub struct CaptureEngine {
    fail_start: bool,
    starts: AtomicUsize,
    played: Mutex<Vec<(String, Duration, Instant)>>,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self {
            fail_start: false,
            starts: AtomicUsize::new(0),
            played: Mutex::new(Vec::new()),
        }
    }
}

impl CaptureEngine {
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> Vec<(String, Duration, Instant)> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.played().into_iter().map(|(label, _, _)| label).collect()
    }
}

impl SoundEngine for CaptureEngine {
    fn start(&self) -> anyhow::Result<()> {
        if self.fail_start {
            bail!("No output device..!");
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn trigger_attack_release(&self, note: &NoteName, duration: Duration) -> anyhow::Result<()> {
        let Ok(mut played) = self.played.lock() else {
            bail!("Failed to lock played notes..!")
        };
        played.push((note.to_string(), duration, Instant::now()));
        Ok(())
    }
}
