use crate::engine::SoundEngine;
use crate::model::note::NoteName;
use log::info;
use std::time::Duration;

/// Headless engine: every triggered note is written to the log.
#[derive(Debug, Clone, Default)]
pub struct LogEngine;

impl SoundEngine for LogEngine {
    fn start(&self) -> anyhow::Result<()> {
        info!("Using the log engine, notes will be printed instead of sounded..!");
        Ok(())
    }

    fn trigger_attack_release(&self, note: &NoteName, duration: Duration) -> anyhow::Result<()> {
        info!(
            "Note {:4} | {:>8.1} Hz | {:>5}ms",
            note.to_string(),
            note.frequency(),
            duration.as_millis()
        );
        Ok(())
    }
}
