use crate::engine::{AudioTrigger, SoundEngine};
use crate::model::note::NoteName;
use crate::recorder::ScheduledNote;
use anyhow::bail;
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Progress reports from the playback thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerMsg {
    /// Note `index` of the schedule was just triggered (`None` label if it didn't sound).
    Note { index: usize, label: Option<String> },
    Finished,
}

/// Replays schedules on a worker thread through the shared [`AudioTrigger`].
///
/// A running replay always plays to the end; there is no stop.
#[derive(Debug)]
pub struct Player<E: SoundEngine> {
    verbose: bool,
    trigger: Arc<AudioTrigger<E>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: SoundEngine + 'static> Player<E> {
    pub fn new(trigger: Arc<AudioTrigger<E>>, verbose: bool) -> Self {
        Self {
            verbose,
            trigger,
            worker_handle: Mutex::new(None),
        }
    }

    /// Whether a replay thread is still running.
    pub fn is_busy(&self) -> bool {
        self.worker_handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Start replaying `schedule`. Progress goes to `progress_tx`; with `join` the call
    /// blocks until the last note.
    pub fn play(
        &self,
        schedule: Vec<ScheduledNote>,
        progress_tx: Sender<PlayerMsg>,
        join: bool,
    ) -> anyhow::Result<()> {
        let Ok(mut guard) = self.worker_handle.lock() else {
            bail!("Failed to lock worker handle..!")
        };

        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            bail!("Playback already running..!")
        }

        if let Some(done) = guard.take() {
            let _ = done.join();
        }

        if schedule.is_empty() {
            bail!("Nothing to play..!")
        }

        let trigger = Arc::clone(&self.trigger);
        let verbose = self.verbose;

        let handle = thread::Builder::new()
            .name("ivory-playback".into())
            .spawn(move || run_schedule(&trigger, schedule, &progress_tx, verbose))?;

        if join {
            if handle.join().is_err() {
                bail!("Playback thread panicked..!")
            }
        } else {
            *guard = Some(handle);
        }

        Ok(())
    }
}

fn run_schedule<E: SoundEngine>(
    trigger: &AudioTrigger<E>,
    schedule: Vec<ScheduledNote>,
    progress_tx: &Sender<PlayerMsg>,
    verbose: bool,
) {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let start = Instant::now();
    let total = schedule.len();

    debug!("Playback thread started with {} notes..!", total);

    for (index, note) in schedule.into_iter().enumerate() {
        if note.wait_ms > 0 {
            sleeper.sleep(Duration::from_millis(note.wait_ms));
        }

        let label = match note.key.parse::<NoteName>() {
            Ok(name) => trigger.play(name.pitch, name.octave, None),
            Err(why) => {
                warn!("Skipping unplayable note '{}' | why: {:?}", note.key, why);
                None
            }
        };

        if verbose {
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            info!(
                "{:>4}/{:<4} | {:6} | at {:>10.3}ms | waited {:>6}ms",
                index + 1,
                total,
                note.key,
                elapsed_ms,
                note.wait_ms
            );
        }

        let _ = progress_tx.send(PlayerMsg::Note { index, label });
    }

    let _ = progress_tx.send(PlayerMsg::Finished);
    info!("Playback thread finished all notes..!");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::capture::CaptureEngine;
    use crate::model::melody::NoteEvent;
    use crate::recorder::build_schedule;
    use std::sync::mpsc;

    fn ready_trigger() -> Arc<AudioTrigger<CaptureEngine>> {
        let trigger = AudioTrigger::new(CaptureEngine::default(), Duration::from_millis(20));
        trigger.initialize().unwrap();
        Arc::new(trigger)
    }

    #[test]
    fn replays_in_order_with_gaps() {
        env_logger::try_init().unwrap_or(());

        let trigger = ready_trigger();
        let player = Player::new(Arc::clone(&trigger), true);
        let schedule = build_schedule(&[
            NoteEvent::new("C4", 0),
            NoteEvent::new("E4", 60),
            NoteEvent::new("G4", 120),
        ]);

        let (tx, rx) = mpsc::channel();
        assert!(player.play(schedule, tx, true).is_ok());

        let played = trigger.engine().played();
        let labels: Vec<&str> = played.iter().map(|(l, _, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["C4", "E4", "G4"]);

        let first_gap = played[1].2.duration_since(played[0].2);
        let second_gap = played[2].2.duration_since(played[1].2);
        assert!(first_gap >= Duration::from_millis(55), "{:?}", first_gap);
        assert!(second_gap >= Duration::from_millis(55), "{:?}", second_gap);

        let msgs: Vec<PlayerMsg> = rx.try_iter().collect();
        assert_eq!(msgs.len(), 4);
        assert_eq!(
            msgs[0],
            PlayerMsg::Note {
                index: 0,
                label: Some(String::from("C4"))
            }
        );
        assert_eq!(msgs.last(), Some(&PlayerMsg::Finished));
    }

    #[test]
    fn bad_labels_are_skipped() {
        let trigger = ready_trigger();
        let player = Player::new(Arc::clone(&trigger), false);
        let schedule = build_schedule(&[NoteEvent::new("X9", 0), NoteEvent::new("D#3", 5)]);

        let (tx, rx) = mpsc::channel();
        assert!(player.play(schedule, tx, true).is_ok());

        assert_eq!(trigger.engine().labels(), vec!["D#3"]);
        let msgs: Vec<PlayerMsg> = rx.try_iter().collect();
        assert_eq!(msgs[0], PlayerMsg::Note { index: 0, label: None });
    }

    #[test]
    fn background_replay_reports_finish() {
        let trigger = ready_trigger();
        let player = Player::new(Arc::clone(&trigger), false);
        let schedule = build_schedule(&[NoteEvent::new("A3", 0), NoteEvent::new("B3", 80)]);

        let (tx, rx) = mpsc::channel();
        assert!(player.play(schedule.clone(), tx.clone(), false).is_ok());
        assert!(player.is_busy());
        assert!(player.play(schedule, tx, false).is_err());

        let finished = rx
            .iter()
            .find(|m| *m == PlayerMsg::Finished)
            .is_some();
        assert!(finished);
        assert_eq!(trigger.engine().labels(), vec!["A3", "B3"]);
    }

    #[test]
    fn empty_schedule_is_rejected() {
        let player = Player::new(ready_trigger(), false);
        let (tx, _rx) = mpsc::channel();
        assert!(player.play(Vec::new(), tx, true).is_err());
    }
}
