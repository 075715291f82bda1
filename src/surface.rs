use crate::engine::{AudioTrigger, SoundEngine};
use crate::model::mapper::{PianoKey, generate_keys, map_key_to_note};
use crate::model::note::NoteName;
use crate::recorder::{Clock, Recorder};
use log::trace;
use std::sync::Arc;

/// Turns key presses and clicks on the keyboard into sounded (and possibly recorded) notes.
#[derive(Debug)]
pub struct InputSurface<E: SoundEngine> {
    trigger: Arc<AudioTrigger<E>>,
    keys: Vec<PianoKey>,
}

impl<E: SoundEngine> InputSurface<E> {
    pub fn new(trigger: Arc<AudioTrigger<E>>, start_octave: u8, octaves: u8) -> Self {
        Self {
            trigger,
            keys: generate_keys(start_octave, octaves),
        }
    }

    pub fn keys(&self) -> &[PianoKey] {
        &self.keys
    }

    /// A computer key went down. Auto-repeats from a held key are ignored.
    pub fn press_key<C: Clock>(
        &self,
        key: char,
        is_repeat: bool,
        recorder: &mut Recorder<C>,
    ) -> Option<String> {
        if is_repeat {
            return None;
        }

        let note = map_key_to_note(key)?;
        trace!("Key {:?} -> {}", key, note);
        self.sound(note, recorder)
    }

    /// A piano key was clicked (by position in [`InputSurface::keys`]).
    pub fn click_key<C: Clock>(&self, index: usize, recorder: &mut Recorder<C>) -> Option<String> {
        let key = self.keys.get(index)?;
        self.sound(key.note_name(), recorder)
    }

    /// Only notes that actually sounded are recorded.
    fn sound<C: Clock>(&self, note: NoteName, recorder: &mut Recorder<C>) -> Option<String> {
        let label = self.trigger.play(note.pitch, note.octave, None)?;

        if recorder.is_recording() {
            recorder.record_event(&label);
        }

        Some(label)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::capture::CaptureEngine;
    use crate::model::melody::NoteEvent;
    use crate::recorder::test::ManualClock;
    use std::time::Duration;

    fn surface(ready: bool) -> InputSurface<CaptureEngine> {
        let trigger = AudioTrigger::new(CaptureEngine::default(), Duration::from_millis(10));
        if ready {
            trigger.initialize().unwrap();
        }
        InputSurface::new(Arc::new(trigger), 3, 2)
    }

    #[test]
    fn key_press_sounds_and_records() {
        env_logger::try_init().unwrap_or(());

        let surface = surface(true);
        let clock = ManualClock::default();
        let mut rec = Recorder::with_clock(clock.clone());

        assert_eq!(surface.press_key('a', false, &mut rec), Some(String::from("C3")));
        assert!(rec.events().is_empty());

        rec.start_recording();
        clock.set(120);
        assert_eq!(surface.press_key('k', false, &mut rec), Some(String::from("C4")));
        assert_eq!(surface.press_key('k', true, &mut rec), None);
        assert_eq!(surface.press_key('z', false, &mut rec), None);

        assert_eq!(rec.events(), &[NoteEvent::new("C4", 120)]);
        assert_eq!(surface.trigger.engine().labels(), vec!["C3", "C4"]);
    }

    #[test]
    fn clicks_use_layout_position() {
        let surface = surface(true);
        let mut rec = Recorder::with_clock(ManualClock::default());

        assert_eq!(surface.keys().len(), 24);
        assert_eq!(surface.click_key(13, &mut rec), Some(String::from("C#4")));
        assert_eq!(surface.click_key(23, &mut rec), Some(String::from("B4")));
        assert_eq!(surface.click_key(24, &mut rec), None);
    }

    #[test]
    fn silent_notes_are_not_recorded() {
        let surface = surface(false);
        let mut rec = Recorder::with_clock(ManualClock::default());
        rec.start_recording();

        assert_eq!(surface.press_key('a', false, &mut rec), None);
        assert_eq!(surface.click_key(0, &mut rec), None);
        assert!(rec.events().is_empty());
    }
}
