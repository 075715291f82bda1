use crate::engine::{AudioTrigger, SoundEngine};
use crate::identity::IdentityProvider;
use crate::model::mapper::PianoKey;
use crate::model::melody::{Identity, Melody, NoteEvent};
use crate::player::{Player, PlayerMsg};
use crate::recorder::{Clock, Recorder, RecorderEvent, RecorderState, SystemClock};
use crate::store::MelodyStore;
use crate::surface::InputSurface;
use anyhow::{anyhow, bail};
use log::{debug, info};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Everything a front end needs to redraw after.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Recorder(RecorderEvent),
    Player(PlayerMsg),
    Identity(Option<Identity>),
}

/// The piano page: live input, the recorder, replay, and the signed-in user's melodies.
pub struct PianoSession<E, S, I, C = SystemClock>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
    C: Clock,
{
    trigger: Arc<AudioTrigger<E>>,
    surface: InputSurface<E>,
    recorder: Recorder<C>,
    player: Player<E>,
    store: S,
    identity: I,
    player_tx: Sender<PlayerMsg>,
    player_rx: Receiver<PlayerMsg>,
    recorder_rx: Receiver<RecorderEvent>,
    identity_rx: Receiver<Option<Identity>>,
}

impl<E, S, I> PianoSession<E, S, I, SystemClock>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    pub fn new(
        trigger: Arc<AudioTrigger<E>>,
        store: S,
        identity: I,
        start_octave: u8,
        octaves: u8,
        verbose: bool,
    ) -> Self {
        Self::with_recorder(
            trigger,
            store,
            identity,
            Recorder::new(),
            start_octave,
            octaves,
            verbose,
        )
    }
}

impl<E, S, I, C> PianoSession<E, S, I, C>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
    C: Clock,
{
    pub fn with_recorder(
        trigger: Arc<AudioTrigger<E>>,
        store: S,
        identity: I,
        mut recorder: Recorder<C>,
        start_octave: u8,
        octaves: u8,
        verbose: bool,
    ) -> Self {
        let (player_tx, player_rx) = mpsc::channel();
        let recorder_rx = recorder.subscribe();
        let identity_rx = identity.subscribe();

        Self {
            surface: InputSurface::new(Arc::clone(&trigger), start_octave, octaves),
            player: Player::new(Arc::clone(&trigger), verbose),
            trigger,
            recorder,
            store,
            identity,
            player_tx,
            player_rx,
            recorder_rx,
            identity_rx,
        }
    }

    pub fn keys(&self) -> &[PianoKey] {
        self.surface.keys()
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn recorded(&self) -> &[NoteEvent] {
        self.recorder.events()
    }

    pub fn audio_ready(&self) -> bool {
        self.trigger.is_ready()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.current_identity()
    }

    pub fn initialize_audio(&self) -> anyhow::Result<()> {
        self.trigger.initialize()
    }

    pub fn press_key(&mut self, key: char, is_repeat: bool) -> Option<String> {
        self.surface.press_key(key, is_repeat, &mut self.recorder)
    }

    pub fn click_key(&mut self, index: usize) -> Option<String> {
        self.surface.click_key(index, &mut self.recorder)
    }

    pub fn start_recording(&mut self) -> bool {
        self.recorder.start_recording()
    }

    pub fn stop_recording(&mut self) -> bool {
        self.recorder.stop_recording()
    }

    /// Record button: starts from idle, stops while recording.
    pub fn toggle_recording(&mut self) -> bool {
        match self.recorder.state() {
            RecorderState::Recording => self.recorder.stop_recording(),
            _ => self.recorder.start_recording(),
        }
    }

    /// Replay the current recording in the background. `Ok(false)` if there was nothing to do.
    pub fn play_recording(&mut self) -> anyhow::Result<bool> {
        let Some(schedule) = self.recorder.play_recording() else {
            return Ok(false);
        };

        if let Err(why) = self.player.play(schedule, self.player_tx.clone(), false) {
            self.recorder.finish_playback();
            return Err(why);
        }

        Ok(true)
    }

    pub fn clear_recording(&mut self) -> bool {
        self.recorder.clear_recording()
    }

    /// `Ok(None)` when saving isn't possible right now (nothing recorded, busy, signed out).
    pub fn save_recording(&self, name: &str, is_public: bool) -> anyhow::Result<Option<Melody>> {
        let identity = self.identity.current_identity();
        self.recorder
            .save_recording(name, is_public, identity.as_ref(), &self.store)
    }

    fn require_identity(&self) -> anyhow::Result<Identity> {
        self.identity
            .current_identity()
            .ok_or_else(|| anyhow!("Sign in to manage your melodies..!"))
    }

    pub fn my_melodies(&self) -> anyhow::Result<Vec<Melody>> {
        let me = self.require_identity()?;
        self.store.list(&me.id)
    }

    pub fn public_melodies(&self) -> anyhow::Result<Vec<Melody>> {
        self.store.list_public()
    }

    /// Put a saved melody into the recorder so it can be replayed.
    /// Own melodies and public ones can be loaded.
    pub fn load_melody(&mut self, id: u64) -> anyhow::Result<bool> {
        let Some(melody) = self.store.get(id)? else {
            bail!("No melody with id {}..!", id);
        };

        let me = self.identity.current_identity();
        if !melody.is_public && me.as_ref().is_none_or(|me| me.id != melody.user_id) {
            bail!("Melody {} is private..!", id);
        }

        info!("Loading melody '{}' ({} notes)..!", melody.name, melody.notes.len());
        Ok(self.recorder.load_notes(melody.notes))
    }

    pub fn delete_melody(&self, id: u64) -> anyhow::Result<()> {
        let me = self.require_identity()?;
        self.store.delete(id, &me.id)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Identity> {
        self.identity.sign_in(email, password)
    }

    pub fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<Identity> {
        self.identity.sign_up(email, password)
    }

    pub fn sign_out(&self) -> anyhow::Result<()> {
        self.identity.sign_out()
    }

    /// Drain pending notifications. A finished replay returns the recorder to idle here.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        while let Ok(msg) = self.player_rx.try_recv() {
            if msg == PlayerMsg::Finished {
                debug!("Replay finished..!");
                self.recorder.finish_playback();
            }
            events.push(SessionEvent::Player(msg));
        }

        events.extend(self.recorder_rx.try_iter().map(SessionEvent::Recorder));
        events.extend(self.identity_rx.try_iter().map(SessionEvent::Identity));

        events
    }
}
