use crate::engine::SoundEngine;
use crate::model::note::NoteName;
use anyhow::{anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

/// Release tail appended to every note so it doesn't click off.
const RELEASE_SECS: f64 = 0.08;
const GAIN: f64 = 0.2;

/// A command sent to the audio callback
enum SynthCommand {
    NoteOn { freq: f64, duration_secs: f64 },
}

struct Voice {
    freq: f64,
    phase: f64,
    held: usize,
    release: usize,
    elapsed: usize,
}

impl Voice {
    fn is_done(&self) -> bool {
        self.elapsed >= self.held + self.release
    }

    fn next_sample(&mut self, sample_rate: f64) -> f64 {
        let env = if self.elapsed < self.held {
            1.0
        } else {
            let into_release = (self.elapsed - self.held) as f64;
            (1.0 - into_release / self.release.max(1) as f64).max(0.0)
        };

        let value = (self.phase * std::f64::consts::TAU).sin() * env;
        self.phase = (self.phase + self.freq / sample_rate).fract();
        self.elapsed += 1;
        value
    }
}

/// Polyphonic sine synth on the default output device.
#[derive(Default)]
pub struct SynthEngine {
    tx: Mutex<Option<Sender<SynthCommand>>>,
}

impl SynthEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs on the audio thread for as long as the process lives; the stream is dropped with it.
fn run_stream(rx: Receiver<SynthCommand>, ready_tx: Sender<Result<(), String>>) {
    let built = (|| -> anyhow::Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output audio device available"))?;
        let config = device.default_output_config()?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            bail!("unsupported sample format {:?}", config.sample_format());
        }

        let sample_rate = config.sample_rate().0 as f64;
        let channels = config.channels() as usize;
        let mut voices: Vec<Voice> = Vec::new();

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = rx.try_recv() {
                    match cmd {
                        SynthCommand::NoteOn { freq, duration_secs } => voices.push(Voice {
                            freq,
                            phase: 0.0,
                            held: (duration_secs * sample_rate) as usize,
                            release: (RELEASE_SECS * sample_rate) as usize,
                            elapsed: 0,
                        }),
                    }
                }

                for frame in data.chunks_mut(channels) {
                    let mut value = 0.0_f64;
                    for voice in voices.iter_mut() {
                        value += voice.next_sample(sample_rate);
                    }
                    let value = (value * GAIN).clamp(-1.0, 1.0) as f32;
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }

                voices.retain(|v| !v.is_done());
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;
        Ok(stream)
    })();

    match built {
        Ok(_stream) => {
            let _ = ready_tx.send(Ok(()));
            loop {
                thread::park();
            }
        }
        Err(why) => {
            let _ = ready_tx.send(Err(why.to_string()));
        }
    }
}

impl SoundEngine for SynthEngine {
    fn start(&self) -> anyhow::Result<()> {
        let Ok(mut tx_lock) = self.tx.lock() else {
            bail!("Failed to lock synth sender..!")
        };

        if tx_lock.is_some() {
            debug!("Synth already running..!");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<SynthCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("ivory-synth".into())
            .spawn(move || run_stream(rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Synth stream running on the default output device..!");
                *tx_lock = Some(tx);
                Ok(())
            }
            Ok(Err(why)) => Err(anyhow!("Failed to open audio output: {}", why)),
            Err(_) => Err(anyhow!("Synth thread exited before reporting..!")),
        }
    }

    fn trigger_attack_release(&self, note: &NoteName, duration: Duration) -> anyhow::Result<()> {
        let Ok(tx_lock) = self.tx.lock() else {
            bail!("Failed to lock synth sender..!")
        };

        let Some(tx) = tx_lock.as_ref() else {
            bail!("Synth not started..!")
        };

        tx.send(SynthCommand::NoteOn {
            freq: note.frequency(),
            duration_secs: duration.as_secs_f64(),
        })
        .map_err(|_| anyhow!("Audio thread disconnected..!"))
    }
}
