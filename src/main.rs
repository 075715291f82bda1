use anyhow::{Result, bail};
use clap::Parser;
use ivory::{
    Args, AudioTrigger, JsonMelodyStore, LocalIdentityProvider, MelodyStore, PianoSession, Player,
    SoundEngine, build_schedule, generate_keys, preview_keys, run_interactive,
};
use log::{LevelFilter, debug, info};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

#[cfg(feature = "audio")]
fn default_engine() -> ivory::SynthEngine {
    ivory::SynthEngine::new()
}

#[cfg(not(feature = "audio"))]
fn default_engine() -> ivory::LogEngine {
    ivory::LogEngine
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }
    builder.init();
}

fn print_layout(args: &Args) {
    println!(
        "Keyboard layout: {} octave(s) from octave {}",
        args.octaves, args.start_octave
    );
    for (i, key) in generate_keys(args.start_octave, args.octaves).iter().enumerate() {
        println!(
            "{:>3}: {:<4} {:<6} key={}",
            i,
            key.note_name().to_string(),
            if key.is_black { "black" } else { "white" },
            key.keyboard_key
                .map(String::from)
                .unwrap_or_else(|| "<none>".into())
        );
    }
}

fn replay<E: SoundEngine + 'static>(trigger: Arc<AudioTrigger<E>>, args: &Args, id: u64) -> Result<()> {
    let store = JsonMelodyStore::open(args.melodies_path())?;
    let Some(melody) = store.get(id)? else {
        bail!("No melody with id {}..!", id);
    };

    info!(
        "Replaying '{}' ({} notes): {}",
        melody.name,
        melody.notes.len(),
        preview_keys(melody.notes.iter().map(|n| n.key.as_str()), 8)
    );

    if melody.notes.is_empty() {
        bail!("Melody {} has no notes..!", id);
    }

    trigger.initialize()?;
    let player = Player::new(trigger, args.verbose);
    let (tx, _rx) = mpsc::channel();
    player.play(build_schedule(&melody.notes), tx, true)?;
    info!("Playback finished, exiting..!");

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!("{:?}", args);

    if args.dry_run {
        print_layout(&args);
        return Ok(());
    }

    let trigger = Arc::new(AudioTrigger::new(
        default_engine(),
        Duration::from_millis(args.duration_ms),
    ));

    if let Some(id) = args.play {
        return replay(trigger, &args, id);
    }

    let store = JsonMelodyStore::open(args.melodies_path())?;
    let identity = LocalIdentityProvider::open(args.accounts_path())?;
    let mut session = PianoSession::new(
        trigger,
        store,
        identity,
        args.start_octave,
        args.octaves,
        args.verbose,
    );

    run_interactive(&mut session)?;
    info!("Bye..!");

    Ok(())
}
