use crate::engine::DEFAULT_NOTE_MS;
use clap::Parser;
use std::path::PathBuf;

/// Highest octave the keyboard may start at.
pub const MAX_START_OCTAVE: u8 = 8;
/// Widest keyboard, in octaves.
pub const MAX_OCTAVES: u8 = 8;

#[derive(Parser, Debug)]
#[command(
    name = "ivory",
    about = "Play, record and replay melodies on a virtual piano keyboard!"
)]
pub struct Args {
    /// Directory holding saved melodies and local accounts.
    #[arg(long = "data-dir", default_value = "./ivory-data")]
    pub data_dir: PathBuf,

    /// Lowest octave shown on the keyboard.
    #[arg(
        short,
        long = "start-octave",
        default_value_t = 3,
        value_parser = clap::value_parser!(u8).range(0..=MAX_START_OCTAVE as i64)
    )]
    pub start_octave: u8,

    /// How many octaves to lay out.
    #[arg(
        short,
        long,
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(1..=MAX_OCTAVES as i64)
    )]
    pub octaves: u8,

    /// How long each triggered note sounds, in milliseconds.
    #[arg(short, long = "duration-ms", default_value_t = DEFAULT_NOTE_MS)]
    pub duration_ms: u64,

    /// Dry run (print the keyboard layout and exit).
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Replay the saved melody with this id and exit.
    #[arg(short, long)]
    pub play: Option<u64>,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn melodies_path(&self) -> PathBuf {
        self.data_dir.join("melodies.json")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }
}
