use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the 12 pitch classes within an octave.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

/// Fixed chromatic order used when laying out a keyboard.
pub const CHROMATIC: [PitchClass; 12] = [
    PitchClass::C,
    PitchClass::CSharp,
    PitchClass::D,
    PitchClass::DSharp,
    PitchClass::E,
    PitchClass::F,
    PitchClass::FSharp,
    PitchClass::G,
    PitchClass::GSharp,
    PitchClass::A,
    PitchClass::ASharp,
    PitchClass::B,
];

impl PitchClass {
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Semitone offset from C within the octave (C=0, B=11).
    pub fn semitone(self) -> u8 {
        CHROMATIC
            .iter()
            .position(|&p| p == self)
            .unwrap_or_default() as u8
    }

    /// Sharped names sit on the black keys.
    pub fn is_black(self) -> bool {
        self.name().contains('#')
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        CHROMATIC
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| anyhow!("Unknown pitch class '{}'..!", s))
    }
}

/// A pitch class pinned to an octave, e.g. `C4` or `F#3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pub pitch: PitchClass,
    pub octave: u8,
}

impl NoteName {
    pub fn new(pitch: PitchClass, octave: u8) -> Self {
        Self { pitch, octave }
    }

    /// Middle C (C4) = MIDI 60
    pub fn midi(&self) -> u8 {
        (self.octave.saturating_add(1))
            .saturating_mul(12)
            .saturating_add(self.pitch.semitone())
    }

    /// Frequency in Hz (A4 = 440 Hz)
    pub fn frequency(&self) -> f64 {
        440.0 * 2.0_f64.powf((self.midi() as f64 - 69.0) / 12.0)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}

impl FromStr for NoteName {
    type Err = anyhow::Error;

    /// Everything before the trailing digits is the pitch class, the trailing digits are the octave.
    fn from_str(label: &str) -> Result<Self> {
        let split = label
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)
            .ok_or_else(|| anyhow!("Note label '{}' has no octave..!", label))?;

        let (pitch, octave) = label.split_at(split);
        let octave = octave
            .parse::<u8>()
            .map_err(|e| anyhow!("Bad octave in note label '{}': {}", label, e))?;

        Ok(Self {
            pitch: pitch.parse()?,
            octave,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sharps_are_black() {
        let black: Vec<_> = CHROMATIC.iter().filter(|p| p.is_black()).collect();
        assert_eq!(black.len(), 5);
        assert!(PitchClass::FSharp.is_black());
        assert!(!PitchClass::E.is_black());
    }

    #[test]
    fn parse_labels() {
        let c4: NoteName = "C4".parse().unwrap();
        assert_eq!(c4, NoteName::new(PitchClass::C, 4));

        let fs3: NoteName = "F#3".parse().unwrap();
        assert_eq!(fs3, NoteName::new(PitchClass::FSharp, 3));

        let high: NoteName = "A#10".parse().unwrap();
        assert_eq!(high.octave, 10);
        assert_eq!(high.pitch, PitchClass::ASharp);
    }

    #[test]
    fn reject_bad_labels() {
        assert!("C".parse::<NoteName>().is_err());
        assert!("H4".parse::<NoteName>().is_err());
        assert!("4".parse::<NoteName>().is_err());
        assert!("".parse::<NoteName>().is_err());
    }

    #[test]
    fn label_display_matches_parse() {
        for pitch in CHROMATIC {
            let note = NoteName::new(pitch, 3);
            assert_eq!(note.to_string().parse::<NoteName>().unwrap(), note);
        }
    }

    #[test]
    fn midi_and_frequency() {
        assert_eq!(NoteName::new(PitchClass::C, 4).midi(), 60);
        let a4 = NoteName::new(PitchClass::A, 4).frequency();
        assert!((a4 - 440.0).abs() < 0.01);
    }
}
