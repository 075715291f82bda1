use crate::model::note::{CHROMATIC, NoteName, PitchClass};
use serde::{Deserialize, Serialize};

/// Octave that the first twelve mapped keys resolve to.
pub const BASE_OCTAVE: u8 = 3;

/// How many table entries belong to the base octave before wrapping to `BASE_OCTAVE + 1`.
const BASE_OCTAVE_SPAN: usize = 12;

// -----------------------------------------------------------------------------
// Hardcoded mapping: home row = white keys, the row above = black keys.
//
// 'a'..'j' cover one full chromatic octave, then 'k'..';' reuse the pitch
// classes C..E for a partial second octave. The wrap reuses input keys rather
// than giving every octave its own keys; this is a known limitation of the
// layout and lookups must keep resolving it exactly this way.
// -----------------------------------------------------------------------------

pub const KEYBOARD_MAP: &[(char, PitchClass)] = &[
    ('a', PitchClass::C),
    ('w', PitchClass::CSharp),
    ('s', PitchClass::D),
    ('e', PitchClass::DSharp),
    ('d', PitchClass::E),
    ('f', PitchClass::F),
    ('t', PitchClass::FSharp),
    ('g', PitchClass::G),
    ('y', PitchClass::GSharp),
    ('h', PitchClass::A),
    ('u', PitchClass::ASharp),
    ('j', PitchClass::B),
    // Wraps into the next octave
    ('k', PitchClass::C),
    ('o', PitchClass::CSharp),
    ('l', PitchClass::D),
    ('p', PitchClass::DSharp),
    (';', PitchClass::E),
];

/// A single key on the on-screen keyboard.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PianoKey {
    pub note: PitchClass,
    pub octave: u8,
    pub is_black: bool,
    /// Computer key that plays this piano key, if the table reached it.
    pub keyboard_key: Option<char>,
}

impl PianoKey {
    pub fn note_name(&self) -> NoteName {
        NoteName::new(self.note, self.octave)
    }
}

/// Return the note played by the given computer key, if it is mapped.
///
/// Example:
/// ```ignore
/// assert_eq!(map_key_to_note('k'), Some(NoteName::new(PitchClass::C, 4)));
/// ```
pub fn map_key_to_note(key: char) -> Option<NoteName> {
    KEYBOARD_MAP
        .iter()
        .position(|(k, _)| *k == key)
        .map(|idx| {
            let octave = if idx < BASE_OCTAVE_SPAN {
                BASE_OCTAVE
            } else {
                BASE_OCTAVE + 1
            };

            NoteName::new(KEYBOARD_MAP[idx].1, octave)
        })
}

/// Lay out `octaves` chromatic octaves starting at `start_octave`.
///
/// Keyboard labels are handed out left to right from [`KEYBOARD_MAP`] across the
/// whole layout, so keys past the end of the table get no label.
pub fn generate_keys(start_octave: u8, octaves: u8) -> Vec<PianoKey> {
    let mut labels = KEYBOARD_MAP.iter().map(|(k, _)| *k);

    (0..octaves)
        .map(|n| start_octave.saturating_add(n))
        .flat_map(|octave| CHROMATIC.iter().map(move |&note| (note, octave)))
        .map(|(note, octave)| PianoKey {
            note,
            octave,
            is_black: note.is_black(),
            keyboard_key: labels.next(),
        })
        .collect()
}
