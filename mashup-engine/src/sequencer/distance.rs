//! Acoustic distance between two sections
//!
//! Weighted sum of five sub-distances, each in `[0, 1]`:
//!
//! | factor         | weight |
//! |----------------|--------|
//! | loudness       | 0.30   |
//! | tempo          | 0.30   |
//! | key            | 0.30   |
//! | mode           | 0.05   |
//! | time signature | 0.05   |
//!
//! Loudness and tempo are relative to the *first* argument, so
//! `distance(a, b)` and `distance(b, a)` generally differ. The sequencer always
//! passes the current position first.

use crate::types::SectionProps;

pub const LOUDNESS_WEIGHT: f64 = 0.30;
pub const TEMPO_WEIGHT: f64 = 0.30;
pub const KEY_WEIGHT: f64 = 0.30;
pub const MODE_WEIGHT: f64 = 0.05;
pub const TIME_SIGNATURE_WEIGHT: f64 = 0.05;

const PITCH_CLASSES: i16 = 12;
const UNDETECTED: i8 = -1;

/// Weighted acoustic distance from `a` to `b`, capped at 1.0
pub fn distance(a: &SectionProps, b: &SectionProps) -> f64 {
    let sum = LOUDNESS_WEIGHT * relative_difference(a.loudness, b.loudness)
        + TEMPO_WEIGHT * relative_difference(a.tempo, b.tempo)
        + KEY_WEIGHT * key_distance(a.key, b.key)
        + MODE_WEIGHT * mode_distance(a.mode, b.mode)
        + TIME_SIGNATURE_WEIGHT * time_signature_distance(a.time_signature, b.time_signature);
    sum.min(1.0)
}

/// `|a - b| / |a|`
///
/// Unbounded above: a candidate at 4x the reference tempo scores further than
/// one at 2x. Only the weighted total is capped. A zero reference is 0.0 from
/// itself and 1.0 from anything else.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let reference = a.abs();
    if reference == 0.0 {
        return if b == 0.0 { 0.0 } else { 1.0 };
    }
    (a - b).abs() / reference
}

/// Circular pitch-class distance over 12 semitones, `/12`
pub fn key_distance(a: i8, b: i8) -> f64 {
    if a == UNDETECTED || b == UNDETECTED {
        return 1.0;
    }
    let diff = (a as i16 - b as i16).abs().rem_euclid(PITCH_CLASSES);
    let circular = diff.min(PITCH_CLASSES - diff);
    circular as f64 / PITCH_CLASSES as f64
}

pub fn mode_distance(a: i8, b: i8) -> f64 {
    if a == b && a != UNDETECTED {
        0.0
    } else {
        1.0
    }
}

/// Equal meters match; meters sharing a duple or triple feel are close
pub fn time_signature_distance(a: u8, b: u8) -> f64 {
    if a == b {
        0.0
    } else if a % 2 == 0 && b % 2 == 0 {
        0.2
    } else if a % 3 == 0 && b % 3 == 0 {
        0.2
    } else {
        1.0
    }
}
