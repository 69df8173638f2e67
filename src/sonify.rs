//! Data sonification: scale tables, note pool construction, and the
//! quantization step that turns a numeric sensor series into note events.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// A scale as offered by the instrument controls: a root pitch class,
/// the semitone intervals above the root, and the accidental spelling
/// the key calls for.
#[derive(Debug, Clone, Copy)]
pub struct ScaleSpec {
    pub root_pc: i32,
    pub intervals: &'static [i32],
    pub use_flats: bool,
}

lazy_static! {
    /// Scales selectable on an instrument, keyed by the name shown in the controls.
    pub static ref SCALES: HashMap<&'static str, ScaleSpec> = {
        let mut m = HashMap::new();
        m.insert("Dminor", ScaleSpec { root_pc: 2, intervals: &[0, 2, 3, 5, 7, 8, 10], use_flats: true });
        m.insert("Dpenta", ScaleSpec { root_pc: 2, intervals: &[0, 3, 5, 7, 10], use_flats: true });
        m.insert("Fmajor", ScaleSpec { root_pc: 5, intervals: &[0, 2, 4, 5, 7, 9, 11], use_flats: true });
        m
    };
}

pub const DEFAULT_SCALE: &str = "Dminor";

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// All known scale names, sorted for display.
pub fn scale_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SCALES.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Render a MIDI note number as a pitch+octave string, e.g. 62 -> "D4".
pub fn note_name(midi: i32, use_flats: bool) -> String {
    let names = if use_flats { NOTE_NAMES_FLAT } else { NOTE_NAMES_SHARP };
    let pc = midi.rem_euclid(12) as usize;
    format!("{}{}", names[pc], midi.div_euclid(12) - 1)
}

/// Build the note pool for a scale across the octaves in
/// `[center - range, center + range]`, ordered ascending by pitch.
/// An unknown scale name yields an empty pool.
pub fn build_note_pool(scale: &str, octave_center: i32, octave_range: i32) -> Vec<String> {
    let Some(spec) = SCALES.get(scale) else {
        return Vec::new();
    };
    let lo = (octave_center - octave_range).max(0);
    let hi = (octave_center + octave_range).min(8);
    let mut pool = Vec::with_capacity(((hi - lo + 1).max(0) as usize) * spec.intervals.len());
    for octave in lo..=hi {
        for &interval in spec.intervals {
            let midi = 12 * (octave + 1) + spec.root_pc + interval;
            pool.push(note_name(midi, spec.use_flats));
        }
    }
    pool
}

/// Quantize a numeric series into `sequence_length` notes drawn from `note_pool`.
///
/// The data range is split into one equal-width bin per pool note, bin
/// centers starting at `min + width/2`. Each output slot averages its
/// share of the input samples and takes the note whose bin center is
/// nearest (ties go to the lowest index). Pure and deterministic; callers
/// re-invoke it whenever the data, the pool, or the length changes.
///
/// Fallbacks: an empty pool maps to an empty sequence; empty data or a
/// zero-range series maps every slot to the pool's middle note.
pub fn map_data_to_notes(data: &[f64], note_pool: &[String], sequence_length: usize) -> Vec<String> {
    if note_pool.is_empty() || sequence_length == 0 {
        return Vec::new();
    }

    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if data.is_empty() || range == 0.0 || !range.is_finite() {
        let middle = note_pool[note_pool.len() / 2].clone();
        return vec![middle; sequence_length];
    }

    let n = data.len();
    let width = range / note_pool.len() as f64;
    let mut events = Vec::with_capacity(sequence_length);
    for slot in 0..sequence_length {
        let start = (slot as f64 / sequence_length as f64 * (n - 1) as f64).round() as usize;
        let end = ((slot + 1) as f64 / sequence_length as f64 * (n - 1) as f64).round() as usize;
        // A slot whose index range is empty (short input) stands in the
        // single sample at its start.
        let value = if start < end {
            data[start..end].iter().sum::<f64>() / (end - start) as f64
        } else {
            data[start.min(n - 1)]
        };

        let mut nearest = 0;
        let mut nearest_distance = f64::INFINITY;
        for bin in 0..note_pool.len() {
            let center = min + width * (bin as f64 + 0.5);
            let distance = (value - center).abs();
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest = bin;
            }
        }
        events.push(note_pool[nearest].clone());
    }
    events
}
