/*
 * generest - Generative Music from Open Sensor Data
 * Copyright (c) 2025 Philipp Norton
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::HashMap;

use tracing::debug;

use crate::errors::{GenerestError, GenerestResult};
use crate::parameters::{BasicParameter, ParameterDescriptor, ParameterError, Parameterizable};
use crate::playback::{EffectKind, Playback, Subdivision};
use crate::sonify;

/// Sequence an instrument plays before any data is connected.
pub const DEFAULT_SEQUENCE: [&str; 8] = ["D4", "A4", "D5", "F5", "A5", "F5", "D5", "A4"];

/// Instrument used as a module: owns one synthesizer voice's playback
/// parameters and keeps the derived state consistent. `note_pool` and
/// `sequence_events` are never mutated directly; every parameter change
/// recomputes them and reinstalls the sequence on the playback engine,
/// resuming playback when it was already running.
pub struct Instrument {
    scale: String,
    octave_center: i32,
    octave_range: i32,
    sequence_length: usize,
    subdivision: Subdivision,
    note_duration: Subdivision,
    distortion_on: bool,
    distortion_level: f32,
    reverb_on: bool,
    reverb_decay: f32,
    note_pool: Vec<String>,
    data_array: Vec<f64>,
    sequence_events: Vec<String>,
    is_playing: bool,
    playback: Box<dyn Playback>,
}

impl Instrument {
    pub fn new(playback: Box<dyn Playback>) -> Self {
        let mut instrument = Self {
            scale: sonify::DEFAULT_SCALE.to_string(),
            octave_center: 4,
            octave_range: 2,
            sequence_length: 16,
            subdivision: Subdivision::Eighth,
            note_duration: Subdivision::Sixteenth,
            distortion_on: false,
            distortion_level: 0.0,
            reverb_on: false,
            reverb_decay: 1.0,
            note_pool: sonify::build_note_pool(sonify::DEFAULT_SCALE, 4, 2),
            data_array: Vec::new(),
            sequence_events: DEFAULT_SEQUENCE.iter().map(|n| n.to_string()).collect(),
            is_playing: false,
            playback,
        };
        instrument.playback.create_sequence(
            &instrument.sequence_events,
            instrument.subdivision,
            instrument.note_duration,
        );
        instrument
    }

    pub fn scale(&self) -> &str {
        &self.scale
    }

    pub fn octave(&self) -> i32 {
        self.octave_center
    }

    pub fn octave_range(&self) -> i32 {
        self.octave_range
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    pub fn note_duration(&self) -> Subdivision {
        self.note_duration
    }

    pub fn note_pool(&self) -> &[String] {
        &self.note_pool
    }

    pub fn sequence_events(&self) -> &[String] {
        &self.sequence_events
    }

    pub fn data_array(&self) -> &[f64] {
        &self.data_array
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn effect_enabled(&self, kind: EffectKind) -> bool {
        match kind {
            EffectKind::Distortion => self.distortion_on,
            EffectKind::Reverb => self.reverb_on,
        }
    }

    /// Select the scale; rebuilds the pool and re-maps the stored data.
    pub fn set_scale(&mut self, name: &str) -> GenerestResult<()> {
        if !sonify::SCALES.contains_key(name) {
            return Err(GenerestError::UnknownScale {
                name: name.to_string(),
            });
        }
        self.scale = name.to_string();
        self.refresh(true);
        Ok(())
    }

    pub fn set_octave(&mut self, octave: i32) -> Result<(), ParameterError> {
        if !(2..=7).contains(&octave) {
            return Err(ParameterError::OutOfRange {
                value: octave as f32,
                min: 2.0,
                max: 7.0,
            });
        }
        self.octave_center = octave;
        self.refresh(true);
        Ok(())
    }

    pub fn set_octave_range(&mut self, range: i32) -> Result<(), ParameterError> {
        if !(0..=4).contains(&range) {
            return Err(ParameterError::OutOfRange {
                value: range as f32,
                min: 0.0,
                max: 4.0,
            });
        }
        self.octave_range = range;
        self.refresh(true);
        Ok(())
    }

    pub fn set_sequence_length(&mut self, length: usize) -> Result<(), ParameterError> {
        if !(4..=64).contains(&length) {
            return Err(ParameterError::OutOfRange {
                value: length as f32,
                min: 4.0,
                max: 64.0,
            });
        }
        self.sequence_length = length;
        self.refresh(true);
        Ok(())
    }

    /// Sequence tempo. Timing only; note selection is untouched.
    pub fn set_subdivision(&mut self, subdivision: Subdivision) {
        debug!(%subdivision, "setting sequence tempo");
        self.subdivision = subdivision;
        self.refresh(false);
    }

    /// Timing only; note selection is untouched.
    pub fn set_note_duration(&mut self, note_duration: Subdivision) {
        self.note_duration = note_duration;
        self.refresh(false);
    }

    /// Install a fresh numeric series and derive the sequence from it.
    pub fn feed_data(&mut self, data: Vec<f64>) {
        self.data_array = data;
        self.refresh(true);
    }

    pub fn connect_effect(&mut self, kind: EffectKind) {
        match kind {
            EffectKind::Distortion => self.distortion_on = true,
            EffectKind::Reverb => self.reverb_on = true,
        }
        self.playback.connect_effect(kind);
    }

    pub fn disconnect_effect(&mut self, kind: EffectKind) {
        match kind {
            EffectKind::Distortion => self.distortion_on = false,
            EffectKind::Reverb => self.reverb_on = false,
        }
        self.playback.disconnect_effect(kind);
    }

    pub fn set_effect_parameter(&mut self, kind: EffectKind, value: f32) -> Result<(), ParameterError> {
        match kind {
            EffectKind::Distortion => {
                if !(0.0..=4.0).contains(&value) {
                    return Err(ParameterError::OutOfRange {
                        value,
                        min: 0.0,
                        max: 4.0,
                    });
                }
                self.distortion_level = value;
            }
            EffectKind::Reverb => {
                if !(0.2..=2.0).contains(&value) {
                    return Err(ParameterError::OutOfRange {
                        value,
                        min: 0.2,
                        max: 2.0,
                    });
                }
                self.reverb_decay = value;
            }
        }
        self.playback.set_effect_parameter(kind, value);
        Ok(())
    }

    pub fn play(&mut self) {
        if self.sequence_events.is_empty() {
            debug!("no sequence on instrument, nothing to start");
            return;
        }
        self.playback.start();
        self.is_playing = true;
    }

    /// Idempotent; safe to call before any sequence exists.
    pub fn stop(&mut self) {
        if self.is_playing {
            self.playback.stop();
            self.is_playing = false;
        }
    }

    /// Reset to silence: used when the connection feeding this
    /// instrument is removed.
    pub fn clear(&mut self) {
        self.stop();
        self.note_pool.clear();
        self.data_array.clear();
        self.sequence_events.clear();
        debug!("instrument cleared");
    }

    /// Stop, recompute derived state (when note selection changed),
    /// reinstall the sequence, and resume if it was playing.
    fn refresh(&mut self, remap: bool) {
        let was_playing = self.is_playing;
        if was_playing {
            self.playback.stop();
            self.is_playing = false;
        }
        if remap {
            self.note_pool = sonify::build_note_pool(&self.scale, self.octave_center, self.octave_range);
            self.sequence_events =
                sonify::map_data_to_notes(&self.data_array, &self.note_pool, self.sequence_length);
        }
        self.playback
            .create_sequence(&self.sequence_events, self.subdivision, self.note_duration);
        if was_playing {
            self.playback.start();
            self.is_playing = true;
        }
    }
}

impl Parameterizable for Instrument {
    fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), ParameterError> {
        match name {
            "octave" => self.set_octave(value as i32),
            "octave_range" => self.set_octave_range(value as i32),
            "sequence_length" => self.set_sequence_length(value as usize),
            "distortion_level" => self.set_effect_parameter(EffectKind::Distortion, value),
            "reverb_decay" => self.set_effect_parameter(EffectKind::Reverb, value),
            _ => Err(ParameterError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn get_parameter(&self, name: &str) -> Result<f32, ParameterError> {
        match name {
            "octave" => Ok(self.octave_center as f32),
            "octave_range" => Ok(self.octave_range as f32),
            "sequence_length" => Ok(self.sequence_length as f32),
            "distortion_level" => Ok(self.distortion_level),
            "reverb_decay" => Ok(self.reverb_decay),
            _ => Err(ParameterError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn get_all_parameters(&self) -> HashMap<String, f32> {
        let mut params = HashMap::new();
        params.insert("octave".to_string(), self.octave_center as f32);
        params.insert("octave_range".to_string(), self.octave_range as f32);
        params.insert("sequence_length".to_string(), self.sequence_length as f32);
        params.insert("distortion_level".to_string(), self.distortion_level);
        params.insert("reverb_decay".to_string(), self.reverb_decay);
        params
    }

    fn get_parameter_descriptors(&self) -> Vec<Box<dyn ParameterDescriptor>> {
        vec![
            Box::new(BasicParameter::new("octave", 2.0, 7.0, 4.0)),
            Box::new(BasicParameter::new("octave_range", 0.0, 4.0, 2.0)),
            Box::new(BasicParameter::new("sequence_length", 4.0, 64.0, 16.0)),
            Box::new(BasicParameter::new("distortion_level", 0.0, 4.0, 0.0)),
            Box::new(BasicParameter::new("reverb_decay", 0.2, 2.0, 1.0).with_unit("s")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{CallLog, PlaybackCall, RecordingPlayback};

    fn recording_instrument() -> (Instrument, CallLog) {
        let log = CallLog::new();
        let instrument = Instrument::new(Box::new(RecordingPlayback::new(log.clone())));
        (instrument, log)
    }

    #[test]
    fn test_starts_with_default_sequence() {
        let (instrument, log) = recording_instrument();
        assert_eq!(instrument.sequence_events(), &DEFAULT_SEQUENCE.map(String::from));
        assert_eq!(instrument.note_pool().len(), 7 * 5);

        let calls = log.snapshot();
        assert!(matches!(
            calls.first(),
            Some(PlaybackCall::CreateSequence { subdivision: Subdivision::Eighth, .. })
        ));
    }

    #[test]
    fn test_octave_range_change_while_playing_resumes() {
        let (mut instrument, log) = recording_instrument();
        instrument.feed_data(vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        instrument.play();
        log.clear();

        instrument.set_octave_range(3).unwrap();

        // Pool spans octaves 1..=7 now, the stored data is re-mapped,
        // and playback resumed rather than staying stopped.
        assert_eq!(instrument.note_pool().len(), 7 * 7);
        assert_eq!(instrument.sequence_events().len(), 16);
        assert!(instrument
            .sequence_events()
            .iter()
            .all(|e| instrument.note_pool().contains(e)));
        assert!(instrument.is_playing());

        let calls = log.snapshot();
        assert_eq!(calls[0], PlaybackCall::Stop);
        assert!(matches!(calls[1], PlaybackCall::CreateSequence { .. }));
        assert_eq!(calls[2], PlaybackCall::Start);
    }

    #[test]
    fn test_tempo_change_keeps_note_selection() {
        let (mut instrument, log) = recording_instrument();
        instrument.feed_data(vec![1.0, 5.0, 3.0, 8.0]);
        let before = instrument.sequence_events().to_vec();
        log.clear();

        instrument.set_subdivision(Subdivision::Sixteenth);

        assert_eq!(instrument.sequence_events(), before.as_slice());
        let calls = log.snapshot();
        assert_eq!(
            calls,
            vec![PlaybackCall::CreateSequence {
                events: before,
                subdivision: Subdivision::Sixteenth,
                note_duration: Subdivision::Sixteenth,
            }]
        );
    }

    #[test]
    fn test_parameter_change_while_stopped_stays_stopped() {
        let (mut instrument, log) = recording_instrument();
        instrument.feed_data(vec![1.0, 2.0, 3.0]);
        log.clear();

        instrument.set_octave(5).unwrap();

        assert!(!instrument.is_playing());
        let calls = log.snapshot();
        assert!(!calls.contains(&PlaybackCall::Start));
        assert!(!calls.contains(&PlaybackCall::Stop));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut instrument, log) = recording_instrument();
        instrument.play();
        instrument.stop();
        instrument.stop();

        let stops = log
            .snapshot()
            .iter()
            .filter(|c| **c == PlaybackCall::Stop)
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_clear_silences_and_resets() {
        let (mut instrument, log) = recording_instrument();
        instrument.feed_data(vec![1.0, 2.0, 3.0]);
        instrument.play();

        instrument.clear();

        assert!(instrument.sequence_events().is_empty());
        assert!(instrument.note_pool().is_empty());
        assert!(instrument.data_array().is_empty());
        assert!(!instrument.is_playing());
        assert_eq!(log.snapshot().last(), Some(&PlaybackCall::Stop));

        // Playing again with no sequence is a no-op, not an error.
        log.clear();
        instrument.play();
        assert!(log.snapshot().is_empty());
        assert!(!instrument.is_playing());
    }

    #[test]
    fn test_unknown_scale_is_rejected() {
        let (mut instrument, _log) = recording_instrument();
        assert!(instrument.set_scale("Hlocrian").is_err());
        assert_eq!(instrument.scale(), "Dminor");

        instrument.set_scale("Fmajor").unwrap();
        assert_eq!(instrument.scale(), "Fmajor");
    }

    #[test]
    fn test_effect_toggles_reach_playback() {
        let (mut instrument, log) = recording_instrument();
        instrument.connect_effect(EffectKind::Reverb);
        instrument.set_effect_parameter(EffectKind::Reverb, 1.5).unwrap();
        instrument.disconnect_effect(EffectKind::Reverb);

        assert!(!instrument.effect_enabled(EffectKind::Reverb));
        let calls = log.snapshot();
        assert!(calls.contains(&PlaybackCall::ConnectEffect(EffectKind::Reverb)));
        assert!(calls.contains(&PlaybackCall::SetEffectParameter(EffectKind::Reverb, 1.5)));
        assert!(calls.contains(&PlaybackCall::DisconnectEffect(EffectKind::Reverb)));
    }

    #[test]
    fn test_parameterizable_surface() {
        let (mut instrument, _log) = recording_instrument();

        instrument.set_parameter("octave", 6.0).unwrap();
        assert_eq!(instrument.get_parameter("octave").unwrap(), 6.0);

        assert!(instrument.set_parameter("octave", 11.0).is_err());
        assert!(instrument.set_parameter("sequence_length", 2.0).is_err());
        assert!(instrument.set_parameter("resonance", 1.0).is_err());

        let descriptors = instrument.get_parameter_descriptors();
        assert_eq!(descriptors.len(), instrument.get_all_parameters().len());
    }
}
