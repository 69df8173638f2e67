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

//! Playback collaborator boundary. The synthesis engine itself lives
//! outside this crate; instruments talk to it through the [`Playback`]
//! trait, and global timing goes through the [`Transport`] handle.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rhythmic interval between successive notes, as accepted by the
/// synthesis engine ("8n" = eighth notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subdivision {
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl Subdivision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subdivision::Half => "2n",
            Subdivision::Quarter => "4n",
            Subdivision::Eighth => "8n",
            Subdivision::Sixteenth => "16n",
            Subdivision::ThirtySecond => "32n",
            Subdivision::SixtyFourth => "64n",
        }
    }

    pub fn all() -> [Subdivision; 6] {
        [
            Subdivision::Half,
            Subdivision::Quarter,
            Subdivision::Eighth,
            Subdivision::Sixteenth,
            Subdivision::ThirtySecond,
            Subdivision::SixtyFourth,
        ]
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Subdivision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2n" => Ok(Subdivision::Half),
            "4n" => Ok(Subdivision::Quarter),
            "8n" => Ok(Subdivision::Eighth),
            "16n" => Ok(Subdivision::Sixteenth),
            "32n" => Ok(Subdivision::ThirtySecond),
            "64n" => Ok(Subdivision::SixtyFourth),
            _ => Err(format!("unknown subdivision '{}'", s)),
        }
    }
}

/// Effects the instrument can patch into its signal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Distortion,
    Reverb,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::Distortion => write!(f, "distortion"),
            EffectKind::Reverb => write!(f, "reverb"),
        }
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distortion" => Ok(EffectKind::Distortion),
            "reverb" => Ok(EffectKind::Reverb),
            _ => Err(format!("unknown effect '{}'", s)),
        }
    }
}

/// Per-instrument playback surface of the external synthesis engine.
/// Calls are fire-and-forget; the engine reports nothing back.
pub trait Playback: Send {
    fn create_sequence(&mut self, events: &[String], subdivision: Subdivision, note_duration: Subdivision);
    fn start(&mut self);
    fn stop(&mut self);
    fn connect_effect(&mut self, kind: EffectKind);
    fn disconnect_effect(&mut self, kind: EffectKind);
    fn set_effect_parameter(&mut self, kind: EffectKind, value: f32);
}

/// Builds one playback instance per spawned instrument.
pub trait PlaybackFactory: Send + Sync {
    fn build(&self) -> Box<dyn Playback>;
}

/// Silent playback, used when no synthesis engine is attached.
pub struct NullPlayback;

impl Playback for NullPlayback {
    fn create_sequence(&mut self, events: &[String], subdivision: Subdivision, note_duration: Subdivision) {
        debug!(
            events = events.len(),
            %subdivision,
            %note_duration,
            "null playback: sequence created"
        );
    }

    fn start(&mut self) {
        debug!("null playback: start");
    }

    fn stop(&mut self) {
        debug!("null playback: stop");
    }

    fn connect_effect(&mut self, kind: EffectKind) {
        debug!(%kind, "null playback: effect connected");
    }

    fn disconnect_effect(&mut self, kind: EffectKind) {
        debug!(%kind, "null playback: effect disconnected");
    }

    fn set_effect_parameter(&mut self, kind: EffectKind, value: f32) {
        debug!(%kind, value, "null playback: effect parameter");
    }
}

pub struct NullPlaybackFactory;

impl PlaybackFactory for NullPlaybackFactory {
    fn build(&self) -> Box<dyn Playback> {
        Box::new(NullPlayback)
    }
}

/// One observed call on a [`RecordingPlayback`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCall {
    CreateSequence {
        events: Vec<String>,
        subdivision: Subdivision,
        note_duration: Subdivision,
    },
    Start,
    Stop,
    ConnectEffect(EffectKind),
    DisconnectEffect(EffectKind),
    SetEffectParameter(EffectKind, f32),
}

/// Shared call journal for [`RecordingPlayback`] instances.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<PlaybackCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: PlaybackCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn snapshot(&self) -> Vec<PlaybackCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

/// Playback stand-in that journals every call; lets tests and headless
/// runs assert what the synthesis engine would have been told.
pub struct RecordingPlayback {
    log: CallLog,
}

impl RecordingPlayback {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Playback for RecordingPlayback {
    fn create_sequence(&mut self, events: &[String], subdivision: Subdivision, note_duration: Subdivision) {
        self.log.record(PlaybackCall::CreateSequence {
            events: events.to_vec(),
            subdivision,
            note_duration,
        });
    }

    fn start(&mut self) {
        self.log.record(PlaybackCall::Start);
    }

    fn stop(&mut self) {
        self.log.record(PlaybackCall::Stop);
    }

    fn connect_effect(&mut self, kind: EffectKind) {
        self.log.record(PlaybackCall::ConnectEffect(kind));
    }

    fn disconnect_effect(&mut self, kind: EffectKind) {
        self.log.record(PlaybackCall::DisconnectEffect(kind));
    }

    fn set_effect_parameter(&mut self, kind: EffectKind, value: f32) {
        self.log.record(PlaybackCall::SetEffectParameter(kind, value));
    }
}

/// Factory whose playback instances all journal into one [`CallLog`].
pub struct RecordingPlaybackFactory {
    log: CallLog,
}

impl RecordingPlaybackFactory {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl PlaybackFactory for RecordingPlaybackFactory {
    fn build(&self) -> Box<dyn Playback> {
        Box::new(RecordingPlayback::new(self.log.clone()))
    }
}

struct TransportState {
    bpm: f32,
    running: bool,
}

/// The process-wide transport clock shared by all instruments.
/// Constructed once at startup and passed around by handle.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Mutex<TransportState>>,
}

impl Transport {
    pub fn new(bpm: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TransportState {
                bpm: bpm.clamp(30.0, 240.0),
                running: false,
            })),
        }
    }

    pub fn start(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.running = true;
            debug!(bpm = state.bpm, "transport started");
        }
    }

    pub fn stop(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.running = false;
            debug!("transport stopped");
        }
    }

    pub fn toggle(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.running = !state.running;
            debug!(running = state.running, "transport toggled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().map(|state| state.running).unwrap_or(false)
    }

    pub fn bpm(&self) -> f32 {
        self.inner.lock().map(|state| state.bpm).unwrap_or(0.0)
    }

    pub fn set_bpm(&self, bpm: f32) {
        if let Ok(mut state) = self.inner.lock() {
            state.bpm = bpm.clamp(30.0, 240.0);
        }
    }
}
