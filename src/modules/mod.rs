//! Entity model: the modules a user drags around the scene and wires
//! together. A module is a datasource, an instrument, or a trigger
//! (reserved), each drawn as a 3-D shape by the rendering layer.

pub mod datasource;
pub mod instrument;

pub use datasource::Datasource;
pub use instrument::Instrument;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::playback::PlaybackFactory;

/// Position in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    Datasource,
    Instrument,
    Trigger,
}

impl ModuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::Datasource => "datasource",
            ModuleKind::Instrument => "instrument",
            ModuleKind::Trigger => "trigger",
        }
    }

    /// Shape color used by the rendering layer.
    pub fn color(&self) -> &'static str {
        match self {
            ModuleKind::Datasource => "royalblue",
            ModuleKind::Instrument => "orange",
            ModuleKind::Trigger => "hotpink",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a module carries, keyed by its kind. Datasources are shared
/// by reference between a menu template and its spawned clones; each
/// instrument instance owns its own sequencer state.
pub enum ModulePayload {
    Datasource(Arc<Mutex<Datasource>>),
    Instrument(Instrument),
    None,
}

/// A node in the interaction graph.
pub struct Module {
    kind: ModuleKind,
    /// Spawn coordinate of the menu-item template this instance was
    /// cloned from. Never changes after creation.
    template_position: Vec3,
    /// Live position in scene space, updated while the shape is dragged.
    world_position: Vec3,
    is_template: bool,
    payload: ModulePayload,
}

impl Module {
    /// Construct one of the three permanent menu templates.
    pub fn template(kind: ModuleKind, position: Vec3, payload: ModulePayload) -> Self {
        Self {
            kind,
            template_position: position,
            world_position: position,
            is_template: true,
            payload,
        }
    }

    /// Clone this module into a live instance at `position`. Total over
    /// all kinds: a datasource clone shares the same datasource handle,
    /// an instrument clone gets freshly constructed sequencer state, and
    /// anything else clones without a payload.
    pub fn clone_at(&self, position: Vec3, playback: &dyn PlaybackFactory) -> Module {
        let payload = match (&self.kind, &self.payload) {
            (ModuleKind::Datasource, ModulePayload::Datasource(handle)) => {
                ModulePayload::Datasource(Arc::clone(handle))
            }
            (ModuleKind::Instrument, _) => ModulePayload::Instrument(Instrument::new(playback.build())),
            _ => ModulePayload::None,
        };
        Module {
            kind: self.kind,
            template_position: position,
            world_position: position,
            is_template: false,
            payload,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn template_position(&self) -> Vec3 {
        self.template_position
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    pub fn set_world_position(&mut self, position: Vec3) {
        self.world_position = position;
    }

    pub fn is_template(&self) -> bool {
        self.is_template
    }

    pub fn datasource(&self) -> Option<Arc<Mutex<Datasource>>> {
        match &self.payload {
            ModulePayload::Datasource(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn instrument(&self) -> Option<&Instrument> {
        match &self.payload {
            ModulePayload::Instrument(instrument) => Some(instrument),
            _ => None,
        }
    }

    pub fn instrument_mut(&mut self) -> Option<&mut Instrument> {
        match &mut self.payload {
            ModulePayload::Instrument(instrument) => Some(instrument),
            _ => None,
        }
    }
}
