pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod ingest;
pub mod modules;
pub mod parameters;
pub mod playback;
pub mod session;
pub mod sonify;

pub use config::Settings;
pub use errors::{GenerestError, GenerestResult};
pub use graph::{Connection, ConnectionId, ModuleGraph, ModuleId};
pub use ingest::{ApiUrl, DateWindow, FetchedSeries, IngestError, SensorApi, SeriesFetcher};
pub use modules::{Datasource, Instrument, Module, ModuleKind, ModulePayload, Vec3};
pub use parameters::{BasicParameter, ParameterDescriptor, ParameterError, Parameterizable};
pub use playback::{EffectKind, Playback, PlaybackFactory, Subdivision, Transport};
pub use session::{ClickOutcome, Session};
pub use sonify::{build_note_pool, map_data_to_notes};
