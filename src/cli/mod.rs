use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "generest")]
#[command(about = "Generative music playground wiring public sensor APIs to synthesizers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all modules with their kind and position
    List,
    /// Show the connection graph and the pending selection
    Graph,
    /// Clone a menu template into the scene
    Clone {
        /// Template module id (0 datasource, 1 trigger, 2 instrument)
        template_id: u32,
        x: f32,
        y: f32,
        z: f32,
    },
    /// Move a spawned module to a new world position
    Move { id: u32, x: f32, y: f32, z: f32 },
    /// Click a module: a datasource first, then an instrument, to connect them
    Click { id: u32 },
    /// Remove a connection (stops and clears the target instrument)
    Disconnect { connection_id: u32 },
    /// Set an instrument's scale (Dminor, Dpenta, Fmajor)
    Scale { id: u32, name: String },
    /// Set an instrument's sequence tempo as a subdivision (2n..64n)
    Tempo { id: u32, subdivision: String },
    /// Set an instrument's note duration as a subdivision (2n..64n)
    Duration { id: u32, subdivision: String },
    /// Set a numeric instrument parameter
    /// (octave, octave_range, sequence_length, distortion_level, reverb_decay)
    Set { id: u32, param: String, value: f32 },
    /// Get a numeric instrument parameter
    Get { id: u32, param: String },
    /// Connect or disconnect an effect (distortion, reverb) on an instrument
    Effect { id: u32, kind: String, enabled: bool },
    /// Select the sensor entity queried by a datasource
    Entity { id: u32, entity: String },
    /// Select the data variable on a datasource
    Variable { id: u32, variable: String },
    /// Fetch a full day of sensor data into a datasource (defaults to yesterday)
    Fetch { id: u32, date: Option<NaiveDate> },
    /// List the data variables the metadata service reports
    Variables,
    /// List the sensors that report a variable
    Sensors { variable: String },
    /// Start the transport and all instrument sequences
    Play,
    /// Stop the transport and all instrument sequences
    Stop,
    /// Run interactive mode for dynamic control
    Interactive,
}
