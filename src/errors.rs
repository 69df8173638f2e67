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

use std::fmt;
use std::path::Path;

use crate::graph::{ConnectionId, ModuleId};
use crate::ingest::IngestError;
use crate::modules::ModuleKind;
use crate::parameters::ParameterError;

/// Crate-wide error type
#[derive(Debug, Clone)]
pub enum GenerestError {
    /// A module id does not exist in the graph
    ModuleNotFound { id: ModuleId },

    /// A connection id does not exist in the graph
    ConnectionNotFound { id: ConnectionId },

    /// A connection was attempted outside the datasource -> instrument rule
    TopologyViolation {
        from: ModuleKind,
        to: ModuleKind,
    },

    /// A menu template was used where only spawned instances are allowed
    TemplateViolation { id: ModuleId },

    /// A clone was requested from a module that is not a menu template
    NotATemplate { id: ModuleId },

    /// A scale name that the instrument does not know
    UnknownScale { name: String },

    /// Instrument parameter error
    Parameter { error: ParameterError },

    /// Sensor data ingestion error
    Ingest { error: IngestError },

    /// Settings file could not be read or parsed
    Config { path: String, reason: String },

    /// Internal error (unexpected state)
    Internal { message: String },
}

impl fmt::Display for GenerestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerestError::ModuleNotFound { id } => {
                write!(f, "Module not found: {}", id)
            }
            GenerestError::ConnectionNotFound { id } => {
                write!(f, "Connection not found: {}", id)
            }
            GenerestError::TopologyViolation { from, to } => {
                write!(
                    f,
                    "Invalid connection {} -> {}: connections run datasource -> instrument",
                    from, to
                )
            }
            GenerestError::TemplateViolation { id } => {
                write!(
                    f,
                    "Module {} is a menu template; templates are never moved, connected, or removed",
                    id
                )
            }
            GenerestError::NotATemplate { id } => {
                write!(f, "Module {} is not a menu template; only templates can be cloned", id)
            }
            GenerestError::UnknownScale { name } => {
                write!(f, "Unknown scale: {}", name)
            }
            GenerestError::Parameter { error } => {
                write!(f, "Parameter error: {}", error)
            }
            GenerestError::Ingest { error } => {
                write!(f, "Ingestion error: {}", error)
            }
            GenerestError::Config { path, reason } => {
                write!(f, "Config error in {}: {}", path, reason)
            }
            GenerestError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for GenerestError {}

impl From<ParameterError> for GenerestError {
    fn from(error: ParameterError) -> Self {
        GenerestError::Parameter { error }
    }
}

impl From<IngestError> for GenerestError {
    fn from(error: IngestError) -> Self {
        GenerestError::Ingest { error }
    }
}

/// Helpers for the most common constructions
impl GenerestError {
    pub fn module_not_found(id: ModuleId) -> Self {
        GenerestError::ModuleNotFound { id }
    }

    pub fn connection_not_found(id: ConnectionId) -> Self {
        GenerestError::ConnectionNotFound { id }
    }

    pub fn topology_violation(from: ModuleKind, to: ModuleKind) -> Self {
        GenerestError::TopologyViolation { from, to }
    }

    pub fn template_violation(id: ModuleId) -> Self {
        GenerestError::TemplateViolation { id }
    }

    pub fn not_a_template(id: ModuleId) -> Self {
        GenerestError::NotATemplate { id }
    }

    pub fn config(path: &Path, reason: String) -> Self {
        GenerestError::Config {
            path: path.display().to_string(),
            reason,
        }
    }

    pub fn internal(message: &str) -> Self {
        GenerestError::Internal {
            message: message.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type GenerestResult<T> = Result<T, GenerestError>;
