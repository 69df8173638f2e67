use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{GenerestError, GenerestResult};
use crate::modules::{Module, ModuleKind};

/// Module identifier: a small integer, unique within the graph and
/// stable for the module's lifetime. Connections use it as a foreign key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection identifier; its own id space, same assignment rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge from a datasource module to an instrument module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: ModuleId,
    pub to: ModuleId,
}

/// Owns the two module/connection collections and their id assignment.
/// Storage is keyed by id, so ids stay decoupled from positions even if
/// entries are ever removed.
#[derive(Default)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, Module>,
    connections: BTreeMap<ConnectionId, Connection>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module under a fresh id, strictly greater than every
    /// existing one (0 when the collection is empty).
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = self
            .modules
            .keys()
            .next_back()
            .map_or(ModuleId(0), |last| ModuleId(last.0 + 1));
        self.modules.insert(id, module);
        debug!(%id, "module added");
        id
    }

    /// Replace the module stored under `id`. Unknown ids are a
    /// precondition violation and leave the collection unchanged.
    pub fn update_module(&mut self, id: ModuleId, module: Module) -> GenerestResult<()> {
        if !self.modules.contains_key(&id) {
            return Err(GenerestError::module_not_found(id));
        }
        self.modules.insert(id, module);
        Ok(())
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(&id)
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().map(|(id, module)| (*id, module))
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = (ModuleId, &mut Module)> {
        self.modules.iter_mut().map(|(id, module)| (*id, module))
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Add a connection after validating the topology rule:
    /// datasource -> instrument, templates excluded.
    pub fn add_connection(&mut self, connection: Connection) -> GenerestResult<ConnectionId> {
        self.validate_connection(&connection)?;
        let id = self
            .connections
            .keys()
            .next_back()
            .map_or(ConnectionId(0), |last| ConnectionId(last.0 + 1));
        self.connections.insert(id, connection);
        debug!(%id, from = %connection.from, to = %connection.to, "connection added");
        Ok(id)
    }

    /// Replace the connection stored under `id`, re-validating it.
    pub fn update_connection(&mut self, id: ConnectionId, connection: Connection) -> GenerestResult<()> {
        if !self.connections.contains_key(&id) {
            return Err(GenerestError::connection_not_found(id));
        }
        self.validate_connection(&connection)?;
        self.connections.insert(id, connection);
        Ok(())
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter().map(|(id, connection)| (*id, connection))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Remove a connection. The target instrument is stopped and cleared
    /// first, so a destroyed connection never leaves stale audio scheduled.
    pub fn remove_connection(&mut self, id: ConnectionId) -> GenerestResult<()> {
        let connection = self
            .connections
            .get(&id)
            .copied()
            .ok_or_else(|| GenerestError::connection_not_found(id))?;

        match self.modules.get_mut(&connection.to).and_then(Module::instrument_mut) {
            Some(instrument) => instrument.clear(),
            None => warn!(to = %connection.to, "removed connection had no target instrument"),
        }

        self.connections.remove(&id);
        debug!(%id, "connection removed");
        Ok(())
    }

    fn validate_connection(&self, connection: &Connection) -> GenerestResult<()> {
        let from = self
            .modules
            .get(&connection.from)
            .ok_or_else(|| GenerestError::module_not_found(connection.from))?;
        let to = self
            .modules
            .get(&connection.to)
            .ok_or_else(|| GenerestError::module_not_found(connection.to))?;

        if from.is_template() {
            return Err(GenerestError::template_violation(connection.from));
        }
        if to.is_template() {
            return Err(GenerestError::template_violation(connection.to));
        }
        if from.kind() != ModuleKind::Datasource || to.kind() != ModuleKind::Instrument {
            return Err(GenerestError::topology_violation(from.kind(), to.kind()));
        }
        Ok(())
    }
}
