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

//! The interaction session: owns the module graph, the single global
//! pending-connection slot, and the transport handle. User gestures
//! (clone, drag, click) arrive here as plain method calls.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::errors::{GenerestError, GenerestResult};
use crate::graph::{Connection, ConnectionId, ModuleGraph, ModuleId};
use crate::ingest::{DateWindow, SeriesFetcher};
use crate::modules::{Datasource, Instrument, Module, ModuleKind, ModulePayload, Vec3};
use crate::playback::{PlaybackFactory, Transport};

/// What a click on a module did to the interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A datasource was selected and now awaits an instrument click.
    Pending(ModuleId),
    /// A connection was formed and the pending slot went back to idle.
    Connected {
        connection: ConnectionId,
        from: ModuleId,
        to: ModuleId,
    },
    /// The click had no topology effect.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Instrument clicked with no datasource selected.
    NoPendingSource,
    /// Menu templates are never part of a connection.
    Template,
    /// Trigger modules are reserved and not wired yet.
    TriggerReserved,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoPendingSource => write!(f, "click a datasource first"),
            IgnoreReason::Template => write!(f, "menu templates cannot be connected"),
            IgnoreReason::TriggerReserved => write!(f, "triggers are not wired yet"),
        }
    }
}

pub struct Session {
    graph: ModuleGraph,
    /// The one pending-connection slot for the whole graph.
    pending: Option<ModuleId>,
    transport: Transport,
    playback: Arc<dyn PlaybackFactory>,
    fetcher: Arc<dyn SeriesFetcher>,
    templates: [ModuleId; 3],
}

impl Session {
    /// Create a session seeded with the three permanent menu templates,
    /// one per module kind.
    pub fn new(
        settings: &Settings,
        transport: Transport,
        playback: Arc<dyn PlaybackFactory>,
        fetcher: Arc<dyn SeriesFetcher>,
    ) -> Self {
        let mut graph = ModuleGraph::new();

        let mut datasource = Datasource::new(settings.api.source_url(), &settings.api.default_entity);
        if !settings.api.default_variable.is_empty() {
            datasource.set_variable(&settings.api.default_variable);
        }
        let datasource_template = Module::template(
            ModuleKind::Datasource,
            Vec3::new(-3.0, 6.0, 0.0),
            ModulePayload::Datasource(Arc::new(Mutex::new(datasource))),
        );
        let trigger_template =
            Module::template(ModuleKind::Trigger, Vec3::new(0.0, 6.0, 0.0), ModulePayload::None);
        let instrument_template = Module::template(
            ModuleKind::Instrument,
            Vec3::new(3.0, 6.0, 0.0),
            ModulePayload::Instrument(Instrument::new(playback.build())),
        );

        let templates = [
            graph.add_module(datasource_template),
            graph.add_module(trigger_template),
            graph.add_module(instrument_template),
        ];
        debug!("menu templates created");

        Self {
            graph,
            pending: None,
            transport,
            playback,
            fetcher,
            templates,
        }
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModuleGraph {
        &mut self.graph
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn template_ids(&self) -> [ModuleId; 3] {
        self.templates
    }

    pub fn pending(&self) -> Option<ModuleId> {
        self.pending
    }

    /// Spawn a live instance of a menu template at `position` (dragging
    /// a template out of the menu).
    pub fn clone_from_template(&mut self, template: ModuleId, position: Vec3) -> GenerestResult<ModuleId> {
        let template_module = self
            .graph
            .module(template)
            .ok_or_else(|| GenerestError::module_not_found(template))?;
        if !template_module.is_template() {
            return Err(GenerestError::not_a_template(template));
        }
        let module = template_module.clone_at(position, self.playback.as_ref());
        let id = self.graph.add_module(module);
        info!(%template, %id, "template cloned into the scene");
        Ok(id)
    }

    /// Drag update: move a spawned module in scene space.
    pub fn move_module(&mut self, id: ModuleId, position: Vec3) -> GenerestResult<()> {
        let module = self
            .graph
            .module_mut(id)
            .ok_or_else(|| GenerestError::module_not_found(id))?;
        if module.is_template() {
            return Err(GenerestError::template_violation(id));
        }
        module.set_world_position(position);
        Ok(())
    }

    /// A left click on a module. Datasource clicks arm (or re-arm) the
    /// pending slot; an instrument click while armed forms the
    /// connection and starts playback; everything else is ignored.
    pub fn click(&mut self, id: ModuleId) -> GenerestResult<ClickOutcome> {
        let module = self
            .graph
            .module(id)
            .ok_or_else(|| GenerestError::module_not_found(id))?;

        if module.is_template() {
            debug!(%id, "ignoring click on menu template");
            return Ok(ClickOutcome::Ignored(IgnoreReason::Template));
        }

        match module.kind() {
            ModuleKind::Datasource => {
                if let Some(previous) = self.pending.replace(id) {
                    debug!(%previous, %id, "pending datasource replaced");
                } else {
                    debug!(%id, "datasource selected for connection");
                }
                Ok(ClickOutcome::Pending(id))
            }
            ModuleKind::Instrument => match self.pending {
                Some(from) => {
                    let connection = self.connect(from, id)?;
                    self.pending = None;
                    Ok(ClickOutcome::Connected {
                        connection,
                        from,
                        to: id,
                    })
                }
                None => {
                    debug!(%id, "instrument clicked with nothing pending");
                    Ok(ClickOutcome::Ignored(IgnoreReason::NoPendingSource))
                }
            },
            ModuleKind::Trigger => Ok(ClickOutcome::Ignored(IgnoreReason::TriggerReserved)),
        }
    }

    /// Form the connection and sonify: pull the datasource's series,
    /// derive the instrument's sequence from it, and start playback.
    fn connect(&mut self, from: ModuleId, to: ModuleId) -> GenerestResult<ConnectionId> {
        let connection = self.graph.add_connection(Connection { from, to })?;

        let data = match self.graph.module(from).and_then(Module::datasource) {
            Some(handle) => handle
                .lock()
                .map(|datasource| datasource.number_array().to_vec())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        match self.graph.module_mut(to).and_then(Module::instrument_mut) {
            Some(instrument) => {
                instrument.feed_data(data);
                instrument.play();
            }
            None => warn!(%to, "connected instrument module has no payload"),
        }

        info!(%from, %to, %connection, "datasource connected to instrument");
        Ok(connection)
    }

    /// Dismiss a connection; the target instrument is silenced as part
    /// of the removal.
    pub fn remove_connection(&mut self, id: ConnectionId) -> GenerestResult<()> {
        self.graph.remove_connection(id)
    }

    /// Borrow a spawned instrument's sequencer state.
    pub fn instrument_mut(&mut self, id: ModuleId) -> GenerestResult<&mut Instrument> {
        self.graph
            .module_mut(id)
            .ok_or_else(|| GenerestError::module_not_found(id))?
            .instrument_mut()
            .ok_or_else(|| GenerestError::internal("module is not an instrument"))
    }

    /// Borrow a datasource handle (shared with any clones).
    pub fn datasource(&self, id: ModuleId) -> GenerestResult<Arc<Mutex<Datasource>>> {
        self.graph
            .module(id)
            .ok_or_else(|| GenerestError::module_not_found(id))?
            .datasource()
            .ok_or_else(|| GenerestError::internal("module is not a datasource"))
    }

    /// Start the shared transport and every spawned instrument sequence.
    pub fn start_all(&mut self) {
        self.transport.start();
        for (_, module) in self.graph.modules_mut() {
            if module.is_template() {
                continue;
            }
            if let Some(instrument) = module.instrument_mut() {
                instrument.play();
            }
        }
    }

    /// Stop the shared transport and every instrument sequence.
    pub fn stop_all(&mut self) {
        self.transport.stop();
        for (_, module) in self.graph.modules_mut() {
            if let Some(instrument) = module.instrument_mut() {
                instrument.stop();
            }
        }
    }

    /// Fetch a full day of data into a datasource and wait for it. The
    /// series is installed only if the selection has not changed in the
    /// meantime; returns the number of samples installed.
    pub async fn refresh_datasource(&self, id: ModuleId, date: NaiveDate) -> GenerestResult<usize> {
        let handle = self.datasource(id)?;
        let (url, entity, variable, token) = {
            let mut datasource = handle
                .lock()
                .map_err(|_| GenerestError::internal("datasource mutex poisoned"))?;
            (
                datasource.url().clone(),
                datasource.entity().to_string(),
                datasource.variable().to_string(),
                datasource.begin_request(),
            )
        };

        let window = DateWindow::full_day(date);
        let series = self
            .fetcher
            .fetch_series(&url, &entity, &variable, &window)
            .await?;

        let mut datasource = handle
            .lock()
            .map_err(|_| GenerestError::internal("datasource mutex poisoned"))?;
        if datasource.apply_fetch(token, series) {
            Ok(datasource.number_array().len())
        } else {
            Ok(0)
        }
    }

    /// Fire-and-forget variant: the graph stays interactive while the
    /// fetch is outstanding; the outcome lands in the log.
    pub fn spawn_refresh(&self, id: ModuleId, date: NaiveDate) -> GenerestResult<()> {
        let handle = self.datasource(id)?;
        let fetcher = Arc::clone(&self.fetcher);

        let (url, entity, variable, token) = {
            let mut datasource = handle
                .lock()
                .map_err(|_| GenerestError::internal("datasource mutex poisoned"))?;
            (
                datasource.url().clone(),
                datasource.entity().to_string(),
                datasource.variable().to_string(),
                datasource.begin_request(),
            )
        };

        tokio::spawn(async move {
            let window = DateWindow::full_day(date);
            match fetcher.fetch_series(&url, &entity, &variable, &window).await {
                Ok(series) => {
                    if let Ok(mut datasource) = handle.lock() {
                        if datasource.apply_fetch(token, series) {
                            info!(%entity, samples = datasource.number_array().len(), "series refreshed");
                        }
                    }
                }
                Err(error) => warn!(%entity, %error, "series fetch failed; keeping last-known data"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::ingest::{ApiUrl, FetchedSeries, IngestError};
    use crate::playback::{CallLog, PlaybackCall, RecordingPlaybackFactory};

    struct StaticFetcher {
        values: Vec<f64>,
    }

    #[async_trait]
    impl SeriesFetcher for StaticFetcher {
        async fn fetch_series(
            &self,
            _url: &ApiUrl,
            _entity: &str,
            _variable: &str,
            _window: &DateWindow,
        ) -> Result<FetchedSeries, IngestError> {
            Ok(FetchedSeries {
                raw: serde_json::json!({ "sensors": [] }),
                values: self.values.clone(),
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SeriesFetcher for FailingFetcher {
        async fn fetch_series(
            &self,
            _url: &ApiUrl,
            _entity: &str,
            _variable: &str,
            _window: &DateWindow,
        ) -> Result<FetchedSeries, IngestError> {
            Err(IngestError::Request("connection refused".to_string()))
        }
    }

    fn session_with(fetcher: Arc<dyn SeriesFetcher>) -> (Session, CallLog) {
        let log = CallLog::new();
        let session = Session::new(
            &Settings::default(),
            Transport::new(90.0),
            Arc::new(RecordingPlaybackFactory::new(log.clone())),
            fetcher,
        );
        (session, log)
    }

    fn test_session() -> (Session, CallLog) {
        session_with(Arc::new(StaticFetcher {
            values: vec![0.0, 5.0, 10.0],
        }))
    }

    #[test]
    fn test_templates_are_seeded() {
        let (session, _) = test_session();
        assert_eq!(session.graph().module_count(), 3);
        let kinds: Vec<ModuleKind> = session
            .template_ids()
            .iter()
            .map(|id| session.graph().module(*id).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![ModuleKind::Datasource, ModuleKind::Trigger, ModuleKind::Instrument]
        );
        assert!(session
            .template_ids()
            .iter()
            .all(|id| session.graph().module(*id).unwrap().is_template()));
    }

    #[test]
    fn test_click_sequence_forms_one_connection() {
        let (mut session, _) = test_session();
        let [datasource_template, _, instrument_template] = session.template_ids();

        let source = session
            .clone_from_template(datasource_template, Vec3::new(-1.0, 0.0, 0.0))
            .unwrap();
        let target = session
            .clone_from_template(instrument_template, Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(session.click(source).unwrap(), ClickOutcome::Pending(source));
        assert_eq!(session.pending(), Some(source));

        let outcome = session.click(target).unwrap();
        match outcome {
            ClickOutcome::Connected { from, to, .. } => {
                assert_eq!(from, source);
                assert_eq!(to, target);
            }
            other => panic!("expected connection, got {:?}", other),
        }

        assert_eq!(session.pending(), None);
        assert_eq!(session.graph().connection_count(), 1);
        let (_, connection) = session.graph().connections().next().unwrap();
        assert_eq!(connection.from, source);
        assert_eq!(connection.to, target);
    }

    #[test]
    fn test_connect_sonifies_and_starts_playback() {
        let (mut session, log) = test_session();
        let [datasource_template, _, instrument_template] = session.template_ids();
        let source = session.clone_from_template(datasource_template, Vec3::default()).unwrap();
        let target = session.clone_from_template(instrument_template, Vec3::default()).unwrap();

        // Hand the datasource a known series before connecting.
        {
            let handle = session.datasource(source).unwrap();
            let mut datasource = handle.lock().unwrap();
            let token = datasource.begin_request();
            datasource.apply_fetch(
                token,
                FetchedSeries {
                    raw: serde_json::json!({ "sensors": [] }),
                    values: vec![0.0, 10.0],
                },
            );
        }

        log.clear();
        session.click(source).unwrap();
        session.click(target).unwrap();

        let instrument = session.graph().module(target).unwrap().instrument().unwrap();
        assert!(instrument.is_playing());
        assert_eq!(instrument.sequence_events().len(), 16);
        assert_eq!(instrument.data_array(), &[0.0, 10.0]);
        assert_eq!(log.snapshot().last(), Some(&PlaybackCall::Start));
    }

    #[test]
    fn test_second_datasource_replaces_pending() {
        let (mut session, _) = test_session();
        let [datasource_template, _, _] = session.template_ids();
        let first = session.clone_from_template(datasource_template, Vec3::default()).unwrap();
        let second = session.clone_from_template(datasource_template, Vec3::default()).unwrap();

        session.click(first).unwrap();
        assert_eq!(session.click(second).unwrap(), ClickOutcome::Pending(second));
        assert_eq!(session.pending(), Some(second));
        assert_eq!(session.graph().connection_count(), 0);
    }

    #[test]
    fn test_instrument_click_while_idle_is_ignored() {
        let (mut session, _) = test_session();
        let [_, _, instrument_template] = session.template_ids();
        let target = session.clone_from_template(instrument_template, Vec3::default()).unwrap();

        assert_eq!(
            session.click(target).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::NoPendingSource)
        );
        assert_eq!(session.graph().connection_count(), 0);
    }

    #[test]
    fn test_template_and_trigger_clicks_are_ignored() {
        let (mut session, _) = test_session();
        let [datasource_template, trigger_template, _] = session.template_ids();

        assert_eq!(
            session.click(datasource_template).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::Template)
        );
        assert_eq!(session.pending(), None);

        let trigger = session.clone_from_template(trigger_template, Vec3::default()).unwrap();
        assert_eq!(
            session.click(trigger).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::TriggerReserved)
        );
    }

    #[test]
    fn test_clone_requires_a_template() {
        let (mut session, _) = test_session();
        let [datasource_template, _, _] = session.template_ids();
        let clone = session.clone_from_template(datasource_template, Vec3::default()).unwrap();

        // Spawned ids continue after the three templates.
        assert_eq!(clone, ModuleId(3));
        assert!(matches!(
            session.clone_from_template(clone, Vec3::default()),
            Err(GenerestError::NotATemplate { .. })
        ));
    }

    #[test]
    fn test_drag_moves_clones_but_not_templates() {
        let (mut session, _) = test_session();
        let [datasource_template, _, _] = session.template_ids();
        let clone = session.clone_from_template(datasource_template, Vec3::default()).unwrap();

        session.move_module(clone, Vec3::new(1.5, -2.0, 0.0)).unwrap();
        let module = session.graph().module(clone).unwrap();
        assert_eq!(module.world_position(), Vec3::new(1.5, -2.0, 0.0));
        assert_eq!(module.template_position(), Vec3::default());

        assert!(matches!(
            session.move_module(datasource_template, Vec3::new(1.0, 1.0, 1.0)),
            Err(GenerestError::TemplateViolation { .. })
        ));
    }

    #[test]
    fn test_remove_connection_silences_target() {
        let (mut session, _) = test_session();
        let [datasource_template, _, instrument_template] = session.template_ids();
        let source = session.clone_from_template(datasource_template, Vec3::default()).unwrap();
        let target = session.clone_from_template(instrument_template, Vec3::default()).unwrap();

        session.click(source).unwrap();
        let outcome = session.click(target).unwrap();
        let connection = match outcome {
            ClickOutcome::Connected { connection, .. } => connection,
            other => panic!("expected connection, got {:?}", other),
        };

        session.remove_connection(connection).unwrap();
        assert_eq!(session.graph().connection_count(), 0);

        let instrument = session.graph().module(target).unwrap().instrument().unwrap();
        assert!(instrument.sequence_events().is_empty());
        assert!(!instrument.is_playing());
    }

    #[test]
    fn test_transport_drives_start_and_stop_all() {
        let (mut session, _) = test_session();
        let [_, _, instrument_template] = session.template_ids();
        let target = session.clone_from_template(instrument_template, Vec3::default()).unwrap();

        session.start_all();
        assert!(session.transport().is_running());
        assert!(session.graph().module(target).unwrap().instrument().unwrap().is_playing());
        // The menu template stays silent.
        let [_, _, template_id] = session.template_ids();
        assert!(!session
            .graph()
            .module(template_id)
            .unwrap()
            .instrument()
            .unwrap()
            .is_playing());

        session.stop_all();
        assert!(!session.transport().is_running());
        assert!(!session.graph().module(target).unwrap().instrument().unwrap().is_playing());
    }

    #[tokio::test]
    async fn test_refresh_datasource_installs_series() {
        let (mut session, _) = test_session();
        let [datasource_template, _, _] = session.template_ids();
        let source = session.clone_from_template(datasource_template, Vec3::default()).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let samples = session.refresh_datasource(source, date).await.unwrap();
        assert_eq!(samples, 3);

        let handle = session.datasource(source).unwrap();
        assert_eq!(handle.lock().unwrap().number_array(), &[0.0, 5.0, 10.0]);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_known_series() {
        let (mut session, _) = session_with(Arc::new(FailingFetcher));
        let [datasource_template, _, _] = session.template_ids();
        let source = session.clone_from_template(datasource_template, Vec3::default()).unwrap();

        {
            let handle = session.datasource(source).unwrap();
            let mut datasource = handle.lock().unwrap();
            let token = datasource.begin_request();
            datasource.apply_fetch(
                token,
                FetchedSeries {
                    raw: serde_json::json!({ "sensors": [] }),
                    values: vec![7.0],
                },
            );
        }

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let result = session.refresh_datasource(source, date).await;
        assert!(matches!(result, Err(GenerestError::Ingest { .. })));

        let handle = session.datasource(source).unwrap();
        assert_eq!(handle.lock().unwrap().number_array(), &[7.0]);
    }
}
