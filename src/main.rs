use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, Local, NaiveDate};
use clap::Parser;

use generest::cli::{Cli, Commands};
use generest::config::Settings;
use generest::graph::{ConnectionId, ModuleId};
use generest::ingest::SensorApi;
use generest::modules::Vec3;
use generest::playback::{EffectKind, NullPlaybackFactory, Subdivision, Transport};
use generest::session::{ClickOutcome, Session};
use generest::sonify;
use generest::Parameterizable;

struct Application {
    session: Session,
    api: Arc<SensorApi>,
}

impl Application {
    fn new(settings: &Settings) -> Self {
        let transport = Transport::new(settings.transport.bpm);
        let api = Arc::new(SensorApi::new(&settings.api.metadata_url));
        let session = Session::new(settings, transport, Arc::new(NullPlaybackFactory), api.clone());

        Self { session, api }
    }

    async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::List => {
                println!("Modules:");
                for (id, module) in self.session.graph().modules() {
                    let marker = if module.is_template() { " [template]" } else { "" };
                    println!(
                        "  {}: {} ({}) at {}{}",
                        id,
                        module.kind(),
                        module.kind().color(),
                        module.world_position(),
                        marker
                    );
                }
            }

            Commands::Graph => {
                if self.session.graph().connection_count() == 0 {
                    println!("No connections");
                } else {
                    println!("Connections:");
                    for (id, connection) in self.session.graph().connections() {
                        println!("  {}: {} -> {}", id, connection.from, connection.to);
                    }
                }
                if let Some(pending) = self.session.pending() {
                    println!("Pending datasource: {}", pending);
                }
            }

            Commands::Clone { template_id, x, y, z } => {
                match self
                    .session
                    .clone_from_template(ModuleId(template_id), Vec3::new(x, y, z))
                {
                    Ok(id) => println!("Cloned template {} into module {}", template_id, id),
                    Err(e) => eprintln!("Error cloning template: {}", e),
                }
            }

            Commands::Move { id, x, y, z } => {
                match self.session.move_module(ModuleId(id), Vec3::new(x, y, z)) {
                    Ok(_) => println!("Moved module {} to ({}, {}, {})", id, x, y, z),
                    Err(e) => eprintln!("Error moving module: {}", e),
                }
            }

            Commands::Click { id } => match self.session.click(ModuleId(id)) {
                Ok(ClickOutcome::Pending(id)) => {
                    println!("Selected datasource {} for connection", id)
                }
                Ok(ClickOutcome::Connected { connection, from, to }) => {
                    println!("Connected {} -> {} (connection {})", from, to, connection)
                }
                Ok(ClickOutcome::Ignored(reason)) => println!("Ignored: {}", reason),
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Disconnect { connection_id } => {
                match self.session.remove_connection(ConnectionId(connection_id)) {
                    Ok(_) => println!("Removed connection {}", connection_id),
                    Err(e) => eprintln!("Error removing connection: {}", e),
                }
            }

            Commands::Scale { id, name } => match self.session.instrument_mut(ModuleId(id)) {
                Ok(instrument) => match instrument.set_scale(&name) {
                    Ok(_) => println!("Set scale of {} to {}", id, name),
                    Err(e) => {
                        eprintln!("Error: {} (available: {})", e, sonify::scale_names().join(", "))
                    }
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Tempo { id, subdivision } => match subdivision.parse::<Subdivision>() {
                Ok(subdivision) => match self.session.instrument_mut(ModuleId(id)) {
                    Ok(instrument) => {
                        instrument.set_subdivision(subdivision);
                        println!("Set tempo of {} to {}", id, subdivision);
                    }
                    Err(e) => eprintln!("Error: {}", e),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Duration { id, subdivision } => match subdivision.parse::<Subdivision>() {
                Ok(duration) => match self.session.instrument_mut(ModuleId(id)) {
                    Ok(instrument) => {
                        instrument.set_note_duration(duration);
                        println!("Set note duration of {} to {}", id, duration);
                    }
                    Err(e) => eprintln!("Error: {}", e),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Set { id, param, value } => match self.session.instrument_mut(ModuleId(id)) {
                Ok(instrument) => match instrument.set_parameter(&param, value) {
                    Ok(_) => println!("Set {}.{} = {}", id, param, value),
                    Err(e) => eprintln!("Error setting parameter: {}", e),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Get { id, param } => match self.session.instrument_mut(ModuleId(id)) {
                Ok(instrument) => match instrument.get_parameter(&param) {
                    Ok(value) => println!("{}.{} = {}", id, param, value),
                    Err(e) => eprintln!("Error getting parameter: {}", e),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Effect { id, kind, enabled } => match kind.parse::<EffectKind>() {
                Ok(kind) => match self.session.instrument_mut(ModuleId(id)) {
                    Ok(instrument) => {
                        if enabled {
                            instrument.connect_effect(kind);
                            println!("Connected {} on {}", kind, id);
                        } else {
                            instrument.disconnect_effect(kind);
                            println!("Disconnected {} on {}", kind, id);
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Entity { id, entity } => match self.session.datasource(ModuleId(id)) {
                Ok(handle) => match handle.lock() {
                    Ok(mut datasource) => {
                        datasource.set_entity(&entity);
                        println!("Set entity of {} to {}", id, entity);
                    }
                    Err(_) => eprintln!("Error: datasource is not accessible"),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Variable { id, variable } => match self.session.datasource(ModuleId(id)) {
                Ok(handle) => match handle.lock() {
                    Ok(mut datasource) => {
                        datasource.set_variable(&variable);
                        println!("Set variable of {} to {}", id, variable);
                    }
                    Err(_) => eprintln!("Error: datasource is not accessible"),
                },
                Err(e) => eprintln!("Error: {}", e),
            },

            Commands::Fetch { id, date } => {
                let date = date.unwrap_or_else(yesterday);
                match self.session.refresh_datasource(ModuleId(id), date).await {
                    Ok(samples) => println!("Fetched {} samples into datasource {}", samples, id),
                    Err(e) => eprintln!("Error fetching data: {}", e),
                }
            }

            Commands::Variables => match self.api.list_variables().await {
                Ok(variables) => {
                    println!("Variables:");
                    for variable in variables {
                        println!("  {}", variable);
                    }
                }
                Err(e) => eprintln!("Error listing variables: {}", e),
            },

            Commands::Sensors { variable } => match self.api.list_sensors(&variable).await {
                Ok(sensors) => {
                    println!("Sensors reporting {}:", variable);
                    for sensor in sensors {
                        println!("  {}", sensor);
                    }
                }
                Err(e) => eprintln!("Error listing sensors: {}", e),
            },

            Commands::Play => {
                self.session.start_all();
                println!("Transport started");
            }

            Commands::Stop => {
                self.session.stop_all();
                println!("Transport stopped");
            }

            Commands::Interactive => {
                // handled by the caller
            }
        }
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        println!("Starting interactive mode...");
        println!("Type any command ('list', 'click 3', ...), 'help' for usage, 'exit' to quit");

        loop {
            print!("generest> ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            if std::io::stdin().read_line(&mut input).is_err() {
                break;
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            match input {
                "exit" | "quit" => break,
                "help" => {
                    let _ = Cli::try_parse_from(["generest", "--help"]).map_err(|e| println!("{}", e));
                }
                _ => {
                    let args = std::iter::once("generest").chain(input.split_whitespace());
                    match Cli::try_parse_from(args) {
                        Ok(cli) => match cli.command {
                            Commands::Interactive => println!("Already in interactive mode"),
                            // Background fetches keep the prompt responsive.
                            Commands::Fetch { id, date } => {
                                let date = date.unwrap_or_else(yesterday);
                                match self.session.spawn_refresh(ModuleId(id), date) {
                                    Ok(_) => println!("Fetching data for datasource {}...", id),
                                    Err(e) => eprintln!("Error: {}", e),
                                }
                            }
                            command => self.handle_command(command).await?,
                        },
                        Err(e) => println!("{}", e),
                    }
                }
            }
        }
        Ok(())
    }
}

fn yesterday() -> NaiveDate {
    let today = Local::now().date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = Settings::load()?;
    let cli = Cli::parse();
    let mut app = Application::new(&settings);

    match cli.command {
        Commands::Interactive => app.run_interactive().await?,
        command => app.handle_command(command).await?,
    }

    Ok(())
}
