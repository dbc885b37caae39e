//! Terminal front end: `fallwatch stream`, history queries and settings.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    time,
};

use crate::{
    alerts::AlertNotice,
    api::{CollaboratorService, HttpCollaborator},
    models::{AlertOutcome, Position},
    sensing::NoSensors,
    session::{SessionController, SessionOptions},
    settings::SettingsStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "fallwatch",
    version,
    about = "Streams motion samples to a fall-detection service and handles alert confirmation",
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a streaming session. Type `ok`, `help`, `fall` or `quit` on stdin.
    Stream {
        /// Inject a synthetic impact on every tick until `fall` is typed again.
        #[arg(long, default_value_t = false)]
        simulate_fall: bool,

        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List recent alerts.
    Alerts,
    /// List recent events.
    Events,
    /// Check that the service is reachable.
    Health,
    /// Show or change persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    /// Set the service base URL, e.g. http://localhost:8081/api
    SetApi { url: String },
    /// Send fixed coordinates instead of the device position.
    SetLocation {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    ClearLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdinCommand {
    Okay,
    Help,
    ToggleFall,
    Quit,
}

fn parse_stdin_command(line: &str) -> Option<StdinCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "ok" | "okay" | "y" => Some(StdinCommand::Okay),
        "help" | "n" => Some(StdinCommand::Help),
        "fall" => Some(StdinCommand::ToggleFall),
        "quit" | "q" | "exit" => Some(StdinCommand::Quit),
        _ => None,
    }
}

pub async fn dispatch(cli: Cli, settings: SettingsStore) -> Result<()> {
    match cli.command {
        Commands::Config { action } => run_config(action, &settings),
        Commands::Stream {
            simulate_fall,
            seconds,
        } => {
            let options = SessionOptions {
                location_override: settings.settings().location_override,
                ..SessionOptions::default()
            };
            run_stream(collaborator(&settings)?, options, simulate_fall, seconds).await
        }
        Commands::Alerts => print_alerts(collaborator(&settings)?.as_ref()).await,
        Commands::Events => print_events(collaborator(&settings)?.as_ref()).await,
        Commands::Health => {
            let api = collaborator(&settings)?;
            let healthy = api.health().await?;
            println!(
                "{} {}",
                api.base_url(),
                if healthy { "ok" } else { "unhealthy" }
            );
            Ok(())
        }
    }
}

fn collaborator(settings: &SettingsStore) -> Result<Arc<HttpCollaborator>> {
    Ok(Arc::new(HttpCollaborator::new(
        &settings.effective_api_base(),
    )?))
}

fn run_config(action: ConfigAction, settings: &SettingsStore) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let current = settings.settings();
            println!("settings file: {}", settings.path().display());
            println!("api_base:      {}", current.api_base);
            println!("effective:     {}", settings.effective_api_base());
            match current.location_override {
                Some(p) => println!("location:      {:.5}, {:.5}", p.lat, p.lng),
                None => println!("location:      device"),
            }
        }
        ConfigAction::SetApi { url } => {
            settings.set_api_base(&url)?;
            println!("api_base set to {}", settings.settings().api_base);
        }
        ConfigAction::SetLocation { lat, lng } => {
            settings.set_location_override(Some(Position { lat, lng }))?;
            println!("location override set to {lat:.5}, {lng:.5}");
        }
        ConfigAction::ClearLocation => {
            settings.set_location_override(None)?;
            println!("location override cleared");
        }
    }
    Ok(())
}

async fn run_stream(
    api: Arc<HttpCollaborator>,
    options: SessionOptions,
    simulate_fall: bool,
    seconds: Option<u64>,
) -> Result<()> {
    let sessions = SessionController::new(api, Arc::new(NoSensors), options);
    let snapshot = sessions.start(simulate_fall).await?;
    let mut notices = sessions.subscribe_alerts().await?;
    let mut fall_on = simulate_fall;

    println!(
        "streaming session {} (type ok, help, fall or quit)",
        snapshot.session_id.unwrap_or_default()
    );

    let deadline = time::sleep(Duration::from_secs(seconds.unwrap_or(0)));
    tokio::pin!(deadline);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut deadline, if seconds.is_some() => break,
            _ = tokio::signal::ctrl_c() => break,
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(&notice),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("dropped {skipped} alert notices");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    stdin_open = false;
                    continue;
                };
                match parse_stdin_command(&line) {
                    Some(command @ (StdinCommand::Okay | StdinCommand::Help)) => {
                        if !sessions.respond(command == StdinCommand::Okay).await? {
                            println!("no alert awaiting confirmation");
                        }
                    }
                    Some(StdinCommand::ToggleFall) => {
                        fall_on = !fall_on;
                        sessions.set_simulate_fall(fall_on).await?;
                        println!("fall simulation {}", if fall_on { "on" } else { "off" });
                    }
                    Some(StdinCommand::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command '{}'", line.trim()),
                }
            }
        }
    }

    let final_snapshot = sessions.snapshot().await;
    sessions.stop().await?;
    println!("stopped after {} ticks", final_snapshot.ticks);
    Ok(())
}

fn print_notice(notice: &AlertNotice) {
    match notice {
        AlertNotice::Scheduled { alert_id, delay_ms } => {
            println!("alert {alert_id} pending, prompt in {delay_ms} ms");
        }
        AlertNotice::Surfaced {
            alert,
            remaining_secs,
        } => {
            println!(
                "possible fall detected (alert {}). Are you okay? {remaining_secs}s to answer [ok/help]",
                alert.alert_id
            );
        }
        AlertNotice::Preempted { alert_id, by } => {
            println!("alert {alert_id} replaced by {by}");
        }
        AlertNotice::Countdown {
            alert_id,
            remaining_secs,
        } => {
            if *remaining_secs > 0 && remaining_secs % 5 == 0 {
                println!("alert {alert_id}: {remaining_secs}s left");
            }
        }
        AlertNotice::Resolved { alert_id, outcome } => {
            let label = match outcome {
                AlertOutcome::Okay => "confirmed okay",
                AlertOutcome::HelpRequested => "help requested",
                AlertOutcome::Expired => "no answer, help requested",
            };
            println!("alert {alert_id}: {label}");
        }
        AlertNotice::Stopped => println!("alerts stopped"),
    }
}

fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn format_position(lat: Option<f64>, lng: Option<f64>) -> String {
    match (lat, lng) {
        (Some(lat), Some(lng)) => format!("{lat:.5}, {lng:.5}"),
        _ => "-".to_string(),
    }
}

async fn print_alerts(api: &dyn CollaboratorService) -> Result<()> {
    let alerts = api.recent_alerts().await?;
    if alerts.is_empty() {
        println!("no alerts");
    }
    for alert in alerts {
        println!(
            "{}  {:<24}  {}",
            format_timestamp(alert.timestamp),
            alert.reason.as_deref().unwrap_or("-"),
            format_position(alert.lat, alert.lng)
        );
    }
    Ok(())
}

async fn print_events(api: &dyn CollaboratorService) -> Result<()> {
    let events = api.recent_events().await?;
    if events.is_empty() {
        println!("no events");
    }
    for event in events {
        println!(
            "{}  |a|={:>6.2}  {:<16}  {}",
            format_timestamp(event.timestamp),
            event.accel_magnitude(),
            event.context.as_deref().unwrap_or("-"),
            format_position(event.lat, event.lng)
        );
    }
    Ok(())
}
