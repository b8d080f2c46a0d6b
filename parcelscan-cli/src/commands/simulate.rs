use super::{config, read_input};
use anyhow::{Context, Result};
use colored::*;
use parcelscan_core::sim::{RecordingSink, RecordingTarget, Scenario};
use parcelscan_core::{
    BackendKind, CarrierMatch, NotificationKind, ScannerConfig, ScannerController, ScannerEvent,
    ScannerState, StartOutcome,
};
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{info, warn};

/// How a simulated session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// A code was accepted
    Accepted,
    /// The session could not start
    Failed,
    /// Nothing was accepted before the scenario timeout
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Everything observed during one simulated session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub backend: Option<BackendKind>,
    pub accepted: Option<CarrierMatch>,
    pub error: Option<String>,
    pub states: Vec<ScannerState>,
    pub notifications: Vec<Notification>,
    pub frames_served: u64,
    pub camera_opens: usize,
    pub tracks_stopped: usize,
}

/// Run one controller session over the platform described by `scenario`
pub async fn run_scenario(scenario: &Scenario, config: ScannerConfig) -> SessionReport {
    let env = scenario.build(&config);
    let sink = RecordingSink::new();
    let target = RecordingTarget::new();
    let controller = ScannerController::builder(
        Arc::new(env.camera.clone()),
        Arc::new(sink.clone()),
        Arc::new(target.clone()),
    )
    .config(config)
    .platform(env.platform)
    .build();
    let mut events = controller.subscribe();

    let mut backend = None;
    let mut accepted = None;
    let mut error = None;
    let mut states = Vec::new();

    let outcome = match controller.start().await {
        Ok(StartOutcome::Started(kind)) => {
            backend = Some(kind);
            let finished = tokio::time::timeout(Duration::from_millis(scenario.timeout_ms), async {
                loop {
                    match events.recv().await {
                        Ok(ScannerEvent::StateChanged(state)) => {
                            states.push(state);
                            if state == ScannerState::Idle {
                                break;
                            }
                        }
                        Ok(ScannerEvent::Accepted(m)) => accepted = Some(m),
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    }
                }
            })
            .await;

            if finished.is_err() {
                warn!("No code accepted within {} ms", scenario.timeout_ms);
                controller.stop().await;
            }
            if accepted.is_some() {
                SessionOutcome::Accepted
            } else {
                SessionOutcome::TimedOut
            }
        }
        Ok(_) => SessionOutcome::Failed,
        Err(err) => {
            error = Some(err.to_string());
            SessionOutcome::Failed
        }
    };

    loop {
        match events.try_recv() {
            Ok(ScannerEvent::StateChanged(state)) => states.push(state),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    let log = env.camera.log();
    SessionReport {
        outcome,
        backend,
        accepted,
        error,
        states,
        notifications: sink
            .messages()
            .into_iter()
            .map(|(message, kind)| Notification { kind, message })
            .collect(),
        frames_served: env.camera.frames_served(),
        camera_opens: log.opens,
        tracks_stopped: log.track_stops,
    }
}

pub fn execute(script: &str, config_path: Option<&str>, output: Option<&str>) -> Result<()> {
    info!("Running scenario: {}", script);

    let text = read_input(script)?;
    let scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scenario: {}", script))?;
    let config = config::load(config_path)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start async runtime")?;
    let report = runtime.block_on(run_scenario(&scenario, config));

    print_report(&report);

    if let Some(output_path) = output {
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "Failed to serialize session report")?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed to write output file: {}", output_path))?;
        info!("Wrote report to {}", output_path);
    }

    Ok(())
}

fn print_report(report: &SessionReport) {
    println!("\n=== Session ===");
    match report.backend {
        Some(kind) => println!("Backend:        {}", kind),
        None => println!("Backend:        none"),
    }
    println!("Frames served:  {}", report.frames_served);
    println!("Camera opens:   {}", report.camera_opens);
    println!("Tracks stopped: {}", report.tracks_stopped);

    if !report.notifications.is_empty() {
        println!("\n=== Notifications ===");
        for n in &report.notifications {
            let kind = match n.kind {
                NotificationKind::Success => n.kind.to_string().green(),
                NotificationKind::Warning => n.kind.to_string().yellow(),
                NotificationKind::Error => n.kind.to_string().red(),
            };
            println!("[{}] {}", kind, n.message);
        }
    }

    println!();
    match (&report.outcome, &report.accepted) {
        (SessionOutcome::Accepted, Some(m)) => println!(
            "{} {} ({})",
            "✓".green(),
            m.tracking_code,
            m.carrier.name
        ),
        (SessionOutcome::Failed, _) => println!(
            "{} Session failed: {}",
            "✗".red(),
            report.error.as_deref().unwrap_or("not started")
        ),
        _ => println!("{} No code accepted", "✗".yellow()),
    }
}
