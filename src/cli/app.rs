//! Main app runners for the record and formats commands

use std::env;
use std::process::ExitCode;
use std::time::Duration as StdDuration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::application::ports::CaptureBackend;
use crate::application::{negotiate, probe_formats, CaptureCallbacks, SessionController};
use crate::domain::capture::{Artifact, SessionConfig};
use crate::domain::config::{AppConfig, DEFAULT_LOG_LEVEL};
use crate::domain::error::CaptureError;
use crate::domain::session::SessionState;
use crate::infrastructure::{CpalBackend, ScriptedBackend};

use super::args::RecordOptions;
use super::presenter::Presenter;
use super::signals::StopSignalHandler;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable overriding the fragment interval
pub const ENV_TIMESLICE: &str = "VOICECAP_TIMESLICE";

/// Environment variable overriding the log filter
pub const ENV_LOG: &str = "VOICECAP_LOG";

/// Size of each fragment the synthetic device emits
const SIMULATED_FRAGMENT_BYTES: usize = 1600;

/// Refresh interval of the recording spinner
const PROGRESS_TICK: StdDuration = StdDuration::from_millis(200);

/// Run one recording session
pub async fn run_record(options: RecordOptions) -> ExitCode {
    if options.simulate {
        record_with(ScriptedBackend::synthetic(SIMULATED_FRAGMENT_BYTES), options).await
    } else {
        record_with(CpalBackend::new(), options).await
    }
}

/// Print format support of the capture device
pub async fn run_formats(simulate: bool) -> ExitCode {
    if simulate {
        show_formats(&ScriptedBackend::new())
    } else {
        show_formats(&CpalBackend::new())
    }
}

async fn record_with<B: CaptureBackend>(backend: B, options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut signals = match StopSignalHandler::new() {
        Ok(signals) => signals,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // Both callbacks feed one channel; at most one of them fires
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<Result<Artifact, CaptureError>>();
    let error_tx = outcome_tx.clone();
    let callbacks = CaptureCallbacks::new()
        .on_complete(move |artifact| {
            let _ = outcome_tx.send(Ok(artifact));
        })
        .on_error(move |err| {
            let _ = error_tx.send(Err(err));
        });

    let config = SessionConfig {
        timeslice: options.timeslice,
        capture: options.capture,
    };
    let mut session = SessionController::new(backend, config, callbacks).spawn();
    let mut states = session.subscribe();
    let total_ms = options.duration.map(|d| d.as_millis());

    presenter.show_recording_progress("Waiting for microphone...");
    session.set_desired(true);

    let mut started: Option<Instant> = None;
    let mut deadline: Option<Instant> = None;
    let mut stopping = false;
    let mut progress = tokio::time::interval(PROGRESS_TICK);

    let outcome = loop {
        tokio::select! {
            biased;

            outcome = outcomes.recv() => break outcome,

            changed = states.changed() => {
                if changed.is_err() {
                    break None;
                }
                let state = *states.borrow_and_update();
                debug!(%state, "Session state changed");
                match state {
                    SessionState::Recording if started.is_none() => {
                        let now = Instant::now();
                        started = Some(now);
                        deadline = options.duration.map(|d| now + d.as_std());
                        presenter.update_spinner("Recording... (press Enter to stop)");
                    }
                    SessionState::Finalizing => presenter.update_spinner("Finishing..."),
                    // Stopped before the device was granted: no artifact
                    SessionState::Idle if stopping => break None,
                    _ => {}
                }
            }

            signal = signals.recv() => {
                if stopping {
                    // Still waiting on the device; give up on the session
                    info!(?signal, "Abandoning session");
                    break None;
                }
                info!(?signal, "Stop requested");
                stopping = true;
                session.set_desired(false);
            }

            _ = wait_for(deadline), if !stopping => {
                info!("Recording duration reached");
                stopping = true;
                session.set_desired(false);
            }

            _ = progress.tick() => {
                if let (Some(started), false) = (started, stopping) {
                    let elapsed = started.elapsed().as_millis() as u64;
                    presenter.update_recording_progress(elapsed, total_ms);
                }
            }
        }
    };

    session.teardown().await;

    match outcome {
        Some(Ok(artifact)) => finish_recording(&mut presenter, artifact, &options).await,
        Some(Err(err)) => {
            presenter.spinner_fail(&format!("Recording failed ({})", err.kind));
            presenter.error(&err.to_string());
            ExitCode::from(EXIT_ERROR)
        }
        None => {
            presenter.stop_spinner();
            presenter.warn("Stopped before the microphone was ready, nothing recorded");
            ExitCode::from(EXIT_SUCCESS)
        }
    }
}

async fn finish_recording(
    presenter: &mut Presenter,
    artifact: Artifact,
    options: &RecordOptions,
) -> ExitCode {
    presenter.spinner_success(&format!(
        "Recording complete ({})",
        artifact.human_readable_size()
    ));

    let summary = format!("{} bytes {}", artifact.size_bytes(), artifact.mime_type());

    if let Some(path) = options.output.as_ref() {
        if let Err(e) = tokio::fs::write(path, artifact.into_data()).await {
            presenter.error(&format!("Failed to write {}: {}", path.display(), e));
            return ExitCode::from(EXIT_ERROR);
        }
        presenter.info(&format!("Saved to {}", path.display()));
    }

    presenter.output(&summary);
    ExitCode::from(EXIT_SUCCESS)
}

fn show_formats<B: CaptureBackend>(backend: &B) -> ExitCode {
    let presenter = Presenter::new();

    let negotiated = match negotiate(backend) {
        Ok(format) => format,
        Err(err) => {
            presenter.error(&err.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    for support in probe_formats(backend) {
        presenter.format_row(support.format.as_str(), support.supported);
    }
    presenter.key_value("negotiated", &negotiated.to_string());
    ExitCode::from(EXIT_SUCCESS)
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Config layer read from the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        timeslice: env::var(ENV_TIMESLICE).ok().filter(|s| !s.is_empty()),
        log_level: env::var(ENV_LOG).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Merge: defaults < file < env < cli
pub fn merge_config(file_config: AppConfig, cli_config: AppConfig) -> AppConfig {
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over the configured level; `verbose` forces debug.
pub fn init_logging(config: &AppConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.log_level_or_default()))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_config_wins_over_file() {
        let file = AppConfig {
            duration: Some("10s".to_string()),
            noise_suppression: Some(false),
            ..Default::default()
        };
        let cli = AppConfig {
            duration: Some("2s".to_string()),
            ..Default::default()
        };

        let merged = merge_config(file, cli);
        assert_eq!(merged.duration, Some("2s".to_string()));
        assert_eq!(merged.noise_suppression, Some(false));
        assert_eq!(merged.echo_cancellation, Some(true));
    }

    #[test]
    fn empty_layers_keep_defaults() {
        let merged = AppConfig::defaults()
            .merge(AppConfig::empty())
            .merge(AppConfig::empty());
        assert_eq!(merged, AppConfig::defaults());
    }

    #[tokio::test]
    async fn simulated_formats_succeed() {
        assert_eq!(run_formats(true).await, ExitCode::from(EXIT_SUCCESS));
    }
}
