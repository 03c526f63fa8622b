//! voicecap CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use voicecap::application::ports::ConfigStore;
use voicecap::cli::{
    app::{init_logging, merge_config, run_formats, run_record, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
    RecordOptions,
};
use voicecap::domain::config::AppConfig;
use voicecap::domain::recording::Duration;
use voicecap::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let presenter = Presenter::new();
    let store = XdgConfigStore::new();

    // Load the file before logging is up, report problems after
    let (file_config, load_error) = match store.load().await {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::empty(), Some(e)),
    };

    let cli_config = match &cli.command {
        Commands::Record {
            duration,
            timeslice,
            ..
        } => AppConfig {
            duration: duration.clone(),
            timeslice: timeslice.clone(),
            ..Default::default()
        },
        _ => AppConfig::empty(),
    };
    let config = merge_config(file_config, cli_config);
    init_logging(&config, cli.verbose);

    // Config commands surface a broken file themselves
    if let (Some(e), false) = (&load_error, matches!(cli.command, Commands::Config { .. })) {
        warn!(path = %store.path().display(), error = %e, "Ignoring config file");
    }

    match cli.command {
        Commands::Config { action } => {
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Formats { simulate } => run_formats(simulate).await,
        Commands::Record {
            output, simulate, ..
        } => {
            // Parse durations
            let duration = match config.duration.as_deref().map(str::parse::<Duration>) {
                None => None,
                Some(Ok(d)) => Some(d),
                Some(Err(e)) => {
                    presenter.error(&format!("Invalid duration: {}", e));
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            };
            let timeslice = match config.timeslice.as_deref().map(str::parse::<Duration>) {
                None => Duration::default_timeslice(),
                Some(Ok(t)) => t,
                Some(Err(e)) => {
                    presenter.error(&format!("Invalid timeslice: {}", e));
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            };

            let options = RecordOptions {
                duration,
                timeslice,
                capture: config.capture_options(),
                output,
                simulate,
            };

            run_record(options).await
        }
    }
}
