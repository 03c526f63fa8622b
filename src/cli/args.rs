//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::capture::CaptureOptions;
use crate::domain::recording::Duration;

/// voicecap - record the microphone in a negotiated encoding
#[derive(Parser, Debug)]
#[command(name = "voicecap")]
#[command(version)]
#[command(about = "Capture microphone audio with format negotiation and clean device release")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one session from the default microphone
    Record {
        /// Stop automatically after this long (e.g., 500ms, 10s, 1m)
        #[arg(short = 'd', long, value_name = "TIME")]
        duration: Option<String>,

        /// Fragment interval handed to the encoder
        #[arg(long, value_name = "TIME")]
        timeslice: Option<String>,

        /// Write the recording to this file
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Use a synthetic device instead of the microphone
        #[arg(long)]
        simulate: bool,
    },
    /// Show which audio formats can be recorded
    Formats {
        /// Query the synthetic device instead of the microphone
        #[arg(long)]
        simulate: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed record options
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Unbounded when None; the session then ends on Enter or Ctrl-C
    pub duration: Option<Duration>,
    pub timeslice: Duration,
    pub capture: CaptureOptions,
    pub output: Option<PathBuf>,
    pub simulate: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "timeslice",
    "duration",
    "echo_cancellation",
    "noise_suppression",
    "auto_gain_control",
    "log_level",
];

/// Valid log level values
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_record_defaults() {
        let cli = Cli::parse_from(["voicecap", "record"]);
        assert!(!cli.verbose);
        match cli.command {
            Commands::Record {
                duration,
                output,
                simulate,
                ..
            } => {
                assert!(duration.is_none());
                assert!(output.is_none());
                assert!(!simulate);
            }
            other => panic!("Expected Record command, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_record_flags() {
        let cli = Cli::parse_from([
            "voicecap",
            "record",
            "-d",
            "30s",
            "--timeslice",
            "250ms",
            "-o",
            "out.webm",
            "--simulate",
        ]);
        if let Commands::Record {
            duration,
            timeslice,
            output,
            simulate,
        } = cli.command
        {
            assert_eq!(duration, Some("30s".to_string()));
            assert_eq!(timeslice, Some("250ms".to_string()));
            assert_eq!(output, Some(PathBuf::from("out.webm")));
            assert!(simulate);
        } else {
            panic!("Expected Record command");
        }
    }

    #[test]
    fn cli_parses_verbose_after_subcommand() {
        let cli = Cli::parse_from(["voicecap", "formats", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Formats { simulate: false }));
    }

    #[test]
    fn cli_parses_config_init() {
        let cli = Cli::parse_from(["voicecap", "config", "init"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init
            }
        ));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["voicecap", "config", "set", "timeslice", "200ms"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "timeslice");
            assert_eq!(value, "200ms");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["voicecap"]).is_err());
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("timeslice"));
        assert!(is_valid_config_key("noise_suppression"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
