//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS, VALID_LOG_LEVELS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    // Validate value based on key type
    validate_config_value(key, value)?;

    // Load existing config
    let mut config = store.load().await?;

    // Update the appropriate field
    match key {
        "timeslice" => config.timeslice = Some(value.to_string()),
        "duration" => config.duration = Some(value.to_string()),
        "echo_cancellation" => config.echo_cancellation = Some(bool_value(key, value)?),
        "noise_suppression" => config.noise_suppression = Some(bool_value(key, value)?),
        "auto_gain_control" => config.auto_gain_control = Some(bool_value(key, value)?),
        "log_level" => config.log_level = Some(value.to_lowercase()),
        _ => unreachable!(), // Already validated
    }

    // Save config
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &config_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

const NOT_SET: &str = "(not set)";

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

/// Current value of a validated key, rendered for display
fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "timeslice" => config.timeslice.clone(),
        "duration" => config.duration.clone(),
        "echo_cancellation" => config.echo_cancellation.map(|b| b.to_string()),
        "noise_suppression" => config.noise_suppression.map(|b| b.to_string()),
        "auto_gain_control" => config.auto_gain_control.map(|b| b.to_string()),
        "log_level" => config.log_level.clone(),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "timeslice" | "duration" => {
            value
                .parse::<Duration>()
                .map_err(|e| ConfigError::ValidationError {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
        }
        "echo_cancellation" | "noise_suppression" | "auto_gain_control" => {
            bool_value(key, value)?;
        }
        "log_level" => {
            let lower = value.to_lowercase();
            if !VALID_LOG_LEVELS.contains(&lower.as_str()) {
                return Err(ConfigError::ValidationError {
                    key: key.to_string(),
                    message: format!(
                        "Invalid value '{}'. Valid options: {}",
                        value,
                        VALID_LOG_LEVELS.join(", ")
                    ),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

fn bool_value(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    })
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::XdgConfigStore;

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("false"), Ok(false));
        assert_eq!(parse_bool("yes"), Ok(true));
        assert_eq!(parse_bool("no"), Ok(false));
        assert_eq!(parse_bool("1"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("invalid").is_err());
    }

    #[test]
    fn validate_timeslice_valid() {
        assert!(validate_config_value("timeslice", "100ms").is_ok());
        assert!(validate_config_value("timeslice", "1s").is_ok());
    }

    #[test]
    fn validate_timeslice_invalid() {
        assert!(validate_config_value("timeslice", "fast").is_err());
        assert!(validate_config_value("timeslice", "0ms").is_err());
    }

    #[test]
    fn validate_duration_valid() {
        assert!(validate_config_value("duration", "30s").is_ok());
        assert!(validate_config_value("duration", "2m30s").is_ok());
    }

    #[test]
    fn validate_log_level() {
        assert!(validate_config_value("log_level", "DEBUG").is_ok());
        assert!(validate_config_value("log_level", "loud").is_err());
    }

    #[test]
    fn validate_processing_flags() {
        assert!(validate_config_value("noise_suppression", "no").is_ok());
        assert!(validate_config_value("auto_gain_control", "maybe").is_err());
    }

    #[test]
    fn config_value_renders_flags() {
        let config = AppConfig {
            echo_cancellation: Some(false),
            ..Default::default()
        };
        assert_eq!(
            config_value(&config, "echo_cancellation"),
            Some("false".to_string())
        );
        assert_eq!(config_value(&config, "timeslice"), None);
    }

    #[tokio::test]
    async fn set_persists_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        handle_config_command(
            ConfigAction::Set {
                key: "noise_suppression".to_string(),
                value: "off".to_string(),
            },
            &store,
            &presenter,
        )
        .await
        .unwrap_err();

        handle_config_command(
            ConfigAction::Set {
                key: "noise_suppression".to_string(),
                value: "no".to_string(),
            },
            &store,
            &presenter,
        )
        .await
        .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.noise_suppression, Some(false));
    }

    #[tokio::test]
    async fn set_rejects_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));

        let err = handle_config_command(
            ConfigAction::Set {
                key: "api_key".to_string(),
                value: "x".to_string(),
            },
            &store,
            &Presenter::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConfigError::ValidationError { .. }));
        assert!(!store.exists());
    }
}
