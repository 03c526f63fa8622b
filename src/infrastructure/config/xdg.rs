//! Config file under the XDG config home (`$XDG_CONFIG_HOME/voicecap/config.toml`)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

const APP_DIR: &str = "voicecap";
const FILE_NAME: &str = "config.toml";

/// TOML config store in the user's config directory
#[derive(Debug, Clone)]
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("~/.config"));
        Self::with_path(base.join(APP_DIR).join(FILE_NAME))
    }

    /// Store backed by an explicit file, used by tests
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn decode(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn encode(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    /// Sibling file the new content is written to before it replaces the config
    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("toml.tmp")
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_error(path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::WriteError(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Self::decode(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                Ok(AppConfig::empty())
            }
            Err(e) => Err(ConfigError::ReadError(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| write_error(dir, e))?;
        }

        let content = Self::encode(config)?;
        let staging = self.staging_path();
        fs::write(&staging, content)
            .await
            .map_err(|e| write_error(&staging, e))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| write_error(&self.path, e))?;

        debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> XdgConfigStore {
        XdgConfigStore::with_path(dir.path().join("voicecap").join(FILE_NAME))
    }

    #[test]
    fn default_path_is_under_app_dir() {
        let path = XdgConfigStore::new().path();
        assert!(path.ends_with("voicecap/config.toml"));
    }

    #[test]
    fn decode_flat_keys() {
        let config = XdgConfigStore::decode(
            r#"
timeslice = "250ms"
duration = "30s"
noise_suppression = false
log_level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.timeslice.as_deref(), Some("250ms"));
        assert_eq!(config.duration.as_deref(), Some("30s"));
        assert_eq!(config.noise_suppression, Some(false));
        assert_eq!(config.echo_cancellation, None);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn decode_rejects_wrong_types() {
        let err = XdgConfigStore::decode("echo_cancellation = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());
        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
    }

    #[tokio::test]
    async fn save_creates_directory_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let config = AppConfig {
            timeslice: Some("50ms".to_string()),
            auto_gain_control: Some(false),
            ..Default::default()
        };

        store.save(&config).await.unwrap();

        assert!(store.exists());
        assert!(!store.staging_path().exists());
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.init().await.unwrap();
        assert_eq!(store.load().await.unwrap(), AppConfig::defaults());
        assert!(matches!(
            store.init().await,
            Err(ConfigError::AlreadyExists(_))
        ));
    }
}
