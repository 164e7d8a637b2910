use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"
[store]
# SQLite database holding the contacts
# path = "/path/to/contacts.db"

[removal]
# Interpreter used for group removals: "sqlite3" or "osascript"
channel = "sqlite3"
# program = "/usr/bin/sqlite3"
"#;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CliConfig {
    pub store: Option<StoreConfig>,
    pub removal: Option<RemovalConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemovalChannelKind {
    #[default]
    Sqlite3,
    Osascript,
}

impl RemovalChannelKind {
    pub fn program(&self) -> &'static str {
        match self {
            RemovalChannelKind::Sqlite3 => "sqlite3",
            RemovalChannelKind::Osascript => "osascript",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RemovalConfig {
    #[serde(default)]
    pub channel: RemovalChannelKind,
    pub program: Option<String>,
}

impl CliConfig {
    /// Loads the config at `path` (or the default location), writing a
    /// commented default file first if none exists.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let config: CliConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|store| store.path.clone())
            .unwrap_or_else(get_db_path)
    }

    pub fn removal_channel(&self) -> RemovalChannelKind {
        self.removal
            .as_ref()
            .map(|removal| removal.channel)
            .unwrap_or_default()
    }

    /// Interpreter binary, defaulting to the channel's own name.
    pub fn removal_program(&self) -> String {
        self.removal
            .as_ref()
            .and_then(|removal| removal.program.clone())
            .filter(|program| !program.trim().is_empty())
            .unwrap_or_else(|| self.removal_channel().program().to_string())
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("contactkit").join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

pub fn get_db_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        data_dir.join("contactkit").join("contacts.db")
    } else {
        PathBuf::from("contacts.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (config, loaded_from) = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded_from, path);
        assert!(path.exists());
        assert_eq!(config.removal_channel(), RemovalChannelKind::Sqlite3);
        assert_eq!(config.removal_program(), "sqlite3");
        assert_eq!(config.store_path(), get_db_path());
    }

    #[test]
    fn test_load_reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[store]
path = "/tmp/contactkit-test.db"

[removal]
channel = "osascript"
program = "/usr/bin/osascript"
"#,
        )
        .unwrap();

        let (config, _) = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/contactkit-test.db"));
        assert_eq!(config.removal_channel(), RemovalChannelKind::Osascript);
        assert_eq!(config.removal_program(), "/usr/bin/osascript");
    }
}
