// Configuration loading and validation (incman.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::oncall::DEFAULT_ROTATION;

/// Contents written to the default config location on first run.
pub const DEFAULT_CONFIG: &str = include_str!("../defaults/incman.toml");

pub const CONFIG_FILE_NAME: &str = "incman.toml";
pub const DEFAULT_LISTENER_PORT: u16 = 9300;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub rotation: Vec<String>,
    pub listener_port: u16,
    /// `None` when notifications are disabled.
    pub webhook_url: Option<String>,
}

// ---------------------------------------------------------------------------
// incman.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    oncall: OncallSection,
    #[serde(default)]
    listener: ListenerSection,
    #[serde(default)]
    notify: NotifySection,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct DatabaseSection {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct OncallSection {
    rotation: Vec<String>,
}

impl Default for OncallSection {
    fn default() -> Self {
        Self {
            rotation: DEFAULT_ROTATION.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ListenerSection {
    port: u16,
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_LISTENER_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct NotifySection {
    #[serde(default)]
    webhook_url: String,
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Platform directories for incman. Falls back to `./.incman` when no home
/// directory can be determined.
fn project_dirs() -> (PathBuf, PathBuf) {
    match directories::ProjectDirs::from("", "", "incman") {
        Some(dirs) => (dirs.config_dir().to_path_buf(), dirs.data_dir().to_path_buf()),
        None => {
            let local = PathBuf::from(".incman");
            (local.clone(), local)
        }
    }
}

/// Default path of `incman.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    project_dirs().0.join(CONFIG_FILE_NAME)
}

/// Default directory for the database and log files.
pub fn default_data_dir() -> PathBuf {
    project_dirs().1
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate config text. Relative or empty paths resolve against
/// `data_dir`.
pub fn parse_config(text: &str, path: &Path, data_dir: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let db_path = if file.database.path.trim().is_empty() {
        data_dir.join("incidents.db")
    } else {
        data_dir.join(file.database.path.trim())
    };

    let webhook_url = Some(file.notify.webhook_url.trim().to_string()).filter(|u| !u.is_empty());

    let config = Config {
        db_path,
        log_dir: data_dir.join("logs"),
        rotation: file.oncall.rotation,
        listener_port: file.listener.port,
        webhook_url,
    };

    validate(&config)?;
    Ok(config)
}

/// Load and validate the config file at `path`.
pub fn load_config_from(path: &Path, data_dir: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    parse_config(&text, path, data_dir)
}

/// Write the default config to `path` unless a file already exists there.
/// Returns `true` if a file was created.
pub fn ensure_config_file(path: &Path) -> Result<bool, ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", parent.display()),
        })?;
    }

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, DEFAULT_CONFIG.as_bytes()).map_err(|e| {
                ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", path.display()),
                }
            })?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", path.display()),
        }),
    }
}

/// Convenience wrapper used by the CLI. An explicit path must exist; the
/// default location is seeded from the embedded defaults on first use.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let data_dir = default_data_dir();
    match explicit {
        Some(path) => load_config_from(path, &data_dir),
        None => {
            let path = default_config_path();
            ensure_config_file(&path)?;
            load_config_from(&path, &data_dir)
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.rotation.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "oncall.rotation".into(),
            message: "must list at least one responder".into(),
        });
    }

    if let Some(pos) = config.rotation.iter().position(|m| m.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "oncall.rotation".into(),
            message: format!("entry {pos} is blank"),
        });
    }

    if config.listener_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "listener.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if let Some(url) = &config.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                field: "notify.webhook_url".into(),
                message: format!("must be an http(s) URL, got {url}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        parse_config(text, Path::new("incman.toml"), Path::new("/var/lib/incman"))
    }

    #[test]
    fn default_config_is_valid() {
        let config = parse(DEFAULT_CONFIG).expect("defaults should load");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/incman/incidents.db"));
        assert_eq!(config.log_dir, PathBuf::from("/var/lib/incman/logs"));
        assert_eq!(config.rotation, DEFAULT_ROTATION);
        assert_eq!(config.listener_port, 9300);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn empty_file_uses_section_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.rotation.len(), 5);
        assert_eq!(config.listener_port, DEFAULT_LISTENER_PORT);
    }

    #[test]
    fn custom_values_are_read() {
        let config = parse(
            r#"
            [database]
            path = "ops/incidents.db"
            [oncall]
            rotation = ["kim", "lee"]
            [listener]
            port = 9555
            [notify]
            webhook_url = "https://hooks.example.com/T000/B000"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/incman/ops/incidents.db"));
        assert_eq!(config.rotation, vec!["kim", "lee"]);
        assert_eq!(config.listener_port, 9555);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/T000/B000")
        );
    }

    #[test]
    fn absolute_database_path_is_kept() {
        let config = parse("[database]\npath = \"/srv/inc.db\"\n").unwrap();
        assert_eq!(config.db_path, PathBuf::from("/srv/inc.db"));
    }

    #[test]
    fn sections_without_keys_fall_back_to_defaults() {
        let config = parse("[database]\n[oncall]\n[listener]\n# port omitted\n[notify]\n").unwrap();
        assert_eq!(config.rotation, DEFAULT_ROTATION);
        assert_eq!(config.listener_port, DEFAULT_LISTENER_PORT);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn rejects_empty_rotation() {
        let err = parse("[oncall]\nrotation = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "oncall.rotation"));
    }

    #[test]
    fn rejects_blank_rotation_entry() {
        let err = parse("[oncall]\nrotation = [\"kim\", \" \"]\n").unwrap_err();
        assert!(err.to_string().contains("entry 1 is blank"));
    }

    #[test]
    fn rejects_port_zero() {
        let err = parse("[listener]\nport = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "listener.port"));
    }

    #[test]
    fn rejects_non_http_webhook() {
        let err = parse("[notify]\nwebhook_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "notify.webhook_url"));
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = parse("[listener\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("incman.toml"));
    }

    #[test]
    fn missing_explicit_file_is_reported() {
        let path = std::env::temp_dir().join("incman_config_test_missing/incman.toml");
        let err = load_config_from(&path, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn ensure_config_file_seeds_once() {
        let dir = std::env::temp_dir().join(format!("incman_config_test_seed_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("nested").join(CONFIG_FILE_NAME);

        assert!(ensure_config_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);

        // An existing file is left untouched.
        fs::write(&path, "[listener]\nport = 9999\n").unwrap();
        assert!(!ensure_config_file(&path).unwrap());
        let config = load_config_from(&path, &dir).unwrap();
        assert_eq!(config.listener_port, 9999);

        let _ = fs::remove_dir_all(&dir);
    }
}
