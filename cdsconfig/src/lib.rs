//! # Content directory configuration
//!
//! This module provides configuration management for the content directory
//! server, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use cdsconfig::get_config;
//!
//! let config = get_config();
//! let base_dir = config.get_http_base_dir();
//! let interval = config.get_update_interval()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_yaml::{Mapping, Number, Value};
use std::{env, fs, path::Path, sync::Arc, time::Duration};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("cdsmedia.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_config("").unwrap_or_else(|err| {
        warn!(error = %err, "Failed to load configuration, using embedded defaults");
        Config::embedded()
    }));
}

const ENV_CONFIG_DIR: &str = "CDS_CONFIG";
const ENV_PREFIX: &str = "CDS_CONFIG__";
const CONFIG_DIR_NAME: &str = ".cdsmedia";

// Default values for configuration
const DEFAULT_HTTP_BASE_DIR: &str = "/upnp/condir/";
const DEFAULT_UPDATE_INTERVAL_MS: usize = 2000;
const DEFAULT_SEEK_INTERVAL_SECS: usize = 120;
const DEFAULT_LONG_ITEM_SECS: usize = 300;
const DEFAULT_ROOT_TITLE: &str = "root";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().map(|v| v as usize).unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            let n = Number::from(value as u64);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// One delivery profile as written in `contentdirectory.profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    /// `audio`, `video` or `image`
    pub kind: String,
    pub mime: String,
    pub suffix: String,
    /// `false` when `name` is not an official DLNA profile name
    #[serde(default = "default_true")]
    pub dlna: bool,
}

fn default_true() -> bool {
    true
}

/// The folder library mounted by the command-line host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub mount: String,
}

/// Configuration manager
///
/// Configurations loaded from a directory are written back on every
/// change; configurations built from a string live in memory only.
#[derive(Debug)]
pub struct Config {
    config_dir: Option<String>,
    path: Option<String>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data.lock().clone()),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `CDS_CONFIG` environment variable
    /// 3. `.cdsmedia` in the current directory
    /// 4. `.cdsmedia` in the user's home directory
    ///
    /// The directory is created if it doesn't exist.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using default embedded config");
            }
        }

        let mut config_value = Self::lower_keys_value(config_value);
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir: Some(config_dir),
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration: embedded defaults overridden by
    /// `yaml`. Nothing is read from or written to disk.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external_value: Value = serde_yaml::from_str(yaml)?;
        if !external_value.is_null() {
            merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
        }

        Ok(Config {
            config_dir: None,
            path: None,
            data: Mutex::new(Self::lower_keys_value(config_value)),
        })
    }

    /// The embedded defaults alone.
    pub fn embedded() -> Self {
        let value = serde_yaml::from_str(DEFAULT_CONFIG)
            .unwrap_or_else(|_| Value::Mapping(Mapping::new()));
        Config {
            config_dir: None,
            path: None,
            data: Mutex::new(value),
        }
    }

    /// Directory the configuration was loaded from, if any
    pub fn directory(&self) -> Option<&str> {
        self.config_dir.as_deref()
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.data.lock())?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["contentdirectory", "seek_interval_secs"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(variable = %key, error = %err, "Ignoring environment override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(k, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Base URL (`http://host:port`) used in resource URLs when the request
    /// does not carry a host
    pub fn get_base_url(&self) -> Option<String> {
        self.get_string(&["host", "base_url"])
    }

    /// Prefix under which resource URLs are served, always `/`-delimited
    pub fn get_http_base_dir(&self) -> String {
        let mut dir = self
            .get_string(&["contentdirectory", "http_base_dir"])
            .unwrap_or_else(|| DEFAULT_HTTP_BASE_DIR.to_string());
        if !dir.starts_with('/') {
            dir.insert(0, '/');
        }
        if !dir.ends_with('/') {
            dir.push('/');
        }
        dir
    }

    /// Title of the root container
    pub fn get_root_title(&self) -> String {
        self.get_string(&["contentdirectory", "root_title"])
            .unwrap_or_else(|| DEFAULT_ROOT_TITLE.to_string())
    }

    impl_usize_config!(
        get_update_interval_ms,
        set_update_interval_ms,
        &["contentdirectory", "update_interval_ms"],
        DEFAULT_UPDATE_INTERVAL_MS
    );

    impl_usize_config!(
        get_seek_interval_secs,
        set_seek_interval_secs,
        &["contentdirectory", "seek_interval_secs"],
        DEFAULT_SEEK_INTERVAL_SECS
    );

    impl_usize_config!(
        get_long_item_secs,
        set_long_item_secs,
        &["contentdirectory", "long_item_secs"],
        DEFAULT_LONG_ITEM_SECS
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Debounce delay between a change and the matching event
    pub fn get_update_interval(&self) -> Result<Duration> {
        Ok(Duration::from_millis(self.get_update_interval_ms()? as u64))
    }

    /// Delivery profiles, in the order they are offered
    pub fn get_profiles(&self) -> Result<Vec<ProfileConfig>> {
        match self.get_value(&["contentdirectory", "profiles"]) {
            Ok(value @ Value::Sequence(_)) => Ok(serde_yaml::from_value(value)?),
            Ok(Value::Null) | Err(_) => Ok(Vec::new()),
            Ok(_) => Err(anyhow!("contentdirectory.profiles must be a list")),
        }
    }

    /// Folder library to mount, `None` when no directory is configured
    pub fn get_library(&self) -> Result<Option<LibraryConfig>> {
        let library: LibraryConfig = match self.get_value(&["library"]) {
            Ok(value @ Value::Mapping(_)) => serde_yaml::from_value(value)?,
            _ => return Ok(None),
        };
        if library.directory.is_empty() {
            return Ok(None);
        }
        Ok(Some(library))
    }

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> String {
        self.get_string(&["host", "logger", "min_level"])
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string())
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance, loaded on first access
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_http_base_dir(), "/upnp/condir/");
        assert_eq!(config.get_update_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(config.get_seek_interval_secs().unwrap(), 120);
        assert_eq!(config.get_long_item_secs().unwrap(), 300);
        assert_eq!(config.get_root_title(), "root");
        assert_eq!(config.get_log_min_level(), "INFO");
        assert!(config.get_base_url().is_none());
        assert!(config.get_library().unwrap().is_none());

        let profiles = config.get_profiles().unwrap();
        assert_eq!(profiles[0].name, "MP3");
        assert!(profiles.iter().any(|p| p.kind == "video" && !p.dlna));
    }

    #[test]
    fn test_overrides_are_merged() {
        let config = Config::from_yaml_str(
            "ContentDirectory:\n  HTTP_Base_Dir: cds\n  seek_interval_secs: 60\n",
        )
        .unwrap();
        assert_eq!(config.get_http_base_dir(), "/cds/");
        assert_eq!(config.get_seek_interval_secs().unwrap(), 60);
        // untouched keys keep their default
        assert_eq!(config.get_long_item_secs().unwrap(), 300);
    }

    #[test]
    fn test_profiles_are_replaced_not_merged() {
        let config = Config::from_yaml_str(
            "contentdirectory:\n  profiles:\n    - {name: AAC, kind: audio, mime: audio/mp4, suffix: m4a}\n",
        )
        .unwrap();
        let profiles = config.get_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].suffix, "m4a");
        assert!(profiles[0].dlna);
    }

    #[test]
    fn test_set_value_in_memory() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_seek_interval_secs(30).unwrap();
        assert_eq!(config.get_seek_interval_secs().unwrap(), 30);
        assert!(config.directory().is_none());
    }

    #[test]
    fn test_load_and_save_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "library:\n  directory: /srv/media\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        let library = config.get_library().unwrap().unwrap();
        assert_eq!(library.directory, "/srv/media");
        assert_eq!(library.mount, "/Library/");

        config.set_log_min_level("DEBUG".to_string()).unwrap();
        let saved = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(saved.contains("DEBUG"));
    }
}
