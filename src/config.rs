//! Configuration for the dashboard server
//!
//! Loads configuration from config.yml file; environment variables
//! (and `${VAR}` placeholders in the YAML) take precedence.

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::dataset::GroupingKey;
use crate::prediction::DecisionRule;
use crate::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_ADDR: &str = "127.0.0.1:12345";
pub const DEFAULT_DATASET: &str = "data/marketing_new.csv";
pub const DEFAULT_MODEL: &str = "model.json";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    server: Option<ServerConfig>,
    data: Option<DataConfig>,
    model: Option<ModelConfig>,
    dashboard: Option<DashboardConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerConfig {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DataConfig {
    dataset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelConfig {
    path: Option<String>,
    cache: Option<bool>,
    positive_class_index: Option<usize>,
    decision_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardConfig {
    default_grouping: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    /// Keep the first loaded model instead of reading the file per request.
    pub cache_model: bool,
    pub decision_rule: DecisionRule,
    pub default_grouping: GroupingKey,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file(CONFIG_FILE)
            .or_else(|_| Self::load_from_file(Path::new("..").join(CONFIG_FILE)))
            .or_else(|_| Self::from_yaml(YamlConfig::default()))
            .unwrap_or_else(|_| Self::defaults())
    }

    /// Load from an explicit path, failing if it cannot be read, or fall back
    /// to `new()` when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::new()),
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                return std::env::var(var_name).ok();
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: YamlConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        Self::from_yaml(yaml)
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        Self::load_dotenv();

        let server = yaml.server.unwrap_or_default();
        let data = yaml.data.unwrap_or_default();
        let model = yaml.model.unwrap_or_default();
        let dashboard = yaml.dashboard.unwrap_or_default();

        let addr = Self::resolve_env_string(server.addr, "DASHBOARD_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("Invalid listen address {:?}: {}", addr, e)))?;

        let dataset_path = Self::resolve_env_string(data.dataset, "DASHBOARD_DATASET")
            .unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let model_path = Self::resolve_env_string(model.path, "DASHBOARD_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let defaults = DecisionRule::default();
        let decision_rule = DecisionRule::new(
            model
                .positive_class_index
                .unwrap_or(defaults.positive_class_index()),
            model
                .decision_threshold
                .unwrap_or(defaults.decision_threshold()),
        )
        .map_err(|e| Error::Config(e.to_string()))?;

        let default_grouping = match dashboard.default_grouping {
            Some(name) => name
                .parse::<GroupingKey>()
                .map_err(|e| Error::Config(e.to_string()))?,
            None => GroupingKey::default(),
        };

        Ok(Self {
            addr,
            dataset_path: PathBuf::from(dataset_path),
            model_path: PathBuf::from(model_path),
            cache_model: model.cache.unwrap_or(false),
            decision_rule,
            default_grouping,
        })
    }

    /// Built-in defaults, no file or environment involved
    pub fn defaults() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 12345)),
            dataset_path: PathBuf::from(DEFAULT_DATASET),
            model_path: PathBuf::from(DEFAULT_MODEL),
            cache_model: false,
            decision_rule: DecisionRule::default(),
            default_grouping: GroupingKey::default(),
        }
    }
}
