use crate::paths;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use subsync_core::protocol::ProtocolConfig;
use subsync_core::{ClientConfig, split_list};

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_seconds: u64,
    pub retry_count: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub color_enabled: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_count: 3,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color_enabled: true,
        }
    }
}

impl AppConfig {
    /// Apply CLI argument overrides to the configuration
    pub fn apply_cli_overrides(&mut self, workers: Option<usize>, languages: Option<&str>) {
        if let Some(workers) = workers {
            self.client.concurrent_workers = workers;
        }
        if let Some(languages) = languages {
            self.client.languages = split_list(languages);
        }
    }

    /// Protocol settings with the network section applied
    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            request_timeout: Duration::from_secs(self.network.timeout_seconds),
            max_retries: self.network.retry_count,
            ..self.client.protocol_config()
        }
    }
}

/// Keys accepted by `config set`
const KNOWN_KEYS: &[&str] = &[
    "client.concurrent_workers",
    "client.retry_limit",
    "client.languages",
    "client.user_agent",
    "client.video_extensions",
    "client.subtitle_extensions",
    "network.timeout_seconds",
    "network.retry_count",
    "output.color_enabled",
];

/// Keys stored as TOML arrays, written as comma separated values
const LIST_KEYS: &[&str] = &[
    "client.languages",
    "client.video_extensions",
    "client.subtitle_extensions",
];

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed("SUBSYNC_").split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self.load_as_toml()?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        Self::render(current)
            .ok_or_else(|| anyhow::anyhow!("Value at '{}' is not a simple type", key))
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        Self::validate_config_value(key, value)?;

        // Load existing config or create new
        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)
                .with_context(|| format!("Failed to read {}", self.config_path.display()))?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Invalid key path: {}", key))?;

        let toml::Value::Table(root) = &mut config else {
            anyhow::bail!("Configuration file is not a table");
        };
        let section_value = root
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        let toml::Value::Table(section_table) = section_value else {
            anyhow::bail!("Invalid key path: expected table at '{}'", section);
        };
        section_table.insert(field.to_string(), Self::parse_config_value(key, value)?);

        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(&config)?;
        fs::write(&self.config_path, toml_string)?;

        Ok(())
    }

    /// List all configuration values
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = self.load_as_toml()?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn load_as_toml(&self) -> Result<toml::Value> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        Ok(toml::from_str(&toml_string)?)
    }

    /// Recursively collect all key-value pairs from TOML
    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        if let toml::Value::Table(table) = value {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                Self::collect_values(val, new_prefix, items);
            }
        } else if let Some(rendered) = Self::render(value) {
            items.push((prefix, rendered));
        }
    }

    /// Display form of a leaf value; arrays of scalars become comma separated
    fn render(value: &toml::Value) -> Option<String> {
        match value {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            toml::Value::Array(items) => items
                .iter()
                .map(Self::render)
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join(",")),
            _ => None,
        }
    }

    /// Validate a configuration value
    fn validate_config_value(key: &str, value: &str) -> Result<()> {
        if !KNOWN_KEYS.contains(&key) {
            anyhow::bail!("Unknown configuration key: {}", key);
        }

        match key {
            "client.concurrent_workers" => {
                let workers: usize = value
                    .parse()
                    .context("concurrent_workers must be a positive integer")?;
                if workers == 0 {
                    anyhow::bail!("concurrent_workers must be at least 1");
                }
            }
            "client.retry_limit" => {
                let limit: u32 = value
                    .parse()
                    .context("retry_limit must be a positive integer")?;
                if limit == 0 {
                    anyhow::bail!("retry_limit must be at least 1");
                }
            }
            "client.user_agent" => {
                if value.trim().is_empty() {
                    anyhow::bail!("user_agent must not be empty");
                }
            }
            k if LIST_KEYS.contains(&k) => {
                if split_list(value).is_empty() {
                    anyhow::bail!("{} needs at least one comma separated entry", k);
                }
            }
            "network.timeout_seconds" => {
                let timeout: u64 = value
                    .parse()
                    .context("timeout_seconds must be a positive integer")?;
                if timeout == 0 {
                    anyhow::bail!("timeout_seconds must be greater than 0");
                }
            }
            "network.retry_count" => {
                let _: u32 = value
                    .parse()
                    .context("retry_count must be a non-negative integer")?;
            }
            "output.color_enabled" => {
                let _: bool = value.parse().context("Value must be 'true' or 'false'")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Parse a value to the appropriate TOML type
    fn parse_config_value(key: &str, value: &str) -> Result<toml::Value> {
        match key {
            k if LIST_KEYS.contains(&k) => Ok(toml::Value::Array(
                split_list(value)
                    .into_iter()
                    .map(|item| toml::Value::String(item.trim_start_matches('.').to_string()))
                    .collect(),
            )),
            k if k.ends_with("_workers")
                || k.ends_with("_limit")
                || k.ends_with("_count")
                || k.ends_with("_seconds") =>
            {
                let num: i64 = value.parse().context("Expected integer value")?;
                Ok(toml::Value::Integer(num))
            }
            k if k.ends_with("_enabled") => {
                let bool_val: bool = value
                    .parse()
                    .context("Expected boolean value (true/false)")?;
                Ok(toml::Value::Boolean(bool_val))
            }
            _ => Ok(toml::Value::String(value.to_string())),
        }
    }
}

/// Load the configuration from the default location
pub fn get_config() -> Result<AppConfig> {
    ConfigManager::new().load()
}
