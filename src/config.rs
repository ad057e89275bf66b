use crate::error::{IrrigoError, Result};
use crate::logic::decision::{NoRuleFiredPolicy, TierTable};
use crate::logic::rules::RuleSetSource;
use dialoguer::{Input, Password, Select};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    pub openweathermap: Option<OpenWeatherMapConfig>,
    /// Constant rain probability used when no provider is configured.
    #[serde(default)]
    pub fixed_probability: Option<f64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            openweathermap: None,
            fixed_probability: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl std::fmt::Debug for OpenWeatherMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapConfig")
            .field("api_key", &"[REDACTED]")
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub rule_set: RuleSetSource,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub tiers: TierTable,
    #[serde(default)]
    pub no_rule_fired: NoRuleFiredPolicy,
}

/// Default value and accepted range for one sensor field.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FieldLimits {
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldLimits {
    fn check(&self, field: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min <= self.max) {
            return Err(IrrigoError::Config(format!(
                "validation.{}: invalid range [{}, {}]",
                field, self.min, self.max
            )));
        }
        if !(self.min..=self.max).contains(&self.default) {
            return Err(IrrigoError::Config(format!(
                "validation.{}: default {} outside [{}, {}]",
                field, self.default, self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default = "default_temperature_limits")]
    pub temperature: FieldLimits,
    #[serde(default = "default_humidity_limits")]
    pub humidity: FieldLimits,
    #[serde(default = "default_soil_limits")]
    pub soil_moisture: FieldLimits,
    #[serde(default)]
    pub raining_default: bool,
}

fn default_temperature_limits() -> FieldLimits {
    FieldLimits {
        default: 25.0,
        min: 0.0,
        max: 50.0,
    }
}

fn default_humidity_limits() -> FieldLimits {
    FieldLimits {
        default: 60.0,
        min: 0.0,
        max: 100.0,
    }
}

fn default_soil_limits() -> FieldLimits {
    FieldLimits {
        default: 50.0,
        min: 0.0,
        max: 100.0,
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature_limits(),
            humidity: default_humidity_limits(),
            soil_moisture: default_soil_limits(),
            raining_default: false,
        }
    }
}

/// Cold-start seeds for the per-device fallback cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_seed_temperature")]
    pub seed_temperature: Option<f64>,
    #[serde(default = "default_seed_humidity")]
    pub seed_humidity: Option<f64>,
    /// Seed from the device's last stored reading when there is one.
    #[serde(default = "default_enabled")]
    pub from_history: bool,
}

fn default_seed_temperature() -> Option<f64> {
    Some(28.0)
}

fn default_seed_humidity() -> Option<f64> {
    Some(73.0)
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            seed_temperature: default_seed_temperature(),
            seed_humidity: default_seed_humidity(),
            from_history: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            persist: true,
        }
    }
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(IrrigoError::Config(format!(
                "Config file not found at {:?}. Run `irrigo init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| IrrigoError::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::from_yaml(&config_str)?;
        tracing::debug!(path = %config_path.display(), "Loaded config");
        Ok(config)
    }

    /// Like `load`, but an absent config file yields the built-in defaults.
    /// An explicit `--config` path must exist.
    pub fn load_or_default(config_override: Option<PathBuf>) -> Result<Self> {
        if config_override.is_none() && !Self::exists(None) {
            tracing::info!("No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load(config_override)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content)?;

        // An empty document deserializes to unit, not an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| IrrigoError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.validation.temperature.check("temperature")?;
        self.validation.humidity.check("humidity")?;
        self.validation.soil_moisture.check("soil_moisture")?;
        self.policy.tiers.build()?;
        if self.forecast.timeout_secs == 0 {
            return Err(IrrigoError::Config(
                "forecast.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let default_path = Self::default_config_path()?;
        Ok(default_path)
    }

    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/irrigo/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| IrrigoError::Config("Cannot determine config directory".into()))?
            .join("irrigo");
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up irrigo!");
        println!();

        println!("OpenWeatherMap forecast (leave API key blank to skip)");
        let owm_api_key: String = Password::new()
            .with_prompt("  API key")
            .allow_empty_password(true)
            .interact()
            .map_err(|e| IrrigoError::Config(format!("Input error: {}", e)))?;

        let openweathermap = if owm_api_key.is_empty() {
            None
        } else {
            let latitude: f64 = Input::new()
                .with_prompt("  Latitude")
                .default(5.41)
                .interact_text()
                .map_err(|e| IrrigoError::Config(format!("Input error: {}", e)))?;

            let longitude: f64 = Input::new()
                .with_prompt("  Longitude")
                .default(100.33)
                .interact_text()
                .map_err(|e| IrrigoError::Config(format!("Input error: {}", e)))?;

            Some(OpenWeatherMapConfig {
                api_key: owm_api_key,
                latitude,
                longitude,
                enabled: true,
            })
        };

        println!();

        println!("Decision policy");
        let policies = ["three-tier (OFF / LOW / HIGH)", "binary (OFF / ON)"];
        let choice = Select::new()
            .with_prompt("  Pump commands")
            .items(&policies)
            .default(0)
            .interact()
            .map_err(|e| IrrigoError::Config(format!("Input error: {}", e)))?;
        let tiers = if choice == 1 {
            TierTable::Binary
        } else {
            TierTable::ThreeTier
        };

        println!();

        let config = Config {
            forecast: ForecastConfig {
                openweathermap,
                ..ForecastConfig::default()
            },
            policy: PolicyConfig {
                tiers,
                ..PolicyConfig::default()
            },
            ..Config::default()
        };

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| IrrigoError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# irrigo configuration\n# Generated by `irrigo init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| IrrigoError::Config(format!("Bad substitution pattern: {}", e)))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        Ok(result)
    }

    /// CLI override, then `IRRIGO_DATA_DIR`, then `storage.data_dir`, then
    /// the XDG data directory.
    pub fn data_dir(&self, data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("IRRIGO_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        if let Some(dir) = &self.storage.data_dir {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| IrrigoError::Config("Cannot determine data directory".into()))?
            .join("irrigo");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(&self, data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(self.data_dir(data_dir_override)?.join("irrigo.db"))
    }
}
