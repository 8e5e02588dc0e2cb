use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::inference::{GreenBand, ResizeFilter, Thresholds};

pub const DEFAULT_CONFIG_PATH: &str = "config/leafcheck.yaml";
pub const CONFIG_PATH_ENV: &str = "LEAFCHECK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub preprocessing: PreprocessingConfig,
    pub thresholds: Thresholds,
    pub green_band: GreenBand,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub path: String,
    /// Input size as [height, width].
    pub input_size: [u32; 2],
    pub labels: Vec<String>,
    /// Feed the model NCHW instead of NHWC.
    pub channels_first: bool,
    /// Apply softmax to raw model outputs.
    pub apply_softmax: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "MobileNetV2 CNN".to_string(),
            path: "models/banana_mobilenetv2.pt".to_string(),
            input_size: [160, 160],
            labels: ["cordana", "healthy", "pestalotiopsis", "sigatoka"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            channels_first: true,
            apply_softmax: false,
        }
    }
}

impl ModelConfig {
    pub fn target_size(&self) -> (u32, u32) {
        (self.input_size[0], self.input_size[1])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub resize_filter: ResizeFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
    pub max_concurrent_inferences: usize,
    pub url_fetch_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 30,
            max_concurrent_inferences: 4,
            url_fetch_timeout_secs: 15,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Reads the file named by `LEAFCHECK_CONFIG`, falling back to
    /// `config/leafcheck.yaml`. Only a missing default file yields defaults;
    /// an explicitly configured path must exist.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load_from(DEFAULT_CONFIG_PATH)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(path) = std::env::var("MODEL_PATH") {
            self.model.path = path;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate().map_err(ConfigError::Invalid)?;
        self.green_band.validate().map_err(ConfigError::Invalid)?;

        let [height, width] = self.model.input_size;
        if height == 0 || width == 0 {
            return Err(ConfigError::Invalid(format!(
                "model input_size must be non-zero, got {}x{}",
                height, width
            )));
        }
        if self.model.labels.is_empty() {
            return Err(ConfigError::Invalid("model labels must not be empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.model.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(ConfigError::Invalid(format!("duplicate model label: {}", dup)));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("server max_upload_bytes must be positive".into()));
        }
        if self.server.request_timeout_secs == 0 || self.server.url_fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("server timeouts must be positive".into()));
        }
        if self.server.max_concurrent_inferences == 0 {
            return Err(ConfigError::Invalid(
                "server max_concurrent_inferences must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_policy() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.thresholds.min_confidence, 0.6);
        assert_eq!(config.thresholds.max_entropy, 1.2);
        assert_eq!(config.thresholds.min_green_ratio, 0.15);
        assert_eq!(config.model.target_size(), (160, 160));
        assert_eq!(config.model.labels.len(), 4);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
model:
  input_size: [224, 224]
thresholds:
  max_entropy: 1.0
preprocessing:
  resize_filter: catmull_rom
server:
  port: 8081
"#,
        )
        .unwrap();

        assert_eq!(config.model.target_size(), (224, 224));
        assert_eq!(config.model.labels[1], "healthy");
        assert_eq!(config.thresholds.max_entropy, 1.0);
        assert_eq!(config.thresholds.min_confidence, 0.6);
        assert_eq!(config.preprocessing.resize_filter, ResizeFilter::CatmullRom);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "thresholds:\n  min_confidence: 1.2\n",
            "thresholds:\n  min_green_ratio: -0.1\n",
            "model:\n  input_size: [0, 160]\n",
            "model:\n  labels: []\n",
            "model:\n  labels: [healthy, healthy]\n",
            "green_band:\n  hue_min_degrees: 180.0\n  hue_max_degrees: 90.0\n",
            "server:\n  max_concurrent_inferences: 0\n",
        ];
        for yaml in cases {
            assert!(
                matches!(AppConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = AppConfig::from_yaml_str("thresholds: [not, a, map]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load_from("/nonexistent/leafcheck.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
