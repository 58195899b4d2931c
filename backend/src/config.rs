use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid {name} override: {value}")]
    Override { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scratch: ScratchConfig,
    pub nutrition: NutritionConfig,
    pub food_model: ModelConfig,
    pub category_model: CategoryModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_payload_bytes: usize,
    pub inference_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    None,
    /// Keras `vgg19.preprocess_input`: RGB to BGR, then ImageNet mean subtraction.
    Vgg19Caffe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    pub normalization: Normalization,
    pub rescale: f32,
    pub layout: TensorLayout,
    pub labels: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    pub normalization: Normalization,
    pub rescale: f32,
    pub layout: TensorLayout,
    pub labels: Option<PathBuf>,
    /// Ranks below the first are reported only above this score.
    pub min_secondary_score: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_payload_bytes: 16 * 1024 * 1024,
            inference_timeout_secs: 30,
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp-download"),
        }
    }
}

impl Default for NutritionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("food_data.json"),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/foodidentification.pt"),
            input_size: 228,
            normalization: Normalization::None,
            rescale: 1.0 / 255.0,
            layout: TensorLayout::Nchw,
            labels: None,
        }
    }
}

impl Default for CategoryModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/foodclasses.pt"),
            input_size: 300,
            normalization: Normalization::Vgg19Caffe,
            rescale: 1.0 / 255.0,
            layout: TensorLayout::Nchw,
            labels: None,
            min_secondary_score: 0.3,
        }
    }
}

impl CategoryModelConfig {
    pub fn model(&self) -> ModelConfig {
        ModelConfig {
            path: self.path.clone(),
            input_size: self.input_size,
            normalization: self.normalization,
            rescale: self.rescale,
            layout: self.layout,
            labels: self.labels.clone(),
        }
    }
}

impl AppConfig {
    /// Resolves the config path from `PLATESCAN_CONFIG`, falling back to
    /// `config/app.yaml` next to the workspace root.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("PLATESCAN_CONFIG") {
            return PathBuf::from(path);
        }
        match std::env::var("CARGO_MANIFEST_DIR") {
            Ok(manifest_dir) => Path::new(&manifest_dir).join("../config/app.yaml"),
            Err(_) => PathBuf::from("config/app.yaml"),
        }
    }

    /// Loads the YAML file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_yaml(&config_str).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(config_str)
    }

    /// Applies `HOST` and `PORT` from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::var("HOST").ok(), std::env::var("PORT").ok())
    }

    fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port.parse().map_err(|_| ConfigError::Override {
                name: "PORT",
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
