//! Configuration management
//!
//! One config object covers optimization, loss selection and loss weights.
//! Missing keys fail deserialization; value errors fail `validate()`.
//! Both are fatal at construction time.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::training::losses::LossWeights;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Optimization and run parameters
    pub training: TrainingParams,
    /// Loss-term selection flags
    pub loss: LossConfig,
    /// Per-term loss weights
    pub loss_weights: LossWeights,
}

/// Optimization and run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Generator learning rate
    pub g_lr: f64,
    /// Discriminator learning rate
    pub d_lr: f64,
    /// Cycle-phase learning rate
    pub c_lr: f64,
    /// Common multiplier applied to the generator and discriminator rates
    pub lr_factor: f64,
    /// Images per batch
    pub batchsize: usize,
    /// Number of training epochs
    pub epochs: usize,
    /// Save checkpoints every N epochs
    pub checkpoint_every: usize,
    /// Save preview grids every N epochs (0 disables previews)
    pub preview_every: usize,
    /// Directory for checkpoints and previews
    pub save_dir: String,
    /// Device: "cpu" or "cuda"
    pub device: String,
}

/// Loss-term selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossConfig {
    /// Train with cycle-consistency losses instead of the generator losses
    pub cyclegan_on: bool,
    /// Add the perceptual term to the generator losses
    pub pl_on: bool,
    /// Add the eye-masked edge term to the generator losses
    pub edgeloss_on: bool,
    /// Add the eye-region term to the generator losses
    pub eyeloss_on: bool,
    /// Alpha-mask activation level that starts incurring regularization
    pub mask_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            training: TrainingParams {
                g_lr: 1e-4,
                d_lr: 1e-4,
                c_lr: 1e-4,
                lr_factor: 1.0,
                batchsize: 4,
                epochs: 100,
                checkpoint_every: 10,
                preview_every: 5,
                save_dir: "checkpoints".to_string(),
                device: "cpu".to_string(),
            },
            loss: LossConfig {
                cyclegan_on: false,
                pl_on: false,
                edgeloss_on: false,
                eyeloss_on: false,
                mask_threshold: 0.3,
            },
            loss_weights: LossWeights::default(),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from a path, dispatching on the extension
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        if path.ends_with(".toml") {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.training.batchsize == 0 {
            anyhow::bail!("Batch size must be > 0");
        }
        if self.training.epochs == 0 {
            anyhow::bail!("Number of epochs must be > 0");
        }
        if self.training.g_lr <= 0.0 || self.training.d_lr <= 0.0 || self.training.c_lr <= 0.0 {
            anyhow::bail!("Learning rates must be > 0");
        }
        if self.training.lr_factor <= 0.0 {
            anyhow::bail!("lr_factor must be > 0");
        }
        if !(0.0..=1.0).contains(&self.loss.mask_threshold) {
            anyhow::bail!("mask_threshold must be in [0, 1]");
        }
        Ok(())
    }
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::from_path(path)
    } else {
        let config = Config::default();
        if path.ends_with(".toml") {
            config.save_toml(path)?;
        } else {
            config.save_json(path)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.training.batchsize, 4);
        assert!(!config.loss.cyclegan_on);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let mut config = Config::default();
        config.loss.pl_on = true;

        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert!(loaded.loss.pl_on);
        assert_eq!(config.training.g_lr, loaded.training.g_lr);
    }

    #[test]
    fn test_config_rejects_missing_key() {
        // loss block stripped of mask_threshold
        let json = r#"{
            "training": {
                "g_lr": 1e-4, "d_lr": 1e-4, "c_lr": 1e-4, "lr_factor": 1.0,
                "batchsize": 4, "epochs": 1, "checkpoint_every": 1,
                "preview_every": 0, "save_dir": "x", "device": "cpu"
            },
            "loss": {
                "cyclegan_on": false, "pl_on": false,
                "edgeloss_on": false, "eyeloss_on": false
            },
            "loss_weights": {
                "adversarial": 1.0, "reconstruction": 1.0, "mask": 1.0,
                "perceptual": 1.0, "edge": 1.0, "eye": 1.0, "cycle": 1.0
            }
        }"#;

        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_config_validation_failures() {
        let mut config = Config::default();
        config.training.batchsize = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.loss.mask_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.d_lr = 0.0;
        assert!(config.validate().is_err());
    }
}
