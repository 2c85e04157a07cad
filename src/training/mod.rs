//! Training module for the face-swap GAN
//!
//! This module provides:
//! - The epoch-level training loop
//! - Loss functions and the perceptual feature-extractor seam
//! - Optimizer groups spanning several sub-networks
//! - Loss ledger and epoch metrics

pub mod losses;
pub mod metrics;
pub mod optim;
mod trainer;

pub use losses::{AvgPoolFeatures, FeatureExtractor, LossWeights};
pub use metrics::{LossLedger, TrainingMetrics, LOSS_NAMES};
pub use optim::OptimizerGroup;
pub use trainer::{Trainer, TrainerConfig};
