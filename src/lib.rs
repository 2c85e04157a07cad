//! # Face-Swapping CycleGAN
//!
//! This crate implements a face-swapping generative adversarial network:
//! a shared encoder, two domain decoders with alpha-mask compositing, two
//! patch discriminators, and an alternating training schedule with
//! selective gradient freezing between the adversarial sides.
//!
//! ## Modules
//!
//! - `data`: Face datasets and the paired batch loader
//! - `model`: Network architectures and the training orchestrator
//! - `training`: Training loop, losses, optimizer groups and metrics
//! - `utils`: Configuration and checkpoint I/O

pub mod data;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{FaceDataset, PairedLoader, SampleBatch};
pub use model::{CycleGan, DisplayOutput, FaceSwapper};
pub use training::{AvgPoolFeatures, FeatureExtractor, LossWeights, Trainer, TrainingMetrics};
pub use utils::{find_latest_epoch, load_networks, save_networks, Config};
