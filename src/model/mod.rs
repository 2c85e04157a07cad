//! Model module containing the face-swap networks
//!
//! This module provides:
//! - The shared encoder and per-domain decoders
//! - Patch discriminators for both domains
//! - The training orchestrator and the inference-only swapper

mod blocks;
mod cyclegan;
mod decoder;
mod discriminator;
mod encoder;

pub use blocks::{ResidualBlock, SABlock};
pub use cyclegan::{CycleGan, DisplayOutput, FaceSwapper};
pub use decoder::Decoder;
pub use discriminator::Discriminator;
pub use encoder::{Encoder, LATENT_SHAPE};
