//! Data module for loading and batching paired face domains
//!
//! This module provides:
//! - Face image datasets with optional eye-region masks
//! - A paired loader producing warped/real training batches
//! - The batch type bound into the orchestrator each step

mod batch;
mod dataset;
mod loader;

pub use batch::SampleBatch;
pub use dataset::FaceDataset;
pub use loader::PairedLoader;
