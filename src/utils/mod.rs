//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load for the named sub-networks

pub mod checkpoint;
pub mod config;

pub use checkpoint::{find_latest_epoch, load_networks, save_networks};
pub use config::Config;
