//! Epoch-level training loop for the face-swap GAN
//!
//! Drives the orchestrator batch by batch, aggregates the loss ledger
//! into epoch metrics, and writes checkpoints and preview grids on the
//! configured cadence.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tch::{vision::image, Kind, Tensor};
use tracing::{info, warn};

use crate::data::PairedLoader;
use crate::model::CycleGan;
use crate::utils::checkpoint;
use crate::utils::config::TrainingParams;

use super::metrics::TrainingMetrics;

/// Loop parameters lifted from the run configuration
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Save checkpoints every N epochs
    pub checkpoint_every: usize,
    /// Save preview grids every N epochs (0 disables previews)
    pub preview_every: usize,
    /// Directory for checkpoints and previews
    pub save_dir: String,
}

impl From<&TrainingParams> for TrainerConfig {
    fn from(params: &TrainingParams) -> Self {
        Self {
            epochs: params.epochs,
            checkpoint_every: params.checkpoint_every,
            preview_every: params.preview_every,
            save_dir: params.save_dir.clone(),
        }
    }
}

/// Face-swap GAN trainer
pub struct Trainer {
    config: TrainerConfig,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Run the configured number of epochs
    ///
    /// # Arguments
    ///
    /// * `model` - Training orchestrator
    /// * `loader` - Paired loader over both domains
    /// * `start_epoch` - First epoch number (non-zero when resuming)
    ///
    /// # Returns
    ///
    /// Accumulated training metrics
    pub fn train(
        &mut self,
        model: &mut CycleGan,
        loader: &mut PairedLoader,
        start_epoch: usize,
    ) -> Result<&TrainingMetrics> {
        let num_batches = loader.num_batches();
        info!(
            "starting training for {} epochs, {} batches per epoch",
            self.config.epochs, num_batches
        );

        std::fs::create_dir_all(&self.config.save_dir)?;

        for epoch in start_epoch..start_epoch + self.config.epochs {
            let mut sums = [0.0_f64; 6];
            let mut batch_count = 0usize;

            let pb = ProgressBar::new(num_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );

            loader.reset();
            while let Some(batch) = loader.next_batch() {
                model.set_input(batch)?;
                model.optimize_parameters()?;

                let ledger = model.ledger();
                let names = [
                    "loss_D_A",
                    "loss_D_B",
                    "loss_G_A",
                    "loss_G_B",
                    "loss_Cycle_A",
                    "loss_Cycle_B",
                ];
                for (sum, name) in sums.iter_mut().zip(names) {
                    *sum += ledger.get(name).unwrap_or(0.0);
                }
                batch_count += 1;

                pb.set_message(format!(
                    "D: {:.4}, G: {:.4}",
                    (sums[0] + sums[1]) / (2.0 * batch_count as f64),
                    (sums[2] + sums[3] + sums[4] + sums[5]) / (2.0 * batch_count as f64),
                ));
                pb.inc(1);
            }

            pb.finish_with_message("done");

            let n = batch_count.max(1) as f64;
            self.metrics.record_epoch(
                sums[0] / n,
                sums[1] / n,
                sums[2] / n,
                sums[3] / n,
                sums[4] / n,
                sums[5] / n,
            );

            let display_epoch = epoch + 1;
            info!(
                "epoch {}/{}: D_A={:.4}, D_B={:.4}, G_A={:.4}, G_B={:.4}",
                display_epoch,
                start_epoch + self.config.epochs,
                sums[0] / n,
                sums[1] / n,
                sums[2] / n,
                sums[3] / n,
            );
            model.ledger().report(display_epoch);

            if self.metrics.check_mode_collapse(10) {
                warn!("possible mode collapse; consider adjusting learning rates");
            }

            if display_epoch % self.config.checkpoint_every == 0 {
                checkpoint::save_networks(&model.named_stores(), display_epoch, &self.config.save_dir)?;
            }

            if self.config.preview_every > 0 && display_epoch % self.config.preview_every == 0 {
                if let Err(e) = self.save_preview(model, display_epoch) {
                    warn!("failed to save preview: {e}");
                }
            }
        }

        let final_epoch = start_epoch + self.config.epochs;
        checkpoint::save_networks(&model.named_stores(), final_epoch, &self.config.save_dir)?;

        let metrics_path = format!("{}/training_metrics.csv", self.config.save_dir);
        if let Err(e) = self.metrics.save_csv(&metrics_path) {
            warn!("failed to save metrics: {e}");
        }

        Ok(&self.metrics)
    }

    /// Save a side-by-side grid of reals and their cross-domain renders
    fn save_preview(&self, model: &CycleGan, epoch: usize) -> Result<()> {
        let display = model.display_forward()?;

        // First sample only: B rendered as A beside A rendered as B
        let panels = Tensor::cat(
            &[
                display.display_a.get(0),
                display.display_b.get(0),
            ],
            2,
        );
        let grid = ((panels + 1.0) * 127.5)
            .clamp(0.0, 255.0)
            .to_kind(Kind::Uint8);

        let path = Path::new(&self.config.save_dir).join(format!("preview_{epoch}.png"));
        image::save(&grid, &path)?;
        Ok(())
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}
