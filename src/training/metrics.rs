//! Loss bookkeeping for adversarial training
//!
//! The ledger maps the fixed loss-name list to the scalars computed this
//! step; names whose terms were disabled are simply absent. Epoch-level
//! history aggregates the six headline losses with CSV persistence.

use std::collections::BTreeMap;

use tracing::info;

/// Every loss name a training step may produce, in reporting order.
pub const LOSS_NAMES: [&str; 18] = [
    "loss_D_A",
    "loss_D_B",
    "loss_G_A",
    "loss_G_B",
    "loss_Cycle_A",
    "loss_Cycle_B",
    "loss_G_adversarial_A",
    "loss_G_reconstruction_A",
    "loss_G_perceptual_A",
    "loss_G_mask_A",
    "loss_G_adversarial_B",
    "loss_G_reconstruction_B",
    "loss_G_perceptual_B",
    "loss_G_mask_B",
    "loss_G_edge_A",
    "loss_G_edge_B",
    "loss_G_eye_A",
    "loss_G_eye_B",
];

/// Named loss scalars for the most recent step
#[derive(Debug, Clone, Default)]
pub struct LossLedger {
    values: BTreeMap<&'static str, f64>,
}

impl LossLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a loss scalar under its fixed name
    pub fn set(&mut self, name: &'static str, value: f64) {
        debug_assert!(LOSS_NAMES.contains(&name), "unknown loss name {name}");
        self.values.insert(name, value);
    }

    /// Value recorded this step, if the term was computed
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Iterate recorded values in reporting order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        LOSS_NAMES
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (*name, *v)))
    }

    /// Log every recorded loss; absent names are skipped silently
    pub fn report(&self, epoch: usize) {
        for (name, value) in self.iter() {
            info!("epoch {}: {} = {:.6}", epoch, name, value);
        }
    }

    /// Drop all recorded values
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Per-epoch averaged history of the headline losses
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Discriminator losses per epoch, domains A and B
    pub loss_d_a: Vec<f64>,
    pub loss_d_b: Vec<f64>,
    /// Generator losses per epoch
    pub loss_g_a: Vec<f64>,
    pub loss_g_b: Vec<f64>,
    /// Cycle-consistency losses per epoch (zero when cycle mode is off)
    pub loss_cycle_a: Vec<f64>,
    pub loss_cycle_b: Vec<f64>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one epoch of averaged losses
    pub fn record_epoch(&mut self, d_a: f64, d_b: f64, g_a: f64, g_b: f64, c_a: f64, c_b: f64) {
        self.loss_d_a.push(d_a);
        self.loss_d_b.push(d_b);
        self.loss_g_a.push(g_a);
        self.loss_g_b.push(g_b);
        self.loss_cycle_a.push(c_a);
        self.loss_cycle_b.push(c_b);
    }

    /// Number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.loss_d_a.len()
    }

    /// Moving average of the combined discriminator loss
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        let combined: Vec<f64> = self
            .loss_d_a
            .iter()
            .zip(&self.loss_d_b)
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
        moving_average(&combined, window)
    }

    /// Moving average of the combined generator loss
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        let combined: Vec<f64> = self
            .loss_g_a
            .iter()
            .zip(&self.loss_g_b)
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
        moving_average(&combined, window)
    }

    /// Heuristic collapse check: discriminators winning outright while the
    /// generators stop improving
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }

        self.disc_loss_ma(window) < 0.05 && self.gen_loss_ma(window) > 5.0
    }

    /// Save history to CSV
    pub fn save_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record([
            "epoch",
            "loss_D_A",
            "loss_D_B",
            "loss_G_A",
            "loss_G_B",
            "loss_Cycle_A",
            "loss_Cycle_B",
        ])?;

        for i in 0..self.num_epochs() {
            writer.write_record([
                (i + 1).to_string(),
                self.loss_d_a[i].to_string(),
                self.loss_d_b[i].to_string(),
                self.loss_g_a[i].to_string(),
                self.loss_g_b[i].to_string(),
                self.loss_cycle_a[i].to_string(),
                self.loss_cycle_b[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load history from CSV
    pub fn load_csv(path: &str) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut metrics = Self::new();

        for result in reader.records() {
            let record = result?;
            metrics.loss_d_a.push(record[1].parse()?);
            metrics.loss_d_b.push(record[2].parse()?);
            metrics.loss_g_a.push(record[3].parse()?);
            metrics.loss_g_b.push(record[4].parse()?);
            metrics.loss_cycle_a.push(record[5].parse()?);
            metrics.loss_cycle_b.push(record[6].parse()?);
        }

        Ok(metrics)
    }
}

/// Mean of the last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}
