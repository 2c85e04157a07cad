//! Paired loader batching two face domains for adversarial training
//!
//! Each epoch shuffles both domains independently, drops incomplete tails,
//! and yields `SampleBatch`es whose warped inputs are light augmentations
//! of the reals.

use rand::seq::SliceRandom;
use rand::Rng;
use tch::{Kind, Tensor};

use super::batch::SampleBatch;
use super::dataset::FaceDataset;

/// Pixel jitter amplitude applied when warping inputs
const WARP_NOISE: f64 = 0.02;

/// Loader over two domains producing paired training batches
pub struct PairedLoader {
    domain_a: FaceDataset,
    domain_b: FaceDataset,
    batch_size: usize,
    shuffle: bool,
    indices_a: Vec<i64>,
    indices_b: Vec<i64>,
    current: usize,
}

impl PairedLoader {
    /// Create a loader over two domains
    ///
    /// Incomplete final batches are always dropped so every step sees a
    /// full batch (batch norm requires more than one sample).
    pub fn new(domain_a: FaceDataset, domain_b: FaceDataset, batch_size: usize, shuffle: bool) -> Self {
        let indices_a: Vec<i64> = (0..domain_a.len()).collect();
        let indices_b: Vec<i64> = (0..domain_b.len()).collect();

        let mut loader = Self {
            domain_a,
            domain_b,
            batch_size,
            shuffle,
            indices_a,
            indices_b,
            current: 0,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        loader
    }

    /// Batches per epoch (limited by the smaller domain)
    pub fn num_batches(&self) -> usize {
        let pairs = self.domain_a.len().min(self.domain_b.len()) as usize;
        pairs / self.batch_size
    }

    /// Whether both domains carry eye masks
    pub fn has_masks(&self) -> bool {
        self.domain_a.has_masks() && self.domain_b.has_masks()
    }

    fn shuffle_indices(&mut self) {
        let mut rng = rand::thread_rng();
        self.indices_a.shuffle(&mut rng);
        self.indices_b.shuffle(&mut rng);
    }

    /// Reset for a new epoch
    pub fn reset(&mut self) {
        self.current = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    /// Next paired batch, or None when the epoch is complete
    pub fn next_batch(&mut self) -> Option<SampleBatch> {
        let start = self.current * self.batch_size;
        let end = start + self.batch_size;
        if self.current >= self.num_batches() {
            return None;
        }
        self.current += 1;

        let picks_a = &self.indices_a[start..end];
        let picks_b = &self.indices_b[start..end];

        let real_a = self.domain_a.select(picks_a);
        let real_b = self.domain_b.select(picks_b);
        let warped_a = warp(&real_a);
        let warped_b = warp(&real_b);

        let mut batch = SampleBatch::new(warped_a, warped_b, real_a, real_b);
        if let (Some(mask_a), Some(mask_b)) = (
            self.domain_a.select_masks(picks_a),
            self.domain_b.select_masks(picks_b),
        ) {
            batch = batch.with_eye_masks(mask_a, mask_b);
        }

        Some(batch)
    }

    /// Iterate over one epoch of batches
    pub fn iter(&mut self) -> PairedLoaderIter<'_> {
        self.reset();
        PairedLoaderIter { loader: self }
    }
}

/// Iterator adapter for PairedLoader
pub struct PairedLoaderIter<'a> {
    loader: &'a mut PairedLoader,
}

impl<'a> Iterator for PairedLoaderIter<'a> {
    type Item = SampleBatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }
}

/// Light augmentation standing in for the face warp: random horizontal
/// flip of the whole batch plus bounded pixel jitter.
fn warp(images: &Tensor) -> Tensor {
    let mut rng = rand::thread_rng();

    let flipped = if rng.gen_bool(0.5) {
        images.flip([3])
    } else {
        images.copy()
    };

    let noise = Tensor::randn_like(&flipped) * WARP_NOISE;
    (flipped + noise).clamp(-1.0, 1.0).to_kind(Kind::Float)
}
