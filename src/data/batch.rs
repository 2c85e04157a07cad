//! Training batch: paired warped/real images for both domains
//!
//! A batch is consumed by exactly one training step and never buffered.

use tch::{Device, Tensor};

/// One step's worth of paired images
///
/// All image tensors are (batch, 3, 64, 64) in [-1, 1]; eye masks, when
/// present, are (batch, 1, 64, 64) in [0, 1].
#[derive(Debug)]
pub struct SampleBatch {
    /// Augmented domain-A input fed to the encoder
    pub warped_a: Tensor,
    /// Augmented domain-B input fed to the encoder
    pub warped_b: Tensor,
    /// Ground-truth domain-A image
    pub real_a: Tensor,
    /// Ground-truth domain-B image
    pub real_b: Tensor,
    /// Eye-region mask for domain A
    pub eye_mask_a: Option<Tensor>,
    /// Eye-region mask for domain B
    pub eye_mask_b: Option<Tensor>,
}

impl SampleBatch {
    /// Batch without eye masks
    pub fn new(warped_a: Tensor, warped_b: Tensor, real_a: Tensor, real_b: Tensor) -> Self {
        Self {
            warped_a,
            warped_b,
            real_a,
            real_b,
            eye_mask_a: None,
            eye_mask_b: None,
        }
    }

    /// Attach per-domain eye masks
    pub fn with_eye_masks(mut self, eye_mask_a: Tensor, eye_mask_b: Tensor) -> Self {
        self.eye_mask_a = Some(eye_mask_a);
        self.eye_mask_b = Some(eye_mask_b);
        self
    }

    /// Number of samples in the batch
    pub fn len(&self) -> i64 {
        self.real_a.size()[0]
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every tensor to the given compute device
    pub fn to_device(self, device: Device) -> Self {
        Self {
            warped_a: self.warped_a.to_device(device),
            warped_b: self.warped_b.to_device(device),
            real_a: self.real_a.to_device(device),
            real_b: self.real_b.to_device(device),
            eye_mask_a: self.eye_mask_a.map(|m| m.to_device(device)),
            eye_mask_b: self.eye_mask_b.map(|m| m.to_device(device)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    fn image(batch: i64) -> Tensor {
        Tensor::randn([batch, 3, 64, 64], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn test_batch_len() {
        let batch = SampleBatch::new(image(3), image(3), image(3), image(3));
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert!(batch.eye_mask_a.is_none());
    }

    #[test]
    fn test_batch_with_masks() {
        let mask = Tensor::zeros([2, 1, 64, 64], (Kind::Float, Device::Cpu));
        let batch = SampleBatch::new(image(2), image(2), image(2), image(2))
            .with_eye_masks(mask.copy(), mask);

        assert!(batch.eye_mask_a.is_some());
        assert!(batch.eye_mask_b.is_some());
    }
}
