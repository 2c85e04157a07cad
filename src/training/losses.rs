//! Loss functions for adversarial face-swap training
//!
//! Pure functions from tensors and a weight table to scalar loss tensors.
//! Adversarial terms use the least-squares (L2) formulation; pixel and
//! cycle terms use L1.

use serde::{Deserialize, Serialize};
use tch::{Kind, Reduction, Tensor};

/// Per-term loss weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossWeights {
    /// Adversarial terms (generator and discriminator)
    pub adversarial: f64,
    /// L1 reconstruction against the real image
    pub reconstruction: f64,
    /// Alpha-mask regularization
    pub mask: f64,
    /// Deep-feature (perceptual) distance
    pub perceptual: f64,
    /// Gradient-difference (edge) term
    pub edge: f64,
    /// Eye-region emphasis term
    pub eye: f64,
    /// Cycle-consistency term
    pub cycle: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            adversarial: 0.5,
            reconstruction: 3.0,
            mask: 0.1,
            perceptual: 0.1,
            edge: 1.0,
            eye: 10.0,
            cycle: 10.0,
        }
    }
}

/// Frozen deep-feature extractor consumed by the perceptual loss
///
/// Implementations must be differentiable tch ops so the loss gradient can
/// flow back into the generated image; the extractor's own parameters (if
/// any) are never trained.
pub trait FeatureExtractor {
    /// Map a batch of images to a feature tensor
    fn features(&self, images: &Tensor) -> Tensor;
}

/// Pyramid-pooling feature extractor
///
/// A parameter-free stand-in with the same role as an external face
/// recognition backbone: compares images in a spatially pooled space.
#[derive(Debug, Clone, Copy)]
pub struct AvgPoolFeatures {
    /// Side length of the pooled feature map
    pub out_size: i64,
}

impl Default for AvgPoolFeatures {
    fn default() -> Self {
        Self { out_size: 8 }
    }
}

impl FeatureExtractor for AvgPoolFeatures {
    fn features(&self, images: &Tensor) -> Tensor {
        images.adaptive_avg_pool2d([self.out_size, self.out_size])
    }
}

/// Discriminator adversarial loss (least squares)
///
/// Real predictions are pushed toward 1, predictions on the composited
/// fake and on the raw decoder output toward 0.
pub fn adversarial_loss_discriminator(
    fake_pred: &Tensor,
    output_pred: &Tensor,
    real_pred: &Tensor,
    weights: &LossWeights,
) -> Tensor {
    let real_loss = real_pred.mse_loss(&Tensor::ones_like(real_pred), Reduction::Mean);
    let fake_loss = fake_pred.mse_loss(&Tensor::zeros_like(fake_pred), Reduction::Mean);
    let output_loss = output_pred.mse_loss(&Tensor::zeros_like(output_pred), Reduction::Mean);

    (real_loss + fake_loss * 0.5 + output_loss * 0.5) * weights.adversarial
}

/// Generator adversarial loss (least squares)
///
/// Both the composited fake and the raw decoder output should be scored
/// as real by the frozen discriminator.
pub fn adversarial_loss_generator(
    fake_pred: &Tensor,
    output_pred: &Tensor,
    weights: &LossWeights,
) -> Tensor {
    let fake_loss = fake_pred.mse_loss(&Tensor::ones_like(fake_pred), Reduction::Mean);
    let output_loss = output_pred.mse_loss(&Tensor::ones_like(output_pred), Reduction::Mean);

    (fake_loss * 0.5 + output_loss * 0.5) * weights.adversarial
}

/// L1 reconstruction loss between decoder output and the real image
pub fn reconstruction_loss(output: &Tensor, real: &Tensor, weights: &LossWeights) -> Tensor {
    output.l1_loss(real, Reduction::Mean) * weights.reconstruction
}

/// Alpha-mask regularization
///
/// Penalizes mask mass above `threshold`, keeping the blend sparse while
/// leaving low activations free.
pub fn mask_loss(mask: &Tensor, threshold: f64, weights: &LossWeights) -> Tensor {
    (mask - threshold).clamp_min(0.0).mean(Kind::Float) * weights.mask
}

/// Perceptual loss: L2 distance between deep features of real and fake
///
/// The real image goes through `extractor`, the fake through the companion
/// `extractor_for_pl`, mirroring the two frozen backbone copies handed to
/// the orchestrator at construction.
pub fn perceptual_loss(
    real: &Tensor,
    fake: &Tensor,
    extractor: &dyn FeatureExtractor,
    extractor_for_pl: &dyn FeatureExtractor,
    weights: &LossWeights,
) -> Tensor {
    let real_features = extractor.features(real).detach();
    let fake_features = extractor_for_pl.features(fake);

    fake_features.mse_loss(&real_features, Reduction::Mean) * weights.perceptual
}

/// Edge loss: L1 on spatial gradients, with extra weight inside the eye mask
pub fn edge_loss(
    output: &Tensor,
    real: &Tensor,
    eye_mask: &Tensor,
    weights: &LossWeights,
) -> Tensor {
    let (out_dx, out_dy) = image_gradients(output);
    let (real_dx, real_dy) = image_gradients(real);

    let (mask_dx, mask_dy) = mask_like_gradients(eye_mask);

    let base = out_dx.l1_loss(&real_dx, Reduction::Mean) + out_dy.l1_loss(&real_dy, Reduction::Mean);
    let eyes = ((&out_dx - &real_dx) * mask_dx).abs().mean(Kind::Float)
        + ((&out_dy - &real_dy) * mask_dy).abs().mean(Kind::Float);

    (base + eyes) * weights.edge
}

/// Eye loss: L1 between output and real restricted to the eye region
pub fn eye_loss(output: &Tensor, real: &Tensor, eye_mask: &Tensor, weights: &LossWeights) -> Tensor {
    ((output - real) * eye_mask).abs().mean(Kind::Float) * weights.eye
}

/// Cycle-consistency loss: L1 between a real image and its round trip
pub fn cycle_consistency_loss(real: &Tensor, cycled: &Tensor, weights: &LossWeights) -> Tensor {
    cycled.l1_loss(real, Reduction::Mean) * weights.cycle
}

/// Forward differences along width and height of an image batch (B, C, H, W)
fn image_gradients(images: &Tensor) -> (Tensor, Tensor) {
    let size = images.size();
    let (h, w) = (size[2], size[3]);

    let dx = images.narrow(3, 1, w - 1) - images.narrow(3, 0, w - 1);
    let dy = images.narrow(2, 1, h - 1) - images.narrow(2, 0, h - 1);

    (dx, dy)
}

/// Crop the (B, 1, H, W) mask to the gradient shapes so it broadcasts
fn mask_like_gradients(mask: &Tensor) -> (Tensor, Tensor) {
    let size = mask.size();
    let (h, w) = (size[2], size[3]);

    (mask.narrow(3, 0, w - 1), mask.narrow(2, 0, h - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn images(batch: i64) -> Tensor {
        Tensor::randn([batch, 3, 64, 64], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn test_discriminator_loss_scalar_positive() {
        let fake = Tensor::randn([4, 1, 3, 3], (Kind::Float, Device::Cpu));
        let output = Tensor::randn([4, 1, 3, 3], (Kind::Float, Device::Cpu));
        let real = Tensor::randn([4, 1, 3, 3], (Kind::Float, Device::Cpu));

        let loss = adversarial_loss_discriminator(&fake, &output, &real, &LossWeights::default());

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.double_value(&[]) > 0.0);
    }

    #[test]
    fn test_perfect_discriminator_loss_is_zero() {
        let real = Tensor::ones([4, 1, 3, 3], (Kind::Float, Device::Cpu));
        let fake = Tensor::zeros([4, 1, 3, 3], (Kind::Float, Device::Cpu));
        let output = Tensor::zeros([4, 1, 3, 3], (Kind::Float, Device::Cpu));

        let loss = adversarial_loss_discriminator(&fake, &output, &real, &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_reconstruction_loss_zero_for_identical() {
        let a = images(2);
        let loss = reconstruction_loss(&a, &a.copy(), &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_reconstruction_loss_scales_with_weight() {
        let a = images(2);
        let b = images(2);

        let mut weights = LossWeights::default();
        weights.reconstruction = 1.0;
        let base = reconstruction_loss(&a, &b, &weights).double_value(&[]);

        weights.reconstruction = 2.0;
        let doubled = reconstruction_loss(&a, &b, &weights).double_value(&[]);

        assert!((doubled - 2.0 * base).abs() < 1e-6);
    }

    #[test]
    fn test_mask_loss_free_below_threshold() {
        let mask = Tensor::full([2, 1, 64, 64], 0.2, (Kind::Float, Device::Cpu));
        let loss = mask_loss(&mask, 0.3, &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_mask_loss_penalizes_above_threshold() {
        let mask = Tensor::full([2, 1, 64, 64], 0.9, (Kind::Float, Device::Cpu));
        let loss = mask_loss(&mask, 0.3, &LossWeights::default());

        assert!(loss.double_value(&[]) > 0.0);
    }

    #[test]
    fn test_perceptual_loss_zero_for_identical() {
        let a = images(2);
        let extractor = AvgPoolFeatures::default();

        let loss = perceptual_loss(&a, &a.copy(), &extractor, &extractor, &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_edge_and_eye_losses_zero_for_identical() {
        let a = images(2);
        let mask = Tensor::ones([2, 1, 64, 64], (Kind::Float, Device::Cpu));
        let weights = LossWeights::default();

        assert!(edge_loss(&a, &a.copy(), &mask, &weights).double_value(&[]) < 1e-6);
        assert!(eye_loss(&a, &a.copy(), &mask, &weights).double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_eye_loss_ignores_unmasked_region() {
        let a = images(2);
        let b = images(2);
        let mask = Tensor::zeros([2, 1, 64, 64], (Kind::Float, Device::Cpu));

        let loss = eye_loss(&a, &b, &mask, &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn test_cycle_loss_zero_for_identical() {
        let a = images(2);
        let loss = cycle_consistency_loss(&a, &a.copy(), &LossWeights::default());

        assert!(loss.double_value(&[]) < 1e-6);
    }
}
