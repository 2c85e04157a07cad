//! Patch discriminator for one identity domain
//!
//! Downsamples a 64x64 image through strided convolutions with
//! self-attention and emits a grid of patch realness logits.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::blocks::SABlock;

/// Discriminator network
#[derive(Debug)]
pub struct Discriminator {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    sablock1: SABlock,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    sablock2: SABlock,
    conv4: nn::Conv2D,
    bn4: nn::BatchNorm,
}

impl Discriminator {
    /// Create a discriminator under the given variable store path
    pub fn new(vs: &nn::Path) -> Self {
        let strided = nn::ConvConfig {
            stride: 2,
            bias: false,
            ..Default::default()
        };
        let head = nn::ConvConfig {
            bias: false,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", 3, 64, 3, strided);
        let bn1 = nn::batch_norm2d(vs / "bn1", 64, Default::default());
        let conv2 = nn::conv2d(vs / "conv2", 64, 128, 3, strided);
        let bn2 = nn::batch_norm2d(vs / "bn2", 128, Default::default());
        let sablock1 = SABlock::new(&(vs / "sablock1"), 128, false);
        let conv3 = nn::conv2d(vs / "conv3", 128, 256, 3, strided);
        let bn3 = nn::batch_norm2d(vs / "bn3", 256, Default::default());
        let sablock2 = SABlock::new(&(vs / "sablock2"), 256, false);
        let conv4 = nn::conv2d(vs / "conv4", 256, 1, 5, head);
        let bn4 = nn::batch_norm2d(vs / "bn4", 1, Default::default());

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            sablock1,
            conv3,
            bn3,
            sablock2,
            conv4,
            bn4,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch, 3, 64, 64)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Patch logits of shape (batch, 1, 3, 3)
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        assert_eq!(&input.size()[1..], &[3, 64, 64], "discriminator input shape");

        let x = self.bn1.forward_t(&self.conv1.forward(input), train).leaky_relu();
        let x = self.bn2.forward_t(&self.conv2.forward(&x), train).leaky_relu();

        let (x, _) = self.sablock1.forward(&x);

        let x = self.bn3.forward_t(&self.conv3.forward(&x), train).leaky_relu();

        let (x, _) = self.sablock2.forward(&x);

        self.bn4.forward_t(&self.conv4.forward(&x), train)
    }

    /// Realness probabilities per patch (inference mode)
    pub fn classify(&self, input: &Tensor) -> Tensor {
        self.forward_t(input, false).sigmoid()
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_discriminator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root());

        let input = Tensor::randn([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let logits = disc.forward_t(&input, true);

        assert_eq!(logits.size(), vec![2, 1, 3, 3]);
    }

    #[test]
    fn test_discriminator_classify_range() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root());

        let input = Tensor::randn([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let probs = disc.classify(&input);

        let min_val = probs.min().double_value(&[]);
        let max_val = probs.max().double_value(&[]);
        assert!(min_val >= 0.0 && max_val <= 1.0);
    }

    #[test]
    #[should_panic(expected = "discriminator input shape")]
    fn test_discriminator_rejects_bad_input() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root());

        let input = Tensor::randn([2, 3, 32, 32], (Kind::Float, Device::Cpu));
        let _ = disc.forward_t(&input, true);
    }
}
