//! Shared encoder mapping 64x64 face crops into the latent feature volume
//!
//! Both domains pass through the same encoder; domain identity only enters
//! at the decoders. The output contract is a (512, 8, 8) volume per sample.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::blocks::SABlock;

/// Channel/height/width of the encoder output, enforced on every forward.
pub const LATENT_SHAPE: [i64; 3] = [512, 8, 8];

/// Shared encoder network
#[derive(Debug)]
pub struct Encoder {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    sablock1: SABlock,
    conv4: nn::Conv2D,
    bn4: nn::BatchNorm,
    sablock2: SABlock,
    conv5: nn::Conv2D,
    bn5: nn::BatchNorm,
    fc1: nn::Linear,
    fc_bn1: nn::BatchNorm,
    fc2: nn::Linear,
    fc_bn2: nn::BatchNorm,
    conv6: nn::Conv2D,
    bn6: nn::BatchNorm,
}

impl Encoder {
    /// Create the encoder under the given variable store path
    pub fn new(vs: &nn::Path) -> Self {
        let no_bias = nn::ConvConfig {
            bias: false,
            ..Default::default()
        };
        let strided = nn::ConvConfig {
            stride: 2,
            bias: false,
            ..Default::default()
        };
        let no_bias_fc = nn::LinearConfig {
            bias: false,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", 3, 64, 3, no_bias);
        let bn1 = nn::batch_norm2d(vs / "bn1", 64, Default::default());
        let conv2 = nn::conv2d(vs / "conv2", 64, 128, 3, strided);
        let bn2 = nn::batch_norm2d(vs / "bn2", 128, Default::default());
        let conv3 = nn::conv2d(vs / "conv3", 128, 256, 3, strided);
        let bn3 = nn::batch_norm2d(vs / "bn3", 256, Default::default());
        let sablock1 = SABlock::new(&(vs / "sablock1"), 256, true);
        let conv4 = nn::conv2d(vs / "conv4", 256, 512, 3, strided);
        let bn4 = nn::batch_norm2d(vs / "bn4", 512, Default::default());
        let sablock2 = SABlock::new(&(vs / "sablock2"), 512, true);
        let conv5 = nn::conv2d(vs / "conv5", 512, 1024, 3, no_bias);
        let bn5 = nn::batch_norm2d(vs / "bn5", 1024, Default::default());

        let fc1 = nn::linear(vs / "fc1", 1024 * 4 * 4, 1024, no_bias_fc);
        let fc_bn1 = nn::batch_norm1d(vs / "fc_bn1", 1024, Default::default());
        let fc2 = nn::linear(vs / "fc2", 1024, 1024 * 4 * 4, no_bias_fc);
        let fc_bn2 = nn::batch_norm1d(vs / "fc_bn2", 1024 * 4 * 4, Default::default());

        // 1x1 expansion feeding the pixel-shuffle upscale to (512, 8, 8)
        let conv6 = nn::conv2d(vs / "conv6", 1024, 2048, 1, no_bias);
        let bn6 = nn::batch_norm2d(vs / "bn6", 2048, Default::default());

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            sablock1,
            conv4,
            bn4,
            sablock2,
            conv5,
            bn5,
            fc1,
            fc_bn1,
            fc2,
            fc_bn2,
            conv6,
            bn6,
        }
    }

    /// Encode a batch of images
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch, 3, 64, 64)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, 512, 8, 8)
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        let x = self.bn1.forward_t(&self.conv1.forward(input), train).relu();
        let x = self.bn2.forward_t(&self.conv2.forward(&x), train).relu();
        let x = self.bn3.forward_t(&self.conv3.forward(&x), train).relu();

        let (x, _) = self.sablock1.forward(&x);

        let x = self.bn4.forward_t(&self.conv4.forward(&x), train).relu();

        let (x, _) = self.sablock2.forward(&x);

        let x = self.bn5.forward_t(&self.conv5.forward(&x), train).relu();

        let x = x.view([-1, 1024 * 4 * 4]);
        let x = self.fc_bn1.forward_t(&self.fc1.forward(&x), train);
        let x = self.fc_bn2.forward_t(&self.fc2.forward(&x), train);
        let x = x.view([-1, 1024, 4, 4]);

        let x = self.bn6.forward_t(&self.conv6.forward(&x), train).relu();
        let x = x.pixel_shuffle(2);

        assert_eq!(&x.size()[1..], &LATENT_SHAPE, "encoder output shape");

        x
    }
}

impl ModuleT for Encoder {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Encoder::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_encoder_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = Encoder::new(&vs.root());

        let input = Tensor::randn([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let latent = encoder.forward_t(&input, true);

        assert_eq!(latent.size(), vec![2, 512, 8, 8]);
    }

    #[test]
    fn test_encoder_batch_independent_shape() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = Encoder::new(&vs.root());

        for batch in [2, 3] {
            let input = Tensor::randn([batch, 3, 64, 64], (Kind::Float, Device::Cpu));
            let latent = encoder.forward_t(&input, true);
            assert_eq!(latent.size(), vec![batch, 512, 8, 8]);
        }
    }
}
