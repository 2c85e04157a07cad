//! Domain decoder producing a face image and its alpha blending mask
//!
//! One decoder exists per identity domain. Each consumes the shared
//! encoder's (512, 8, 8) volume and upsamples back to 64x64, emitting a
//! tanh BGR output and a sigmoid single-channel alpha mask.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::blocks::{ResidualBlock, SABlock};
use super::encoder::LATENT_SHAPE;

/// Decoder network for one domain
#[derive(Debug)]
pub struct Decoder {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    sablock1: SABlock,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    resblock: ResidualBlock,
    bn: nn::BatchNorm,
    sablock2: SABlock,
    mask_head: nn::Conv2D,
    output_head: nn::Conv2D,
}

impl Decoder {
    /// Create a decoder under the given variable store path
    pub fn new(vs: &nn::Path) -> Self {
        let no_bias = nn::ConvConfig {
            padding: 1,
            bias: false,
            ..Default::default()
        };
        let with_bias = nn::ConvConfig {
            padding: 1,
            ..Default::default()
        };

        // Each stage quadruples channels for a pixel-shuffle x2 upscale
        let conv1 = nn::conv2d(vs / "conv1", 512, 256 * 2 * 2, 3, no_bias);
        let bn1 = nn::batch_norm2d(vs / "bn1", 1024, Default::default());
        let conv2 = nn::conv2d(vs / "conv2", 256, 128 * 2 * 2, 3, no_bias);
        let bn2 = nn::batch_norm2d(vs / "bn2", 512, Default::default());
        let sablock1 = SABlock::new(&(vs / "sablock1"), 128, false);
        let conv3 = nn::conv2d(vs / "conv3", 128, 64 * 2 * 2, 3, no_bias);
        let bn3 = nn::batch_norm2d(vs / "bn3", 256, Default::default());
        let resblock = ResidualBlock::new(&(vs / "resblock"), 64);
        let bn = nn::batch_norm2d(vs / "bn", 64, Default::default());
        let sablock2 = SABlock::new(&(vs / "sablock2"), 64, false);

        let mask_head = nn::conv2d(vs / "mask_head", 64, 1, 3, with_bias);
        let output_head = nn::conv2d(vs / "output_head", 64, 3, 3, with_bias);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            sablock1,
            conv3,
            bn3,
            resblock,
            bn,
            sablock2,
            mask_head,
            output_head,
        }
    }

    /// Decode a latent volume into (output, mask)
    ///
    /// # Arguments
    ///
    /// * `latent` - Tensor of shape (batch, 512, 8, 8)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tuple of (tanh output (batch, 3, 64, 64), sigmoid mask (batch, 1, 64, 64))
    pub fn forward_t(&self, latent: &Tensor, train: bool) -> (Tensor, Tensor) {
        assert_eq!(&latent.size()[1..], &LATENT_SHAPE, "decoder input shape");

        let x = self.bn1.forward_t(&self.conv1.forward(latent), train);
        let x = x.leaky_relu().pixel_shuffle(2);

        let x = self.bn2.forward_t(&self.conv2.forward(&x), train);
        let x = x.leaky_relu().pixel_shuffle(2);

        let (x, _) = self.sablock1.forward(&x);

        let x = self.bn3.forward_t(&self.conv3.forward(&x), train);
        let x = x.leaky_relu().pixel_shuffle(2);

        let x = self.resblock.forward_t(&x, train);
        let x = self.bn.forward_t(&x, train);

        let (x, _) = self.sablock2.forward(&x);

        let mask = self.mask_head.forward(&x).sigmoid();
        let output = self.output_head.forward(&x).tanh();

        assert_eq!(&mask.size()[1..], &[1, 64, 64], "decoder mask shape");
        assert_eq!(&output.size()[1..], &[3, 64, 64], "decoder output shape");

        (output, mask)
    }
}
