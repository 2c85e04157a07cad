//! Shared building blocks for the encoder, decoders and discriminators
//!
//! Provides the self-attention block used at several feature resolutions
//! and a plain residual block for the decoder tail.

use tch::{nn, nn::Module, Kind, Tensor};

/// Self-attention over spatial positions (SAGAN style)
///
/// Query/key project to `dim / 8` channels, value keeps the full width.
/// The attended result is scaled by a learned `gamma` (initialised to zero,
/// so the block starts as an identity) and added back to the input.
#[derive(Debug)]
pub struct SABlock {
    query: nn::Conv2D,
    key: nn::Conv2D,
    value: nn::Conv2D,
    gamma: Tensor,
    relu_out: bool,
}

impl SABlock {
    /// Create a self-attention block for `dim`-channel feature maps
    ///
    /// # Arguments
    ///
    /// * `vs` - Variable store path
    /// * `dim` - Number of input/output channels
    /// * `relu_out` - Apply ReLU to the attended output
    pub fn new(vs: &nn::Path, dim: i64, relu_out: bool) -> Self {
        let proj = (dim / 8).max(1);
        let query = nn::conv2d(vs / "query", dim, proj, 1, Default::default());
        let key = nn::conv2d(vs / "key", dim, proj, 1, Default::default());
        let value = nn::conv2d(vs / "value", dim, dim, 1, Default::default());
        let gamma = vs.zeros("gamma", &[1]);

        Self {
            query,
            key,
            value,
            gamma,
            relu_out,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch, dim, height, width)
    ///
    /// # Returns
    ///
    /// Tuple of (attended feature map, attention weights over positions)
    pub fn forward(&self, input: &Tensor) -> (Tensor, Tensor) {
        let size = input.size();
        let (b, c, h, w) = (size[0], size[1], size[2], size[3]);
        let n = h * w;

        let q = self.query.forward(input).view([b, -1, n]);
        let k = self.key.forward(input).view([b, -1, n]);
        let v = self.value.forward(input).view([b, c, n]);

        // (b, n, n): row i holds the weights position i pays to every position
        let attention = q.transpose(1, 2).bmm(&k).softmax(-1, Kind::Float);

        let attended = v.bmm(&attention.transpose(1, 2)).view([b, c, h, w]);
        let out = &self.gamma * attended + input;

        if self.relu_out {
            (out.relu(), attention)
        } else {
            (out, attention)
        }
    }
}

/// Residual block: two batch-normed 3x3 convolutions with a skip connection
#[derive(Debug)]
pub struct ResidualBlock {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
}

impl ResidualBlock {
    /// Create a residual block for `dim`-channel feature maps
    pub fn new(vs: &nn::Path, dim: i64) -> Self {
        let conv_config = nn::ConvConfig {
            padding: 1,
            bias: false,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", dim, dim, 3, conv_config);
        let bn1 = nn::batch_norm2d(vs / "bn1", dim, Default::default());
        let conv2 = nn::conv2d(vs / "conv2", dim, dim, 3, conv_config);
        let bn2 = nn::batch_norm2d(vs / "bn2", dim, Default::default());

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
        }
    }

    /// Forward pass, preserving the input shape
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        use tch::nn::ModuleT;

        let x = self.conv1.forward(input);
        let x = self.bn1.forward_t(&x, train);
        let x = x.leaky_relu();
        let x = self.conv2.forward(&x);
        let x = self.bn2.forward_t(&x, train);

        (x + input).leaky_relu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device};

    #[test]
    fn test_sablock_preserves_shape() {
        let vs = VarStore::new(Device::Cpu);
        let block = SABlock::new(&vs.root(), 64, false);

        let input = Tensor::randn([2, 64, 8, 8], (Kind::Float, Device::Cpu));
        let (out, attention) = block.forward(&input);

        assert_eq!(out.size(), vec![2, 64, 8, 8]);
        assert_eq!(attention.size(), vec![2, 64, 64]);
    }

    #[test]
    fn test_sablock_starts_as_identity() {
        // gamma is zero-initialised, so the block must pass the input through
        let vs = VarStore::new(Device::Cpu);
        let block = SABlock::new(&vs.root(), 32, false);

        let input = Tensor::randn([2, 32, 4, 4], (Kind::Float, Device::Cpu));
        let (out, _) = block.forward(&input);

        assert!(out.allclose(&input, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_residual_block_preserves_shape() {
        let vs = VarStore::new(Device::Cpu);
        let block = ResidualBlock::new(&vs.root(), 64);

        let input = Tensor::randn([2, 64, 16, 16], (Kind::Float, Device::Cpu));
        let out = block.forward_t(&input, true);

        assert_eq!(out.size(), vec![2, 64, 16, 16]);
    }
}
