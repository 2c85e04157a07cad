//! Face dataset: aligned 64x64 crops for one identity domain
//!
//! Images load into a single stacked float tensor scaled to [-1, 1].
//! An optional mask directory supplies per-image eye-region masks.

use anyhow::{bail, Context, Result};
use tch::{vision::image, Kind, Tensor};

/// All images of one domain, stacked
#[derive(Debug)]
pub struct FaceDataset {
    /// (num_images, 3, 64, 64) in [-1, 1]
    images: Tensor,
    /// (num_images, 1, 64, 64) in [0, 1]
    eye_masks: Option<Tensor>,
}

impl FaceDataset {
    /// Load every image under `dir`, resized to 64x64
    pub fn from_dir(dir: &str) -> Result<Self> {
        let raw = image::load_dir(dir, 64, 64)
            .with_context(|| format!("loading face images from {dir}"))?;
        if raw.size()[0] == 0 {
            bail!("no images found in {dir}");
        }

        let images = raw.to_kind(Kind::Float) / 127.5 - 1.0;
        Ok(Self {
            images,
            eye_masks: None,
        })
    }

    /// Load a parallel directory of eye masks (same file count and order)
    pub fn with_mask_dir(mut self, dir: &str) -> Result<Self> {
        let raw = image::load_dir(dir, 64, 64)
            .with_context(|| format!("loading eye masks from {dir}"))?;
        if raw.size()[0] != self.len() {
            bail!(
                "mask directory {dir} holds {} entries for {} images",
                raw.size()[0],
                self.len()
            );
        }

        // Single-channel mask from the first channel
        let masks = raw.narrow(1, 0, 1).to_kind(Kind::Float) / 255.0;
        self.eye_masks = Some(masks);
        Ok(self)
    }

    /// Build directly from tensors already in network range
    pub fn from_tensor(images: Tensor, eye_masks: Option<Tensor>) -> Result<Self> {
        if &images.size()[1..] != &[3, 64, 64] {
            bail!("face images must be (n, 3, 64, 64), got {:?}", images.size());
        }
        if let Some(masks) = &eye_masks {
            if masks.size()[0] != images.size()[0] || &masks.size()[1..] != &[1, 64, 64] {
                bail!("eye masks must be (n, 1, 64, 64) matching the images");
            }
        }

        Ok(Self { images, eye_masks })
    }

    /// Number of images in the domain
    pub fn len(&self) -> i64 {
        self.images.size()[0]
    }

    /// Whether the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether eye masks were loaded
    pub fn has_masks(&self) -> bool {
        self.eye_masks.is_some()
    }

    /// Gather images at the given indices
    pub fn select(&self, indices: &[i64]) -> Tensor {
        let index = Tensor::from_slice(indices);
        self.images.index_select(0, &index)
    }

    /// Gather eye masks at the given indices, if masks are present
    pub fn select_masks(&self, indices: &[i64]) -> Option<Tensor> {
        let index = Tensor::from_slice(indices);
        self.eye_masks.as_ref().map(|m| m.index_select(0, &index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn images(n: i64) -> Tensor {
        Tensor::rand([n, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0
    }

    #[test]
    fn test_from_tensor_and_select() {
        let dataset = FaceDataset::from_tensor(images(5), None).unwrap();
        assert_eq!(dataset.len(), 5);
        assert!(!dataset.has_masks());

        let picked = dataset.select(&[0, 2, 4]);
        assert_eq!(picked.size(), vec![3, 3, 64, 64]);
    }

    #[test]
    fn test_from_tensor_rejects_bad_shapes() {
        let bad = Tensor::zeros([5, 3, 32, 32], (Kind::Float, Device::Cpu));
        assert!(FaceDataset::from_tensor(bad, None).is_err());

        let masks = Tensor::zeros([4, 1, 64, 64], (Kind::Float, Device::Cpu));
        assert!(FaceDataset::from_tensor(images(5), Some(masks)).is_err());
    }

    #[test]
    fn test_select_masks() {
        let masks = Tensor::zeros([5, 1, 64, 64], (Kind::Float, Device::Cpu));
        let dataset = FaceDataset::from_tensor(images(5), Some(masks)).unwrap();

        let picked = dataset.select_masks(&[1, 3]).unwrap();
        assert_eq!(picked.size(), vec![2, 1, 64, 64]);
    }
}
