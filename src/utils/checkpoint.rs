//! Checkpoint save/load for the named sub-networks
//!
//! Each sub-network serializes to `{epoch}_net_{name}.pth` under the save
//! directory, parameter state only. Loading tolerates legacy metadata
//! entries embedded in old archives by discarding them before the copy;
//! a missing file or a parameter mismatch is fatal.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tch::nn::VarStore;
use tch::Tensor;

/// Checkpoint file for one sub-network at one epoch
fn network_path(dir: &Path, epoch: usize, name: &str) -> PathBuf {
    dir.join(format!("{epoch}_net_{name}.pth"))
}

/// Save every named sub-network's parameters for the given epoch
pub fn save_networks(stores: &[(&'static str, &VarStore)], epoch: usize, dir: &str) -> Result<()> {
    let dir = Path::new(dir);
    std::fs::create_dir_all(dir)?;

    for (name, vs) in stores {
        let path = network_path(dir, epoch, name);
        vs.save(&path)
            .with_context(|| format!("saving {name} to {}", path.display()))?;
    }

    tracing::info!("saved {} networks for epoch {} to {}", stores.len(), epoch, dir.display());
    Ok(())
}

/// Load every named sub-network's parameters from the given epoch
///
/// Entries whose name starts with `_metadata` are discarded before the
/// parameters are copied in, so archives written by older tooling load
/// cleanly. Every parameter present in the store must be present in the
/// file with a matching shape.
pub fn load_networks(stores: &[(&'static str, &VarStore)], epoch: usize, dir: &str) -> Result<()> {
    let dir = Path::new(dir);

    for (name, vs) in stores {
        let path = network_path(dir, epoch, name);
        load_store(vs, &path).with_context(|| format!("loading {name} from {}", path.display()))?;
    }

    tracing::info!("loaded {} networks for epoch {} from {}", stores.len(), epoch, dir.display());
    Ok(())
}

fn load_store(vs: &VarStore, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("checkpoint file {} does not exist", path.display());
    }

    let named: HashMap<String, Tensor> = Tensor::load_multi(path)?
        .into_iter()
        .filter(|(name, _)| !name.starts_with("_metadata"))
        .collect();

    tch::no_grad(|| -> Result<()> {
        for (name, mut variable) in vs.variables() {
            let Some(saved) = named.get(&name) else {
                bail!("parameter {name} missing from checkpoint");
            };
            if saved.size() != variable.size() {
                bail!(
                    "parameter {name} has shape {:?} in checkpoint, expected {:?}",
                    saved.size(),
                    variable.size()
                );
            }
            variable.copy_(saved);
        }
        Ok(())
    })
}

/// Latest epoch with a complete set of checkpoints for the given names
pub fn find_latest_epoch(dir: &str, names: &[&str]) -> Option<usize> {
    let dir = Path::new(dir);
    if !dir.exists() {
        return None;
    }

    let mut epochs: Vec<usize> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let file_name = entry.file_name();
            let file_name = file_name.to_str()?;
            let (epoch, _) = file_name.split_once("_net_")?;
            epoch.parse().ok()
        })
        .collect();

    epochs.sort_unstable();
    epochs.dedup();

    epochs
        .into_iter()
        .rev()
        .find(|&epoch| names.iter().all(|name| network_path(dir, epoch, name).exists()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Discriminator;
    use tch::{Device, Kind};

    fn disc_store() -> VarStore {
        let vs = VarStore::new(Device::Cpu);
        let _ = Discriminator::new(&vs.root());
        vs
    }

    fn stores_match(a: &VarStore, b: &VarStore) -> bool {
        let vars_b = b.variables();
        a.variables()
            .iter()
            .all(|(name, t)| t.allclose(&vars_b[name], 0.0, 0.0, false))
    }

    #[test]
    fn test_checkpoint_roundtrip_identical_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().to_str().unwrap();

        let source = disc_store();
        save_networks(&[("DiscriminatorA", &source)], 3, dir).unwrap();

        let target = disc_store();
        assert!(!stores_match(&source, &target));

        load_networks(&[("DiscriminatorA", &target)], 3, dir).unwrap();
        assert!(stores_match(&source, &target));
    }

    #[test]
    fn test_load_discards_legacy_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_net_DiscriminatorA.pth");

        let source = disc_store();
        let mut named: Vec<(String, Tensor)> = source.variables().into_iter().collect();
        named.push((
            "_metadata.version".to_string(),
            Tensor::from_slice(&[1.0_f32]),
        ));
        Tensor::save_multi(&named, &path).unwrap();

        let target = disc_store();
        load_networks(
            &[("DiscriminatorA", &target)],
            1,
            dir.path().to_str().unwrap(),
        )
        .unwrap();

        assert!(stores_match(&source, &target));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = disc_store();

        let result = load_networks(
            &[("DiscriminatorA", &target)],
            7,
            dir.path().to_str().unwrap(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_find_latest_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        let vs = disc_store();
        save_networks(&[("DiscriminatorA", &vs)], 1, dir_str).unwrap();
        save_networks(&[("DiscriminatorA", &vs)], 10, dir_str).unwrap();

        assert_eq!(find_latest_epoch(dir_str, &["DiscriminatorA"]), Some(10));
        assert_eq!(find_latest_epoch(dir_str, &["DiscriminatorA", "DecoderA"]), None);
    }
}
