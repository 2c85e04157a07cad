//! Optimizer groups spanning several variable stores
//!
//! Each sub-network keeps its own `VarStore`, so a logical parameter group
//! (generator side, discriminator side, or everything for the cycle phase)
//! is a set of Adam optimizers stepped together. Adam state is
//! per-parameter, so the set behaves exactly like one optimizer over the
//! union of the stores.

use anyhow::Result;
use tch::nn::{self, OptimizerConfig, VarStore};

/// A fixed set of Adam optimizers treated as one parameter group
pub struct OptimizerGroup {
    optimizers: Vec<nn::Optimizer>,
}

impl OptimizerGroup {
    /// Build an Adam optimizer per member store
    pub fn adam(stores: &[&VarStore], lr: f64) -> Result<Self> {
        let mut optimizers = Vec::with_capacity(stores.len());
        for vs in stores {
            let optimizer = nn::Adam {
                beta1: 0.9,
                beta2: 0.999,
                wd: 0.0,
            }
            .build(vs, lr)?;
            optimizers.push(optimizer);
        }

        Ok(Self { optimizers })
    }

    /// Clear accumulated gradients for every parameter in the group
    pub fn zero_grad(&mut self) {
        for optimizer in &mut self.optimizers {
            optimizer.zero_grad();
        }
    }

    /// Apply one update to every parameter in the group
    pub fn step(&mut self) {
        for optimizer in &mut self.optimizers {
            optimizer.step();
        }
    }

    /// Change the learning rate for the whole group
    pub fn set_lr(&mut self, lr: f64) {
        for optimizer in &mut self.optimizers {
            optimizer.set_lr(lr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::Module;
    use tch::{Device, Kind, Tensor};

    #[test]
    fn test_group_steps_all_members() {
        let vs_a = VarStore::new(Device::Cpu);
        let vs_b = VarStore::new(Device::Cpu);
        let linear_a = nn::linear(vs_a.root() / "fc", 4, 1, Default::default());
        let linear_b = nn::linear(vs_b.root() / "fc", 4, 1, Default::default());

        let mut group = OptimizerGroup::adam(&[&vs_a, &vs_b], 1e-2).unwrap();

        let before_a = linear_a.ws.detach().copy();
        let before_b = linear_b.ws.detach().copy();

        let input = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));
        let loss = (linear_a.forward(&input) + linear_b.forward(&input))
            .square()
            .mean(Kind::Float);

        group.zero_grad();
        loss.backward();
        group.step();

        assert!(!linear_a.ws.allclose(&before_a, 1e-12, 1e-12, false));
        assert!(!linear_b.ws.allclose(&before_b, 1e-12, 1e-12, false));
    }

    #[test]
    fn test_step_without_grads_is_noop() {
        let vs = VarStore::new(Device::Cpu);
        let linear = nn::linear(vs.root() / "fc", 4, 1, Default::default());

        let mut group = OptimizerGroup::adam(&[&vs], 1e-2).unwrap();
        let before = linear.ws.detach().copy();

        group.zero_grad();
        group.step();

        assert!(linear.ws.allclose(&before, 1e-12, 1e-12, false));
    }
}
