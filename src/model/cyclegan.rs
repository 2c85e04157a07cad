//! Face-swap orchestration: inference swapper and training orchestrator
//!
//! `FaceSwapper` is the deployable shape: the shared encoder and both
//! domain decoders. `CycleGan` wraps it for training, adding the two
//! discriminators, the three optimizer groups and the alternating
//! freeze/backward/step schedule that keeps adversarial gradients from
//! leaking across sides.

use anyhow::{anyhow, bail, Result};
use tch::nn::VarStore;
use tch::{Device, Tensor};

use crate::data::SampleBatch;
use crate::training::losses::{self, FeatureExtractor, LossWeights};
use crate::training::metrics::LossLedger;
use crate::training::optim::OptimizerGroup;
use crate::utils::config::{Config, LossConfig};

use super::decoder::Decoder;
use super::discriminator::Discriminator;
use super::encoder::Encoder;

/// Backward pass that keeps the graph alive for the step's later phases.
fn backward_retaining(loss: &Tensor) {
    let _ = Tensor::run_backward(&[loss], &[] as &[&Tensor], true, false);
}

/// Alpha blend: `mask * output + (1 - mask) * base`
fn composite(output: &Tensor, mask: &Tensor, base: &Tensor) -> Tensor {
    mask * output + (Tensor::ones_like(mask) - mask) * base
}

/// Cross-domain outputs from a gradient-free display pass
#[derive(Debug)]
pub struct DisplayOutput {
    /// Domain-B image rendered with domain-A's decoder
    pub display_a: Tensor,
    /// Domain-A image rendered with domain-B's decoder
    pub display_b: Tensor,
}

/// Inference shape: shared encoder plus the two domain decoders
pub struct FaceSwapper {
    device: Device,
    encoder: Encoder,
    enc_vs: VarStore,
    decoder_a: Decoder,
    dec_a_vs: VarStore,
    decoder_b: Decoder,
    dec_b_vs: VarStore,
}

impl FaceSwapper {
    /// Create the generator-side networks on the given device
    pub fn new(device: Device) -> Self {
        let enc_vs = VarStore::new(device);
        let encoder = Encoder::new(&enc_vs.root());
        let dec_a_vs = VarStore::new(device);
        let decoder_a = Decoder::new(&dec_a_vs.root());
        let dec_b_vs = VarStore::new(device);
        let decoder_b = Decoder::new(&dec_b_vs.root());

        Self {
            device,
            encoder,
            enc_vs,
            decoder_a,
            dec_a_vs,
            decoder_b,
            dec_b_vs,
        }
    }

    /// Compute device the networks live on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Generator-side sub-networks by their checkpoint names
    pub fn named_stores(&self) -> Vec<(&'static str, &VarStore)> {
        vec![
            ("EncoderAB", &self.enc_vs),
            ("DecoderA", &self.dec_a_vs),
            ("DecoderB", &self.dec_b_vs),
        ]
    }

    /// Render a batch of domain-B faces with domain A's identity
    pub fn swap_to_a(&self, faces: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let faces = faces.to_device(self.device);
            let (output, mask) = self.decoder_a.forward_t(&self.encoder.forward_t(&faces, false), false);
            composite(&output, &mask, &faces)
        })
    }

    /// Render a batch of domain-A faces with domain B's identity
    pub fn swap_to_b(&self, faces: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let faces = faces.to_device(self.device);
            let (output, mask) = self.decoder_b.forward_t(&self.encoder.forward_t(&faces, false), false);
            composite(&output, &mask, &faces)
        })
    }

    /// Gradient-free cross-domain pass for visualization
    ///
    /// Repeated calls with unchanged inputs and parameters return identical
    /// tensors and populate no gradient buffers.
    pub fn display_forward(&self, real_a: &Tensor, real_b: &Tensor) -> DisplayOutput {
        tch::no_grad(|| {
            let (output_a, mask_a) =
                self.decoder_a.forward_t(&self.encoder.forward_t(real_b, false), false);
            let display_a = composite(&output_a, &mask_a, real_b);

            let (output_b, mask_b) =
                self.decoder_b.forward_t(&self.encoder.forward_t(real_a, false), false);
            let display_b = composite(&output_b, &mask_b, real_a);

            DisplayOutput {
                display_a,
                display_b,
            }
        })
    }

    fn freeze(&mut self) {
        self.enc_vs.freeze();
        self.dec_a_vs.freeze();
        self.dec_b_vs.freeze();
    }

    fn unfreeze(&mut self) {
        self.enc_vs.unfreeze();
        self.dec_a_vs.unfreeze();
        self.dec_b_vs.unfreeze();
    }
}

/// Derived tensors of one training step, recomputed by every `forward`
struct StepTensors {
    output_a: Tensor,
    mask_a: Tensor,
    fake_a: Tensor,
    output_b: Tensor,
    mask_b: Tensor,
    fake_b: Tensor,
    fake_a_pred: Tensor,
    fake_b_pred: Tensor,
    real_a_pred: Tensor,
    real_b_pred: Tensor,
    output_a_pred: Tensor,
    output_b_pred: Tensor,
    cycle_a: Option<Tensor>,
    cycle_b: Option<Tensor>,
}

/// Training orchestrator owning every sub-network and optimizer
pub struct CycleGan {
    device: Device,
    swapper: FaceSwapper,
    disc_a: Discriminator,
    disc_a_vs: VarStore,
    disc_b: Discriminator,
    disc_b_vs: VarStore,
    opt_g: OptimizerGroup,
    opt_d: OptimizerGroup,
    opt_cycle: OptimizerGroup,
    loss_cfg: LossConfig,
    weights: LossWeights,
    features: Box<dyn FeatureExtractor>,
    features_for_pl: Box<dyn FeatureExtractor>,
    input: Option<SampleBatch>,
    step: Option<StepTensors>,
    ledger: LossLedger,
}

impl CycleGan {
    /// Build the full training orchestrator
    ///
    /// # Arguments
    ///
    /// * `features` - Frozen feature extractor for the perceptual loss
    /// * `features_for_pl` - Companion copy applied to the generated image
    /// * `config` - Full run configuration; value errors are fatal here
    pub fn new(
        features: Box<dyn FeatureExtractor>,
        features_for_pl: Box<dyn FeatureExtractor>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        let device = config.get_device();
        let swapper = FaceSwapper::new(device);

        let disc_a_vs = VarStore::new(device);
        let disc_a = Discriminator::new(&disc_a_vs.root());
        let disc_b_vs = VarStore::new(device);
        let disc_b = Discriminator::new(&disc_b_vs.root());

        let t = &config.training;
        let opt_g = OptimizerGroup::adam(
            &[&swapper.enc_vs, &swapper.dec_a_vs, &swapper.dec_b_vs],
            t.lr_factor * t.g_lr,
        )?;
        let opt_d = OptimizerGroup::adam(&[&disc_a_vs, &disc_b_vs], t.lr_factor * t.d_lr)?;
        let opt_cycle = OptimizerGroup::adam(
            &[
                &swapper.enc_vs,
                &swapper.dec_a_vs,
                &swapper.dec_b_vs,
                &disc_a_vs,
                &disc_b_vs,
            ],
            t.c_lr,
        )?;

        Ok(Self {
            device,
            swapper,
            disc_a,
            disc_a_vs,
            disc_b,
            disc_b_vs,
            opt_g,
            opt_d,
            opt_cycle,
            loss_cfg: config.loss.clone(),
            weights: config.loss_weights.clone(),
            features,
            features_for_pl,
            input: None,
            step: None,
            ledger: LossLedger::new(),
        })
    }

    /// The generator-side networks (for display and deployment)
    pub fn swapper(&self) -> &FaceSwapper {
        &self.swapper
    }

    /// Losses recorded by the most recent step
    pub fn ledger(&self) -> &LossLedger {
        &self.ledger
    }

    /// Every sub-network by its checkpoint name
    pub fn named_stores(&self) -> Vec<(&'static str, &VarStore)> {
        let mut stores = self.swapper.named_stores();
        stores.push(("DiscriminatorA", &self.disc_a_vs));
        stores.push(("DiscriminatorB", &self.disc_b_vs));
        stores
    }

    /// Bind one batch for the next step, replacing any previous binding
    pub fn set_input(&mut self, batch: SampleBatch) -> Result<()> {
        if (self.loss_cfg.edgeloss_on || self.loss_cfg.eyeloss_on)
            && (batch.eye_mask_a.is_none() || batch.eye_mask_b.is_none())
        {
            bail!("edge or eye loss enabled but the batch carries no eye masks");
        }

        self.step = None;
        self.input = Some(batch.to_device(self.device));
        Ok(())
    }

    /// Build the step's derived tensors: outputs, masks, composited fakes,
    /// discriminator predictions and (in cycle mode) round trips
    ///
    /// Populates state only; parameters and gradients are untouched.
    pub fn forward(&mut self) -> Result<()> {
        let input = self.bound_input()?;
        let cycle_mode = self.loss_cfg.cyclegan_on;

        // Pure cycle training drops the warp pairing and round-trips the
        // opposite-domain reals instead.
        let warped_a = if cycle_mode { &input.real_b } else { &input.warped_a };
        let warped_b = if cycle_mode { &input.real_a } else { &input.warped_b };

        let (output_a, mask_a) = self
            .swapper
            .decoder_a
            .forward_t(&self.swapper.encoder.forward_t(warped_a, true), true);
        let (output_b, mask_b) = self
            .swapper
            .decoder_b
            .forward_t(&self.swapper.encoder.forward_t(warped_b, true), true);

        let fake_a = composite(&output_a, &mask_a, warped_a);
        let fake_b = composite(&output_b, &mask_b, warped_b);

        let fake_a_pred = self.disc_a.forward_t(&fake_a, true);
        let fake_b_pred = self.disc_b.forward_t(&fake_b, true);
        let real_a_pred = self.disc_a.forward_t(&input.real_a, true);
        let real_b_pred = self.disc_b.forward_t(&input.real_b, true);
        let output_a_pred = self.disc_a.forward_t(&output_a, true);
        let output_b_pred = self.disc_b.forward_t(&output_b, true);

        let (cycle_a, cycle_b) = if cycle_mode {
            let latent = self.swapper.encoder.forward_t(&output_b, true);
            let cycle_a = self.swapper.decoder_a.forward_t(&latent, true).0;
            let latent = self.swapper.encoder.forward_t(&output_a, true);
            let cycle_b = self.swapper.decoder_b.forward_t(&latent, true).0;
            (Some(cycle_a), Some(cycle_b))
        } else {
            (None, None)
        };

        self.step = Some(StepTensors {
            output_a,
            mask_a,
            fake_a,
            output_b,
            mask_b,
            fake_b,
            fake_a_pred,
            fake_b_pred,
            real_a_pred,
            real_b_pred,
            output_a_pred,
            output_b_pred,
            cycle_a,
            cycle_b,
        });

        Ok(())
    }

    /// Gradient-free cross-domain pass over the bound reals
    pub fn display_forward(&self) -> Result<DisplayOutput> {
        let input = self.bound_input()?;
        Ok(self.swapper.display_forward(&input.real_a, &input.real_b))
    }

    /// One full training step: forward, discriminator phase with the
    /// generator side frozen, then generator or cycle phase with the
    /// discriminators frozen
    ///
    /// Gradient-enable flags are restored on every exit path, so a failing
    /// phase never leaks a frozen side into the next step.
    pub fn optimize_parameters(&mut self) -> Result<()> {
        self.forward()?;
        self.ledger.clear();

        self.with_generator_frozen(|model| model.discriminator_phase())?;
        self.with_discriminators_frozen(|model| {
            if model.loss_cfg.cyclegan_on {
                model.cycle_phase()
            } else {
                model.generator_phase()
            }
        })
    }

    fn discriminator_phase(&mut self) -> Result<()> {
        self.opt_d.zero_grad();
        self.backward_d_a()?;
        self.backward_d_b()?;
        self.opt_d.step();
        Ok(())
    }

    fn generator_phase(&mut self) -> Result<()> {
        self.opt_g.zero_grad();
        self.backward_g_a()?;
        self.backward_g_b()?;
        self.opt_g.step();
        Ok(())
    }

    fn cycle_phase(&mut self) -> Result<()> {
        self.opt_cycle.zero_grad();
        self.backward_cycle_a()?;
        self.backward_cycle_b()?;
        self.opt_cycle.step();
        Ok(())
    }

    fn backward_d_a(&mut self) -> Result<()> {
        let loss = {
            let step = self.step()?;
            losses::adversarial_loss_discriminator(
                &step.fake_a_pred,
                &step.output_a_pred,
                &step.real_a_pred,
                &self.weights,
            )
        };

        self.ledger.set("loss_D_A", loss.double_value(&[]));
        backward_retaining(&loss);
        Ok(())
    }

    fn backward_d_b(&mut self) -> Result<()> {
        let loss = {
            let step = self.step()?;
            losses::adversarial_loss_discriminator(
                &step.fake_b_pred,
                &step.output_b_pred,
                &step.real_b_pred,
                &self.weights,
            )
        };

        self.ledger.set("loss_D_B", loss.double_value(&[]));
        backward_retaining(&loss);
        Ok(())
    }

    fn backward_g_a(&mut self) -> Result<()> {
        let terms = self.generator_terms(DomainSide::A)?;
        self.record_and_backward("loss_G_A", terms)
    }

    fn backward_g_b(&mut self) -> Result<()> {
        let terms = self.generator_terms(DomainSide::B)?;
        self.record_and_backward("loss_G_B", terms)
    }

    fn backward_cycle_a(&mut self) -> Result<()> {
        let loss = {
            let step = self.step()?;
            let input = self.bound_input()?;
            let cycled = step
                .cycle_a
                .as_ref()
                .ok_or_else(|| anyhow!("cycle reconstruction missing for domain A"))?;
            losses::cycle_consistency_loss(&input.real_a, cycled, &self.weights)
        };

        self.ledger.set("loss_Cycle_A", loss.double_value(&[]));
        backward_retaining(&loss);
        Ok(())
    }

    fn backward_cycle_b(&mut self) -> Result<()> {
        let loss = {
            let step = self.step()?;
            let input = self.bound_input()?;
            let cycled = step
                .cycle_b
                .as_ref()
                .ok_or_else(|| anyhow!("cycle reconstruction missing for domain B"))?;
            losses::cycle_consistency_loss(&input.real_b, cycled, &self.weights)
        };

        self.ledger.set("loss_Cycle_B", loss.double_value(&[]));
        backward_retaining(&loss);
        Ok(())
    }

    /// All enabled generator loss terms for one domain
    fn generator_terms(&self, side: DomainSide) -> Result<Vec<(&'static str, Tensor)>> {
        let step = self.step()?;
        let input = self.bound_input()?;

        let (output, mask, fake, fake_pred, output_pred, real, eye_mask) = match side {
            DomainSide::A => (
                &step.output_a,
                &step.mask_a,
                &step.fake_a,
                &step.fake_a_pred,
                &step.output_a_pred,
                &input.real_a,
                input.eye_mask_a.as_ref(),
            ),
            DomainSide::B => (
                &step.output_b,
                &step.mask_b,
                &step.fake_b,
                &step.fake_b_pred,
                &step.output_b_pred,
                &input.real_b,
                input.eye_mask_b.as_ref(),
            ),
        };

        let mut terms = vec![
            (
                side.name("loss_G_adversarial"),
                losses::adversarial_loss_generator(fake_pred, output_pred, &self.weights),
            ),
            (
                side.name("loss_G_reconstruction"),
                losses::reconstruction_loss(output, real, &self.weights),
            ),
            (
                side.name("loss_G_mask"),
                losses::mask_loss(mask, self.loss_cfg.mask_threshold, &self.weights),
            ),
        ];

        if self.loss_cfg.pl_on {
            terms.push((
                side.name("loss_G_perceptual"),
                losses::perceptual_loss(
                    real,
                    fake,
                    self.features.as_ref(),
                    self.features_for_pl.as_ref(),
                    &self.weights,
                ),
            ));
        }

        if self.loss_cfg.edgeloss_on {
            let eye_mask = eye_mask.ok_or_else(|| anyhow!("eye mask not bound"))?;
            terms.push((
                side.name("loss_G_edge"),
                losses::edge_loss(output, real, eye_mask, &self.weights),
            ));
        }

        if self.loss_cfg.eyeloss_on {
            let eye_mask = eye_mask.ok_or_else(|| anyhow!("eye mask not bound"))?;
            terms.push((
                side.name("loss_G_eye"),
                losses::eye_loss(output, real, eye_mask, &self.weights),
            ));
        }

        Ok(terms)
    }

    /// Record each term, sum them, record the aggregate and backpropagate
    fn record_and_backward(
        &mut self,
        aggregate_name: &'static str,
        terms: Vec<(&'static str, Tensor)>,
    ) -> Result<()> {
        let mut total: Option<Tensor> = None;
        for (name, term) in &terms {
            self.ledger.set(*name, term.double_value(&[]));
            total = Some(match total {
                Some(sum) => sum + term,
                None => term.shallow_clone(),
            });
        }

        let total = total.ok_or_else(|| anyhow!("no loss terms computed"))?;
        self.ledger.set(aggregate_name, total.double_value(&[]));
        backward_retaining(&total);
        Ok(())
    }

    fn with_generator_frozen<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.swapper.freeze();
        let result = f(self);
        self.swapper.unfreeze();
        result
    }

    fn with_discriminators_frozen<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.disc_a_vs.freeze();
        self.disc_b_vs.freeze();
        let result = f(self);
        self.disc_a_vs.unfreeze();
        self.disc_b_vs.unfreeze();
        result
    }

    fn bound_input(&self) -> Result<&SampleBatch> {
        self.input
            .as_ref()
            .ok_or_else(|| anyhow!("no input bound; call set_input first"))
    }

    fn step(&self) -> Result<&StepTensors> {
        self.step
            .as_ref()
            .ok_or_else(|| anyhow!("forward has not been run for this step"))
    }
}

/// Domain selector used when assembling per-domain loss terms
#[derive(Debug, Clone, Copy)]
enum DomainSide {
    A,
    B,
}

impl DomainSide {
    fn name(self, prefix: &str) -> &'static str {
        match (prefix, self) {
            ("loss_G_adversarial", DomainSide::A) => "loss_G_adversarial_A",
            ("loss_G_adversarial", DomainSide::B) => "loss_G_adversarial_B",
            ("loss_G_reconstruction", DomainSide::A) => "loss_G_reconstruction_A",
            ("loss_G_reconstruction", DomainSide::B) => "loss_G_reconstruction_B",
            ("loss_G_mask", DomainSide::A) => "loss_G_mask_A",
            ("loss_G_mask", DomainSide::B) => "loss_G_mask_B",
            ("loss_G_perceptual", DomainSide::A) => "loss_G_perceptual_A",
            ("loss_G_perceptual", DomainSide::B) => "loss_G_perceptual_B",
            ("loss_G_edge", DomainSide::A) => "loss_G_edge_A",
            ("loss_G_edge", DomainSide::B) => "loss_G_edge_B",
            ("loss_G_eye", DomainSide::A) => "loss_G_eye_A",
            ("loss_G_eye", DomainSide::B) => "loss_G_eye_B",
            _ => unreachable!("unknown loss prefix {prefix}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::losses::AvgPoolFeatures;
    use tch::Kind;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.training.batchsize = 2;
        config.training.device = "cpu".to_string();
        config
    }

    fn build(config: &Config) -> CycleGan {
        CycleGan::new(
            Box::new(AvgPoolFeatures::default()),
            Box::new(AvgPoolFeatures::default()),
            config,
        )
        .unwrap()
    }

    fn random_batch(n: i64) -> SampleBatch {
        let image = || Tensor::randn([n, 3, 64, 64], (Kind::Float, Device::Cpu)).clamp(-1.0, 1.0);
        SampleBatch::new(image(), image(), image(), image())
    }

    fn snapshot(vs: &VarStore) -> Vec<Tensor> {
        vs.trainable_variables()
            .iter()
            .map(|t| t.detach().copy())
            .collect()
    }

    fn unchanged(vs: &VarStore, snap: &[Tensor]) -> bool {
        let vars = vs.trainable_variables();
        assert_eq!(vars.len(), snap.len());
        vars.iter()
            .zip(snap)
            .all(|(t, s)| t.allclose(s, 0.0, 0.0, false))
    }

    #[test]
    fn test_forward_composites_alpha_blend() {
        let config = test_config();
        let mut model = build(&config);

        let batch = random_batch(2);
        let warped_a = batch.warped_a.copy();
        model.set_input(batch).unwrap();
        model.forward().unwrap();

        let step = model.step.as_ref().unwrap();
        let expected = &step.mask_a * &step.output_a
            + (Tensor::ones_like(&step.mask_a) - &step.mask_a) * &warped_a;
        assert!(step.fake_a.allclose(&expected, 1e-6, 1e-6, false));

        let mask_min = step.mask_a.min().double_value(&[]);
        let mask_max = step.mask_a.max().double_value(&[]);
        assert!(mask_min >= 0.0 && mask_max <= 1.0);
    }

    #[test]
    fn test_loss_g_a_is_exactly_three_terms_with_flags_off() {
        let config = test_config();
        let mut model = build(&config);

        model.set_input(random_batch(2)).unwrap();
        model.forward().unwrap();
        model.backward_g_a().unwrap();

        let ledger = model.ledger();
        let total = ledger.get("loss_G_A").unwrap();
        let sum = ledger.get("loss_G_adversarial_A").unwrap()
            + ledger.get("loss_G_reconstruction_A").unwrap()
            + ledger.get("loss_G_mask_A").unwrap();

        assert!((total - sum).abs() < 1e-5);
        assert!(ledger.get("loss_G_perceptual_A").is_none());
        assert!(ledger.get("loss_G_edge_A").is_none());
        assert!(ledger.get("loss_G_eye_A").is_none());
    }

    #[test]
    fn test_discriminator_phase_leaves_generator_untouched() {
        let config = test_config();
        let mut model = build(&config);

        model.set_input(random_batch(2)).unwrap();
        model.forward().unwrap();

        let enc_before = snapshot(&model.swapper.enc_vs);
        let dec_a_before = snapshot(&model.swapper.dec_a_vs);
        let disc_a_before = snapshot(&model.disc_a_vs);

        model
            .with_generator_frozen(|m| m.discriminator_phase())
            .unwrap();

        assert!(unchanged(&model.swapper.enc_vs, &enc_before));
        assert!(unchanged(&model.swapper.dec_a_vs, &dec_a_before));
        assert!(!unchanged(&model.disc_a_vs, &disc_a_before));
    }

    #[test]
    fn test_generator_phase_leaves_discriminators_untouched() {
        let config = test_config();
        let mut model = build(&config);

        model.set_input(random_batch(2)).unwrap();
        model.forward().unwrap();

        let disc_a_before = snapshot(&model.disc_a_vs);
        let disc_b_before = snapshot(&model.disc_b_vs);
        let enc_before = snapshot(&model.swapper.enc_vs);

        model
            .with_discriminators_frozen(|m| m.generator_phase())
            .unwrap();

        assert!(unchanged(&model.disc_a_vs, &disc_a_before));
        assert!(unchanged(&model.disc_b_vs, &disc_b_before));
        assert!(!unchanged(&model.swapper.enc_vs, &enc_before));
    }

    #[test]
    fn test_optimize_parameters_updates_both_sides() {
        let config = test_config();
        let mut model = build(&config);

        model.set_input(random_batch(2)).unwrap();

        let enc_before = snapshot(&model.swapper.enc_vs);
        let disc_a_before = snapshot(&model.disc_a_vs);

        model.optimize_parameters().unwrap();

        assert!(!unchanged(&model.swapper.enc_vs, &enc_before));
        assert!(!unchanged(&model.disc_a_vs, &disc_a_before));

        // Cycle phase never ran
        let ledger = model.ledger();
        assert!(ledger.get("loss_D_A").is_some());
        assert!(ledger.get("loss_G_A").is_some());
        assert!(ledger.get("loss_G_B").is_some());
        assert!(ledger.get("loss_Cycle_A").is_none());
        assert!(ledger.get("loss_Cycle_B").is_none());

        // Frozen flags restored for the next step
        assert!(model
            .swapper
            .enc_vs
            .trainable_variables()
            .iter()
            .all(|t| t.requires_grad()));
        assert!(model
            .disc_a_vs
            .trainable_variables()
            .iter()
            .all(|t| t.requires_grad()));
    }

    #[test]
    fn test_cycle_mode_runs_cycle_phase() {
        let mut config = test_config();
        config.loss.cyclegan_on = true;
        let mut model = build(&config);

        model.set_input(random_batch(2)).unwrap();
        model.optimize_parameters().unwrap();

        let ledger = model.ledger();
        assert!(ledger.get("loss_Cycle_A").is_some());
        assert!(ledger.get("loss_Cycle_B").is_some());
        assert!(ledger.get("loss_G_A").is_none());
        assert!(ledger.get("loss_G_B").is_none());
    }

    #[test]
    fn test_set_input_requires_masks_for_eye_loss() {
        let mut config = test_config();
        config.loss.eyeloss_on = true;
        let mut model = build(&config);

        assert!(model.set_input(random_batch(2)).is_err());

        let mask = || Tensor::zeros([2, 1, 64, 64], (Kind::Float, Device::Cpu));
        let batch = random_batch(2).with_eye_masks(mask(), mask());
        assert!(model.set_input(batch).is_ok());
    }

    #[test]
    fn test_display_forward_idempotent_and_gradient_free() {
        let swapper = FaceSwapper::new(Device::Cpu);

        let real_a = Tensor::randn([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let real_b = Tensor::randn([2, 3, 64, 64], (Kind::Float, Device::Cpu));

        let first = swapper.display_forward(&real_a, &real_b);
        let second = swapper.display_forward(&real_a, &real_b);

        assert!(first.display_a.allclose(&second.display_a, 0.0, 0.0, false));
        assert!(first.display_b.allclose(&second.display_b, 0.0, 0.0, false));

        for (_, vs) in swapper.named_stores() {
            for var in vs.trainable_variables() {
                assert!(!var.grad().defined());
            }
        }
    }
}
