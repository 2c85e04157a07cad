//! Face-swapping CycleGAN
//!
//! Main entry point providing CLI interface for:
//! - Initializing a configuration file
//! - Training on two face domains
//! - Swapping identities on single images

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tch::{vision::image, Kind};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use faceswap_gan::{
    data::{FaceDataset, PairedLoader},
    model::{CycleGan, FaceSwapper},
    training::{AvgPoolFeatures, Trainer, TrainerConfig},
    utils::{checkpoint, config::ensure_config_exists, Config},
};

/// Face-swapping CycleGAN
#[derive(Parser)]
#[command(name = "faceswap_gan")]
#[command(version = "0.1.0")]
#[command(about = "Train a face-swapping CycleGAN and swap identities on images")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },

    /// Train on two directories of aligned face crops
    Train {
        /// Directory of domain-A face images
        #[arg(long)]
        data_a: String,

        /// Directory of domain-B face images
        #[arg(long)]
        data_b: String,

        /// Optional directory of domain-A eye masks
        #[arg(long)]
        masks_a: Option<String>,

        /// Optional directory of domain-B eye masks
        #[arg(long)]
        masks_b: Option<String>,

        /// Resume from the latest checkpoint in the save directory
        #[arg(long)]
        resume: bool,
    },

    /// Swap the identity of a single face image
    Swap {
        /// Input image path (aligned 64x64 face)
        #[arg(short, long)]
        input: String,

        /// Output image path
        #[arg(short, long, default_value = "swapped.png")]
        output: String,

        /// Swap direction: "a2b" or "b2a"
        #[arg(short, long, default_value = "a2b")]
        direction: String,

        /// Checkpoint epoch to load (defaults to the latest)
        #[arg(short, long)]
        epoch: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { output } => init_config(&output),
        Commands::Train {
            data_a,
            data_b,
            masks_a,
            masks_b,
            resume,
        } => train(&cli.config, &data_a, &data_b, masks_a, masks_b, resume),
        Commands::Swap {
            input,
            output,
            direction,
            epoch,
        } => swap(&cli.config, &input, &output, &direction, epoch),
    }
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    let config = Config::default();

    if output_path.ends_with(".toml") {
        config.save_toml(output_path)?;
    } else {
        config.save_json(output_path)?;
    }

    info!("created default configuration at {}", output_path);
    Ok(())
}

/// Train the face-swap model
fn train(
    config_path: &str,
    data_a: &str,
    data_b: &str,
    masks_a: Option<String>,
    masks_b: Option<String>,
    resume: bool,
) -> Result<()> {
    let config = ensure_config_exists(config_path)?;

    info!("loading domain A from {}", data_a);
    let mut domain_a = FaceDataset::from_dir(data_a)?;
    if let Some(dir) = masks_a {
        domain_a = domain_a.with_mask_dir(&dir)?;
    }

    info!("loading domain B from {}", data_b);
    let mut domain_b = FaceDataset::from_dir(data_b)?;
    if let Some(dir) = masks_b {
        domain_b = domain_b.with_mask_dir(&dir)?;
    }

    let mut loader = PairedLoader::new(domain_a, domain_b, config.training.batchsize, true);
    if loader.num_batches() == 0 {
        bail!("not enough images for a single batch of {}", config.training.batchsize);
    }

    let mut model = CycleGan::new(
        Box::new(AvgPoolFeatures::default()),
        Box::new(AvgPoolFeatures::default()),
        &config,
    )?;

    let names: Vec<&str> = model.named_stores().iter().map(|(name, _)| *name).collect();
    let start_epoch = if resume {
        match checkpoint::find_latest_epoch(&config.training.save_dir, &names) {
            Some(epoch) => {
                checkpoint::load_networks(&model.named_stores(), epoch, &config.training.save_dir)?;
                info!("resumed from epoch {}", epoch);
                epoch
            }
            None => bail!("no complete checkpoint found in {}", config.training.save_dir),
        }
    } else {
        0
    };

    let mut trainer = Trainer::new(TrainerConfig::from(&config.training));
    let metrics = trainer.train(&mut model, &mut loader, start_epoch)?;

    info!(
        "training complete after {} epochs; final D_A={:.4}, G_A={:.4}",
        metrics.num_epochs(),
        metrics.loss_d_a.last().copied().unwrap_or(0.0),
        metrics.loss_g_a.last().copied().unwrap_or(0.0),
    );
    Ok(())
}

/// Swap a single face image using saved generator checkpoints
fn swap(
    config_path: &str,
    input_path: &str,
    output_path: &str,
    direction: &str,
    epoch: Option<usize>,
) -> Result<()> {
    let config = ensure_config_exists(config_path)?;
    let device = config.get_device();

    let swapper = FaceSwapper::new(device);
    let names: Vec<&str> = swapper.named_stores().iter().map(|(name, _)| *name).collect();

    let epoch = match epoch {
        Some(epoch) => epoch,
        None => checkpoint::find_latest_epoch(&config.training.save_dir, &names)
            .ok_or_else(|| anyhow::anyhow!("no generator checkpoint in {}", config.training.save_dir))?,
    };
    checkpoint::load_networks(&swapper.named_stores(), epoch, &config.training.save_dir)?;
    info!("loaded generator networks from epoch {}", epoch);

    let raw = image::load(input_path)?;
    let face = (image::resize(&raw, 64, 64)?.to_kind(Kind::Float) / 127.5 - 1.0).unsqueeze(0);

    let swapped = match direction {
        "a2b" => swapper.swap_to_b(&face),
        "b2a" => swapper.swap_to_a(&face),
        other => bail!("unknown direction {other:?}, expected \"a2b\" or \"b2a\""),
    };

    let out = ((swapped.squeeze_dim(0).to_device(tch::Device::Cpu) + 1.0) * 127.5)
        .clamp(0.0, 255.0)
        .to_kind(Kind::Uint8);
    image::save(&out, output_path)?;

    info!("wrote swapped face to {}", output_path);
    Ok(())
}
