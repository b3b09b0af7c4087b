//! Cocoaug: load COCO instance-segmentation datasets and expand them with
//! jointly augmented image/mask/bbox variants.
//!
//! The crate is built for a single-class cigarette-butt dataset but the
//! loader itself accepts any COCO document with polygon or run-length
//! segmentations.
//!
//! # Modules
//!
//! - [`dataset`]: the in-memory dataset, its records and the COCO JSON reader/writer
//! - [`mask`]: binary masks, polygon rasterization and the RLE codec
//! - [`augment`]: the ten transforms and the dataset expansion driver
//! - [`inspect`]: dataset statistics
//! - [`error`]: error types

pub mod augment;
pub mod dataset;
pub mod error;
pub mod inspect;
pub mod mask;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use augment::{AugmentConfig, ExpandOptions, Schedule, TransformKind};
use dataset::{Category, Dataset};
pub use error::CocoaugError;

/// The cocoaug CLI application.
#[derive(Parser)]
#[command(name = "cocoaug")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every image and add augmented variants with RLE annotations.
    Augment(AugmentArgs),
    /// Print dataset statistics.
    Inspect(InspectArgs),
}

#[derive(clap::Args)]
struct AugmentArgs {
    /// COCO annotation file.
    annotations: PathBuf,

    /// Directory containing the images named in the annotation file.
    images_dir: PathBuf,

    /// Output root; images go to `<OUTPUT_DIR>/augmented/`.
    output_dir: PathBuf,

    /// Variants per annotated image.
    #[arg(long, env = "COCOAUG_RATIO", default_value_t = 10)]
    ratio: usize,

    /// Seed for reproducible output.
    #[arg(long, env = "COCOAUG_SEED")]
    seed: Option<u64>,

    /// YAML file overriding transform parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated transforms to cycle through (names or 1-10).
    /// Without it, variant N uses transform N.
    #[arg(long, value_delimiter = ',')]
    modes: Vec<TransformKind>,

    /// Name of the single category in the output file.
    #[arg(long, default_value = "cig_butt")]
    category_name: String,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Also write mask overlays to `<OUTPUT_DIR>/augmented/preview/`.
    #[arg(long)]
    preview: bool,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// COCO annotation file.
    annotations: PathBuf,

    /// Directory containing the images.
    images_dir: PathBuf,

    /// Also rasterize every mask and report instance statistics.
    #[arg(long)]
    masks: bool,

    /// Number of categories shown in the histogram.
    #[arg(long, default_value_t = 10)]
    top: usize,
}

/// Run the cocoaug CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CocoaugError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Augment(args)) => run_augment(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("cocoaug {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("COCO segmentation dataset augmenter.");
            println!();
            println!("Run 'cocoaug --help' for usage information.");
            Ok(())
        }
    }
}

fn run_augment(args: AugmentArgs) -> Result<(), CocoaugError> {
    let config = match &args.config {
        Some(path) => AugmentConfig::from_yaml_file(path)?,
        None => AugmentConfig::default(),
    };

    let schedule = if args.modes.is_empty() {
        Schedule::Legacy
    } else {
        Schedule::Cycle(args.modes)
    };

    let options = ExpandOptions {
        ratio: args.ratio,
        seed: args.seed,
        schedule,
        category: Category::new(1u64, args.category_name).with_supercategory("litter"),
        progress: !args.no_progress,
        preview: args.preview,
    };

    let mut dataset = Dataset::load(&args.annotations, &args.images_dir)?;
    info!(
        "Loaded {} images with {} annotations from {}",
        dataset.len(),
        dataset.annotation_count(),
        args.annotations.display()
    );

    let report = augment::expand(&mut dataset, &args.output_dir, &options, &config)?;
    println!("{report}");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<(), CocoaugError> {
    let dataset = Dataset::load(&args.annotations, &args.images_dir)?;
    let opts = inspect::InspectOptions {
        top_labels: args.top,
        masks: args.masks,
        ..inspect::InspectOptions::default()
    };
    let report = inspect::inspect_dataset(&dataset, &opts)?;
    print!("{report}");
    Ok(())
}
