//! `spht`: build, inspect and query star pattern hash tables.
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`
//! (default `info`); command results go to stdout.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use spht::catalogs::load_catalog;
use spht::{
    research_subset, BuildConfig, IdentifyRequest, QuantizationStep, ServiceConfig, Spht,
    StarIdService, StarRecord,
};

#[derive(Parser)]
#[command(name = "spht")]
#[command(about = "Lost-in-space star identification with a star pattern hash table")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a catalog subset and write it to disk
    Build(BuildArgs),

    /// Identify the detections in a JSON request
    Identify(IdentifyArgs),

    /// Print statistics for a saved index
    Info(InfoArgs),
}

/// Which catalog stars get indexed.
#[derive(Args)]
struct SubsetArgs {
    /// Catalog file: Bright Star Catalogue JSON, or CSV (id,ra_deg,dec_deg,mag[,name])
    #[arg(long)]
    catalog: PathBuf,

    /// Index a seeded random sample of N stars instead of the whole catalog
    #[arg(long)]
    sample: Option<usize>,

    /// Seed for --sample
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Catalog ids always added to a sampled subset (comma separated)
    #[arg(long, value_delimiter = ',')]
    require: Vec<u64>,

    /// Quantization step in degrees
    #[arg(long, default_value = "1.0")]
    step: f64,
}

impl SubsetArgs {
    fn load(&self) -> anyhow::Result<Vec<StarRecord>> {
        let stars = load_catalog(&self.catalog)
            .with_context(|| format!("loading catalog {}", self.catalog.display()))?;
        match self.sample {
            Some(n) => Ok(research_subset(&stars, n, self.seed, &self.require)?),
            None => Ok(stars),
        }
    }

    fn build_config(&self) -> anyhow::Result<BuildConfig> {
        Ok(BuildConfig {
            quantization_step: QuantizationStep::from_degrees(self.step)?,
            ..Default::default()
        })
    }
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    subset: SubsetArgs,

    /// Output file; `.json` writes a JSON document, anything else an rkyv snapshot
    #[arg(long)]
    output: PathBuf,

    /// Abort if the build takes longer than this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args)]
struct IdentifyArgs {
    #[command(flatten)]
    subset: SubsetArgs,

    /// Saved index to start from; rebuilt and rewritten if unusable
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Do not write a rebuilt index back to --snapshot
    #[arg(long)]
    no_save: bool,

    /// Request JSON file, or `-` for stdin
    #[arg(long)]
    request: PathBuf,
}

#[derive(Args)]
struct InfoArgs {
    #[command(flatten)]
    subset: SubsetArgs,

    #[arg(long)]
    snapshot: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Identify(args) => run_identify(args),
        Commands::Info(args) => run_info(args),
    }
}

fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    let stars = args.subset.load()?;
    let config = BuildConfig {
        timeout_ms: args.timeout_ms,
        ..args.subset.build_config()?
    };
    let spht = Spht::build(&stars, &config)?;
    spht.save_to_file(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "{} stars, {} pairs, {} buckets -> {}",
        stars.len(),
        spht.num_pairs(),
        spht.num_buckets(),
        args.output.display()
    );
    Ok(())
}

fn run_identify(args: &IdentifyArgs) -> anyhow::Result<()> {
    let raw = if args.request.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.request)
            .with_context(|| format!("reading {}", args.request.display()))?
    };
    let request: IdentifyRequest =
        serde_json::from_str(&raw).context("parsing identification request")?;

    let config = ServiceConfig {
        snapshot_path: args.snapshot.clone(),
        build: args.subset.build_config()?,
        save_rebuilt_snapshot: !args.no_save,
    };
    let service = StarIdService::start(args.subset.load()?, &config)?;
    let response = service.handle(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_info(args: &InfoArgs) -> anyhow::Result<()> {
    let stars = args.subset.load()?;
    let step = args.subset.build_config()?.quantization_step;
    let spht = Spht::load_from_file(&args.snapshot, &stars, step)
        .with_context(|| format!("loading {}", args.snapshot.display()))?;
    let stats = serde_json::json!({
        "catalogStars": stars.len(),
        "quantizationStepDeg": spht.quantization_step().degrees(),
        "pairs": spht.num_pairs(),
        "buckets": spht.num_buckets(),
        "maxBucketLen": spht.max_bucket_len(),
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
