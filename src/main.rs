//! CLI entry point for gxfremap.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gxfremap::config::{Config, DEFAULT_MAX_SIZE_CHANGE, DEFAULT_MIN_SIMILARITY};
use gxfremap::{AnnotationSet, ChainIndex, GeneMapper, GenomeSizes, GxfWriter};

/// Gene annotation remapping tool.
///
/// Maps GFF3/GTF annotations through UCSC alignment chains to another
/// assembly, marking every feature with how well it mapped. Set RUST_LOG to
/// control logging (default: info).
#[derive(Parser, Debug)]
#[command(name = "gxfremap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source annotation, GFF3 or GTF (required)
    #[arg(short = 's', long = "src")]
    src: PathBuf,

    /// UCSC chain file from source to target assembly (required)
    #[arg(short = 'c', long = "chain")]
    chain: PathBuf,

    /// Output for mapped features; format follows the extension (required)
    #[arg(short = 'm', long = "mapped")]
    mapped: PathBuf,

    /// Output for features that did not map, in source coordinates (required)
    #[arg(short = 'u', long = "unmapped")]
    unmapped: PathBuf,

    /// Existing annotation of the target assembly, used for target status and rescue
    #[arg(short = 't', long = "target")]
    target: Option<PathBuf>,

    /// Target sequence sizes (name<TAB>length); defaults to the sizes in the chains
    #[arg(long = "target-sizes")]
    target_sizes: Option<PathBuf>,

    /// Minimum exon similarity for a target gene to replace a lost gene (0-1)
    #[arg(long = "min-similarity", default_value_t = DEFAULT_MIN_SIMILARITY)]
    min_similarity: f32,

    /// Ignore automatic (Ensembl) transcripts when comparing genes
    #[arg(long = "manual-only")]
    manual_only: bool,

    /// Tolerated change of a gene's extent, as a fraction of its source length
    #[arg(long = "max-size-change", default_value_t = DEFAULT_MAX_SIZE_CHANGE)]
    max_size_change: f64,

    /// Don't substitute target genes for lost genes
    #[arg(long = "no-rescue")]
    no_rescue: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    // Validate inputs
    if !args.src.exists() {
        bail!("Source annotation file not found: {}", args.src.display());
    }
    if !args.chain.exists() {
        bail!("Chain file not found: {}", args.chain.display());
    }
    if let Some(target) = &args.target {
        if !target.exists() {
            bail!("Target annotation file not found: {}", target.display());
        }
    }

    let config = Config {
        min_similarity: args.min_similarity,
        manual_only: args.manual_only,
        max_size_change: args.max_size_change,
        rescue: !args.no_rescue,
    };
    config.validate()?;

    let start = Instant::now();
    let chains = ChainIndex::load(&args.chain)?;
    let target_sizes = match &args.target_sizes {
        Some(path) => GenomeSizes::load(path)?,
        None => chains.target_sizes().clone(),
    };
    let target = args
        .target
        .as_deref()
        .map(AnnotationSet::load)
        .transpose()?;
    let src = AnnotationSet::load(&args.src)?;

    let mut mapped_out = GxfWriter::create(&args.mapped, Some(target_sizes))?;
    let mut unmapped_out = GxfWriter::create(&args.unmapped, None)?;

    let mapper = GeneMapper::new(&chains, target.as_ref(), &config);
    let stats = mapper
        .map_set(&src, &mut mapped_out, &mut unmapped_out)
        .context("Failed to remap annotations")?;
    mapped_out.flush()?;
    unmapped_out.flush()?;

    stats.log();
    info!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
