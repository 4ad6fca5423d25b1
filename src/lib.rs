//! gxfremap - Gene annotation remapping library.
//!
//! This library transfers gene, transcript and exon annotations from one
//! genome assembly to another through UCSC alignment chains, classifies how
//! well each feature survived the transfer, and substitutes genes already
//! annotated on the target assembly for genes that were lost.
//!
//! # Features
//!
//! - Read GFF3 and GTF files (with gzip support) into per-gene feature trees
//! - Project features through chain alignments, splitting them across blocks
//! - Classify features from intact to deleted, and flag genes whose
//!   transcripts conflict or whose size changed
//! - Rescue lost genes by exon similarity against a target annotation
//! - Write GFF3 or GTF with remap status attributes
//!
//! # Example
//!
//! ```ignore
//! use gxfremap::{AnnotationSet, ChainIndex, Config, GeneMapper, GxfWriter};
//! use std::path::Path;
//!
//! let config = Config::default();
//! let chains = ChainIndex::load(Path::new("hg19ToHg38.over.chain.gz"))?;
//! let src = AnnotationSet::load(Path::new("gencode.v19.gff3.gz"))?;
//! let mapper = GeneMapper::new(&chains, None, &config);
//!
//! let mut mapped = GxfWriter::create(Path::new("mapped.gff3"), None)?;
//! let mut unmapped = GxfWriter::create(Path::new("unmapped.gff3"), None)?;
//! let stats = mapper.map_set(&src, &mut mapped, &mut unmapped)?;
//! stats.log();
//! ```

pub mod annotation_set;
pub mod chain;
pub mod config;
pub mod error;
pub mod feature_tree;
pub mod gene_tree;
pub mod mapper;
pub mod output;
pub mod parser;
pub mod remap;
pub mod status;
pub mod types;

#[cfg(test)]
mod test_support;

pub use annotation_set::{AnnotationSet, FeatureHandle};
pub use chain::{ChainIndex, Projection};
pub use config::Config;
pub use error::RemapError;
pub use feature_tree::{FeatureNode, FeatureTree, Node, NodeId};
pub use mapper::{GeneMapper, MapStats};
pub use output::GxfWriter;
pub use parser::{GenomeSizes, GxfReader};
pub use remap::{ResultFeatureTrees, TransMappedFeature};
pub use status::{RemapStatus, TargetStatus};
pub use types::{GxfFeature, GxfFormat, Strand};
