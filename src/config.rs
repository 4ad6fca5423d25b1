//! Configuration and defaults for gxfremap.
//!
//! This module contains the configuration structure and default values
//! that control status classification and rescue of lost genes.

use anyhow::{bail, Result};

/// Default minimum exon similarity for a target gene to replace a lost one.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;

/// Default tolerated relative change of a gene's extent.
pub const DEFAULT_MAX_SIZE_CHANGE: f64 = 0.5;

/// Configuration for the remapping process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum `max_transcript_similarity` for a rescue candidate.
    pub min_similarity: f32,
    /// Ignore automatic (Ensembl) transcripts when scoring rescue candidates.
    pub manual_only: bool,
    /// Mapped gene extent may differ from the source extent by this fraction
    /// of the source length before the gene is flagged.
    pub max_size_change: f64,
    /// Substitute target genes for source genes that did not map.
    pub rescue: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            manual_only: false,
            max_size_change: DEFAULT_MAX_SIZE_CHANGE,
            rescue: true,
        }
    }
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that thresholds are in range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_similarity) {
            bail!(
                "The minimum similarity must range between 0 and 1, got {}.",
                self.min_similarity
            );
        }
        if !(self.max_size_change >= 0.0) {
            bail!(
                "The maximum size change cannot be lower than 0, got {}.",
                self.max_size_change
            );
        }
        Ok(())
    }
}
