//! Remap and target status values.
//!
//! `RemapStatus` variants are declared in increasing severity, so the derived
//! `Ord` is the severity order used when aggregating child statuses.

use std::fmt;
use std::str::FromStr;

/// How a feature was transferred to the target assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RemapStatus {
    /// Not yet classified.
    #[default]
    None,
    /// Mapped as one contiguous block, same length.
    FullContig,
    /// Every base mapped, stitched from several alignment blocks on one locus.
    FullFragment,
    /// Part of the feature mapped, or it was split across loci.
    Partial,
    /// Nothing mapped although the sequence is covered by the chains.
    Deleted,
    /// The source sequence is absent from the chains.
    NoSeqMap,
    /// Transcripts of a gene mapped to incompatible loci.
    GeneConflict,
    /// The mapped gene extent differs too much from the source.
    GeneSizeChange,
}

/// Error type for parsing remap status from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRemapStatusError;

impl fmt::Display for ParseRemapStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid remap status")
    }
}

impl std::error::Error for ParseRemapStatusError {}

impl FromStr for RemapStatus {
    type Err = ParseRemapStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RemapStatus::None),
            "full_contig" => Ok(RemapStatus::FullContig),
            "full_fragment" => Ok(RemapStatus::FullFragment),
            "partial" => Ok(RemapStatus::Partial),
            "deleted" => Ok(RemapStatus::Deleted),
            "no_seq_map" => Ok(RemapStatus::NoSeqMap),
            "gene_conflict" => Ok(RemapStatus::GeneConflict),
            "gene_size_change" => Ok(RemapStatus::GeneSizeChange),
            _ => Err(ParseRemapStatusError),
        }
    }
}

impl RemapStatus {
    /// Convert status to the attribute value written in output files.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemapStatus::None => "none",
            RemapStatus::FullContig => "full_contig",
            RemapStatus::FullFragment => "full_fragment",
            RemapStatus::Partial => "partial",
            RemapStatus::Deleted => "deleted",
            RemapStatus::NoSeqMap => "no_seq_map",
            RemapStatus::GeneConflict => "gene_conflict",
            RemapStatus::GeneSizeChange => "gene_size_change",
        }
    }

    /// Some part of the feature landed on the target assembly.
    pub fn is_mapped(&self) -> bool {
        matches!(
            self,
            RemapStatus::FullContig | RemapStatus::FullFragment | RemapStatus::Partial
        )
    }

    /// Nothing of the feature landed on the target assembly.
    pub fn is_lost(&self) -> bool {
        matches!(self, RemapStatus::Deleted | RemapStatus::NoSeqMap)
    }

    /// A gene in this state is a candidate for rescue from the target
    /// annotation.
    pub fn is_unusable(&self) -> bool {
        self.is_lost() || matches!(self, RemapStatus::GeneConflict | RemapStatus::GeneSizeChange)
    }
}

impl fmt::Display for RemapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the current content of a feature comes from, relative to the
/// annotation already present on the target assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetStatus {
    /// Not compared against a target annotation.
    #[default]
    Na,
    /// Id not present in the target annotation.
    New,
    /// Source feature did not map.
    Lost,
    /// Mapped onto the locus of the same-id target feature.
    Ok,
    /// Same id exists in the target annotation at another locus.
    Nonoverlap,
    /// Content copied from the target annotation in place of a lost gene.
    Substituted,
}

/// Error type for parsing target status from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTargetStatusError;

impl fmt::Display for ParseTargetStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid target status")
    }
}

impl std::error::Error for ParseTargetStatusError {}

impl FromStr for TargetStatus {
    type Err = ParseTargetStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "na" => Ok(TargetStatus::Na),
            "new" => Ok(TargetStatus::New),
            "lost" => Ok(TargetStatus::Lost),
            "ok" => Ok(TargetStatus::Ok),
            "nonoverlap" => Ok(TargetStatus::Nonoverlap),
            "substituted" => Ok(TargetStatus::Substituted),
            _ => Err(ParseTargetStatusError),
        }
    }
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Na => "na",
            TargetStatus::New => "new",
            TargetStatus::Lost => "lost",
            TargetStatus::Ok => "ok",
            TargetStatus::Nonoverlap => "nonoverlap",
            TargetStatus::Substituted => "substituted",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
