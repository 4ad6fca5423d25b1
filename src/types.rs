//! Core data structures for gxfremap.
//!
//! This module contains the annotation record type shared by the reader,
//! the feature trees and the writer.

use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Feature type names with special meaning in the gene hierarchy.
pub const GENE: &str = "gene";
pub const TRANSCRIPT: &str = "transcript";
pub const EXON: &str = "exon";

/// GFF3 types that are treated as transcripts.
const TRANSCRIPT_TYPES: [&str; 5] =
    [TRANSCRIPT, "mRNA", "lnc_RNA", "ncRNA", "pseudogenic_transcript"];

/// Annotation source used for automatic (predicted) features.
pub const SOURCE_ENSEMBL: &str = "ENSEMBL";

/// Strand orientation for genomic features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Positive,
    Negative,
    Unstranded,
}

/// Error type for parsing strand from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStrandError;

impl fmt::Display for ParseStrandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid strand: expected '+', '-', '.' or '?'")
    }
}

impl std::error::Error for ParseStrandError {}

impl FromStr for Strand {
    type Err = ParseStrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Positive),
            "-" => Ok(Strand::Negative),
            "." | "?" => Ok(Strand::Unstranded),
            _ => Err(ParseStrandError),
        }
    }
}

impl Strand {
    /// Convert strand to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Positive => "+",
            Strand::Negative => "-",
            Strand::Unstranded => ".",
        }
    }

    /// Opposite strand; unstranded stays unstranded.
    pub fn flip(&self) -> Strand {
        match self {
            Strand::Positive => Strand::Negative,
            Strand::Negative => Strand::Positive,
            Strand::Unstranded => Strand::Unstranded,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Text dialect of an annotation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GxfFormat {
    Gff3,
    Gtf,
}

/// Error type for guessing the GXF dialect from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFormatError(pub String);

impl fmt::Display for ParseFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can't determine annotation format of '{}': \
             expected .gff3, .gff or .gtf (optionally .gz)",
            self.0
        )
    }
}

impl std::error::Error for ParseFormatError {}

impl GxfFormat {
    /// Guess the dialect from the file extension, looking through a `.gz` suffix.
    pub fn from_path(path: &Path) -> Result<Self, ParseFormatError> {
        let name = path.to_string_lossy();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".gff3") || name.ends_with(".gff") {
            Ok(GxfFormat::Gff3)
        } else if name.ends_with(".gtf") {
            Ok(GxfFormat::Gtf)
        } else {
            Err(ParseFormatError(path.display().to_string()))
        }
    }
}

/// Position of a feature type in the gene hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Gene,
    Transcript,
    Exon,
    Other,
}

/// Ordered attribute table; keys may carry several values (e.g. `tag`).
pub type Attributes = IndexMap<String, Vec<String>>;

/// One annotation record.
///
/// Coordinates are 1-based and closed, as in the files.
#[derive(Debug, Clone, PartialEq)]
pub struct GxfFeature {
    pub seqid: String,
    pub source: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub score: String,
    pub strand: Strand,
    pub phase: String,
    pub attrs: Attributes,
}

impl GxfFeature {
    /// Create a feature with no score, phase or attributes.
    pub fn new(
        seqid: &str,
        source: &str,
        feature_type: &str,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Self {
        GxfFeature {
            seqid: seqid.to_string(),
            source: source.to_string(),
            feature_type: feature_type.to_string(),
            start,
            end,
            score: ".".to_string(),
            strand,
            phase: ".".to_string(),
            attrs: Attributes::new(),
        }
    }

    /// Builder-style attribute setter, used heavily by tests.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.add_attr(key, value);
        self
    }

    pub fn kind(&self) -> FeatureKind {
        let t = self.feature_type.as_str();
        if t == GENE {
            FeatureKind::Gene
        } else if TRANSCRIPT_TYPES.contains(&t) {
            FeatureKind::Transcript
        } else if t == EXON {
            FeatureKind::Exon
        } else {
            FeatureKind::Other
        }
    }

    /// Get feature length (end - start + 1).
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// First value of an attribute.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of an attribute.
    pub fn attr_values(&self, key: &str) -> &[String] {
        self.attrs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace all values of an attribute with a single value.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_string(), vec![value.to_string()]);
    }

    /// Append a value to an attribute.
    pub fn add_attr(&mut self, key: &str, value: &str) {
        self.attrs
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Drop every attribute whose name satisfies `pred`, keeping order.
    pub fn remove_attrs_where<F: Fn(&str) -> bool>(&mut self, pred: F) {
        self.attrs.retain(|k, _| !pred(k));
    }

    /// GFF3 `ID`.
    pub fn id(&self) -> Option<&str> {
        self.attr("ID")
    }

    /// GFF3 `Parent` values.
    pub fn parent_ids(&self) -> &[String] {
        self.attr_values("Parent")
    }

    /// Id appropriate for the feature type, or empty if it has none.
    pub fn type_id(&self) -> &str {
        let key = match self.kind() {
            FeatureKind::Gene => "gene_id",
            FeatureKind::Transcript => "transcript_id",
            FeatureKind::Exon => "exon_id",
            FeatureKind::Other => return "",
        };
        self.attr(key).or_else(|| self.id()).unwrap_or("")
    }

    /// Name appropriate for the feature type, or empty.
    pub fn type_name(&self) -> &str {
        let key = match self.kind() {
            FeatureKind::Gene => "gene_name",
            FeatureKind::Transcript => "transcript_name",
            _ => return "",
        };
        self.attr(key).or_else(|| self.attr("Name")).unwrap_or("")
    }

    /// Biotype appropriate for the feature type, or empty.
    ///
    /// Accepts both GENCODE (`gene_type`) and Ensembl (`gene_biotype`) spellings.
    pub fn type_biotype(&self) -> &str {
        let (gencode, ensembl) = match self.kind() {
            FeatureKind::Gene => ("gene_type", "gene_biotype"),
            FeatureKind::Transcript => ("transcript_type", "transcript_biotype"),
            _ => return "",
        };
        self.attr(gencode).or_else(|| self.attr(ensembl)).unwrap_or("")
    }

    /// `seqid:start-end`
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.seqid, self.start, self.end)
    }

    /// Number of bases shared with `other` on the same sequence and strand.
    pub fn overlap_amount(&self, other: &GxfFeature) -> u64 {
        if self.seqid != other.seqid || self.strand != other.strand {
            return 0;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            end - start + 1
        } else {
            0
        }
    }

    pub fn overlaps(&self, other: &GxfFeature) -> bool {
        self.overlap_amount(other) > 0
    }
}

/// Strip the version and PAR suffix from an Ensembl-style id.
///
/// `ENSG00000182378.14_PAR_Y` becomes `ENSG00000182378`.
pub fn base_id(id: &str) -> &str {
    let id = id.strip_suffix("_PAR_Y").unwrap_or(id);
    match id.rfind('.') {
        Some(dot) if dot + 1 < id.len() && id[dot + 1..].bytes().all(|b| b.is_ascii_digit()) => {
            &id[..dot]
        }
        _ => id,
    }
}
