//! Gene trees of one assembly, indexed by identity and by location.
//!
//! Genes and transcripts are indexed by base id and by name. A key can hold
//! two entries to accommodate the X/Y pseudoautosomal copies of a gene; a
//! lookup then prefers the copy on the caller's sequence. The location index
//! is a [`Lapper`] per sequence, built once after all genes are loaded.

use ahash::AHashMap;
use anyhow::{Context, Result};
use rust_lapper::{Interval, Lapper};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::RemapError;
use crate::feature_tree::{FeatureTree, Node, NodeId};
use crate::gene_tree::GeneTreeBuilder;
use crate::output::GxfWriter;
use crate::parser::GxfReader;
use crate::status::TargetStatus;
use crate::types::{base_id, FeatureKind};

/// Maximum entries per identity key: one per PAR copy.
const MAX_ENTRIES_PER_KEY: usize = 2;

/// Location of a node in an [`AnnotationSet`]: gene index plus node id.
/// Only valid for the set that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureHandle {
    gene: usize,
    node: NodeId,
}

type FeatureMap = AHashMap<String, Vec<FeatureHandle>>;
type LocationIndex = AHashMap<String, Lapper<u64, FeatureHandle>>;

#[derive(Debug, Default)]
pub struct AnnotationSet {
    // holds handles into `genes`, so it is dropped first
    location_map: Option<LocationIndex>,
    id_map: FeatureMap,
    name_map: FeatureMap,
    genes: Vec<FeatureTree>,
}

impl AnnotationSet {
    /// Empty set; add genes with [`AnnotationSet::add_gene`] then call
    /// [`AnnotationSet::build_location_map`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a GFF3 or GTF file and index it.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = GxfReader::open(path)?;
        let set = Self::from_reader(&mut reader)
            .with_context(|| format!("Failed to load annotations from {}", path.display()))?;
        info!("Loaded {} genes from {}", set.genes.len(), path.display());
        Ok(set)
    }

    /// Read every gene from `reader` and index it.
    pub fn from_reader(reader: &mut GxfReader) -> Result<Self> {
        let mut set = Self::new();
        while let Some(feature) = reader.next_feature()? {
            if feature.kind() != FeatureKind::Gene {
                return Err(RemapError::FeatureOutsideGene {
                    feature_type: feature.feature_type.clone(),
                    location: feature.location(),
                }
                .into());
            }
            let tree = GeneTreeBuilder::build(reader, feature)?;
            set.add_gene(tree)?;
        }
        set.build_location_map();
        Ok(set)
    }

    /// Build from trees already in memory.
    pub fn from_genes(genes: Vec<FeatureTree>) -> Result<Self> {
        let mut set = Self::new();
        for gene in genes {
            set.add_gene(gene)?;
        }
        set.build_location_map();
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Genes in load order.
    pub fn genes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.genes.iter().map(|g| g.root())
    }

    pub fn node(&self, handle: FeatureHandle) -> Node<'_> {
        self.genes[handle.gene].node(handle.node)
    }

    fn insert_key(
        map: &mut FeatureMap,
        key: &str,
        handle: FeatureHandle,
    ) -> Result<(), RemapError> {
        let entries = map.entry(key.to_string()).or_default();
        if entries.len() >= MAX_ENTRIES_PER_KEY {
            return Err(RemapError::DuplicateFeature(key.to_string()));
        }
        entries.push(handle);
        Ok(())
    }

    /// Add a gene and index its gene and transcript nodes by id and name.
    ///
    /// A third feature with the same base id is an error. Names are not
    /// unique in practice, so extra entries for a name are ignored.
    pub fn add_gene(&mut self, gene: FeatureTree) -> Result<()> {
        let gene_idx = self.genes.len();
        for id in gene.preorder(gene.root_id()) {
            let node = gene.node(id);
            if !node.is_gene_or_transcript() {
                continue;
            }
            let handle = FeatureHandle { gene: gene_idx, node: id };
            let key = base_id(node.type_id());
            if !key.is_empty() {
                Self::insert_key(&mut self.id_map, key, handle)?;
            }
            let name = node.type_name();
            if !name.is_empty() && Self::insert_key(&mut self.name_map, name, handle).is_err() {
                debug!("Name {} used by more than {} features", name, MAX_ENTRIES_PER_KEY);
            }
        }
        self.genes.push(gene);
        self.location_map = None;
        Ok(())
    }

    /// Index gene and transcript extents by sequence. Intervals are half-open
    /// in the index.
    pub fn build_location_map(&mut self) {
        let mut by_seq: AHashMap<String, Vec<Interval<u64, FeatureHandle>>> = AHashMap::new();
        for (gene_idx, gene) in self.genes.iter().enumerate() {
            for id in gene.preorder(gene.root_id()) {
                let node = gene.node(id);
                if !node.is_gene_or_transcript() {
                    continue;
                }
                let f = node.feature();
                by_seq.entry(f.seqid.clone()).or_default().push(Interval {
                    start: f.start,
                    stop: f.end + 1,
                    val: FeatureHandle { gene: gene_idx, node: id },
                });
            }
        }
        let index: LocationIndex = by_seq
            .into_iter()
            .map(|(seqid, ivs)| (seqid, Lapper::new(ivs)))
            .collect();
        debug!("Built location index over {} sequences", index.len());
        self.location_map = Some(index);
    }

    fn get_feature_by_key<'s>(
        &'s self,
        map: &FeatureMap,
        key: &str,
        seqid: &str,
    ) -> Option<Node<'s>> {
        let entries = map.get(key)?;
        let preferred = if entries.len() > 1 {
            entries
                .iter()
                .find(|&&h| self.node(h).feature().seqid == seqid)
        } else {
            None
        };
        preferred.or(entries.first()).map(|&h| self.node(h))
    }

    /// Gene or transcript with the same base id as `id`. With two PAR copies,
    /// the one on `seq_id_for_par_check` wins, else the first stored.
    pub fn get_feature_by_id(&self, id: &str, seq_id_for_par_check: &str) -> Option<Node<'_>> {
        self.get_feature_by_key(&self.id_map, base_id(id), seq_id_for_par_check)
    }

    /// Gene or transcript named `name`, with the same PAR preference as
    /// [`AnnotationSet::get_feature_by_id`].
    pub fn get_feature_by_name(&self, name: &str, seq_id_for_par_check: &str) -> Option<Node<'_>> {
        self.get_feature_by_key(&self.name_map, name, seq_id_for_par_check)
    }

    /// Genes and transcripts overlapping `seqid:start-end` (1-based, closed),
    /// in load order. Finds nothing until the location index has been built.
    pub fn find_overlapping_features(&self, seqid: &str, start: u64, end: u64) -> Vec<Node<'_>> {
        let Some(lapper) = self.location_map.as_ref().and_then(|m| m.get(seqid)) else {
            return Vec::new();
        };
        let mut handles: Vec<FeatureHandle> =
            lapper.find(start, end + 1).map(|iv| iv.val).collect();
        handles.sort();
        handles.into_iter().map(|h| self.node(h)).collect()
    }

    /// Genes overlapping `gene` whose best transcript similarity to it is at
    /// least `min_similarity`, with the score, in load order.
    pub fn find_overlapping_genes<'s>(
        &'s self,
        gene: Node<'_>,
        min_similarity: f32,
        manual_only: bool,
    ) -> Vec<(Node<'s>, f32)> {
        let f = gene.feature();
        self.find_overlapping_features(&f.seqid, f.start, f.end)
            .into_iter()
            .filter(|n| n.is_gene())
            .map(|n| (n, gene.max_transcript_similarity(n, manual_only)))
            .filter(|&(_, score)| score >= min_similarity)
            .collect()
    }

    /// Highest scoring gene from [`AnnotationSet::find_overlapping_genes`];
    /// the earliest loaded wins ties.
    pub fn best_overlapping_gene<'s>(
        &'s self,
        gene: Node<'_>,
        min_similarity: f32,
        manual_only: bool,
    ) -> Option<(Node<'s>, f32)> {
        let mut best: Option<(Node<'s>, f32)> = None;
        for (node, score) in self.find_overlapping_genes(gene, min_similarity, manual_only) {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((node, score));
            }
        }
        best
    }

    /// How a mapped gene relates to the same-id gene of this set.
    pub fn target_status_for(&self, mapped: Node<'_>) -> TargetStatus {
        let f = mapped.feature();
        match self.get_feature_by_id(mapped.type_id(), &f.seqid) {
            None => TargetStatus::New,
            Some(target) if target.feature().overlaps(f) => TargetStatus::Ok,
            Some(_) => TargetStatus::Nonoverlap,
        }
    }

    /// Write every gene in load order.
    pub fn write<W: Write>(&self, writer: &mut GxfWriter<W>) -> Result<()> {
        for gene in self.genes() {
            writer.write_tree(gene)?;
        }
        Ok(())
    }

    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for gene in self.genes() {
            gene.dump(writer)?;
        }
        Ok(())
    }
}
