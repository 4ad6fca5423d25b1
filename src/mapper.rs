//! Mapping of whole gene trees through the alignment chains.
//!
//! Leaves (exons and other childless features) are projected directly.
//! Transcripts and genes are rebuilt from their mapped children: the mapped
//! node spans the children that landed on the primary locus, the one that
//! received the most bases, while every mapped child is kept under it.
//! Unmapped children are collected under a copy of the node in source
//! coordinates.

use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::annotation_set::AnnotationSet;
use crate::chain::ChainIndex;
use crate::config::Config;
use crate::feature_tree::{FeatureTree, Node, REMAP_ORIGINAL_LOCATION_ATTR};
use crate::output::GxfWriter;
use crate::remap::{locus_of, Locus, ResultFeatureTrees, TransMappedFeature};
use crate::status::{RemapStatus, TargetStatus};
use crate::types::GxfFeature;

/// Per-run counts, reported at the end.
#[derive(Debug, Default)]
pub struct MapStats {
    pub genes: usize,
    pub by_status: BTreeMap<RemapStatus, usize>,
    pub rescued: usize,
}

impl MapStats {
    fn record(&mut self, result: &ResultFeatureTrees<'_>) {
        self.genes += 1;
        *self.by_status.entry(result.remap_status()).or_default() += 1;
        if result.target.is_some() {
            self.rescued += 1;
        }
    }

    pub fn log(&self) {
        info!("Mapped {} genes", self.genes);
        for (status, count) in &self.by_status {
            info!("  {}: {}", status, count);
        }
        if self.rescued > 0 {
            info!("  substituted from target: {}", self.rescued);
        }
    }
}

pub struct GeneMapper<'a> {
    chains: &'a ChainIndex,
    target: Option<&'a AnnotationSet>,
    config: &'a Config,
}

/// Loci reached by `pieces`, with the mapped bases on each, in first seen
/// order.
fn loci_of(pieces: &[FeatureTree]) -> Vec<(Locus<'_>, u64)> {
    let mut loci: Vec<(Locus<'_>, u64)> = Vec::new();
    for piece in pieces {
        let key = locus_of(piece.root());
        let len = piece.root().feature().length();
        match loci.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bases)) => *bases += len,
            None => loci.push((key, len)),
        }
    }
    loci
}

/// Locus that received the most bases; the first seen wins ties.
fn primary_locus<'t>(loci: &[(Locus<'t>, u64)]) -> Option<Locus<'t>> {
    let mut primary = *loci.first()?;
    for &locus in &loci[1..] {
        if locus.1 > primary.1 {
            primary = locus;
        }
    }
    Some(primary.0)
}

/// Extent of the pieces that landed on `locus`.
fn span_on(pieces: &[FeatureTree], locus: Locus<'_>) -> (u64, u64) {
    pieces
        .iter()
        .map(|p| p.root())
        .filter(|&n| locus_of(n) == locus)
        .fold((u64::MAX, 0), |(s, e), n| (s.min(n.feature().start), e.max(n.feature().end)))
}

/// Copy of `src` moved onto the primary locus of `pieces`.
fn feature_on_locus(src: &GxfFeature, pieces: &[FeatureTree], locus: Locus<'_>) -> GxfFeature {
    let (start, end) = span_on(pieces, locus);
    let mut feature = src.clone();
    feature.seqid = locus.1.to_string();
    feature.strand = locus.2;
    feature.start = start;
    feature.end = end;
    feature.set_attr(REMAP_ORIGINAL_LOCATION_ATTR, &src.location());
    feature
}

/// Mapped node for a bounding feature, plus the number of distinct loci its
/// children landed on.
fn build_mapped_node(
    src: &GxfFeature,
    children: Vec<FeatureTree>,
) -> Option<(FeatureTree, usize)> {
    let loci = loci_of(&children);
    let primary = primary_locus(&loci)?;
    let num_loci = loci.len();
    let chain = primary.0;
    let feature = feature_on_locus(src, &children, primary);

    let mut tree = FeatureTree::new(feature);
    let root = tree.root_id();
    tree.get_mut(root).chain = chain;
    for child in children {
        tree.graft(root, child);
    }
    Some((tree, num_loci))
}

fn build_unmapped_node(src: &GxfFeature, children: Vec<FeatureTree>) -> Option<FeatureTree> {
    if children.is_empty() {
        return None;
    }
    let mut tree = FeatureTree::new(src.clone());
    let root = tree.root_id();
    for child in children {
        tree.graft(root, child);
    }
    Some(tree)
}

impl<'a> GeneMapper<'a> {
    pub fn new(
        chains: &'a ChainIndex,
        target: Option<&'a AnnotationSet>,
        config: &'a Config,
    ) -> Self {
        GeneMapper { chains, target, config }
    }

    fn map_leaf<'s>(&self, src: Node<'s>) -> TransMappedFeature<'s> {
        let f = src.feature();
        let projection = self.chains.project(&f.seqid, f.start, f.end, f.strand);
        let mut mapped = TransMappedFeature::new(src);
        for piece in &projection.mapped {
            let mut feature = f.clone();
            feature.seqid = piece.seqid.clone();
            feature.start = piece.start;
            feature.end = piece.end;
            feature.strand = piece.strand;
            feature.set_attr(
                REMAP_ORIGINAL_LOCATION_ATTR,
                &format!("{}:{}-{}", f.seqid, piece.src_start, piece.src_end),
            );
            let mut tree = FeatureTree::new(feature);
            let root = tree.root_id();
            tree.get_mut(root).chain = Some(piece.chain);
            mapped.add_mapped(tree);
        }
        for &(start, end) in &projection.unmapped {
            let mut feature = f.clone();
            feature.start = start;
            feature.end = end;
            mapped.add_unmapped(FeatureTree::new(feature));
        }
        mapped.set_remap_status(projection.src_seq_in_mapping);
        mapped
    }

    fn map_node<'s>(&self, src: Node<'s>) -> TransMappedFeature<'s> {
        if src.children().next().is_none() {
            self.map_leaf(src)
        } else {
            self.map_bounding(src).into()
        }
    }

    fn map_bounding<'s>(&self, src: Node<'s>) -> ResultFeatureTrees<'s> {
        let mut mapped_children = Vec::new();
        let mut unmapped_children = Vec::new();
        for child in src.children() {
            let child_mapping = self.map_node(child);
            mapped_children.extend(child_mapping.mapped);
            unmapped_children.extend(child_mapping.unmapped);
        }

        let f = src.feature();
        let (mapped, num_loci) = match build_mapped_node(f, mapped_children) {
            Some((tree, n)) => (Some(tree), n),
            None => (None, 0),
        };
        let unmapped = build_unmapped_node(f, unmapped_children);

        let mut result = ResultFeatureTrees::new(src, mapped, unmapped);
        result.set_num_mappings(num_loci);
        result.set_num_mappings_attr();
        result.set_bounding_feature_remap_status(self.chains.contains_seq(&f.seqid));
        result
    }

    /// A gene with no transcripts is mapped like a leaf. The mapped gene spans
    /// its pieces on the primary locus. Pieces on other loci and unmapped
    /// pieces after the first have nowhere to go and are dropped with a warning.
    fn map_childless_gene<'s>(&self, src: Node<'s>) -> ResultFeatureTrees<'s> {
        let leaf = self.map_leaf(src);
        let loci = loci_of(&leaf.mapped);
        let num_loci = loci.len();
        let mapped = primary_locus(&loci).map(|primary| {
            let mut tree = FeatureTree::new(feature_on_locus(src.feature(), &leaf.mapped, primary));
            let root = tree.root_id();
            tree.get_mut(root).chain = primary.0;
            tree.set_remap_status(root, leaf.mapped[0].root().remap_status());
            tree
        });
        let dropped = num_loci.saturating_sub(1) + leaf.unmapped.len().saturating_sub(1);
        if dropped > 0 {
            warn!(
                "Gene {} {} has no transcripts and mapped to {} loci with {} unmapped pieces; \
                 keeping the primary locus and the first unmapped piece",
                src.type_id(),
                src.feature().location(),
                num_loci,
                leaf.unmapped.len()
            );
        }
        let unmapped = leaf.unmapped.into_iter().next();
        let mut result = ResultFeatureTrees::new(src, mapped, unmapped);
        result.set_num_mappings(num_loci);
        result.set_num_mappings_attr();
        result
    }

    /// Map one gene tree, classify it and, if it can't be used, try to
    /// substitute a gene from the target annotation.
    pub fn map_gene<'s>(&self, src: Node<'s>) -> ResultFeatureTrees<'s> {
        let mut result = if src.children().next().is_some() {
            self.map_bounding(src)
        } else {
            self.map_childless_gene(src)
        };
        let status = result.apply_gene_override(self.config.max_size_change);
        debug!("Gene {} {} -> {}", src.type_id(), src.feature().location(), status);

        if let Some(target) = self.target {
            let target_status = result
                .mapped
                .as_ref()
                .map_or(TargetStatus::Lost, |m| target.target_status_for(m.root()));
            result.rset_target_status(target_status);
            if self.config.rescue
                && status.is_unusable()
                && !src.is_automatic_small_non_coding_gene()
            {
                self.rescue(&mut result, target);
            }
        }

        result.rset_remap_status_attr();
        if self.target.is_some() {
            result.rset_target_status_attr();
        }
        result
    }

    /// Find the target gene that best matches the lost gene and substitute it.
    fn rescue(&self, result: &mut ResultFeatureTrees<'_>, target: &AnnotationSet) -> bool {
        let Some(src) = result.src else {
            return false;
        };
        let seqid = &src.feature().seqid;
        let best = {
            let query = match &result.mapped {
                Some(mapped) => Some(mapped.root()),
                None => target
                    .get_feature_by_id(src.type_id(), seqid)
                    .or_else(|| target.get_feature_by_name(src.type_name(), seqid))
                    .filter(|n| n.is_gene()),
            };
            query.and_then(|q| {
                target.best_overlapping_gene(q, self.config.min_similarity, self.config.manual_only)
            })
        };
        match best {
            Some((gene, score)) => {
                info!(
                    "Substituting target gene {} for {} gene {} (similarity {:.3})",
                    gene.type_id(),
                    result.remap_status(),
                    src.type_id(),
                    score
                );
                result.substitute_target(gene);
                true
            }
            None => false,
        }
    }

    /// Map every gene of `src` in load order. Mapped trees and substituted
    /// target genes go to `mapped_out`, unmapped trees to `unmapped_out`.
    pub fn map_set<M: Write, U: Write>(
        &self,
        src: &AnnotationSet,
        mapped_out: &mut GxfWriter<M>,
        unmapped_out: &mut GxfWriter<U>,
    ) -> Result<MapStats> {
        let mut stats = MapStats::default();
        for gene in src.genes() {
            let result = self.map_gene(gene);
            stats.record(&result);
            if let Some(mapped) = &result.mapped {
                mapped_out.write_tree(mapped.root())?;
            }
            if let Some(target) = &result.target {
                mapped_out.write_tree(target.root())?;
            }
            if let Some(unmapped) = &result.unmapped {
                unmapped_out.write_tree(unmapped.root())?;
            }
        }
        Ok(stats)
    }
}
