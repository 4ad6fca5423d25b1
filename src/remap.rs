//! Remap status classification.
//!
//! A [`TransMappedFeature`] holds the raw pieces produced by projecting one
//! feature through the alignment chains and classifies that single level.
//! [`ResultFeatureTrees`] holds the assembled trees for a feature and derives
//! the status of genes and transcripts from their children.

use std::io::{self, Write};

use crate::feature_tree::{FeatureTree, Node};
use crate::status::{RemapStatus, TargetStatus};
use crate::types::Strand;

/// Target locus of a mapped node: the chain it went through plus its
/// sequence and strand. Pieces of one chain are collinear, so two far apart
/// places on the same sequence reached through different chains are
/// different loci.
pub(crate) type Locus<'a> = (Option<usize>, &'a str, Strand);

pub(crate) fn locus_of<'a>(node: Node<'a>) -> Locus<'a> {
    let f = node.feature();
    (node.chain(), f.seqid.as_str(), f.strand)
}

/// Mapped and unmapped pieces of a single feature. A feature may be split
/// when mapped, hence vectors.
#[derive(Debug, Default)]
pub struct TransMappedFeature<'a> {
    pub src: Option<Node<'a>>,
    pub mapped: Vec<FeatureTree>,
    pub unmapped: Vec<FeatureTree>,
}

impl<'a> TransMappedFeature<'a> {
    pub fn new(src: Node<'a>) -> Self {
        TransMappedFeature {
            src: Some(src),
            mapped: Vec::new(),
            unmapped: Vec::new(),
        }
    }

    pub fn add_mapped(&mut self, tree: FeatureTree) {
        self.mapped.push(tree);
    }

    pub fn add_unmapped(&mut self, tree: FeatureTree) {
        self.unmapped.push(tree);
    }

    /// Classify this one level of mapping. `src_seq_in_mapping` tells if the
    /// source sequence is covered by the chains at all.
    pub fn calc_remap_status(&self, src_seq_in_mapping: bool) -> RemapStatus {
        if self.mapped.is_empty() {
            return if src_seq_in_mapping {
                RemapStatus::Deleted
            } else {
                RemapStatus::NoSeqMap
            };
        }
        if !self.unmapped.is_empty() {
            return RemapStatus::Partial;
        }
        let first = self.mapped[0].root().feature();
        if self.mapped.len() == 1 {
            let same_length = self
                .src
                .map_or(true, |src| src.feature().length() == first.length());
            if same_length {
                return RemapStatus::FullContig;
            }
        }
        let first_locus = locus_of(self.mapped[0].root());
        let one_locus = self.mapped.iter().all(|m| locus_of(m.root()) == first_locus);
        if one_locus {
            RemapStatus::FullFragment
        } else {
            RemapStatus::Partial
        }
    }

    /// Classify and store the status on every piece.
    pub fn set_remap_status(&mut self, src_seq_in_mapping: bool) {
        let status = self.calc_remap_status(src_seq_in_mapping);
        for tree in self.mapped.iter_mut().chain(self.unmapped.iter_mut()) {
            let root = tree.root_id();
            tree.set_remap_status(root, status);
        }
    }
}

impl<'a> From<ResultFeatureTrees<'a>> for TransMappedFeature<'a> {
    fn from(trees: ResultFeatureTrees<'a>) -> Self {
        TransMappedFeature {
            src: trees.src,
            mapped: trees.mapped.into_iter().collect(),
            unmapped: trees.unmapped.into_iter().collect(),
        }
    }
}

/// Trees resulting from mapping one source feature.
///
/// `src` borrows from the source annotation and is only valid while it is
/// alive. `target` is only filled in by rescue and carries target status, never
/// remap status.
#[derive(Debug, Default)]
pub struct ResultFeatureTrees<'a> {
    pub src: Option<Node<'a>>,
    pub mapped: Option<FeatureTree>,
    pub unmapped: Option<FeatureTree>,
    pub target: Option<FeatureTree>,
}

impl<'a> ResultFeatureTrees<'a> {
    pub fn new(src: Node<'a>, mapped: Option<FeatureTree>, unmapped: Option<FeatureTree>) -> Self {
        ResultFeatureTrees {
            src: Some(src),
            mapped,
            unmapped,
            target: None,
        }
    }

    /// Remove and return the unmapped tree.
    pub fn free_unmapped(&mut self) -> Option<FeatureTree> {
        self.unmapped.take()
    }

    fn live_trees_mut(&mut self) -> impl Iterator<Item = &mut FeatureTree> {
        self.mapped.iter_mut().chain(self.unmapped.iter_mut())
    }

    fn first_present(&self) -> Option<&FeatureTree> {
        self.mapped
            .as_ref()
            .or(self.unmapped.as_ref())
            .or(self.target.as_ref())
    }

    /// Remap status from mapped, unmapped or target, in that order.
    pub fn remap_status(&self) -> RemapStatus {
        self.first_present()
            .map_or(RemapStatus::Deleted, |t| t.root().remap_status())
    }

    /// Target status from mapped, unmapped or target, in that order.
    pub fn target_status(&self) -> TargetStatus {
        self.first_present()
            .map_or(TargetStatus::Lost, |t| t.root().target_status())
    }

    /// Number of mappings from mapped or unmapped.
    pub fn num_mappings(&self) -> usize {
        self.mapped
            .as_ref()
            .or(self.unmapped.as_ref())
            .map_or(0, |t| t.root().num_mappings())
    }

    pub fn set_num_mappings(&mut self, num_mappings: usize) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.get_mut(root).num_mappings = num_mappings;
        }
    }

    pub fn set_remap_status(&mut self, status: RemapStatus) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.set_remap_status(root, status);
        }
    }

    /// Recursively set the remap status on mapped and unmapped.
    pub fn rset_remap_status(&mut self, status: RemapStatus) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.rset_remap_status(root, status);
        }
    }

    pub fn set_target_status(&mut self, status: TargetStatus) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.set_target_status(root, status);
        }
    }

    pub fn rset_target_status(&mut self, status: TargetStatus) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.rset_target_status(root, status);
        }
    }

    pub fn rset_target_status_attr(&mut self) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.rset_target_status_attr(root);
        }
    }

    pub fn rset_remap_status_attr(&mut self) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.rset_remap_status_attr(root);
        }
    }

    pub fn set_num_mappings_attr(&mut self) {
        for tree in self.live_trees_mut() {
            let root = tree.root_id();
            tree.set_num_mappings_attr(root);
        }
    }

    fn child_statuses(&self) -> Vec<RemapStatus> {
        self.mapped
            .iter()
            .chain(self.unmapped.iter())
            .flat_map(|t| t.root().children().map(|c| c.remap_status()))
            .collect()
    }

    /// Status of a gene or transcript derived from its children: the most
    /// severe child status, except that a mix of mapped and lost children is
    /// `Partial`. `NoSeqMap` only surfaces when the source sequence is not in
    /// the chains. Doesn't handle `GeneConflict` or `GeneSizeChange`, see
    /// [`ResultFeatureTrees::calc_gene_override`].
    pub fn calc_bounding_feature_remap_status(&self, src_seq_in_mapping: bool) -> RemapStatus {
        let statuses = self.child_statuses();
        let status = match statuses.iter().max() {
            None => RemapStatus::NoSeqMap,
            Some(&worst) => {
                let any_mapped = statuses.iter().any(RemapStatus::is_mapped);
                let any_lost = statuses.iter().any(RemapStatus::is_lost);
                if any_mapped && any_lost {
                    RemapStatus::Partial
                } else {
                    worst
                }
            }
        };
        if status == RemapStatus::NoSeqMap && src_seq_in_mapping {
            RemapStatus::Deleted
        } else {
            status
        }
    }

    /// Store the bounding status on the roots of mapped and unmapped.
    pub fn set_bounding_feature_remap_status(&mut self, src_seq_in_mapping: bool) {
        let status = self.calc_bounding_feature_remap_status(src_seq_in_mapping);
        self.set_remap_status(status);
    }

    /// Gene-level conditions that replace the aggregated status.
    ///
    /// `GeneConflict` when mapped transcripts landed on more than one
    /// sequence/strand, `GeneSizeChange` when the mapped extent differs from
    /// the source extent by more than `max_size_change` (a fraction of the
    /// source length). Automatic small non-coding genes are exempt from both,
    /// pseudogenes from the size check.
    pub fn calc_gene_override(&self, max_size_change: f64) -> Option<RemapStatus> {
        let src = self.src?;
        let mapped = self.mapped.as_ref()?.root();
        if !src.is_gene() || src.is_automatic_small_non_coding_gene() {
            return None;
        }
        let mut loci: Vec<Locus<'_>> = mapped.children().map(locus_of).collect();
        loci.sort();
        loci.dedup();
        if loci.len() > 1 {
            return Some(RemapStatus::GeneConflict);
        }
        if !src.is_pseudogene() {
            let src_len = src.feature().length() as f64;
            let mapped_len = mapped.feature().length() as f64;
            if (mapped_len - src_len).abs() / src_len > max_size_change {
                return Some(RemapStatus::GeneSizeChange);
            }
        }
        None
    }

    /// Apply [`ResultFeatureTrees::calc_gene_override`] to every mapped and
    /// unmapped node, returning the final status.
    pub fn apply_gene_override(&mut self, max_size_change: f64) -> RemapStatus {
        if let Some(status) = self.calc_gene_override(max_size_change) {
            self.rset_remap_status(status);
        }
        self.remap_status()
    }

    /// Fill `target` with a copy of `replacement` standing in for the source
    /// gene, which is marked lost.
    pub fn substitute_target(&mut self, replacement: Node<'_>) {
        let mut target = replacement.tree().clone_subtree(replacement.id());
        let root = target.root_id();
        let source_id = self.src.map_or("", |s| s.type_id());
        target.rset_target_status(root, TargetStatus::Substituted);
        target.rset_target_status_attr(root);
        target.rset_substituted_missing_target_attr(root, source_id);
        self.target = Some(target);
        self.rset_target_status(TargetStatus::Lost);
    }

    /// Print mapped and unmapped trees for debugging.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if let Some(mapped) = &self.mapped {
            writeln!(writer, "@@@ mapped")?;
            mapped.root().dump(writer)?;
        }
        if let Some(unmapped) = &self.unmapped {
            writeln!(writer, "@@@ unmapped")?;
            unmapped.root().dump(writer)?;
        }
        if let Some(target) = &self.target {
            writeln!(writer, "@@@ target")?;
            target.root().dump(writer)?;
        }
        Ok(())
    }
}
