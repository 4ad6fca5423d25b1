//! Tree of annotation features for one gene.
//!
//! Nodes live in an arena owned by [`FeatureTree`]; children and the parent
//! back-reference are [`NodeId`]s into that arena. A `NodeId` is only
//! meaningful for the tree that issued it. [`Node`] is a borrowed view used for
//! read-only traversal and comparison between trees.

use std::io::{self, Write};

use crate::status::{RemapStatus, TargetStatus};
use crate::types::{FeatureKind, GxfFeature, SOURCE_ENSEMBL};

/// Remap status attribute name.
pub const REMAP_STATUS_ATTR: &str = "remap_status";
/// Location of the feature before remapping.
pub const REMAP_ORIGINAL_LOCATION_ATTR: &str = "remap_original_location";
/// Count of loci a transcript or gene mapped to.
pub const REMAP_NUM_MAPPINGS_ATTR: &str = "remap_num_mappings";
/// Target status attribute name.
pub const REMAP_TARGET_STATUS_ATTR: &str = "remap_target_status";
/// Set on a target gene copied in place of a source gene that could not be
/// mapped; the value is the source gene id.
pub const REMAP_SUBSTITUTED_MISSING_TARGET_ATTR: &str = "remap_substituted_missing_target";

/// Biotypes of small non-coding genes that are predicted rather than curated.
const SMALL_NON_CODING_BIOTYPES: [&str; 12] = [
    "snRNA",
    "snoRNA",
    "rRNA",
    "Mt_tRNA",
    "Mt_rRNA",
    "misc_RNA",
    "miRNA",
    "scaRNA",
    "ribozyme",
    "sRNA",
    "scRNA",
    "vault_RNA",
];

/// Index of a node within its [`FeatureTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One feature plus its position in the tree and its remap bookkeeping.
#[derive(Debug, Clone)]
pub struct FeatureNode {
    pub feature: GxfFeature,
    pub remap_status: RemapStatus,
    pub target_status: TargetStatus,
    /// Number of loci the feature was mapped to. Only set on bounding features.
    pub num_mappings: usize,
    /// Alignment chain a mapped feature was placed through; for bounding
    /// features, the chain of the primary locus.
    pub chain: Option<usize>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl FeatureNode {
    fn new(feature: GxfFeature) -> Self {
        FeatureNode {
            feature,
            remap_status: RemapStatus::None,
            target_status: TargetStatus::Na,
            num_mappings: 0,
            chain: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Rooted tree of features. The root is created with the tree and is never a
/// child of anything.
#[derive(Debug, Clone)]
pub struct FeatureTree {
    nodes: Vec<FeatureNode>,
}

impl FeatureTree {
    const ROOT: NodeId = NodeId(0);

    /// Create a tree holding only `root`.
    pub fn new(root: GxfFeature) -> Self {
        FeatureTree {
            nodes: vec![FeatureNode::new(root)],
        }
    }

    pub fn root_id(&self) -> NodeId {
        Self::ROOT
    }

    pub fn root(&self) -> Node<'_> {
        self.node(Self::ROOT)
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn get(&self, id: NodeId) -> &FeatureNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut FeatureNode {
        &mut self.nodes[id.0]
    }

    pub fn feature_mut(&mut self, id: NodeId) -> &mut GxfFeature {
        &mut self.nodes[id.0].feature
    }

    /// Number of nodes in the arena, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node; attach it with [`FeatureTree::add_child`].
    pub fn add_node(&mut self, feature: GxfFeature) -> NodeId {
        self.nodes.push(FeatureNode::new(feature));
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` to the children of `parent`.
    ///
    /// # Panics
    ///
    /// If `child` already has a parent, is the root, or is an ancestor of
    /// `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(child != Self::ROOT, "the root of a tree can't be made a child");
        assert!(
            self.nodes[child.0].parent.is_none(),
            "node '{}' already has a parent",
            self.nodes[child.0].feature.location()
        );
        let mut cur = Some(parent);
        while let Some(id) = cur {
            assert!(id != child, "adding child would create a cycle");
            cur = self.nodes[id.0].parent;
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Move all of `subtree` under `parent`, returning the id of its old root.
    pub fn graft(&mut self, parent: NodeId, subtree: FeatureTree) -> NodeId {
        let offset = self.nodes.len();
        for mut node in subtree.nodes {
            node.parent = node.parent.map(|p| NodeId(p.0 + offset));
            for c in node.children.iter_mut() {
                c.0 += offset;
            }
            self.nodes.push(node);
        }
        let child = NodeId(offset);
        self.add_child(parent, child);
        child
    }

    /// Node ids of the subtree at `id`, parents before children, children in
    /// insertion order.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            order.push(cur);
            stack.extend(self.nodes[cur.0].children.iter().rev());
        }
        order
    }

    /// Deep copy of the subtree at `id` into a new, independently owned tree.
    pub fn clone_subtree(&self, id: NodeId) -> FeatureTree {
        let mut copy = FeatureTree { nodes: Vec::new() };
        self.copy_into(id, &mut copy, None);
        copy
    }

    fn copy_into(&self, src: NodeId, dst: &mut FeatureTree, parent: Option<NodeId>) {
        let node = &self.nodes[src.0];
        let new_id = NodeId(dst.nodes.len());
        dst.nodes.push(FeatureNode {
            feature: node.feature.clone(),
            remap_status: node.remap_status,
            target_status: node.target_status,
            num_mappings: node.num_mappings,
            chain: node.chain,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            dst.nodes[p.0].children.push(new_id);
        }
        for &child in &node.children {
            self.copy_into(child, dst, Some(new_id));
        }
    }

    /// Set the remap status of this node only.
    pub fn set_remap_status(&mut self, id: NodeId, status: RemapStatus) {
        self.nodes[id.0].remap_status = status;
    }

    /// Set the remap status of the whole subtree.
    pub fn rset_remap_status(&mut self, id: NodeId, status: RemapStatus) {
        for n in self.preorder(id) {
            self.nodes[n.0].remap_status = status;
        }
    }

    /// Set the target status of this node only.
    pub fn set_target_status(&mut self, id: NodeId, status: TargetStatus) {
        self.nodes[id.0].target_status = status;
    }

    /// Set the target status of the whole subtree.
    pub fn rset_target_status(&mut self, id: NodeId, status: TargetStatus) {
        for n in self.preorder(id) {
            self.nodes[n.0].target_status = status;
        }
    }

    /// Copy each node's remap status into its attributes.
    pub fn rset_remap_status_attr(&mut self, id: NodeId) {
        for n in self.preorder(id) {
            let node = &mut self.nodes[n.0];
            node.feature.set_attr(REMAP_STATUS_ATTR, node.remap_status.as_str());
        }
    }

    /// Copy this node's mapping count into its attributes.
    pub fn set_num_mappings_attr(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        node.feature
            .set_attr(REMAP_NUM_MAPPINGS_ATTR, &node.num_mappings.to_string());
    }

    /// Copy each node's target status into its attributes.
    pub fn rset_target_status_attr(&mut self, id: NodeId) {
        for n in self.preorder(id) {
            let node = &mut self.nodes[n.0];
            node.feature
                .set_attr(REMAP_TARGET_STATUS_ATTR, node.target_status.as_str());
        }
    }

    /// Tag the subtree as a substitute for the lost source gene `source_id`.
    pub fn rset_substituted_missing_target_attr(&mut self, id: NodeId, source_id: &str) {
        for n in self.preorder(id) {
            self.nodes[n.0]
                .feature
                .set_attr(REMAP_SUBSTITUTED_MISSING_TARGET_ATTR, source_id);
        }
    }
}

/// Borrowed view of one node of a [`FeatureTree`].
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    tree: &'a FeatureTree,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a FeatureTree {
        self.tree
    }

    pub fn data(&self) -> &'a FeatureNode {
        self.tree.get(self.id)
    }

    pub fn feature(&self) -> &'a GxfFeature {
        &self.data().feature
    }

    pub fn remap_status(&self) -> RemapStatus {
        self.data().remap_status
    }

    pub fn target_status(&self) -> TargetStatus {
        self.data().target_status
    }

    pub fn chain(&self) -> Option<usize> {
        self.data().chain
    }

    pub fn num_mappings(&self) -> usize {
        self.data().num_mappings
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| tree.node(id))
    }

    pub fn transcripts(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.children().filter(|c| c.is_transcript())
    }

    pub fn exons(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.children().filter(|c| c.is_exon())
    }

    pub fn is_gene(&self) -> bool {
        self.feature().kind() == FeatureKind::Gene
    }

    pub fn is_transcript(&self) -> bool {
        self.feature().kind() == FeatureKind::Transcript
    }

    pub fn is_exon(&self) -> bool {
        self.feature().kind() == FeatureKind::Exon
    }

    pub fn is_gene_or_transcript(&self) -> bool {
        self.is_gene() || self.is_transcript()
    }

    pub fn type_id(&self) -> &'a str {
        self.feature().type_id()
    }

    pub fn type_name(&self) -> &'a str {
        self.feature().type_name()
    }

    pub fn type_biotype(&self) -> &'a str {
        self.feature().type_biotype()
    }

    /// Annotation produced by the automatic pipeline rather than curators.
    pub fn is_automatic(&self) -> bool {
        self.feature().source == SOURCE_ENSEMBL
    }

    /// Pseudogene of any kind except polymorphic.
    pub fn is_pseudogene(&self) -> bool {
        let biotype = self.type_biotype();
        biotype != "polymorphic_pseudogene" && biotype.contains("pseudogene")
    }

    pub fn is_automatic_small_non_coding_gene(&self) -> bool {
        self.is_gene()
            && self.is_automatic()
            && SMALL_NON_CODING_BIOTYPES.contains(&self.type_biotype())
    }

    /// Features of the subtree accepted by `filter`, in preorder.
    pub fn get_matching<F>(&self, filter: F) -> Vec<&'a GxfFeature>
    where
        F: Fn(&GxfFeature) -> bool,
    {
        self.tree
            .preorder(self.id)
            .into_iter()
            .map(|id| &self.tree.get(id).feature)
            .filter(|f| filter(f))
            .collect()
    }

    pub fn any_child_with_remap_status(&self, statuses: &[RemapStatus]) -> bool {
        self.children().any(|c| statuses.contains(&c.remap_status()))
    }

    pub fn all_child_with_remap_status(&self, statuses: &[RemapStatus]) -> bool {
        self.children().all(|c| statuses.contains(&c.remap_status()))
    }

    fn transcript_exon_size(&self) -> u64 {
        self.exons().map(|e| e.feature().length()).sum()
    }

    /// Bases of `exon` covered by the exons of `trans2`.
    fn count_exon_overlap(exon: &GxfFeature, trans2: Node<'_>) -> u64 {
        trans2
            .exons()
            .map(|e2| exon.overlap_amount(e2.feature()))
            .sum()
    }

    /// Symmetric exon overlap between two transcripts:
    /// `2 * shared exon bases / (exon bases of self + exon bases of other)`.
    pub fn exon_similarity(&self, trans2: Node<'_>) -> f32 {
        let total = self.transcript_exon_size() + trans2.transcript_exon_size();
        if total == 0 {
            return 0.0;
        }
        let overlap: u64 = self
            .exons()
            .map(|e1| Self::count_exon_overlap(e1.feature(), trans2))
            .sum();
        (2 * overlap) as f32 / total as f32
    }

    /// Best similarity of `trans1` against the transcripts of this gene.
    fn max_similarity_to(&self, trans1: Node<'_>, manual_only: bool) -> f32 {
        self.transcripts()
            .filter(|t2| !(manual_only && t2.is_automatic()))
            .map(|t2| trans1.exon_similarity(t2))
            .fold(0.0, f32::max)
    }

    /// Best exon similarity over all transcript pairs of this gene and
    /// `gene2`. With `manual_only`, automatic transcripts are ignored on both
    /// sides.
    pub fn max_transcript_similarity(&self, gene2: Node<'_>, manual_only: bool) -> f32 {
        self.transcripts()
            .filter(|t1| !(manual_only && t1.is_automatic()))
            .map(|t1| gene2.max_similarity_to(t1, manual_only))
            .fold(0.0, f32::max)
    }

    /// Write an indented rendition of the subtree for debugging.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.dump_at(writer, 0)
    }

    fn dump_at<W: Write>(&self, writer: &mut W, depth: usize) -> io::Result<()> {
        let f = self.feature();
        writeln!(
            writer,
            "{:indent$}{} {} {} {} [{} {} {}]",
            "",
            f.feature_type,
            f.type_id(),
            f.location(),
            f.strand,
            self.remap_status(),
            self.target_status(),
            self.num_mappings(),
            indent = depth * 4
        )?;
        for child in self.children() {
            child.dump_at(writer, depth + 1)?;
        }
        Ok(())
    }
}
