//! Assemble the records of one gene into a [`FeatureTree`].
//!
//! Parents are found through the GFF3 `Parent` attribute, or for GTF through
//! the `gene_id`/`transcript_id` of the enclosing gene and transcript. Records
//! seen before their parent are queued and retried after every successful
//! attachment; anything still queued when the gene ends is an error.

use ahash::AHashMap;
use anyhow::Result;
use tracing::debug;

use crate::error::RemapError;
use crate::feature_tree::{FeatureTree, NodeId};
use crate::parser::GxfReader;
use crate::types::{FeatureKind, GxfFeature, GxfFormat};

/// Attribute prefixes that flat GTF output copies onto gene records.
const GTF_GENE_STRIP_PREFIXES: [&str; 2] = ["transcript_", "exon_"];

/// Parent lookup result for one record.
enum ParentRef {
    Found(Vec<NodeId>),
    Missing(String),
    /// The record does not belong to this gene at all.
    Foreign,
}

pub struct GeneTreeBuilder {
    format: GxfFormat,
    tree: FeatureTree,
    /// GFF3 `ID`, or GTF `transcript_id`, of the nodes added so far.
    ids: AHashMap<String, NodeId>,
    queued: Vec<GxfFeature>,
}

impl GeneTreeBuilder {
    fn new(gene: GxfFeature, format: GxfFormat) -> Self {
        let tree = FeatureTree::new(gene);
        let mut ids = AHashMap::new();
        if format == GxfFormat::Gff3 {
            if let Some(id) = tree.root().feature().id() {
                ids.insert(id.to_string(), tree.root_id());
            }
        }
        GeneTreeBuilder {
            format,
            tree,
            ids,
            queued: Vec::new(),
        }
    }

    /// Read the rest of the gene whose record was just returned by `reader`.
    ///
    /// Stops at the next gene record or at a record with no parent reference,
    /// which is pushed back for the caller.
    pub fn build(reader: &mut GxfReader, gene: GxfFeature) -> Result<FeatureTree> {
        let mut builder = GeneTreeBuilder::new(gene, reader.format());
        while let Some(feature) = reader.next_feature()? {
            if feature.kind() == FeatureKind::Gene {
                reader.push_back(feature);
                break;
            }
            match builder.find_parents(&feature) {
                ParentRef::Found(parents) => {
                    builder.attach(&parents, feature);
                    builder.retry_queued();
                }
                ParentRef::Missing(parent) => {
                    debug!(
                        "queueing {} {} until parent {} is seen",
                        feature.feature_type,
                        feature.location(),
                        parent
                    );
                    builder.queued.push(feature);
                }
                ParentRef::Foreign => {
                    reader.push_back(feature);
                    break;
                }
            }
        }
        builder.finish()
    }

    fn find_parents(&self, feature: &GxfFeature) -> ParentRef {
        match self.format {
            GxfFormat::Gff3 => self.find_gff3_parents(feature),
            GxfFormat::Gtf => self.find_gtf_parent(feature),
        }
    }

    fn find_gff3_parents(&self, feature: &GxfFeature) -> ParentRef {
        let parent_ids = feature.parent_ids();
        if parent_ids.is_empty() {
            return ParentRef::Foreign;
        }
        let mut parents = Vec::with_capacity(parent_ids.len());
        for parent_id in parent_ids {
            match self.ids.get(parent_id) {
                Some(&id) => parents.push(id),
                None => return ParentRef::Missing(parent_id.clone()),
            }
        }
        ParentRef::Found(parents)
    }

    fn find_gtf_parent(&self, feature: &GxfFeature) -> ParentRef {
        let root = self.tree.root();
        let gene_id = root.feature().attr("gene_id");
        if feature.attr("gene_id").is_none() || feature.attr("gene_id") != gene_id {
            return ParentRef::Foreign;
        }
        if feature.kind() == FeatureKind::Transcript {
            return ParentRef::Found(vec![root.id()]);
        }
        match feature.attr("transcript_id") {
            Some(trans_id) => match self.ids.get(trans_id) {
                Some(&id) => ParentRef::Found(vec![id]),
                None => ParentRef::Missing(trans_id.to_string()),
            },
            None => ParentRef::Found(vec![root.id()]),
        }
    }

    /// Add `feature` under each parent; a record with several GFF3 parents is
    /// copied under each one.
    fn attach(&mut self, parents: &[NodeId], feature: GxfFeature) {
        let key = match self.format {
            GxfFormat::Gff3 => feature.id().map(str::to_string),
            GxfFormat::Gtf if feature.kind() == FeatureKind::Transcript => {
                feature.attr("transcript_id").map(str::to_string)
            }
            GxfFormat::Gtf => None,
        };
        let Some((last, rest)) = parents.split_last() else {
            return;
        };
        for &parent in rest {
            let node = self.tree.add_node(feature.clone());
            self.tree.add_child(parent, node);
        }
        let node = self.tree.add_node(feature);
        self.tree.add_child(*last, node);
        if let Some(key) = key {
            self.ids.insert(key, node);
        }
    }

    /// Attach every queued record whose parents are now present, repeating
    /// until a pass makes no progress.
    fn retry_queued(&mut self) {
        loop {
            let mut progress = false;
            let queued = std::mem::take(&mut self.queued);
            for feature in queued {
                match self.find_parents(&feature) {
                    ParentRef::Found(parents) => {
                        self.attach(&parents, feature);
                        progress = true;
                    }
                    _ => self.queued.push(feature),
                }
            }
            if !progress || self.queued.is_empty() {
                break;
            }
        }
    }

    fn finish(mut self) -> Result<FeatureTree> {
        if let Some(feature) = self.queued.first() {
            let parent = match self.find_parents(feature) {
                ParentRef::Missing(parent) => parent,
                _ => String::new(),
            };
            let id = match feature.type_id() {
                "" => feature.location(),
                id => id.to_string(),
            };
            return Err(RemapError::UnresolvedParent {
                gene: self.tree.root().type_id().to_string(),
                feature_type: feature.feature_type.clone(),
                id,
                parent,
            }
            .into());
        }
        if self.format == GxfFormat::Gtf {
            remove_transcript_attrs_on_gene(&mut self.tree);
        }
        Ok(self.tree)
    }
}

/// Flat GTF files repeat transcript and exon attributes on gene and
/// transcript lines; drop them from the levels they don't describe.
fn remove_transcript_attrs_on_gene(tree: &mut FeatureTree) {
    let root = tree.root_id();
    tree.feature_mut(root)
        .remove_attrs_where(|k| GTF_GENE_STRIP_PREFIXES.iter().any(|p| k.starts_with(p)));
    let transcripts: Vec<NodeId> = tree.root().transcripts().map(|t| t.id()).collect();
    for t in transcripts {
        tree.feature_mut(t)
            .remove_attrs_where(|k| k.starts_with("exon_"));
    }
}
