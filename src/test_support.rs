//! Tree builders shared by unit tests.

use crate::feature_tree::FeatureTree;
use crate::types::{GxfFeature, Strand, EXON, GENE, TRANSCRIPT};

pub(crate) fn gene(id: &str, seqid: &str, start: u64, end: u64) -> GxfFeature {
    GxfFeature::new(seqid, "HAVANA", GENE, start, end, Strand::Positive)
        .with_attr("ID", id)
        .with_attr("gene_id", id)
        .with_attr("gene_name", &format!("{}-name", id))
        .with_attr("gene_type", "protein_coding")
}

pub(crate) fn transcript(id: &str, seqid: &str, start: u64, end: u64) -> GxfFeature {
    GxfFeature::new(seqid, "HAVANA", TRANSCRIPT, start, end, Strand::Positive)
        .with_attr("ID", id)
        .with_attr("transcript_id", id)
        .with_attr("transcript_type", "protein_coding")
}

pub(crate) fn exon(seqid: &str, start: u64, end: u64) -> GxfFeature {
    GxfFeature::new(seqid, "HAVANA", EXON, start, end, Strand::Positive)
}

/// Gene on the positive strand whose extent covers all of its exons.
pub(crate) fn build_gene(
    gene_id: &str,
    seqid: &str,
    transcripts: &[(&str, &[(u64, u64)])],
) -> FeatureTree {
    let span = |exons: &[(u64, u64)]| {
        let start = exons.iter().map(|e| e.0).min().unwrap_or(1);
        let end = exons.iter().map(|e| e.1).max().unwrap_or(1);
        (start, end)
    };
    let all: Vec<(u64, u64)> = transcripts
        .iter()
        .flat_map(|(_, exons)| exons.iter().copied())
        .collect();
    let (start, end) = span(&all);
    let mut tree = FeatureTree::new(gene(gene_id, seqid, start, end));
    for (trans_id, exons) in transcripts {
        let (ts, te) = span(exons);
        let t = tree.add_node(transcript(trans_id, seqid, ts, te).with_attr("Parent", gene_id));
        tree.add_child(tree.root_id(), t);
        for &(es, ee) in exons.iter() {
            let e = tree.add_node(exon(seqid, es, ee).with_attr("Parent", trans_id));
            tree.add_child(t, e);
        }
    }
    tree
}
