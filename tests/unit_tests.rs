//! Library-level tests covering reading, remapping and writing together.
//!
//! These go through the public API the same way the binary does, but with
//! in-memory inputs so each case can set up exactly the records it needs.

use std::io::{BufRead, Cursor};

use gxfremap::{
    AnnotationSet, ChainIndex, Config, GeneMapper, GxfFormat, GxfReader, GxfWriter, RemapError,
    RemapStatus, TargetStatus,
};

// -------------------------------------------------------------------------
// Helper functions
// -------------------------------------------------------------------------

// chr1 [0,3000) -> [5000,8000), [3000,5000) deleted, [5000,10000) -> [8000,13000);
// chr2 maps reversed onto chr2 of size 1000.
const CHAINS: &str = "\
chain 1000 chr1 10000 + 0 10000 chr1 20000 + 5000 13000 1
3000 2000 0
5000

chain 500 chr2 1000 + 0 1000 chr2 1000 - 0 1000 2
1000
";

fn reader(text: &'static str, format: GxfFormat) -> GxfReader {
    let input: Box<dyn BufRead + Send> = Box::new(Cursor::new(text));
    GxfReader::new(input, format)
}

fn load(text: &'static str, format: GxfFormat) -> AnnotationSet {
    AnnotationSet::from_reader(&mut reader(text, format)).unwrap()
}

fn chains() -> ChainIndex {
    ChainIndex::from_reader(Cursor::new(CHAINS)).unwrap()
}

/// Remap `src` and return the mapped and unmapped output as text.
fn run(src: &AnnotationSet, target: Option<&AnnotationSet>, config: &Config) -> (String, String) {
    let chains = chains();
    let mapper = GeneMapper::new(&chains, target, config);
    let mut mapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, None).unwrap();
    let mut unmapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, None).unwrap();
    mapper.map_set(src, &mut mapped, &mut unmapped).unwrap();
    (
        String::from_utf8(mapped.into_inner()).unwrap(),
        String::from_utf8(unmapped.into_inner()).unwrap(),
    )
}

fn records(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.starts_with('#')).collect()
}

const GTF_SOURCE: &str = "\
chr1\tHAVANA\tgene\t101\t1100\t.\t+\t.\tgene_id \"G1.1\"; gene_name \"ONE\"; \
gene_type \"protein_coding\";
chr1\tHAVANA\texon\t101\t200\t.\t+\t.\tgene_id \"G1.1\"; transcript_id \"T1.1\"; exon_number 1;
chr1\tHAVANA\ttranscript\t101\t1100\t.\t+\t.\tgene_id \"G1.1\"; transcript_id \"T1.1\";
chr1\tHAVANA\texon\t1001\t1100\t.\t+\t.\tgene_id \"G1.1\"; transcript_id \"T1.1\"; exon_number 2;
chr2\tHAVANA\tgene\t11\t20\t.\t+\t.\tgene_id \"G2.1\"; gene_name \"TWO\"; \
gene_type \"protein_coding\";
chr2\tHAVANA\ttranscript\t11\t20\t.\t+\t.\tgene_id \"G2.1\"; transcript_id \"T2.1\";
chr2\tHAVANA\texon\t11\t20\t.\t+\t.\tgene_id \"G2.1\"; transcript_id \"T2.1\";
";

// -------------------------------------------------------------------------
// Loading
// -------------------------------------------------------------------------

mod test_loading {
    use super::*;

    #[test]
    fn test_gtf_exon_before_transcript_is_requeued() {
        let set = load(GTF_SOURCE, GxfFormat::Gtf);
        assert_eq!(set.len(), 2);

        let gene = set.genes().next().unwrap();
        assert_eq!(gene.type_id(), "G1.1");
        let transcripts: Vec<_> = gene.transcripts().collect();
        assert_eq!(transcripts.len(), 1);
        let exons: Vec<_> = transcripts[0].exons().collect();
        assert_eq!(exons.len(), 2);
        assert_eq!(exons[0].feature().start, 101);
        assert_eq!(exons[1].feature().start, 1001);
    }

    #[test]
    fn test_lookup_by_base_id_and_name() {
        let set = load(GTF_SOURCE, GxfFormat::Gtf);
        let by_id = set.get_feature_by_id("T1.7", "chr1").unwrap();
        assert!(by_id.is_transcript());
        assert_eq!(by_id.type_id(), "T1.1");
        let by_name = set.get_feature_by_name("TWO", "chr2").unwrap();
        assert_eq!(by_name.type_id(), "G2.1");
        assert!(set.get_feature_by_id("G9", "chr1").is_none());
    }

    #[test]
    fn test_unresolved_parent_is_fatal() {
        let text = "\
chr1\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G1;gene_id=G1
chr1\tHAVANA\texon\t101\t200\t.\t+\t.\tID=E1;Parent=T1
";
        let err = AnnotationSet::from_reader(&mut reader(text, GxfFormat::Gff3)).unwrap_err();
        let remap_err = err.downcast_ref::<RemapError>().unwrap();
        assert!(matches!(remap_err, RemapError::UnresolvedParent { .. }));
    }

    #[test]
    fn test_par_copies_prefer_same_sequence() {
        let text = "\
chrX\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G1.1;gene_id=G1.1;gene_name=PAR
chrY\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G1.1_PAR_Y;gene_id=G1.1_PAR_Y;gene_name=PAR
";
        let set = load(text, GxfFormat::Gff3);
        assert_eq!(set.get_feature_by_id("G1.1", "chrY").unwrap().feature().seqid, "chrY");
        assert_eq!(set.get_feature_by_id("G1.1", "chrX").unwrap().feature().seqid, "chrX");
        assert_eq!(set.get_feature_by_name("PAR", "chr5").unwrap().feature().seqid, "chrX");
    }
}

// -------------------------------------------------------------------------
// Remapping
// -------------------------------------------------------------------------

mod test_remap {
    use super::*;

    #[test]
    fn test_gtf_source_full_contig_and_reverse_strand() {
        let set = load(GTF_SOURCE, GxfFormat::Gtf);
        let (mapped, unmapped) = run(&set, None, &Config::default());
        let lines = records(&mapped);
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("chr1\tHAVANA\tgene\t5101\t6100\t.\t+\t"));
        assert!(lines[0].contains("remap_status=full_contig"));

        // chr2 [10,20) on a reversed target of size 1000 lands at 981-990 on -.
        assert!(lines[4].starts_with("chr2\tHAVANA\tgene\t981\t990\t.\t-\t"));
        assert!(records(&unmapped).is_empty());
    }

    #[test]
    fn test_gene_over_deletion_is_partial() {
        let text = "\
chr1\tHAVANA\tgene\t2901\t3100\t.\t+\t.\tID=G1;gene_id=G1;gene_type=protein_coding
chr1\tHAVANA\ttranscript\t2901\t3100\t.\t+\t.\tID=T1;Parent=G1;transcript_id=T1
chr1\tHAVANA\texon\t2901\t3100\t.\t+\t.\tID=E1;Parent=T1
";
        let set = load(text, GxfFormat::Gff3);
        let (mapped, unmapped) = run(&set, None, &Config::default());
        let mapped_lines = records(&mapped);
        assert_eq!(mapped_lines.len(), 3);
        assert!(mapped_lines[2].contains("\t7901\t8000\t"));
        assert!(mapped_lines[0].contains("remap_status=partial"));

        let unmapped_lines = records(&unmapped);
        assert_eq!(unmapped_lines.len(), 3);
        assert!(unmapped_lines[2].contains("\t3001\t3100\t"));
    }

    #[test]
    fn test_sequence_header_once_per_sequence() {
        let set = load(GTF_SOURCE, GxfFormat::Gtf);
        let chains = chains();
        let config = Config::default();
        let mapper = GeneMapper::new(&chains, None, &config);
        let sizes = chains.target_sizes().clone();
        let mut mapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, Some(sizes)).unwrap();
        let mut unmapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, None).unwrap();
        mapper.map_set(&set, &mut mapped, &mut unmapped).unwrap();

        let text = String::from_utf8(mapped.into_inner()).unwrap();
        let headers: Vec<_> = text.lines().filter(|l| l.starts_with("##")).collect();
        assert_eq!(
            headers,
            vec![
                "##gff-version 3",
                "##sequence-region chr1 1 20000",
                "##sequence-region chr2 1 1000",
            ]
        );
    }

    #[test]
    fn test_stats_count_statuses() {
        let text = "\
chr1\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G1;gene_id=G1
chr1\tHAVANA\tgene\t3101\t3200\t.\t+\t.\tID=G2;gene_id=G2
chr7\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G3;gene_id=G3
";
        let set = load(text, GxfFormat::Gff3);
        let chains = chains();
        let config = Config::default();
        let mapper = GeneMapper::new(&chains, None, &config);
        let mut mapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, None).unwrap();
        let mut unmapped = GxfWriter::new(Vec::new(), GxfFormat::Gff3, None).unwrap();
        let stats = mapper.map_set(&set, &mut mapped, &mut unmapped).unwrap();

        assert_eq!(stats.genes, 3);
        assert_eq!(stats.by_status.get(&RemapStatus::FullContig), Some(&1));
        assert_eq!(stats.by_status.get(&RemapStatus::Deleted), Some(&1));
        assert_eq!(stats.by_status.get(&RemapStatus::NoSeqMap), Some(&1));
        assert_eq!(stats.rescued, 0);
    }
}

// -------------------------------------------------------------------------
// Target annotation
// -------------------------------------------------------------------------

mod test_target {
    use super::*;

    const SOURCE: &str = "\
chr1\tHAVANA\tgene\t101\t200\t.\t+\t.\tID=G1.1;gene_id=G1.1;gene_name=ONE;gene_type=protein_coding
chr1\tHAVANA\ttranscript\t101\t200\t.\t+\t.\tID=T1.1;Parent=G1.1;transcript_id=T1.1
chr1\tHAVANA\texon\t101\t200\t.\t+\t.\tID=E1;Parent=T1.1
";

    #[test]
    fn test_target_status_new_when_absent() {
        let target = load(
            "chr1\tHAVANA\tgene\t9001\t9100\t.\t+\t.\tID=G5.1;gene_id=G5.1\n",
            GxfFormat::Gff3,
        );
        let set = load(SOURCE, GxfFormat::Gff3);
        let chains = chains();
        let config = Config::default();
        let mapper = GeneMapper::new(&chains, Some(&target), &config);
        let result = mapper.map_gene(set.genes().next().unwrap());
        assert_eq!(result.remap_status(), RemapStatus::FullContig);
        assert_eq!(result.target_status(), TargetStatus::New);
    }

    #[test]
    fn test_target_status_nonoverlap() {
        let target = load(
            "chr1\tHAVANA\tgene\t9001\t9100\t.\t+\t.\tID=G1.2;gene_id=G1.2\n",
            GxfFormat::Gff3,
        );
        let set = load(SOURCE, GxfFormat::Gff3);
        let (mapped, _) = run(&set, Some(&target), &Config::default());
        assert!(records(&mapped)[0].contains("remap_target_status=nonoverlap"));
    }

    #[test]
    fn test_low_similarity_not_substituted() {
        // The second exon lands 2000 bases closer after the deletion, so the
        // gene shrinks from 2200 to 200 bases. The mapped exons share 10
        // bases with the target gene: 2 * 10 / (150 + 210).
        let source = "\
chr1\tHAVANA\tgene\t2901\t5100\t.\t+\t.\tID=G1.1;gene_id=G1.1;gene_type=protein_coding
chr1\tHAVANA\ttranscript\t2901\t5100\t.\t+\t.\tID=T1.1;Parent=G1.1;transcript_id=T1.1
chr1\tHAVANA\texon\t2901\t2950\t.\t+\t.\tID=E1;Parent=T1.1
chr1\tHAVANA\texon\t5001\t5100\t.\t+\t.\tID=E2;Parent=T1.1
";
        let target = "\
chr1\tHAVANA\tgene\t8091\t8300\t.\t+\t.\tID=G7.1;gene_id=G7.1
chr1\tHAVANA\ttranscript\t8091\t8300\t.\t+\t.\tID=T7.1;Parent=G7.1;transcript_id=T7.1
chr1\tHAVANA\texon\t8091\t8300\t.\t+\t.\tID=E9;Parent=T7.1
";
        let set = load(source, GxfFormat::Gff3);
        let target = load(target, GxfFormat::Gff3);
        let (mapped, _) = run(&set, Some(&target), &Config::default());
        assert!(mapped.contains("ID=G1.1;"));
        assert!(mapped.contains("remap_status=gene_size_change"));
        assert!(!mapped.contains("G7.1"));

        let lenient = Config {
            min_similarity: 0.05,
            ..Config::default()
        };
        let (mapped, _) = run(&set, Some(&target), &lenient);
        let substituted: Vec<_> = records(&mapped)
            .into_iter()
            .filter(|l| l.contains("remap_substituted_missing_target=G1.1"))
            .collect();
        assert_eq!(substituted.len(), 3);
        assert!(substituted[0].contains("ID=G7.1;"));
    }
}
