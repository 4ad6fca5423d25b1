//! UCSC chain alignments and projection of source intervals through them.
//!
//! Chain files are read with [`chainfile::Reader`]. Chain "reference" is the
//! source assembly and "query" the target. The stepthrough of each section
//! yields its ungapped blocks as interbase interval pairs; a reverse strand
//! query interval runs from its higher coordinate down. Blocks are stored by
//! their source range in a [`Lapper`] per source sequence. Projection results are 1-based and closed like annotation
//! records.

use ahash::AHashMap;
use anyhow::{Context, Result};
use rust_lapper::{Interval, Lapper};
use std::io::BufRead;
use std::path::Path;
use tracing::info;

use crate::error::RemapError;
use crate::parser::util::open_input;
use crate::parser::GenomeSizes;
use crate::types::Strand;

/// Ungapped block of one chain.
///
/// `tgt_pos` is the interbase target position aligned to `src_start`. On a
/// reverse strand chain target positions decrease as source positions grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    chain: usize,
    src_start: u64,
    tgt_pos: u64,
    reverse: bool,
}

impl Block {
    /// Interbase target position aligned to source position `pos`.
    fn target_at(&self, pos: u64) -> u64 {
        if self.reverse {
            self.tgt_pos - (pos - self.src_start)
        } else {
            self.tgt_pos + (pos - self.src_start)
        }
    }
}

/// Part of a projection through one chain, interbase on both sides.
struct Aligned {
    chain: usize,
    reverse: bool,
    src_start: u64,
    src_end: u64,
    tgt_start: u64,
    tgt_end: u64,
}

/// One aligned piece of a projected interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPiece {
    /// Chain the piece was projected through. Pieces from one chain are
    /// collinear and make up a single locus.
    pub chain: usize,
    /// Source part covered by this piece.
    pub src_start: u64,
    pub src_end: u64,
    pub seqid: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl MappedPiece {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Result of projecting one source interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Pieces in source order.
    pub mapped: Vec<MappedPiece>,
    /// Source sub-intervals with no alignment.
    pub unmapped: Vec<(u64, u64)>,
    /// Whether the source sequence appears in any chain.
    pub src_seq_in_mapping: bool,
}

#[derive(Debug, Default)]
pub struct ChainIndex {
    blocks: AHashMap<String, Lapper<u64, Block>>,
    /// Target sequence of each chain, in file order.
    targets: Vec<String>,
    source_sizes: GenomeSizes,
    target_sizes: GenomeSizes,
}

fn malformed(chain: usize, reason: String) -> RemapError {
    RemapError::MalformedChain { chain, reason }
}

impl ChainIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = open_input(path)?;
        let index = Self::from_reader(reader)
            .with_context(|| format!("Failed to load chains from {}", path.display()))?;
        info!(
            "Loaded {} chains over {} source sequences from {}",
            index.targets.len(),
            index.blocks.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = ChainIndex::default();
        let mut by_seq: AHashMap<String, Vec<Interval<u64, Block>>> = AHashMap::new();
        let mut reader = chainfile::Reader::new(reader);

        for (i, result) in reader.sections().enumerate() {
            let chain_num = i + 1;
            let section = result.map_err(|e| malformed(chain_num, e.to_string()))?;
            let header = section.header();
            let src_seqid = header.reference_sequence().chromosome_name().to_string();
            let tgt_seqid = header.query_sequence().chromosome_name().to_string();
            index
                .source_sizes
                .insert(&src_seqid, header.reference_sequence().chromosome_size() as u64);
            index
                .target_sizes
                .insert(&tgt_seqid, header.query_sequence().chromosome_size() as u64);
            let chain = index.targets.len();
            index.targets.push(tgt_seqid);

            let pairs = section
                .stepthrough()
                .map_err(|e| malformed(chain_num, e.to_string()))?;
            let blocks = by_seq.entry(src_seqid).or_default();
            for result in pairs {
                let pair = result.map_err(|e| malformed(chain_num, e.to_string()))?;
                let src_start = pair.reference().start().position().get() as u64;
                let src_end = pair.reference().end().position().get() as u64;
                let tgt_start = pair.query().start().position().get() as u64;
                let tgt_end = pair.query().end().position().get() as u64;
                if src_end < src_start {
                    let reason = "source strand must be '+'".to_string();
                    return Err(malformed(chain_num, reason).into());
                }
                if src_end == src_start {
                    continue;
                }
                // Reverse strand intervals run from the higher coordinate down.
                blocks.push(Interval {
                    start: src_start,
                    stop: src_end,
                    val: Block {
                        chain,
                        src_start,
                        tgt_pos: tgt_start,
                        reverse: tgt_end < tgt_start,
                    },
                });
            }
        }

        index.blocks = by_seq
            .into_iter()
            .filter(|(_, ivs)| !ivs.is_empty())
            .map(|(seqid, ivs)| (seqid, Lapper::new(ivs)))
            .collect();
        Ok(index)
    }

    pub fn num_chains(&self) -> usize {
        self.targets.len()
    }

    pub fn contains_seq(&self, seqid: &str) -> bool {
        self.blocks.contains_key(seqid)
    }

    /// Sizes of source sequences named in chain headers.
    pub fn source_sizes(&self) -> &GenomeSizes {
        &self.source_sizes
    }

    /// Sizes of target sequences named in chain headers.
    pub fn target_sizes(&self) -> &GenomeSizes {
        &self.target_sizes
    }

    /// Project `seqid:start-end` (1-based, closed) on `strand`.
    ///
    /// Blocks of the same chain that are contiguous on both sides are merged.
    /// Pieces on a negative strand chain are converted to positive strand
    /// coordinates and their strand is flipped.
    pub fn project(&self, seqid: &str, start: u64, end: u64, strand: Strand) -> Projection {
        let Some(lapper) = self.blocks.get(seqid) else {
            return Projection {
                mapped: Vec::new(),
                unmapped: vec![(start, end)],
                src_seq_in_mapping: false,
            };
        };
        let (qstart, qend) = (start - 1, end);

        let mut hits: Vec<&Interval<u64, Block>> = lapper.find(qstart, qend).collect();
        hits.sort_by_key(|iv| (iv.val.chain, iv.start));

        let mut raw: Vec<Aligned> = Vec::with_capacity(hits.len());
        for iv in hits {
            let block = &iv.val;
            let s = iv.start.max(qstart);
            let e = iv.stop.min(qend);
            let (ts, te) = (block.target_at(s), block.target_at(e));
            if let Some(last) = raw.last_mut() {
                if last.chain == block.chain && last.src_end == s && last.tgt_end == ts {
                    last.src_end = e;
                    last.tgt_end = te;
                    continue;
                }
            }
            raw.push(Aligned {
                chain: block.chain,
                reverse: block.reverse,
                src_start: s,
                src_end: e,
                tgt_start: ts,
                tgt_end: te,
            });
        }
        raw.sort_by_key(|a| (a.src_start, a.chain));

        let mapped = raw
            .iter()
            .map(|a| MappedPiece {
                chain: a.chain,
                src_start: a.src_start + 1,
                src_end: a.src_end,
                seqid: self.targets[a.chain].clone(),
                start: a.tgt_start.min(a.tgt_end) + 1,
                end: a.tgt_start.max(a.tgt_end),
                strand: if a.reverse { strand.flip() } else { strand },
            })
            .collect();

        let mut covered: Vec<(u64, u64)> = raw.iter().map(|a| (a.src_start, a.src_end)).collect();
        covered.sort();
        let mut unmapped = Vec::new();
        let mut cursor = qstart;
        for (s, e) in covered {
            if s > cursor {
                unmapped.push((cursor + 1, s));
            }
            cursor = cursor.max(e);
        }
        if cursor < qend {
            unmapped.push((cursor + 1, qend));
        }

        Projection {
            mapped,
            unmapped,
            src_seq_in_mapping: true,
        }
    }
}
