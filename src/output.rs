//! Output formatting for annotation records.
//!
//! This module writes feature trees depth-first as GFF3 or GTF, emitting a
//! `##sequence-region` header the first time each sequence is seen on a
//! stream.

use ahash::AHashSet;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::feature_tree::Node;
use crate::parser::GenomeSizes;
use crate::types::{GxfFeature, GxfFormat};

/// Write the file header.
pub fn write_header<W: Write>(writer: &mut W, format: GxfFormat) -> Result<()> {
    if format == GxfFormat::Gff3 {
        writeln!(writer, "##gff-version 3")?;
    }
    Ok(())
}

/// Format a single record as one output line, without the newline.
pub fn format_feature_line(feature: &GxfFeature, format: GxfFormat) -> String {
    let attrs = match format {
        GxfFormat::Gff3 => format_gff3_attributes(feature),
        GxfFormat::Gtf => format_gtf_attributes(feature),
    };
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        feature.seqid,
        feature.source,
        feature.feature_type,
        feature.start,
        feature.end,
        feature.score,
        feature.strand,
        feature.phase,
        attrs
    )
}

fn format_gff3_attributes(feature: &GxfFeature) -> String {
    if feature.attrs.is_empty() {
        return ".".to_string();
    }
    feature
        .attrs
        .iter()
        .map(|(key, values)| {
            let values: Vec<String> = values.iter().map(|v| gff3_escape(v)).collect();
            format!("{}={}", key, values.join(","))
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// GTF values are always written quoted; repeated keys become repeated pairs.
fn format_gtf_attributes(feature: &GxfFeature) -> String {
    feature
        .attrs
        .iter()
        .flat_map(|(key, values)| {
            values
                .iter()
                .map(move |v| format!("{} \"{}\";", key, gtf_escape(v)))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Backslash-escape characters that would end a quoted GTF value early.
fn gtf_escape(value: &str) -> String {
    if !value.contains(['"', '\\']) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn gff3_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("%3B"),
            '=' => out.push_str("%3D"),
            ',' => out.push_str("%2C"),
            '&' => out.push_str("%26"),
            '%' => out.push_str("%25"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            _ => out.push(c),
        }
    }
    out
}

/// One output stream of features.
pub struct GxfWriter<W: Write> {
    writer: W,
    format: GxfFormat,
    sizes: Option<GenomeSizes>,
    seq_regions_written: AHashSet<String>,
}

impl GxfWriter<BufWriter<File>> {
    /// Create an output file, choosing the dialect from its name.
    pub fn create(path: &Path, sizes: Option<GenomeSizes>) -> Result<Self> {
        let format = GxfFormat::from_path(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        GxfWriter::new(BufWriter::new(file), format, sizes)
    }
}

impl<W: Write> GxfWriter<W> {
    /// Wrap `writer` and write the file header.
    pub fn new(mut writer: W, format: GxfFormat, sizes: Option<GenomeSizes>) -> Result<Self> {
        write_header(&mut writer, format)?;
        Ok(GxfWriter {
            writer,
            format,
            sizes,
            seq_regions_written: AHashSet::new(),
        })
    }

    pub fn format(&self) -> GxfFormat {
        self.format
    }

    /// Record that `seqid` has been seen, returning true if it was already.
    fn check_record_seq_region_written(&mut self, seqid: &str) -> bool {
        !self.seq_regions_written.insert(seqid.to_string())
    }

    /// Write the `##sequence-region` header for `seqid` unless this stream
    /// already has one. GTF has no such header.
    pub fn write_seq_region_if_needed(&mut self, seqid: &str) -> Result<()> {
        if self.format != GxfFormat::Gff3 || self.check_record_seq_region_written(seqid) {
            return Ok(());
        }
        match &self.sizes {
            Some(sizes) => {
                let size = sizes.require(seqid)?;
                writeln!(self.writer, "##sequence-region {} 1 {}", seqid, size)?;
            }
            None => writeln!(self.writer, "##sequence-region {}", seqid)?,
        }
        Ok(())
    }

    pub fn write_feature(&mut self, feature: &GxfFeature) -> Result<()> {
        self.write_seq_region_if_needed(&feature.seqid)?;
        writeln!(self.writer, "{}", format_feature_line(feature, self.format))?;
        Ok(())
    }

    /// Write a node and its descendants, parents first, children in order.
    pub fn write_tree(&mut self, node: Node<'_>) -> Result<()> {
        for id in node.tree().preorder(node.id()) {
            self.write_feature(&node.tree().get(id).feature)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush output")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
