//! GFF3/GTF record reader with push-back.
//!
//! Records are returned one at a time. Comment and directive lines are
//! skipped; a `##FASTA` directive ends the feature section. Any line that is
//! not a well-formed nine column record is a fatal error.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::error::RemapError;
use crate::parser::util::open_input;
use crate::types::{Attributes, GxfFeature, GxfFormat, Strand};

/// Pull reader over an annotation file.
pub struct GxfReader {
    reader: Box<dyn BufRead + Send>,
    format: GxfFormat,
    line_num: usize,
    pushed_back: Vec<GxfFeature>,
    done: bool,
}

impl GxfReader {
    /// Open a GFF3 or GTF file (supports .gz), guessing the dialect from its name.
    pub fn open(path: &Path) -> Result<Self> {
        let format = GxfFormat::from_path(path)?;
        let reader = open_input(path)?;
        Ok(Self::new(reader, format))
    }

    pub fn new(reader: Box<dyn BufRead + Send>, format: GxfFormat) -> Self {
        GxfReader {
            reader,
            format,
            line_num: 0,
            pushed_back: Vec::new(),
            done: false,
        }
    }

    pub fn format(&self) -> GxfFormat {
        self.format
    }

    /// Return a record to the reader; it is returned again by the next call
    /// to [`GxfReader::next_feature`]. Several pushed back records come back
    /// in reverse order of pushing.
    pub fn push_back(&mut self, feature: GxfFeature) {
        self.pushed_back.push(feature);
    }

    /// Read the next feature, or `None` at the end of the feature section.
    pub fn next_feature(&mut self) -> Result<Option<GxfFeature>> {
        if let Some(feature) = self.pushed_back.pop() {
            return Ok(Some(feature));
        }
        let mut line = String::new();
        while !self.done {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read annotation line")?;
            if bytes_read == 0 {
                self.done = true;
                break;
            }
            self.line_num += 1;

            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.starts_with("##FASTA") {
                self.done = true;
                break;
            }
            if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some(parse_line(trimmed, self.format, self.line_num)?));
        }
        Ok(None)
    }
}

/// Parse one tab separated record.
pub fn parse_line(
    line: &str,
    format: GxfFormat,
    line_num: usize,
) -> Result<GxfFeature, RemapError> {
    let malformed = |reason: String| RemapError::MalformedRecord {
        line: line_num,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 9 {
        return Err(malformed(format!("expected 9 columns, found {}", fields.len())));
    }
    let start: u64 = fields[3]
        .parse()
        .map_err(|_| malformed(format!("invalid start '{}'", fields[3])))?;
    let end: u64 = fields[4]
        .parse()
        .map_err(|_| malformed(format!("invalid end '{}'", fields[4])))?;
    if start == 0 || start > end {
        return Err(malformed(format!("invalid range {}-{}", start, end)));
    }
    let strand: Strand = fields[6]
        .parse()
        .map_err(|e| malformed(format!("{}", e)))?;
    let attrs = match format {
        GxfFormat::Gff3 => parse_gff3_attributes(fields[8]),
        GxfFormat::Gtf => parse_gtf_attributes(fields[8]),
    }
    .map_err(malformed)?;

    Ok(GxfFeature {
        seqid: fields[0].to_string(),
        source: fields[1].to_string(),
        feature_type: fields[2].to_string(),
        start,
        end,
        score: fields[5].to_string(),
        strand,
        phase: fields[7].to_string(),
        attrs,
    })
}

/// Parse GFF3 `key=v1,v2;key=v` attributes, percent-decoding values.
fn parse_gff3_attributes(text: &str) -> Result<Attributes, String> {
    let mut attrs = Attributes::new();
    if text == "." {
        return Ok(attrs);
    }
    for part in text.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("attribute '{}' has no value", part))?;
        let values = attrs.entry(key.to_string()).or_default();
        for v in value.split(',') {
            values.push(percent_decode(v));
        }
    }
    Ok(attrs)
}

/// Parse GTF `key "value"; key value;` attributes.
///
/// Semicolons inside quoted values do not end the attribute.
fn parse_gtf_attributes(text: &str) -> Result<Attributes, String> {
    let mut attrs = Attributes::new();
    for part in split_unquoted(text, ';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once(char::is_whitespace)
            .ok_or_else(|| format!("attribute '{}' has no value", part))?;
        let value = value.trim();
        let value = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(quoted) => gtf_unescape(quoted),
            None => value.to_string(),
        };
        attrs.entry(key.to_string()).or_default().push(value);
    }
    Ok(attrs)
}

fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Undo backslash escapes inside a quoted GTF value.
fn gtf_unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
