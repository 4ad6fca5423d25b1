//! Sequence size tables (`seqid<TAB>length`, as in UCSC chrom.sizes files).

use ahash::AHashMap;
use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::error::RemapError;
use crate::parser::util::open_input;

#[derive(Debug, Clone, Default)]
pub struct GenomeSizes {
    sizes: AHashMap<String, u64>,
}

impl GenomeSizes {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = open_input(path)?;
        Self::from_reader(reader)
            .with_context(|| format!("Failed to load sizes from {}", path.display()))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut sizes = AHashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read size line")?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let (Some(name), Some(size)) = (fields.next(), fields.next()) else {
                return Err(RemapError::MalformedRecord {
                    line: i + 1,
                    reason: "expected sequence name and size".to_string(),
                }
                .into());
            };
            let size: u64 = size.parse().map_err(|_| RemapError::MalformedRecord {
                line: i + 1,
                reason: format!("invalid size '{}'", size),
            })?;
            sizes.insert(name.to_string(), size);
        }
        Ok(GenomeSizes { sizes })
    }

    pub fn insert(&mut self, name: &str, size: u64) {
        self.sizes.insert(name.to_string(), size);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    /// Size of a sequence that must be present.
    pub fn require(&self, name: &str) -> Result<u64, RemapError> {
        self.get(name)
            .ok_or_else(|| RemapError::UnknownSequence(name.to_string()))
    }
}
