//! Per-entry content hashes recorded by the pipeline for determinism audits.
//!
//! Records are stored by declaration index, so two runs of the same seed and graph produce
//! comparable sequences regardless of which entries happened to finish first.
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Hash of one entry's result together with where it was declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashRecord {
    /// Hex-encoded blake3 hash of the result content and call site.
    pub hash: String,
    /// `file:line:column` of the declaration.
    pub call_site: String,
    /// Name of the mask the entry mutated.
    pub mask: String,
    /// Operation label given at declaration.
    pub label: String,
}

impl fmt::Display for HashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},\t{},\t{},\t{}",
            self.hash, self.call_site, self.mask, self.label
        )
    }
}

/// Ordered hash records of one run. `None` marks an entry that has not completed
/// successfully.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashLog {
    records: Vec<Option<HashRecord>>,
}

impl HashLog {
    pub(crate) fn from_records(records: Vec<Option<HashRecord>>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HashRecord> {
        self.records.get(index).and_then(Option::as_ref)
    }

    pub fn records(&self) -> &[Option<HashRecord>] {
        &self.records
    }

    /// Number of completed records.
    pub fn completed(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    /// Index of the first record whose hash differs from `other`, including a length
    /// difference. `None` when both logs agree.
    pub fn first_divergence(&self, other: &HashLog) -> Option<usize> {
        let common = self.records.len().min(other.records.len());
        let hash = |r: &Option<HashRecord>| r.as_ref().map(|r| r.hash.clone());
        (0..common)
            .find(|&i| hash(&self.records[i]) != hash(&other.records[i]))
            .or_else(|| (self.records.len() != other.records.len()).then_some(common))
    }

    /// Write one line per entry in index order. Missing records are written as `null`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for record in &self.records {
            match record {
                Some(r) => writeln!(writer, "{r}")?,
                None => writeln!(writer, "null")?,
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the log to a file at `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }
}
