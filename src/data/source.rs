// source.rs - Alignment and reference collaborators

use crate::data::read::ReadRecord;
use crate::error::Result;
use std::collections::HashMap;

/// Lazy sequence of reads produced by one interval query
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<ReadRecord>> + 'a>;

/// Anything that can answer "which reads overlap this interval".
///
/// Every call yields a fresh, finite iterator; queries must not disturb one
/// another so the same source can be shared across threads.
pub trait AlignmentSource: Send + Sync {
    /// Identity used in reports and errors (usually the sample or file name)
    fn name(&self) -> &str;

    /// Reads overlapping the 1-based closed interval `[start, end]`
    fn records_overlapping(&self, chrom: &str, start: u64, end: u64) -> Result<RecordIter<'_>>;
}

/// Reference base lookup by 1-based coordinate
pub trait ReferenceLookup: Send + Sync {
    fn base_at(&self, chrom: &str, pos: u64) -> Option<u8>;
}

/// Reads held in memory, sorted by position per chromosome
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    reads: HashMap<String, Vec<ReadRecord>>,
    // Longest reference span per chromosome, bounds the backwards scan
    max_span: HashMap<String, u64>,
}

impl MemorySource {
    pub fn new(name: &str, records: Vec<ReadRecord>) -> Self {
        let mut reads: HashMap<String, Vec<ReadRecord>> = HashMap::new();
        let mut max_span: HashMap<String, u64> = HashMap::new();
        for record in records {
            let span = record.end() - record.pos + 1;
            let entry = max_span.entry(record.chrom.clone()).or_insert(0);
            *entry = (*entry).max(span);
            reads.entry(record.chrom.clone()).or_default().push(record);
        }
        for list in reads.values_mut() {
            list.sort_by(|a, b| a.pos.cmp(&b.pos).then_with(|| a.name.cmp(&b.name)));
        }
        Self {
            name: name.to_string(),
            reads,
            max_span,
        }
    }

    pub fn len(&self) -> usize {
        self.reads.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chromosomes(&self) -> Vec<&str> {
        let mut chroms: Vec<&str> = self.reads.keys().map(|s| s.as_str()).collect();
        chroms.sort();
        chroms
    }
}

impl AlignmentSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn records_overlapping(&self, chrom: &str, start: u64, end: u64) -> Result<RecordIter<'_>> {
        let Some(list) = self.reads.get(chrom) else {
            return Ok(Box::new(std::iter::empty()));
        };
        let span = self.max_span.get(chrom).copied().unwrap_or(0);
        let lower = list.partition_point(|r| r.pos + span <= start);
        let upper = list.partition_point(|r| r.pos <= end);
        Ok(Box::new(
            list[lower..upper.max(lower)]
                .iter()
                .filter(move |r| r.overlaps(start, end))
                .cloned()
                .map(Ok),
        ))
    }
}

/// Reference sequences held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReference {
    sequences: HashMap<String, Vec<u8>>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sequence(&mut self, chrom: &str, sequence: Vec<u8>) {
        self.sequences.insert(chrom.to_string(), sequence);
    }

    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.sequences.len(),
            self.sequences.values().map(|s| s.len()).sum(),
        )
    }
}

impl ReferenceLookup for MemoryReference {
    fn base_at(&self, chrom: &str, pos: u64) -> Option<u8> {
        if pos == 0 {
            return None;
        }
        self.sequences
            .get(chrom)?
            .get(pos as usize - 1)
            .map(|b| b.to_ascii_uppercase())
    }
}
