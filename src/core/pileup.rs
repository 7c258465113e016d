// pileup.rs - Per-position base counts over a region

use crate::core::filters::ReadFilter;
use crate::data::mutation::{base_index, BASES};
use crate::data::region::TargetRegion;
use crate::data::source::{AlignmentSource, ReferenceLookup};
use crate::error::Result;

/// Base counts at one position. Each passing read contributes one call, so
/// overlapping mates are both counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileupColumn {
    pub chrom: String,
    pub pos: u64,
    pub ref_base: u8,
    /// Counts of A, C, G, T
    pub counts: [u32; 4],
}

impl PileupColumn {
    pub fn depth(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn count_of(&self, base: u8) -> u32 {
        base_index(base).map(|i| self.counts[i]).unwrap_or(0)
    }

    /// Calls that differ from the reference base
    pub fn non_ref(&self) -> u32 {
        self.depth() - self.count_of(self.ref_base)
    }

    /// Non-reference bases observed with their counts
    pub fn alt_counts(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        BASES
            .iter()
            .zip(self.counts.iter())
            .filter(move |(base, _)| **base != self.ref_base)
            .map(|(base, count)| (*base, *count))
    }
}

/// Most frequent base, ties broken in A, C, G, T order
fn consensus_base(counts: &[u32; 4]) -> u8 {
    let mut best = 0;
    for i in 1..4 {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    BASES[best]
}

/// Pile up passing calls across `region`. Positions without depth are
/// omitted. The reference base comes from `reference` when supplied and
/// otherwise from the consensus of the calls.
pub fn pileup_region(
    source: &dyn AlignmentSource,
    region: &TargetRegion,
    filter: &ReadFilter,
    reference: Option<&dyn ReferenceLookup>,
) -> Result<Vec<PileupColumn>> {
    let width = region.width() as usize;
    let mut counts: Vec<[u32; 4]> = vec![[0; 4]; width];

    for record in source.records_overlapping(&region.chrom, region.start, region.end)? {
        let read = record?;
        if !filter.accepts_read(&read) {
            continue;
        }
        for (pos, call) in read.aligned_calls() {
            if pos < region.start || pos > region.end || !filter.accepts_call(&read, &call) {
                continue;
            }
            if let Some(idx) = base_index(call.base) {
                counts[(pos - region.start) as usize][idx] += 1;
            }
        }
    }

    let mut columns = Vec::new();
    for (offset, column_counts) in counts.into_iter().enumerate() {
        if column_counts.iter().all(|&c| c == 0) {
            continue;
        }
        let pos = region.start + offset as u64;
        let ref_base = reference
            .and_then(|r| r.base_at(&region.chrom, pos))
            .filter(|b| base_index(*b).is_some())
            .unwrap_or_else(|| consensus_base(&column_counts));
        columns.push(PileupColumn {
            chrom: region.chrom.clone(),
            pos,
            ref_base,
            counts: column_counts,
        });
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{uniform_read, with_base};
    use crate::data::source::{MemoryReference, MemorySource};

    #[test]
    fn test_pileup_counts_and_consensus() {
        let source = MemorySource::new(
            "s",
            vec![
                uniform_read("a", "chr1", 100, 10, b'C'),
                uniform_read("b", "chr1", 105, 10, b'C'),
                with_base(uniform_read("c", "chr1", 100, 10, b'C'), 102, b'T'),
            ],
        );
        let region = TargetRegion::new("chr1", 101, 120).unwrap();
        let columns = pileup_region(&source, &region, &ReadFilter::default(), None).unwrap();

        // positions 101..=114 covered
        assert_eq!(columns.len(), 14);
        let col = columns.iter().find(|c| c.pos == 102).unwrap();
        assert_eq!(col.depth(), 2);
        assert_eq!(col.ref_base, b'C');
        assert_eq!(col.non_ref(), 1);
        assert_eq!(col.alt_counts().filter(|(_, n)| *n > 0).collect::<Vec<_>>(), vec![(b'T', 1)]);
        let col = columns.iter().find(|c| c.pos == 106).unwrap();
        assert_eq!(col.depth(), 3);
    }

    #[test]
    fn test_reference_overrides_consensus() {
        let source = MemorySource::new("s", vec![uniform_read("a", "chr1", 1, 4, b'G')]);
        let mut reference = MemoryReference::new();
        reference.add_sequence("chr1", b"AAAA".to_vec());
        let region = TargetRegion::new("chr1", 1, 4).unwrap();
        let columns = pileup_region(&source, &region, &ReadFilter::default(), Some(&reference)).unwrap();
        assert!(columns.iter().all(|c| c.ref_base == b'A' && c.non_ref() == 1));
    }
}
