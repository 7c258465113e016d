// extract.rs - Fragment size extraction from paired reads

use crate::core::evidence::EvidenceCollector;
use crate::core::filters::{ReadFilter, StrandFilter};
use crate::data::mutation::Mutation;
use crate::data::region::{merge_regions, TargetRegion};
use crate::data::source::AlignmentSource;
use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One sequenced DNA fragment, in outer (1-based, inclusive) coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    /// Mates face each other (forward/reverse)
    pub fr_orientation: bool,
    /// `Some(true)` for alt support, `Some(false)` for ref support
    pub mutation_support: Option<bool>,
    pub name: String,
}

impl FragmentRecord {
    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        self.chrom == chrom && self.start <= end && self.end >= start
    }
}

/// Inclusive fragment size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min_size: u64,
    pub max_size: u64,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 1000,
        }
    }
}

impl SizeRange {
    pub fn new(min_size: u64, max_size: u64) -> Result<Self> {
        if min_size > max_size {
            return Err(CtdnaError::threshold(
                "min_size",
                format!("{} is greater than max_size {}", min_size, max_size),
            ));
        }
        Ok(Self { min_size, max_size })
    }

    pub fn contains(&self, size: u64) -> bool {
        size >= self.min_size && size <= self.max_size
    }
}

/// What the visible mates of one pair told us in a region
#[derive(Default)]
struct PairState {
    span: Option<(u64, u64)>,
    fr_orientation: bool,
    rejected: bool,
}

pub struct FragmentExtractor<'a> {
    filter: &'a ReadFilter,
    sizes: SizeRange,
    mutations: &'a [Mutation],
}

impl<'a> FragmentExtractor<'a> {
    pub fn new(filter: &'a ReadFilter, sizes: SizeRange) -> Self {
        Self {
            filter,
            sizes,
            mutations: &[],
        }
    }

    /// Tag fragments by their support for these mutations
    pub fn with_mutations(mut self, mutations: &'a [Mutation]) -> Self {
        self.mutations = mutations;
        self
    }

    /// Fragments overlapping `regions`, each pair reported once, ordered by
    /// region then start.
    pub fn extract(&self, source: &dyn AlignmentSource, regions: &[TargetRegion]) -> Result<Vec<FragmentRecord>> {
        let (alt_pairs, ref_pairs) = self.support_sets(source)?;

        // the non-leading mate is not subject to the strand criterion
        let mate_filter = ReadFilter {
            strand: StrandFilter::Both,
            ..self.filter.clone()
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut fragments = Vec::new();
        for region in merge_regions(regions) {
            // leftmost mates can start up to one maximum fragment before the region
            let query_start = region.start.saturating_sub(self.sizes.max_size).max(1);
            let mut pairs: HashMap<String, PairState> = HashMap::new();

            for record in source.records_overlapping(&region.chrom, query_start, region.end)? {
                let read = record?;
                let state = pairs.entry(read.name.clone()).or_default();
                match read.fragment_span() {
                    Some(span) => {
                        state.span = Some(span);
                        state.fr_orientation = read.is_fr_pair();
                        if !self.filter.accepts_read(&read) {
                            state.rejected = true;
                        }
                    }
                    None => {
                        if !mate_filter.accepts_read(&read) {
                            state.rejected = true;
                        }
                    }
                }
            }

            let mut region_fragments: Vec<FragmentRecord> = pairs
                .into_iter()
                .filter_map(|(name, state)| {
                    let (start, end) = state.span?;
                    let size = end - start + 1;
                    if state.rejected || !self.sizes.contains(size) || start > region.end || end < region.start {
                        return None;
                    }
                    let mutation_support = if alt_pairs.contains(&name) {
                        Some(true)
                    } else if ref_pairs.contains(&name) {
                        Some(false)
                    } else {
                        None
                    };
                    Some(FragmentRecord {
                        chrom: region.chrom.clone(),
                        start,
                        end,
                        size,
                        fr_orientation: state.fr_orientation,
                        mutation_support,
                        name,
                    })
                })
                .filter(|f| seen.insert(f.name.clone()))
                .collect();
            region_fragments.sort_by(|a, b| (a.start, a.end, &a.name).cmp(&(b.start, b.end, &b.name)));
            fragments.extend(region_fragments);
        }

        log::info!("{}: extracted {} fragments", source.name(), fragments.len());
        Ok(fragments)
    }

    fn support_sets(&self, source: &dyn AlignmentSource) -> Result<(HashSet<String>, HashSet<String>)> {
        let mut alt = HashSet::new();
        let mut reference = HashSet::new();
        if self.mutations.is_empty() {
            return Ok((alt, reference));
        }
        let collector = EvidenceCollector::new(self.filter);
        for evidence in collector.collect(source, self.mutations)? {
            alt.extend(evidence.alt_reads);
            reference.extend(evidence.ref_reads);
        }
        Ok((alt, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{pair, with_base};
    use crate::data::source::MemorySource;

    fn fragments_source() -> MemorySource {
        let (a1, a2) = pair("a", "chr1", 100, 266, 50, b'C');
        let (b1, b2) = pair("b", "chr1", 150, 300, 50, b'C');
        let (c1, c2) = pair("c", "chr1", 400, 2000, 50, b'C');
        let (d1, mut d2) = pair("d", "chr1", 120, 290, 50, b'C');
        d2.mapq = 5;
        MemorySource::new("s", vec![a1, a2, b1, b2, c1, c2, d1, d2])
    }

    #[test]
    fn test_pairs_counted_once_with_outer_coordinates() {
        let source = fragments_source();
        let filter = ReadFilter::default();
        let extractor = FragmentExtractor::new(&filter, SizeRange::new(50, 500).unwrap());
        let regions = vec![
            TargetRegion::new("chr1", 100, 200).unwrap(),
            TargetRegion::new("chr1", 180, 2500).unwrap(),
        ];
        let fragments = extractor.extract(&source, &regions).unwrap();

        // "c" is too long, "d" has a failing mate
        let names: Vec<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!((fragments[0].start, fragments[0].end, fragments[0].size), (100, 266, 167));
        assert_eq!(fragments[1].size, 151);

        // disjoint regions both overlapping "a"
        let disjoint = vec![
            TargetRegion::new("chr1", 100, 110).unwrap(),
            TargetRegion::new("chr1", 250, 260).unwrap(),
        ];
        let fragments = extractor.extract(&source, &disjoint).unwrap();
        let names: Vec<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(fragments.iter().all(|f| f.fr_orientation && f.mutation_support.is_none()));
    }

    #[test]
    fn test_leftmost_mate_outside_region_still_found() {
        let source = fragments_source();
        let filter = ReadFilter::default();
        let extractor = FragmentExtractor::new(&filter, SizeRange::new(50, 500).unwrap());
        let fragments = extractor
            .extract(&source, &[TargetRegion::new("chr1", 260, 270).unwrap()])
            .unwrap();
        let names: Vec<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_mutation_support_tagging() {
        let (alt1, alt2) = pair("alt", "chr1", 100, 300, 50, b'C');
        let alt1 = with_base(alt1, 120, b'T');
        let (ref1, ref2) = pair("ref", "chr1", 110, 280, 50, b'C');
        let (far1, far2) = pair("far", "chr1", 130, 330, 50, b'C');
        let source = MemorySource::new("s", vec![alt1, alt2, ref1, ref2, far1, far2]);
        let mutations = vec![Mutation::new("chr1", 120, "C", "T", None).unwrap()];

        let filter = ReadFilter::default();
        let fragments = FragmentExtractor::new(&filter, SizeRange::default())
            .with_mutations(&mutations)
            .extract(&source, &[TargetRegion::new("chr1", 1, 1000).unwrap()])
            .unwrap();
        let support: HashMap<&str, Option<bool>> =
            fragments.iter().map(|f| (f.name.as_str(), f.mutation_support)).collect();
        assert_eq!(support["alt"], Some(true));
        assert_eq!(support["ref"], Some(false));
        assert_eq!(support["far"], None);
    }

    #[test]
    fn test_invalid_size_range() {
        assert!(matches!(SizeRange::new(200, 100), Err(CtdnaError::InvalidThreshold { .. })));
    }
}
