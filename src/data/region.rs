// region.rs - Genomic intervals used as targets and profiling regions

use crate::error::{CtdnaError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based closed genomic interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRegion {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl TargetRegion {
    pub fn new(chrom: &str, start: u64, end: u64) -> Result<Self> {
        if start == 0 {
            return Err(CtdnaError::InvalidRegion {
                region: format!("{}:{}-{}", chrom, start, end),
                reason: "coordinates are 1-based".to_string(),
            });
        }
        if end < start {
            return Err(CtdnaError::InvalidRegion {
                region: format!("{}:{}-{}", chrom, start, end),
                reason: "end is before start".to_string(),
            });
        }
        Ok(Self {
            chrom: chrom.to_string(),
            start,
            end,
        })
    }

    /// Convert a BED interval (0-based, half-open)
    pub fn from_bed(chrom: &str, bed_start: u64, bed_end: u64) -> Result<Self> {
        if bed_end <= bed_start {
            return Err(CtdnaError::InvalidRegion {
                region: format!("{}\t{}\t{}", chrom, bed_start, bed_end),
                reason: "BED end must be greater than start".to_string(),
            });
        }
        Self::new(chrom, bed_start + 1, bed_end)
    }

    /// Parse `chr1:1000-2000` (1-based, inclusive)
    pub fn parse(text: &str) -> Result<Self> {
        let pattern = Regex::new(r"^([^:\s]+):([0-9,]+)-([0-9,]+)$")
            .map_err(|e| CtdnaError::threshold("region pattern", e.to_string()))?;
        let caps = pattern.captures(text.trim()).ok_or_else(|| CtdnaError::InvalidRegion {
            region: text.to_string(),
            reason: "expected chrom:start-end".to_string(),
        })?;

        let number = |s: &str| -> Result<u64> {
            s.replace(',', "").parse::<u64>().map_err(|e| CtdnaError::InvalidRegion {
                region: text.to_string(),
                reason: e.to_string(),
            })
        };
        Self::new(&caps[1], number(&caps[2])?, number(&caps[3])?)
    }

    /// Number of positions covered
    pub fn width(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.chrom == chrom && pos >= self.start && pos <= self.end
    }

    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        self.chrom == chrom && start <= self.end && end >= self.start
    }
}

impl fmt::Display for TargetRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Sort and merge overlapping or touching intervals so that no position is
/// visited twice when scanning a panel.
pub fn merge_regions(regions: &[TargetRegion]) -> Vec<TargetRegion> {
    let mut sorted: Vec<TargetRegion> = regions.to_vec();
    sorted.sort();

    let mut merged: Vec<TargetRegion> = Vec::with_capacity(sorted.len());
    for region in sorted {
        match merged.last_mut() {
            Some(last) if last.chrom == region.chrom && region.start <= last.end + 1 => {
                last.end = last.end.max(region.end);
            }
            _ => merged.push(region),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_validation() {
        assert!(TargetRegion::new("chr1", 10, 10).is_ok());
        assert!(matches!(
            TargetRegion::new("chr1", 10, 9),
            Err(CtdnaError::InvalidRegion { .. })
        ));
        assert!(TargetRegion::new("chr1", 0, 9).is_err());
    }

    #[test]
    fn test_bed_conversion() {
        let region = TargetRegion::from_bed("chr2", 99, 200).unwrap();
        assert_eq!(region.start, 100);
        assert_eq!(region.end, 200);
        assert_eq!(region.width(), 101);
        assert!(TargetRegion::from_bed("chr2", 5, 5).is_err());
    }

    #[test]
    fn test_parse_region_string() {
        let region = TargetRegion::parse("chr7:1,000-2,000").unwrap();
        assert_eq!(region, TargetRegion::new("chr7", 1000, 2000).unwrap());
        assert!(TargetRegion::parse("chr7-1000").is_err());
    }

    #[test]
    fn test_merge_regions() {
        let regions = vec![
            TargetRegion::new("chr1", 50, 60).unwrap(),
            TargetRegion::new("chr1", 10, 20).unwrap(),
            TargetRegion::new("chr1", 15, 30).unwrap(),
            TargetRegion::new("chr1", 31, 35).unwrap(),
            TargetRegion::new("chr2", 10, 20).unwrap(),
        ];
        let merged = merge_regions(&regions);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], TargetRegion::new("chr1", 10, 35).unwrap());
        assert_eq!(merged[1], TargetRegion::new("chr1", 50, 60).unwrap());
        assert_eq!(merged[2].chrom, "chr2");
    }
}
