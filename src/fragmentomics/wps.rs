// wps.rs - Windowed Protection Score

use crate::data::region::TargetRegion;
use crate::error::{CtdnaError, Result};
use crate::fragmentomics::extract::{FragmentRecord, SizeRange};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longer than any chromosome
const MAX_WINDOW_SIZE: u64 = u32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WpsConfig {
    pub window_size: u64,
    pub step_size: u64,
    /// Only fragments in this size range contribute
    pub sizes: SizeRange,
}

impl Default for WpsConfig {
    /// Long-fragment WPS: 120 bp windows over 120-180 bp fragments
    fn default() -> Self {
        Self {
            window_size: 120,
            step_size: 1,
            sizes: SizeRange {
                min_size: 120,
                max_size: 180,
            },
        }
    }
}

impl WpsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(CtdnaError::threshold("window_size", "must be at least 1"));
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(CtdnaError::threshold(
                "window_size",
                format!("{} exceeds the maximum of {}", self.window_size, MAX_WINDOW_SIZE),
            ));
        }
        if self.step_size == 0 {
            return Err(CtdnaError::threshold("step_size", "must be at least 1"));
        }
        SizeRange::new(self.sizes.min_size, self.sizes.max_size)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpsWindow {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    /// Fragments overlapping the window
    pub n_reads: u64,
    /// Fragments covering the whole window
    pub n_spanning: u64,
    /// Fragment endpoints strictly inside the window
    pub n_fragment_ends_adjusted: u64,
    pub wps_adjusted: i64,
}

/// Slide windows across every region. Regions are emitted in genomic order
/// and their windows are computed independently.
pub fn compute_wps(
    fragments: &[FragmentRecord],
    regions: &[TargetRegion],
    config: &WpsConfig,
) -> Result<Vec<WpsWindow>> {
    config.validate()?;

    let mut by_chrom: BTreeMap<&str, Vec<&FragmentRecord>> = BTreeMap::new();
    for fragment in fragments.iter().filter(|f| config.sizes.contains(f.size)) {
        by_chrom.entry(fragment.chrom.as_str()).or_default().push(fragment);
    }
    for list in by_chrom.values_mut() {
        list.sort_by_key(|f| f.start);
    }

    let mut ordered: Vec<&TargetRegion> = regions.iter().collect();
    ordered.sort();

    let per_region: Vec<Vec<WpsWindow>> = ordered
        .par_iter()
        .map(|region| {
            let candidates: Vec<&FragmentRecord> = match by_chrom.get(region.chrom.as_str()) {
                Some(list) => {
                    let upto = list.partition_point(|f| f.start <= region.end);
                    list[..upto].iter().filter(|f| f.end >= region.start).copied().collect()
                }
                None => Vec::new(),
            };
            region_windows(region, &candidates, config)
        })
        .collect();

    let windows: Vec<WpsWindow> = per_region.into_iter().flatten().collect();
    log::info!("computed WPS over {} windows in {} regions", windows.len(), regions.len());
    Ok(windows)
}

fn region_windows(region: &TargetRegion, fragments: &[&FragmentRecord], config: &WpsConfig) -> Vec<WpsWindow> {
    let mut windows = Vec::new();
    let span = config.window_size - 1;
    let mut start = region.start;
    while let Some(end) = start.checked_add(span).filter(|&end| end <= region.end) {
        let mut n_reads = 0u64;
        let mut n_spanning = 0u64;
        let mut n_ends = 0u64;
        for fragment in fragments {
            if fragment.start > end || fragment.end < start {
                continue;
            }
            n_reads += 1;
            if fragment.start <= start && fragment.end >= end {
                n_spanning += 1;
            }
            if fragment.start > start && fragment.start < end {
                n_ends += 1;
            }
            if fragment.end > start && fragment.end < end {
                n_ends += 1;
            }
        }
        windows.push(WpsWindow {
            chrom: region.chrom.clone(),
            start,
            end,
            n_reads,
            n_spanning,
            n_fragment_ends_adjusted: n_ends,
            wps_adjusted: n_spanning as i64 - n_ends as i64,
        });
        match start.checked_add(config.step_size) {
            Some(next) => start = next,
            None => break,
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(chrom: &str, start: u64, end: u64) -> FragmentRecord {
        FragmentRecord {
            chrom: chrom.to_string(),
            start,
            end,
            size: end - start + 1,
            fr_orientation: true,
            mutation_support: None,
            name: format!("{}:{}", chrom, start),
        }
    }

    fn config(window_size: u64, step_size: u64) -> WpsConfig {
        WpsConfig {
            window_size,
            step_size,
            sizes: SizeRange {
                min_size: 1,
                max_size: 1000,
            },
        }
    }

    #[test]
    fn test_single_spanning_fragment() {
        let fragments = vec![fragment("chr1", 100, 300)];
        let regions = vec![TargetRegion::new("chr1", 150, 269).unwrap()];
        let windows = compute_wps(&fragments, &regions, &config(120, 1)).unwrap();
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!((w.start, w.end), (150, 269));
        assert_eq!((w.n_reads, w.n_spanning, w.n_fragment_ends_adjusted), (1, 1, 0));
        assert_eq!(w.wps_adjusted, 1);
    }

    #[test]
    fn test_ends_inside_window_lower_score() {
        // one fragment spans, one ends inside, one lies fully inside
        let fragments = vec![
            fragment("chr1", 1, 200),
            fragment("chr1", 1, 60),
            fragment("chr1", 30, 70),
        ];
        let regions = vec![TargetRegion::new("chr1", 21, 120).unwrap()];
        let windows = compute_wps(&fragments, &regions, &config(100, 50)).unwrap();
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.n_reads, 3);
        assert_eq!(w.n_spanning, 1);
        assert_eq!(w.n_fragment_ends_adjusted, 3);
        assert_eq!(w.wps_adjusted, -2);
    }

    #[test]
    fn test_window_stepping_and_ordering() {
        let fragments = vec![fragment("chr1", 1, 500), fragment("chr2", 1, 500)];
        let regions = vec![
            TargetRegion::new("chr2", 10, 39).unwrap(),
            TargetRegion::new("chr1", 10, 39).unwrap(),
            TargetRegion::new("chr1", 1, 5).unwrap(),
        ];
        let windows = compute_wps(&fragments, &regions, &config(10, 10)).unwrap();
        let starts: Vec<(&str, u64)> = windows.iter().map(|w| (w.chrom.as_str(), w.start)).collect();
        // the 5 bp region is shorter than one window
        assert_eq!(
            starts,
            vec![("chr1", 10), ("chr1", 20), ("chr1", 30), ("chr2", 10), ("chr2", 20), ("chr2", 30)]
        );
    }

    #[test]
    fn test_size_filter_and_invalid_config() {
        let fragments = vec![fragment("chr1", 1, 500)];
        let regions = vec![TargetRegion::new("chr1", 100, 219).unwrap()];
        let windows = compute_wps(&fragments, &regions, &WpsConfig::default()).unwrap();
        assert_eq!(windows[0].n_reads, 0);

        assert!(matches!(
            compute_wps(&fragments, &regions, &config(0, 1)),
            Err(CtdnaError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            compute_wps(&fragments, &regions, &config(10, 0)),
            Err(CtdnaError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_huge_window_rejected() {
        let regions = vec![TargetRegion::new("chr1", 10, 100).unwrap()];
        assert!(matches!(
            compute_wps(&[], &regions, &config(u64::MAX, 1)),
            Err(CtdnaError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_windows_at_coordinate_limit() {
        // the last window ends on u64::MAX and stepping past it must stop
        let regions = vec![TargetRegion::new("chr1", u64::MAX - 19, u64::MAX).unwrap()];
        let windows = compute_wps(&[], &regions, &config(10, 10)).unwrap();
        let bounds: Vec<(u64, u64)> = windows.iter().map(|w| (w.start, w.end)).collect();
        assert_eq!(bounds, vec![(u64::MAX - 19, u64::MAX - 10), (u64::MAX - 9, u64::MAX)]);
    }
}
