// histogram.rs - Fragment size binning

use crate::error::{CtdnaError, Result};
use crate::fragmentomics::extract::{FragmentRecord, SizeRange};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Upper bound on the number of bins one histogram may hold
pub const MAX_BINS: u64 = 100_000;

/// How the size range is cut into bins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinSpec {
    /// Bins of equal width starting at the minimum size
    Width(u64),
    /// Strictly increasing edges; bin i is `[b_i, b_{i+1})`, the last one closed
    Breakpoints(Vec<u64>),
}

impl FromStr for BinSpec {
    type Err = String;

    /// `"10"` is a width, `"50,100,150,400"` a breakpoint list
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
        let values = parts
            .iter()
            .map(|p| p.parse::<u64>().map_err(|_| format!("Invalid bin value: {}", p)))
            .collect::<std::result::Result<Vec<u64>, String>>()?;
        match values.as_slice() {
            [] => Err("Empty bin specification".to_string()),
            [width] => Ok(BinSpec::Width(*width)),
            _ => Ok(BinSpec::Breakpoints(values)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive bounds
    pub lower: u64,
    pub upper: u64,
    pub count: u64,
    pub fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentHistogram {
    pub bins: Vec<HistogramBin>,
    pub total: u64,
}

impl FragmentHistogram {
    /// Empty bins covering `range`
    pub fn new(range: SizeRange, spec: &BinSpec) -> Result<Self> {
        SizeRange::new(range.min_size, range.max_size)?;
        let bins = match spec {
            BinSpec::Width(0) => return Err(CtdnaError::threshold("bin_width", "must be at least 1")),
            BinSpec::Width(width) => {
                let n_bins = (range.max_size - range.min_size) / width + 1;
                if n_bins > MAX_BINS {
                    return Err(CtdnaError::threshold(
                        "bin_width",
                        format!("{} bp bins over {}..{} exceed {} bins", width, range.min_size, range.max_size, MAX_BINS),
                    ));
                }
                let mut bins = Vec::with_capacity(n_bins as usize);
                let mut lower = range.min_size;
                loop {
                    let upper = lower.saturating_add(width - 1).min(range.max_size);
                    bins.push((lower, upper));
                    if upper >= range.max_size {
                        break;
                    }
                    lower = upper + 1;
                }
                bins
            }
            BinSpec::Breakpoints(edges) => {
                if edges.len() < 2 {
                    return Err(CtdnaError::threshold("breakpoints", "need at least two edges"));
                }
                if edges.len() as u64 > MAX_BINS + 1 {
                    return Err(CtdnaError::threshold("breakpoints", format!("more than {} bins", MAX_BINS)));
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(CtdnaError::threshold("breakpoints", "edges must be strictly increasing"));
                }
                let (first, last) = (edges[0], edges[edges.len() - 1]);
                if first > range.min_size || last < range.max_size {
                    return Err(CtdnaError::threshold(
                        "breakpoints",
                        format!(
                            "edges {}..{} do not cover sizes {}..{}",
                            first, last, range.min_size, range.max_size
                        ),
                    ));
                }
                let n = edges.len() - 1;
                edges
                    .windows(2)
                    .enumerate()
                    .map(|(i, w)| if i + 1 == n { (w[0], w[1]) } else { (w[0], w[1] - 1) })
                    .collect()
            }
        };

        Ok(Self {
            bins: bins
                .into_iter()
                .map(|(lower, upper)| HistogramBin {
                    lower,
                    upper,
                    count: 0,
                    fraction: None,
                })
                .collect(),
            total: 0,
        })
    }

    /// Count fragment sizes. Sizes outside every bin are skipped.
    pub fn from_fragments(
        fragments: &[FragmentRecord],
        range: SizeRange,
        spec: &BinSpec,
        normalized: bool,
    ) -> Result<Self> {
        let mut histogram = Self::new(range, spec)?;
        let mut skipped = 0usize;
        for fragment in fragments {
            if !histogram.add(fragment.size) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::warn!("{} fragments fell outside the histogram range", skipped);
        }
        if normalized {
            histogram.normalize();
        }
        Ok(histogram)
    }

    fn add(&mut self, size: u64) -> bool {
        let idx = self.bins.partition_point(|b| b.upper < size);
        match self.bins.get_mut(idx) {
            Some(bin) if bin.lower <= size => {
                bin.count += 1;
                self.total += 1;
                true
            }
            _ => false,
        }
    }

    /// Fill in the fraction of each bin; all zero when nothing was counted
    pub fn normalize(&mut self) {
        let total = self.total;
        for bin in &mut self.bins {
            bin.fraction = Some(if total == 0 { 0.0 } else { bin.count as f64 / total as f64 });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(size: u64) -> FragmentRecord {
        FragmentRecord {
            chrom: "chr1".to_string(),
            start: 1000,
            end: 1000 + size - 1,
            size,
            fr_orientation: true,
            mutation_support: None,
            name: format!("f{}", size),
        }
    }

    #[test]
    fn test_fixed_width_bins() {
        let fragments: Vec<FragmentRecord> = [100, 105, 110, 119, 120, 145].iter().map(|&s| fragment(s)).collect();
        let range = SizeRange::new(100, 145).unwrap();
        let h = FragmentHistogram::from_fragments(&fragments, range, &BinSpec::Width(10), true).unwrap();

        let bounds: Vec<(u64, u64)> = h.bins.iter().map(|b| (b.lower, b.upper)).collect();
        assert_eq!(bounds, vec![(100, 109), (110, 119), (120, 129), (130, 139), (140, 145)]);
        let counts: Vec<u64> = h.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 2, 1, 0, 1]);
        assert_eq!(counts.iter().sum::<u64>(), fragments.len() as u64);
        let fractions: f64 = h.bins.iter().filter_map(|b| b.fraction).sum();
        assert!((fractions - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_breakpoint_bins() {
        let fragments: Vec<FragmentRecord> = [50, 99, 100, 150, 400].iter().map(|&s| fragment(s)).collect();
        let range = SizeRange::new(50, 400).unwrap();
        let spec: BinSpec = "50,100,150,400".parse().unwrap();
        let h = FragmentHistogram::from_fragments(&fragments, range, &spec, false).unwrap();
        let counts: Vec<u64> = h.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 2]);
        assert_eq!(h.bins[2].upper, 400);
        assert!(h.bins.iter().all(|b| b.fraction.is_none()));
    }

    #[test]
    fn test_invalid_bins_rejected() {
        let range = SizeRange::new(50, 400).unwrap();
        for spec in [
            BinSpec::Width(0),
            BinSpec::Breakpoints(vec![50, 150, 100, 400]),
            BinSpec::Breakpoints(vec![60, 400]),
            BinSpec::Breakpoints(vec![50, 300]),
            BinSpec::Breakpoints(vec![50]),
        ] {
            assert!(matches!(
                FragmentHistogram::new(range, &spec),
                Err(CtdnaError::InvalidThreshold { .. })
            ));
        }
    }

    #[test]
    fn test_width_bins_at_size_limit() {
        let range = SizeRange::new(1, u64::MAX).unwrap();
        let h = FragmentHistogram::new(range, &BinSpec::Width(u64::MAX)).unwrap();
        assert_eq!(h.bins.len(), 1);
        assert_eq!((h.bins[0].lower, h.bins[0].upper), (1, u64::MAX));

        let top = SizeRange::new(u64::MAX - 15, u64::MAX).unwrap();
        let h = FragmentHistogram::new(top, &BinSpec::Width(10)).unwrap();
        let bounds: Vec<(u64, u64)> = h.bins.iter().map(|b| (b.lower, b.upper)).collect();
        assert_eq!(bounds, vec![(u64::MAX - 15, u64::MAX - 6), (u64::MAX - 5, u64::MAX)]);
    }

    #[test]
    fn test_too_many_bins_rejected() {
        let range = SizeRange::new(1, u64::MAX).unwrap();
        assert!(matches!(
            FragmentHistogram::new(range, &BinSpec::Width(1)),
            Err(CtdnaError::InvalidThreshold { .. })
        ));
        let range = SizeRange::new(1, 1000).unwrap();
        assert_eq!(FragmentHistogram::new(range, &BinSpec::Width(1)).unwrap().bins.len(), 1000);
    }

    #[test]
    fn test_spec_parsing() {
        assert_eq!("5".parse::<BinSpec>().unwrap(), BinSpec::Width(5));
        assert!("".parse::<BinSpec>().is_err());
        assert!("a,b".parse::<BinSpec>().is_err());
    }
}
