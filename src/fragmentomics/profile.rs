// profile.rs - Per-region fragment size statistics

use crate::data::region::TargetRegion;
use crate::fragmentomics::extract::FragmentRecord;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// User-supplied statistic over the fragment sizes of one region
pub type CustomSummary = Arc<dyn Fn(&[u64]) -> Option<f64> + Send + Sync>;

/// A named statistic computed per region
#[derive(Clone)]
pub enum SummaryFn {
    Mean,
    Sd,
    Median,
    Min,
    Max,
    Count,
    Custom(String, CustomSummary),
}

impl fmt::Debug for SummaryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFn::Custom(name, _) => write!(f, "Custom({})", name),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for SummaryFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(SummaryFn::Mean),
            "sd" | "std" => Ok(SummaryFn::Sd),
            "median" => Ok(SummaryFn::Median),
            "min" => Ok(SummaryFn::Min),
            "max" => Ok(SummaryFn::Max),
            "count" | "n" => Ok(SummaryFn::Count),
            _ => Err(format!(
                "Invalid statistic: {}. Use: mean, sd, median, min, max, count",
                s
            )),
        }
    }
}

impl SummaryFn {
    pub fn name(&self) -> &str {
        match self {
            SummaryFn::Mean => "mean",
            SummaryFn::Sd => "sd",
            SummaryFn::Median => "median",
            SummaryFn::Min => "min",
            SummaryFn::Max => "max",
            SummaryFn::Count => "count",
            SummaryFn::Custom(name, _) => name,
        }
    }

    pub fn custom<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[u64]) -> Option<f64> + Send + Sync + 'static,
    {
        SummaryFn::Custom(name.to_string(), Arc::new(f))
    }

    /// `None` for an empty input, and for `sd` with fewer than two values
    pub fn apply(&self, sizes: &[u64]) -> Option<f64> {
        if sizes.is_empty() {
            return None;
        }
        let n = sizes.len() as f64;
        match self {
            SummaryFn::Count => Some(n),
            SummaryFn::Mean => Some(mean(sizes)),
            SummaryFn::Sd => {
                if sizes.len() < 2 {
                    return None;
                }
                let m = mean(sizes);
                let ss: f64 = sizes.iter().map(|&s| (s as f64 - m).powi(2)).sum();
                Some((ss / (n - 1.0)).sqrt())
            }
            SummaryFn::Median => {
                let mut sorted = sizes.to_vec();
                sorted.sort_unstable();
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
                } else {
                    Some(sorted[mid] as f64)
                }
            }
            SummaryFn::Min => sizes.iter().min().map(|&v| v as f64),
            SummaryFn::Max => sizes.iter().max().map(|&v| v as f64),
            SummaryFn::Custom(_, f) => f(sizes),
        }
    }
}

fn mean(sizes: &[u64]) -> f64 {
    sizes.iter().map(|&s| s as f64).sum::<f64>() / sizes.len() as f64
}

/// Statistics of one region, in the order they were requested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub region: TargetRegion,
    pub n_fragments: usize,
    pub values: Vec<(String, Option<f64>)>,
}

impl RegionSummary {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).and_then(|(_, v)| *v)
    }
}

/// Summarize the sizes of fragments overlapping each region. Regions are
/// processed in parallel; output follows input order.
pub fn summarize_regions(
    fragments: &[FragmentRecord],
    regions: &[TargetRegion],
    statistics: &[SummaryFn],
) -> Vec<RegionSummary> {
    let mut by_chrom: BTreeMap<&str, Vec<&FragmentRecord>> = BTreeMap::new();
    for fragment in fragments {
        by_chrom.entry(fragment.chrom.as_str()).or_default().push(fragment);
    }
    for list in by_chrom.values_mut() {
        list.sort_by_key(|f| f.start);
    }

    regions
        .par_iter()
        .map(|region| {
            let sizes: Vec<u64> = match by_chrom.get(region.chrom.as_str()) {
                Some(list) => {
                    let upto = list.partition_point(|f| f.start <= region.end);
                    list[..upto]
                        .iter()
                        .filter(|f| f.end >= region.start)
                        .map(|f| f.size)
                        .collect()
                }
                None => Vec::new(),
            };
            RegionSummary {
                region: region.clone(),
                n_fragments: sizes.len(),
                values: statistics
                    .iter()
                    .map(|stat| (stat.name().to_string(), stat.apply(&sizes)))
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(start: u64, end: u64) -> FragmentRecord {
        FragmentRecord {
            chrom: "chr1".to_string(),
            start,
            end,
            size: end - start + 1,
            fr_orientation: true,
            mutation_support: None,
            name: format!("f{}", start),
        }
    }

    #[test]
    fn test_builtin_statistics() {
        let sizes = [100, 150, 200, 170];
        assert_eq!(SummaryFn::Mean.apply(&sizes), Some(155.0));
        assert_eq!(SummaryFn::Median.apply(&sizes), Some(160.0));
        assert_eq!(SummaryFn::Min.apply(&sizes), Some(100.0));
        assert_eq!(SummaryFn::Max.apply(&sizes), Some(200.0));
        assert_eq!(SummaryFn::Count.apply(&sizes), Some(4.0));
        let sd = SummaryFn::Sd.apply(&sizes).unwrap();
        assert!((sd - 42.0317340431).abs() < 1e-6);

        assert_eq!(SummaryFn::Sd.apply(&[150]), None);
        assert_eq!(SummaryFn::Mean.apply(&[]), None);
    }

    #[test]
    fn test_regions_and_custom_statistic() {
        let fragments = vec![fragment(100, 266), fragment(150, 300), fragment(1000, 1166)];
        let regions = vec![
            TargetRegion::new("chr1", 250, 260).unwrap(),
            TargetRegion::new("chr1", 280, 900).unwrap(),
            TargetRegion::new("chr2", 1, 100).unwrap(),
        ];
        let short_fraction = SummaryFn::custom("short", |sizes: &[u64]| {
            Some(sizes.iter().filter(|&&s| s < 160).count() as f64 / sizes.len() as f64)
        });
        let stats = vec![SummaryFn::Mean, SummaryFn::Sd, short_fraction];
        let summaries = summarize_regions(&fragments, &regions, &stats);

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].n_fragments, 2);
        assert_eq!(summaries[0].get("mean"), Some(159.0));
        assert_eq!(summaries[0].get("short"), Some(0.5));

        assert_eq!(summaries[1].n_fragments, 1);
        assert_eq!(summaries[1].get("sd"), None);

        // nothing on chr2
        assert_eq!(summaries[2].n_fragments, 0);
        assert!(summaries[2].values.iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn test_statistic_parsing() {
        assert_eq!("SD".parse::<SummaryFn>().unwrap().name(), "sd");
        assert!("mode".parse::<SummaryFn>().is_err());
    }
}
