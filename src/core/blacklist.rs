// blacklist.rs - Background panel aggregation and noisy-site blacklists

use crate::core::filters::ReadFilter;
use crate::core::pileup::pileup_region;
use crate::data::region::{merge_regions, TargetRegion};
use crate::data::source::{AlignmentSource, ReferenceLookup};
use crate::error::{CtdnaError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Panel row key: a locus, or a (locus, alt) pair in substitution-specific mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PanelKey {
    pub chrom: String,
    pub pos: u64,
    pub alt: Option<u8>,
}

/// Depth and alt count of one sample at one panel row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleObservation {
    pub depth: u32,
    pub alt: u32,
}

impl SampleObservation {
    pub fn vaf(&self) -> f64 {
        if self.depth == 0 {
            0.0
        } else {
            self.alt as f64 / self.depth as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub key: PanelKey,
    pub ref_base: u8,
    /// Sample id to observation; samples without depth are absent
    pub observations: BTreeMap<String, SampleObservation>,
}

impl PanelRow {
    /// Mean VAF over the samples with depth at this row
    pub fn mean_vaf(&self) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let total: f64 = self.observations.values().map(|o| o.vaf()).sum();
        total / self.observations.len() as f64
    }

    pub fn samples_with_at_least(&self, alt_reads: u32) -> usize {
        self.observations.values().filter(|o| o.alt >= alt_reads).count()
    }
}

/// Long-format record used for panel files: one line per (row, sample)
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PanelRecord {
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub ref_base: String,
    /// `.` in locus panels
    pub alt: String,
    pub sample: String,
    pub depth: u32,
    pub alt_count: u32,
}

/// Multi-sample per-site depth/alt table built from normal samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundPanel {
    pub substitution_specific: bool,
    pub samples: Vec<String>,
    pub rows: BTreeMap<PanelKey, PanelRow>,
}

impl BackgroundPanel {
    /// Pile up every sample over `targets` in parallel and join the results
    /// by site.
    pub fn build(
        sources: &[&dyn AlignmentSource],
        targets: &[TargetRegion],
        filter: &ReadFilter,
        reference: Option<&dyn ReferenceLookup>,
        substitution_specific: bool,
    ) -> Result<Self> {
        let regions = merge_regions(targets);

        let per_sample: Vec<Result<(String, Vec<(PanelKey, u8, SampleObservation)>)>> = sources
            .par_iter()
            .map(|source| {
                let mut entries = Vec::new();
                for region in &regions {
                    for column in pileup_region(*source, region, filter, reference)? {
                        let depth = column.depth();
                        if substitution_specific {
                            for (alt, count) in column.alt_counts() {
                                let key = PanelKey {
                                    chrom: column.chrom.clone(),
                                    pos: column.pos,
                                    alt: Some(alt),
                                };
                                entries.push((key, column.ref_base, SampleObservation { depth, alt: count }));
                            }
                        } else {
                            let key = PanelKey {
                                chrom: column.chrom.clone(),
                                pos: column.pos,
                                alt: None,
                            };
                            let obs = SampleObservation {
                                depth,
                                alt: column.non_ref(),
                            };
                            entries.push((key, column.ref_base, obs));
                        }
                    }
                }
                log::debug!("{}: {} panel entries", source.name(), entries.len());
                Ok((source.name().to_string(), entries))
            })
            .collect();

        let mut panel = BackgroundPanel {
            substitution_specific,
            samples: Vec::with_capacity(sources.len()),
            rows: BTreeMap::new(),
        };
        for result in per_sample {
            let (sample, entries) = result?;
            for (key, ref_base, obs) in entries {
                panel.insert(key, ref_base, &sample, obs);
            }
            panel.samples.push(sample);
        }
        log::info!(
            "built background panel: {} samples, {} rows",
            panel.samples.len(),
            panel.rows.len()
        );
        Ok(panel)
    }

    fn insert(&mut self, key: PanelKey, ref_base: u8, sample: &str, obs: SampleObservation) {
        if obs.depth == 0 {
            return;
        }
        self.rows
            .entry(key.clone())
            .or_insert_with(|| PanelRow {
                key,
                ref_base,
                observations: BTreeMap::new(),
            })
            .observations
            .insert(sample.to_string(), obs);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = PanelRecord> + '_ {
        self.rows.values().flat_map(|row| {
            row.observations.iter().map(move |(sample, obs)| PanelRecord {
                chrom: row.key.chrom.clone(),
                pos: row.key.pos,
                ref_base: (row.ref_base as char).to_string(),
                alt: row
                    .key
                    .alt
                    .map(|a| (a as char).to_string())
                    .unwrap_or_else(|| ".".to_string()),
                sample: sample.clone(),
                depth: obs.depth,
                alt_count: obs.alt,
            })
        })
    }

    /// Load a panel written by `output::write_panel`. The granularity is
    /// taken from the alt column: `.` everywhere means a locus panel.
    pub fn from_tsv(file_path: &Path) -> Result<Self> {
        let path = file_path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .from_path(file_path)
            .map_err(|e| match e.into_kind() {
                csv::ErrorKind::Io(io) => CtdnaError::io(io, file_path),
                other => CtdnaError::parse(&path, 0, format!("{:?}", other)),
            })?;

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<PanelRecord>().enumerate() {
            records.push(row.map_err(|e| CtdnaError::parse(&path, idx + 2, e.to_string()))?);
        }

        let substitution_specific = records.iter().any(|r| r.alt != ".");
        let mut panel = BackgroundPanel {
            substitution_specific,
            samples: Vec::new(),
            rows: BTreeMap::new(),
        };
        let mut samples = BTreeSet::new();
        for (idx, record) in records.into_iter().enumerate() {
            let line = idx + 2;
            let ref_base = single_base(&record.ref_base)
                .ok_or_else(|| CtdnaError::parse(&path, line, format!("invalid ref '{}'", record.ref_base)))?;
            let alt = if substitution_specific {
                Some(
                    single_base(&record.alt)
                        .ok_or_else(|| CtdnaError::parse(&path, line, format!("invalid alt '{}'", record.alt)))?,
                )
            } else {
                None
            };
            let key = PanelKey {
                chrom: record.chrom,
                pos: record.pos,
                alt,
            };
            let obs = SampleObservation {
                depth: record.depth,
                alt: record.alt_count,
            };
            panel.insert(key, ref_base, &record.sample, obs);
            samples.insert(record.sample);
        }
        panel.samples = samples.into_iter().collect();
        Ok(panel)
    }
}

fn single_base(text: &str) -> Option<u8> {
    let bytes = text.trim().as_bytes();
    match bytes {
        [b] if crate::data::mutation::is_nucleotide(b.to_ascii_uppercase()) => Some(b.to_ascii_uppercase()),
        _ => None,
    }
}

/// Noisy sites excluded from background estimation. The variant carries its
/// granularity so it can be checked against the estimator's mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlackList {
    Loci(BTreeSet<(String, u64)>),
    Variants(BTreeSet<(String, u64, u8)>),
}

impl BlackList {
    pub fn is_substitution_specific(&self) -> bool {
        matches!(self, BlackList::Variants(_))
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            BlackList::Loci(_) => "loci",
            BlackList::Variants(_) => "variants",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BlackList::Loci(set) => set.len(),
            BlackList::Variants(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole locus is blacklisted (loci mode only)
    pub fn contains_locus(&self, chrom: &str, pos: u64) -> bool {
        match self {
            BlackList::Loci(set) => set.contains(&(chrom.to_string(), pos)),
            BlackList::Variants(_) => false,
        }
    }

    /// Specific alt at a locus is blacklisted (variants mode only)
    pub fn contains_variant(&self, chrom: &str, pos: u64, alt: u8) -> bool {
        match self {
            BlackList::Variants(set) => set.contains(&(chrom.to_string(), pos, alt)),
            BlackList::Loci(_) => false,
        }
    }

    /// Fail unless the granularity matches the estimator's mode
    pub fn check_mode(&self, substitution_specific: bool) -> Result<()> {
        if self.is_substitution_specific() != substitution_specific {
            let expected = if substitution_specific { "variants" } else { "loci" };
            return Err(CtdnaError::ModeMismatch(format!(
                "blacklist holds {} but the estimator expects {}",
                self.mode_name(),
                expected
            )));
        }
        Ok(())
    }

    /// Apply `thresholds` to every panel row. Output granularity follows
    /// the panel.
    pub fn from_panel(panel: &BackgroundPanel, thresholds: &BlacklistThresholds) -> Result<Self> {
        thresholds.validate()?;

        let vaf_cutoff = match thresholds.mean_vaf_quantile {
            Some(q) => {
                let mut means: Vec<f64> = panel.rows.values().map(|r| r.mean_vaf()).collect();
                means.sort_by(|a, b| a.total_cmp(b));
                quantile_type7(&means, q)
            }
            None => None,
        };

        let noisy = panel.rows.values().filter(|row| {
            vaf_cutoff.map(|cut| row.mean_vaf() > cut).unwrap_or(false)
                || thresholds
                    .min_samples_one_read
                    .map(|min| row.samples_with_at_least(1) >= min)
                    .unwrap_or(false)
                || thresholds
                    .min_samples_two_reads
                    .map(|min| row.samples_with_at_least(2) >= min)
                    .unwrap_or(false)
        });

        let blacklist = if panel.substitution_specific {
            BlackList::Variants(
                noisy
                    .filter_map(|row| row.key.alt.map(|alt| (row.key.chrom.clone(), row.key.pos, alt)))
                    .collect(),
            )
        } else {
            BlackList::Loci(noisy.map(|row| (row.key.chrom.clone(), row.key.pos)).collect())
        };
        log::info!(
            "blacklisted {} of {} panel rows ({})",
            blacklist.len(),
            panel.len(),
            blacklist.mode_name()
        );
        Ok(blacklist)
    }

    /// Load a blacklist table with chrom, pos and an optional alt column.
    pub fn from_tsv(file_path: &Path) -> Result<Self> {
        let path = file_path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(file_path)
            .map_err(|e| match e.into_kind() {
                csv::ErrorKind::Io(io) => CtdnaError::io(io, file_path),
                other => CtdnaError::parse(&path, 0, format!("{:?}", other)),
            })?;
        let headers = reader
            .headers()
            .map_err(|e| CtdnaError::parse(&path, 1, e.to_string()))?
            .clone();
        let has_alt = headers.iter().any(|h| h.eq_ignore_ascii_case("alt"));

        let mut loci = BTreeSet::new();
        let mut variants = BTreeSet::new();
        for (idx, row) in reader.records().enumerate() {
            let line = idx + 2;
            let row = row.map_err(|e| CtdnaError::parse(&path, line, e.to_string()))?;
            let chrom = row.get(0).unwrap_or("").trim().to_string();
            let raw_pos = row.get(1).unwrap_or("").trim();
            let pos = raw_pos
                .parse::<u64>()
                .map_err(|_| CtdnaError::parse(&path, line, format!("invalid position '{}'", raw_pos)))?;
            if has_alt {
                let raw_alt = row.get(2).unwrap_or("");
                let alt = single_base(raw_alt)
                    .ok_or_else(|| CtdnaError::parse(&path, line, format!("invalid alt '{}'", raw_alt)))?;
                variants.insert((chrom, pos, alt));
            } else {
                loci.insert((chrom, pos));
            }
        }
        Ok(if has_alt {
            BlackList::Variants(variants)
        } else {
            BlackList::Loci(loci)
        })
    }
}

/// Criteria for flagging a panel row; `None` disables a criterion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlacklistThresholds {
    pub mean_vaf_quantile: Option<f64>,
    pub min_samples_one_read: Option<usize>,
    pub min_samples_two_reads: Option<usize>,
}

impl BlacklistThresholds {
    pub fn validate(&self) -> Result<()> {
        if let Some(q) = self.mean_vaf_quantile {
            if !(0.0..=1.0).contains(&q) {
                return Err(CtdnaError::threshold(
                    "mean_vaf_quantile",
                    format!("{} is outside [0, 1]", q),
                ));
            }
        }
        Ok(())
    }
}

/// Quantile with linear interpolation between order statistics (R type 7).
/// `sorted` must be ascending.
pub fn quantile_type7(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{uniform_read, with_base};
    use crate::data::source::MemorySource;

    fn row(pos: u64, alt: Option<u8>, obs: &[(&str, u32, u32)]) -> PanelRow {
        PanelRow {
            key: PanelKey {
                chrom: "chr1".to_string(),
                pos,
                alt,
            },
            ref_base: b'C',
            observations: obs
                .iter()
                .map(|(s, depth, alt)| (s.to_string(), SampleObservation { depth: *depth, alt: *alt }))
                .collect(),
        }
    }

    fn panel(rows: Vec<PanelRow>, substitution_specific: bool) -> BackgroundPanel {
        BackgroundPanel {
            substitution_specific,
            samples: vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
            rows: rows.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    #[test]
    fn test_quantile_type7() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_type7(&values, 0.0), Some(1.0));
        assert_eq!(quantile_type7(&values, 1.0), Some(4.0));
        assert!((quantile_type7(&values, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert!((quantile_type7(&values, 0.9).unwrap() - 3.7).abs() < 1e-12);
        assert_eq!(quantile_type7(&[], 0.5), None);
    }

    #[test]
    fn test_sample_count_criteria() {
        let p = panel(
            vec![
                row(1, None, &[("n1", 100, 1), ("n2", 100, 1)]),
                row(2, None, &[("n1", 100, 2), ("n2", 100, 0)]),
                row(3, None, &[("n1", 100, 0), ("n2", 100, 0)]),
            ],
            false,
        );

        let one_read = BlacklistThresholds {
            min_samples_one_read: Some(2),
            ..Default::default()
        };
        let bl = BlackList::from_panel(&p, &one_read).unwrap();
        assert!(bl.contains_locus("chr1", 1));
        assert!(!bl.contains_locus("chr1", 2));

        let two_reads = BlacklistThresholds {
            min_samples_two_reads: Some(1),
            ..Default::default()
        };
        let bl = BlackList::from_panel(&p, &two_reads).unwrap();
        assert_eq!(bl, BlackList::Loci([("chr1".to_string(), 2)].into_iter().collect()));

        // every criterion disabled
        let bl = BlackList::from_panel(&p, &BlacklistThresholds::default()).unwrap();
        assert!(bl.is_empty());
    }

    #[test]
    fn test_vaf_quantile_is_strict_and_idempotent() {
        let p = panel(
            vec![
                row(1, Some(b'T'), &[("n1", 100, 0)]),
                row(2, Some(b'T'), &[("n1", 100, 1)]),
                row(3, Some(b'T'), &[("n1", 100, 10), ("n2", 100, 30)]),
            ],
            true,
        );
        let thresholds = BlacklistThresholds {
            mean_vaf_quantile: Some(0.5),
            ..Default::default()
        };
        let first = BlackList::from_panel(&p, &thresholds).unwrap();
        let second = BlackList::from_panel(&p, &thresholds).unwrap();
        assert_eq!(first, second);
        assert!(first.is_substitution_specific());
        // median mean VAF is 0.01; only row 3 is strictly above it
        assert!(first.contains_variant("chr1", 3, b'T'));
        assert!(!first.contains_variant("chr1", 2, b'T'));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_invalid_quantile_and_mode_mismatch() {
        let p = panel(vec![], false);
        let bad = BlacklistThresholds {
            mean_vaf_quantile: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            BlackList::from_panel(&p, &bad),
            Err(CtdnaError::InvalidThreshold { .. })
        ));

        let loci = BlackList::Loci(BTreeSet::new());
        assert!(loci.check_mode(false).is_ok());
        assert!(matches!(loci.check_mode(true), Err(CtdnaError::ModeMismatch(_))));
    }

    #[test]
    fn test_build_panel_from_samples() {
        let n1 = MemorySource::new(
            "n1",
            vec![
                uniform_read("a", "chr1", 10, 5, b'C'),
                with_base(uniform_read("b", "chr1", 10, 5, b'C'), 12, b'T'),
            ],
        );
        let n2 = MemorySource::new("n2", vec![uniform_read("c", "chr1", 12, 3, b'C')]);
        let targets = vec![TargetRegion::new("chr1", 10, 14).unwrap()];
        let filter = ReadFilter::default();

        let loci = BackgroundPanel::build(&[&n1, &n2], &targets, &filter, None, false).unwrap();
        assert_eq!(loci.samples, vec!["n1", "n2"]);
        assert_eq!(loci.len(), 5);
        let key = PanelKey {
            chrom: "chr1".to_string(),
            pos: 12,
            alt: None,
        };
        let row = &loci.rows[&key];
        assert_eq!(row.observations["n1"], SampleObservation { depth: 2, alt: 1 });
        assert_eq!(row.observations["n2"], SampleObservation { depth: 1, alt: 0 });
        // n2 has no depth at position 10
        let key10 = PanelKey { pos: 10, ..key };
        assert!(!loci.rows[&key10].observations.contains_key("n2"));

        let variants = BackgroundPanel::build(&[&n1, &n2], &targets, &filter, None, true).unwrap();
        // three alternate alleles per covered position
        assert_eq!(variants.len(), 15);
    }

    #[test]
    fn test_blacklist_from_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bl.tsv");
        std::fs::write(&path, "# noisy sites\nchrom\tpos\talt\nchr1\t100\tT\nchr2\t5\tg\n").unwrap();
        let bl = BlackList::from_tsv(&path).unwrap();
        assert!(bl.contains_variant("chr2", 5, b'G'));
        assert_eq!(bl.len(), 2);

        let loci_path = dir.path().join("loci.tsv");
        std::fs::write(&loci_path, "chrom\tpos\nchr1\t100\n").unwrap();
        let bl = BlackList::from_tsv(&loci_path).unwrap();
        assert!(bl.contains_locus("chr1", 100));
    }
}
