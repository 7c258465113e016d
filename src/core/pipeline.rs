// pipeline.rs - Per-sample detection pipeline and batch runner

use crate::core::background::{BackgroundEstimator, BackgroundRate};
use crate::core::blacklist::BlackList;
use crate::core::evidence::EvidenceCollector;
use crate::core::filters::ReadFilter;
use crate::core::montecarlo::{MonteCarloConfig, MonteCarloTester, TestResult};
use crate::core::phasing::{merge_phase_groups, MergedUnit};
use crate::data::mutation::Mutation;
use crate::data::region::TargetRegion;
use crate::data::source::{AlignmentSource, ReferenceLookup};
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row of the per-unit report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub id: String,
    pub chrom: String,
    pub members: usize,
    pub ref_reads: usize,
    pub alt_reads: usize,
    pub purification_probability: f64,
    pub rate: f64,
}

impl UnitReport {
    fn from_unit(unit: &MergedUnit, rate: f64) -> Self {
        Self {
            id: unit.id.clone(),
            chrom: unit.chrom().to_string(),
            members: unit.size(),
            ref_reads: unit.evidence.ref_count(),
            alt_reads: unit.evidence.alt_count(),
            purification_probability: unit.purification_probability,
            rate,
        }
    }
}

/// Everything reported for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub sample: String,
    pub units: Vec<UnitReport>,
    pub background: BackgroundRate,
    pub informative_reads: usize,
    pub alt_reads: usize,
    pub pooled_rate: f64,
    pub result: TestResult,
}

/// Evidence, phasing, background and significance test wired together
pub struct CtdnaTest<'a> {
    filter: ReadFilter,
    monte_carlo: MonteCarloConfig,
    substitution_specific: bool,
    reference: Option<&'a dyn ReferenceLookup>,
    blacklist: Option<&'a BlackList>,
}

impl<'a> CtdnaTest<'a> {
    pub fn new(filter: ReadFilter, monte_carlo: MonteCarloConfig, substitution_specific: bool) -> Self {
        Self {
            filter,
            monte_carlo,
            substitution_specific,
            reference: None,
            blacklist: None,
        }
    }

    pub fn with_reference(mut self, reference: &'a dyn ReferenceLookup) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach a blacklist, rejecting one whose granularity does not match
    pub fn with_blacklist(mut self, blacklist: &'a BlackList) -> Result<Self> {
        blacklist.check_mode(self.substitution_specific)?;
        self.blacklist = Some(blacklist);
        Ok(self)
    }

    fn estimator(&self) -> Result<BackgroundEstimator<'_>> {
        let mut estimator = BackgroundEstimator::new(&self.filter, self.substitution_specific);
        if let Some(reference) = self.reference {
            estimator = estimator.with_reference(reference);
        }
        if let Some(blacklist) = self.blacklist {
            estimator = estimator.with_blacklist(blacklist)?;
        }
        Ok(estimator)
    }

    /// Test one sample
    pub fn run(
        &self,
        source: &dyn AlignmentSource,
        mutations: &[Mutation],
        targets: &[TargetRegion],
    ) -> Result<SampleReport> {
        let tester = MonteCarloTester::new(self.monte_carlo.clone())?;

        let mut collector = EvidenceCollector::new(&self.filter);
        if let Some(reference) = self.reference {
            collector = collector.with_reference(reference);
        }
        let evidence = collector.collect(source, mutations)?;
        let units = merge_phase_groups(mutations, &evidence)?;
        let background = self.estimator()?.estimate(source, targets, mutations)?;

        let mut informative: BTreeSet<&String> = BTreeSet::new();
        let mut alt: BTreeSet<&String> = BTreeSet::new();
        let mut weighted_rate = 0.0;
        let mut weight = 0usize;
        let mut reports = Vec::with_capacity(units.len());
        for unit in &units {
            let base_rate = unit
                .members
                .iter()
                .map(|m| background.rate_for(m, self.substitution_specific))
                .sum::<f64>()
                / unit.size() as f64;
            let rate = unit.adjusted_rate(base_rate);

            let unit_informative = unit.evidence.informative();
            weighted_rate += rate * unit_informative as f64;
            weight += unit_informative;
            informative.extend(unit.evidence.ref_reads.iter());
            informative.extend(unit.evidence.alt_reads.iter());
            alt.extend(unit.evidence.alt_reads.iter());
            reports.push(UnitReport::from_unit(unit, rate));
        }

        let pooled_rate = if weight == 0 {
            background.rate
        } else {
            weighted_rate / weight as f64
        };
        let result = tester.test(alt.len(), informative.len(), pooled_rate)?;

        log::info!(
            "{}: {} units, {}/{} alt/informative reads, rate {:.3e}, p = {:.4} ({})",
            source.name(),
            reports.len(),
            alt.len(),
            informative.len(),
            pooled_rate,
            result.p_value,
            result.status
        );
        Ok(SampleReport {
            sample: source.name().to_string(),
            units: reports,
            informative_reads: informative.len(),
            alt_reads: alt.len(),
            background,
            pooled_rate,
            result,
        })
    }

    /// Test several samples in parallel; results are keyed by sample name.
    pub fn run_batch(
        &self,
        sources: &[&dyn AlignmentSource],
        mutations: &[Mutation],
        targets: &[TargetRegion],
    ) -> BTreeMap<String, Result<SampleReport>> {
        let pb = ProgressBar::new(sources.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let results: Vec<(String, Result<SampleReport>)> = sources
            .par_iter()
            .map(|source| {
                let report = self.run(*source, mutations, targets);
                pb.inc(1);
                (source.name().to_string(), report)
            })
            .collect();
        pb.finish_and_clear();

        results.into_iter().collect()
    }
}
