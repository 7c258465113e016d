// background.rs - Background error-rate estimation over target regions

use crate::core::blacklist::BlackList;
use crate::core::filters::ReadFilter;
use crate::core::pileup::pileup_region;
use crate::data::mutation::{Mutation, Substitution};
use crate::data::region::{merge_regions, TargetRegion};
use crate::data::source::{AlignmentSource, ReferenceLookup};
use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Depth and alt count accumulated for one substitution class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub depth: u64,
    pub alt: u64,
}

impl ClassCounts {
    pub fn rate(&self) -> Option<f64> {
        if self.depth == 0 {
            None
        } else {
            Some(self.alt as f64 / self.depth as f64)
        }
    }
}

/// Aggregate non-reference rate plus the per-class breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRate {
    pub rate: f64,
    pub total_depth: u64,
    pub total_alt: u64,
    pub positions: u64,
    pub per_substitution: BTreeMap<Substitution, ClassCounts>,
}

impl BackgroundRate {
    pub fn substitution_rate(&self, substitution: &Substitution) -> Option<f64> {
        self.per_substitution.get(substitution).and_then(|c| c.rate())
    }

    /// Rate used to test `mutation`: its class rate in substitution-specific
    /// mode, the aggregate otherwise.
    pub fn rate_for(&self, mutation: &Mutation, substitution_specific: bool) -> f64 {
        if !substitution_specific {
            return self.rate;
        }
        let class = mutation.substitution();
        match self.substitution_rate(&class) {
            Some(rate) => rate,
            None => {
                log::warn!(
                    "{}: no background depth for {}, using aggregate rate",
                    mutation,
                    class
                );
                self.rate
            }
        }
    }
}

/// Scans targets and accumulates non-reference calls
pub struct BackgroundEstimator<'a> {
    filter: &'a ReadFilter,
    reference: Option<&'a dyn ReferenceLookup>,
    blacklist: Option<&'a BlackList>,
    substitution_specific: bool,
}

impl<'a> BackgroundEstimator<'a> {
    pub fn new(filter: &'a ReadFilter, substitution_specific: bool) -> Self {
        Self {
            filter,
            reference: None,
            blacklist: None,
            substitution_specific,
        }
    }

    pub fn with_reference(mut self, reference: &'a dyn ReferenceLookup) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach a blacklist; its granularity must match the estimator's mode.
    pub fn with_blacklist(mut self, blacklist: &'a BlackList) -> Result<Self> {
        blacklist.check_mode(self.substitution_specific)?;
        self.blacklist = Some(blacklist);
        Ok(self)
    }

    pub fn estimate(
        &self,
        source: &dyn AlignmentSource,
        targets: &[TargetRegion],
        mutations: &[Mutation],
    ) -> Result<BackgroundRate> {
        let excluded: HashSet<(&str, u64)> = mutations.iter().map(|m| (m.chrom.as_str(), m.pos)).collect();
        let regions = merge_regions(targets);

        let mut total_depth = 0u64;
        let mut total_alt = 0u64;
        let mut positions = 0u64;
        let mut per_substitution: BTreeMap<Substitution, ClassCounts> =
            Substitution::all().into_iter().map(|s| (s, ClassCounts::default())).collect();
        let mut skipped_blacklist = 0u64;

        for region in &regions {
            for column in pileup_region(source, region, self.filter, self.reference)? {
                if excluded.contains(&(column.chrom.as_str(), column.pos)) {
                    continue;
                }
                if let Some(blacklist) = self.blacklist {
                    if blacklist.contains_locus(&column.chrom, column.pos) {
                        skipped_blacklist += 1;
                        continue;
                    }
                }

                let depth = column.depth() as u64;
                positions += 1;
                total_depth += depth;
                for (alt, count) in column.alt_counts() {
                    let class = per_substitution
                        .entry(Substitution::new(column.ref_base, alt))
                        .or_default();
                    class.depth += depth;
                    let blacklisted = self
                        .blacklist
                        .map(|b| b.contains_variant(&column.chrom, column.pos, alt))
                        .unwrap_or(false);
                    if blacklisted {
                        skipped_blacklist += 1;
                        continue;
                    }
                    class.alt += count as u64;
                    total_alt += count as u64;
                }
            }
        }

        if total_depth == 0 {
            return Err(CtdnaError::InsufficientCoverage {
                context: format!(
                    "sample '{}' has no usable depth over {} target regions",
                    source.name(),
                    regions.len()
                ),
            });
        }

        let rate = total_alt as f64 / total_depth as f64;
        log::info!(
            "{}: background rate {:.3e} ({} alt / {} depth over {} positions, {} blacklisted sites skipped)",
            source.name(),
            rate,
            total_alt,
            total_depth,
            positions,
            skipped_blacklist
        );
        Ok(BackgroundRate {
            rate,
            total_depth,
            total_alt,
            positions,
            per_substitution,
        })
    }
}
