// evidence.rs - Per-mutation read evidence collection

use crate::core::filters::ReadFilter;
use crate::data::mutation::Mutation;
use crate::data::source::{AlignmentSource, ReferenceLookup};
use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Read pairs supporting each allele of one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEvidence {
    pub ref_reads: BTreeSet<String>,
    pub alt_reads: BTreeSet<String>,
}

impl ReadEvidence {
    pub fn ref_count(&self) -> usize {
        self.ref_reads.len()
    }

    pub fn alt_count(&self) -> usize {
        self.alt_reads.len()
    }

    /// Distinct pairs informative for either allele
    pub fn informative(&self) -> usize {
        self.ref_reads.union(&self.alt_reads).count()
    }

    pub fn is_empty(&self) -> bool {
        self.ref_reads.is_empty() && self.alt_reads.is_empty()
    }
}

/// Allele signal gathered from the mates of one pair
#[derive(Debug, Clone, Copy, Default)]
struct PairSignal {
    has_ref: bool,
    has_alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Allele {
    Ref,
    Alt,
}

impl PairSignal {
    fn resolve(&self, read: &str, locus: &str) -> Result<Option<Allele>> {
        match (self.has_ref, self.has_alt) {
            (true, true) => Err(CtdnaError::AmbiguousReadPair {
                read: read.to_string(),
                locus: locus.to_string(),
            }),
            (true, false) => Ok(Some(Allele::Ref)),
            (false, true) => Ok(Some(Allele::Alt)),
            (false, false) => Ok(None),
        }
    }
}

/// Counts ref/alt supporting read pairs per mutation
pub struct EvidenceCollector<'a> {
    filter: &'a ReadFilter,
    reference: Option<&'a dyn ReferenceLookup>,
}

impl<'a> EvidenceCollector<'a> {
    pub fn new(filter: &'a ReadFilter) -> Self {
        Self {
            filter,
            reference: None,
        }
    }

    /// Validate declared reference bases against a genome
    pub fn with_reference(mut self, reference: &'a dyn ReferenceLookup) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Evidence for a single mutation
    pub fn collect_one(&self, source: &dyn AlignmentSource, mutation: &Mutation) -> Result<ReadEvidence> {
        if let Some(reference) = self.reference {
            match reference.base_at(&mutation.chrom, mutation.pos) {
                Some(base) if base != mutation.ref_base => log::warn!(
                    "{}: declared reference {} but genome has {}",
                    mutation,
                    mutation.ref_base as char,
                    base as char
                ),
                None => log::warn!("{}: position not found in reference", mutation),
                _ => {}
            }
        }

        let mut signals: BTreeMap<String, PairSignal> = BTreeMap::new();
        for record in source.records_overlapping(&mutation.chrom, mutation.pos, mutation.pos)? {
            let read = record?;
            if !self.filter.accepts_read(&read) {
                continue;
            }
            let Some(call) = self.filter.call_at(&read, mutation.pos) else {
                continue;
            };
            let signal = signals.entry(read.name).or_default();
            if call.base == mutation.ref_base {
                signal.has_ref = true;
            } else if call.base == mutation.alt_base {
                signal.has_alt = true;
            }
        }

        let locus = mutation.to_string();
        let mut evidence = ReadEvidence::default();
        let mut ambiguous = 0usize;
        for (name, signal) in signals {
            match signal.resolve(&name, &locus) {
                Ok(Some(Allele::Ref)) => {
                    evidence.ref_reads.insert(name);
                }
                Ok(Some(Allele::Alt)) => {
                    evidence.alt_reads.insert(name);
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!("{}", e);
                    ambiguous += 1;
                }
            }
        }
        if ambiguous > 0 {
            log::debug!("{}: dropped {} ambiguous read pairs", locus, ambiguous);
        }
        Ok(evidence)
    }

    /// Evidence for every mutation, in input order
    pub fn collect(&self, source: &dyn AlignmentSource, mutations: &[Mutation]) -> Result<Vec<ReadEvidence>> {
        mutations.iter().map(|m| self.collect_one(source, m)).collect()
    }
}
