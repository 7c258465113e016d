// phasing.rs - Phase-group merging with mismatch purification

use crate::core::evidence::ReadEvidence;
use crate::data::mutation::Mutation;
use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A test unit: one unphased mutation, or a phase group collapsed into a
/// single merged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedUnit {
    pub id: String,
    pub members: Vec<Mutation>,
    pub evidence: ReadEvidence,
    /// Fraction of alt-signal reads that carried alt at every member
    pub purification_probability: f64,
    pub full_support: usize,
    pub partial_support: usize,
    pub no_support: usize,
}

impl MergedUnit {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn chrom(&self) -> &str {
        self.members.first().map(|m| m.chrom.as_str()).unwrap_or("")
    }

    /// Background rate corrected for the group size
    pub fn adjusted_rate(&self, rate: f64) -> f64 {
        adjusted_background_rate(rate, self.purification_probability, self.size())
    }
}

/// `p * r^k + (1 - p) * r`: reads kept after purification either carry alt
/// at all `k` members by chance jointly, or are single-site errors.
pub fn adjusted_background_rate(rate: f64, purification_probability: f64, group_size: usize) -> f64 {
    let k = group_size.max(1) as i32;
    let p = purification_probability.clamp(0.0, 1.0);
    p * rate.powi(k) + (1.0 - p) * rate
}

/// Group mutations by phase id and merge the evidence of each group.
///
/// `evidence[i]` belongs to `mutations[i]`. Units come out in order of first
/// appearance; unphased mutations become single-member units.
pub fn merge_phase_groups(mutations: &[Mutation], evidence: &[ReadEvidence]) -> Result<Vec<MergedUnit>> {
    if mutations.len() != evidence.len() {
        return Err(CtdnaError::InvalidObservation(format!(
            "{} mutations but {} evidence entries",
            mutations.len(),
            evidence.len()
        )));
    }

    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut by_phase: HashMap<&str, usize> = HashMap::new();
    for (idx, m) in mutations.iter().enumerate() {
        match m.phase_id.as_deref() {
            Some(id) => match by_phase.get(id) {
                Some(&slot) => order[slot].push(idx),
                None => {
                    by_phase.insert(id, order.len());
                    order.push(vec![idx]);
                }
            },
            None => order.push(vec![idx]),
        }
    }

    order
        .into_iter()
        .map(|indices| {
            let members: Vec<&Mutation> = indices.iter().map(|&i| &mutations[i]).collect();
            let group_evidence: Vec<&ReadEvidence> = indices.iter().map(|&i| &evidence[i]).collect();
            merge_group(&members, &group_evidence)
        })
        .collect()
}

fn merge_group(members: &[&Mutation], evidence: &[&ReadEvidence]) -> Result<MergedUnit> {
    let first = members[0];
    let id = first.phase_id.clone().unwrap_or_else(|| first.to_string());

    let chromosomes: BTreeSet<&str> = members.iter().map(|m| m.chrom.as_str()).collect();
    if chromosomes.len() > 1 {
        return Err(CtdnaError::InconsistentPhaseGroup {
            phase_id: id,
            chromosomes: chromosomes.into_iter().map(String::from).collect(),
        });
    }

    let k = members.len();
    let mut reads: BTreeSet<&String> = BTreeSet::new();
    for ev in evidence {
        reads.extend(ev.ref_reads.iter());
        reads.extend(ev.alt_reads.iter());
    }

    let mut merged = ReadEvidence::default();
    let (mut full, mut partial, mut none) = (0usize, 0usize, 0usize);
    for read in reads {
        let alt_hits = evidence.iter().filter(|ev| ev.alt_reads.contains(read)).count();
        if alt_hits == k {
            full += 1;
            merged.alt_reads.insert(read.clone());
        } else if alt_hits == 0 {
            none += 1;
            merged.ref_reads.insert(read.clone());
        } else {
            // purified: partial alt support is treated as reference
            partial += 1;
            merged.ref_reads.insert(read.clone());
        }
    }

    let purification_probability = if full + partial == 0 {
        0.0
    } else {
        full as f64 / (full + partial) as f64
    };
    if k > 1 {
        log::debug!(
            "phase group {}: {} members, {} full / {} partial / {} no-support reads, p = {:.3}",
            id,
            k,
            full,
            partial,
            none,
            purification_probability
        );
    }

    Ok(MergedUnit {
        id,
        members: members.iter().map(|m| (*m).clone()).collect(),
        evidence: merged,
        purification_probability,
        full_support: full,
        partial_support: partial,
        no_support: none,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(refs: &[&str], alts: &[&str]) -> ReadEvidence {
        ReadEvidence {
            ref_reads: refs.iter().map(|s| s.to_string()).collect(),
            alt_reads: alts.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn phased(pos: u64, group: &str) -> Mutation {
        Mutation::new("chr1", pos, "C", "T", Some(group.to_string())).unwrap()
    }

    #[test]
    fn test_single_mutation_passes_through() {
        let m = Mutation::new("chr1", 100, "C", "T", None).unwrap();
        let ev = evidence(&["a", "b"], &["c"]);
        let units = merge_phase_groups(&[m.clone()], &[ev.clone()]).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].evidence, ev);
        assert_eq!(units[0].id, m.to_string());
        assert_eq!(units[0].adjusted_rate(0.01), 0.01);
    }

    #[test]
    fn test_full_partial_and_no_support() {
        let mutations = vec![phased(100, "g"), phased(110, "g")];
        let ev = vec![
            // r1 alt at both, r2 alt at first only, r3 ref at both
            evidence(&["r3"], &["r1", "r2"]),
            evidence(&["r2", "r3"], &["r1"]),
        ];
        let units = merge_phase_groups(&mutations, &ev).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.id, "g");
        assert_eq!(unit.size(), 2);
        assert_eq!((unit.full_support, unit.partial_support, unit.no_support), (1, 1, 1));
        assert_eq!(unit.evidence, evidence(&["r2", "r3"], &["r1"]));
        assert!((unit.purification_probability - 0.5).abs() < 1e-12);
        // 0.5 * 0.01^2 + 0.5 * 0.01
        assert!((unit.adjusted_rate(0.01) - 0.00505).abs() < 1e-12);
    }

    #[test]
    fn test_no_alt_signal_gives_zero_probability() {
        let mutations = vec![phased(100, "g"), phased(110, "g")];
        let ev = vec![evidence(&["a"], &[]), evidence(&["a"], &[])];
        let units = merge_phase_groups(&mutations, &ev).unwrap();
        assert_eq!(units[0].purification_probability, 0.0);
        assert_eq!(units[0].adjusted_rate(0.02), 0.02);
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let mutations = vec![
            phased(100, "g1"),
            Mutation::new("chr1", 50, "A", "G", None).unwrap(),
            phased(120, "g1"),
        ];
        let ev = vec![ReadEvidence::default(); 3];
        let units = merge_phase_groups(&mutations, &ev).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id, "g1");
        assert_eq!(units[0].size(), 2);
        assert_eq!(units[1].size(), 1);
    }

    #[test]
    fn test_group_spanning_chromosomes_rejected() {
        let mutations = vec![
            phased(100, "g"),
            Mutation::new("chr2", 100, "C", "T", Some("g".to_string())).unwrap(),
        ];
        let ev = vec![ReadEvidence::default(); 2];
        match merge_phase_groups(&mutations, &ev) {
            Err(CtdnaError::InconsistentPhaseGroup { phase_id, chromosomes }) => {
                assert_eq!(phase_id, "g");
                assert_eq!(chromosomes, vec!["chr1", "chr2"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_adjusted_rate_limits() {
        assert_eq!(adjusted_background_rate(0.1, 1.0, 3), 0.1f64.powi(3));
        assert_eq!(adjusted_background_rate(0.1, 0.0, 3), 0.1);
        assert!((adjusted_background_rate(0.1, 0.7, 1) - 0.1).abs() < 1e-15);
    }
}
