// mutation.rs - Single-nucleotide mutations and substitution classes

use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A pre-identified tumor mutation to be tested in the sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mutation {
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    pub ref_base: u8,
    pub alt_base: u8,
    pub phase_id: Option<String>,
}

impl Mutation {
    /// Build a mutation, rejecting anything that is not an SNV.
    pub fn new(
        chrom: &str,
        pos: u64,
        ref_allele: &str,
        alt_allele: &str,
        phase_id: Option<String>,
    ) -> Result<Self> {
        let locus = format!("{}:{} {}>{}", chrom, pos, ref_allele, alt_allele);
        let invalid = |reason: &str| CtdnaError::InvalidMutation {
            locus: locus.clone(),
            reason: reason.to_string(),
        };

        if pos == 0 {
            return Err(invalid("positions are 1-based"));
        }
        if ref_allele.len() != 1 || alt_allele.len() != 1 {
            return Err(invalid("only single-nucleotide substitutions are supported"));
        }

        let ref_base = ref_allele.as_bytes()[0].to_ascii_uppercase();
        let alt_base = alt_allele.as_bytes()[0].to_ascii_uppercase();
        if !is_nucleotide(ref_base) || !is_nucleotide(alt_base) {
            return Err(invalid("alleles must be one of A, C, G, T"));
        }
        if ref_base == alt_base {
            return Err(invalid("reference and alternate alleles are identical"));
        }

        Ok(Self {
            chrom: chrom.to_string(),
            pos,
            ref_base,
            alt_base,
            phase_id: phase_id.filter(|id| !id.trim().is_empty()),
        })
    }

    /// Locus label used in reports and error messages
    pub fn locus(&self) -> String {
        format!("{}:{}", self.chrom, self.pos)
    }

    pub fn substitution(&self) -> Substitution {
        Substitution::new(self.ref_base, self.alt_base)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}>{}",
            self.chrom, self.pos, self.ref_base as char, self.alt_base as char
        )
    }
}

/// Reject repeated (chrom, pos, ref, alt) tuples unless every copy belongs to
/// a phase group.
pub fn check_unique(mutations: &[Mutation]) -> Result<()> {
    let mut copies: HashMap<(&str, u64, u8, u8), Vec<&Mutation>> = HashMap::new();
    for m in mutations {
        copies
            .entry((m.chrom.as_str(), m.pos, m.ref_base, m.alt_base))
            .or_default()
            .push(m);
    }
    for m in mutations {
        let group = &copies[&(m.chrom.as_str(), m.pos, m.ref_base, m.alt_base)];
        if group.len() > 1 && group.iter().any(|c| c.phase_id.is_none()) {
            return Err(CtdnaError::InvalidMutation {
                locus: m.to_string(),
                reason: "duplicated mutation without a phase group".to_string(),
            });
        }
    }
    Ok(())
}

pub fn is_nucleotide(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}

pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        other => other,
    }
}

/// Index of a base in `[A, C, G, T]` count arrays
pub fn base_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Substitution class folded onto the pyrimidine reference strand
/// (G>T is reported as C>A, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Substitution {
    pub ref_base: u8,
    pub alt_base: u8,
}

impl Substitution {
    pub fn new(ref_base: u8, alt_base: u8) -> Self {
        if matches!(ref_base, b'A' | b'G') {
            Self {
                ref_base: complement(ref_base),
                alt_base: complement(alt_base),
            }
        } else {
            Self { ref_base, alt_base }
        }
    }

    /// The six pyrimidine-reference classes
    pub fn all() -> [Substitution; 6] {
        [
            Substitution { ref_base: b'C', alt_base: b'A' },
            Substitution { ref_base: b'C', alt_base: b'G' },
            Substitution { ref_base: b'C', alt_base: b'T' },
            Substitution { ref_base: b'T', alt_base: b'A' },
            Substitution { ref_base: b'T', alt_base: b'C' },
            Substitution { ref_base: b'T', alt_base: b'G' },
        ]
    }

    /// True when a reference base belongs to this class's folded pair
    pub fn has_reference(&self, ref_base: u8) -> bool {
        ref_base == self.ref_base || ref_base == complement(self.ref_base)
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.ref_base as char, self.alt_base as char)
    }
}
