// filters.rs - Read and base quality filters

use crate::data::read::{BaseCall, ReadRecord};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which strand's reads are used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StrandFilter {
    #[default]
    Both,
    Forward,
    Reverse,
}

impl FromStr for StrandFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "both" | "any" => Ok(StrandFilter::Both),
            "forward" | "fwd" | "+" => Ok(StrandFilter::Forward),
            "reverse" | "rev" | "-" => Ok(StrandFilter::Reverse),
            _ => Err(format!("Invalid strand: {}. Use: both, forward, reverse", s)),
        }
    }
}

/// Quality and pairing criteria applied to every read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadFilter {
    pub min_base_quality: u8,
    pub min_mapq: u8,
    pub require_proper_pair: bool,
    pub strand: StrandFilter,
    /// Reject reads with clipping, indels or skips
    pub simple_cigar_only: bool,
    pub drop_duplicates: bool,
    /// Ignore calls this close to either end of the read
    pub end_trim: u32,
}

impl Default for ReadFilter {
    fn default() -> Self {
        Self {
            min_base_quality: 20,
            min_mapq: 30,
            require_proper_pair: true,
            strand: StrandFilter::Both,
            simple_cigar_only: false,
            drop_duplicates: true,
            end_trim: 0,
        }
    }
}

impl ReadFilter {
    /// Read-level criteria (flags, mapping quality, strand, CIGAR)
    pub fn accepts_read(&self, read: &ReadRecord) -> bool {
        let flags = read.flags;
        if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() || flags.is_qc_fail() {
            return false;
        }
        if self.drop_duplicates && flags.is_duplicate() {
            return false;
        }
        if self.require_proper_pair && !(flags.is_paired() && flags.is_proper_pair()) {
            return false;
        }
        if read.mapq < self.min_mapq {
            return false;
        }
        match self.strand {
            StrandFilter::Forward if flags.is_reverse() => return false,
            StrandFilter::Reverse if !flags.is_reverse() => return false,
            _ => {}
        }
        if self.simple_cigar_only && !read.has_simple_cigar() {
            return false;
        }
        true
    }

    /// Base-level criteria for a call taken from `read`
    pub fn accepts_call(&self, read: &ReadRecord, call: &BaseCall) -> bool {
        if call.qual < self.min_base_quality || call.base == b'N' {
            return false;
        }
        if self.end_trim > 0 {
            let trim = self.end_trim as usize;
            if call.query_offset < trim || call.query_offset + trim >= read.seq.len() {
                return false;
            }
        }
        true
    }

    /// Passing call at `pos`, if any
    pub fn call_at(&self, read: &ReadRecord, pos: u64) -> Option<BaseCall> {
        read.base_at(pos).filter(|call| self.accepts_call(read, call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::read_at;
    use crate::data::read::{CigarOp, ReadFlags};

    #[test]
    fn test_default_filter_accepts_clean_pair() {
        let filter = ReadFilter::default();
        let read = read_at("r", "chr1", 100, "ACGTACGT");
        assert!(filter.accepts_read(&read));
        assert!(filter.call_at(&read, 101).is_some());
    }

    #[test]
    fn test_flag_and_quality_rejections() {
        let filter = ReadFilter::default();

        let mut dup = read_at("r", "chr1", 100, "ACGT");
        dup.flags = ReadFlags(dup.flags.0 | ReadFlags::DUPLICATE);
        assert!(!filter.accepts_read(&dup));
        let keep_dups = ReadFilter {
            drop_duplicates: false,
            ..ReadFilter::default()
        };
        assert!(keep_dups.accepts_read(&dup));

        let mut improper = read_at("r", "chr1", 100, "ACGT");
        improper.flags = ReadFlags(ReadFlags::PAIRED);
        assert!(!filter.accepts_read(&improper));

        let mut low_mapq = read_at("r", "chr1", 100, "ACGT");
        low_mapq.mapq = 10;
        assert!(!filter.accepts_read(&low_mapq));

        let mut low_bq = read_at("r", "chr1", 100, "ACGT");
        low_bq.qual[1] = 5;
        assert!(filter.call_at(&low_bq, 101).is_none());
        assert!(filter.call_at(&low_bq, 102).is_some());
    }

    #[test]
    fn test_strand_cigar_and_trim() {
        let mut reverse = read_at("r", "chr1", 100, "ACGTACGT");
        reverse.flags = ReadFlags(reverse.flags.0 | ReadFlags::REVERSE);
        let forward_only = ReadFilter {
            strand: StrandFilter::Forward,
            ..ReadFilter::default()
        };
        assert!(!forward_only.accepts_read(&reverse));

        let mut clipped = read_at("r", "chr1", 100, "ACGTACGT");
        clipped.cigar = vec![CigarOp::SoftClip(2), CigarOp::Match(6)];
        let simple = ReadFilter {
            simple_cigar_only: true,
            ..ReadFilter::default()
        };
        assert!(!simple.accepts_read(&clipped));

        let trimmed = ReadFilter {
            end_trim: 2,
            ..ReadFilter::default()
        };
        let read = read_at("r", "chr1", 100, "ACGTACGT");
        assert!(trimmed.call_at(&read, 101).is_none());
        assert!(trimmed.call_at(&read, 102).is_some());
        assert!(trimmed.call_at(&read, 105).is_some());
        assert!(trimmed.call_at(&read, 106).is_none());
    }

    #[test]
    fn test_strand_parsing() {
        assert_eq!("Forward".parse::<StrandFilter>().unwrap(), StrandFilter::Forward);
        assert_eq!("-".parse::<StrandFilter>().unwrap(), StrandFilter::Reverse);
        assert!("sideways".parse::<StrandFilter>().is_err());
    }
}
