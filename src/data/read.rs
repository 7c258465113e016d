// read.rs - Aligned read records as delivered by an alignment source

use crate::error::{CtdnaError, Result};
use serde::{Deserialize, Serialize};

/// One CIGAR operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CigarOp {
    Match(u32),
    Ins(u32),
    Del(u32),
    RefSkip(u32),
    SoftClip(u32),
    HardClip(u32),
    Pad(u32),
    Equal(u32),
    Diff(u32),
}

impl CigarOp {
    pub fn len(&self) -> u32 {
        match *self {
            CigarOp::Match(l)
            | CigarOp::Ins(l)
            | CigarOp::Del(l)
            | CigarOp::RefSkip(l)
            | CigarOp::SoftClip(l)
            | CigarOp::HardClip(l)
            | CigarOp::Pad(l)
            | CigarOp::Equal(l)
            | CigarOp::Diff(l) => l,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn consumes_ref(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_) | CigarOp::Del(_) | CigarOp::RefSkip(_) | CigarOp::Equal(_) | CigarOp::Diff(_)
        )
    }

    pub fn consumes_query(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_) | CigarOp::Ins(_) | CigarOp::SoftClip(_) | CigarOp::Equal(_) | CigarOp::Diff(_)
        )
    }
}

/// Parse a SAM CIGAR string such as `10S80M2I8M`. `*` yields an empty CIGAR.
pub fn parse_cigar(text: &str) -> Result<Vec<CigarOp>> {
    let bad = |reason: &str| CtdnaError::InvalidObservation(format!("CIGAR '{}': {}", text, reason));
    if text == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut have_digits = false;
    for c in text.chars() {
        if let Some(d) = c.to_digit(10) {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(d))
                .ok_or_else(|| bad("operation length overflows"))?;
            have_digits = true;
            continue;
        }
        if !have_digits {
            return Err(bad("operation without a length"));
        }
        let op = match c {
            'M' => CigarOp::Match(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            'N' => CigarOp::RefSkip(len),
            'S' => CigarOp::SoftClip(len),
            'H' => CigarOp::HardClip(len),
            'P' => CigarOp::Pad(len),
            '=' => CigarOp::Equal(len),
            'X' => CigarOp::Diff(len),
            _ => return Err(bad("unknown operation")),
        };
        ops.push(op);
        len = 0;
        have_digits = false;
    }
    if have_digits {
        return Err(bad("trailing length without operation"));
    }
    Ok(ops)
}

/// SAM flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadFlags(pub u16);

impl ReadFlags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;

    fn has(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn is_paired(&self) -> bool {
        self.has(Self::PAIRED)
    }
    pub fn is_proper_pair(&self) -> bool {
        self.has(Self::PROPER_PAIR)
    }
    pub fn is_unmapped(&self) -> bool {
        self.has(Self::UNMAPPED)
    }
    pub fn is_mate_unmapped(&self) -> bool {
        self.has(Self::MATE_UNMAPPED)
    }
    pub fn is_reverse(&self) -> bool {
        self.has(Self::REVERSE)
    }
    pub fn is_mate_reverse(&self) -> bool {
        self.has(Self::MATE_REVERSE)
    }
    pub fn is_first_in_pair(&self) -> bool {
        self.has(Self::FIRST_IN_PAIR)
    }
    pub fn is_second_in_pair(&self) -> bool {
        self.has(Self::SECOND_IN_PAIR)
    }
    pub fn is_secondary(&self) -> bool {
        self.has(Self::SECONDARY)
    }
    pub fn is_qc_fail(&self) -> bool {
        self.has(Self::QC_FAIL)
    }
    pub fn is_duplicate(&self) -> bool {
        self.has(Self::DUPLICATE)
    }
    pub fn is_supplementary(&self) -> bool {
        self.has(Self::SUPPLEMENTARY)
    }
}

/// A base call at one reference position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseCall {
    pub base: u8,
    pub qual: u8,
    /// Offset of the call in the read sequence
    pub query_offset: usize,
}

/// One aligned read. `name` identifies the originating pair: both mates
/// share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecord {
    pub name: String,
    pub chrom: String,
    /// 1-based leftmost aligned reference position
    pub pos: u64,
    pub mapq: u8,
    pub flags: ReadFlags,
    pub cigar: Vec<CigarOp>,
    pub seq: Vec<u8>,
    /// Phred scores (not ASCII-offset)
    pub qual: Vec<u8>,
    /// 1-based mate position, 0 when unknown
    pub mate_pos: u64,
    /// Signed observed template length (SAM TLEN)
    pub template_len: i64,
}

impl ReadRecord {
    /// Last aligned reference position (1-based, inclusive)
    pub fn end(&self) -> u64 {
        let ref_len: u64 = self
            .cigar
            .iter()
            .filter(|op| op.consumes_ref())
            .map(|op| op.len() as u64)
            .sum();
        if ref_len == 0 {
            self.pos
        } else {
            self.pos + ref_len - 1
        }
    }

    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.pos <= end && self.end() >= start
    }

    /// Only M/=/X operations, i.e. no clipping, indels or skips
    pub fn has_simple_cigar(&self) -> bool {
        self.cigar
            .iter()
            .all(|op| matches!(op, CigarOp::Match(_) | CigarOp::Equal(_) | CigarOp::Diff(_)))
    }

    /// Base and quality aligned to `ref_pos`, or `None` when the position is
    /// outside the read, deleted or skipped.
    pub fn base_at(&self, ref_pos: u64) -> Option<BaseCall> {
        if ref_pos < self.pos {
            return None;
        }
        let mut ref_cursor = self.pos;
        let mut query_cursor: usize = 0;

        for op in &self.cigar {
            let len = op.len() as u64;
            match op {
                CigarOp::Match(_) | CigarOp::Equal(_) | CigarOp::Diff(_) => {
                    if ref_pos < ref_cursor + len {
                        let offset = query_cursor + (ref_pos - ref_cursor) as usize;
                        let base = *self.seq.get(offset)?;
                        let qual = self.qual.get(offset).copied().unwrap_or(0);
                        return Some(BaseCall {
                            base: base.to_ascii_uppercase(),
                            qual,
                            query_offset: offset,
                        });
                    }
                    ref_cursor += len;
                    query_cursor += len as usize;
                }
                CigarOp::Del(_) | CigarOp::RefSkip(_) => {
                    if ref_pos < ref_cursor + len {
                        return None;
                    }
                    ref_cursor += len;
                }
                CigarOp::Ins(_) | CigarOp::SoftClip(_) => query_cursor += len as usize,
                CigarOp::HardClip(_) | CigarOp::Pad(_) => {}
            }
        }
        None
    }

    /// All aligned (reference position, call) pairs, in reference order
    pub fn aligned_calls(&self) -> Vec<(u64, BaseCall)> {
        let mut calls = Vec::with_capacity(self.seq.len());
        let mut ref_cursor = self.pos;
        let mut query_cursor: usize = 0;

        for op in &self.cigar {
            let len = op.len() as u64;
            match op {
                CigarOp::Match(_) | CigarOp::Equal(_) | CigarOp::Diff(_) => {
                    for i in 0..len {
                        let offset = query_cursor + i as usize;
                        if let Some(&base) = self.seq.get(offset) {
                            calls.push((
                                ref_cursor + i,
                                BaseCall {
                                    base: base.to_ascii_uppercase(),
                                    qual: self.qual.get(offset).copied().unwrap_or(0),
                                    query_offset: offset,
                                },
                            ));
                        }
                    }
                    ref_cursor += len;
                    query_cursor += len as usize;
                }
                CigarOp::Del(_) | CigarOp::RefSkip(_) => ref_cursor += len,
                CigarOp::Ins(_) | CigarOp::SoftClip(_) => query_cursor += len as usize,
                CigarOp::HardClip(_) | CigarOp::Pad(_) => {}
            }
        }
        calls
    }

    /// Outer coordinates of the fragment when this is the leftmost mate
    /// (positive template length).
    pub fn fragment_span(&self) -> Option<(u64, u64)> {
        if self.template_len <= 0 {
            return None;
        }
        Some((self.pos, self.pos + self.template_len as u64 - 1))
    }

    /// Forward/reverse pair orientation
    pub fn is_fr_pair(&self) -> bool {
        self.flags.is_paired() && self.flags.is_reverse() != self.flags.is_mate_reverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cigar: &str, seq: &str) -> ReadRecord {
        ReadRecord {
            name: "r1".to_string(),
            chrom: "chr1".to_string(),
            pos: 100,
            mapq: 60,
            flags: ReadFlags(ReadFlags::PAIRED | ReadFlags::PROPER_PAIR),
            cigar: parse_cigar(cigar).unwrap(),
            seq: seq.as_bytes().to_vec(),
            qual: vec![30; seq.len()],
            mate_pos: 150,
            template_len: 80,
        }
    }

    #[test]
    fn test_parse_cigar() {
        let ops = parse_cigar("2S5M1I3M2D4M").unwrap();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], CigarOp::SoftClip(2));
        assert_eq!(ops[4], CigarOp::Del(2));
        assert!(parse_cigar("*").unwrap().is_empty());
        assert!(parse_cigar("5Q").is_err());
        assert!(parse_cigar("M").is_err());
        assert!(parse_cigar("5M3").is_err());
    }

    #[test]
    fn test_end_and_base_at_through_indels() {
        // ref:   100 101 102 103 104 | 105 106 (del) | 107 108
        // query: S S A C G T T  ins(G)  C   C ...
        let read = record("2S5M1I2M2D2M", "NNACGTTGCCAA");
        assert_eq!(read.end(), 110);
        assert_eq!(read.base_at(100).unwrap().base, b'A');
        assert_eq!(read.base_at(104).unwrap().base, b'T');
        // insertion skipped: 105 maps to offset 8
        assert_eq!(read.base_at(105).unwrap().query_offset, 8);
        assert!(read.base_at(107).is_none());
        assert!(read.base_at(108).is_none());
        assert_eq!(read.base_at(109).unwrap().base, b'A');
        assert!(read.base_at(111).is_none());
        assert!(read.base_at(99).is_none());
        assert!(!read.has_simple_cigar());
    }

    #[test]
    fn test_aligned_calls_match_base_at() {
        let read = record("3M1D2M", "ACGTA");
        let calls = read.aligned_calls();
        assert_eq!(calls.len(), 5);
        for (pos, call) in calls {
            assert_eq!(read.base_at(pos), Some(call));
        }
    }

    #[test]
    fn test_fragment_span() {
        let mut read = record("5M", "ACGTA");
        assert_eq!(read.fragment_span(), Some((100, 179)));
        read.template_len = -80;
        assert_eq!(read.fragment_span(), None);
    }

    #[test]
    fn test_flags() {
        let flags = ReadFlags(ReadFlags::PAIRED | ReadFlags::REVERSE | ReadFlags::DUPLICATE);
        assert!(flags.is_paired());
        assert!(flags.is_reverse());
        assert!(flags.is_duplicate());
        assert!(!flags.is_proper_pair());
        assert!(!flags.is_mate_reverse());
    }
}
