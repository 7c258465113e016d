// fixtures.rs - Synthetic reads shared by unit tests

use crate::data::read::{CigarOp, ReadFlags, ReadRecord};

/// Forward first-in-pair read with a plain `M` CIGAR, Q30 bases and MAPQ 60
pub fn read_at(name: &str, chrom: &str, pos: u64, seq: &str) -> ReadRecord {
    ReadRecord {
        name: name.to_string(),
        chrom: chrom.to_string(),
        pos,
        mapq: 60,
        flags: ReadFlags(
            ReadFlags::PAIRED | ReadFlags::PROPER_PAIR | ReadFlags::FIRST_IN_PAIR | ReadFlags::MATE_REVERSE,
        ),
        cigar: vec![CigarOp::Match(seq.len() as u32)],
        seq: seq.as_bytes().to_vec(),
        qual: vec![30; seq.len()],
        mate_pos: pos,
        template_len: seq.len() as i64,
    }
}

/// Read of `len` copies of `fill` starting at `pos`
pub fn uniform_read(name: &str, chrom: &str, pos: u64, len: usize, fill: u8) -> ReadRecord {
    let seq = String::from_utf8(vec![fill; len]).unwrap_or_default();
    read_at(name, chrom, pos, &seq)
}

/// Replace the call at a reference position
pub fn with_base(mut read: ReadRecord, ref_pos: u64, base: u8) -> ReadRecord {
    let offset = read.base_at(ref_pos).map(|c| c.query_offset).expect("position covered");
    read.seq[offset] = base;
    read
}

/// Properly paired FR mates spanning the fragment `[start, end]`
pub fn pair(name: &str, chrom: &str, start: u64, end: u64, read_len: usize, fill: u8) -> (ReadRecord, ReadRecord) {
    let size = (end - start + 1) as i64;
    let mate_start = end + 1 - read_len as u64;

    let mut left = uniform_read(name, chrom, start, read_len, fill);
    left.mate_pos = mate_start;
    left.template_len = size;

    let mut right = uniform_read(name, chrom, mate_start, read_len, fill);
    right.flags = ReadFlags(
        ReadFlags::PAIRED | ReadFlags::PROPER_PAIR | ReadFlags::SECOND_IN_PAIR | ReadFlags::REVERSE,
    );
    right.mate_pos = start;
    right.template_len = -size;

    (left, right)
}
