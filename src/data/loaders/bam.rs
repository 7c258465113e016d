// bam.rs - Indexed BAM alignment source (feature "htslib")

use crate::data::read::{CigarOp, ReadFlags, ReadRecord};
use crate::data::source::{AlignmentSource, RecordIter};
use crate::error::{CtdnaError, Result};
use rust_htslib::bam::record::Cigar;
use rust_htslib::bam::{self, Read};
use std::path::{Path, PathBuf};

/// Indexed BAM file. Each query opens its own reader, so the source is
/// shareable across threads and queries never share cursor state.
#[derive(Debug, Clone)]
pub struct BamSource {
    path: PathBuf,
    name: String,
}

impl BamSource {
    pub fn open(path: &Path, name: Option<&str>) -> Result<Self> {
        // Fail early on a missing file or index
        bam::IndexedReader::from_path(path)
            .map_err(|e| CtdnaError::source_unavailable(&path.display().to_string(), e.to_string()))?;
        let name = name.map(|s| s.to_string()).unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sample")
                .to_string()
        });
        Ok(Self {
            path: path.to_path_buf(),
            name,
        })
    }
}

fn convert_cigar(cigar: &Cigar) -> CigarOp {
    match *cigar {
        Cigar::Match(l) => CigarOp::Match(l),
        Cigar::Ins(l) => CigarOp::Ins(l),
        Cigar::Del(l) => CigarOp::Del(l),
        Cigar::RefSkip(l) => CigarOp::RefSkip(l),
        Cigar::SoftClip(l) => CigarOp::SoftClip(l),
        Cigar::HardClip(l) => CigarOp::HardClip(l),
        Cigar::Pad(l) => CigarOp::Pad(l),
        Cigar::Equal(l) => CigarOp::Equal(l),
        Cigar::Diff(l) => CigarOp::Diff(l),
    }
}

fn convert_record(record: &bam::Record, chrom: &str) -> ReadRecord {
    ReadRecord {
        name: String::from_utf8_lossy(record.qname()).into_owned(),
        chrom: chrom.to_string(),
        pos: (record.pos() + 1) as u64,
        mapq: record.mapq(),
        flags: ReadFlags(record.flags()),
        cigar: record.cigar().iter().map(convert_cigar).collect(),
        seq: record.seq().as_bytes(),
        qual: record.qual().to_vec(),
        mate_pos: if record.mpos() >= 0 { (record.mpos() + 1) as u64 } else { 0 },
        template_len: record.insert_size(),
    }
}

struct BamRecords {
    reader: bam::IndexedReader,
    record: bam::Record,
    chrom: String,
    source: String,
}

impl Iterator for BamRecords {
    type Item = Result<ReadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read(&mut self.record) {
                None => return None,
                Some(Err(e)) => {
                    return Some(Err(CtdnaError::source_unavailable(&self.source, e.to_string())))
                }
                Some(Ok(())) => {
                    if self.record.is_unmapped() {
                        continue;
                    }
                    return Some(Ok(convert_record(&self.record, &self.chrom)));
                }
            }
        }
    }
}

impl AlignmentSource for BamSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn records_overlapping(&self, chrom: &str, start: u64, end: u64) -> Result<RecordIter<'_>> {
        let source = self.path.display().to_string();
        let mut reader = bam::IndexedReader::from_path(&self.path)
            .map_err(|e| CtdnaError::source_unavailable(&source, e.to_string()))?;
        let fetch_start = start.saturating_sub(1) as i64;
        reader
            .fetch((chrom, fetch_start, end as i64))
            .map_err(|e| CtdnaError::source_unavailable(&source, format!("{}:{}-{}: {}", chrom, start, end, e)))?;

        Ok(Box::new(BamRecords {
            reader,
            record: bam::Record::new(),
            chrom: chrom.to_string(),
            source,
        }))
    }
}
