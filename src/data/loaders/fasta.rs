// fasta.rs - Reference genome loader

use crate::data::source::{MemoryReference, ReferenceLookup};
use crate::error::{CtdnaError, Result};
use bio::io::fasta;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Whole reference genome loaded from a FASTA file
#[derive(Debug, Clone)]
pub struct FastaReference {
    inner: MemoryReference,
    path: String,
}

impl FastaReference {
    pub fn from_file(fasta_path: &Path) -> Result<Self> {
        let file = File::open(fasta_path).map_err(|e| CtdnaError::io(e, fasta_path))?;
        let reader = fasta::Reader::new(BufReader::new(file));
        let mut inner = MemoryReference::new();

        for record_result in reader.records() {
            let record = record_result.map_err(|e| {
                CtdnaError::parse(fasta_path.display().to_string(), 0, format!("invalid FASTA record: {}", e))
            })?;
            inner.add_sequence(record.id(), record.seq().to_vec());
        }

        let (contigs, bases) = inner.get_stats();
        log::info!(
            "reference {}: {} contigs, {} bases",
            fasta_path.display(),
            contigs,
            bases
        );
        Ok(Self {
            inner,
            path: fasta_path.display().to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ReferenceLookup for FastaReference {
    fn base_at(&self, chrom: &str, pos: u64) -> Option<u8> {
        self.inner.base_at(chrom, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_fasta_reference() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">chr1 test contig").unwrap();
        writeln!(file, "ACGTAC").unwrap();
        writeln!(file, "GTTT").unwrap();
        writeln!(file, ">chr2").unwrap();
        writeln!(file, "gggg").unwrap();
        file.flush().unwrap();

        let reference = FastaReference::from_file(file.path()).unwrap();
        assert_eq!(reference.base_at("chr1", 1), Some(b'A'));
        assert_eq!(reference.base_at("chr1", 7), Some(b'G'));
        assert_eq!(reference.base_at("chr1", 10), Some(b'T'));
        assert_eq!(reference.base_at("chr2", 2), Some(b'G'));
        assert_eq!(reference.base_at("chr3", 1), None);
    }
}
