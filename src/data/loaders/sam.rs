// sam.rs - SAM text loader for in-memory alignment sources

use crate::data::read::{parse_cigar, ReadFlags, ReadRecord};
use crate::data::source::MemorySource;
use crate::error::{CtdnaError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse one SAM alignment line. Unmapped records return `None`.
fn parse_sam_line(line: &str, path: &str, line_num: usize) -> Result<Option<ReadRecord>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(CtdnaError::parse(
            path,
            line_num,
            format!("expected at least 11 SAM fields, found {}", fields.len()),
        ));
    }

    let number = |idx: usize, what: &str| -> Result<i64> {
        fields[idx]
            .parse::<i64>()
            .map_err(|_| CtdnaError::parse(path, line_num, format!("invalid {} '{}'", what, fields[idx])))
    };

    let flags = ReadFlags(number(1, "FLAG")? as u16);
    let chrom = fields[2];
    let pos = number(3, "POS")?;
    if flags.is_unmapped() || chrom == "*" || pos <= 0 {
        return Ok(None);
    }

    let mapq = number(4, "MAPQ")?.clamp(0, 255) as u8;
    let cigar = parse_cigar(fields[5]).map_err(|e| CtdnaError::parse(path, line_num, e.to_string()))?;
    let mate_pos = number(7, "PNEXT")?.max(0) as u64;
    let template_len = number(8, "TLEN")?;

    let seq: Vec<u8> = if fields[9] == "*" {
        Vec::new()
    } else {
        fields[9].bytes().map(|b| b.to_ascii_uppercase()).collect()
    };
    let qual: Vec<u8> = if fields[10] == "*" {
        vec![0; seq.len()]
    } else {
        fields[10].bytes().map(|b| b.saturating_sub(33)).collect()
    };
    if qual.len() != seq.len() {
        return Err(CtdnaError::parse(path, line_num, "SEQ and QUAL lengths differ"));
    }

    Ok(Some(ReadRecord {
        name: fields[0].to_string(),
        chrom: chrom.to_string(),
        pos: pos as u64,
        mapq,
        flags,
        cigar,
        seq,
        qual,
        mate_pos,
        template_len,
    }))
}

impl MemorySource {
    /// Load every mapped alignment of a SAM file. The source is named after
    /// the file stem unless `name` is given.
    pub fn from_sam(file_path: &Path, name: Option<&str>) -> Result<Self> {
        let display = file_path.display().to_string();
        let file = File::open(file_path).map_err(|e| CtdnaError::SourceUnavailable {
            source_name: display.clone(),
            reason: e.to_string(),
        })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut skipped_unmapped = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| CtdnaError::io(e, file_path))?;
            if line.is_empty() || line.starts_with('@') {
                continue;
            }
            match parse_sam_line(&line, &display, idx + 1)? {
                Some(record) => records.push(record),
                None => skipped_unmapped += 1,
            }
        }

        let source_name = name.map(|s| s.to_string()).unwrap_or_else(|| {
            file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sample")
                .to_string()
        });
        log::info!(
            "loaded {} alignments from {} ({} unmapped skipped)",
            records.len(),
            display,
            skipped_unmapped
        );
        Ok(MemorySource::new(&source_name, records))
    }
}
