// tables.rs - Mutation and target table loaders

use crate::data::mutation::{check_unique, Mutation};
use crate::data::region::TargetRegion;
use crate::error::{CtdnaError, Result};
use regex::Regex;
use std::path::Path;

/// Header aliases accepted for the required mutation columns
const CHROM_PATTERN: &str = r"(?i)^#?(chrom|chr|chromosome|seqnames|contig)$";
const POS_PATTERN: &str = r"(?i)^(pos|position|start)$";
const REF_PATTERN: &str = r"(?i)^(ref|reference|ref_allele)$";
const ALT_PATTERN: &str = r"(?i)^(alt|alternate|alt_allele)$";

fn find_column(headers: &[String], pattern: &str, what: &str, path: &str) -> Result<usize> {
    let regex = Regex::new(pattern).map_err(|e| CtdnaError::parse(path, 1, e.to_string()))?;
    headers
        .iter()
        .position(|h| regex.is_match(h.trim()))
        .ok_or_else(|| CtdnaError::parse(path, 1, format!("missing required column '{}'", what)))
}

fn tsv_reader(file_path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(file_path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => CtdnaError::io(io, file_path),
            other => CtdnaError::parse(file_path.display().to_string(), 0, format!("{:?}", other)),
        })
}

/// Load a tab-separated mutation table.
///
/// Required columns are chromosome, position, reference and alternate
/// (common aliases accepted). The phase-group column is only read when its
/// name is given explicitly.
pub fn load_mutations(file_path: &Path, phase_column: Option<&str>) -> Result<Vec<Mutation>> {
    let path = file_path.display().to_string();
    let mut reader = tsv_reader(file_path)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CtdnaError::parse(&path, 1, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let chrom_idx = find_column(&headers, CHROM_PATTERN, "chrom", &path)?;
    let pos_idx = find_column(&headers, POS_PATTERN, "pos", &path)?;
    let ref_idx = find_column(&headers, REF_PATTERN, "ref", &path)?;
    let alt_idx = find_column(&headers, ALT_PATTERN, "alt", &path)?;
    let phase_idx = match phase_column {
        Some(name) => Some(
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CtdnaError::parse(&path, 1, format!("phase column '{}' not found", name)))?,
        ),
        None => None,
    };

    let mut mutations = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line = idx + 2;
        let row = row.map_err(|e| CtdnaError::parse(&path, line, e.to_string()))?;
        let field = |i: usize| -> Result<&str> {
            row.get(i)
                .map(|s| s.trim())
                .ok_or_else(|| CtdnaError::parse(&path, line, format!("missing column {}", i + 1)))
        };

        let raw_pos = field(pos_idx)?;
        let pos = raw_pos
            .parse::<u64>()
            .map_err(|_| CtdnaError::parse(&path, line, format!("invalid position '{}'", raw_pos)))?;
        let phase_id = match phase_idx {
            Some(i) => row.get(i).map(|s| s.trim().to_string()),
            None => None,
        };
        mutations.push(Mutation::new(
            field(chrom_idx)?,
            pos,
            field(ref_idx)?,
            field(alt_idx)?,
            phase_id,
        )?);
    }

    check_unique(&mutations)?;
    log::info!("loaded {} mutations from {}", mutations.len(), path);
    Ok(mutations)
}

/// Load target regions. `.bed` files are 0-based half-open without a header;
/// anything else is a tab-separated chrom/start/end table, 1-based closed.
pub fn load_targets(file_path: &Path) -> Result<Vec<TargetRegion>> {
    let path = file_path.display().to_string();
    let is_bed = file_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("bed"))
        .unwrap_or(false);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(!is_bed)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(file_path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => CtdnaError::io(io, file_path),
            other => CtdnaError::parse(&path, 0, format!("{:?}", other)),
        })?;

    let mut regions = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line = if is_bed { idx + 1 } else { idx + 2 };
        let row = row.map_err(|e| CtdnaError::parse(&path, line, e.to_string()))?;
        let chrom = row.get(0).unwrap_or("").trim();
        if chrom.is_empty() || chrom.starts_with("track") || chrom.starts_with("browser") {
            continue;
        }
        if row.len() < 3 {
            return Err(CtdnaError::parse(&path, line, "expected chrom, start and end"));
        }
        let coord = |i: usize| -> Result<u64> {
            let raw = row.get(i).unwrap_or("").trim();
            raw.parse::<u64>()
                .map_err(|_| CtdnaError::parse(&path, line, format!("invalid coordinate '{}'", raw)))
        };
        let region = if is_bed {
            TargetRegion::from_bed(chrom, coord(1)?, coord(2)?)?
        } else {
            TargetRegion::new(chrom, coord(1)?, coord(2)?)?
        };
        regions.push(region);
    }

    log::info!("loaded {} regions from {}", regions.len(), path);
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_mutations_with_aliases_and_phase() {
        let file = write_temp(
            ".tsv",
            "CHROM\tPosition\tREF\tALT\tgroup\nchr1\t100\tC\tT\tg1\nchr1\t110\tG\tA\tg1\nchr2\t50\tA\tC\t\n",
        );
        let mutations = load_mutations(file.path(), Some("group")).unwrap();
        assert_eq!(mutations.len(), 3);
        assert_eq!(mutations[0].phase_id.as_deref(), Some("g1"));
        assert!(mutations[2].phase_id.is_none());

        let without_phase = load_mutations(file.path(), None).unwrap();
        assert!(without_phase.iter().all(|m| m.phase_id.is_none()));
    }

    #[test]
    fn test_load_mutations_rejects_indels_and_missing_columns() {
        let indel = write_temp(".tsv", "chrom\tpos\tref\talt\nchr1\t100\tC\tCT\n");
        assert!(matches!(
            load_mutations(indel.path(), None),
            Err(CtdnaError::InvalidMutation { .. })
        ));

        let no_alt = write_temp(".tsv", "chrom\tpos\tref\nchr1\t100\tC\n");
        assert!(matches!(load_mutations(no_alt.path(), None), Err(CtdnaError::Parse { .. })));

        let missing_phase = write_temp(".tsv", "chrom\tpos\tref\talt\nchr1\t100\tC\tT\n");
        assert!(load_mutations(missing_phase.path(), Some("phase")).is_err());
    }

    #[test]
    fn test_load_targets_bed_and_tsv() {
        let bed = write_temp(".bed", "track name=panel\nchr1\t99\t200\nchr2\t0\t10\textra\n");
        let regions = load_targets(bed.path()).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], TargetRegion::new("chr1", 100, 200).unwrap());
        assert_eq!(regions[1].start, 1);

        let tsv = write_temp(".tsv", "chrom\tstart\tend\nchr1\t100\t200\n");
        let regions = load_targets(tsv.path()).unwrap();
        assert_eq!(regions[0], TargetRegion::new("chr1", 100, 200).unwrap());

        let inverted = write_temp(".tsv", "chrom\tstart\tend\nchr1\t200\t100\n");
        assert!(matches!(
            load_targets(inverted.path()),
            Err(CtdnaError::InvalidRegion { .. })
        ));
    }
}
