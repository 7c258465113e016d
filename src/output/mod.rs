// mod.rs - Output formatters module

use crate::core::background::BackgroundRate;
use crate::core::blacklist::{BackgroundPanel, BlackList};
use crate::core::pipeline::SampleReport;
use crate::fragmentomics::{FragmentHistogram, FragmentRecord, RegionSummary, WpsWindow};
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

type TsvWriter = csv::Writer<BufWriter<File>>;

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)
                .map_err(|e| format!("Failed to create parent directory '{}': {}", parent.display(), e))?;
        }
    }
    Ok(())
}

/// Open `file_path`, write the comment header and hand back a tab-separated writer
fn open_table(file_path: &str, command_line: &str) -> Result<TsvWriter, String> {
    ensure_parent_dir(file_path)?;
    let file = File::create(file_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Command: {}", command_line).map_err(|e| format!("Write error: {}", e))?;
    writeln!(writer, "# Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))
        .map_err(|e| format!("Write error: {}", e))?;
    writeln!(writer, "# ctdna v{}", env!("CARGO_PKG_VERSION")).map_err(|e| format!("Write error: {}", e))?;

    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer))
}

fn finish(mut writer: TsvWriter) -> Result<(), String> {
    writer.flush().map_err(|e| format!("Flush error: {}", e))
}

fn write_row<I, S>(writer: &mut TsvWriter, fields: I) -> Result<(), String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    writer.write_record(fields).map_err(|e| format!("Write error: {}", e))
}

fn na(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_else(|| "NA".to_string())
}

/// Write one summary row per sample
pub fn write_test_report(file_path: &str, reports: &[SampleReport], command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    write_row(
        &mut writer,
        [
            "sample",
            "status",
            "p_value",
            "alt_reads",
            "informative_reads",
            "pooled_rate",
            "background_rate",
            "background_depth",
            "units",
            "n_simulations",
            "seed",
        ],
    )?;
    for report in reports {
        write_row(
            &mut writer,
            [
                report.sample.clone(),
                report.result.status.to_string(),
                format!("{:.6}", report.result.p_value),
                report.alt_reads.to_string(),
                report.informative_reads.to_string(),
                format!("{:.6e}", report.pooled_rate),
                format!("{:.6e}", report.background.rate),
                report.background.total_depth.to_string(),
                report.units.len().to_string(),
                report.result.n_simulations.to_string(),
                report.result.seed.to_string(),
            ],
        )?;
    }
    finish(writer)?;
    println!("✅ Test results written to: {}", file_path);
    Ok(())
}

/// Write the per-unit evidence rows of every sample
pub fn write_unit_table(file_path: &str, reports: &[SampleReport], command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    write_row(
        &mut writer,
        ["sample", "unit", "chrom", "members", "ref_reads", "alt_reads", "purification_p", "rate"],
    )?;
    for report in reports {
        for unit in &report.units {
            write_row(
                &mut writer,
                [
                    report.sample.clone(),
                    unit.id.clone(),
                    unit.chrom.clone(),
                    unit.members.to_string(),
                    unit.ref_reads.to_string(),
                    unit.alt_reads.to_string(),
                    format!("{:.4}", unit.purification_probability),
                    format!("{:.6e}", unit.rate),
                ],
            )?;
        }
    }
    finish(writer)?;
    println!("✅ Unit evidence written to: {}", file_path);
    Ok(())
}

/// Aggregate and per-substitution background rates per sample
pub fn write_background(
    file_path: &str,
    rates: &[(String, BackgroundRate)],
    command_line: &str,
) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    write_row(&mut writer, ["sample", "class", "depth", "alt", "rate"])?;
    for (sample, rate) in rates {
        write_row(
            &mut writer,
            [
                sample.clone(),
                "all".to_string(),
                rate.total_depth.to_string(),
                rate.total_alt.to_string(),
                format!("{:.6e}", rate.rate),
            ],
        )?;
        for (class, counts) in &rate.per_substitution {
            write_row(
                &mut writer,
                [
                    sample.clone(),
                    class.to_string(),
                    counts.depth.to_string(),
                    counts.alt.to_string(),
                    counts.rate().map(|r| format!("{:.6e}", r)).unwrap_or_else(|| "NA".to_string()),
                ],
            )?;
        }
    }
    finish(writer)?;
    println!("✅ Background rates written to: {}", file_path);
    Ok(())
}

/// Long-format panel, one line per (site, sample); readable by `BackgroundPanel::from_tsv`
pub fn write_panel(file_path: &str, panel: &BackgroundPanel, command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    let mut rows = 0usize;
    for record in panel.records() {
        writer.serialize(record).map_err(|e| format!("Write error: {}", e))?;
        rows += 1;
    }
    if rows == 0 {
        write_row(&mut writer, ["chrom", "pos", "ref", "alt", "sample", "depth", "alt_count"])?;
    }
    finish(writer)?;
    println!("✅ Background panel written to: {} ({} sites)", file_path, panel.len());
    Ok(())
}

/// Blacklist table with an `alt` column for variant blacklists
pub fn write_blacklist(file_path: &str, blacklist: &BlackList, command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    match blacklist {
        BlackList::Loci(loci) => {
            write_row(&mut writer, ["chrom", "pos"])?;
            for (chrom, pos) in loci {
                write_row(&mut writer, [chrom.clone(), pos.to_string()])?;
            }
        }
        BlackList::Variants(variants) => {
            write_row(&mut writer, ["chrom", "pos", "alt"])?;
            for (chrom, pos, alt) in variants {
                write_row(&mut writer, [chrom.clone(), pos.to_string(), (*alt as char).to_string()])?;
            }
        }
    }
    finish(writer)?;
    println!(
        "✅ Blacklist written to: {} ({} {})",
        file_path,
        blacklist.len(),
        blacklist.mode_name()
    );
    Ok(())
}

pub fn write_fragments(file_path: &str, fragments: &[FragmentRecord], command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    write_row(
        &mut writer,
        ["chrom", "start", "end", "size", "fr_orientation", "mutation_support", "name"],
    )?;
    for f in fragments {
        let support = match f.mutation_support {
            Some(true) => "alt",
            Some(false) => "ref",
            None => "NA",
        };
        write_row(
            &mut writer,
            [
                f.chrom.clone(),
                f.start.to_string(),
                f.end.to_string(),
                f.size.to_string(),
                f.fr_orientation.to_string(),
                support.to_string(),
                f.name.clone(),
            ],
        )?;
    }
    finish(writer)?;
    println!("✅ {} fragments written to: {}", fragments.len(), file_path);
    Ok(())
}

pub fn write_histogram(file_path: &str, histogram: &FragmentHistogram, command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    write_row(&mut writer, ["lower", "upper", "count", "fraction"])?;
    for bin in &histogram.bins {
        write_row(
            &mut writer,
            [
                bin.lower.to_string(),
                bin.upper.to_string(),
                bin.count.to_string(),
                na(bin.fraction),
            ],
        )?;
    }
    finish(writer)?;
    println!("✅ Histogram written to: {} ({} bins)", file_path, histogram.bins.len());
    Ok(())
}

/// One row per region, one column per statistic; missing values as `NA`
pub fn write_region_summaries(
    file_path: &str,
    summaries: &[RegionSummary],
    statistic_names: &[String],
    command_line: &str,
) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    let mut header = vec!["chrom".to_string(), "start".to_string(), "end".to_string(), "n_fragments".to_string()];
    header.extend(statistic_names.iter().cloned());
    write_row(&mut writer, &header)?;

    for summary in summaries {
        let mut row = vec![
            summary.region.chrom.clone(),
            summary.region.start.to_string(),
            summary.region.end.to_string(),
            summary.n_fragments.to_string(),
        ];
        row.extend(summary.values.iter().map(|(_, v)| na(*v)));
        write_row(&mut writer, &row)?;
    }
    finish(writer)?;
    println!("✅ Region summaries written to: {}", file_path);
    Ok(())
}

pub fn write_wps(file_path: &str, windows: &[WpsWindow], command_line: &str) -> Result<(), String> {
    let mut writer = open_table(file_path, command_line)?;
    for window in windows {
        writer.serialize(window).map_err(|e| format!("Write error: {}", e))?;
    }
    if windows.is_empty() {
        write_row(
            &mut writer,
            [
                "chrom",
                "start",
                "end",
                "n_reads",
                "n_spanning",
                "n_fragment_ends_adjusted",
                "wps_adjusted",
            ],
        )?;
    }
    finish(writer)?;
    println!("✅ WPS written to: {} ({} windows)", file_path, windows.len());
    Ok(())
}

/// Pretty-printed JSON dump of any report
pub fn write_json<T: Serialize>(file_path: &str, value: &T) -> Result<(), String> {
    ensure_parent_dir(file_path)?;
    let file = File::create(file_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| format!("Failed to write JSON '{}': {}", file_path, e))?;
    println!("✅ JSON report written to: {}", file_path);
    Ok(())
}
