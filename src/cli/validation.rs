// validation.rs - Input validation utilities

use crate::cli::args::{Args, Command, FilterOptions};
use crate::core::blacklist::BlacklistThresholds;
use crate::core::filters::{ReadFilter, StrandFilter};
use crate::core::montecarlo::MonteCarloConfig;
use crate::fragmentomics::{BinSpec, FragmentHistogram, SizeRange, SummaryFn, WpsConfig};
use std::path::Path;
use std::str::FromStr;

/// Default histogram bin width in bp
const DEFAULT_BINS: &str = "10";
const DEFAULT_STATS: &str = "mean,sd,median,count";

/// Typed settings resolved from the (merged) command line
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub read_filter: ReadFilter,
    pub monte_carlo: MonteCarloConfig,
    pub thresholds: BlacklistThresholds,
    pub sizes: SizeRange,
    pub bins: BinSpec,
    pub statistics: Vec<SummaryFn>,
    pub wps: WpsConfig,
}

/// Validate all command line arguments
pub fn validate_args(args: &Args) -> Result<ValidationResult, String> {
    if args.threads == Some(0) {
        return Err("--threads must be at least 1".to_string());
    }

    let read_filter = match args.command.filter_options() {
        Some(options) => build_read_filter(&options)?,
        None => ReadFilter::default(),
    };

    let mut result = ValidationResult {
        read_filter,
        monte_carlo: MonteCarloConfig::default(),
        thresholds: BlacklistThresholds::default(),
        sizes: SizeRange::default(),
        bins: BinSpec::from_str(DEFAULT_BINS)?,
        statistics: parse_statistics(DEFAULT_STATS)?,
        wps: WpsConfig::default(),
    };

    match &args.command {
        Command::Test(cmd) => {
            check_alignments(&cmd.reads)?;
            check_input(cmd.mutations.as_deref(), "--mutations")?;
            check_input(cmd.targets.as_deref(), "--targets")?;
            check_optional_input(cmd.reference.as_deref(), "--reference")?;
            check_optional_input(cmd.blacklist.as_deref(), "--blacklist")?;
            require_output(cmd.output.as_deref())?;

            let defaults = MonteCarloConfig::default();
            result.monte_carlo = MonteCarloConfig {
                n_simulations: cmd.n_simulations.unwrap_or(defaults.n_simulations),
                seed: cmd.seed,
                informative_reads_threshold: cmd
                    .informative_reads_threshold
                    .unwrap_or(defaults.informative_reads_threshold),
                significance_level: cmd.significance_level.unwrap_or(defaults.significance_level),
            };
            result.monte_carlo.validate().map_err(|e| e.to_string())?;
        }
        Command::Background(cmd) => {
            check_alignments(&cmd.reads)?;
            check_input(cmd.targets.as_deref(), "--targets")?;
            check_optional_input(cmd.mutations.as_deref(), "--mutations")?;
            check_optional_input(cmd.reference.as_deref(), "--reference")?;
            check_optional_input(cmd.blacklist.as_deref(), "--blacklist")?;
            require_output(cmd.output.as_deref())?;
        }
        Command::Panel(cmd) => {
            check_alignments(&cmd.reads)?;
            check_input(cmd.targets.as_deref(), "--targets")?;
            check_optional_input(cmd.reference.as_deref(), "--reference")?;
            require_output(cmd.output.as_deref())?;
        }
        Command::Blacklist(cmd) => {
            check_input(cmd.panel.as_deref(), "--panel")?;
            require_output(cmd.output.as_deref())?;

            result.thresholds = BlacklistThresholds {
                mean_vaf_quantile: cmd.mean_vaf_quantile,
                min_samples_one_read: cmd.min_samples_one_read,
                min_samples_two_reads: cmd.min_samples_two_reads,
            };
            if result.thresholds == BlacklistThresholds::default() {
                return Err(
                    "No blacklist criterion set. Use --mean-vaf-quantile, --min-samples-one-read or --min-samples-two-reads"
                        .to_string(),
                );
            }
            result.thresholds.validate().map_err(|e| e.to_string())?;
        }
        Command::Fragments(cmd) => {
            check_alignments(single(&cmd.reads))?;
            check_input(cmd.regions.as_deref(), "--regions")?;
            check_optional_input(cmd.mutations.as_deref(), "--mutations")?;
            require_output(cmd.output.as_deref())?;

            result.sizes = size_range(cmd.min_size, cmd.max_size, SizeRange::default())?;
            if let Some(bins) = &cmd.bins {
                result.bins = BinSpec::from_str(bins)?;
            }
            if cmd.histogram.is_some() {
                // Reject unusable bins before any alignment is read
                FragmentHistogram::new(result.sizes, &result.bins).map_err(|e| e.to_string())?;
            }
        }
        Command::Summarize(cmd) => {
            check_alignments(single(&cmd.reads))?;
            check_input(cmd.regions.as_deref(), "--regions")?;
            require_output(cmd.output.as_deref())?;

            result.sizes = size_range(cmd.min_size, cmd.max_size, SizeRange::default())?;
            if let Some(stats) = &cmd.stats {
                result.statistics = parse_statistics(stats)?;
            }
        }
        Command::Wps(cmd) => {
            check_alignments(single(&cmd.reads))?;
            check_input(cmd.regions.as_deref(), "--regions")?;
            require_output(cmd.output.as_deref())?;

            let defaults = WpsConfig::default();
            result.wps = WpsConfig {
                window_size: cmd.window_size.unwrap_or(defaults.window_size),
                step_size: cmd.step_size.unwrap_or(defaults.step_size),
                sizes: size_range(cmd.min_size, cmd.max_size, defaults.sizes)?,
            };
            result.wps.validate().map_err(|e| e.to_string())?;
            // Fragments outside the WPS size range are never needed
            result.sizes = result.wps.sizes;
        }
        Command::GenerateConfig(_) => {}
    }

    Ok(result)
}

/// Apply CLI filter options on top of the default read filter
pub fn build_read_filter(options: &FilterOptions) -> Result<ReadFilter, String> {
    let defaults = ReadFilter::default();
    let strand = match &options.strand {
        Some(s) => StrandFilter::from_str(s)?,
        None => defaults.strand,
    };
    Ok(ReadFilter {
        min_base_quality: options.min_base_quality.unwrap_or(defaults.min_base_quality),
        min_mapq: options.min_mapq.unwrap_or(defaults.min_mapq),
        require_proper_pair: !options.allow_improper_pairs,
        strand,
        simple_cigar_only: options.simple_cigar_only,
        drop_duplicates: !options.keep_duplicates,
        end_trim: options.end_trim.unwrap_or(defaults.end_trim),
    })
}

/// Parse a comma separated list of statistic names
pub fn parse_statistics(list: &str) -> Result<Vec<SummaryFn>, String> {
    let statistics = list
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SummaryFn::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if statistics.is_empty() {
        return Err("--stats must name at least one statistic".to_string());
    }
    Ok(statistics)
}

fn size_range(min: Option<u64>, max: Option<u64>, defaults: SizeRange) -> Result<SizeRange, String> {
    SizeRange::new(min.unwrap_or(defaults.min_size), max.unwrap_or(defaults.max_size)).map_err(|e| e.to_string())
}

fn single(reads: &Option<String>) -> &[String] {
    match reads {
        Some(path) => std::slice::from_ref(path),
        None => &[],
    }
}

fn require_output(output: Option<&str>) -> Result<(), String> {
    match output {
        Some(_) => Ok(()),
        None => Err("--output is required".to_string()),
    }
}

fn check_input(path: Option<&str>, option: &str) -> Result<(), String> {
    match path {
        Some(path) => check_optional_input(Some(path), option),
        None => Err(format!("{} is required", option)),
    }
}

fn check_optional_input(path: Option<&str>, option: &str) -> Result<(), String> {
    if let Some(path) = path {
        if !Path::new(path).exists() {
            return Err(format!("{} file not found: {}", option, path));
        }
    }
    Ok(())
}

/// At least one readable alignment file of a supported format
fn check_alignments(reads: &[String]) -> Result<(), String> {
    if reads.is_empty() {
        return Err("--reads is required".to_string());
    }
    for path in reads {
        check_optional_input(Some(path), "--reads")?;
        let lower = path.to_lowercase();
        if lower.ends_with(".bam") {
            if !cfg!(feature = "htslib") {
                return Err(format!(
                    "BAM input '{}' needs the htslib feature; rebuild with --features htslib or convert to SAM",
                    path
                ));
            }
        } else if !lower.ends_with(".sam") {
            return Err(format!("Unsupported alignment format '{}'. Use .sam or .bam", path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["ctdna"], args).unwrap()
    }

    #[test]
    fn test_read_filter_from_options() {
        let options = FilterOptions {
            min_mapq: Some(10),
            strand: Some("reverse".to_string()),
            keep_duplicates: true,
            ..Default::default()
        };
        let filter = build_read_filter(&options).unwrap();
        assert_eq!(filter.min_mapq, 10);
        assert_eq!(filter.min_base_quality, ReadFilter::default().min_base_quality);
        assert_eq!(filter.strand, StrandFilter::Reverse);
        assert!(!filter.drop_duplicates);
        assert!(filter.require_proper_pair);

        let bad = FilterOptions {
            strand: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(build_read_filter(&bad).is_err());
    }

    #[test]
    fn test_statistics_list() {
        let stats = parse_statistics("mean, median ,count").unwrap();
        let names: Vec<&str> = stats.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["mean", "median", "count"]);
        assert!(parse_statistics(" , ").is_err());
        assert!(parse_statistics("mean,mode").is_err());
    }

    #[test]
    fn test_missing_inputs_rejected() {
        assert!(validate_args(&parse(&["test", "--output", "out.tsv"])).is_err());
        assert!(validate_args(&parse(&["wps", "--reads", "missing.sam", "--output", "w.tsv"])).is_err());
    }

    #[test]
    fn test_blacklist_settings() {
        let dir = tempfile::tempdir().unwrap();
        let panel = dir.path().join("panel.tsv");
        std::fs::write(&panel, "chrom\tpos\tref\talt\tsample\tdepth\talt_count\n").unwrap();
        let panel = panel.to_str().unwrap();

        let none = parse(&["blacklist", "--panel", panel, "--output", "bl.tsv"]);
        assert!(validate_args(&none).is_err());

        let out_of_range = parse(&["blacklist", "--panel", panel, "--output", "bl.tsv", "--mean-vaf-quantile", "1.5"]);
        assert!(validate_args(&out_of_range).is_err());

        let ok = parse(&["blacklist", "--panel", panel, "--output", "bl.tsv", "--min-samples-one-read", "3"]);
        let result = validate_args(&ok).unwrap();
        assert_eq!(result.thresholds.min_samples_one_read, Some(3));
        assert_eq!(result.thresholds.mean_vaf_quantile, None);
    }

    #[test]
    fn test_wps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let reads = dir.path().join("s1.sam");
        let regions = dir.path().join("regions.bed");
        std::fs::write(&reads, "@HD\tVN:1.6\n").unwrap();
        std::fs::write(&regions, "chr1\t0\t1000\n").unwrap();
        let reads = reads.to_str().unwrap();
        let regions = regions.to_str().unwrap();

        let args = parse(&[
            "wps", "--reads", reads, "--regions", regions, "--output", "w.tsv", "--window-size", "60",
        ]);
        let result = validate_args(&args).unwrap();
        assert_eq!(result.wps.window_size, 60);
        assert_eq!(result.wps.step_size, 1);
        assert_eq!(result.sizes, result.wps.sizes);

        let zero_step = parse(&[
            "wps", "--reads", reads, "--regions", regions, "--output", "w.tsv", "--step-size", "0",
        ]);
        assert!(validate_args(&zero_step).is_err());

        let inverted = parse(&[
            "wps", "--reads", reads, "--regions", regions, "--output", "w.tsv", "--min-size", "200",
        ]);
        assert!(validate_args(&inverted).is_err());
    }
}
