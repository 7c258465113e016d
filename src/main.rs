// main.rs - CLI entry point

use std::path::Path;
use std::time::Instant;

use ctdna::cli::args::{
    BackgroundArgs, BlacklistArgs, FragmentsArgs, PanelArgs, SummarizeArgs, TestArgs, WpsArgs,
};
use ctdna::cli::{validate_args, Command, Config, ValidationResult};
use ctdna::output;
use ctdna::prelude::*;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args: ctdna::Args = argh::from_env();
    let command_line = std::env::args().collect::<Vec<String>>().join(" ");

    // Handle generate config first
    if let Command::GenerateConfig(cmd) = &args.command {
        let sample_config = Config::generate_sample();
        match &cmd.output {
            Some(path) => {
                std::fs::write(path, &sample_config)
                    .map_err(|e| format!("Failed to write config file '{}': {}", path, e))?;
                println!("📄 Sample configuration written to: {}", path);
            }
            None => {
                println!("{}", sample_config);
                println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
            }
        }
        return Ok(());
    }

    if let Some(config_path) = args.config.clone() {
        args = args.with_config_file(&config_path)?;
    }

    let validation = validate_args(&args)?;

    println!("🚀 {} ({})", ctdna::get_info(), args.command.name());

    // Configure thread pool
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("🧵 Threads: {}", n);
    } else {
        println!("🧵 Threads: {} (auto-detected)", rayon::current_num_threads());
    }

    let start = Instant::now();
    match &args.command {
        Command::Test(cmd) => run_test(cmd, &validation, &command_line)?,
        Command::Background(cmd) => run_background(cmd, &validation, &command_line)?,
        Command::Panel(cmd) => run_panel(cmd, &validation, &command_line)?,
        Command::Blacklist(cmd) => run_blacklist(cmd, &validation, &command_line)?,
        Command::Fragments(cmd) => run_fragments(cmd, &validation, &command_line)?,
        Command::Summarize(cmd) => run_summarize(cmd, &validation, &command_line)?,
        Command::Wps(cmd) => run_wps(cmd, &validation, &command_line)?,
        Command::GenerateConfig(_) => {}
    }
    println!("⏱️  Total time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Open a SAM file in memory, or an indexed BAM with the htslib feature
fn open_source(path: &str) -> Result<Box<dyn AlignmentSource>, String> {
    if path.to_lowercase().ends_with(".bam") {
        #[cfg(feature = "htslib")]
        {
            let source = ctdna::data::loaders::BamSource::open(Path::new(path), None).map_err(|e| e.to_string())?;
            return Ok(Box::new(source));
        }
        #[cfg(not(feature = "htslib"))]
        return Err(format!("BAM input '{}' needs the htslib feature", path));
    }
    let source = MemorySource::from_sam(Path::new(path), None).map_err(|e| e.to_string())?;
    println!(
        "📥 Loaded {} alignments on {} chromosomes from: {}",
        source.len(),
        source.chromosomes().len(),
        path
    );
    Ok(Box::new(source))
}

fn open_sources(paths: &[String]) -> Result<Vec<Box<dyn AlignmentSource>>, String> {
    paths.iter().map(|p| open_source(p)).collect()
}

fn required<'a>(value: &'a Option<String>, option: &str) -> Result<&'a str, String> {
    value.as_deref().ok_or_else(|| format!("{} is required", option))
}

fn load_reference(path: Option<&str>) -> Result<Option<FastaReference>, String> {
    match path {
        Some(path) => {
            let reference = FastaReference::from_file(Path::new(path)).map_err(|e| e.to_string())?;
            println!("🧬 Reference: {}", path);
            Ok(Some(reference))
        }
        None => Ok(None),
    }
}

fn load_blacklist(path: Option<&str>) -> Result<Option<BlackList>, String> {
    match path {
        Some(path) => {
            let blacklist = BlackList::from_tsv(Path::new(path)).map_err(|e| e.to_string())?;
            println!("🚫 Blacklist: {} {} from {}", blacklist.len(), blacklist.mode_name(), path);
            Ok(Some(blacklist))
        }
        None => Ok(None),
    }
}

fn load_regions(path: &str) -> Result<Vec<TargetRegion>, String> {
    let regions = load_targets(Path::new(path)).map_err(|e| e.to_string())?;
    println!("📍 Loaded {} regions from: {}", regions.len(), path);
    Ok(regions)
}

fn run_test(cmd: &TestArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let mutations = load_mutations(Path::new(required(&cmd.mutations, "--mutations")?), cmd.phase_column.as_deref())
        .map_err(|e| e.to_string())?;
    println!("🎯 Loaded {} mutations", mutations.len());
    let targets = load_regions(required(&cmd.targets, "--targets")?)?;
    let reference = load_reference(cmd.reference.as_deref())?;
    let blacklist = load_blacklist(cmd.blacklist.as_deref())?;

    let mut test = CtdnaTest::new(
        validation.read_filter.clone(),
        validation.monte_carlo.clone(),
        cmd.substitution_specific,
    );
    if let Some(reference) = &reference {
        test = test.with_reference(reference);
    }
    if let Some(blacklist) = &blacklist {
        test = test.with_blacklist(blacklist).map_err(|e| e.to_string())?;
    }

    let sources = open_sources(&cmd.reads)?;
    let sources: Vec<&dyn AlignmentSource> = sources.iter().map(|s| s.as_ref()).collect();
    println!(
        "🎲 Monte-Carlo: {} simulations, significance level {}",
        validation.monte_carlo.n_simulations, validation.monte_carlo.significance_level
    );

    let mut reports = Vec::new();
    for (sample, result) in test.run_batch(&sources, &mutations, &targets) {
        match result {
            Ok(report) => {
                println!(
                    "  {} {}: {}/{} alt/informative reads, p = {:.4} ({}, {})",
                    status_icon(report.result.status),
                    sample,
                    report.alt_reads,
                    report.informative_reads,
                    report.result.p_value,
                    report.result.status,
                    report.result.status.description()
                );
                reports.push(report);
            }
            Err(e) => eprintln!("⚠️  Skipping {}: {}", sample, e),
        }
    }
    if reports.is_empty() {
        return Err("No sample could be tested".to_string());
    }

    output::write_test_report(output_path, &reports, command_line)?;
    if let Some(path) = &cmd.units_output {
        output::write_unit_table(path, &reports, command_line)?;
    }
    if let Some(path) = &cmd.json {
        output::write_json(path, &reports)?;
    }
    Ok(())
}

fn status_icon(status: DetectionStatus) -> &'static str {
    match status {
        DetectionStatus::Positive => "🔴",
        DetectionStatus::Negative => "🟢",
        DetectionStatus::Undetermined => "🟡",
    }
}

fn run_background(cmd: &BackgroundArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let targets = load_regions(required(&cmd.targets, "--targets")?)?;
    let mutations = match &cmd.mutations {
        Some(path) => load_mutations(Path::new(path), None).map_err(|e| e.to_string())?,
        None => Vec::new(),
    };
    let reference = load_reference(cmd.reference.as_deref())?;
    let blacklist = load_blacklist(cmd.blacklist.as_deref())?;

    let mut estimator = BackgroundEstimator::new(&validation.read_filter, cmd.substitution_specific);
    if let Some(reference) = &reference {
        estimator = estimator.with_reference(reference);
    }
    if let Some(blacklist) = &blacklist {
        estimator = estimator.with_blacklist(blacklist).map_err(|e| e.to_string())?;
    }

    let mut rates = Vec::new();
    for source in open_sources(&cmd.reads)? {
        let rate = estimator
            .estimate(source.as_ref(), &targets, &mutations)
            .map_err(|e| e.to_string())?;
        println!(
            "  📊 {}: rate {:.3e} ({} alt / {} bases)",
            source.name(),
            rate.rate,
            rate.total_alt,
            rate.total_depth
        );
        rates.push((source.name().to_string(), rate));
    }

    output::write_background(output_path, &rates, command_line)
}

fn run_panel(cmd: &PanelArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let targets = load_regions(required(&cmd.targets, "--targets")?)?;
    let reference = load_reference(cmd.reference.as_deref())?;

    let sources = open_sources(&cmd.reads)?;
    let sources: Vec<&dyn AlignmentSource> = sources.iter().map(|s| s.as_ref()).collect();
    let panel = BackgroundPanel::build(
        &sources,
        &targets,
        &validation.read_filter,
        reference.as_ref().map(|r| r as &dyn ReferenceLookup),
        cmd.substitution_specific,
    )
    .map_err(|e| e.to_string())?;
    println!("🧪 Panel: {} sites across {} samples", panel.len(), panel.samples.len());

    output::write_panel(output_path, &panel, command_line)
}

fn run_blacklist(cmd: &BlacklistArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let panel_path = required(&cmd.panel, "--panel")?;
    let panel = BackgroundPanel::from_tsv(Path::new(panel_path)).map_err(|e| e.to_string())?;
    println!("🧪 Loaded panel with {} sites from: {}", panel.len(), panel_path);

    let blacklist = BlackList::from_panel(&panel, &validation.thresholds).map_err(|e| e.to_string())?;
    output::write_blacklist(output_path, &blacklist, command_line)
}

/// Fragments of one sample over the given regions
fn extract_fragments(
    reads: &Option<String>,
    regions: &[TargetRegion],
    mutations: &[Mutation],
    validation: &ValidationResult,
) -> Result<Vec<FragmentRecord>, String> {
    let source = open_source(required(reads, "--reads")?)?;
    let fragments = FragmentExtractor::new(&validation.read_filter, validation.sizes)
        .with_mutations(mutations)
        .extract(source.as_ref(), regions)
        .map_err(|e| e.to_string())?;
    println!("🧩 Extracted {} fragments", fragments.len());
    Ok(fragments)
}

fn run_fragments(cmd: &FragmentsArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let regions = load_regions(required(&cmd.regions, "--regions")?)?;
    let mutations = match &cmd.mutations {
        Some(path) => load_mutations(Path::new(path), None).map_err(|e| e.to_string())?,
        None => Vec::new(),
    };

    let fragments = extract_fragments(&cmd.reads, &regions, &mutations, validation)?;
    output::write_fragments(output_path, &fragments, command_line)?;

    if let Some(path) = &cmd.histogram {
        let histogram = FragmentHistogram::from_fragments(&fragments, validation.sizes, &validation.bins, cmd.normalized)
            .map_err(|e| e.to_string())?;
        output::write_histogram(path, &histogram, command_line)?;
    }
    Ok(())
}

fn run_summarize(cmd: &SummarizeArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let regions = load_regions(required(&cmd.regions, "--regions")?)?;
    let fragments = extract_fragments(&cmd.reads, &regions, &[], validation)?;

    let summaries = summarize_regions(&fragments, &regions, &validation.statistics);
    let names: Vec<String> = validation.statistics.iter().map(|s| s.name().to_string()).collect();
    output::write_region_summaries(output_path, &summaries, &names, command_line)
}

fn run_wps(cmd: &WpsArgs, validation: &ValidationResult, command_line: &str) -> Result<(), String> {
    let output_path = required(&cmd.output, "--output")?;
    let regions = load_regions(required(&cmd.regions, "--regions")?)?;
    let fragments = extract_fragments(&cmd.reads, &regions, &[], validation)?;
    println!(
        "🪟 WPS: window {} bp, step {} bp, fragments {}-{} bp",
        validation.wps.window_size, validation.wps.step_size, validation.wps.sizes.min_size, validation.wps.sizes.max_size
    );

    let windows = compute_wps(&fragments, &regions, &validation.wps).map_err(|e| e.to_string())?;
    output::write_wps(output_path, &windows, command_line)
}
