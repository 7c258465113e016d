// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// ctdna - Circulating tumor DNA detection and fragment size analysis
pub struct Args {
    /// path to TOML configuration file (CLI arguments take precedence)
    #[argh(option)]
    pub config: Option<String>,

    /// number of threads (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Test(TestArgs),
    Background(BackgroundArgs),
    Panel(PanelArgs),
    Blacklist(BlacklistArgs),
    Fragments(FragmentsArgs),
    Summarize(SummarizeArgs),
    Wps(WpsArgs),
    GenerateConfig(GenerateConfigArgs),
}

#[derive(FromArgs)]
/// Test samples for tumor-derived reads at known mutations
#[argh(subcommand, name = "test")]
pub struct TestArgs {
    /// alignment file of one sample (.sam, or .bam with the htslib feature); repeat for several samples
    #[argh(option)]
    pub reads: Vec<String>,

    /// mutation table (chrom, pos, ref, alt and an optional phase group column)
    #[argh(option)]
    pub mutations: Option<String>,

    /// target regions (BED) used for the background rate
    #[argh(option)]
    pub targets: Option<String>,

    /// output TSV with one row per sample
    #[argh(option)]
    pub output: Option<String>,

    /// optional TSV with the evidence of every mutation or phase group
    #[argh(option)]
    pub units_output: Option<String>,

    /// optional JSON dump of the full reports
    #[argh(option)]
    pub json: Option<String>,

    /// column of the mutation table holding phase group ids (mutations are unphased without it)
    #[argh(option)]
    pub phase_column: Option<String>,

    /// reference FASTA used to resolve reference bases
    #[argh(option)]
    pub reference: Option<String>,

    /// blacklist TSV produced by the blacklist subcommand
    #[argh(option)]
    pub blacklist: Option<String>,

    /// model background per substitution type instead of one aggregate rate
    #[argh(switch)]
    pub substitution_specific: bool,

    /// number of Monte-Carlo simulations (default: 10000)
    #[argh(option)]
    pub n_simulations: Option<usize>,

    /// random seed for reproducible p-values
    #[argh(option)]
    pub seed: Option<u64>,

    /// informative reads below which a negative call is undetermined (default: 10000)
    #[argh(option)]
    pub informative_reads_threshold: Option<usize>,

    /// significance level for a positive call (default: 0.05)
    #[argh(option)]
    pub significance_level: Option<f64>,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Estimate the background error rate of samples over target regions
#[argh(subcommand, name = "background")]
pub struct BackgroundArgs {
    /// alignment file of one sample; repeat for several samples
    #[argh(option)]
    pub reads: Vec<String>,

    /// target regions (BED)
    #[argh(option)]
    pub targets: Option<String>,

    /// mutation table; tested positions are excluded from the estimate
    #[argh(option)]
    pub mutations: Option<String>,

    /// output TSV of aggregate and per-substitution rates
    #[argh(option)]
    pub output: Option<String>,

    /// reference FASTA used to resolve reference bases
    #[argh(option)]
    pub reference: Option<String>,

    /// blacklist TSV produced by the blacklist subcommand
    #[argh(option)]
    pub blacklist: Option<String>,

    /// report substitution-specific rates and expect a variant blacklist
    #[argh(switch)]
    pub substitution_specific: bool,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Build a background panel from normal samples
#[argh(subcommand, name = "panel")]
pub struct PanelArgs {
    /// alignment file of one normal sample; repeat for every panel member
    #[argh(option)]
    pub reads: Vec<String>,

    /// target regions (BED)
    #[argh(option)]
    pub targets: Option<String>,

    /// output panel TSV
    #[argh(option)]
    pub output: Option<String>,

    /// reference FASTA used to resolve reference bases
    #[argh(option)]
    pub reference: Option<String>,

    /// record one row per alternative base instead of one per position
    #[argh(switch)]
    pub substitution_specific: bool,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Derive a blacklist from a background panel
#[argh(subcommand, name = "blacklist")]
pub struct BlacklistArgs {
    /// panel TSV produced by the panel subcommand
    #[argh(option)]
    pub panel: Option<String>,

    /// output blacklist TSV
    #[argh(option)]
    pub output: Option<String>,

    /// flag sites whose mean VAF exceeds this quantile of all mean VAFs (0.0-1.0)
    #[argh(option)]
    pub mean_vaf_quantile: Option<f64>,

    /// flag sites with at least one alt read in at least this many samples
    #[argh(option)]
    pub min_samples_one_read: Option<usize>,

    /// flag sites with at least two alt reads in at least this many samples
    #[argh(option)]
    pub min_samples_two_reads: Option<usize>,
}

#[derive(FromArgs)]
/// Extract fragments from paired reads and optionally bin their sizes
#[argh(subcommand, name = "fragments")]
pub struct FragmentsArgs {
    /// alignment file of the sample
    #[argh(option)]
    pub reads: Option<String>,

    /// regions (BED) to collect fragments from
    #[argh(option)]
    pub regions: Option<String>,

    /// output fragment TSV
    #[argh(option)]
    pub output: Option<String>,

    /// mutation table; fragments covering a mutation are tagged ref or alt
    #[argh(option)]
    pub mutations: Option<String>,

    /// optional size histogram TSV
    #[argh(option)]
    pub histogram: Option<String>,

    /// histogram bins: a width ("10") or comma separated breakpoints ("50,100,150,400")
    #[argh(option)]
    pub bins: Option<String>,

    /// report bin fractions alongside counts
    #[argh(switch)]
    pub normalized: bool,

    /// minimum fragment size (default: 1)
    #[argh(option)]
    pub min_size: Option<u64>,

    /// maximum fragment size (default: 1000)
    #[argh(option)]
    pub max_size: Option<u64>,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Summarize fragment sizes per region
#[argh(subcommand, name = "summarize")]
pub struct SummarizeArgs {
    /// alignment file of the sample
    #[argh(option)]
    pub reads: Option<String>,

    /// regions (BED) to summarize
    #[argh(option)]
    pub regions: Option<String>,

    /// output TSV with one row per region
    #[argh(option)]
    pub output: Option<String>,

    /// comma separated statistics: mean, sd, median, min, max, count (default: mean,sd,median,count)
    #[argh(option)]
    pub stats: Option<String>,

    /// minimum fragment size (default: 1)
    #[argh(option)]
    pub min_size: Option<u64>,

    /// maximum fragment size (default: 1000)
    #[argh(option)]
    pub max_size: Option<u64>,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Compute the Windowed Protection Score over regions
#[argh(subcommand, name = "wps")]
pub struct WpsArgs {
    /// alignment file of the sample
    #[argh(option)]
    pub reads: Option<String>,

    /// regions (BED) to scan
    #[argh(option)]
    pub regions: Option<String>,

    /// output TSV with one row per window
    #[argh(option)]
    pub output: Option<String>,

    /// window size in bp (default: 120)
    #[argh(option)]
    pub window_size: Option<u64>,

    /// step between window starts in bp (default: 1)
    #[argh(option)]
    pub step_size: Option<u64>,

    /// minimum fragment size counted (default: 120)
    #[argh(option)]
    pub min_size: Option<u64>,

    /// maximum fragment size counted (default: 180)
    #[argh(option)]
    pub max_size: Option<u64>,

    /// minimum base quality (default: 20)
    #[argh(option)]
    pub min_base_quality: Option<u8>,

    /// minimum mapping quality (default: 30)
    #[argh(option)]
    pub min_mapq: Option<u8>,

    /// strand filter: both, forward, reverse (default: both)
    #[argh(option)]
    pub strand: Option<String>,

    /// ignore base calls this close to either read end (default: 0)
    #[argh(option)]
    pub end_trim: Option<u32>,

    /// keep reads that are not in a proper pair
    #[argh(switch)]
    pub allow_improper_pairs: bool,

    /// reject reads with clipping or indels
    #[argh(switch)]
    pub simple_cigar_only: bool,

    /// keep reads flagged as duplicates
    #[argh(switch)]
    pub keep_duplicates: bool,
}

#[derive(FromArgs)]
/// Print a sample configuration file
#[argh(subcommand, name = "generate-config")]
pub struct GenerateConfigArgs {
    /// write the sample configuration here instead of stdout
    #[argh(option)]
    pub output: Option<String>,
}

/// Read filter options as given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub min_base_quality: Option<u8>,
    pub min_mapq: Option<u8>,
    pub strand: Option<String>,
    pub end_trim: Option<u32>,
    pub allow_improper_pairs: bool,
    pub simple_cigar_only: bool,
    pub keep_duplicates: bool,
}

macro_rules! filter_options {
    ($cmd:expr) => {
        FilterOptions {
            min_base_quality: $cmd.min_base_quality,
            min_mapq: $cmd.min_mapq,
            strand: $cmd.strand.clone(),
            end_trim: $cmd.end_trim,
            allow_improper_pairs: $cmd.allow_improper_pairs,
            simple_cigar_only: $cmd.simple_cigar_only,
            keep_duplicates: $cmd.keep_duplicates,
        }
    };
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Test(_) => "test",
            Command::Background(_) => "background",
            Command::Panel(_) => "panel",
            Command::Blacklist(_) => "blacklist",
            Command::Fragments(_) => "fragments",
            Command::Summarize(_) => "summarize",
            Command::Wps(_) => "wps",
            Command::GenerateConfig(_) => "generate-config",
        }
    }

    /// Read filter options of subcommands that read alignments
    pub fn filter_options(&self) -> Option<FilterOptions> {
        match self {
            Command::Test(cmd) => Some(filter_options!(cmd)),
            Command::Background(cmd) => Some(filter_options!(cmd)),
            Command::Panel(cmd) => Some(filter_options!(cmd)),
            Command::Fragments(cmd) => Some(filter_options!(cmd)),
            Command::Summarize(cmd) => Some(filter_options!(cmd)),
            Command::Wps(cmd) => Some(filter_options!(cmd)),
            Command::Blacklist(_) | Command::GenerateConfig(_) => None,
        }
    }
}
