// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    // Shared inputs
    pub reference: Option<String>,
    pub targets: Option<String>,
    pub mutations: Option<String>,
    pub phase_column: Option<String>,
    pub blacklist: Option<String>,

    // Performance
    pub threads: Option<usize>,

    // Read filter
    pub min_base_quality: Option<u8>,
    pub min_mapq: Option<u8>,
    pub strand: Option<String>,
    pub end_trim: Option<u32>,
    pub require_proper_pair: Option<bool>,
    pub simple_cigar_only: Option<bool>,
    pub drop_duplicates: Option<bool>,

    // Background model
    pub substitution_specific: Option<bool>,

    // Monte-Carlo test
    pub n_simulations: Option<usize>,
    pub seed: Option<u64>,
    pub informative_reads_threshold: Option<usize>,
    pub significance_level: Option<f64>,

    // Blacklist criteria
    pub mean_vaf_quantile: Option<f64>,
    pub min_samples_one_read: Option<usize>,
    pub min_samples_two_reads: Option<usize>,

    // Fragment sizes
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub bins: Option<String>,
    pub normalized: Option<bool>,
    pub stats: Option<String>,

    // WPS
    pub window_size: Option<u64>,
    pub step_size: Option<u64>,
    pub wps_min_size: Option<u64>,
    pub wps_max_size: Option<u64>,
}

impl Config {
    /// Create empty configuration
    pub fn new() -> Self {
        Self {
            reference: None,
            targets: None,
            mutations: None,
            phase_column: None,
            blacklist: None,
            threads: None,
            min_base_quality: None,
            min_mapq: None,
            strand: None,
            end_trim: None,
            require_proper_pair: None,
            simple_cigar_only: None,
            drop_duplicates: None,
            substitution_specific: None,
            n_simulations: None,
            seed: None,
            informative_reads_threshold: None,
            significance_level: None,
            mean_vaf_quantile: None,
            min_samples_one_read: None,
            min_samples_two_reads: None,
            min_size: None,
            max_size: None,
            bins: None,
            normalized: None,
            stats: None,
            window_size: None,
            step_size: None,
            wps_min_size: None,
            wps_max_size: None,
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        println!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        println!("📄 Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# ctdna.toml - Configuration file for ctdna
# Command line arguments will override these settings

# =============================================================================
# SHARED INPUTS
# =============================================================================

# Reference FASTA; without it the majority base of each column is used
reference = "/path/to/reference.fa"

# Target regions (BED) for background estimation
targets = "/path/to/targets.bed"

# Mutation table: chrom, pos, ref, alt and an optional phase group column
mutations = "/path/to/mutations.tsv"
phase_column = "phase_group"

# Blacklist produced by `ctdna blacklist`
# blacklist = "/path/to/blacklist.tsv"

# =============================================================================
# PERFORMANCE
# =============================================================================

# Number of threads (omit for auto-detection)
threads = 8

# =============================================================================
# READ FILTER
# =============================================================================

min_base_quality = 20
min_mapq = 30

# Strand: both, forward, reverse
strand = "both"

# Ignore base calls this close to either read end
end_trim = 0

require_proper_pair = true
simple_cigar_only = false
drop_duplicates = true

# =============================================================================
# BACKGROUND AND TESTING
# =============================================================================

# One rate per substitution class instead of one aggregate rate
substitution_specific = false

n_simulations = 10000
# seed = 42
informative_reads_threshold = 10000
significance_level = 0.05

# =============================================================================
# BLACKLIST CRITERIA (omit a key to disable that criterion)
# =============================================================================

mean_vaf_quantile = 0.95
min_samples_one_read = 2
min_samples_two_reads = 1

# =============================================================================
# FRAGMENTOMICS
# =============================================================================

min_size = 1
max_size = 1000

# Histogram bins: a width or comma separated breakpoints
bins = "10"
normalized = false

# Region statistics: mean, sd, median, min, max, count
stats = "mean,sd,median,count"

# WPS windows and the fragment sizes they count
window_size = 120
step_size = 1
wps_min_size = 120
wps_max_size = 180
"#
        .to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::generate_sample()).unwrap();
        assert_eq!(config.min_mapq, Some(30));
        assert_eq!(config.strand.as_deref(), Some("both"));
        assert_eq!(config.seed, None);
        assert_eq!(config.blacklist, None);
        assert_eq!(config.mean_vaf_quantile, Some(0.95));
        assert_eq!(config.wps_max_size, Some(180));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctdna.toml");
        let mut config = Config::new();
        config.seed = Some(7);
        config.bins = Some("50,100,150".to_string());
        config.to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }
}
