// merge.rs - Merge configuration file with CLI arguments

use crate::cli::args::Command;
use crate::cli::{Args, Config};

/// Fill unset read filter options of a subcommand from the config.
/// Switches only ever turn on, so an explicit CLI switch is never undone.
macro_rules! merge_filter {
    ($cmd:expr, $config:expr) => {
        if $cmd.min_base_quality.is_none() {
            $cmd.min_base_quality = $config.min_base_quality;
        }
        if $cmd.min_mapq.is_none() {
            $cmd.min_mapq = $config.min_mapq;
        }
        if $cmd.strand.is_none() {
            $cmd.strand = $config.strand.clone();
        }
        if $cmd.end_trim.is_none() {
            $cmd.end_trim = $config.end_trim;
        }
        if !$cmd.allow_improper_pairs && $config.require_proper_pair == Some(false) {
            $cmd.allow_improper_pairs = true;
        }
        if !$cmd.simple_cigar_only && $config.simple_cigar_only.unwrap_or(false) {
            $cmd.simple_cigar_only = true;
        }
        if !$cmd.keep_duplicates && $config.drop_duplicates == Some(false) {
            $cmd.keep_duplicates = true;
        }
    };
}

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: Config) -> Self {
        if self.threads.is_none() {
            self.threads = config.threads;
        }

        match &mut self.command {
            Command::Test(cmd) => {
                merge_filter!(cmd, config);
                if cmd.mutations.is_none() {
                    cmd.mutations = config.mutations.clone();
                }
                if cmd.targets.is_none() {
                    cmd.targets = config.targets.clone();
                }
                if cmd.phase_column.is_none() {
                    cmd.phase_column = config.phase_column.clone();
                }
                if cmd.reference.is_none() {
                    cmd.reference = config.reference.clone();
                }
                if cmd.blacklist.is_none() {
                    cmd.blacklist = config.blacklist.clone();
                }
                if !cmd.substitution_specific && config.substitution_specific.unwrap_or(false) {
                    cmd.substitution_specific = true;
                }
                if cmd.n_simulations.is_none() {
                    cmd.n_simulations = config.n_simulations;
                }
                if cmd.seed.is_none() {
                    cmd.seed = config.seed;
                }
                if cmd.informative_reads_threshold.is_none() {
                    cmd.informative_reads_threshold = config.informative_reads_threshold;
                }
                if cmd.significance_level.is_none() {
                    cmd.significance_level = config.significance_level;
                }
            }
            Command::Background(cmd) => {
                merge_filter!(cmd, config);
                if cmd.targets.is_none() {
                    cmd.targets = config.targets.clone();
                }
                if cmd.mutations.is_none() {
                    cmd.mutations = config.mutations.clone();
                }
                if cmd.reference.is_none() {
                    cmd.reference = config.reference.clone();
                }
                if cmd.blacklist.is_none() {
                    cmd.blacklist = config.blacklist.clone();
                }
                if !cmd.substitution_specific && config.substitution_specific.unwrap_or(false) {
                    cmd.substitution_specific = true;
                }
            }
            Command::Panel(cmd) => {
                merge_filter!(cmd, config);
                if cmd.targets.is_none() {
                    cmd.targets = config.targets.clone();
                }
                if cmd.reference.is_none() {
                    cmd.reference = config.reference.clone();
                }
                if !cmd.substitution_specific && config.substitution_specific.unwrap_or(false) {
                    cmd.substitution_specific = true;
                }
            }
            Command::Blacklist(cmd) => {
                if cmd.mean_vaf_quantile.is_none() {
                    cmd.mean_vaf_quantile = config.mean_vaf_quantile;
                }
                if cmd.min_samples_one_read.is_none() {
                    cmd.min_samples_one_read = config.min_samples_one_read;
                }
                if cmd.min_samples_two_reads.is_none() {
                    cmd.min_samples_two_reads = config.min_samples_two_reads;
                }
            }
            Command::Fragments(cmd) => {
                merge_filter!(cmd, config);
                if cmd.mutations.is_none() {
                    cmd.mutations = config.mutations.clone();
                }
                if cmd.bins.is_none() {
                    cmd.bins = config.bins.clone();
                }
                if !cmd.normalized && config.normalized.unwrap_or(false) {
                    cmd.normalized = true;
                }
                if cmd.min_size.is_none() {
                    cmd.min_size = config.min_size;
                }
                if cmd.max_size.is_none() {
                    cmd.max_size = config.max_size;
                }
            }
            Command::Summarize(cmd) => {
                merge_filter!(cmd, config);
                if cmd.stats.is_none() {
                    cmd.stats = config.stats.clone();
                }
                if cmd.min_size.is_none() {
                    cmd.min_size = config.min_size;
                }
                if cmd.max_size.is_none() {
                    cmd.max_size = config.max_size;
                }
            }
            Command::Wps(cmd) => {
                merge_filter!(cmd, config);
                if cmd.window_size.is_none() {
                    cmd.window_size = config.window_size;
                }
                if cmd.step_size.is_none() {
                    cmd.step_size = config.step_size;
                }
                if cmd.min_size.is_none() {
                    cmd.min_size = config.wps_min_size;
                }
                if cmd.max_size.is_none() {
                    cmd.max_size = config.wps_max_size;
                }
            }
            Command::GenerateConfig(_) => {}
        }

        self
    }

    /// Load configuration and merge with CLI args
    pub fn with_config_file(self, config_path: &str) -> Result<Self, String> {
        let config = Config::from_file(config_path)?;
        Ok(self.merge_with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["ctdna"], args).unwrap()
    }

    #[test]
    fn test_cli_wins_over_config() {
        let args = parse(&["test", "--reads", "s1.sam", "--min-mapq", "10", "--seed", "3"]);
        let mut config = Config::new();
        config.min_mapq = Some(40);
        config.min_base_quality = Some(25);
        config.seed = Some(99);
        config.targets = Some("targets.bed".to_string());

        let merged = args.merge_with_config(config);
        let Command::Test(cmd) = merged.command else {
            panic!("expected test subcommand");
        };
        assert_eq!(cmd.min_mapq, Some(10));
        assert_eq!(cmd.min_base_quality, Some(25));
        assert_eq!(cmd.seed, Some(3));
        assert_eq!(cmd.targets.as_deref(), Some("targets.bed"));
    }

    #[test]
    fn test_config_switches_and_wps_sizes() {
        let args = parse(&["wps", "--reads", "s1.sam"]);
        let mut config = Config::new();
        config.drop_duplicates = Some(false);
        config.require_proper_pair = Some(true);
        config.threads = Some(4);
        config.min_size = Some(1);
        config.wps_min_size = Some(130);

        let merged = args.merge_with_config(config);
        assert_eq!(merged.threads, Some(4));
        let Command::Wps(cmd) = merged.command else {
            panic!("expected wps subcommand");
        };
        assert!(cmd.keep_duplicates);
        assert!(!cmd.allow_improper_pairs);
        assert_eq!(cmd.min_size, Some(130));
    }
}
