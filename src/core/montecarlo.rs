// montecarlo.rs - Monte-Carlo significance test for mutation detection

use crate::error::{CtdnaError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Iterations per independently seeded chunk
const CHUNK_SIZE: usize = 1000;

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    pub seed: Option<u64>,
    /// Below this many informative reads the call is undetermined
    pub informative_reads_threshold: usize,
    pub significance_level: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_simulations: 10_000,
            seed: None,
            informative_reads_threshold: 10_000,
            significance_level: 0.05,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_simulations == 0 {
            return Err(CtdnaError::threshold("n_simulations", "must be at least 1"));
        }
        let level = self.significance_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(CtdnaError::threshold(
                "significance_level",
                format!("{} is outside (0, 1)", level),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStatus {
    Positive,
    Negative,
    Undetermined,
}

impl DetectionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            DetectionStatus::Positive => "tumor DNA detected above background",
            DetectionStatus::Negative => "no evidence above background",
            DetectionStatus::Undetermined => "too few informative reads to call",
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectionStatus::Positive => "POSITIVE",
            DetectionStatus::Negative => "NEGATIVE",
            DetectionStatus::Undetermined => "UNDETERMINED",
        };
        f.write_str(label)
    }
}

impl FromStr for DetectionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POSITIVE" => Ok(DetectionStatus::Positive),
            "NEGATIVE" => Ok(DetectionStatus::Negative),
            "UNDETERMINED" => Ok(DetectionStatus::Undetermined),
            _ => Err(format!("Invalid detection status: {}", s)),
        }
    }
}

/// Outcome of one test, with the inputs needed to reproduce it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub p_value: f64,
    pub status: DetectionStatus,
    pub alt_reads: usize,
    pub informative_reads: usize,
    pub background_rate: f64,
    pub n_simulations: usize,
    pub n_exceeding: u64,
    pub seed: u64,
}

pub struct MonteCarloTester {
    config: MonteCarloConfig,
}

impl MonteCarloTester {
    pub fn new(config: MonteCarloConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Empirical p-value of observing `alt_reads` or more chance alt reads
    /// among `informative_reads` at background rate `rate`.
    pub fn test(&self, alt_reads: usize, informative_reads: usize, rate: f64) -> Result<TestResult> {
        if alt_reads > informative_reads {
            return Err(CtdnaError::InvalidObservation(format!(
                "{} alt reads exceed {} informative reads",
                alt_reads, informative_reads
            )));
        }
        if !(0.0..=1.0).contains(&rate) {
            return Err(CtdnaError::threshold(
                "background_rate",
                format!("{} is outside [0, 1]", rate),
            ));
        }

        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random::<u64>());
        let n = self.config.n_simulations;
        let n_chunks = n.div_ceil(CHUNK_SIZE);

        let n_exceeding: u64 = (0..n_chunks)
            .into_par_iter()
            .map(|chunk| {
                let iterations = CHUNK_SIZE.min(n - chunk * CHUNK_SIZE);
                let mut rng = StdRng::seed_from_u64(chunk_seed(seed, chunk as u64));
                (0..iterations)
                    .filter(|_| reaches(&mut rng, informative_reads as u64, rate, alt_reads as u64))
                    .count() as u64
            })
            .sum();

        let p_value = (1 + n_exceeding) as f64 / (1 + n) as f64;
        let status = if informative_reads < self.config.informative_reads_threshold {
            DetectionStatus::Undetermined
        } else if p_value < self.config.significance_level {
            DetectionStatus::Positive
        } else {
            DetectionStatus::Negative
        };

        log::debug!(
            "monte carlo: alt={} informative={} rate={:.3e} exceed={}/{} p={:.4} -> {}",
            alt_reads,
            informative_reads,
            rate,
            n_exceeding,
            n,
            p_value,
            status
        );
        Ok(TestResult {
            p_value,
            status,
            alt_reads,
            informative_reads,
            background_rate: rate,
            n_simulations: n,
            n_exceeding,
            seed,
        })
    }
}

/// Derive the seed for one chunk (splitmix64 finalizer over seed and index)
fn chunk_seed(seed: u64, chunk: u64) -> u64 {
    let mut z = seed ^ chunk.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Whether a Binomial(n, rate) draw reaches `target`.
///
/// Walks from success to success with geometric skips, so the cost scales
/// with the number of successes rather than with `n`, and stops early once
/// `target` is reached.
fn reaches<R: Rng>(rng: &mut R, n: u64, rate: f64, target: u64) -> bool {
    if target == 0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return n >= target;
    }

    let log_q = (1.0 - rate).ln();
    let mut consumed = 0u64;
    let mut hits = 0u64;
    loop {
        // uniform on (0, 1]
        let u = 1.0 - rng.random::<f64>();
        let skip = (u.ln() / log_q).floor();
        if !skip.is_finite() || skip >= (n - consumed) as f64 {
            return false;
        }
        consumed += skip as u64 + 1;
        hits += 1;
        if hits >= target {
            return true;
        }
        if consumed >= n {
            return false;
        }
    }
}
