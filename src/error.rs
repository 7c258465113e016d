// error.rs - Library error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the detection and fragmentomics pipelines.
///
/// Fatal kinds carry the locus, region or file that caused them so callers
/// can locate the faulty input.
#[derive(Debug, Error)]
pub enum CtdnaError {
    /// Mutation is not a single-nucleotide substitution
    #[error("invalid mutation {locus}: {reason}")]
    InvalidMutation { locus: String, reason: String },

    /// Nothing left to estimate a background rate from
    #[error("insufficient coverage: {context}")]
    InsufficientCoverage { context: String },

    /// A phase group spans more than one chromosome
    #[error("phase group '{phase_id}' spans several chromosomes: {}", chromosomes.join(", "))]
    InconsistentPhaseGroup {
        phase_id: String,
        chromosomes: Vec<String>,
    },

    /// Mates of one pair disagree on the allele; dropped per locus
    #[error("read pair '{read}' gives conflicting ref/alt calls at {locus}")]
    AmbiguousReadPair { read: String, locus: String },

    #[error("invalid region {region}: {reason}")]
    InvalidRegion { region: String, reason: String },

    #[error("invalid value for {parameter}: {reason}")]
    InvalidThreshold { parameter: String, reason: String },

    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// Blacklist granularity does not match the substitution-specific flag
    #[error("blacklist mode mismatch: {0}")]
    ModeMismatch(String),

    /// The alignment source could not answer a query
    #[error("alignment source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("parse error in {path} line {line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, CtdnaError>;

impl CtdnaError {
    /// Wrap an `io::Error` with the path it concerns.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn threshold(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidThreshold {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(path: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
