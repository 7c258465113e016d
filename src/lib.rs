// lib.rs - ctdna library root

//! # ctdna - Circulating tumor DNA detection and fragment size analysis
//!
//! This library decides whether a plasma sample carries tumor DNA by
//! collecting read evidence at known tumor mutations and testing it against
//! the sequencing background with a Monte-Carlo simulation. It also extracts
//! cell-free DNA fragments from paired reads for size profiling.
//!
//! ## Features
//!
//! - **Read evidence**: per-mutation ref/alt read sets under configurable quality filters
//! - **Background model**: aggregate or substitution-specific error rates over target regions
//! - **Blacklists**: built from a panel of normal samples, per locus or per variant
//! - **Phasing**: co-phased mutations merged into one unit with a purification-adjusted rate
//! - **Monte-Carlo test**: seeded, parallel and reproducible p-values
//! - **Fragmentomics**: fragment extraction, size histograms, region statistics and WPS
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use ctdna::prelude::*;
//! use std::path::Path;
//!
//! let mutations = load_mutations(Path::new("mutations.tsv"), Some("phase_group"))?;
//! let targets = load_targets(Path::new("targets.bed"))?;
//! let sample = MemorySource::from_sam(Path::new("plasma.sam"), None)?;
//!
//! let config = MonteCarloConfig {
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let test = CtdnaTest::new(ReadFilter::default(), config, false);
//! let report = test.run(&sample, &mutations, &targets)?;
//! println!("{}: p = {:.4} ({})", report.sample, report.result.p_value, report.result.status);
//! # Ok::<(), ctdna::CtdnaError>(())
//! ```

// Re-export all main modules
pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod fragmentomics;
pub mod output;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::core::{BackgroundEstimator, BackgroundRate, CtdnaTest, SampleReport};
    pub use crate::core::{BackgroundPanel, BlackList, BlacklistThresholds};
    pub use crate::core::{DetectionStatus, MonteCarloConfig, MonteCarloTester, TestResult};
    pub use crate::core::{EvidenceCollector, MergedUnit, ReadEvidence, ReadFilter, StrandFilter};
    pub use crate::data::loaders::{load_mutations, load_targets, FastaReference};
    pub use crate::data::{AlignmentSource, MemorySource, Mutation, ReferenceLookup, TargetRegion};
    pub use crate::error::CtdnaError;
    pub use crate::fragmentomics::{compute_wps, summarize_regions, FragmentExtractor, FragmentHistogram};
    pub use crate::fragmentomics::{BinSpec, FragmentRecord, SizeRange, SummaryFn, WpsConfig};
}

// Re-export main types at the root level for convenience
pub use cli::{Args, ValidationResult};
pub use crate::core::{CtdnaTest, MonteCarloConfig, ReadFilter, SampleReport};
pub use data::{AlignmentSource, Mutation, TargetRegion};
pub use error::CtdnaError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "ctdna v{} - Circulating tumor DNA detection and fragmentomics",
        VERSION
    )
}
