// mod.rs - Core detection logic module

pub mod background;
pub mod blacklist;
pub mod evidence;
pub mod filters;
pub mod montecarlo;
pub mod phasing;
pub mod pileup;
pub mod pipeline;

// Re-export main types for convenience
pub use background::{BackgroundEstimator, BackgroundRate, ClassCounts};
pub use blacklist::{BackgroundPanel, BlackList, BlacklistThresholds, PanelKey, PanelRow, SampleObservation};
pub use evidence::{EvidenceCollector, ReadEvidence};
pub use filters::{ReadFilter, StrandFilter};
pub use montecarlo::{DetectionStatus, MonteCarloConfig, MonteCarloTester, TestResult};
pub use phasing::{adjusted_background_rate, merge_phase_groups, MergedUnit};
pub use pileup::{pileup_region, PileupColumn};
pub use pipeline::{CtdnaTest, SampleReport, UnitReport};
