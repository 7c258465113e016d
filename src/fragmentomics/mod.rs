// mod.rs - Fragment length analysis module

pub mod extract;
pub mod histogram;
pub mod profile;
pub mod wps;

// Re-export main types for convenience
pub use extract::{FragmentExtractor, FragmentRecord, SizeRange};
pub use histogram::{BinSpec, FragmentHistogram, HistogramBin};
pub use profile::{summarize_regions, CustomSummary, RegionSummary, SummaryFn};
pub use wps::{compute_wps, WpsConfig, WpsWindow};
