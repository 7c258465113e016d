// mod.rs - Input loaders

#[cfg(feature = "htslib")]
pub mod bam;
pub mod fasta;
pub mod sam;
pub mod tables;

#[cfg(feature = "htslib")]
pub use bam::BamSource;
pub use fasta::FastaReference;
pub use tables::{load_mutations, load_targets};
