// mod.rs - Data structures module

pub mod loaders;
pub mod mutation;
pub mod read;
pub mod region;
pub mod source;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export main types for convenience
pub use mutation::{Mutation, Substitution};
pub use read::{BaseCall, CigarOp, ReadFlags, ReadRecord};
pub use region::{merge_regions, TargetRegion};
pub use source::{AlignmentSource, MemoryReference, MemorySource, RecordIter, ReferenceLookup};
