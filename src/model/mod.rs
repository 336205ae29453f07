pub mod types;
pub mod isoform;
pub mod gene;

pub use types::{ClusterId, GeneId, IsoformId};
