//! isoform_switch
//!
//! Detects dominant-isoform switches between cell clusters of single-cell
//! long-read data. A GTF annotation is grouped into genes and isoforms, an
//! isoform-by-cell expression matrix is grouped by cluster label, and each gene
//! is checked for clusters whose dominant isoforms differ.

pub mod types;
pub mod model;
pub mod annotation;
pub mod expression;
pub mod config;
pub mod dominance;
pub mod fold_change;
pub mod workspace;

pub use annotation::{AnnotationBuilder, AnnotationModel, GtfError};

pub use types::{Exon, Strand};

pub use model::gene::Gene;
pub use model::isoform::Isoform;
pub use model::types::{ClusterId, GeneId, IsoformId};

pub use expression::{ExpressionData, ExpressionLoader, ExpressionPaths, ExpressionQuery, LoadError};

pub use config::{ConfigError, Manifest, Thresholds};
pub use dominance::{DominanceAnalyzer, DominanceResult};
pub use fold_change::{FoldChangeJob, FoldChangeTable};
pub use workspace::{Workspace, WorkspaceError};
