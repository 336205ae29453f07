pub mod labels;
pub mod loader;
pub mod matrix;
pub mod query;

pub use labels::{Cluster, LabelSet};
pub use loader::{ExpressionData, ExpressionLoader, ExpressionPaths, LoadError, Source};
pub use matrix::{CoordMatrix, ExpressionMatrix, IsoformIndexMap};
pub use query::{ClusterStats, ExpressionQuery, ExpressionScale};
