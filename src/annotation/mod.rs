pub mod builder;
pub mod io;
pub mod model;

pub use builder::AnnotationBuilder;
pub use io::{ExonRecord, GtfError, GtfReader};
pub use model::AnnotationModel;
