use crate::model::types::{GeneId, IsoformId};
use crate::types::{Exon, Strand};
use serde::{Deserialize, Serialize};

/// Isoform (transcript) model.
///
/// `gene` is a non-owning back-reference: an index into the owning
/// `AnnotationModel`'s gene table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isoform {
    pub id: IsoformId,
    pub isoform_id: String,
    pub name: Option<String>,
    pub gene: GeneId,
    pub strand: Strand,
    exons: Vec<Exon>,
}

impl Isoform {
    pub fn new(id: IsoformId, isoform_id: impl Into<String>, gene: GeneId, strand: Strand) -> Self {
        Self {
            id,
            isoform_id: isoform_id.into(),
            name: None,
            gene,
            strand,
            exons: Vec::new(),
        }
    }

    pub fn set_name_if_unset(&mut self, name: &str) {
        if self.name.is_none() {
            self.name = Some(name.to_string());
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.isoform_id)
    }

    /// Insert an exon keeping the chain sorted by (start, end).
    ///
    /// The resulting order does not depend on the order exons arrive in.
    pub fn add_exon(&mut self, exon: Exon) {
        let pos = self.exons.partition_point(|e| *e <= exon);
        self.exons.insert(pos, exon);
    }

    pub fn exons(&self) -> &[Exon] {
        &self.exons
    }
}
