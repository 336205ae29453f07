use crate::model::types::{GeneId, IsoformId};
use crate::types::{Exon, Strand};
use serde::{Deserialize, Serialize};

/// Gene model: identity, location and the isoforms annotated under it.
///
/// Notes:
/// - `start`/`end` span every exon of every isoform (1-based, inclusive) and
///   are widened as exons are added.
/// - `name` is the first `gene_name` seen; later occurrences never overwrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    pub gene_id: String,
    pub name: Option<String>,
    pub chromosome: String,
    pub strand: Strand,
    start: u64,
    end: u64,
    isoform_ids: Vec<IsoformId>,
    max_fold_change: Option<f64>,
}

impl Gene {
    pub fn new(
        id: GeneId,
        gene_id: impl Into<String>,
        chromosome: impl Into<String>,
        strand: Strand,
        first_exon: Exon,
    ) -> Self {
        Self {
            id,
            gene_id: gene_id.into(),
            name: None,
            chromosome: chromosome.into(),
            strand,
            start: first_exon.start,
            end: first_exon.end,
            isoform_ids: Vec::new(),
            max_fold_change: None,
        }
    }

    /// Set the display name unless one is already present.
    pub fn set_name_if_unset(&mut self, name: &str) {
        if self.name.is_none() {
            self.name = Some(name.to_string());
        }
    }

    /// Name if annotated, else the stable ID.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.gene_id)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Widen the gene span to cover `exon`.
    pub fn include_exon(&mut self, exon: Exon) {
        self.start = self.start.min(exon.start);
        self.end = self.end.max(exon.end);
    }

    pub fn add_isoform(&mut self, isoform_id: IsoformId) {
        if !self.isoform_ids.contains(&isoform_id) {
            self.isoform_ids.push(isoform_id);
        }
    }

    /// Isoforms in first-seen order.
    pub fn isoform_ids(&self) -> &[IsoformId] {
        &self.isoform_ids
    }

    pub fn max_fold_change(&self) -> Option<f64> {
        self.max_fold_change
    }

    pub fn set_max_fold_change(&mut self, value: Option<f64>) {
        self.max_fold_change = value;
    }
}
