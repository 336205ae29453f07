//! Per-gene maximum fold change across clusters, and the background job that
//! recomputes it for a whole annotation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info};
use rayon::prelude::*;

use crate::annotation::AnnotationModel;
use crate::expression::{ExpressionData, ExpressionQuery, ExpressionScale, LabelSet};
use crate::model::gene::Gene;
use crate::model::types::GeneId;

/// Max over clusters of the isoform's raw average divided by the min over clusters.
///
/// `None` with fewer than two clusters or when the isoform is silent everywhere;
/// `+inf` when some cluster averages exactly zero and another does not.
pub fn isoform_fold_change(query: &ExpressionQuery<'_>, labels: &LabelSet, isoform_id: &str) -> Option<f64> {
    if labels.num_clusters() < 2 {
        return None;
    }
    let (min, max) = labels
        .clusters()
        .iter()
        .map(|c| query.average_expression(isoform_id, c, ExpressionScale::Raw))
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if max <= 0.0 {
        None
    } else if min <= 0.0 {
        Some(f64::INFINITY)
    } else {
        Some(max / min)
    }
}

/// Largest isoform fold change of a gene.
pub fn gene_max_fold_change(
    annotation: &AnnotationModel,
    query: &ExpressionQuery<'_>,
    labels: &LabelSet,
    gene: &Gene,
) -> Option<f64> {
    annotation
        .isoforms_of(gene)
        .filter_map(|t| isoform_fold_change(query, labels, &t.isoform_id))
        .max_by(f64::total_cmp)
}

/// Max fold change per gene, indexed by `GeneId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldChangeTable {
    values: Vec<Option<f64>>,
}

impl FoldChangeTable {
    /// Compute for every gene, spreading genes over the rayon pool.
    ///
    /// Returns `None` as soon as `cancel` is observed set.
    pub fn compute(
        annotation: &AnnotationModel,
        data: &ExpressionData,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        let query = ExpressionQuery::from_data(data);
        let values = annotation
            .genes
            .par_iter()
            .map(|gene| {
                if cancel.load(Ordering::Relaxed) {
                    None
                } else {
                    Some(gene_max_fold_change(annotation, &query, &data.labels, gene))
                }
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { values })
    }

    pub fn get(&self, gene: GeneId) -> Option<f64> {
        self.values.get(gene).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneId, Option<f64>)> + '_ {
        self.values.iter().copied().enumerate()
    }

    /// Genes whose max fold change is at least `min_fold_change`, largest first.
    pub fn genes_at_least(&self, min_fold_change: f64) -> Vec<(GeneId, f64)> {
        let mut hits: Vec<(GeneId, f64)> = self
            .iter()
            .filter_map(|(gid, v)| v.filter(|&v| v >= min_fold_change).map(|v| (gid, v)))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits
    }
}

/// Fold-change recomputation running on a background thread.
///
/// The inputs are shared immutably for the lifetime of the job; the caller is
/// expected to `cancel()` and `join()` before replacing them.
pub struct FoldChangeJob {
    handle: Option<JoinHandle<Option<FoldChangeTable>>>,
    cancel: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
}

impl FoldChangeJob {
    pub fn spawn(annotation: Arc<AnnotationModel>, data: Arc<ExpressionData>) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(true));

        let handle = {
            let cancel = Arc::clone(&cancel);
            let busy = Arc::clone(&busy);
            std::thread::spawn(move || {
                info!("Updating max fold change for {} genes", annotation.genes.len());
                let table = FoldChangeTable::compute(&annotation, &data, &cancel);
                match &table {
                    Some(t) => info!("Max fold change updated for {} genes", t.len()),
                    None => debug!("Max fold change update cancelled"),
                }
                busy.store(false, Ordering::Release);
                table
            })
        };

        Self {
            handle: Some(handle),
            cancel,
            busy,
        }
    }

    /// True while the worker is still computing.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Ask the worker to stop; it finishes the genes already in flight.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker. `None` if it was cancelled or panicked.
    pub fn join(mut self) -> Option<FoldChangeTable> {
        self.handle.take()?.join().ok().flatten()
    }
}

impl Drop for FoldChangeJob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel();
            let _ = handle.join();
        }
    }
}
