use crate::expression::labels::Cluster;
use crate::expression::loader::ExpressionData;
use crate::expression::matrix::{ExpressionMatrix, IsoformIndexMap};

/// Value transform applied before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpressionScale {
    #[default]
    Raw,
    /// `log2(x + 1)`
    Log2,
}

impl ExpressionScale {
    #[inline]
    fn apply(self, v: f64) -> f64 {
        match self {
            ExpressionScale::Raw => v,
            ExpressionScale::Log2 => (v + 1.0).log2(),
        }
    }
}

/// Average and percent-expressing of one isoform in one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClusterStats {
    pub average: f64,
    /// 0..=100
    pub percent_expressed: f64,
}

/// Read-only per-cluster view over an expression matrix.
///
/// Isoforms missing from the index map, and empty clusters, report zeros.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionQuery<'a> {
    matrix: &'a ExpressionMatrix,
    index: &'a IsoformIndexMap,
    expressed_cutoff: f64,
}

impl<'a> ExpressionQuery<'a> {
    pub fn new(matrix: &'a ExpressionMatrix, index: &'a IsoformIndexMap) -> Self {
        Self {
            matrix,
            index,
            expressed_cutoff: 0.0,
        }
    }

    pub fn from_data(data: &'a ExpressionData) -> Self {
        Self::new(&data.matrix, &data.isoform_index)
    }

    /// A cell expresses an isoform when its value is strictly above `cutoff` (default 0).
    pub fn with_expressed_cutoff(mut self, cutoff: f64) -> Self {
        self.expressed_cutoff = cutoff;
        self
    }

    /// Whether the isoform has a column in the matrix.
    pub fn has_isoform(&self, isoform_id: &str) -> bool {
        self.index.contains(isoform_id)
    }

    fn values<'q>(
        &self,
        isoform_id: &str,
        cluster: &'q Cluster,
    ) -> Option<impl Iterator<Item = f64> + 'q>
    where
        'a: 'q,
    {
        let column = self.index.column(isoform_id)?;
        let matrix: &'q ExpressionMatrix = self.matrix;
        Some(cluster.cells().iter().map(move |&cell| matrix.get(cell, column)))
    }

    pub fn average_expression(&self, isoform_id: &str, cluster: &Cluster, scale: ExpressionScale) -> f64 {
        if cluster.is_empty() {
            return 0.0;
        }
        let Some(values) = self.values(isoform_id, cluster) else {
            return 0.0;
        };
        values.map(|v| scale.apply(v)).sum::<f64>() / cluster.len() as f64
    }

    /// Mean over the expressing cells only; 0 when no cell expresses.
    pub fn average_expression_in_expressing(
        &self,
        isoform_id: &str,
        cluster: &Cluster,
        scale: ExpressionScale,
    ) -> f64 {
        let Some(values) = self.values(isoform_id, cluster) else {
            return 0.0;
        };
        let (sum, n) = values
            .filter(|&v| v > self.expressed_cutoff)
            .fold((0.0, 0usize), |(sum, n), v| (sum + scale.apply(v), n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    pub fn num_expressing_cells(&self, isoform_id: &str, cluster: &Cluster) -> usize {
        self.values(isoform_id, cluster)
            .map(|values| values.filter(|&v| v > self.expressed_cutoff).count())
            .unwrap_or(0)
    }

    pub fn percent_expressed(&self, isoform_id: &str, cluster: &Cluster) -> f64 {
        if cluster.is_empty() {
            return 0.0;
        }
        self.num_expressing_cells(isoform_id, cluster) as f64 / cluster.len() as f64 * 100.0
    }

    /// Raw average and percent-expressing in a single pass.
    pub fn cluster_stats(&self, isoform_id: &str, cluster: &Cluster) -> ClusterStats {
        let Some(values) = self.values(isoform_id, cluster) else {
            return ClusterStats::default();
        };
        if cluster.is_empty() {
            return ClusterStats::default();
        }
        let (sum, expressing) = values.fold((0.0, 0usize), |(sum, n), v| {
            (sum + v, n + usize::from(v > self.expressed_cutoff))
        });
        let n = cluster.len() as f64;
        ClusterStats {
            average: sum / n,
            percent_expressed: expressing as f64 / n * 100.0,
        }
    }
}
