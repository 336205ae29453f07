use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, Axis};

/// Dense cells × isoforms expression table.
///
/// Invariants (checked by the loader): at least one row, no negative entry,
/// column count equal to the isoform index map size, every mapped column in range.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    values: Array2<f64>,
}

impl ExpressionMatrix {
    pub(crate) fn new(values: Array2<f64>) -> Self {
        Self { values }
    }

    pub fn n_cells(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_isoforms(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, cell: usize, column: usize) -> f64 {
        self.values[[cell, column]]
    }

    /// All cells' values for one isoform column.
    pub fn column(&self, column: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), column)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

/// Isoform ID → matrix column. Built once, immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsoformIndexMap {
    columns: HashMap<String, usize>,
}

impl IsoformIndexMap {
    /// Assign columns in order; a repeated ID keeps the index of its last occurrence.
    ///
    /// Returns the map and the IDs that were seen more than once.
    pub fn from_ids<I, S>(ids: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = HashMap::new();
        let mut duplicates = Vec::new();
        for (index, id) in ids.into_iter().enumerate() {
            let id = id.into();
            if let Some(_previous) = columns.insert(id.clone(), index) {
                duplicates.push(id);
            }
        }
        (Self { columns }, duplicates)
    }

    pub fn column(&self, isoform_id: &str) -> Option<usize> {
        self.columns.get(isoform_id).copied()
    }

    pub fn contains(&self, isoform_id: &str) -> bool {
        self.columns.contains_key(isoform_id)
    }

    /// Highest column any ID maps to.
    pub fn max_column(&self) -> Option<usize> {
        self.columns.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Per-cell 2-D embedding coordinates (e.g. t-SNE), one row per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordMatrix {
    coords: Vec<[f64; 2]>,
}

impl CoordMatrix {
    pub(crate) fn new(coords: Vec<[f64; 2]>) -> Self {
        Self { coords }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn get(&self, cell: usize) -> Option<[f64; 2]> {
        self.coords.get(cell).copied()
    }
}
