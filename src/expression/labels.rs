use std::collections::HashMap;

use crate::model::types::ClusterId;

/// A named group of cells (matrix row indices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    cells: Vec<usize>,
}

impl Cluster {
    fn new(id: ClusterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            cells: Vec::new(),
        }
    }

    /// Member cell rows, ascending.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Assignment of every cell row to exactly one cluster.
///
/// Clusters are numbered in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    clusters: Vec<Cluster>,
    cell_to_cluster: Vec<ClusterId>,
    by_name: HashMap<String, ClusterId>,
}

impl LabelSet {
    /// Build from one label per cell, cell `i` taking `labels[i]`.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = LabelSet::default();
        for label in labels {
            set.push_cell(label.as_ref());
        }
        set
    }

    fn push_cell(&mut self, label: &str) {
        let cell = self.cell_to_cluster.len();
        let cid = match self.by_name.get(label) {
            Some(&cid) => cid,
            None => {
                let cid = self.clusters.len();
                self.clusters.push(Cluster::new(cid, label));
                self.by_name.insert(label.to_string(), cid);
                cid
            }
        };
        self.clusters[cid].cells.push(cell);
        self.cell_to_cluster.push(cid);
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id]
    }

    pub fn cluster_by_name(&self, name: &str) -> Option<&Cluster> {
        self.by_name.get(name).map(|&cid| &self.clusters[cid])
    }

    /// Cluster of a cell row, `None` if the row is out of range.
    pub fn cluster_of(&self, cell: usize) -> Option<&Cluster> {
        self.cell_to_cluster.get(cell).map(|&cid| &self.clusters[cid])
    }

    pub fn num_cells(&self) -> usize {
        self.cell_to_cluster.len()
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_group_cells_by_exact_name() {
        let set = LabelSet::from_labels(["T Cells", "B Cells", "T Cells", "t cells"]);

        assert_eq!(set.num_cells(), 4);
        assert_eq!(set.num_clusters(), 3);

        let t = set.cluster_by_name("T Cells").unwrap();
        assert_eq!(t.id, 0);
        assert_eq!(t.cells(), &[0, 2]);
        assert_eq!(set.cluster_of(1).unwrap().name, "B Cells");
        assert_eq!(set.cluster_of(3).unwrap().name, "t cells");
        assert!(set.cluster_of(4).is_none());
    }

    #[test]
    fn every_cell_in_exactly_one_cluster() {
        let set = LabelSet::from_labels(["a", "b", "a", "c", "b", "a"]);
        let total: usize = set.clusters().iter().map(|c| c.len()).sum();
        assert_eq!(total, set.num_cells());
        for cell in 0..set.num_cells() {
            let owners = set
                .clusters()
                .iter()
                .filter(|c| c.cells().contains(&cell))
                .count();
            assert_eq!(owners, 1);
        }
    }
}
