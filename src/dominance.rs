//! Dominant isoforms per cluster and dominant-isoform switch detection.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::annotation::AnnotationModel;
use crate::config::Thresholds;
use crate::expression::{ClusterStats, ExpressionData, ExpressionQuery, LabelSet};
use crate::model::gene::Gene;
use crate::model::types::{ClusterId, IsoformId};

/// Expression ratio beyond which one isoform clearly dominates another.
pub const DOMINANCE_RATIO: f64 = 1.1;

/// Cluster → isoforms judged dominant there. Clusters with no dominant isoform are absent.
pub type DominanceResult = BTreeMap<ClusterId, BTreeSet<IsoformId>>;

/// Decides dominant isoforms for a gene from per-cluster expression.
#[derive(Debug, Clone, Copy)]
pub struct DominanceAnalyzer<'a> {
    annotation: &'a AnnotationModel,
    labels: &'a LabelSet,
    query: ExpressionQuery<'a>,
    min_tpm: f64,
    min_percent_expressed: f64,
}

impl<'a> DominanceAnalyzer<'a> {
    pub fn new(annotation: &'a AnnotationModel, data: &'a ExpressionData, thresholds: &Thresholds) -> Self {
        Self {
            annotation,
            labels: &data.labels,
            query: ExpressionQuery::from_data(data).with_expressed_cutoff(thresholds.expressed_cutoff),
            min_tpm: thresholds.min_tpm,
            min_percent_expressed: thresholds.min_percent_expressed,
        }
    }

    /// Dominant isoform set of `gene` in every cluster that has one.
    pub fn dominant_isoforms(&self, gene: &Gene) -> DominanceResult {
        let mut result = DominanceResult::new();
        for cluster in self.labels.clusters() {
            let mut running: Vec<(IsoformId, ClusterStats)> = Vec::new();
            for isoform in self.annotation.isoforms_of(gene) {
                let stats = self.query.cluster_stats(&isoform.isoform_id, cluster);
                if stats.average >= self.min_tpm && stats.percent_expressed >= self.min_percent_expressed {
                    update_dominant_set(&mut running, isoform.id, stats);
                }
            }
            if !running.is_empty() {
                result.insert(cluster.id, running.into_iter().map(|(id, _)| id).collect());
            }
        }
        result
    }

    /// True when at least two clusters have different non-empty dominant sets.
    pub fn gene_has_isoform_switches(&self, gene: &Gene) -> bool {
        has_switch(&self.dominant_isoforms(gene))
    }

    /// Genes with a dominant-isoform switch, in annotation order.
    pub fn genes_with_switches(&self) -> Vec<&'a Gene> {
        let missing = self
            .annotation
            .isoforms
            .iter()
            .filter(|t| !self.query.has_isoform(&t.isoform_id))
            .count();
        if missing > 0 {
            warn!("{missing} annotated isoforms have no column in the expression matrix");
        }

        self.annotation
            .genes
            .iter()
            .filter(|g| self.gene_has_isoform_switches(g))
            .collect()
    }
}

/// True when the collected dominant sets are not all equal.
pub fn has_switch(result: &DominanceResult) -> bool {
    let mut sets = result.values();
    match sets.next() {
        Some(first) => sets.any(|other| other != first),
        None => false,
    }
}

/// Compare a qualifying candidate against the running dominant set of one cluster.
///
/// With `ratio = candidate / member` for each current member:
/// - `ratio < 1/1.1`: the candidate is dominated and discarded.
/// - `ratio > 1.1`: the member is dominated and removed.
/// - `1 < ratio <= 1.1`: the member is removed only if it is expressed in fewer cells.
/// - `ratio == 1`: the candidate is discarded if it is expressed in fewer cells.
/// - `1/1.1 <= ratio < 1`: no change; comparison continues.
///
/// A candidate that is never discarded joins the set. Members removed before a
/// discard stay removed.
pub fn update_dominant_set(
    running: &mut Vec<(IsoformId, ClusterStats)>,
    candidate: IsoformId,
    stats: ClusterStats,
) {
    let mut i = 0;
    while i < running.len() {
        let member = running[i].1;
        let ratio = stats.average / member.average;

        if ratio < 1.0 / DOMINANCE_RATIO {
            return;
        }
        if ratio > DOMINANCE_RATIO {
            running.remove(i);
            continue;
        }
        if ratio > 1.0 {
            if member.percent_expressed < stats.percent_expressed {
                running.remove(i);
                continue;
            }
        } else if ratio == 1.0 && stats.percent_expressed < member.percent_expressed {
            return;
        }
        i += 1;
    }
    running.push((candidate, stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationBuilder;
    use crate::expression::{ExpressionLoader, Source};
    use std::io::Cursor;

    fn stats(average: f64, percent_expressed: f64) -> ClusterStats {
        ClusterStats {
            average,
            percent_expressed,
        }
    }

    fn ids(running: &[(IsoformId, ClusterStats)]) -> Vec<IsoformId> {
        running.iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn lone_candidate_is_dominant() {
        let mut running = Vec::new();
        update_dominant_set(&mut running, 7, stats(12.0, 55.0));
        assert_eq!(ids(&running), vec![7]);
    }

    #[test]
    fn much_higher_candidate_replaces_member() {
        let mut running = vec![(0, stats(10.0, 90.0))];
        update_dominant_set(&mut running, 1, stats(20.0, 60.0));
        assert_eq!(ids(&running), vec![1]);
    }

    #[test]
    fn much_lower_candidate_is_discarded() {
        let mut running = vec![(0, stats(20.0, 60.0))];
        update_dominant_set(&mut running, 1, stats(10.0, 100.0));
        assert_eq!(ids(&running), vec![0]);
    }

    #[test]
    fn exact_tie_keeps_both() {
        let mut running = vec![(0, stats(15.0, 70.0))];
        update_dominant_set(&mut running, 1, stats(15.0, 70.0));
        assert_eq!(ids(&running), vec![0, 1]);
    }

    #[test]
    fn exact_ratio_with_lower_percent_discards_candidate() {
        let mut running = vec![(0, stats(15.0, 80.0))];
        update_dominant_set(&mut running, 1, stats(15.0, 70.0));
        assert_eq!(ids(&running), vec![0]);
    }

    #[test]
    fn slightly_higher_candidate_removes_less_widespread_member() {
        let mut running = vec![(0, stats(10.0, 60.0))];
        update_dominant_set(&mut running, 1, stats(10.5, 80.0));
        assert_eq!(ids(&running), vec![1]);

        let mut running = vec![(0, stats(10.0, 90.0))];
        update_dominant_set(&mut running, 1, stats(10.5, 80.0));
        assert_eq!(ids(&running), vec![0, 1]);
    }

    #[test]
    fn slightly_lower_candidate_is_kept_even_if_less_widespread() {
        // 10 / 10.5 lies in [1/1.1, 1): neither side is removed.
        let mut running = vec![(0, stats(10.5, 90.0))];
        update_dominant_set(&mut running, 1, stats(10.0, 50.0));
        assert_eq!(ids(&running), vec![0, 1]);
    }

    #[test]
    fn ratio_boundaries() {
        // (member, candidate, expected ids)
        let cases = [
            // 11 / 10 == 1.1 is the near-tie band, not a clear win
            ((10.0, 90.0), (11.0, 80.0), vec![0, 1]),
            ((10.0, 60.0), (11.0, 80.0), vec![1]),
            // 1.0 / 1.1 is the lower edge of the near-tie band
            ((1.1, 90.0), (1.0, 10.0), vec![0, 1]),
            // exact tie only discards on a lower percent
            ((10.0, 50.0), (10.0, 50.0), vec![0, 1]),
            ((10.0, 50.0), (10.0, 40.0), vec![0]),
        ];
        for ((m_avg, m_pct), (c_avg, c_pct), expected) in cases {
            let mut running = vec![(0, stats(m_avg, m_pct))];
            update_dominant_set(&mut running, 1, stats(c_avg, c_pct));
            assert_eq!(ids(&running), expected, "member {m_avg}, candidate {c_avg}");
        }
    }

    #[test]
    fn removals_stick_when_candidate_is_later_discarded() {
        let mut running = vec![(0, stats(10.0, 60.0)), (1, stats(30.0, 60.0))];
        update_dominant_set(&mut running, 2, stats(20.0, 60.0));
        assert_eq!(ids(&running), vec![1]);
    }

    #[test]
    fn candidate_can_clear_several_members() {
        let mut running = vec![(0, stats(10.0, 60.0)), (1, stats(10.0, 60.0))];
        update_dominant_set(&mut running, 2, stats(30.0, 60.0));
        assert_eq!(ids(&running), vec![2]);
    }

    #[test]
    fn switch_detection_over_sets() {
        let mut r = DominanceResult::new();
        assert!(!has_switch(&r));

        r.insert(0, BTreeSet::from([1]));
        assert!(!has_switch(&r));

        r.insert(1, BTreeSet::from([1]));
        assert!(!has_switch(&r));

        r.insert(2, BTreeSet::from([1, 2]));
        assert!(has_switch(&r));
    }

    // cells 0..5 in A, 5..10 in B
    const LABELS: &str = "A\nA\nA\nA\nA\nB\nB\nB\nB\nB\n";

    fn analyse(gtf: &str, matrix: &'static str, ids: &'static str) -> (AnnotationModel, ExpressionData) {
        let model = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();
        let data = ExpressionLoader::new()
            .load(
                Source::new("m", Cursor::new(matrix.as_bytes())),
                Source::new("i", Cursor::new(ids.as_bytes())),
                Source::new("l", Cursor::new(LABELS.as_bytes())),
                None,
            )
            .unwrap();
        (model, data)
    }

    const GTF: &str = "\
chr1\t.\texon\t100\t200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\t.\texon\t150\t250\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T2\";
";

    #[test]
    fn gene_switches_between_clusters() {
        // A: T1 averages 20 with 60% expressing, T2 silent.
        // B: T2 averages 20 with 60% expressing, T1 silent.
        let matrix = "\
40\t0
30\t0
30\t0
0\t0
0\t0
0\t40
0\t30
0\t30
0\t0
0\t0
";
        let (model, data) = analyse(GTF, matrix, "T1\nT2\n");
        let analyzer = DominanceAnalyzer::new(&model, &data, &Thresholds::default());
        let gene = model.gene_by_key("G1").unwrap();

        let result = analyzer.dominant_isoforms(gene);
        let t1 = model.isoform_by_key("G1", "T1").unwrap().id;
        let t2 = model.isoform_by_key("G1", "T2").unwrap().id;
        assert_eq!(result.get(&0), Some(&BTreeSet::from([t1])));
        assert_eq!(result.get(&1), Some(&BTreeSet::from([t2])));
        assert!(analyzer.gene_has_isoform_switches(gene));
        assert_eq!(analyzer.genes_with_switches().len(), 1);
    }

    #[test]
    fn same_dominant_everywhere_is_not_a_switch() {
        let matrix = "\
20\t1
20\t1
20\t1
0\t0
0\t0
20\t1
20\t1
20\t1
0\t0
0\t0
";
        let (model, data) = analyse(GTF, matrix, "T1\nT2\n");
        let analyzer = DominanceAnalyzer::new(&model, &data, &Thresholds::default());
        let gene = model.gene_by_key("G1").unwrap();

        let result = analyzer.dominant_isoforms(gene);
        assert_eq!(result.len(), 2);
        assert!(!analyzer.gene_has_isoform_switches(gene));
    }

    #[test]
    fn below_threshold_clusters_are_omitted() {
        // Only cluster A reaches the thresholds.
        let matrix = "\
20\t0
20\t0
20\t0
0\t0
0\t0
5\t0
5\t0
0\t0
0\t0
0\t0
";
        let (model, data) = analyse(GTF, matrix, "T1\nT2\n");
        let analyzer = DominanceAnalyzer::new(&model, &data, &Thresholds::default());
        let gene = model.gene_by_key("G1").unwrap();

        let result = analyzer.dominant_isoforms(gene);
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert!(!analyzer.gene_has_isoform_switches(gene));
    }

    #[test]
    fn isoforms_missing_from_matrix_never_dominate() {
        let matrix = "\
20
20
20
0
0
20
20
20
0
0
";
        let (model, data) = analyse(GTF, matrix, "T1\n");
        let analyzer = DominanceAnalyzer::new(&model, &data, &Thresholds::default());
        let gene = model.gene_by_key("G1").unwrap();
        let t1 = model.isoform_by_key("G1", "T1").unwrap().id;

        let result = analyzer.dominant_isoforms(gene);
        assert!(result.values().all(|set| set == &BTreeSet::from([t1])));
        assert!(analyzer.genes_with_switches().is_empty());
    }
}
