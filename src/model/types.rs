/// Internal numeric IDs (indexes into Vecs).
pub type GeneId = usize;
pub type IsoformId = usize;

/// Index of a cluster within one `LabelSet`.
pub type ClusterId = usize;
