//! The loaded dataset and the single place where it is replaced.
//!
//! Loads parse into fresh values and only swap them in on success, so readers
//! holding an `Arc` from an earlier call keep a consistent snapshot.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::annotation::{AnnotationBuilder, AnnotationModel, GtfError};
use crate::config::{ConfigError, Manifest, Thresholds};
use crate::dominance::{DominanceAnalyzer, DominanceResult};
use crate::expression::{ExpressionData, ExpressionLoader, ExpressionPaths, LoadError};
use crate::fold_change::{FoldChangeJob, FoldChangeTable};
use crate::model::types::GeneId;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("a fold change update is already running")]
    Busy,

    #[error("no annotation loaded")]
    NoAnnotation,

    #[error("no expression data loaded")]
    NoExpression,

    #[error(transparent)]
    Gtf(#[from] GtfError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Default)]
pub struct Workspace {
    annotation: Option<Arc<AnnotationModel>>,
    expression: Option<Arc<ExpressionData>>,
    thresholds: Thresholds,
    job: Option<FoldChangeJob>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Result<Self, WorkspaceError> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            ..Self::default()
        })
    }

    pub fn annotation(&self) -> Option<Arc<AnnotationModel>> {
        self.annotation.clone()
    }

    pub fn expression(&self) -> Option<Arc<ExpressionData>> {
        self.expression.clone()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Replace the thresholds; invalid values leave the current ones in place.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) -> Result<(), WorkspaceError> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn load_gtf(&mut self, path: impl AsRef<Path>) -> Result<Arc<AnnotationModel>, WorkspaceError> {
        let model = AnnotationBuilder::new().build_from_path(path)?;
        Ok(self.publish_annotation(model))
    }

    /// Publish an already built model, e.g. one restored from a cache file.
    pub fn publish_annotation(&mut self, model: AnnotationModel) -> Arc<AnnotationModel> {
        let model = Arc::new(model);
        self.stop_job();
        self.annotation = Some(Arc::clone(&model));
        model
    }

    pub fn load_expression(&mut self, paths: &ExpressionPaths) -> Result<Arc<ExpressionData>, WorkspaceError> {
        let data = Arc::new(ExpressionLoader::new().load_from_paths(paths)?);
        self.stop_job();
        self.expression = Some(Arc::clone(&data));
        // cached fold changes were computed against the previous matrix
        if let Some(model) = self.annotation.as_mut() {
            let genes = model.genes.len();
            Arc::make_mut(model).apply_max_fold_changes((0..genes).map(|gid| (gid, None)));
        }
        Ok(data)
    }

    /// Load every file a manifest names. Nothing is published unless all of them parse.
    pub fn load_manifest(&mut self, path: impl AsRef<Path>) -> Result<(), WorkspaceError> {
        let manifest = Manifest::from_path(path)?;
        let model = AnnotationBuilder::new().build_from_path(&manifest.gtf)?;
        let data = ExpressionLoader::new().load_from_paths(&manifest.expression_paths())?;

        self.stop_job();
        self.annotation = Some(Arc::new(model));
        self.expression = Some(Arc::new(data));
        info!("Workspace ready: {}", manifest.gtf.display());
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.job.as_ref().is_some_and(FoldChangeJob::is_busy)
    }

    pub fn start_fold_change_update(&mut self) -> Result<(), WorkspaceError> {
        if self.is_busy() {
            return Err(WorkspaceError::Busy);
        }
        let annotation = self.annotation.clone().ok_or(WorkspaceError::NoAnnotation)?;
        let expression = self.expression.clone().ok_or(WorkspaceError::NoExpression)?;
        // a finished but unclaimed job is superseded
        self.job = None;
        self.job = Some(FoldChangeJob::spawn(annotation, expression));
        Ok(())
    }

    pub fn cancel_fold_change_update(&mut self) {
        self.stop_job();
    }

    /// Wait for the running update and store its values on the genes.
    ///
    /// Returns `None` when no job was started or it was cancelled.
    pub fn finish_fold_change_update(&mut self) -> Option<FoldChangeTable> {
        let table = self.job.take()?.join()?;
        match self.annotation.as_mut() {
            Some(model) if model.genes.len() == table.len() => {
                Arc::make_mut(model).apply_max_fold_changes(table.iter());
            }
            _ => warn!("Annotation changed while fold changes were computed; discarding"),
        }
        Some(table)
    }

    /// Dominant isoforms per cluster for one gene under the current thresholds.
    pub fn dominant_isoforms(&self, gene: GeneId) -> Result<DominanceResult, WorkspaceError> {
        let annotation = self.annotation.as_deref().ok_or(WorkspaceError::NoAnnotation)?;
        let expression = self.expression.as_deref().ok_or(WorkspaceError::NoExpression)?;
        let analyzer = DominanceAnalyzer::new(annotation, expression, &self.thresholds);
        Ok(analyzer.dominant_isoforms(annotation.gene(gene)))
    }

    /// Ids of genes whose dominant isoform switches, ordered by GTF gene id.
    pub fn genes_with_isoform_switches(&self) -> Result<Vec<GeneId>, WorkspaceError> {
        let annotation = self.annotation.as_deref().ok_or(WorkspaceError::NoAnnotation)?;
        let expression = self.expression.as_deref().ok_or(WorkspaceError::NoExpression)?;
        let analyzer = DominanceAnalyzer::new(annotation, expression, &self.thresholds);

        let mut genes = analyzer.genes_with_switches();
        genes.sort_by(|a, b| a.gene_id.cmp(&b.gene_id));
        info!("{} genes with isoform switches", genes.len());
        Ok(genes.into_iter().map(|g| g.id).collect())
    }

    fn stop_job(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel();
            let _ = job.join();
        }
    }
}
