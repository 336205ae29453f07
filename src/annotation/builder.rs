use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use crate::annotation::io::{GtfError, GtfReader};
use crate::annotation::model::AnnotationModel;

/// High-level entry point for building an `AnnotationModel` from a GTF file.
///
/// - parses the whole file (optionally gzipped)
/// - only `exon` features contribute
/// - returns a fresh model; nothing is published when parsing fails
#[derive(Debug, Clone, Default)]
pub struct AnnotationBuilder;

impl AnnotationBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a model from anything implementing `BufRead`.
    ///
    /// # Example
    /// ```
    /// use std::io::Cursor;
    /// use isoform_switch::AnnotationBuilder;
    ///
    /// let gtf = "\
    /// chr1\t.\texon\t100\t200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
    /// chr1\t.\texon\t150\t250\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T2\";\n";
    ///
    /// let model = AnnotationBuilder::new()
    ///     .build_from_reader(Cursor::new(gtf.as_bytes()))
    ///     .unwrap();
    ///
    /// let gene = model.gene_by_key("G1").unwrap();
    /// assert_eq!((gene.start(), gene.end()), (100, 250));
    /// assert_eq!(gene.isoform_ids().len(), 2);
    /// ```
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> Result<AnnotationModel, GtfError> {
        let mut model = AnnotationModel::new();
        let mut gtf = GtfReader::new(reader);

        while let Some(rec) = gtf.next_exon() {
            model.add_exon_record(&rec?);
        }

        debug!(
            "GTF: {} lines read, {} non-exon lines skipped",
            gtf.lines_read(),
            gtf.lines_skipped()
        );
        info!(
            "Parsed {} genes, {} isoforms, {} exons",
            model.genes.len(),
            model.isoforms.len(),
            model.exon_count()
        );

        Ok(model)
    }

    /// Build a model from a file path.
    ///
    /// - If path ends with `.gz`, uses the gzip decoder.
    /// - Otherwise reads as plain text.
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> Result<AnnotationModel, GtfError> {
        let path = path.as_ref();
        info!("Reading GTF annotation {}", path.display());

        let reader = open_text(path).map_err(|e| GtfError::IoPath {
            path: path.display().to_string(),
            source: e,
        })?;

        // Re-tag reader I/O failures with the real path.
        self.build_from_reader(reader).map_err(|e| match e {
            GtfError::IoPath { source, .. } => GtfError::IoPath {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }
}

/// Open a text file for buffered reading, transparently gunzipping `.gz` files.
pub fn open_text(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = std::fs::File::open(path)?;

    let is_gz = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gz {
        let decoder = flate2::read::GzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

// -------------------- tests --------------------
