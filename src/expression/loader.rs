use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::Array2;
use thiserror::Error;

use crate::annotation::builder::open_text;
use crate::expression::labels::LabelSet;
use crate::expression::matrix::{CoordMatrix, ExpressionMatrix, IsoformIndexMap};

/// Errors raised while loading the expression side of a dataset.
///
/// Format errors carry a 1-based line number; shape mismatches compare whole
/// files and carry the two sizes instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error while reading '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("expression matrix value '{value}' on line {line} is not a number")]
    MatrixNotNumber { value: String, line: usize },

    #[error("expression matrix line {line} has {found} columns, expected {expected}")]
    RaggedMatrix {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("expression matrix has no rows")]
    MatrixSizeZero,

    #[error("expression matrix contains negative expression values")]
    NegativeExpressionInMatrix,

    #[error("isoform ID list has {labels} entries but the matrix has {columns} columns")]
    ColumnLabelsLengthMismatch { labels: usize, columns: usize },

    #[error("cell label list has {labels} entries but the matrix has {rows} rows")]
    RowLabelsLengthMismatch { labels: usize, rows: usize },

    #[error("coordinate file line {line} does not have exactly 2 columns")]
    CoordMatrixColumnsError { line: usize },

    #[error("coordinates {value} on line {line} are not numbers")]
    CoordMatrixNotNumber { value: String, line: usize },

    #[error("coordinate file has {coords} rows but the matrix has {rows} rows")]
    CoordMatrixLengthMismatch { coords: usize, rows: usize },
}

/// Everything the expression files describe, validated against each other.
#[derive(Debug, Clone)]
pub struct ExpressionData {
    pub matrix: ExpressionMatrix,
    pub isoform_index: IsoformIndexMap,
    pub labels: LabelSet,
    pub coords: Option<CoordMatrix>,
}

/// Resolved locations of the expression inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionPaths {
    pub matrix: PathBuf,
    pub isoform_ids: PathBuf,
    pub cell_labels: PathBuf,
    pub coords: Option<PathBuf>,
}

/// A named buffered input; the name shows up in I/O errors.
pub struct Source<'a> {
    pub name: String,
    pub reader: Box<dyn BufRead + 'a>,
}

impl<'a> Source<'a> {
    pub fn new(name: impl Into<String>, reader: impl BufRead + 'a) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    fn open(path: &Path) -> Result<Source<'static>, LoadError> {
        let reader = open_text(path).map_err(|e| io_error(&path.display().to_string(), e))?;
        Ok(Source {
            name: path.display().to_string(),
            reader,
        })
    }
}

/// Loads and cross-validates matrix, isoform IDs, cell labels and optional coordinates.
///
/// Checks run in a fixed order and the first failure wins:
/// matrix format, empty matrix, negative values, isoform count vs columns,
/// label count vs rows, then the coordinate file.
#[derive(Debug, Clone, Default)]
pub struct ExpressionLoader;

impl ExpressionLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_from_paths(&self, paths: &ExpressionPaths) -> Result<ExpressionData, LoadError> {
        info!("Reading expression matrix {}", paths.matrix.display());
        let matrix = Source::open(&paths.matrix)?;
        let isoform_ids = Source::open(&paths.isoform_ids)?;
        let cell_labels = Source::open(&paths.cell_labels)?;
        let coords = paths.coords.as_deref().map(Source::open).transpose()?;
        self.load(matrix, isoform_ids, cell_labels, coords)
    }

    pub fn load(
        &self,
        matrix: Source<'_>,
        isoform_ids: Source<'_>,
        cell_labels: Source<'_>,
        coords: Option<Source<'_>>,
    ) -> Result<ExpressionData, LoadError> {
        let matrix = read_matrix(matrix)?;

        let id_lines = read_lines(isoform_ids)?;
        let n_id_lines = id_lines.len();
        let (isoform_index, duplicates) = IsoformIndexMap::from_ids(id_lines);
        for id in &duplicates {
            warn!("Isoform ID {id} is listed more than once; using its last column");
        }
        if isoform_index.len() != matrix.n_isoforms() {
            return Err(LoadError::ColumnLabelsLengthMismatch {
                labels: isoform_index.len(),
                columns: matrix.n_isoforms(),
            });
        }
        // duplicates can keep the map size right while the last-wins column falls off the matrix
        if isoform_index.max_column().is_some_and(|c| c >= matrix.n_isoforms()) {
            return Err(LoadError::ColumnLabelsLengthMismatch {
                labels: n_id_lines,
                columns: matrix.n_isoforms(),
            });
        }

        let labels = LabelSet::from_labels(read_lines(cell_labels)?);
        if labels.num_cells() != matrix.n_cells() {
            return Err(LoadError::RowLabelsLengthMismatch {
                labels: labels.num_cells(),
                rows: matrix.n_cells(),
            });
        }

        let coords = match coords {
            Some(source) => {
                let coords = read_coords(source)?;
                if coords.len() != matrix.n_cells() {
                    return Err(LoadError::CoordMatrixLengthMismatch {
                        coords: coords.len(),
                        rows: matrix.n_cells(),
                    });
                }
                Some(coords)
            }
            None => None,
        };

        info!(
            "Loaded {} cells x {} isoforms in {} clusters",
            matrix.n_cells(),
            matrix.n_isoforms(),
            labels.num_clusters()
        );

        Ok(ExpressionData {
            matrix,
            isoform_index,
            labels,
            coords,
        })
    }
}

fn io_error(name: &str, source: std::io::Error) -> LoadError {
    LoadError::IoPath {
        path: name.to_string(),
        source,
    }
}

/// Whitespace-delimited numeric rows; blank lines are skipped.
fn read_matrix(source: Source<'_>) -> Result<ExpressionMatrix, LoadError> {
    let Source { name, reader } = source;
    let mut values: Vec<f64> = Vec::new();
    let mut n_cols: Option<usize> = None;
    let mut n_rows = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_error(&name, e))?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let before = values.len();
        for field in line.split_whitespace() {
            let v: f64 = field
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| LoadError::MatrixNotNumber {
                    value: field.to_string(),
                    line: line_no,
                })?;
            values.push(v);
        }
        let found = values.len() - before;

        match n_cols {
            None => n_cols = Some(found),
            Some(expected) if expected != found => {
                return Err(LoadError::RaggedMatrix {
                    line: line_no,
                    expected,
                    found,
                })
            }
            Some(_) => {}
        }
        n_rows += 1;
    }

    if n_rows == 0 {
        return Err(LoadError::MatrixSizeZero);
    }
    if values.iter().any(|&v| v < 0.0) {
        return Err(LoadError::NegativeExpressionInMatrix);
    }

    let n_cols = n_cols.unwrap_or(0);
    let values = Array2::from_shape_vec((n_rows, n_cols), values).map_err(|_| {
        LoadError::RaggedMatrix {
            line: n_rows,
            expected: n_cols,
            found: 0,
        }
    })?;
    Ok(ExpressionMatrix::new(values))
}

/// One entry per line, kept verbatim.
fn read_lines(source: Source<'_>) -> Result<Vec<String>, LoadError> {
    let Source { name, reader } = source;
    reader
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_error(&name, e))
}

fn read_coords(source: Source<'_>) -> Result<CoordMatrix, LoadError> {
    let Source { name, reader } = source;
    let mut coords = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_error(&name, e))?;
        let line_no = i + 1;

        let mut fields: Vec<&str> = line.split('\t').collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        if fields.len() != 2 {
            return Err(LoadError::CoordMatrixColumnsError { line: line_no });
        }

        match (fields[0].trim().parse::<f64>(), fields[1].trim().parse::<f64>()) {
            (Ok(x), Ok(y)) => coords.push([x, y]),
            _ => {
                return Err(LoadError::CoordMatrixNotNumber {
                    value: format!("({}, {})", fields[0], fields[1]),
                    line: line_no,
                })
            }
        }
    }

    Ok(CoordMatrix::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn src(text: &'static str) -> Source<'static> {
        Source::new("<test>", Cursor::new(text.as_bytes()))
    }

    fn load(
        matrix: &'static str,
        ids: &'static str,
        labels: &'static str,
        coords: Option<&'static str>,
    ) -> Result<ExpressionData, LoadError> {
        ExpressionLoader::new().load(src(matrix), src(ids), src(labels), coords.map(src))
    }

    #[test]
    fn loads_consistent_inputs() {
        let data = load(
            "1\t0\t3\n0 2.5 0\n\n",
            "T1\nT2\nT3\n",
            "A\nB\n",
            Some("0.5\t1.5\n-2\t3\n"),
        )
        .unwrap();

        assert_eq!(data.matrix.n_cells(), 2);
        assert_eq!(data.matrix.n_isoforms(), 3);
        assert_eq!(data.matrix.get(1, 1), 2.5);
        assert_eq!(data.isoform_index.column("T3"), Some(2));
        assert_eq!(data.labels.num_clusters(), 2);
        assert_eq!(data.coords.unwrap().get(1), Some([-2.0, 3.0]));
    }

    #[test]
    fn three_ids_for_four_columns_is_column_mismatch() {
        let err = load("1\t2\t3\t4\n", "T1\nT2\nT3\n", "A\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnLabelsLengthMismatch { labels: 3, columns: 4 }
        ));
    }

    #[test]
    fn column_check_precedes_row_check() {
        // Both the isoform list and the label list are wrong; columns are reported.
        let err = load("1\t2\n3\t4\n", "T1\n", "A\n", None).unwrap_err();
        assert!(matches!(err, LoadError::ColumnLabelsLengthMismatch { .. }));
    }

    #[test]
    fn label_count_must_match_rows() {
        let err = load("1\t2\n3\t4\n", "T1\nT2\n", "A\nB\nC\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::RowLabelsLengthMismatch { labels: 3, rows: 2 }
        ));
    }

    #[test]
    fn empty_matrix_is_rejected_before_anything_else() {
        let err = load("\n\n", "T1\n", "A\n", None).unwrap_err();
        assert!(matches!(err, LoadError::MatrixSizeZero));
    }

    #[test]
    fn negative_values_are_rejected() {
        let err = load("1\t-0.5\n", "T1\n", "A\n", None).unwrap_err();
        assert!(matches!(err, LoadError::NegativeExpressionInMatrix));
    }

    #[test]
    fn matrix_format_errors_carry_line() {
        let err = load("1\t2\n3\tx\n", "T1\nT2\n", "A\nB\n", None).unwrap_err();
        assert!(matches!(err, LoadError::MatrixNotNumber { ref value, line: 2 } if value == "x"));

        let err = load("1\t2\n3\n", "T1\nT2\n", "A\nB\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::RaggedMatrix { line: 2, expected: 2, found: 1 }
        ));
    }

    #[test]
    fn coordinate_errors() {
        let err = load("1\n2\n", "T1\n", "A\nA\n", Some("1\t2\n3\n")).unwrap_err();
        assert!(matches!(err, LoadError::CoordMatrixColumnsError { line: 2 }));

        let err = load("1\n2\n", "T1\n", "A\nA\n", Some("1\tfoo\n")).unwrap_err();
        assert!(
            matches!(err, LoadError::CoordMatrixNotNumber { ref value, line: 1 } if value == "(1, foo)")
        );

        let err = load("1\n2\n", "T1\n", "A\nA\n", Some("1\t2\n")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::CoordMatrixLengthMismatch { coords: 1, rows: 2 }
        ));
    }

    #[test]
    fn coordinates_are_only_read_after_label_check() {
        let err = load("1\n2\n", "T1\n", "A\n", Some("garbage")).unwrap_err();
        assert!(matches!(err, LoadError::RowLabelsLengthMismatch { .. }));
    }

    #[test]
    fn duplicate_isoform_ids_shrink_the_map() {
        // Two lines but one distinct ID: the map has size 1, the matrix 2 columns.
        let err = load("1\t2\n", "T1\nT1\n", "A\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnLabelsLengthMismatch { labels: 1, columns: 2 }
        ));
    }

    #[test]
    fn duplicate_isoform_ids_cannot_point_past_the_matrix() {
        // Map size 2 matches the width, but the last T1 would claim column 2.
        let err = load("1\t2\n3\t4\n", "T1\nT2\nT1\n", "A\nA\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnLabelsLengthMismatch { labels: 3, columns: 2 }
        ));

        let err = load("1\t2\n3\t4\n", "T1\nT1\nT2\n", "A\nA\n", None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnLabelsLengthMismatch { labels: 3, columns: 2 }
        ));
    }

    #[test]
    fn load_from_paths_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| {
            let p = dir.path().join(name);
            std::fs::write(&p, text).unwrap();
            p
        };
        let paths = ExpressionPaths {
            matrix: write("matrix.tsv", "5\t0\n0\t5\n"),
            isoform_ids: write("ids.txt", "T1\nT2\n"),
            cell_labels: write("labels.txt", "A\nB\n"),
            coords: None,
        };

        let data = ExpressionLoader::new().load_from_paths(&paths).unwrap();
        assert_eq!(data.matrix.n_cells(), 2);
        assert!(data.coords.is_none());

        let missing = ExpressionPaths {
            matrix: dir.path().join("nope.tsv"),
            ..paths
        };
        let err = ExpressionLoader::new().load_from_paths(&missing).unwrap_err();
        assert!(matches!(err, LoadError::IoPath { .. }));
    }
}
