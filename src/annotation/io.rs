use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::types::{Exon, Strand};

/// Number of tab-separated columns in a GTF line.
pub const GTF_FIELDS: usize = 9;

/// Feature type (column 3) that carries exon records.
pub const EXON_FEATURE: &str = "exon";

/// `key "value"` with optional surrounding whitespace.
static ATTRIBUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(\S+)\s*"(\S+)"\s*$"#).expect("valid attribute regex"));

/// Parsing errors for GTF input. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum GtfError {
    #[error("I/O error while reading '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid start nucleotide on line {line} of the GTF file")]
    InvalidStartNucleotide { line: usize },

    #[error("invalid end nucleotide on line {line} of the GTF file")]
    InvalidEndNucleotide { line: usize },

    #[error("missing gene_id or transcript_id attribute on line {line} of the GTF file")]
    MissingAttributesInfo { line: usize },
}

impl GtfError {
    /// Line the error was raised on, if it is a line-level error.
    pub fn line(&self) -> Option<usize> {
        match self {
            GtfError::IoPath { .. } => None,
            GtfError::InvalidStartNucleotide { line }
            | GtfError::InvalidEndNucleotide { line }
            | GtfError::MissingAttributesInfo { line } => Some(*line),
        }
    }
}

/// One exon line of a GTF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonRecord {
    pub line_no: usize,
    pub chromosome: String,
    pub exon: Exon,
    pub strand: Strand,
    pub gene_id: String,
    pub transcript_id: String,
    pub gene_name: Option<String>,
    pub transcript_name: Option<String>,
}

/// Streaming reader yielding the exon records of a GTF file.
///
/// Most users should go through [`crate::annotation::AnnotationBuilder`],
/// which folds these records into an `AnnotationModel`.
///
/// # Example
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use isoform_switch::annotation::io::GtfReader;
///
/// let file = File::open("genes.gtf").unwrap();
/// for rec in GtfReader::new(BufReader::new(file)).exons() {
///     let rec = rec.unwrap();
///     println!("{} {}-{}", rec.transcript_id, rec.exon.start, rec.exon.end);
/// }
/// ```
pub struct GtfReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
    skipped: usize,
}

impl<R: BufRead> GtfReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines read so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }

    /// Lines that were not exon records (comments, other features, wrong field count).
    pub fn lines_skipped(&self) -> usize {
        self.skipped
    }

    /// Next exon record, `None` at end of input.
    pub fn next_exon(&mut self) -> Option<Result<ExonRecord, GtfError>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(GtfError::IoPath {
                        path: "<reader>".to_string(),
                        source: e,
                    }))
                }
            }
            self.line_no += 1;

            let line = self.buf.trim_end_matches(['\n', '\r']);
            let fields = split_fields(strip_comment(line));
            if fields.len() != GTF_FIELDS || fields[2] != EXON_FEATURE {
                self.skipped += 1;
                continue;
            }

            return Some(parse_exon_fields(&fields, self.line_no));
        }
    }

    /// Iterator over exon records; stops being useful after the first error.
    pub fn exons(mut self) -> impl Iterator<Item = Result<ExonRecord, GtfError>> {
        std::iter::from_fn(move || self.next_exon())
    }
}

/// Drop everything from the first `#` on.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Tab split that ignores trailing empty fields.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.split('\t').collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Parse the nine fields of an exon line.
///
/// Coordinates must be bare unsigned integers: whitespace padding, minus signs
/// and decimals are invalid. `gene_id` and `transcript_id` are mandatory. The
/// strand column is accepted as is (see [`Strand::from_gtf`]).
pub fn parse_exon_fields(fields: &[&str], line_no: usize) -> Result<ExonRecord, GtfError> {
    let start: u64 = fields[3]
        .parse()
        .map_err(|_| GtfError::InvalidStartNucleotide { line: line_no })?;
    let end: u64 = fields[4]
        .parse()
        .map_err(|_| GtfError::InvalidEndNucleotide { line: line_no })?;

    let attrs = parse_attributes(fields[8]);
    let (Some(gene_id), Some(transcript_id)) = (attrs.gene_id, attrs.transcript_id) else {
        return Err(GtfError::MissingAttributesInfo { line: line_no });
    };

    Ok(ExonRecord {
        line_no,
        chromosome: fields[0].to_string(),
        exon: Exon::new(start, end),
        strand: Strand::from_gtf(fields[6]),
        gene_id,
        transcript_id,
        gene_name: attrs.gene_name,
        transcript_name: attrs.transcript_name,
    })
}

/// The attribute keys this crate understands. Later duplicates on one line win.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExonAttributes {
    pub gene_id: Option<String>,
    pub transcript_id: Option<String>,
    pub gene_name: Option<String>,
    pub transcript_name: Option<String>,
}

pub fn parse_attributes(s: &str) -> ExonAttributes {
    let mut attrs = ExonAttributes::default();
    for part in s.split(';') {
        let Some(caps) = ATTRIBUTE_RE.captures(part) else {
            continue;
        };
        let value = caps[2].to_string();
        match &caps[1] {
            "gene_id" => attrs.gene_id = Some(value),
            "transcript_id" => attrs.transcript_id = Some(value),
            "gene_name" => attrs.gene_name = Some(value),
            "transcript_name" => attrs.transcript_name = Some(value),
            _ => {}
        }
    }
    attrs
}
