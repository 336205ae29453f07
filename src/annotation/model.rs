use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotation::io::ExonRecord;
use crate::model::gene::Gene;
use crate::model::isoform::Isoform;
use crate::model::types::{GeneId, IsoformId};

const MAGIC: &[u8; 4] = b"ISW1";
const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// The owning annotation container:
/// - gene table + isoform table (isoforms refer to genes by index)
/// - lookups from stable GTF identifiers to internal ids
///
/// Isoforms are keyed by (gene, transcript_id): the same transcript id under
/// two different genes yields two isoforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationModel {
    pub genes: Vec<Gene>,
    pub isoforms: Vec<Isoform>,
    gene_lookup: HashMap<String, GeneId>,
    isoform_lookup: HashMap<(GeneId, String), IsoformId>,
    exon_count: usize,
}

/// Summary: totals, then per-chromosome gene/isoform counts in name order.
impl fmt::Display for AnnotationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut per_chr: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for gene in &self.genes {
            let entry = per_chr.entry(gene.chromosome.as_str()).or_default();
            entry.0 += 1;
            entry.1 += gene.isoform_ids().len();
        }

        writeln!(
            f,
            "AnnotationModel: {} genes, {} isoforms, {} exons, {} chromosomes",
            self.genes.len(),
            self.isoforms.len(),
            self.exon_count,
            per_chr.len()
        )?;
        for (chr, (genes, isoforms)) in per_chr {
            writeln!(f, "  - {chr}: genes={genes}, isoforms={isoforms}")?;
        }
        Ok(())
    }
}

impl AnnotationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn exon_count(&self) -> usize {
        self.exon_count
    }

    pub fn gene(&self, id: GeneId) -> &Gene {
        &self.genes[id]
    }

    pub fn isoform(&self, id: IsoformId) -> &Isoform {
        &self.isoforms[id]
    }

    /// Look a gene up by its GTF `gene_id`.
    pub fn gene_by_key(&self, gene_id: &str) -> Option<&Gene> {
        self.gene_lookup.get(gene_id).map(|&id| &self.genes[id])
    }

    /// Look an isoform up by its gene's `gene_id` and its own `transcript_id`.
    pub fn isoform_by_key(&self, gene_id: &str, transcript_id: &str) -> Option<&Isoform> {
        let &gid = self.gene_lookup.get(gene_id)?;
        self.isoform_lookup
            .get(&(gid, transcript_id.to_string()))
            .map(|&id| &self.isoforms[id])
    }

    /// Isoforms of `gene`, in first-seen order.
    pub fn isoforms_of<'a>(&'a self, gene: &'a Gene) -> impl Iterator<Item = &'a Isoform> + 'a {
        gene.isoform_ids().iter().map(move |&id| &self.isoforms[id])
    }

    /// Fold one exon record into the model.
    ///
    /// Gene and isoform are created on first sight (the gene captures chromosome
    /// and strand from that line); names are only set while still unset; the gene
    /// span is widened to include the exon.
    pub fn add_exon_record(&mut self, rec: &ExonRecord) -> (GeneId, IsoformId) {
        let gid = self.intern_gene(rec);
        let tid = self.intern_isoform(gid, rec);

        self.isoforms[tid].add_exon(rec.exon);
        self.exon_count += 1;

        let gene = &mut self.genes[gid];
        gene.include_exon(rec.exon);
        if let Some(name) = &rec.gene_name {
            gene.set_name_if_unset(name);
        }
        if let Some(name) = &rec.transcript_name {
            self.isoforms[tid].set_name_if_unset(name);
        }

        (gid, tid)
    }

    /// Write `Gene::max_fold_change` for every gene listed.
    pub fn apply_max_fold_changes<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (GeneId, Option<f64>)>,
    {
        for (gid, value) in values {
            if let Some(gene) = self.genes.get_mut(gid) {
                gene.set_max_fold_change(value);
            }
        }
    }

    // -----------------------
    // Internal helpers
    // -----------------------

    fn intern_gene(&mut self, rec: &ExonRecord) -> GeneId {
        if let Some(&gid) = self.gene_lookup.get(&rec.gene_id) {
            return gid;
        }
        let gid = self.genes.len();
        self.genes.push(Gene::new(
            gid,
            rec.gene_id.clone(),
            rec.chromosome.clone(),
            rec.strand,
            rec.exon,
        ));
        self.gene_lookup.insert(rec.gene_id.clone(), gid);
        gid
    }

    fn intern_isoform(&mut self, gid: GeneId, rec: &ExonRecord) -> IsoformId {
        let key = (gid, rec.transcript_id.clone());
        if let Some(&tid) = self.isoform_lookup.get(&key) {
            return tid;
        }
        let tid = self.isoforms.len();
        let strand = self.genes[gid].strand;
        self.isoforms
            .push(Isoform::new(tid, rec.transcript_id.clone(), gid, strand));
        self.isoform_lookup.insert(key, tid);
        self.genes[gid].add_isoform(tid);
        tid
    }

    /// Serialize this model with a small header (magic + crate version) and a bincode payload.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut f = BufWriter::new(f);

        f.write_all(MAGIC)?;

        let v = VERSION_STR.as_bytes();
        let len = v.len() as u16;
        f.write_all(&len.to_le_bytes())?;
        f.write_all(v)?;

        bincode::serialize_into(&mut f, self)?;
        f.flush()?;

        Ok(())
    }

    /// Load a model written by `save()`. Rejects wrong file types and version mismatches.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut f = BufReader::new(f);

        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("Not an annotation cache file (bad magic)");
        }

        let mut len_buf = [0u8; 2];
        f.read_exact(&mut len_buf)?;
        let len = u16::from_le_bytes(len_buf) as usize;

        let mut ver_buf = vec![0u8; len];
        f.read_exact(&mut ver_buf)?;
        let file_version = std::str::from_utf8(&ver_buf)?;

        if file_version != VERSION_STR {
            bail!(
                "Annotation cache version mismatch: file={}, binary={}",
                file_version,
                VERSION_STR
            );
        }

        let model: Self = bincode::deserialize_from(&mut f)?;
        Ok(model)
    }
}
