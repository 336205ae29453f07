use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use isoform_switch::{AnnotationModel, Thresholds, Workspace};

const GTF: &str = "\
# two genes on chr1, one on chr2
chr1\tsrc\tgene\t100\t900\t.\t+\t.\tgene_id \"GA\";
chr1\tsrc\texon\t100\t200\t.\t+\t.\tgene_id \"GA\"; transcript_id \"GA.1\"; gene_name \"Alpha\";
chr1\tsrc\texon\t300\t400\t.\t+\t.\tgene_id \"GA\"; transcript_id \"GA.1\";
chr1\tsrc\texon\t100\t400\t.\t+\t.\tgene_id \"GA\"; transcript_id \"GA.2\";
chr1\tsrc\texon\t800\t900\t.\t-\t.\tgene_id \"GB\"; transcript_id \"GB.1\";
chr1\tsrc\texon\t850\t900\t.\t-\t.\tgene_id \"GB\"; transcript_id \"GB.2\";
chr2\tsrc\texon\t10\t50\t.\t+\t.\tgene_id \"GC\"; transcript_id \"GC.1\";
";

// Columns: GA.1 GA.2 GB.1 GB.2 GC.1
// Cells 0-2 are "neuron", cells 3-5 are "glia".
// GA switches from GA.1 to GA.2; GB is led by GB.1 in both; GC is a single isoform.
const MATRIX: &str = "\
30\t0\t50\t5\t12
30\t0\t50\t5\t12
30\t0\t50\t5\t12
0\t25\t40\t5\t12
0\t25\t40\t5\t12
0\t25\t40\t5\t12
";

const IDS: &str = "GA.1\nGA.2\nGB.1\nGB.2\nGC.1\n";
const LABELS: &str = "neuron\nneuron\nneuron\nglia\nglia\nglia\n";

fn write_gz(path: &Path, text: &str) {
    let mut enc = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap();
}

fn dataset(dir: &Path) -> PathBuf {
    write_gz(&dir.join("genes.gtf.gz"), GTF);
    fs::write(dir.join("matrix.tsv"), MATRIX).unwrap();
    fs::write(dir.join("ids.txt"), IDS).unwrap();
    fs::write(dir.join("labels.txt"), LABELS).unwrap();
    let manifest = dir.join("dataset.json");
    fs::write(
        &manifest,
        r#"{
            "gtf": "genes.gtf.gz",
            "matrix": "matrix.tsv",
            "isoform_ids": "ids.txt",
            "cell_labels": "labels.txt"
        }"#,
    )
    .unwrap();
    manifest
}

#[test]
fn manifest_to_switching_genes() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::new();
    ws.load_manifest(dataset(dir.path())).unwrap();

    let annotation = ws.annotation().unwrap();
    assert_eq!(annotation.genes.len(), 3);
    assert_eq!(annotation.isoforms.len(), 5);
    assert_eq!(annotation.exon_count(), 6);

    let ga = annotation.gene_by_key("GA").unwrap();
    assert_eq!((ga.start(), ga.end()), (100, 400));
    assert_eq!(ga.display_name(), "Alpha");

    let switching: Vec<&str> = ws
        .genes_with_isoform_switches()
        .unwrap()
        .into_iter()
        .map(|gid| annotation.gene(gid).gene_id.as_str())
        .collect();
    assert_eq!(switching, vec!["GA"]);

    let expression = ws.expression().unwrap();
    let dominant = ws.dominant_isoforms(ga.id).unwrap();
    let neuron = expression.labels.cluster_by_name("neuron").unwrap().id;
    let glia = expression.labels.cluster_by_name("glia").unwrap().id;
    let name = |cid| {
        dominant[&cid]
            .iter()
            .map(|&tid| annotation.isoform(tid).isoform_id.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(name(neuron), vec!["GA.1"]);
    assert_eq!(name(glia), vec!["GA.2"]);
}

#[test]
fn stricter_thresholds_remove_the_switch() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::new();
    ws.load_manifest(dataset(dir.path())).unwrap();

    ws.set_thresholds(Thresholds {
        min_tpm: 28.0,
        ..Thresholds::default()
    })
    .unwrap();
    assert!(ws.genes_with_isoform_switches().unwrap().is_empty());
}

#[test]
fn fold_changes_are_stored_on_genes() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::new();
    ws.load_manifest(dataset(dir.path())).unwrap();

    ws.start_fold_change_update().unwrap();
    let table = ws.finish_fold_change_update().unwrap();

    let annotation = ws.annotation().unwrap();
    let fc = |key: &str| annotation.gene_by_key(key).unwrap().max_fold_change();
    assert_eq!(fc("GA"), Some(f64::INFINITY));
    assert_eq!(fc("GB"), Some(1.25));
    assert_eq!(fc("GC"), Some(1.0));

    let hits: Vec<&str> = table
        .genes_at_least(10.0)
        .into_iter()
        .map(|(gid, _)| annotation.gene(gid).gene_id.as_str())
        .collect();
    assert_eq!(hits, vec!["GA"]);
}

#[test]
fn annotation_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    dataset(dir.path());

    let mut ws = Workspace::new();
    let model = ws.load_gtf(dir.path().join("genes.gtf.gz")).unwrap();
    let cache = dir.path().join("genes.cache");
    model.save(&cache).unwrap();

    let restored = AnnotationModel::load(&cache).unwrap();
    assert_eq!(restored.genes, model.genes);
    assert_eq!(restored.to_string(), model.to_string());
}
