use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, Level};
use simple_logger::init_with_level;

use isoform_switch::{AnnotationBuilder, AnnotationModel, Thresholds, Workspace};

/// Find genes whose dominant isoform differs between cell clusters.
#[derive(Parser, Debug)]
#[command(name = "isoform-switch")]
#[command(author, version, about)]
struct Cli {
    /// Log debug messages
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Worker threads for the fold change computation (0 = all cores)
    #[arg(long, short, global = true, default_value_t = 0)]
    threads: usize,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a GTF annotation and write it to a cache file
    Annotate(AnnotateArgs),

    /// Load a cache file and print summary stats
    Stats(StatsArgs),

    /// Print genes with a dominant isoform switch between clusters
    Switches(SwitchesArgs),

    /// Print genes whose isoforms change most between clusters
    FoldChange(FoldChangeArgs),
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Input annotation (.gtf or .gtf.gz)
    #[arg(long, short)]
    gtf: PathBuf,

    /// Output cache file
    #[arg(long, short)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Cache file written by `annotate`
    #[arg(long, short)]
    cache: PathBuf,
}

#[derive(Args, Debug)]
struct SwitchesArgs {
    /// JSON manifest naming the dataset files
    #[arg(long, short)]
    manifest: PathBuf,

    /// Minimum average expression of a dominant isoform
    #[arg(long, default_value_t = isoform_switch::config::DEFAULT_MIN_TPM)]
    min_tpm: f64,

    /// Minimum percent of cluster cells expressing a dominant isoform
    #[arg(long, default_value_t = isoform_switch::config::DEFAULT_MIN_PERCENT_EXPRESSED)]
    min_percent_expressed: f64,
}

#[derive(Args, Debug)]
struct FoldChangeArgs {
    /// JSON manifest naming the dataset files
    #[arg(long, short)]
    manifest: PathBuf,

    /// Report genes at or above this max fold change
    #[arg(long, default_value_t = isoform_switch::config::DEFAULT_MIN_FOLD_CHANGE)]
    min_fold_change: f64,
}

fn main() -> Result<()> {
    let start = std::time::Instant::now();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::Debug } else { Level::Info };
    init_with_level(level).context("initialising logger")?;

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("configuring thread pool")?;
    }

    match cli.cmd {
        Command::Annotate(args) => {
            let model = AnnotationBuilder::new()
                .build_from_path(&args.gtf)
                .with_context(|| format!("parsing annotation {}", args.gtf.display()))?;

            println!("{model}");

            model
                .save(&args.out)
                .with_context(|| format!("writing cache to {}", args.out.display()))?;

            info!("Cache written to {}", args.out.display());
        }

        Command::Stats(args) => {
            let model = AnnotationModel::load(&args.cache)
                .with_context(|| format!("reading cache {}", args.cache.display()))?;
            println!("{model}");
        }

        Command::Switches(args) => {
            let thresholds = Thresholds {
                min_tpm: args.min_tpm,
                min_percent_expressed: args.min_percent_expressed,
                ..Thresholds::default()
            };
            let mut ws = Workspace::with_thresholds(thresholds)?;
            ws.load_manifest(&args.manifest)
                .with_context(|| format!("loading dataset {}", args.manifest.display()))?;
            print_switches(&ws)?;
        }

        Command::FoldChange(args) => {
            let thresholds = Thresholds {
                min_fold_change: args.min_fold_change,
                ..Thresholds::default()
            };
            let mut ws = Workspace::with_thresholds(thresholds)?;
            ws.load_manifest(&args.manifest)
                .with_context(|| format!("loading dataset {}", args.manifest.display()))?;

            ws.start_fold_change_update()?;
            let table = ws
                .finish_fold_change_update()
                .context("fold change update did not complete")?;
            let annotation = ws.annotation().context("no annotation loaded")?;

            for (gid, value) in table.genes_at_least(ws.thresholds().min_fold_change) {
                let gene = annotation.gene(gid);
                println!("{}\t{}\t{}", gene.gene_id, gene.display_name(), value);
            }
        }
    }

    info!("Elapsed time: {:?}", start.elapsed());
    Ok(())
}

/// One TSV line per switching gene: id, name, then `cluster=iso,iso` per cluster.
fn print_switches(ws: &Workspace) -> Result<()> {
    let annotation = ws.annotation().context("no annotation loaded")?;
    let expression = ws.expression().context("no expression data loaded")?;

    for gid in ws.genes_with_isoform_switches()? {
        let gene = annotation.gene(gid);
        let mut line = format!("{}\t{}", gene.gene_id, gene.display_name());
        for (cid, isoforms) in ws.dominant_isoforms(gid)? {
            let names: Vec<&str> = isoforms
                .iter()
                .map(|&tid| annotation.isoform(tid).isoform_id.as_str())
                .collect();
            line.push_str(&format!("\t{}={}", expression.labels.cluster(cid).name, names.join(",")));
        }
        println!("{line}");
    }
    Ok(())
}
