use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use probest::config::DesignParams;
use probest::probe::SequenceTemplate;
use probest::{builder, crosshyb, hits, primer3, report, targets};

/// probest CLI
#[derive(Parser)]
#[command(name = "probest")]
#[command(version)]
#[command(about = "Ligation probe pair design for in-situ sequencing panels", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with design parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write Primer3 input records for the transcripts of a FASTA file
    Primer3Input {
        /// CDS FASTA (FASTA/FASTA.GZ)
        fasta: PathBuf,
        /// Primer3 input file
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the targets as FASTA with normalised headers
        #[arg(long)]
        normalized_fasta: Option<PathBuf>,
    },

    /// Build probe pairs from Primer3 output and write their hybridizing regions
    Build {
        /// Primer3 output file
        primer3_output: PathBuf,
        /// FASTA of LHS/RHS hybridizing regions for the off-target search
        #[arg(long)]
        fasta: PathBuf,
    },

    /// Trim raw BLAST tabular output to potential off-target hits
    TrimHits {
        /// BLAST output (-outfmt "6 qseqid sseqid qstart qend sstart send pident mismatch")
        blast: PathBuf,
        /// Trimmed hit table (space separated, with header)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build, filter and report the probe panel
    Select {
        /// Primer3 output file
        primer3_output: PathBuf,
        /// Trimmed off-target hit table
        hit_table: PathBuf,
        /// Probe reference CSV
        #[arg(long)]
        csv: PathBuf,
        /// Human-readable listing of the retained pairs
        #[arg(long)]
        overview: PathBuf,
        /// Panel summary (text)
        #[arg(long)]
        summary: PathBuf,
        /// Panel summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Full-length LHS/RHS probes as FASTA
        #[arg(long)]
        probes: Option<PathBuf>,
        /// Maximum probe pairs per sequence (overrides the config)
        #[arg(long)]
        max_pairs: Option<usize>,
        /// Threads (None = all)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Cross-hybridisation helpers for a finished panel
    CrossHyb {
        #[command(subcommand)]
        action: CrossHybCommands,
    },
}

#[derive(Subcommand)]
enum CrossHybCommands {
    /// Merge full-length LHS/RHS probe FASTA into pair footprints
    Merge {
        /// Full-probe FASTA, LHS then RHS per pair
        probes: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Drop footprints with near-identical hits in a BLAST search against the panel
    Filter {
        /// Merged footprint FASTA
        fasta: PathBuf,
        /// BLAST tabular output of the footprints against themselves
        blast: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Percent identity above which a footprint is dropped
        #[arg(long, default_value_t = crosshyb::DEFAULT_MAX_IDENTITY)]
        max_identity: f64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn create<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let p = path.as_ref();
    let f = File::create(p).with_context(|| format!("creating {}", p.display()))?;
    Ok(BufWriter::new(f))
}

fn open<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let p = path.as_ref();
    let f = File::open(p).with_context(|| format!("opening {}", p.display()))?;
    Ok(BufReader::new(f))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut params = match &cli.config {
        Some(p) => DesignParams::from_json_file(p)?,
        None => DesignParams::default(),
    };

    match cli.command {
        Commands::Primer3Input { fasta, output, normalized_fasta } => {
            let targets = targets::read_targets(&fasta)?;
            if let Some(p) = normalized_fasta {
                let mut w = create(&p)?;
                targets::write_normalized_fasta(&mut w, &targets)?;
                w.flush()?;
            }
            let mut w = create(&output)?;
            primer3::write_input(&mut w, &targets, &params.primer3)?;
            w.flush()?;
            info!(records = targets.len(), output = %output.display(), "wrote Primer3 input");
        }

        Commands::Build { primer3_output, fasta } => {
            let (sequences, stats) = probest::build_from_primer3(&primer3_output, &params)?;
            let mut w = create(&fasta)?;
            builder::write_hybridizing_fasta(&mut w, &sequences)?;
            w.flush()?;
            info!(pairs = stats.retained, output = %fasta.display(), "wrote hybridizing regions");
        }

        Commands::TrimHits { blast, output } => {
            let raw = hits::read_blast_hits(open(&blast)?).with_context(|| format!("reading {}", blast.display()))?;
            let (trimmed, _) = hits::trim_blast_hits(raw);
            let mut w = create(&output)?;
            hits::write_trimmed_hits(&mut w, &trimmed)?;
            w.flush()?;
        }

        Commands::Select { primer3_output, hit_table, csv, overview, summary, json, probes, max_pairs, threads } => {
            if let Some(n) = max_pairs {
                params.selection.max_pairs_per_gene = n;
            }
            let design = probest::design_panel(&primer3_output, &hit_table, &params, threads)?;

            let mut w = create(&csv)?;
            report::write_reference_csv(&mut w, &design.sequences)?;
            w.flush()?;
            let mut w = create(&overview)?;
            report::write_overview(&mut w, &design.sequences)?;
            w.flush()?;
            let mut w = create(&summary)?;
            design.summary.write_text(&mut w)?;
            w.flush()?;
            if let Some(p) = json {
                let mut w = create(&p)?;
                design.summary.write_json(&mut w)?;
                w.flush()?;
            }
            if let Some(p) = probes {
                let mut w = create(&p)?;
                crosshyb::write_full_probe_fasta(&mut w, &design.sequences)?;
                w.flush()?;
            }
            print_panel(&design.sequences)?;
        }

        Commands::CrossHyb { action } => match action {
            CrossHybCommands::Merge { probes, output } => {
                let text = std::fs::read_to_string(&probes).with_context(|| format!("reading {}", probes.display()))?;
                let merged = crosshyb::merge_probe_pairs(&text).with_context(|| format!("merging {}", probes.display()))?;
                let mut w = create(&output)?;
                crosshyb::write_fasta(&mut w, &merged)?;
                w.flush()?;
                info!(pairs = merged.len(), output = %output.display(), "merged probe pairs");
            }
            CrossHybCommands::Filter { fasta, blast, output, max_identity } => {
                let records = crosshyb::read_fasta_records(&fasta)?;
                let excluded = crosshyb::exclusion_set(open(&blast)?, max_identity)
                    .with_context(|| format!("reading {}", blast.display()))?;
                let n = records.len();
                let kept = crosshyb::filter_records(records, &excluded);
                let mut w = create(&output)?;
                crosshyb::write_fasta(&mut w, &kept)?;
                w.flush()?;
                info!(input = n, kept = kept.len(), "filtered cross-hybridising footprints");
            }
        },
    }

    Ok(())
}

fn print_panel(sequences: &[SequenceTemplate]) -> Result<()> {
    let ids: Vec<String> = sequences.iter().map(|s| s.id().to_string()).collect();
    let genes: Vec<String> = sequences.iter().map(|s| s.gene_name().to_string()).collect();
    let lens: Vec<u64> = sequences.iter().map(|s| s.template().len() as u64).collect();
    let pairs: Vec<u64> = sequences.iter().map(|s| s.len_probes() as u64).collect();
    let starts: Vec<String> = sequences
        .iter()
        .map(|s| s.probes().iter().map(|p| p.start.to_string()).collect::<Vec<_>>().join(","))
        .collect();

    let df = df!(
        "sequence" => ids,
        "gene" => genes,
        "length" => lens,
        "pairs" => pairs,
        "starts" => starts,
    )?;

    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
    std::env::set_var("POLARS_TABLE_WIDTH", "65535");

    println!("{}", df);
    Ok(())
}
