#![forbid(unsafe_code)]
//! # probest
//!
//! Design of **ligation probe pairs** for targeted RNA in-situ sequencing panels
//! (10x Genomics style): from candidate transcripts, through Primer3 and BLAST,
//! to a filtered, capped probe panel and its reference CSV.
//!
//! ## Pipeline
//! 1. [`targets`] reads the CDS FASTA and [`primer3::write_input`] writes one
//!    Primer3 request per transcript (right primers of 25 nt).
//! 2. [`builder`] turns Primer3 output into LHS/RHS probe pairs and writes their
//!    hybridizing regions as FASTA for an off-target search.
//! 3. [`hits`] trims the BLAST output to hits that could hybridise.
//! 4. [`select`] filters the pairs by specificity, homopolymers, overlap and a
//!    per-gene cap; [`report`] renders the result.
//!
//! Primer3 and BLAST themselves are run outside this crate.
//!
//! ## Examples
//! ```rust
//! use probest::{builder, config::DesignParams, hits::OffTargetHits, primer3, report, select};
//!
//! let template = "ACGTGCAT".repeat(25);
//! let text = format!(
//!     "SEQUENCE_ID=G1_ABC_T1\nSEQUENCE_TEMPLATE={template}\n\
//!      PRIMER_RIGHT_0_SEQUENCE=GGATCCAGTACGATCGATCGATCGT\nPRIMER_RIGHT_0=120,25\n\
//!      PRIMER_RIGHT_0_GC_PERCENT=52.000\n=\n"
//! );
//! let params = DesignParams::default();
//! let (mut panel, _) = builder::build_probe_pairs(&primer3::parse_stanzas(&text), &params.builder);
//! select::select_panel(&mut panel, &OffTargetHits::new(), &params.selection);
//! let summary = report::PanelSummary::from_panel(&panel, params.report.histogram_max);
//! assert_eq!(summary.probe_pairs, 1);
//! ```

pub mod builder;
pub mod config;
pub mod crosshyb;
pub mod hits;
pub mod primer3;
pub mod probe;
pub mod report;
pub mod select;
pub mod seq;
pub mod targets;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

use builder::BuildStats;
use config::DesignParams;
use hits::OffTargetHits;
use probe::SequenceTemplate;
use report::PanelSummary;
use select::StageCounts;

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of one panel design run.
#[derive(Clone, Debug)]
pub struct PanelDesign {
    /// Selected probe pairs per sequence, in input order.
    pub sequences: Vec<SequenceTemplate>,
    pub build: BuildStats,
    pub selection: StageCounts,
    pub summary: PanelSummary,
}

/// Parse a Primer3 output file and build the candidate probe pairs.
pub fn build_from_primer3<P: AsRef<Path>>(path: P, params: &DesignParams) -> Result<(Vec<SequenceTemplate>, BuildStats)> {
    let p = path.as_ref();
    let f = File::open(p).with_context(|| format!("opening Primer3 output {}", p.display()))?;
    let stanzas = primer3::read_stanzas(BufReader::new(f)).with_context(|| format!("reading {}", p.display()))?;
    info!(path = %p.display(), records = stanzas.len(), "read Primer3 output");
    Ok(builder::build_probe_pairs(&stanzas, &params.builder))
}

/// Build candidates from Primer3 output, filter them against the trimmed
/// off-target table and summarise the panel.
///
/// `threads = None` uses all logical cores for the per-sequence filters; the
/// result does not depend on the thread count.
pub fn design_panel<P, Q>(primer3_output: P, hit_table: Q, params: &DesignParams, threads: Option<usize>) -> Result<PanelDesign>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (mut sequences, build) = build_from_primer3(primer3_output, params)?;
    let hits = OffTargetHits::from_path(hit_table, params.selection.side_field)?;

    let n = threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = ThreadPoolBuilder::new().num_threads(n).build()?;
    let selection = pool.install(|| select::select_panel(&mut sequences, &hits, &params.selection));

    let summary = PanelSummary::from_panel(&sequences, params.report.histogram_max);
    Ok(PanelDesign { sequences, build, selection, summary })
}
