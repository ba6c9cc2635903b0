//! Reading candidate **target transcripts** from FASTA / FASTA.GZ.
//!
//! Records are parsed with `needletail`. Each header must name a gene id, a
//! gene name and a transcript id; three layouts are understood:
//!
//! - `gene_ID:<id> gene_name:<name> transcript_ID:<tx>` tokens (any order),
//! - NCBI CDS tags `[locus_tag=<id>] [gene=<name>] [protein_id=<tx>]`,
//! - a first word `<id>|<name>|<tx>`.
//!
//! ### Errors
//! Unreadable files and headers matching none of the layouts are fatal and
//! bubble up as `anyhow::Error` naming the offending record.
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use needletail::parse_fastx_file;
use tracing::info;

/// One target transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub gene_id: String,
    pub gene_name: String,
    pub transcript_id: String,
    /// Nucleotides, uppercase as read.
    pub sequence: String,
}

impl Target {
    /// Identifier carried through Primer3: `{gene_id}_{gene_name}_{transcript_id}`.
    pub fn sequence_id(&self) -> String {
        format!("{}_{}_{}", self.gene_id, self.gene_name, self.transcript_id)
    }
}

fn bracket_tag<'a>(header: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("[{tag}=");
    let from = header.find(&open)? + open.len();
    let len = header[from..].find(']')?;
    Some(&header[from..from + len])
}

fn colon_token<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    header.split_whitespace().find_map(|tok| tok.strip_prefix(key)?.strip_prefix(':'))
}

/// Extract `(gene_id, gene_name, transcript_id)` from a FASTA header line.
///
/// ```
/// use probest::targets::parse_header;
/// let h = "lcl|NC_003197.2_cds_1 [gene=thrL] [locus_tag=STM0001] [protein_id=NP_459006.1]";
/// assert_eq!(parse_header(h), Some(("STM0001".into(), "thrL".into(), "NP_459006.1".into())));
/// ```
pub fn parse_header(header: &str) -> Option<(String, String, String)> {
    if let (Some(g), Some(n), Some(t)) = (
        colon_token(header, "gene_ID"),
        colon_token(header, "gene_name"),
        colon_token(header, "transcript_ID"),
    ) {
        return Some((g.to_string(), n.to_string(), t.to_string()));
    }
    if let (Some(g), Some(t)) = (bracket_tag(header, "locus_tag"), bracket_tag(header, "protein_id")) {
        let n = bracket_tag(header, "gene").unwrap_or("");
        return Some((g.to_string(), n.to_string(), t.to_string()));
    }
    let first = header.split_whitespace().next()?;
    let parts: Vec<&str> = first.split('|').collect();
    if parts.len() >= 3 && parts[..3].iter().all(|p| !p.is_empty()) {
        return Some((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()));
    }
    None
}

/// Normalised header in the `gene_ID:… gene_name:… transcript_ID:…` layout.
pub fn normalized_header(t: &Target) -> String {
    format!("gene_ID:{} gene_name:{} transcript_ID:{}", t.gene_id, t.gene_name, t.transcript_id)
}

/// Write targets as two-line FASTA under their normalised headers.
pub fn write_normalized_fasta<W: Write>(w: &mut W, targets: &[Target]) -> Result<()> {
    for t in targets {
        writeln!(w, ">{}\n{}", normalized_header(t), t.sequence)?;
    }
    Ok(())
}

/// Read every record of a FASTA/FASTA.GZ file into [`Target`]s, in file order.
pub fn read_targets<P: AsRef<Path>>(path: P) -> Result<Vec<Target>> {
    let p = path.as_ref();
    let mut reader = parse_fastx_file(p).with_context(|| format!("opening {}", p.display()))?;
    let mut out = Vec::new();
    while let Some(record) = reader.next() {
        let rec = record.with_context(|| format!("parsing {}", p.display()))?;
        let header = String::from_utf8_lossy(rec.id()).to_string();
        let Some((gene_id, gene_name, transcript_id)) = parse_header(&header) else {
            bail!("{}: cannot find gene id, gene name and transcript id in header '{}'", p.display(), header);
        };
        let sequence = String::from_utf8_lossy(&rec.seq()).to_ascii_uppercase();
        out.push(Target { gene_id, gene_name, transcript_id, sequence });
    }
    info!(path = %p.display(), targets = out.len(), "read target sequences");
    Ok(out)
}
