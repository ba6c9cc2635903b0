//! Panel Reporter: renders the selected panel. No filtering happens here.
//!
//! Every renderer takes its output sink as an argument, so callers decide
//! whether a report goes to a file, stdout or a buffer.
use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::probe::SequenceTemplate;

/// Header of the probe reference table.
pub const REFERENCE_HEADER: [&str; 4] = ["gene_id", "probe_seq", "probe_id", "included"];

/// One row of the probe reference table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReferenceRow {
    pub gene_id: String,
    /// Hybridizing LHS followed by hybridizing RHS (50 nt).
    pub probe_seq: String,
    /// `gene_id|gene_name|hash_id`.
    pub probe_id: String,
    pub included: String,
}

/// Reference rows for the panel: exact duplicates removed, sorted by `probe_id`.
pub fn reference_rows(sequences: &[SequenceTemplate]) -> Vec<ReferenceRow> {
    let mut rows: Vec<ReferenceRow> = sequences
        .iter()
        .flat_map(|s| {
            s.probes().iter().map(move |p| ReferenceRow {
                gene_id: s.gene_id().to_string(),
                probe_seq: format!("{}{}", p.lhs_hyb(), p.rhs_hyb()),
                probe_id: format!("{}|{}|{}", s.gene_id(), s.gene_name(), p.hash_id),
                included: "TRUE".to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.probe_id.cmp(&b.probe_id).then_with(|| a.cmp(b)));
    rows.dedup();
    rows
}

/// Write the reference table as CSV.
pub fn write_reference_csv<W: Write>(w: W, sequences: &[SequenceTemplate]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(REFERENCE_HEADER)?;
    for row in reference_rows(sequences) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Human-readable listing of every sequence and its retained probe pairs.
pub fn write_overview<W: Write>(w: &mut W, sequences: &[SequenceTemplate]) -> Result<()> {
    for s in sequences {
        writeln!(w, "/-------------------/")?;
        writeln!(w, "Sequence id: {}", s.id())?;
        writeln!(w, "Sequence template:\n{}\n", s.template())?;
        writeln!(w, "Probes:\n")?;
        for p in s.probes() {
            writeln!(w, "     probe pair HASH ID: {}\n", p.hash_id)?;
            writeln!(w, "     probe pair LHS ID: {}", p.lhs_id)?;
            writeln!(w, "     probe pair RHS ID: {}", p.rhs_id)?;
            writeln!(w, "     probe pair START: {}", p.start)?;
            writeln!(w, "     probe pair END: {}", p.end)?;
            writeln!(w, "     probe LHS: {}", p.lhs)?;
            writeln!(w, "     probe LHS GC: {:.3}", p.lhs_gc)?;
            writeln!(w, "     probe RHS: {}", p.rhs)?;
            writeln!(w, "     probe RHS GC: {:.3}", p.rhs_gc)?;
            writeln!(w, "     -----------------\n")?;
        }
    }
    Ok(())
}

/// Aggregate counts for the selected panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelSummary {
    pub probe_pairs: usize,
    pub sequences: usize,
    /// Sequences with at least one probe pair.
    pub sequences_with_pairs: usize,
    /// Number of sequences per probe-pair count, for counts `0..=histogram_max`.
    pub histogram: BTreeMap<usize, usize>,
}

impl PanelSummary {
    pub fn from_panel(sequences: &[SequenceTemplate], histogram_max: usize) -> Self {
        let mut histogram: BTreeMap<usize, usize> = (0..=histogram_max).map(|n| (n, 0)).collect();
        for s in sequences {
            *histogram.entry(s.len_probes()).or_insert(0) += 1;
        }
        Self {
            probe_pairs: sequences.iter().map(SequenceTemplate::len_probes).sum(),
            sequences: sequences.len(),
            sequences_with_pairs: sequences.iter().filter(|s| s.len_probes() > 0).count(),
            histogram,
        }
    }

    /// Sequences holding exactly `n` probe pairs.
    pub fn sequences_with(&self, n: usize) -> usize { self.histogram.get(&n).copied().unwrap_or(0) }

    pub fn write_text<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "probe pairs in panel: {}", self.probe_pairs)?;
        writeln!(w, "sequences with at least one probe pair: {} of {}", self.sequences_with_pairs, self.sequences)?;
        for (n, count) in &self.histogram {
            writeln!(w, "sequences with {n} probe pairs: {count}")?;
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, w: W) -> Result<()> {
        serde_json::to_writer_pretty(w, self)?;
        Ok(())
    }
}
