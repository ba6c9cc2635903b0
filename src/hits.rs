//! Off-target **hit tables**: trimming raw BLAST output and indexing hits by probe pair.
//!
//! ### Trimming
//! BLAST reports local alignments, so a 25 nt probe may match on fewer bases.
//! [`trim_blast_hits`] keeps one hit per (probe, gene), discards alignments
//! shorter than 20 nt, charges every unaligned base as a mismatch and keeps
//! hits with fewer than 6 corrected mismatches: the ones close enough to
//! hybridise off target.
//!
//! ### Indexing
//! [`OffTargetHits`] reads a trimmed table (tab or space separated, with a
//! header row holding at least `probe_id`) and counts hits per pair and arm.
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::probe::{pair_key_of, split_probe_id, ProbeSide, HYB_LEN};

/// Alignments shorter than this are not potential off-targets.
pub const MIN_ALIGNMENT_LEN: i64 = 20;

/// Hits with this many corrected mismatches (or more) cannot hybridise.
pub const MAX_CORRECTED_MISMATCHES: i64 = 6;

/// One row of BLAST tabular output
/// (`-outfmt "6 qseqid sseqid qstart qend sstart send pident mismatch"`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BlastHit {
    pub probe_id: String,
    pub transcript_id: String,
    pub qstart: i64,
    pub qend: i64,
    pub sstart: i64,
    pub send: i64,
    pub percentage_ident: f64,
    pub n_mismatches: i64,
}

/// A BLAST hit after length correction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrimmedHit {
    pub probe_id: String,
    pub transcript_id: String,
    pub qstart: i64,
    pub qend: i64,
    pub sstart: i64,
    pub send: i64,
    pub percentage_ident: f64,
    pub n_mismatches: i64,
    /// Mismatches over the full probe length.
    pub n_corrected_mismatches: i64,
    pub gene_id: String,
    pub alignment_length: i64,
}

/// Counters for one trimming run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrimStats {
    pub input: usize,
    /// Further hits of a probe against another transcript of the same gene.
    pub duplicates: usize,
    pub too_short: usize,
    /// Alignments reported longer than the probe itself.
    pub too_long: usize,
    pub too_many_mismatches: usize,
    pub kept: usize,
}

/// Read headerless, tab-separated BLAST tabular output.
pub fn read_blast_hits<R: Read>(reader: R) -> Result<Vec<BlastHit>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<BlastHit>().enumerate() {
        out.push(rec.with_context(|| format!("BLAST hit line {}", i + 1))?);
    }
    Ok(out)
}

/// Deduplicate, length-correct and filter raw BLAST hits.
pub fn trim_blast_hits(hits: Vec<BlastHit>) -> (Vec<TrimmedHit>, TrimStats) {
    let mut stats = TrimStats { input: hits.len(), ..Default::default() };
    let mut keyed: Vec<(String, BlastHit)> = hits
        .into_iter()
        .map(|h| (h.transcript_id.split('.').next().unwrap_or("").to_string(), h))
        .collect();
    keyed.sort_by(|(ga, a), (gb, b)| {
        a.probe_id.cmp(&b.probe_id).then_with(|| ga.cmp(gb)).then_with(|| a.n_mismatches.cmp(&b.n_mismatches))
    });
    keyed.dedup_by(|(gb, b), (ga, a)| {
        let dup = a.probe_id == b.probe_id && ga == gb;
        if dup { stats.duplicates += 1; }
        dup
    });

    let mut out = Vec::new();
    for (gene_id, h) in keyed {
        let alignment_length = h.qend - h.qstart + 1;
        if alignment_length < MIN_ALIGNMENT_LEN {
            stats.too_short += 1;
            continue;
        }
        if alignment_length > HYB_LEN as i64 {
            warn!(probe = %h.probe_id, alignment_length, "alignment longer than the probe; hit ignored");
            stats.too_long += 1;
            continue;
        }
        let n_corrected_mismatches = h.n_mismatches + (HYB_LEN as i64 - alignment_length);
        if n_corrected_mismatches >= MAX_CORRECTED_MISMATCHES {
            stats.too_many_mismatches += 1;
            continue;
        }
        out.push(TrimmedHit {
            probe_id: h.probe_id,
            transcript_id: h.transcript_id,
            qstart: h.qstart,
            qend: h.qend,
            sstart: h.sstart,
            send: h.send,
            percentage_ident: h.percentage_ident,
            n_mismatches: h.n_mismatches,
            n_corrected_mismatches,
            gene_id,
            alignment_length,
        });
    }
    out.sort_by(|a, b| a.probe_id.cmp(&b.probe_id).then(a.n_corrected_mismatches.cmp(&b.n_corrected_mismatches)));
    stats.kept = out.len();
    info!(
        input = stats.input,
        duplicates = stats.duplicates,
        too_short = stats.too_short,
        too_long = stats.too_long,
        mismatched = stats.too_many_mismatches,
        kept = stats.kept,
        "trimmed BLAST hits"
    );
    (out, stats)
}

/// Write trimmed hits as a space-separated table with a header row.
pub fn write_trimmed_hits<W: Write>(w: W, hits: &[TrimmedHit]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b' ').from_writer(w);
    for h in hits {
        wtr.serialize(h)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Off-target hit counts indexed by pair key and arm.
///
/// The pair key is the probe id with its `LHS`/`RHS` field removed, the same
/// key [`ProbePair::pair_key`](crate::probe::ProbePair::pair_key) yields, so
/// the selector can look pairs up directly.
#[derive(Clone, Debug, Default)]
pub struct OffTargetHits {
    counts: HashMap<String, [usize; 2]>,
    total: usize,
    unattributed: usize,
}

fn side_slot(side: ProbeSide) -> usize {
    match side {
        ProbeSide::Lhs => 0,
        ProbeSide::Rhs => 1,
    }
}

impl OffTargetHits {
    pub fn new() -> Self { Self::default() }

    /// Record one hit. The side always comes from `probe_id`.
    ///
    /// A `pair_id` naming one arm of a pair (usually the LHS id) is reduced
    /// to that pair's key. Otherwise the key is derived from `probe_id`.
    /// Returns `false` if no side could be derived.
    pub fn record(&mut self, probe_id: &str, pair_id: Option<&str>, side_field: Option<usize>) -> bool {
        let Some((side, derived)) = split_probe_id(probe_id, side_field) else {
            self.unattributed += 1;
            return false;
        };
        let key = pair_id.and_then(|p| pair_key_of(p, side_field)).unwrap_or(derived);
        self.counts.entry(key).or_insert([0, 0])[side_slot(side)] += 1;
        self.total += 1;
        true
    }

    /// Number of hits on `side` of pair `pair_id`.
    pub fn count(&self, pair_id: &str, side: ProbeSide) -> usize {
        self.counts.get(pair_id).map_or(0, |c| c[side_slot(side)])
    }

    /// `true` if both arms have more than `max_hits` hits.
    pub fn is_nonspecific(&self, pair_id: &str, max_hits: usize) -> bool {
        self.count(pair_id, ProbeSide::Lhs) > max_hits && self.count(pair_id, ProbeSide::Rhs) > max_hits
    }

    /// Number of attributed hits.
    pub fn len(&self) -> usize { self.total }

    pub fn is_empty(&self) -> bool { self.total == 0 }

    /// Rows whose probe id carried no `LHS`/`RHS` token.
    pub fn unattributed(&self) -> usize { self.unattributed }

    /// Pairs that are non-specific under `max_hits`.
    pub fn nonspecific_pairs(&self, max_hits: usize) -> Vec<&str> {
        let mut v: Vec<&str> = self.counts.keys().map(String::as_str).filter(|p| self.is_nonspecific(p, max_hits)).collect();
        v.sort_unstable();
        v
    }

    /// Parse a trimmed hit table. The delimiter is a tab if the header line
    /// holds one, a space otherwise.
    pub fn from_reader<R: Read>(mut reader: R, side_field: Option<usize>) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let header = text.lines().next().unwrap_or("");
        let delim = if header.contains('\t') { b'\t' } else { b' ' };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delim)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = rdr.headers()?.clone();
        let Some(probe_col) = headers.iter().position(|h| h == "probe_id") else {
            bail!("off-target hit table has no 'probe_id' column (header: {:?})", header);
        };
        let pair_col = headers.iter().position(|h| h == "probe_pair_id");

        let mut out = Self::new();
        for rec in rdr.records() {
            let r = rec?;
            let Some(probe_id) = r.get(probe_col).filter(|s| !s.is_empty()) else { continue };
            let pair_id = pair_col.and_then(|c| r.get(c));
            out.record(probe_id, pair_id, side_field);
        }
        if out.unattributed > 0 {
            warn!(rows = out.unattributed, "off-target hits without an LHS/RHS token were ignored");
        }
        info!(hits = out.len(), pairs = out.counts.len(), "loaded off-target hits");
        Ok(out)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, side_field: Option<usize>) -> Result<Self> {
        let p = path.as_ref();
        let f = std::fs::File::open(p).with_context(|| format!("opening {}", p.display()))?;
        Self::from_reader(std::io::BufReader::new(f), side_field).with_context(|| format!("reading {}", p.display()))
    }
}

#[cfg(test)]
mod hits_tests {
    use super::*;

    fn raw(probe: &str, tx: &str, qstart: i64, qend: i64, mm: i64) -> BlastHit {
        BlastHit {
            probe_id: probe.into(),
            transcript_id: tx.into(),
            qstart,
            qend,
            sstart: 1,
            send: 25,
            percentage_ident: 96.0,
            n_mismatches: mm,
        }
    }

    #[test]
    fn parses_blast_tabular() {
        let text = "P_LHS_0\tENST1.2\t1\t25\t100\t124\t100.000\t0\n# comment\nP_RHS_0\tENST2.1\t3\t25\t7\t29\t95.652\t1\n";
        let hits = read_blast_hits(text.as_bytes()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].qstart, 3);
        assert_eq!(hits[1].percentage_ident, 95.652);
        assert!(read_blast_hits("P\tT\tx\n".as_bytes()).is_err());
    }

    #[test]
    fn trimming_corrects_and_filters() {
        let hits = vec![
            raw("A_LHS_0", "G1.1", 1, 25, 2),  // kept, 2
            raw("A_LHS_0", "G1.2", 1, 25, 1),  // same gene, fewer mismatches: this one wins
            raw("A_LHS_0", "G2.1", 4, 25, 1),  // 22 nt: 1 + 3 = 4, kept
            raw("A_LHS_0", "G3.1", 1, 19, 0),  // too short
            raw("A_LHS_0", "G4.1", 1, 30, 0),  // longer than the probe
            raw("A_RHS_0", "G5.1", 1, 21, 2),  // 21 nt: 2 + 4 = 6, dropped
            raw("A_RHS_0", "G6.1", 1, 20, 0),  // 20 nt: 0 + 5 = 5, kept
        ];
        let (out, stats) = trim_blast_hits(hits);
        assert_eq!(stats.input, 7);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.too_short, 1);
        assert_eq!(stats.too_long, 1);
        assert_eq!(stats.too_many_mismatches, 1);
        assert_eq!(stats.kept, 3);
        let summary: Vec<(&str, &str, i64)> =
            out.iter().map(|h| (h.probe_id.as_str(), h.gene_id.as_str(), h.n_corrected_mismatches)).collect();
        assert_eq!(summary, vec![("A_LHS_0", "G1", 1), ("A_LHS_0", "G2", 4), ("A_RHS_0", "G6", 5)]);
        assert_eq!(out[0].transcript_id, "G1.2");
        assert_eq!(out[1].alignment_length, 22);
    }

    #[test]
    fn trimmed_table_reads_back_as_hit_index() {
        let (out, _) = trim_blast_hits(vec![
            raw("G1_A_T1_LHS_0", "X1.1", 1, 25, 0),
            raw("G1_A_T1_RHS_0", "X1.1", 1, 25, 0),
            raw("G1_A_T1_RHS_0", "X2.1", 1, 25, 1),
        ]);
        let mut buf = Vec::new();
        write_trimmed_hits(&mut buf, &out).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("probe_id transcript_id qstart qend sstart send percentage_ident n_mismatches n_corrected_mismatches gene_id alignment_length"));
        let idx = OffTargetHits::from_reader(text.as_bytes(), None).unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Lhs), 1);
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Rhs), 2);
    }

    #[test]
    fn explicit_pair_column_and_tabs() {
        let text = "probe_id\tprobe_pair_id\tpercentage_ident\n\
                    G1_A_T1_LHS_0\tG1_A_T1_LHS_0\t100\n\
                    G1_A_T1_RHS_0\tG1_A_T1_LHS_0\t100\n\
                    G1_A_T1_RHS_1\tG1_A_T1_LHS_1\t100\n\
                    weird\tpairY\t100\n";
        let idx = OffTargetHits::from_reader(text.as_bytes(), None).unwrap();
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Lhs), 1);
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Rhs), 1);
        assert_eq!(idx.count("G1_A_T1_1", ProbeSide::Rhs), 1);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.unattributed(), 1);
    }

    #[test]
    fn opaque_pair_column_falls_back_to_probe_id() {
        let text = "probe_id probe_pair_id\nG1_A_T1_LHS_0 pairX\nG1_A_T1_RHS_0 pairX\n";
        let idx = OffTargetHits::from_reader(text.as_bytes(), None).unwrap();
        assert_eq!(idx.count("pairX", ProbeSide::Lhs), 0);
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Lhs), 1);
        assert_eq!(idx.count("G1_A_T1_0", ProbeSide::Rhs), 1);
    }

    #[test]
    fn nonspecific_needs_both_arms() {
        let mut idx = OffTargetHits::new();
        for _ in 0..3 {
            idx.record("G_A_T_LHS_0", None, None);
            idx.record("G_A_T_RHS_0", None, None);
            idx.record("G_A_T_LHS_1", None, None);
        }
        assert!(idx.is_nonspecific("G_A_T_0", 2));
        assert!(!idx.is_nonspecific("G_A_T_1", 2));
        assert!(!idx.is_nonspecific("unknown", 2));
        assert_eq!(idx.nonspecific_pairs(2), vec!["G_A_T_0"]);
    }

    #[test]
    fn missing_probe_id_column_is_fatal() {
        assert!(OffTargetHits::from_reader("a b c\n1 2 3\n".as_bytes(), None).is_err());
    }
}
