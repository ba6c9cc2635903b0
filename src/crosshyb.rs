//! Cross-hybridisation check helpers for a finished panel.
//!
//! The selected probes are exported as full-length FASTA, each LHS/RHS pair
//! is merged back into its 50 nt target footprint, the merged footprints are
//! searched against each other externally, and footprints with near-identical
//! hits are dropped.
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use needletail::parse_fastx_file;
use tracing::info;

use crate::probe::{SequenceTemplate, LHS_HANDLE};

/// Percent identity above which a hit marks a probe as cross-hybridising.
pub const DEFAULT_MAX_IDENTITY: f64 = 99.0;

/// A FASTA record as `(id, sequence)`.
pub type FastaRecord = (String, String);

/// Write full LHS and RHS probes, alternating, as two-line FASTA.
pub fn write_full_probe_fasta<W: Write>(w: &mut W, sequences: &[SequenceTemplate]) -> Result<()> {
    for s in sequences {
        for p in s.probes() {
            writeln!(w, ">{}\n{}", p.lhs_id, p.lhs)?;
            writeln!(w, ">{}\n{}", p.rhs_id, p.rhs)?;
        }
    }
    Ok(())
}

/// Merge a two-line FASTA laid out LHS, RHS, LHS, RHS… into pair footprints.
///
/// The adapter is removed from the front and the poly-A tail from the back of
/// each merged sequence. Blocks whose ids do not describe the same pair are
/// skipped. A line count that is not a multiple of four is an error.
pub fn merge_probe_pairs(text: &str) -> Result<Vec<FastaRecord>> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    if lines.len() % 4 != 0 {
        bail!("expected LHS/RHS record blocks of 4 lines, found {} lines", lines.len());
    }
    let mut out = Vec::new();
    for block in lines.chunks(4) {
        let lhs_name = block[0].trim_start_matches('>');
        let rhs_name = block[2].trim_start_matches('>');
        let (Some((lhs_pair, lhs_idx)), Some((rhs_pair, rhs_idx))) =
            (lhs_name.split_once("_LHS_"), rhs_name.split_once("_RHS_"))
        else {
            continue;
        };
        if lhs_pair != rhs_pair || lhs_idx != rhs_idx {
            continue;
        }
        let merged = format!("{}{}", block[1], block[3]);
        let merged = merged.strip_prefix(LHS_HANDLE).unwrap_or(&merged).trim_end_matches('A');
        out.push((format!("{lhs_pair}_{lhs_idx}"), merged.to_string()));
    }
    Ok(out)
}

/// Query ids with at least one hit above `max_identity` percent identity.
///
/// Input is BLAST tabular output in the default column order
/// (`qseqid sseqid pident …`).
pub fn exclusion_set<R: Read>(reader: R, max_identity: f64) -> Result<HashSet<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = HashSet::new();
    for (i, rec) in rdr.records().enumerate() {
        let r = rec?;
        let ident: f64 = r
            .get(2)
            .and_then(|s| s.parse().ok())
            .with_context(|| format!("line {}: missing or invalid percent identity", i + 1))?;
        if ident > max_identity {
            out.insert(r.get(0).unwrap_or("").to_string());
        }
    }
    Ok(out)
}

/// Records whose id is not in `excluded`, in input order.
pub fn filter_records(records: Vec<FastaRecord>, excluded: &HashSet<String>) -> Vec<FastaRecord> {
    records.into_iter().filter(|(id, _)| !excluded.contains(id)).collect()
}

/// Read FASTA/FASTA.GZ records; the id is the full header line.
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    let p = path.as_ref();
    let mut reader = parse_fastx_file(p).with_context(|| format!("opening {}", p.display()))?;
    let mut out = Vec::new();
    while let Some(record) = reader.next() {
        let rec = record.with_context(|| format!("parsing {}", p.display()))?;
        out.push((String::from_utf8_lossy(rec.id()).to_string(), String::from_utf8_lossy(&rec.seq()).to_string()));
    }
    info!(path = %p.display(), records = out.len(), "read FASTA records");
    Ok(out)
}

pub fn write_fasta<W: Write>(w: &mut W, records: &[FastaRecord]) -> Result<()> {
    for (id, seq) in records {
        writeln!(w, ">{id}\n{seq}")?;
    }
    Ok(())
}

#[cfg(test)]
mod crosshyb_tests {
    use super::*;
    use crate::probe::fixtures::pair;

    #[test]
    fn full_probes_merge_back_to_footprints() {
        let mut s = SequenceTemplate::new("G1_ABC_T1", "ACGT");
        s.set_probes(vec![pair(0, 100, 51), pair(1, 200, 151)]);
        let mut buf = Vec::new();
        write_full_probe_fasta(&mut buf, &[s.clone()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let merged = merge_probe_pairs(&text).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, "G1_ABC_T1_0");
        let p = &s.probes()[0];
        assert_eq!(merged[0].1, format!("{}{}", p.lhs_hyb(), p.rhs_hyb()));
    }

    #[test]
    fn mismatched_blocks_are_skipped() {
        let text = ">A_LHS_0\nCCTTGGCACCCGAGAATTCCAGGT\n>A_RHS_1\nCCAAAA\n>B_LHS_2\nGGT\n>B_RHS_2\nCCAAA\n";
        let merged = merge_probe_pairs(text).unwrap();
        assert_eq!(merged, vec![("B_2".to_string(), "GGTCC".to_string())]);
    }

    #[test]
    fn incomplete_blocks_are_fatal() {
        assert!(merge_probe_pairs(">A_LHS_0\nACGT\n>A_RHS_0\n").is_err());
        assert!(merge_probe_pairs("").unwrap().is_empty());
    }

    #[test]
    fn identity_threshold_excludes_near_identical_hits() {
        let blast = "G1_0\tG2_0\t100.000\t50\nG3_0\tG4_0\t98.5\t50\nG5_0\tG5_0\t99.5\t50\n";
        let ex = exclusion_set(blast.as_bytes(), DEFAULT_MAX_IDENTITY).unwrap();
        assert_eq!(ex.len(), 2);
        assert!(ex.contains("G1_0") && ex.contains("G5_0"));
        let recs = vec![("G1_0".to_string(), "A".to_string()), ("G3_0".to_string(), "C".to_string())];
        let kept = filter_records(recs, &ex);
        assert_eq!(kept, vec![("G3_0".to_string(), "C".to_string())]);
        assert!(exclusion_set("G1\tG2\tnot-a-number\n".as_bytes(), 99.0).is_err());
    }

    #[test]
    fn fasta_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.fasta");
        let recs = vec![("X_0".to_string(), "ACGT".to_string())];
        let mut f = std::fs::File::create(&path).unwrap();
        write_fasta(&mut f, &recs).unwrap();
        drop(f);
        assert_eq!(read_fasta_records(&path).unwrap(), recs);
    }
}
