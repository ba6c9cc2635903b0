//! Primer3 **Boulder-IO** stanzas: reading Primer3 output and writing Primer3 input.
//!
//! A stanza is a run of `KEY=VALUE` lines closed by a line holding only `=`.
//! Reading is tolerant: lines without `=` are skipped and missing keys simply
//! leave the corresponding fields unset. Only I/O failures are errors.
//!
//! ```
//! let text = "SEQUENCE_ID=G1_ABC_T1\nSEQUENCE_TEMPLATE=ACGT\nPRIMER_RIGHT_0_SEQUENCE=AAAT\nPRIMER_RIGHT_0=40,25\nPRIMER_RIGHT_0_GC_PERCENT=44.000\n=\n";
//! let stanzas = probest::primer3::parse_stanzas(text);
//! assert_eq!(stanzas.len(), 1);
//! assert_eq!(stanzas[0].get("SEQUENCE_ID"), Some("G1_ABC_T1"));
//! assert_eq!(stanzas[0].right_primers()[0].start, Some(40));
//! ```
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};

use anyhow::Result;
use tracing::warn;

use crate::config::Primer3Settings;
use crate::targets::Target;

/// Line closing a stanza.
pub const STANZA_END: &str = "=";

/// One Primer3 record, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stanza {
    entries: Vec<(String, String)>,
}

/// One `PRIMER_RIGHT_<n>` family from Primer3 output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RightPrimerHit {
    /// The `<n>` of the family.
    pub index: usize,
    pub sequence: String,
    /// First token of `PRIMER_RIGHT_<n>`.
    pub start: Option<i64>,
    pub gc_percent: Option<f64>,
}

impl Stanza {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// `SEQUENCE_ID`, or empty.
    pub fn sequence_id(&self) -> &str { self.get("SEQUENCE_ID").unwrap_or("") }

    /// `SEQUENCE_TEMPLATE`, or empty.
    pub fn template(&self) -> &str { self.get("SEQUENCE_TEMPLATE").unwrap_or("") }

    /// Right-primer families grouped by index, ascending.
    pub fn right_primers(&self) -> Vec<RightPrimerHit> {
        let mut by_index: BTreeMap<usize, RightPrimerHit> = BTreeMap::new();
        for (key, value) in &self.entries {
            let Some(rest) = key.strip_prefix("PRIMER_RIGHT_") else { continue };
            let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 { continue; }
            let Ok(index) = rest[..digits].parse::<usize>() else { continue };
            let hit = by_index.entry(index).or_insert_with(|| RightPrimerHit { index, ..Default::default() });
            match &rest[digits..] {
                "" => hit.start = value.split(',').next().and_then(|t| t.trim().parse().ok()),
                "_SEQUENCE" => hit.sequence = value.trim().to_string(),
                "_GC_PERCENT" => hit.gc_percent = value.trim().parse().ok(),
                _ => {}
            }
        }
        by_index.into_values().collect()
    }
}

/// Parse every *closed* stanza in `text`.
///
/// Trailing lines after the last `=` do not form a record; they are reported
/// and dropped.
pub fn parse_stanzas(text: &str) -> Vec<Stanza> {
    let mut out = Vec::new();
    let mut current = Stanza::default();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line == STANZA_END {
            out.push(std::mem::take(&mut current));
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            current.push(k.trim(), v);
        }
    }
    if !current.is_empty() {
        warn!(sequence_id = current.sequence_id(), "dropping Primer3 record without closing '=' line");
    }
    out
}

/// Read and parse a whole Primer3 output stream.
pub fn read_stanzas<R: BufRead>(mut reader: R) -> Result<Vec<Stanza>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(parse_stanzas(&text))
}

/// Write one Primer3 input stanza per target, asking for right primers only.
pub fn write_input<W: Write>(w: &mut W, targets: &[Target], settings: &Primer3Settings) -> Result<()> {
    for t in targets {
        writeln!(w, "SEQUENCE_ID={}", t.sequence_id())?;
        writeln!(w, "SEQUENCE_TEMPLATE={}", t.sequence)?;
        writeln!(w, "PRIMER_PICK_LEFT_PRIMER=0")?;
        writeln!(w, "PRIMER_PICK_INTERNAL_OLIGO=0")?;
        writeln!(w, "PRIMER_PICK_RIGHT_PRIMER=1")?;
        writeln!(w, "PRIMER_MIN_SIZE={}", settings.size)?;
        writeln!(w, "PRIMER_OPT_SIZE={}", settings.size)?;
        writeln!(w, "PRIMER_MAX_SIZE={}", settings.size)?;
        writeln!(w, "PRIMER_MAX_NS_ACCEPTED={}", settings.max_ns_accepted)?;
        writeln!(w, "PRIMER_RIGHT_MIN_GC={}", settings.right_min_gc)?;
        writeln!(w, "PRIMER_RIGHT_MAX_GC={}", settings.right_max_gc)?;
        writeln!(w, "PRIMER_RIGHT_MAX_POLY_X={}", settings.right_max_poly_x)?;
        writeln!(w, "PRIMER_NUM_RETURN={}", settings.num_return)?;
        writeln!(w, "PRIMER_EXPLAIN_FLAG=1")?;
        writeln!(w, "{STANZA_END}")?;
    }
    Ok(())
}
