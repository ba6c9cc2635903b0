//! Sequence arithmetic used by the builder and the selector.
//!
//! Reverse complement and GC fraction come from `bio`; the rest (rounding,
//! homopolymer scan, hash identifiers) is small enough to live here.
//!
//! # Examples
//! ```
//! use probest::seq::{gc_percent, longest_homopolymer, reverse_complement};
//! assert_eq!(reverse_complement("AACG"), "CGTT");
//! assert_eq!(gc_percent("GGCCAATT"), 50.0);
//! assert_eq!(longest_homopolymer("ACGGGGT"), 4);
//! ```
use std::collections::HashSet;

use bio::alphabets::dna;
use bio::seq_analysis::gc::gc_content;
use rand::RngCore;

/// Reverse complement of a DNA string. Characters outside the IUPAC alphabet are kept as-is.
pub fn reverse_complement(s: &str) -> String {
    String::from_utf8(dna::revcomp(s.as_bytes())).unwrap_or_default()
}

/// Round to three decimal places.
#[inline]
pub fn round3(x: f64) -> f64 { (x * 1000.0).round() / 1000.0 }

/// GC percentage (0–100, three decimals) over the unambiguous bases.
///
/// `N` and other IUPAC codes are left out of the denominator; a sequence
/// without any `A`/`C`/`G`/`T` has 0 % GC.
pub fn gc_percent(s: &str) -> f64 {
    let acgt: Vec<u8> = s
        .bytes()
        .map(|b| b.to_ascii_uppercase())
        .filter(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
        .collect();
    if acgt.is_empty() { return 0.0; }
    round3(gc_content(&acgt) as f64 * 100.0)
}

/// Length of the longest run of identical nucleotides (case-insensitive).
pub fn longest_homopolymer(s: &str) -> usize {
    let mut best = 0usize;
    let mut run = 0usize;
    let mut prev: Option<u8> = None;
    for b in s.bytes().map(|b| b.to_ascii_uppercase()) {
        run = if prev == Some(b) { run + 1 } else { 1 };
        prev = Some(b);
        best = best.max(run);
    }
    best
}

/// `true` if `s` contains a run of at least `run` identical nucleotides.
#[inline]
pub fn has_homopolymer(s: &str, run: usize) -> bool { run > 0 && longest_homopolymer(s) >= run }

/// Number of hex characters kept from each random token.
pub const HASH_ID_LEN: usize = 7;

/// Issues short random hexadecimal identifiers for probe pairs.
///
/// Each id is drawn from four random bytes and truncated to [`HASH_ID_LEN`]
/// hex characters. Issued ids are remembered so that a draw colliding with an
/// earlier one is repeated; ids are therefore unique within one generator.
#[derive(Debug, Default)]
pub struct HashIds {
    issued: HashSet<String>,
}

impl HashIds {
    pub fn new() -> Self { Self::default() }

    /// Draw a fresh identifier.
    pub fn next_id(&mut self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = [0u8; 4];
            rng.fill_bytes(&mut bytes);
            let mut id: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            id.truncate(HASH_ID_LEN);
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    /// How many ids were handed out.
    pub fn len(&self) -> usize { self.issued.len() }

    pub fn is_empty(&self) -> bool { self.issued.is_empty() }
}

#[cfg(test)]
mod seq_tests {
    use super::*;

    #[test]
    fn revcomp_handles_case_and_n() {
        assert_eq!(reverse_complement("ACGTN"), "NACGT");
        assert_eq!(reverse_complement("aacg"), "cgtt");
        assert_eq!(reverse_complement(""), "");
    }

    #[test]
    fn gc_is_rounded_to_three_decimals() {
        // 11 of 25
        let s = "GGGGGGCCCCCAAAAAAAAAAAAAA";
        assert_eq!(s.len(), 25);
        assert_eq!(gc_percent(s), 44.0);
        // 1 of 3
        assert_eq!(gc_percent("GAT"), 33.333);
        assert_eq!(gc_percent(""), 0.0);
        assert_eq!(gc_percent("gat"), 33.333);
    }

    #[test]
    fn ambiguous_bases_do_not_dilute_gc() {
        assert_eq!(gc_percent("GGGGGGGGGGNNNNNNNNNNAAAAA"), 66.667);
        assert_eq!(gc_percent("NNNN"), 0.0);
        assert_eq!(gc_percent("GCNAT"), 50.0);
    }

    #[test]
    fn homopolymer_runs() {
        assert_eq!(longest_homopolymer(""), 0);
        assert_eq!(longest_homopolymer("ACGT"), 1);
        assert!(has_homopolymer("ACAAAAAG", 5));
        assert!(!has_homopolymer("ACAAAAGG", 5));
        assert!(has_homopolymer("TTTTT", 5));
        assert!(has_homopolymer("ccccC", 5));
    }

    #[test]
    fn ten_thousand_hash_ids_are_unique() {
        let mut ids = HashIds::new();
        let drawn: HashSet<String> = (0..10_000).map(|_| ids.next_id()).collect();
        assert_eq!(drawn.len(), 10_000);
        assert_eq!(ids.len(), 10_000);
        assert!(drawn.iter().all(|id| id.len() == HASH_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit())));
    }
}
