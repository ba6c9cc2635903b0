//! Core types for **sequence templates** and **probe pairs**.
//!
//! A [`SequenceTemplate`] owns one target transcript and the probe pairs designed
//! against it. Probe pairs are plain value records: they are built once by
//! [`crate::builder`] and afterwards only ever *removed* from their template's
//! list by [`crate::select`]. The list is kept sorted by [`ProbePair::start`]
//! after every mutation.
//!
//! # Probe layout
//! ```text
//! LHS: 5'-CCTTGGCACCCGAGAATTCCA-<25 nt hybridizing>-3'
//! RHS: /5Phos/-<25 nt hybridizing>-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA-3'
//! ```
use core::fmt;

/// Fixed 21 nt adapter prepended to every LHS probe.
pub const LHS_HANDLE: &str = "CCTTGGCACCCGAGAATTCCA";

/// Length of the poly-A handle appended to every RHS probe.
pub const POLY_A_LEN: usize = 30;

/// Length of the target-binding part of each probe arm.
pub const HYB_LEN: usize = 25;

/// Which arm of a ligation probe pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ProbeSide {
    /// Left-hand side arm (adapter + hybridizing region).
    Lhs,
    /// Right-hand side arm (hybridizing region + poly-A).
    Rhs,
}

impl ProbeSide {
    /// Token used inside probe identifiers (`LHS` / `RHS`).
    pub fn token(self) -> &'static str {
        match self {
            ProbeSide::Lhs => "LHS",
            ProbeSide::Rhs => "RHS",
        }
    }

    /// Parse an identifier token; anything but `LHS`/`RHS` is `None`.
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "LHS" => Some(ProbeSide::Lhs),
            "RHS" => Some(ProbeSide::Rhs),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.token()) }
}

/// One ligation probe pair designed against a single template.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbePair {
    /// Short random identifier (7 hex chars), unique within a run.
    pub hash_id: String,
    /// `{sequence_id}_LHS_{index}`.
    pub lhs_id: String,
    /// `{sequence_id}_RHS_{index}`.
    pub rhs_id: String,
    /// Template coordinate of the LHS primer hit.
    pub start: i64,
    /// Template coordinate where the RHS window ends. Lies left of `start` and
    /// may be negative.
    pub end: i64,
    /// Full LHS probe (handle + hybridizing region).
    pub lhs: String,
    /// GC percent of the LHS hybridizing region.
    pub lhs_gc: f64,
    /// Full RHS probe (hybridizing region + poly-A).
    pub rhs: String,
    /// GC percent of the RHS hybridizing region.
    pub rhs_gc: f64,
}

impl ProbePair {
    /// Target-binding part of the LHS arm (last 25 nt).
    pub fn lhs_hyb(&self) -> &str {
        let n = self.lhs.len();
        &self.lhs[n.saturating_sub(HYB_LEN)..]
    }

    /// Target-binding part of the RHS arm (first 25 nt).
    pub fn rhs_hyb(&self) -> &str {
        &self.rhs[..self.rhs.len().min(HYB_LEN)]
    }

    /// Identifier shared by both arms of this pair; see [`split_probe_id`]
    /// for `side_field`. Falls back to `lhs_id` if it carries no side token.
    pub fn pair_key(&self, side_field: Option<usize>) -> String {
        pair_key_of(&self.lhs_id, side_field).unwrap_or_else(|| self.lhs_id.clone())
    }
}

/// Split a probe identifier into its side and the pair identifier shared by both arms.
///
/// With `side_field = Some(i)` the side token is the `i`-th `_`-separated field;
/// otherwise the right-most `LHS`/`RHS` field is used. The pair identifier is the
/// identifier with that field removed.
///
/// ```
/// use probest::probe::{split_probe_id, ProbeSide};
/// let (side, pair) = split_probe_id("ENSG1_ACTB_ENST9_RHS_4", None).unwrap();
/// assert_eq!(side, ProbeSide::Rhs);
/// assert_eq!(pair, "ENSG1_ACTB_ENST9_4");
/// ```
pub fn split_probe_id(probe_id: &str, side_field: Option<usize>) -> Option<(ProbeSide, String)> {
    let fields: Vec<&str> = probe_id.split('_').collect();
    let idx = match side_field {
        Some(i) => i,
        None => fields.iter().rposition(|f| ProbeSide::from_token(f).is_some())?,
    };
    let side = ProbeSide::from_token(fields.get(idx)?)?;
    let pair = fields
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, f)| *f)
        .collect::<Vec<_>>()
        .join("_");
    Some((side, pair))
}

/// Pair identifier for a probe identifier (see [`split_probe_id`]).
pub fn pair_key_of(probe_id: &str, side_field: Option<usize>) -> Option<String> {
    split_probe_id(probe_id, side_field).map(|(_, pair)| pair)
}

/// A target sequence together with the probe pairs designed against it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceTemplate {
    id: String,
    template: String,
    probes: Vec<ProbePair>,
}

impl SequenceTemplate {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self { id: id.into(), template: template.into(), probes: Vec::new() }
    }

    /// `{gene_id}_{gene_name}_{transcript_id}` identifier.
    pub fn id(&self) -> &str { &self.id }

    pub fn template(&self) -> &str { &self.template }

    /// Probe pairs in ascending `start` order.
    pub fn probes(&self) -> &[ProbePair] { &self.probes }

    pub fn len_probes(&self) -> usize { self.probes.len() }

    /// Gene identifier: first `_` field of the id.
    pub fn gene_id(&self) -> &str { self.id.split('_').next().unwrap_or("") }

    /// Gene name: second `_` field of the id (empty when absent).
    pub fn gene_name(&self) -> &str { self.id.split('_').nth(1).unwrap_or("") }

    /// Replace the probe list; the new list is stable-sorted by `start`.
    pub fn set_probes(&mut self, mut probes: Vec<ProbePair>) {
        probes.sort_by_key(|p| p.start);
        self.probes = probes;
    }

    /// Keep only the probe pairs matching `keep`, preserving their order.
    pub fn retain_probes<F: FnMut(&ProbePair) -> bool>(&mut self, mut keep: F) {
        let kept: Vec<ProbePair> = std::mem::take(&mut self.probes).into_iter().filter(|p| keep(p)).collect();
        self.probes = kept;
    }

    /// Drop pairs from the tail until at most `n` remain.
    pub fn truncate_probes(&mut self, n: usize) { self.probes.truncate(n); }

    /// Mutable access for identifier assignment, which must not reorder the list.
    pub(crate) fn probes_mut(&mut self) -> &mut [ProbePair] { &mut self.probes }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A pair with a valid 25 nt layout whose coordinates are set by the caller.
    pub fn pair(idx: usize, start: i64, end: i64) -> ProbePair {
        ProbePair {
            hash_id: format!("{:07x}", idx),
            lhs_id: format!("G1_ABC_T1_LHS_{idx}"),
            rhs_id: format!("G1_ABC_T1_RHS_{idx}"),
            start,
            end,
            lhs: format!("{LHS_HANDLE}ACGTACGTACGTACGTACGTACGTT"),
            lhs_gc: 48.0,
            rhs: format!("GACTGACTGACTGACTGACTGACTG{}", "A".repeat(POLY_A_LEN)),
            rhs_gc: 52.0,
        }
    }
}
