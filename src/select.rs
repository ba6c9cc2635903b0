//! Probe Pair Selector: panel-level filtering of built probe pairs.
//!
//! Four filters run in a fixed order, each on the survivors of the previous:
//!
//! 1. **specificity**: drop a pair when *both* arms have more than
//!    `max_offtarget_hits` off-target hits (ligation needs both arms bound, so
//!    one clean arm is enough);
//! 2. **homopolymer**: drop a pair whose RHS hybridizing region holds a run
//!    of `homopolymer_run` identical nucleotides;
//! 3. **overlap**: walking in `start` order, drop a pair when the last kept
//!    pair's `end + min_spacer` exceeds its `start`;
//! 4. **cap**: keep the first `max_pairs_per_gene` pairs.
//!
//! Every filter rebuilds the list from the survivors, so removing one pair
//! never skips the evaluation of the next. Sequences are independent and are
//! processed on the current rayon pool.
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::SelectionParams;
use crate::hits::OffTargetHits;
use crate::probe::SequenceTemplate;
use crate::seq::has_homopolymer;

/// Survivor counts after each stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub input: usize,
    pub specific: usize,
    pub homopolymer_free: usize,
    pub non_overlapping: usize,
    pub capped: usize,
}

impl std::ops::Add for StageCounts {
    type Output = StageCounts;
    fn add(self, o: StageCounts) -> StageCounts {
        StageCounts {
            input: self.input + o.input,
            specific: self.specific + o.specific,
            homopolymer_free: self.homopolymer_free + o.homopolymer_free,
            non_overlapping: self.non_overlapping + o.non_overlapping,
            capped: self.capped + o.capped,
        }
    }
}

/// Drop pairs with off-target hits on both arms.
pub fn filter_specificity(seq: &mut SequenceTemplate, hits: &OffTargetHits, params: &SelectionParams) {
    seq.retain_probes(|p| !hits.is_nonspecific(&p.pair_key(params.side_field), params.max_offtarget_hits));
}

/// Drop pairs whose RHS hybridizing region contains a homopolymer run.
pub fn filter_homopolymer(seq: &mut SequenceTemplate, params: &SelectionParams) {
    seq.retain_probes(|p| !has_homopolymer(p.rhs_hyb(), params.homopolymer_run));
}

/// Keep pairs spaced at least `min_spacer` from the previously kept pair.
pub fn filter_overlap(seq: &mut SequenceTemplate, params: &SelectionParams) {
    let mut last_end: Option<i64> = None;
    seq.retain_probes(|p| match last_end {
        Some(end) if end.saturating_add(params.min_spacer) > p.start => false,
        _ => {
            last_end = Some(p.end);
            true
        }
    });
}

/// Keep the earliest `max_pairs_per_gene` pairs.
pub fn filter_cap(seq: &mut SequenceTemplate, params: &SelectionParams) {
    seq.truncate_probes(params.max_pairs_per_gene);
}

/// Run the four filters on one sequence.
pub fn select_sequence(seq: &mut SequenceTemplate, hits: &OffTargetHits, params: &SelectionParams) -> StageCounts {
    let input = seq.len_probes();
    filter_specificity(seq, hits, params);
    let specific = seq.len_probes();
    filter_homopolymer(seq, params);
    let homopolymer_free = seq.len_probes();
    filter_overlap(seq, params);
    let non_overlapping = seq.len_probes();
    filter_cap(seq, params);
    let counts = StageCounts { input, specific, homopolymer_free, non_overlapping, capped: seq.len_probes() };
    debug!(
        sequence = seq.id(),
        input,
        specific,
        homopolymer_free,
        non_overlapping,
        capped = counts.capped,
        "selected probe pairs"
    );
    counts
}

/// Filter every sequence of the panel in place; returns summed stage counts.
pub fn select_panel(sequences: &mut [SequenceTemplate], hits: &OffTargetHits, params: &SelectionParams) -> StageCounts {
    let total = sequences
        .par_iter_mut()
        .map(|s| select_sequence(s, hits, params))
        .reduce(StageCounts::default, |a, b| a + b);
    info!(
        nonspecific = hits.nonspecific_pairs(params.max_offtarget_hits).len(),
        input = total.input,
        specific = total.specific,
        homopolymer_free = total.homopolymer_free,
        non_overlapping = total.non_overlapping,
        selected = total.capped,
        "panel selection finished"
    );
    total
}
