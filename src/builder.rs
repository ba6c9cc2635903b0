//! Probe Pair Builder: turns Primer3 right-primer hits into LHS/RHS probe pairs.
//!
//! For every stanza of Primer3 output the builder
//! 1. keeps right-primer hits that are exactly 25 nt long and end in `T`
//!    (the ligation junction must sit on a thymine),
//! 2. builds the RHS arm from the template 24 nt left of the hit,
//! 3. drops pairs whose RHS GC percent is out of range or whose window lies
//!    outside the template,
//! 4. sorts by `start` and assigns hash ids and `LHS`/`RHS` ids once.
//!
//! ```
//! use probest::builder::construct_rhs;
//! let template = "ACGT".repeat(50);
//! let rhs = construct_rhs(&template, 50).unwrap();
//! assert_eq!(rhs.end, 1);
//! assert_eq!(rhs.hyb, probest::seq::reverse_complement(&template[1..26]));
//! ```
use std::io::Write;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::BuilderParams;
use crate::primer3::{RightPrimerHit, Stanza};
use crate::probe::{ProbePair, SequenceTemplate, HYB_LEN, LHS_HANDLE, POLY_A_LEN};
use crate::seq::{gc_percent, reverse_complement, round3, HashIds};

/// Offset from the LHS start to the right edge of the RHS window.
const RHS_OFFSET: i64 = 24;

/// RHS arm derived from an LHS start coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct RhsArm {
    /// Reverse complement of `template[end..end + 25]`.
    pub hyb: String,
    /// Hybridizing region followed by the poly-A handle.
    pub probe: String,
    pub gc: f64,
    /// Left edge of the window (`start - 49`).
    pub end: i64,
}

/// Build the RHS arm for an LHS hit starting at `start`.
///
/// Returns `None` when the 25 nt window `[start - 49, start - 24)` is not
/// fully inside the template, or cannot be expressed as an `i64`.
pub fn construct_rhs(template: &str, start: i64) -> Option<RhsArm> {
    let rhs_start = start.checked_sub(RHS_OFFSET)?;
    let rhs_end = rhs_start.checked_sub(HYB_LEN as i64)?;
    if rhs_end < 0 || rhs_start > template.len() as i64 {
        return None;
    }
    let window = template.get(rhs_end as usize..rhs_start as usize)?;
    let hyb = reverse_complement(window);
    let gc = gc_percent(&hyb);
    let probe = format!("{hyb}{}", "A".repeat(POLY_A_LEN));
    Some(RhsArm { hyb, probe, gc, end: rhs_end })
}

/// A right-primer hit may become an LHS arm only if it is 25 nt and ends in `T`.
pub fn is_admissible_lhs(hit: &str) -> bool {
    hit.len() == HYB_LEN && hit.ends_with(['T', 't'])
}

/// Counters describing one build run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub sequences: usize,
    pub candidate_hits: usize,
    /// Wrong length or not ending in `T`.
    pub inadmissible: usize,
    /// RHS window outside the template.
    pub off_template: usize,
    /// RHS GC out of range or `end` past the template.
    pub rejected: usize,
    pub retained: usize,
}

/// Builds probe pairs stanza by stanza, sharing one hash-id generator per run.
#[derive(Debug, Default)]
pub struct ProbeBuilder {
    params: BuilderParams,
    ids: HashIds,
    stats: BuildStats,
}

impl ProbeBuilder {
    pub fn new(params: BuilderParams) -> Self {
        Self { params, ids: HashIds::new(), stats: BuildStats::default() }
    }

    pub fn stats(&self) -> &BuildStats { &self.stats }

    fn pair_from_hit(&mut self, template: &str, hit: &RightPrimerHit) -> Option<ProbePair> {
        self.stats.candidate_hits += 1;
        if !is_admissible_lhs(&hit.sequence) {
            self.stats.inadmissible += 1;
            return None;
        }
        let start = hit.start.unwrap_or_default();
        let Some(rhs) = construct_rhs(template, start) else {
            self.stats.off_template += 1;
            return None;
        };
        Some(ProbePair {
            hash_id: String::new(),
            lhs_id: String::new(),
            rhs_id: String::new(),
            start,
            end: rhs.end,
            lhs: format!("{LHS_HANDLE}{}", hit.sequence),
            lhs_gc: round3(hit.gc_percent.unwrap_or_default()),
            rhs: rhs.probe,
            rhs_gc: rhs.gc,
        })
    }

    fn admissible(&self, template: &SequenceTemplate, p: &ProbePair) -> bool {
        (self.params.gc_min..=self.params.gc_max).contains(&p.rhs_gc) && p.end <= template.template().len() as i64
    }

    /// Build the filtered, sorted, identified probe list for one stanza.
    pub fn build_sequence(&mut self, stanza: &Stanza) -> SequenceTemplate {
        let mut seq = SequenceTemplate::new(stanza.sequence_id(), stanza.template());
        let candidates: Vec<ProbePair> = stanza
            .right_primers()
            .iter()
            .filter_map(|hit| self.pair_from_hit(seq.template(), hit))
            .collect();
        let n = candidates.len();
        let kept: Vec<ProbePair> = candidates.into_iter().filter(|p| self.admissible(&seq, p)).collect();
        self.stats.rejected += n - kept.len();
        seq.set_probes(kept);
        self.assign_ids(&mut seq);
        self.stats.sequences += 1;
        self.stats.retained += seq.len_probes();
        debug!(sequence = seq.id(), pairs = seq.len_probes(), "built probe pairs");
        seq
    }

    fn assign_ids(&mut self, seq: &mut SequenceTemplate) {
        let id = seq.id().to_string();
        for (i, p) in seq.probes_mut().iter_mut().enumerate() {
            p.hash_id = self.ids.next_id();
            p.lhs_id = format!("{id}_LHS_{i}");
            p.rhs_id = format!("{id}_RHS_{i}");
        }
    }

    /// Build every stanza in order.
    pub fn build_all(&mut self, stanzas: &[Stanza]) -> Vec<SequenceTemplate> {
        let out: Vec<SequenceTemplate> = stanzas.iter().map(|s| self.build_sequence(s)).collect();
        let s = &self.stats;
        info!(
            sequences = s.sequences,
            candidates = s.candidate_hits,
            inadmissible = s.inadmissible,
            off_template = s.off_template,
            rejected = s.rejected,
            retained = s.retained,
            "probe pair build finished"
        );
        out
    }
}

/// Convenience wrapper: build all stanzas with fresh state.
pub fn build_probe_pairs(stanzas: &[Stanza], params: &BuilderParams) -> (Vec<SequenceTemplate>, BuildStats) {
    let mut b = ProbeBuilder::new(params.clone());
    let seqs = b.build_all(stanzas);
    (seqs, b.stats.clone())
}

/// Write the 25 nt hybridizing regions of every pair as two-line FASTA,
/// LHS then RHS, for the external off-target search.
pub fn write_hybridizing_fasta<W: Write>(w: &mut W, sequences: &[SequenceTemplate]) -> Result<()> {
    for s in sequences {
        for p in s.probes() {
            writeln!(w, ">{}\n{}", p.lhs_id, p.lhs_hyb())?;
            writeln!(w, ">{}\n{}", p.rhs_id, p.rhs_hyb())?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod builder_tests {
    use super::*;
    use crate::primer3::parse_stanzas;

    /// 200 nt template whose every 25 nt window has 48–52 % GC.
    pub fn template_200() -> String { "ACGTGCAT".repeat(25) }

    /// A 25 nt hit ending in `T`.
    pub const HIT: &str = "GGATCCAGTACGATCGATCGATCGT";

    pub fn stanza(id: &str, template: &str, hits: &[(&str, i64)]) -> String {
        let mut s = format!("SEQUENCE_ID={id}\nSEQUENCE_TEMPLATE={template}\n");
        for (i, (seq, start)) in hits.iter().enumerate() {
            s.push_str(&format!(
                "PRIMER_RIGHT_{i}_SEQUENCE={seq}\nPRIMER_RIGHT_{i}={start},25\nPRIMER_RIGHT_{i}_GC_PERCENT=52.000\n"
            ));
        }
        s.push_str("=\n");
        s
    }

    #[test]
    fn rhs_from_lhs_at_50() {
        let t = template_200();
        let rhs = construct_rhs(&t, 50).unwrap();
        assert_eq!(rhs.end, 1);
        assert_eq!(rhs.hyb, reverse_complement(&t[1..26]));
        assert_eq!(rhs.hyb.len(), HYB_LEN);
        assert_eq!(rhs.probe, format!("{}{}", rhs.hyb, "A".repeat(30)));
        assert_eq!(rhs.gc, gc_percent(&rhs.hyb));
    }

    #[test]
    fn rhs_is_deterministic() {
        let t = template_200();
        let a = construct_rhs(&t, 123).unwrap();
        for _ in 0..10 {
            assert_eq!(construct_rhs(&t, 123).unwrap(), a);
        }
    }

    #[test]
    fn window_off_the_left_edge_is_rejected() {
        let t = template_200();
        assert!(construct_rhs(&t, 48).is_none());
        assert!(construct_rhs(&t, 49).is_some());
        assert!(construct_rhs(&t, 0).is_none());
        assert!(construct_rhs(&t, 225).is_none());
        assert!(construct_rhs(&t, 224).is_some());
        assert!(construct_rhs(&t, i64::MIN).is_none());
        assert!(construct_rhs(&t, i64::MIN + 30).is_none());
        assert!(construct_rhs(&t, i64::MAX).is_none());
    }

    #[test]
    fn extreme_start_is_off_template() {
        let t = template_200();
        let text = stanza("G1_ABC_T1", &t, &[(HIT, i64::MIN), (HIT, 60)]);
        let (seqs, stats) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        assert_eq!(stats.off_template, 1);
        assert_eq!(seqs[0].probes().iter().map(|p| p.start).collect::<Vec<_>>(), vec![60]);
    }

    #[test]
    fn gc_bounds_are_inclusive() {
        // RHS window for a hit at 50 is template[1..26]; k of its 25 bases are G.
        let mut text = String::new();
        for k in [10usize, 11, 18, 19] {
            let window = format!("{}{}", "G".repeat(k), "A".repeat(HYB_LEN - k));
            let t = format!("A{window}{}", "A".repeat(174));
            text.push_str(&stanza(&format!("G{k}_GC_T{k}"), &t, &[(HIT, 50)]));
        }
        let (seqs, stats) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        let kept: Vec<usize> = seqs.iter().map(|s| s.len_probes()).collect();
        assert_eq!(kept, vec![0, 1, 1, 0]);
        assert_eq!(seqs[1].probes()[0].rhs_gc, 44.0);
        assert_eq!(seqs[2].probes()[0].rhs_gc, 72.0);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn admissibility_requires_25nt_ending_in_t() {
        assert!(is_admissible_lhs(HIT));
        assert!(!is_admissible_lhs(&HIT[1..]));
        assert!(!is_admissible_lhs("GGATCCAGTACGATCGATCGATCGA"));
    }

    #[test]
    fn builds_sorted_identified_pairs() {
        let t = template_200();
        let text = stanza("G1_ABC_T1", &t, &[(HIT, 150), (HIT, 60), ("GGATCCAGTACGATCGATCGATCGA", 90), (HIT, 10)]);
        let (seqs, stats) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        assert_eq!(seqs.len(), 1);
        let s = &seqs[0];
        let starts: Vec<i64> = s.probes().iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![60, 150]);
        assert_eq!(stats.inadmissible, 1);
        assert_eq!(stats.off_template, 1);
        assert_eq!(stats.retained, 2);
        for (i, p) in s.probes().iter().enumerate() {
            assert_eq!(p.lhs_id, format!("G1_ABC_T1_LHS_{i}"));
            assert_eq!(p.rhs_id, format!("G1_ABC_T1_RHS_{i}"));
            assert_eq!(p.hash_id.len(), 7);
            assert_eq!(p.lhs, format!("{LHS_HANDLE}{HIT}"));
            assert_eq!(p.lhs_hyb().len(), 25);
            assert_eq!(p.rhs_hyb().len(), 25);
            assert_eq!(p.lhs_gc, 52.0);
            assert!((44.0..=72.0).contains(&p.rhs_gc));
            assert_eq!(p.end, p.start - 49);
        }
        assert_ne!(s.probes()[0].hash_id, s.probes()[1].hash_id);
    }

    #[test]
    fn gc_out_of_range_is_dropped() {
        // All-A template: every RHS arm has 0 % GC.
        let t = "A".repeat(200);
        let text = stanza("G2_AT_T2", &t, &[(HIT, 100)]);
        let (seqs, stats) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        assert_eq!(seqs[0].len_probes(), 0);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn missing_start_falls_off_template() {
        let t = template_200();
        let text = format!("SEQUENCE_ID=G3_X_T3\nSEQUENCE_TEMPLATE={t}\nPRIMER_RIGHT_0_SEQUENCE={HIT}\n=\n");
        let (seqs, stats) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        assert_eq!(seqs[0].len_probes(), 0);
        assert_eq!(stats.off_template, 1);
    }

    #[test]
    fn hybridizing_fasta_has_two_records_per_pair() {
        let t = template_200();
        let text = stanza("G1_ABC_T1", &t, &[(HIT, 60)]);
        let (seqs, _) = build_probe_pairs(&parse_stanzas(&text), &BuilderParams::default());
        let mut buf = Vec::new();
        write_hybridizing_fasta(&mut buf, &seqs).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ">G1_ABC_T1_LHS_0");
        assert_eq!(lines[1], HIT);
        assert_eq!(lines[2], ">G1_ABC_T1_RHS_0");
        assert_eq!(lines[3], reverse_complement(&t[11..36]));
    }
}
