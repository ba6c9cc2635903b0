//! Design parameters for every pipeline stage.
//!
//! All thresholds default to the values used for 10x Genomics style panels.
//! A JSON file may override any subset of them:
//!
//! ```json
//! { "selection": { "max_pairs_per_gene": 5 }, "report": { "histogram_max": 6 } }
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings written into each Primer3 input stanza.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Primer3Settings {
    /// Probe arm length (`PRIMER_MIN/OPT/MAX_SIZE`).
    pub size: usize,
    pub max_ns_accepted: usize,
    pub right_min_gc: f64,
    pub right_max_gc: f64,
    /// Longest mononucleotide repeat Primer3 may accept.
    pub right_max_poly_x: usize,
    pub num_return: usize,
}

impl Default for Primer3Settings {
    fn default() -> Self {
        Self { size: 25, max_ns_accepted: 1, right_min_gc: 44.0, right_max_gc: 72.0, right_max_poly_x: 5, num_return: 100 }
    }
}

/// Per-probe admissibility thresholds applied while building pairs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderParams {
    /// Lowest accepted RHS GC percent (inclusive).
    pub gc_min: f64,
    /// Highest accepted RHS GC percent (inclusive).
    pub gc_max: f64,
}

impl Default for BuilderParams {
    fn default() -> Self { Self { gc_min: 44.0, gc_max: 72.0 } }
}

/// Panel-level filter thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionParams {
    /// A pair is non-specific when *both* arms have more off-target hits than this.
    pub max_offtarget_hits: usize,
    /// Reject RHS arms containing a run of this many identical nucleotides.
    pub homopolymer_run: usize,
    /// Minimum spacer between consecutive retained pairs.
    pub min_spacer: i64,
    pub max_pairs_per_gene: usize,
    /// Fixed `_` field holding `LHS`/`RHS` in probe ids; `None` finds it.
    pub side_field: Option<usize>,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self { max_offtarget_hits: 2, homopolymer_run: 5, min_spacer: 4, max_pairs_per_gene: 3, side_field: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportParams {
    /// Highest probe-pair count shown in the summary histogram.
    pub histogram_max: usize,
}

impl Default for ReportParams {
    fn default() -> Self { Self { histogram_max: 4 } }
}

/// All stage parameters together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignParams {
    pub primer3: Primer3Settings,
    pub builder: BuilderParams,
    pub selection: SelectionParams,
    pub report: ReportParams,
}

impl DesignParams {
    /// Load parameters from a JSON file; absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let text = std::fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing config {}", p.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> { Ok(serde_json::from_str(text)?) }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn defaults_match_panel_guidelines() {
        let p = DesignParams::default();
        assert_eq!(p.builder.gc_min, 44.0);
        assert_eq!(p.builder.gc_max, 72.0);
        assert_eq!(p.selection.max_offtarget_hits, 2);
        assert_eq!(p.selection.homopolymer_run, 5);
        assert_eq!(p.selection.min_spacer, 4);
        assert_eq!(p.selection.max_pairs_per_gene, 3);
        assert_eq!(p.report.histogram_max, 4);
        assert_eq!(p.primer3.num_return, 100);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let p = DesignParams::from_json_str(r#"{"selection": {"max_pairs_per_gene": 5, "side_field": 4}}"#).unwrap();
        assert_eq!(p.selection.max_pairs_per_gene, 5);
        assert_eq!(p.selection.side_field, Some(4));
        assert_eq!(p.selection.min_spacer, 4);
        assert_eq!(p.builder, BuilderParams::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(DesignParams::from_json_str(r#"{"selection": {"max_pairs": 5}}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"report": {"histogram_max": 6}}"#).unwrap();
        let p = DesignParams::from_json_file(&path).unwrap();
        assert_eq!(p.report.histogram_max, 6);
        assert!(DesignParams::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
