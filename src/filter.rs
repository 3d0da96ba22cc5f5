//! Threshold Filter Module
//!
//! Decides whether a normalized hit counts as an annotation.
//!
//! # Scale Convention
//! Identity and coverage thresholds are configured as fractions in `[0, 1]`.
//! Hits report percent identity on the tool's 0-100 scale and coverages as
//! fractions, so identity is compared on the fraction side as
//! `hit.percent_identity / 100 >= min_identity` and coverages are compared
//! directly. Percentages are only produced for [`Thresholds::tool_args`],
//! rounded to six decimals: DIAMOND receives percentages, MMseqs2 receives
//! fractions.
//!
//! [`Thresholds::validate`] rejects identity or coverage values outside
//! `[0, 1]`, so a percentage passed by mistake is a configuration error
//! rather than a filter that silently rejects everything.

use log::warn;

use crate::error::{AnnotError, Result};
use crate::hit::{EvidenceFormat, HitRecord};

/// Score and coverage cutoffs. Unset fields impose no constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    /// Keep hits with `e_value <= e_value`.
    pub e_value: Option<f64>,
    /// Keep hits with `bit_score >= min_bit_score`.
    pub min_bit_score: Option<f64>,
    /// Minimum identity as a fraction.
    pub min_identity: Option<f64>,
    /// Minimum query coverage as a fraction.
    pub min_query_coverage: Option<f64>,
    /// Minimum subject coverage as a fraction.
    pub min_subject_coverage: Option<f64>,
}

/// External search tools whose command lines the thresholds can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTool {
    Diamond,
    Hmmsearch,
    Mmseqs,
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        if let Some(e) = self.e_value {
            if e.is_nan() || e < 0.0 {
                return Err(AnnotError::Config(format!(
                    "e-value cutoff must be non-negative, got {}",
                    e
                )));
            }
        }
        if let Some(bit) = self.min_bit_score {
            if bit.is_nan() {
                return Err(AnnotError::Config("bit score cutoff is NaN".to_string()));
            }
        }

        let fractions = [
            ("identity", self.min_identity),
            ("query coverage", self.min_query_coverage),
            ("subject coverage", self.min_subject_coverage),
        ];
        for (name, value) in fractions {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(AnnotError::Config(format!(
                        "{} threshold must be a fraction between 0 and 1, got {}",
                        name, v
                    )));
                }
            }
        }

        Ok(())
    }

    /// Minimum identity on the 0-100 scale used by search tools.
    pub fn min_percent_identity(&self) -> Option<f64> {
        self.min_identity.map(to_percent)
    }

    /// Returns the thresholds that apply to hits of `format`.
    ///
    /// Domain HMM tables carry no identity, so an identity cutoff is dropped
    /// for that format with a warning.
    pub fn for_format(&self, format: EvidenceFormat) -> Thresholds {
        let mut effective = *self;
        if format == EvidenceFormat::DomainHmm && effective.min_identity.is_some() {
            warn!("Identity threshold is not used for {} hits, ignoring it", format);
            effective.min_identity = None;
        }
        effective
    }

    /// Renders the thresholds as search arguments for `tool`.
    ///
    /// Returns the arguments together with notes about thresholds the tool
    /// cannot apply.
    pub fn tool_args(&self, tool: SearchTool) -> (Vec<String>, Vec<String>) {
        let mut args = Vec::new();
        let mut notes = Vec::new();

        match tool {
            SearchTool::Diamond => {
                if let Some(e) = self.e_value {
                    push_arg(&mut args, "--evalue", e);
                }
                if let Some(bit) = self.min_bit_score {
                    push_arg(&mut args, "--min-score", bit);
                }
                if let Some(id) = self.min_percent_identity() {
                    push_arg(&mut args, "--id", id);
                }
                if let Some(c) = self.min_query_coverage {
                    push_arg(&mut args, "--query-cover", to_percent(c));
                }
                if let Some(c) = self.min_subject_coverage {
                    push_arg(&mut args, "--subject-cover", to_percent(c));
                }
            }
            SearchTool::Hmmsearch => {
                if let Some(e) = self.e_value {
                    push_arg(&mut args, "-E", e);
                }
                if let Some(bit) = self.min_bit_score {
                    push_arg(&mut args, "-T", bit);
                }
                if self.min_identity.is_some() {
                    notes.push("--id flag not used for hmmsearch".to_string());
                }
                if self.min_query_coverage.is_some() || self.min_subject_coverage.is_some() {
                    notes.push("coverage is applied after hmmsearch, from the domain table".to_string());
                }
            }
            SearchTool::Mmseqs => {
                if let Some(e) = self.e_value {
                    push_arg(&mut args, "-e", e);
                }
                if let Some(id) = self.min_identity {
                    push_arg(&mut args, "--min-seq-id", id);
                }
                if let Some(c) = self.min_query_coverage.or(self.min_subject_coverage) {
                    push_arg(&mut args, "-c", c);
                }
                if self.min_bit_score.is_some() {
                    notes.push("bit score cutoff not used for mmseqs clustering".to_string());
                }
            }
        }

        (args, notes)
    }
}

/// Fraction to percentage, rounded so `0.07` renders as `7`.
fn to_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 1e6).round() / 1e6
}

fn push_arg(args: &mut Vec<String>, flag: &str, value: f64) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Returns true when `hit` passes every configured threshold.
///
/// A threshold on a field the hit does not carry is not applied.
pub fn accept(hit: &HitRecord, thresholds: &Thresholds) -> bool {
    if let Some(max_e) = thresholds.e_value {
        if hit.e_value > max_e {
            return false;
        }
    }
    if let Some(min_bit) = thresholds.min_bit_score {
        if hit.bit_score < min_bit {
            return false;
        }
    }
    if let (Some(min_id), Some(pident)) = (thresholds.min_identity, hit.percent_identity) {
        if pident / 100.0 < min_id {
            return false;
        }
    }
    if let (Some(min_cov), Some(cov)) = (thresholds.min_query_coverage, hit.query_coverage) {
        if cov < min_cov {
            return false;
        }
    }
    if let (Some(min_cov), Some(cov)) = (thresholds.min_subject_coverage, hit.subject_coverage) {
        if cov < min_cov {
            return false;
        }
    }
    true
}
