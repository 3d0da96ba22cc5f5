//! Normalized hit records shared by the alignment and domain parsers.

use std::fmt;

/// Evidence format a hit was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvidenceFormat {
    /// BLAST/DIAMOND tabular output (outfmt 6).
    PairwiseAlignment,
    /// HMMER `--domtblout` domain table.
    DomainHmm,
}

impl fmt::Display for EvidenceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceFormat::PairwiseAlignment => write!(f, "pairwise alignment"),
            EvidenceFormat::DomainHmm => write!(f, "domain HMM"),
        }
    }
}

/// Candidate evidence linking one protein to one annotation identifier.
///
/// Percent identity stays on the tool's 0-100 scale. Coverages are fractions
/// in 0-1; parsers convert tool-native percentages when reading them.
/// Fields a format does not emit are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub protein_id: String,
    pub annotation_id: String,
    pub e_value: f64,
    pub bit_score: f64,
    pub percent_identity: Option<f64>,
    pub query_coverage: Option<f64>,
    pub subject_coverage: Option<f64>,
    pub format: EvidenceFormat,
}
