//! HMMER Domain Table Parser Module
//!
//! Parses `hmmsearch --domtblout` output. Each row is one domain hit; a
//! protein may appear on many rows, and no best-hit reduction is done here.
//!
//! # Columns (whitespace-delimited, 0-based)
//! ```text
//! Idx  Description
//! 0    target name (protein)
//! 2    target length
//! 3    query name (profile)
//! 4    query accession ('-' when absent)
//! 5    query length
//! 6    full sequence E-value
//! 7    full sequence score
//! 11   domain c-Evalue
//! 12   domain i-Evalue
//! 13   domain score
//! 15   hmm from
//! 16   hmm to
//! 17   ali from
//! 18   ali to
//! 21   acc
//! 22+  description of target
//! ```
//!
//! Hits carry the full-sequence E-value and score, which are the values
//! `hmmsearch -E` and `-T` act on.

use std::io::BufRead;
use std::path::Path;

use crate::blast::parse_field;
use crate::error::{AnnotError, Result};
use crate::hit::{EvidenceFormat, HitRecord};
use crate::seqio::{open_text, LineReader};

const MIN_FIELDS: usize = 22;

/// A single domain table row.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub target_name: String,
    pub target_len: usize,
    pub query_name: String,
    pub query_accession: String,
    pub query_len: usize,
    pub full_e_value: f64,
    pub full_score: f64,
    pub domain_c_e_value: f64,
    pub domain_i_e_value: f64,
    pub domain_score: f64,
    pub hmm_from: usize,
    pub hmm_to: usize,
    pub ali_from: usize,
    pub ali_to: usize,
}

impl DomainRecord {
    /// Parses a whitespace-delimited domain table row.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return Err(AnnotError::malformed(
                line_no,
                line,
                format!(
                    "expected at least {} whitespace-delimited fields, found {}",
                    MIN_FIELDS,
                    fields.len()
                ),
            ));
        }

        Ok(Self {
            target_name: fields[0].to_string(),
            target_len: parse_field(fields[2], "target length", line, line_no)?,
            query_name: fields[3].to_string(),
            query_accession: fields[4].to_string(),
            query_len: parse_field(fields[5], "query length", line, line_no)?,
            full_e_value: parse_field(fields[6], "full sequence E-value", line, line_no)?,
            full_score: parse_field(fields[7], "full sequence score", line, line_no)?,
            domain_c_e_value: parse_field(fields[11], "domain c-Evalue", line, line_no)?,
            domain_i_e_value: parse_field(fields[12], "domain i-Evalue", line, line_no)?,
            domain_score: parse_field(fields[13], "domain score", line, line_no)?,
            hmm_from: parse_field(fields[15], "hmm from", line, line_no)?,
            hmm_to: parse_field(fields[16], "hmm to", line, line_no)?,
            ali_from: parse_field(fields[17], "ali from", line, line_no)?,
            ali_to: parse_field(fields[18], "ali to", line, line_no)?,
        })
    }

    /// Annotation identifier for this hit.
    ///
    /// Pfam-style accessions lose their version (`PF00001.21` -> `PF00001`).
    /// Profiles without an accession are identified by name.
    pub fn annotation_id(&self) -> &str {
        if self.query_accession == "-" || self.query_accession.is_empty() {
            self.query_name.as_str()
        } else {
            self.query_accession
                .split('.')
                .next()
                .unwrap_or(&self.query_accession)
        }
    }

    /// Fraction of the protein covered by the domain alignment.
    pub fn query_coverage(&self) -> Option<f64> {
        span_fraction(self.ali_from, self.ali_to, self.target_len)
    }

    /// Fraction of the profile covered by the domain alignment.
    pub fn subject_coverage(&self) -> Option<f64> {
        span_fraction(self.hmm_from, self.hmm_to, self.query_len)
    }

    pub fn into_hit(self) -> HitRecord {
        HitRecord {
            annotation_id: self.annotation_id().to_string(),
            query_coverage: self.query_coverage(),
            subject_coverage: self.subject_coverage(),
            protein_id: self.target_name,
            e_value: self.full_e_value,
            bit_score: self.full_score,
            percent_identity: None,
            format: EvidenceFormat::DomainHmm,
        }
    }
}

/// Length of the inclusive 1-based span `from..=to` over `total`.
fn span_fraction(from: usize, to: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let span = to.abs_diff(from) + 1;
    Some(span as f64 / total as f64)
}

/// Sequential reader for HMMER domain tables.
pub struct DomtblReader<R: BufRead> {
    lines: LineReader<R>,
}

impl DomtblReader<Box<dyn BufRead + Send>> {
    /// Opens a domain table, plain or `.gz`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            lines: LineReader::new(open_text(path)?, true).with_source(path),
        })
    }
}

impl<R: BufRead> DomtblReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader, true),
        }
    }

    pub fn read_next(&mut self) -> Result<Option<DomainRecord>> {
        match self.lines.next_line()? {
            Some((line_no, line)) => Ok(Some(DomainRecord::parse_line(line, line_no)?)),
            None => Ok(None),
        }
    }

    /// Adapts the reader into a stream of normalized hits.
    pub fn hits(self) -> impl Iterator<Item = Result<HitRecord>> {
        self.map(|rec| rec.map(DomainRecord::into_hit))
    }
}

impl<R: BufRead> Iterator for DomtblReader<R> {
    type Item = Result<DomainRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
