//! Pairwise Alignment Tabular Parser Module
//!
//! Parses BLAST/DIAMOND tabular output (`--outfmt 6`). The search is expected
//! to have been run with a single target per query, so every row is the best
//! hit for its protein.
//!
//! # Columns
//! ```text
//! Col  Type    Description
//! 1    string  Query id (protein)
//! 2    string  Subject id (annotation identifier, e.g. K00001)
//! 3    float   Percent identity (0-100)
//! 4    int     Alignment length
//! 5    int     Mismatches
//! 6    int     Gap opens
//! 7    int     Query start
//! 8    int     Query end
//! 9    int     Subject start
//! 10   int     Subject end
//! 11   float   E-value
//! 12   float   Bit score
//! 13   float   Query coverage per HSP, percent (optional)
//! 14   float   Subject coverage per HSP, percent (optional)
//! ```
//!
//! Columns 13 and 14 are read only when both are present; the percentages are
//! stored on the hit as fractions.
//!
//! # Example Usage
//! ```no_run
//! use annomat::blast::BlastReader;
//!
//! let reader = BlastReader::open("genome_1.tsv").unwrap();
//! for record in reader {
//!     let record = record.unwrap();
//!     println!("{} -> {} (e={:e})", record.query_id, record.subject_id, record.e_value);
//! }
//! ```

use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AnnotError, Result};
use crate::hit::{EvidenceFormat, HitRecord};
use crate::seqio::{open_text, LineReader};

const STANDARD_FIELDS: usize = 12;
const COVERAGE_FIELDS: usize = 14;

// ============================================================================
// Alignment Record
// ============================================================================

/// A single tabular alignment row.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastRecord {
    pub query_id: String,
    pub subject_id: String,
    pub percent_identity: f64,
    pub align_len: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub subject_start: usize,
    pub subject_end: usize,
    pub e_value: f64,
    pub bit_score: f64,
    /// Query coverage as a fraction, when the row carries `qcovhsp`.
    pub query_coverage: Option<f64>,
    /// Subject coverage as a fraction, when the row carries `scovhsp`.
    pub subject_coverage: Option<f64>,
}

impl BlastRecord {
    /// Parses a tab-separated alignment row.
    ///
    /// # Errors
    /// Returns `MalformedLine` if the row does not have 12 or at least 14
    /// fields, or if any numeric field cannot be parsed.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != STANDARD_FIELDS && fields.len() < COVERAGE_FIELDS {
            return Err(AnnotError::malformed(
                line_no,
                line,
                format!(
                    "expected {} or {} tab-separated fields, found {}",
                    STANDARD_FIELDS,
                    COVERAGE_FIELDS,
                    fields.len()
                ),
            ));
        }

        let (query_coverage, subject_coverage) = if fields.len() >= COVERAGE_FIELDS {
            let qcov: f64 = parse_field(fields[12], "query coverage", line, line_no)?;
            let scov: f64 = parse_field(fields[13], "subject coverage", line, line_no)?;
            (Some(qcov / 100.0), Some(scov / 100.0))
        } else {
            (None, None)
        };

        Ok(Self {
            query_id: fields[0].to_string(),
            subject_id: fields[1].to_string(),
            percent_identity: parse_field(fields[2], "percent identity", line, line_no)?,
            align_len: parse_field(fields[3], "alignment length", line, line_no)?,
            mismatches: parse_field(fields[4], "mismatches", line, line_no)?,
            gap_opens: parse_field(fields[5], "gap opens", line, line_no)?,
            query_start: parse_field(fields[6], "query start", line, line_no)?,
            query_end: parse_field(fields[7], "query end", line, line_no)?,
            subject_start: parse_field(fields[8], "subject start", line, line_no)?,
            subject_end: parse_field(fields[9], "subject end", line, line_no)?,
            e_value: parse_field(fields[10], "e-value", line, line_no)?,
            bit_score: parse_field(fields[11], "bit score", line, line_no)?,
            query_coverage,
            subject_coverage,
        })
    }

    /// Converts the row into a normalized hit.
    pub fn into_hit(self) -> HitRecord {
        HitRecord {
            protein_id: self.query_id,
            annotation_id: self.subject_id,
            e_value: self.e_value,
            bit_score: self.bit_score,
            percent_identity: Some(self.percent_identity),
            query_coverage: self.query_coverage,
            subject_coverage: self.subject_coverage,
            format: EvidenceFormat::PairwiseAlignment,
        }
    }
}

/// Parses one numeric column, reporting the column name on failure.
pub(crate) fn parse_field<T: FromStr>(
    raw: &str,
    name: &str,
    line: &str,
    line_no: usize,
) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AnnotError::malformed(line_no, line, format!("invalid {}: '{}'", name, raw)))
}

// ============================================================================
// Alignment Reader
// ============================================================================

/// Sequential reader for tabular alignment output.
///
/// `#` comment lines (outfmt 7) and blank lines are skipped.
pub struct BlastReader<R: BufRead> {
    lines: LineReader<R>,
}

impl BlastReader<Box<dyn BufRead + Send>> {
    /// Opens an alignment table, plain or `.gz`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            lines: LineReader::new(open_text(path)?, true).with_source(path),
        })
    }
}

impl<R: BufRead> BlastReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader, true),
        }
    }

    /// Reads the next alignment row.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of input reached
    /// - `Err(e)` - I/O or parsing error
    pub fn read_next(&mut self) -> Result<Option<BlastRecord>> {
        match self.lines.next_line()? {
            Some((line_no, line)) => Ok(Some(BlastRecord::parse_line(line, line_no)?)),
            None => Ok(None),
        }
    }

    /// Adapts the reader into a stream of normalized hits.
    pub fn hits(self) -> impl Iterator<Item = Result<HitRecord>> {
        self.map(|rec| rec.map(BlastRecord::into_hit))
    }
}

impl<R: BufRead> Iterator for BlastReader<R> {
    type Item = Result<BlastRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_standard_line() {
        let line = "p1\tK00001\t87.5\t300\t30\t2\t1\t300\t5\t304\t1e-50\t250.3";
        let record = BlastRecord::parse_line(line, 1).unwrap();

        assert_eq!(record.query_id, "p1");
        assert_eq!(record.subject_id, "K00001");
        assert_eq!(record.percent_identity, 87.5);
        assert_eq!(record.align_len, 300);
        assert_eq!(record.e_value, 1e-50);
        assert_eq!(record.bit_score, 250.3);
        assert!(record.query_coverage.is_none());
        assert!(record.subject_coverage.is_none());
    }

    #[test]
    fn test_parse_coverage_columns_as_fractions() {
        let line = "p1\tK00001\t87.5\t300\t30\t2\t1\t300\t5\t304\t1e-50\t250.3\t80\t95.5";
        let record = BlastRecord::parse_line(line, 1).unwrap();

        assert_eq!(record.query_coverage, Some(0.8));
        assert_eq!(record.subject_coverage, Some(0.955));
    }

    #[test]
    fn test_thirteen_fields_is_malformed() {
        let line = "p1\tK00001\t87.5\t300\t30\t2\t1\t300\t5\t304\t1e-50\t250.3\t80";
        assert!(matches!(
            BlastRecord::parse_line(line, 7),
            Err(AnnotError::MalformedLine { line_no: 7, .. })
        ));
    }

    #[test]
    fn test_non_numeric_evalue_is_malformed() {
        let line = "p1\tK00001\t87.5\t300\t30\t2\t1\t300\t5\t304\tabc\t250.3";
        let err = BlastRecord::parse_line(line, 2).unwrap_err();
        assert!(err.to_string().contains("e-value"));
    }

    #[test]
    fn test_reader_preserves_order_and_skips_comments() {
        let data = "# DIAMOND v2\n\
                    p2\tK00002\t50\t10\t0\t0\t1\t10\t1\t10\t1e-3\t20\n\
                    \n\
                    p1\tK00001\t90\t10\t0\t0\t1\t10\t1\t10\t1e-10\t100\n";
        let hits: Vec<HitRecord> = BlastReader::new(Cursor::new(data))
            .hits()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].protein_id, "p2");
        assert_eq!(hits[1].annotation_id, "K00001");
        assert_eq!(hits[1].percent_identity, Some(90.0));
        assert_eq!(hits[1].format, EvidenceFormat::PairwiseAlignment);
    }

    #[test]
    fn test_empty_coverage_columns_are_malformed() {
        let data = "p1\tK00001\t90\t10\t0\t0\t1\t10\t1\t10\t1e-10\t100\t\t\n";
        let mut reader = BlastReader::new(Cursor::new(data));
        assert!(matches!(
            reader.next(),
            Some(Err(AnnotError::MalformedLine { line_no: 1, .. }))
        ));
    }

    #[test]
    fn test_reader_fails_on_bad_row() {
        let data = "p1\tK00001\t90\t10\t0\t0\t1\t10\t1\t10\t1e-10\t100\nbroken\trow\n";
        let mut reader = BlastReader::new(Cursor::new(data));
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(AnnotError::MalformedLine { line_no, line, .. })) => {
                assert_eq!(line_no, 2);
                assert_eq!(line, "broken\trow");
            }
            other => panic!("expected malformed line, got {:?}", other),
        }
    }
}
