//! Sequence and Table I/O Module
//!
//! Shared reading primitives for the evidence parsers and the protein loader.
//! Every input may be plain text or gzip-compressed; compression is detected
//! from the `.gz` extension.
//!
//! # Examples
//! ```no_run
//! use annomat::seqio::FastaReader;
//!
//! let mut reader = FastaReader::open("genome_1.faa").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} aa", record.name, record.seq.len());
//! }
//! ```

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Read buffer used for all file-backed readers.
const READ_CAPACITY: usize = 1024 * 1024;

/// Opens a text file for buffered reading, decompressing `.gz` files.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path).with_path(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    if ext == "gz" {
        Ok(Box::new(BufReader::with_capacity(
            READ_CAPACITY,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_CAPACITY, file)))
    }
}

// ============================================================================
// Line Reader
// ============================================================================

/// Line-oriented reader that tracks 1-based line numbers.
///
/// Blank (whitespace-only) lines and, when enabled, `#` comment lines are
/// skipped. Returned lines lose only their `\n` or `\r\n` terminator, so
/// trailing empty tab-separated fields survive the field-count checks.
pub struct LineReader<R: BufRead> {
    reader: R,
    source: PathBuf,
    line_buf: String,
    line_no: usize,
    skip_comments: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, skip_comments: bool) -> Self {
        Self {
            reader,
            source: PathBuf::from("<stream>"),
            line_buf: String::with_capacity(512),
            line_no: 0,
            skip_comments,
        }
    }

    /// Names the input in I/O error messages.
    pub fn with_source<P: Into<PathBuf>>(mut self, source: P) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the next content line with its line number, or `None` at EOF.
    pub fn next_line(&mut self) -> Result<Option<(usize, &str)>> {
        loop {
            self.line_buf.clear();
            let read = self
                .reader
                .read_line(&mut self.line_buf)
                .with_path(&self.source)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line_buf.trim_end();
            if line.is_empty() || (self.skip_comments && line.starts_with('#')) {
                continue;
            }
            break;
        }
        Ok(Some((
            self.line_no,
            self.line_buf.trim_end_matches(['\n', '\r']),
        )))
    }
}

// ============================================================================
// FASTA Format
// ============================================================================

/// A FASTA record containing the sequence identifier and residues.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    /// Sequence identifier (text after '>' up to the first whitespace).
    pub name: String,
    /// Concatenated sequence lines.
    pub seq: String,
}

/// Sequential reader for (optionally gzipped) FASTA files.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line_buf: String,
    current_name: Option<String>,
}

impl FastaReader<Box<dyn BufRead + Send>> {
    /// Opens a FASTA file, plain or `.gz`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_text(path)?;
        FastaReader::new(reader).with_path(path)
    }
}

impl<R: BufRead> FastaReader<R> {
    /// Wraps a buffered reader, consuming lines up to the first header.
    pub fn new(mut reader: R) -> std::io::Result<Self> {
        let mut line_buf = String::with_capacity(256);
        let mut current_name = None;

        loop {
            line_buf.clear();
            if reader.read_line(&mut line_buf)? == 0 {
                break;
            }
            if let Some(header) = line_buf.strip_prefix('>') {
                current_name = Some(header_name(header));
                break;
            }
        }

        Ok(Self {
            reader,
            line_buf,
            current_name,
        })
    }

    /// Reads the next FASTA record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of file reached
    /// - `Err(e)` - I/O error occurred
    pub fn read_next(&mut self) -> std::io::Result<Option<FastaRecord>> {
        let name = match self.current_name.take() {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut seq = String::with_capacity(1024);

        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }

            if let Some(header) = self.line_buf.strip_prefix('>') {
                self.current_name = Some(header_name(header));
                break;
            }
            seq.push_str(self.line_buf.trim_end());
        }

        Ok(Some(FastaRecord { name, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = std::io::Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

fn header_name(header: &str) -> String {
    header.split_whitespace().next().unwrap_or("").to_string()
}
