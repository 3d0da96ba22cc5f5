//! Cluster Membership Module
//!
//! Reads the two-column cluster table written by the clustering tool
//! (`mmseqs createtsv`) and turns raw cluster keys into sequential
//! `cluster_{n}` identifiers.
//!
//! # Input Format
//! ```text
//! rep_key<TAB>{genome}~{protein}
//! ```
//!
//! # Ordering Precondition
//! Cluster boundaries are found by comparing each row's key to the key of the
//! row before it. Rows of one cluster must therefore be contiguous, which is
//! how the clustering tool writes them. If a key reappears after another key,
//! its rows start a new cluster with a new identifier; the resolver logs a
//! warning when that happens but does not merge the groups.

use log::{debug, warn};
use rustc_hash::FxHashSet;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{AnnotError, IoResultExt, Result};
use crate::genome::GenomeSet;
use crate::seqio::{open_text, LineReader};

/// Separator between genome and protein in a member key.
pub const MEMBER_SEPARATOR: char = '~';

// ============================================================================
// Membership Records
// ============================================================================

/// One row of the cluster table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub cluster_key: String,
    pub genome: String,
    pub protein: String,
}

impl ClusterMember {
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 {
            return Err(AnnotError::malformed(
                line_no,
                line,
                format!("expected 2 tab-separated fields, found {}", fields.len()),
            ));
        }

        let (genome, protein) = fields[1].split_once(MEMBER_SEPARATOR).ok_or_else(|| {
            AnnotError::malformed(
                line_no,
                line,
                format!("member '{}' is not of the form genome~protein", fields[1]),
            )
        })?;
        if genome.is_empty() || protein.is_empty() {
            return Err(AnnotError::malformed(
                line_no,
                line,
                "member has an empty genome or protein id",
            ));
        }

        Ok(Self {
            cluster_key: fields[0].to_string(),
            genome: genome.to_string(),
            protein: protein.to_string(),
        })
    }
}

/// Sequential reader for cluster tables. Rows are returned in input order.
pub struct ClusterReader<R: BufRead> {
    lines: LineReader<R>,
}

impl ClusterReader<Box<dyn BufRead + Send>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            lines: LineReader::new(open_text(path)?, false).with_source(path),
        })
    }
}

impl<R: BufRead> ClusterReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader, false),
        }
    }

    pub fn read_next(&mut self) -> Result<Option<ClusterMember>> {
        match self.lines.next_line()? {
            Some((line_no, line)) => Ok(Some(ClusterMember::parse_line(line, line_no)?)),
            None => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for ClusterReader<R> {
    type Item = Result<ClusterMember>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

// ============================================================================
// Cluster Resolver
// ============================================================================

/// A protein with its resolved cluster identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub genome: String,
    pub protein: String,
    pub cluster_id: String,
}

/// Mints `cluster_{n}` identifiers for adjacent groups of cluster keys.
///
/// Numbering starts at 1 and is global across all genomes of one run.
///
/// Every closed cluster key is retained to detect keys that reappear, so
/// memory grows with the number of distinct keys in the table.
#[derive(Debug, Default)]
pub struct ClusterResolver {
    previous_cluster_key: Option<String>,
    next_cluster_index: usize,
    seen_cluster_ids: FxHashSet<String>,
    minted: Vec<String>,
    closed_keys: FxHashSet<String>,
}

impl ClusterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state so numbering restarts at `cluster_1`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn current_id(&self) -> String {
        format!("cluster_{}", self.next_cluster_index)
    }

    /// Returns the identifier for the row with `cluster_key`.
    pub fn resolve(&mut self, cluster_key: &str) -> String {
        if self.previous_cluster_key.as_deref() == Some(cluster_key) {
            return self.current_id();
        }

        if self.closed_keys.contains(cluster_key) {
            warn!(
                "Cluster key {} reappears after other clusters; its rows get a new cluster id. \
                 The cluster table is not grouped by cluster.",
                cluster_key
            );
        }
        if let Some(previous) = self.previous_cluster_key.take() {
            self.closed_keys.insert(previous);
        }

        self.next_cluster_index += 1;
        let id = self.current_id();
        self.seen_cluster_ids.insert(id.clone());
        self.minted.push(id.clone());
        self.previous_cluster_key = Some(cluster_key.to_string());
        id
    }

    /// Resolves one member and records the cluster on its genome.
    pub fn assign(
        &mut self,
        member: ClusterMember,
        genomes: &mut GenomeSet,
    ) -> Result<ClusterAssignment> {
        let cluster_id = self.resolve(&member.cluster_key);
        genomes
            .get_mut(&member.genome)?
            .add_cluster(&member.protein, &cluster_id)?;

        Ok(ClusterAssignment {
            genome: member.genome,
            protein: member.protein,
            cluster_id,
        })
    }

    /// Resolves every member of `members`, in order.
    pub fn resolve_all<I>(
        &mut self,
        members: I,
        genomes: &mut GenomeSet,
    ) -> Result<Vec<ClusterAssignment>>
    where
        I: IntoIterator<Item = Result<ClusterMember>>,
    {
        let mut assignments = Vec::new();
        for member in members {
            assignments.push(self.assign(member?, genomes)?);
        }
        debug!(
            "Resolved {} cluster members into {} clusters",
            assignments.len(),
            self.minted.len()
        );
        Ok(assignments)
    }

    /// Identifiers minted so far, as a set.
    pub fn cluster_ids(&self) -> &FxHashSet<String> {
        &self.seen_cluster_ids
    }

    /// Identifiers minted so far, in minting order.
    pub fn minted(&self) -> &[String] {
        &self.minted
    }
}

/// Writes `genome<TAB>protein<TAB>cluster_id` rows in processing order.
pub fn write_assignments<W: Write>(
    writer: &mut W,
    assignments: &[ClusterAssignment],
) -> std::io::Result<()> {
    for a in assignments {
        writeln!(writer, "{}\t{}\t{}", a.genome, a.protein, a.cluster_id)?;
    }
    Ok(())
}

/// Writes the assignment table to `path`.
pub fn write_assignments_file<P: AsRef<Path>>(
    path: P,
    assignments: &[ClusterAssignment],
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path).with_path(path)?);
    write_assignments(&mut writer, assignments).with_path(path)?;
    writer.flush().with_path(path)
}

// ============================================================================
// Tests
// ============================================================================
