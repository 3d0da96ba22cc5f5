//! Frequency Matrix Module
//!
//! Builds genome x annotation count tables for one vocabulary. Rows are
//! annotation identifiers, columns are genomes in the order supplied, and each
//! cell counts the proteins of that genome holding the annotation.
//!
//! Rows are deduplicated and sorted in natural order: identifiers sharing a
//! prefix are ordered by their trailing number, so `cluster_2` comes before
//! `cluster_10`. Zero-padded ids such as `K00001` sort as plain text.
//!
//! # Output Format
//! ```text
//! ID        genome_1  genome_2
//! K00001    1         0
//! K00005    2         3
//! ```

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{IoResultExt, Result};
use crate::genome::{Genome, Vocabulary};

/// Header of the identifier column.
pub const ID_HEADER: &str = "ID";

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMatrix {
    vocabulary: Vocabulary,
    rows: Vec<String>,
    columns: Vec<String>,
    /// `counts[row][column]`
    counts: Vec<Vec<usize>>,
    row_index: FxHashMap<String, usize>,
}

impl FrequencyMatrix {
    /// Builds the matrix for `vocabulary` over `genomes`.
    ///
    /// With `fixed_row_labels` the rows are exactly those labels, including
    /// ones no genome holds. Without them the rows are every identifier
    /// observed for the vocabulary. Rows are deduplicated and naturally sorted
    /// either way.
    pub fn build(
        vocabulary: Vocabulary,
        genomes: &[Genome],
        fixed_row_labels: Option<&[String]>,
    ) -> Self {
        let mut rows: Vec<String> = match fixed_row_labels {
            Some(labels) => labels
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            None => genomes
                .iter()
                .flat_map(|g| g.observed(vocabulary))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        rows.sort_by(|a, b| natural_cmp(a, b));

        let columns: Vec<String> = genomes.iter().map(|g| g.name().to_string()).collect();
        let counts: Vec<Vec<usize>> = rows
            .iter()
            .map(|row| genomes.iter().map(|g| g.count(vocabulary, row)).collect())
            .collect();
        let row_index = rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.clone(), i))
            .collect();

        Self {
            vocabulary,
            rows,
            columns,
            counts,
            row_index,
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains_row(&self, row: &str) -> bool {
        self.row_index.contains_key(row)
    }

    /// Cell value; 0 for rows or genomes the matrix does not hold.
    pub fn get(&self, row: &str, genome: &str) -> usize {
        let Some(&r) = self.row_index.get(row) else {
            return 0;
        };
        self.columns
            .iter()
            .position(|c| c == genome)
            .map(|c| self.counts[r][c])
            .unwrap_or(0)
    }

    /// Counts of one row across all genomes, in column order.
    pub fn row(&self, row: &str) -> Option<&[usize]> {
        self.row_index.get(row).map(|&r| self.counts[r].as_slice())
    }

    /// Sum of a row across all genomes.
    pub fn row_total(&self, row: &str) -> usize {
        self.row(row).map(|r| r.iter().sum()).unwrap_or(0)
    }

    /// Writes the tab-separated table.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{}", ID_HEADER)?;
        for column in &self.columns {
            write!(writer, "\t{}", column)?;
        }
        writeln!(writer)?;

        for (label, counts) in self.rows.iter().zip(&self.counts) {
            write!(writer, "{}", label)?;
            for count in counts {
                write!(writer, "\t{}", count)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).with_path(path)?);
        self.write_tsv(&mut writer).with_path(path)?;
        writer.flush().with_path(path)
    }
}

/// Splits an identifier into its prefix and trailing number.
fn natural_key(id: &str) -> (&str, Option<u64>, &str) {
    let head = id.trim_end_matches(|c: char| c.is_ascii_digit());
    (head, id[head.len()..].parse().ok(), id)
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}
