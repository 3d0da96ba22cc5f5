//! Annotation Pipeline Module
//!
//! Drives one annotation run: search results are parsed and filtered per
//! genome, accepted identifiers are recorded on the genomes, cluster tables
//! are resolved into hypothetical clusters, and one frequency table per
//! vocabulary is written to the output directory.
//!
//! # Output Files
//! ```text
//! hypothetical_annotations.tsv      genome, protein, cluster_id
//! hypothetical_frequency_table.tsv  cluster_id x genome
//! ko_frequency_table.tsv            KO x genome
//! pfam_frequency_table.tsv          Pfam x genome
//! tigrfam_frequency_table.tsv       TIGRFAM x genome
//! ```
//!
//! Vocabularies are processed in the order hypothetical, KO, Pfam, TIGRFAM.

use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::blast::BlastReader;
use crate::cluster::{
    write_assignments, write_assignments_file, ClusterAssignment, ClusterReader, ClusterResolver,
};
use crate::domtbl::DomtblReader;
use crate::error::{AnnotError, IoResultExt, Result};
use crate::filter::{accept, Thresholds};
use crate::genome::{GenomeSet, Vocabulary};
use crate::hit::{EvidenceFormat, HitRecord};
use crate::matrix::FrequencyMatrix;

/// Cluster assignment table written next to the frequency tables.
pub const HYPOTHETICAL_ANNOTATIONS: &str = "hypothetical_annotations.tsv";

/// Processing order of a full run.
pub const RUN_ORDER: [Vocabulary; 4] = [
    Vocabulary::Cluster,
    Vocabulary::Ko,
    Vocabulary::Pfam,
    Vocabulary::Tigrfam,
];

/// File name of the frequency table for `vocabulary`.
pub fn table_file_name(vocabulary: Vocabulary) -> String {
    format!("{}_frequency_table.tsv", vocabulary.label())
}

/// Evidence format the search results of `vocabulary` come in.
///
/// KO assignments come from DIAMOND against a KO-labelled protein database;
/// Pfam and TIGRFAM come from hmmsearch domain tables.
pub fn evidence_format(vocabulary: Vocabulary) -> Option<EvidenceFormat> {
    match vocabulary {
        Vocabulary::Ko => Some(EvidenceFormat::PairwiseAlignment),
        Vocabulary::Pfam | Vocabulary::Tigrfam => Some(EvidenceFormat::DomainHmm),
        Vocabulary::Cluster => None,
    }
}

/// Genome name of a per-genome result file: the file name without `.gz` and
/// without its last extension (`G1.tsv.gz` -> `G1`).
pub fn result_genome_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let stem = match stem.rsplit_once('.') {
        Some((head, _)) if !head.is_empty() => head,
        _ => stem,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    pub thresholds: Thresholds,
    /// Vocabularies this run may produce.
    pub vocabularies: Vec<Vocabulary>,
    pub output_dir: PathBuf,
    /// Protein file suffix used to find genomes and derive their names.
    pub suffix: String,
    /// Worker threads for parsing; 0 means all cores.
    pub threads: usize,
    /// Fixed row labels per vocabulary; vocabularies without an entry use the
    /// identifiers observed in the run.
    pub row_labels: FxHashMap<Vocabulary, Vec<String>>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            vocabularies: Vocabulary::ALL.to_vec(),
            output_dir: PathBuf::from("annomat_output"),
            suffix: ".faa".to_string(),
            threads: 0,
            row_labels: FxHashMap::default(),
        }
    }
}

impl AnnotateConfig {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        if self.vocabularies.is_empty() {
            return Err(AnnotError::Config(
                "at least one annotation vocabulary is required".to_string(),
            ));
        }
        if self.suffix.is_empty() {
            return Err(AnnotError::Config("protein file suffix is empty".to_string()));
        }
        Ok(())
    }

    pub fn enabled(&self, vocabulary: Vocabulary) -> bool {
        self.vocabularies.contains(&vocabulary)
    }

    /// Worker thread count with 0 resolved to the number of cores.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

/// Search result locations for one run. Unset inputs skip their vocabulary.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Directory of per-genome DIAMOND tables against KO.
    pub ko_results: Option<PathBuf>,
    /// Directory of per-genome hmmsearch domain tables against Pfam.
    pub pfam_results: Option<PathBuf>,
    /// Directory of per-genome hmmsearch domain tables against TIGRFAM.
    pub tigrfam_results: Option<PathBuf>,
    /// Cluster membership table.
    pub clusters: Option<PathBuf>,
}

impl RunInputs {
    pub fn source(&self, vocabulary: Vocabulary) -> Option<&Path> {
        match vocabulary {
            Vocabulary::Ko => self.ko_results.as_deref(),
            Vocabulary::Pfam => self.pfam_results.as_deref(),
            Vocabulary::Tigrfam => self.tigrfam_results.as_deref(),
            Vocabulary::Cluster => self.clusters.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub genomes: usize,
    /// Annotations newly recorded (or cluster members) per vocabulary.
    pub accepted: BTreeMap<Vocabulary, usize>,
    /// Hypothetical cluster ids minted during the run.
    pub clusters: Vec<String>,
    /// Frequency tables written, in processing order.
    pub tables: Vec<PathBuf>,
}

// ============================================================================
// Annotator
// ============================================================================

pub struct Annotator {
    config: AnnotateConfig,
    genomes: GenomeSet,
    resolver: ClusterResolver,
}

impl Annotator {
    pub fn new(config: AnnotateConfig, genomes: GenomeSet) -> Self {
        Self {
            config,
            genomes,
            resolver: ClusterResolver::new(),
        }
    }

    pub fn config(&self) -> &AnnotateConfig {
        &self.config
    }

    pub fn genomes(&self) -> &GenomeSet {
        &self.genomes
    }

    pub fn into_genomes(self) -> GenomeSet {
        self.genomes
    }

    /// Parses, filters and records one result file for `genome`.
    ///
    /// Returns the number of annotations newly recorded. A protein hit by
    /// several accepted domains of one profile is recorded and counted once.
    pub fn annotate_file<P: AsRef<Path>>(
        &mut self,
        vocabulary: Vocabulary,
        format: EvidenceFormat,
        genome: &str,
        path: P,
    ) -> Result<usize> {
        let thresholds = self.config.thresholds.for_format(format);
        self.genomes.get(genome)?;
        let hits = read_accepted_hits(path.as_ref(), format, &thresholds)?;
        self.apply_hits(vocabulary, genome, &hits)
    }

    /// Annotates every result file in `dir`, one file per genome.
    ///
    /// Files are parsed in parallel and applied in file name order. A file
    /// whose name does not match a genome of the run is an `UnknownGenome`
    /// error.
    pub fn annotate_directory<P: AsRef<Path>>(
        &mut self,
        vocabulary: Vocabulary,
        format: EvidenceFormat,
        dir: P,
    ) -> Result<usize> {
        let dir = dir.as_ref();
        let thresholds = self.config.thresholds.for_format(format);

        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir).with_path(dir)? {
            let path = entry.with_path(dir)?.path();
            if !path.is_file() {
                continue;
            }
            let genome = result_genome_name(&path).ok_or_else(|| {
                AnnotError::Config(format!("Cannot derive a genome name from {}", path.display()))
            })?;
            if !self.genomes.contains(&genome) {
                return Err(AnnotError::UnknownGenome(genome));
            }
            files.push((genome, path));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        debug!("Found {} {} result files in {}", files.len(), vocabulary, dir.display());

        let parsed: Vec<Result<Vec<HitRecord>>> = files
            .par_iter()
            .map(|(_, path)| read_accepted_hits(path, format, &thresholds))
            .collect();

        let mut total = 0;
        for ((genome, path), hits) in files.iter().zip(parsed) {
            let added = self.apply_hits(vocabulary, genome, &hits?)?;
            debug!("{}: {} new {} annotations", path.display(), added, vocabulary);
            total += added;
        }
        Ok(total)
    }

    fn apply_hits(
        &mut self,
        vocabulary: Vocabulary,
        genome: &str,
        hits: &[HitRecord],
    ) -> Result<usize> {
        let genome = self.genomes.get_mut(genome)?;
        let mut added = 0;
        for hit in hits {
            if genome.add_annotation(&hit.protein_id, vocabulary, &hit.annotation_id)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Resolves a cluster table onto the genomes and writes one
    /// `genome<TAB>protein<TAB>cluster_id` row per member to `writer`.
    ///
    /// Returns the cluster ids minted by this table, in minting order.
    pub fn annotate_clusters<P: AsRef<Path>, W: Write>(
        &mut self,
        path: P,
        writer: &mut W,
    ) -> Result<Vec<String>> {
        let (assignments, minted) = self.resolve_clusters(path.as_ref())?;
        write_assignments(writer, &assignments).with_path(HYPOTHETICAL_ANNOTATIONS)?;
        Ok(minted)
    }

    fn resolve_clusters(
        &mut self,
        path: &Path,
    ) -> Result<(Vec<ClusterAssignment>, Vec<String>)> {
        let first_new = self.resolver.minted().len();
        let assignments = self
            .resolver
            .resolve_all(ClusterReader::open(path)?, &mut self.genomes)?;
        Ok((assignments, self.resolver.minted()[first_new..].to_vec()))
    }

    pub fn frequency_matrix(
        &self,
        vocabulary: Vocabulary,
        fixed_row_labels: Option<&[String]>,
    ) -> FrequencyMatrix {
        FrequencyMatrix::build(vocabulary, self.genomes.genomes(), fixed_row_labels)
    }

    /// Runs every enabled vocabulary that has an input and writes its table.
    pub fn run(&mut self, inputs: &RunInputs) -> Result<RunSummary> {
        self.config.validate()?;
        let output_dir = self.config.output_dir.clone();
        fs::create_dir_all(&output_dir).with_path(&output_dir)?;

        let mut summary = RunSummary {
            genomes: self.genomes.len(),
            ..Default::default()
        };
        if self.genomes.is_empty() {
            warn!(
                "No genomes found with the suffix {}, nothing to annotate",
                self.config.suffix
            );
            return Ok(summary);
        }

        for vocabulary in RUN_ORDER {
            if !self.config.enabled(vocabulary) {
                continue;
            }
            let Some(source) = inputs.source(vocabulary) else {
                debug!("No {} input given, skipping", vocabulary);
                continue;
            };

            let fixed_rows = match vocabulary {
                Vocabulary::Cluster => {
                    info!("Annotating genomes with hypothetical clusters");
                    let table = output_dir.join(HYPOTHETICAL_ANNOTATIONS);
                    let (assignments, minted) = self.resolve_clusters(source)?;
                    write_assignments_file(&table, &assignments)?;

                    summary.accepted.insert(vocabulary, assignments.len());
                    summary.clusters.extend(minted.iter().cloned());
                    Some(minted)
                }
                _ => {
                    info!("Annotating genomes with {} ids", vocabulary);
                    let format = evidence_format(vocabulary).ok_or_else(|| {
                        AnnotError::Config(format!("no evidence format for {}", vocabulary))
                    })?;
                    let accepted = self.annotate_directory(vocabulary, format, source)?;
                    summary.accepted.insert(vocabulary, accepted);
                    self.config.row_labels.get(&vocabulary).cloned()
                }
            };

            info!("Generating {} frequency table", vocabulary);
            let matrix = self.frequency_matrix(vocabulary, fixed_rows.as_deref());
            let table = output_dir.join(table_file_name(vocabulary));
            matrix.write(&table)?;
            debug!(
                "Wrote {} rows x {} genomes to {}",
                matrix.rows().len(),
                matrix.columns().len(),
                table.display()
            );
            summary.tables.push(table);
        }

        Ok(summary)
    }
}

/// Reads a result file and keeps the hits passing `thresholds`.
fn read_accepted_hits(
    path: &Path,
    format: EvidenceFormat,
    thresholds: &Thresholds,
) -> Result<Vec<HitRecord>> {
    let hits: Box<dyn Iterator<Item = Result<HitRecord>>> = match format {
        EvidenceFormat::PairwiseAlignment => Box::new(BlastReader::open(path)?.hits()),
        EvidenceFormat::DomainHmm => Box::new(DomtblReader::open(path)?.hits()),
    };

    let mut accepted = Vec::new();
    let mut seen = 0usize;
    for hit in hits {
        let hit = hit?;
        seen += 1;
        if accept(&hit, thresholds) {
            accepted.push(hit);
        }
    }
    debug!(
        "{}: kept {} of {} {} hits",
        path.display(),
        accepted.len(),
        seen,
        format
    );
    Ok(accepted)
}

// ============================================================================
// Tests
// ============================================================================
