//! Genome Annotation Model
//!
//! One [`Genome`] per input genome holds its called proteins and, for each
//! protein, the accepted annotations grouped by vocabulary. A [`GenomeSet`]
//! keeps the genomes of one run in input order with lookup by name.
//!
//! KO, Pfam and TIGRFAM identifiers accumulate on a protein as a set.
//! Cluster membership is exclusive: a protein belongs to at most one cluster.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::path::Path;

use crate::error::{AnnotError, IoResultExt, Result};
use crate::seqio::FastaReader;

// ============================================================================
// Vocabulary & Annotation
// ============================================================================

/// Namespace of annotation identifiers. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vocabulary {
    Ko,
    Pfam,
    Tigrfam,
    Cluster,
}

impl Vocabulary {
    pub const ALL: [Vocabulary; 4] = [
        Vocabulary::Ko,
        Vocabulary::Pfam,
        Vocabulary::Tigrfam,
        Vocabulary::Cluster,
    ];

    /// Lowercase label used in log messages and output file names.
    pub fn label(&self) -> &'static str {
        match self {
            Vocabulary::Ko => "ko",
            Vocabulary::Pfam => "pfam",
            Vocabulary::Tigrfam => "tigrfam",
            Vocabulary::Cluster => "hypothetical",
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An immutable (vocabulary, identifier) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Annotation {
    vocabulary: Vocabulary,
    id: String,
}

impl Annotation {
    pub fn new(vocabulary: Vocabulary, id: impl Into<String>) -> Self {
        Self {
            vocabulary,
            id: id.into(),
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Genome
// ============================================================================

/// Per-protein annotation storage: vocabulary -> identifier set.
type ProteinAnnotations = FxHashMap<Vocabulary, FxHashSet<String>>;

/// A genome with its called proteins and their accepted annotations.
#[derive(Debug, Clone)]
pub struct Genome {
    name: String,
    proteins: Vec<String>,
    annotations: FxHashMap<String, ProteinAnnotations>,
    /// Number of distinct proteins holding each annotation.
    counts: FxHashMap<Annotation, usize>,
}

impl Genome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proteins: Vec::new(),
            annotations: FxHashMap::default(),
            counts: FxHashMap::default(),
        }
    }

    /// Creates a genome with the given protein identifiers, in order.
    pub fn with_proteins<I, S>(name: impl Into<String>, proteins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut genome = Self::new(name);
        for protein in proteins {
            genome.add_protein(protein);
        }
        genome
    }

    /// Loads the protein identifiers of a called-protein FASTA file.
    ///
    /// The genome name is the file name with `suffix` (and a trailing `.gz`)
    /// removed, e.g. `genome_1.faa.gz` with suffix `.faa` gives `genome_1`.
    pub fn from_fasta<P: AsRef<Path>>(path: P, suffix: &str) -> Result<Self> {
        let path = path.as_ref();
        let name = genome_name_from_path(path, suffix).ok_or_else(|| {
            AnnotError::Config(format!("Cannot derive a genome name from {}", path.display()))
        })?;

        let mut genome = Self::new(name);
        for record in FastaReader::open(path)? {
            let record = record.with_path(path)?;
            genome.add_protein(record.name);
        }
        Ok(genome)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Protein identifiers in input order.
    pub fn proteins(&self) -> &[String] {
        &self.proteins
    }

    pub fn has_protein(&self, protein_id: &str) -> bool {
        self.annotations.contains_key(protein_id)
    }

    /// Appends a protein. Returns false if it was already present.
    pub fn add_protein(&mut self, protein_id: impl Into<String>) -> bool {
        let protein_id = protein_id.into();
        if self.annotations.contains_key(&protein_id) {
            return false;
        }
        self.annotations
            .insert(protein_id.clone(), ProteinAnnotations::default());
        self.proteins.push(protein_id);
        true
    }

    fn protein_entry(&mut self, protein_id: &str) -> Result<&mut ProteinAnnotations> {
        match self.annotations.get_mut(protein_id) {
            Some(entry) => Ok(entry),
            None => Err(AnnotError::UnknownProtein {
                genome: self.name.clone(),
                protein: protein_id.to_string(),
            }),
        }
    }

    /// Adds `identifier` to the protein's set for `vocabulary`.
    ///
    /// Idempotent. Returns true if the annotation was newly added. Cluster
    /// membership must go through [`Genome::add_cluster`].
    pub fn add_annotation(
        &mut self,
        protein_id: &str,
        vocabulary: Vocabulary,
        identifier: &str,
    ) -> Result<bool> {
        if vocabulary == Vocabulary::Cluster {
            return Err(AnnotError::Config(
                "cluster ids are assigned with add_cluster".to_string(),
            ));
        }
        let inserted = self
            .protein_entry(protein_id)?
            .entry(vocabulary)
            .or_default()
            .insert(identifier.to_string());
        if inserted {
            *self
                .counts
                .entry(Annotation::new(vocabulary, identifier))
                .or_default() += 1;
        }
        Ok(inserted)
    }

    /// Places the protein in `cluster_id`.
    ///
    /// Re-adding the same cluster is a no-op returning false. A protein that
    /// already belongs to a different cluster yields `DuplicateCluster`.
    pub fn add_cluster(&mut self, protein_id: &str, cluster_id: &str) -> Result<bool> {
        let genome = self.name.clone();
        let clusters = self
            .protein_entry(protein_id)?
            .entry(Vocabulary::Cluster)
            .or_default();

        if let Some(existing) = clusters.iter().next() {
            if existing == cluster_id {
                return Ok(false);
            }
            return Err(AnnotError::DuplicateCluster {
                genome,
                protein: protein_id.to_string(),
                existing: existing.clone(),
                new: cluster_id.to_string(),
            });
        }

        clusters.insert(cluster_id.to_string());
        *self
            .counts
            .entry(Annotation::new(Vocabulary::Cluster, cluster_id))
            .or_default() += 1;
        Ok(true)
    }

    /// The cluster a protein belongs to, if any.
    pub fn cluster_of(&self, protein_id: &str) -> Option<&str> {
        self.annotations
            .get(protein_id)?
            .get(&Vocabulary::Cluster)?
            .iter()
            .next()
            .map(String::as_str)
    }

    /// All annotations of a protein, sorted by vocabulary then identifier.
    ///
    /// Unknown proteins have no annotations.
    pub fn all_annotations(&self, protein_id: &str) -> Vec<Annotation> {
        let mut all: Vec<Annotation> = match self.annotations.get(protein_id) {
            Some(by_vocab) => by_vocab
                .iter()
                .flat_map(|(vocab, ids)| ids.iter().map(|id| Annotation::new(*vocab, id.as_str())))
                .collect(),
            None => Vec::new(),
        };
        all.sort();
        all
    }

    /// Identifiers of [`Genome::all_annotations`], in the same order.
    pub fn annotation_ids(&self, protein_id: &str) -> Vec<String> {
        self.all_annotations(protein_id)
            .into_iter()
            .map(|a| a.id)
            .collect()
    }

    /// Sequence header with the protein's annotations appended.
    pub fn annotated_header(&self, protein_id: &str) -> String {
        let ids = self.annotation_ids(protein_id);
        if ids.is_empty() {
            protein_id.to_string()
        } else {
            format!("{} {}", protein_id, ids.join(" "))
        }
    }

    /// Number of distinct proteins holding `identifier` in `vocabulary`.
    pub fn count(&self, vocabulary: Vocabulary, identifier: &str) -> usize {
        self.counts
            .get(&Annotation::new(vocabulary, identifier))
            .copied()
            .unwrap_or(0)
    }

    /// Sorted identifiers observed for `vocabulary` in this genome.
    pub fn observed(&self, vocabulary: Vocabulary) -> Vec<String> {
        let mut ids: Vec<String> = self
            .counts
            .keys()
            .filter(|a| a.vocabulary == vocabulary)
            .map(|a| a.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Strips the directory, `.gz` and `suffix` from a protein file path.
pub fn genome_name_from_path(path: &Path, suffix: &str) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let stem = if suffix.is_empty() {
        stem
    } else {
        stem.strip_suffix(suffix).unwrap_or(stem)
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

// ============================================================================
// Genome Set
// ============================================================================

/// Genomes of one run, in input order, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct GenomeSet {
    genomes: Vec<Genome>,
    index: FxHashMap<String, usize>,
}

impl GenomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a genome. Genome names must be unique within a run.
    pub fn push(&mut self, genome: Genome) -> Result<()> {
        if self.index.contains_key(genome.name()) {
            return Err(AnnotError::Config(format!(
                "Duplicate genome name: {}",
                genome.name()
            )));
        }
        self.index.insert(genome.name().to_string(), self.genomes.len());
        self.genomes.push(genome);
        Ok(())
    }

    /// Loads one genome per protein file.
    pub fn from_fasta_files<P: AsRef<Path>>(paths: &[P], suffix: &str) -> Result<Self> {
        let mut set = Self::new();
        for path in paths {
            set.push(Genome::from_fasta(path, suffix)?)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.genomes.iter().map(Genome::name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Genome> {
        self.index
            .get(name)
            .map(|&i| &self.genomes[i])
            .ok_or_else(|| AnnotError::UnknownGenome(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Genome> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.genomes[i]),
            None => Err(AnnotError::UnknownGenome(name.to_string())),
        }
    }

    pub fn into_genomes(self) -> Vec<Genome> {
        self.genomes
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn genome() -> Genome {
        Genome::with_proteins("G1", ["p1", "p2", "p3"])
    }

    #[test]
    fn test_add_annotation_is_idempotent() {
        let mut g = genome();
        assert!(g.add_annotation("p1", Vocabulary::Ko, "K00001").unwrap());
        let once = g.all_annotations("p1");

        assert!(!g.add_annotation("p1", Vocabulary::Ko, "K00001").unwrap());
        assert_eq!(g.all_annotations("p1"), once);
        assert_eq!(g.count(Vocabulary::Ko, "K00001"), 1);
    }

    #[test]
    fn test_ko_ids_accumulate() {
        let mut g = genome();
        g.add_annotation("p1", Vocabulary::Ko, "K00002").unwrap();
        g.add_annotation("p1", Vocabulary::Ko, "K00001").unwrap();
        assert_eq!(g.annotation_ids("p1"), vec!["K00001", "K00002"]);
    }

    #[test]
    fn test_unknown_protein_is_an_error() {
        let mut g = genome();
        let err = g.add_annotation("p9", Vocabulary::Pfam, "PF00001").unwrap_err();
        assert!(matches!(err, AnnotError::UnknownProtein { .. }));
        assert!(g.add_cluster("p9", "cluster_1").is_err());
    }

    #[test]
    fn test_cluster_vocabulary_rejected_by_add_annotation() {
        let mut g = genome();
        assert!(matches!(
            g.add_annotation("p1", Vocabulary::Cluster, "cluster_1"),
            Err(AnnotError::Config(_))
        ));
    }

    #[test]
    fn test_cluster_is_exclusive() {
        let mut g = genome();
        assert!(g.add_cluster("p1", "cluster_1").unwrap());
        assert!(!g.add_cluster("p1", "cluster_1").unwrap());

        match g.add_cluster("p1", "cluster_2") {
            Err(AnnotError::DuplicateCluster { existing, new, .. }) => {
                assert_eq!(existing, "cluster_1");
                assert_eq!(new, "cluster_2");
            }
            other => panic!("expected duplicate cluster error, got {:?}", other),
        }
        assert_eq!(g.cluster_of("p1"), Some("cluster_1"));
        assert_eq!(g.count(Vocabulary::Cluster, "cluster_1"), 1);
        assert_eq!(g.count(Vocabulary::Cluster, "cluster_2"), 0);
    }

    #[test]
    fn test_all_annotations_sorted_by_vocabulary_then_id() {
        let mut g = genome();
        g.add_cluster("p2", "cluster_7").unwrap();
        g.add_annotation("p2", Vocabulary::Tigrfam, "TIGR00001").unwrap();
        g.add_annotation("p2", Vocabulary::Pfam, "PF00002").unwrap();
        g.add_annotation("p2", Vocabulary::Pfam, "PF00001").unwrap();
        g.add_annotation("p2", Vocabulary::Ko, "K00010").unwrap();

        let expected = vec!["K00010", "PF00001", "PF00002", "TIGR00001", "cluster_7"];
        for _ in 0..5 {
            assert_eq!(g.annotation_ids("p2"), expected);
        }
        assert_eq!(
            g.annotated_header("p2"),
            "p2 K00010 PF00001 PF00002 TIGR00001 cluster_7"
        );
        assert_eq!(g.annotated_header("p3"), "p3");
    }

    #[test]
    fn test_count_and_observed() {
        let mut g = genome();
        g.add_annotation("p1", Vocabulary::Pfam, "PF00001").unwrap();
        g.add_annotation("p2", Vocabulary::Pfam, "PF00001").unwrap();
        g.add_annotation("p3", Vocabulary::Pfam, "PF00005").unwrap();
        g.add_annotation("p3", Vocabulary::Ko, "K00001").unwrap();

        assert_eq!(g.count(Vocabulary::Pfam, "PF00001"), 2);
        assert_eq!(g.count(Vocabulary::Ko, "PF00001"), 0);
        assert_eq!(g.observed(Vocabulary::Pfam), vec!["PF00001", "PF00005"]);
        assert_eq!(g.observed(Vocabulary::Tigrfam), Vec::<String>::new());
    }

    #[test]
    fn test_add_protein_keeps_order_and_ignores_duplicates() {
        let mut g = Genome::new("G2");
        assert!(g.add_protein("b"));
        assert!(g.add_protein("a"));
        assert!(!g.add_protein("b"));
        assert_eq!(g.proteins(), ["b", "a"]);
        assert!(g.has_protein("a"));
        assert!(!g.has_protein("c"));
    }

    #[test]
    fn test_genome_name_from_path() {
        let name = |p: &str, s: &str| genome_name_from_path(Path::new(p), s);
        assert_eq!(name("/data/genome_1.faa", ".faa"), Some("genome_1".to_string()));
        assert_eq!(name("genome_1.faa.gz", ".faa"), Some("genome_1".to_string()));
        assert_eq!(name("genome_1.fasta", ".faa"), Some("genome_1.fasta".to_string()));
        assert_eq!(name(".faa", ".faa"), None);
    }

    #[test]
    fn test_from_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("G7.faa");
        std::fs::write(&path, ">G7_1 # 1 # 90\nMKL\n>G7_2\nMAA\nKK\n").unwrap();

        let g = Genome::from_fasta(&path, ".faa").unwrap();
        assert_eq!(g.name(), "G7");
        assert_eq!(g.proteins(), ["G7_1", "G7_2"]);
    }

    #[test]
    fn test_genome_set_lookup() {
        let mut set = GenomeSet::new();
        set.push(Genome::new("G1")).unwrap();
        set.push(Genome::new("G2")).unwrap();
        assert!(set.push(Genome::new("G1")).is_err());

        assert_eq!(set.names().collect::<Vec<_>>(), vec!["G1", "G2"]);
        assert!(set.get_mut("G2").is_ok());
        assert!(matches!(set.get("G3"), Err(AnnotError::UnknownGenome(name)) if name == "G3"));

        let names: Vec<String> = set.into_genomes().iter().map(|g| g.name().to_string()).collect();
        assert_eq!(names, ["G1", "G2"]);
    }
}
