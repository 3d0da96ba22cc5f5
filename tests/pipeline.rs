use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use annomat::annotate::{AnnotateConfig, Annotator, RunInputs, HYPOTHETICAL_ANNOTATIONS};
use annomat::filter::Thresholds;
use annomat::genome::{GenomeSet, Vocabulary};
use annomat::AnnotError;

fn write_proteins(dir: &Path, genome: &str, proteins: &[&str]) -> Result<()> {
    let mut fasta = String::new();
    for p in proteins {
        fasta.push_str(&format!(">{} # 1 # 300 # 1\nMKVLAAGIVG\nLLT\n", p));
    }
    fs::write(dir.join(format!("{}.faa", genome)), fasta)?;
    Ok(())
}

fn load_genomes(dir: &Path) -> Result<GenomeSet> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    files.sort();
    Ok(GenomeSet::from_fasta_files(&files, ".faa")?)
}

fn blast_row(protein: &str, subject: &str, evalue: &str, bit: &str) -> String {
    format!(
        "{}\t{}\t64.2\t310\t98\t4\t1\t305\t3\t312\t{}\t{}\n",
        protein, subject, evalue, bit
    )
}

fn domtbl_row(protein: &str, tlen: usize, name: &str, acc: &str, evalue: &str, score: &str) -> String {
    format!(
        "{} - {} {} {} 120 {} {} 0.1 1 1 1e-20 1e-18 60.0 0.0 1 118 10 130 8 132 0.95 -\n",
        protein, tlen, name, acc, evalue, score
    )
}

struct Fixture {
    _tmp: TempDir,
    root: std::path::PathBuf,
}

impl Fixture {
    /// G1 with proteins p1 and p2, G2 with protein p3.
    fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        let root = tmp.path().to_path_buf();
        let proteins = root.join("proteins");
        fs::create_dir(&proteins)?;
        write_proteins(&proteins, "G1", &["p1", "p2"])?;
        write_proteins(&proteins, "G2", &["p3"])?;
        Ok(Self { _tmp: tmp, root })
    }

    fn dir(&self, name: &str) -> Result<std::path::PathBuf> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn annotator(&self, thresholds: Thresholds) -> Result<Annotator> {
        let config = AnnotateConfig {
            thresholds,
            output_dir: self.root.join("out"),
            ..Default::default()
        };
        Ok(Annotator::new(config, load_genomes(&self.root.join("proteins"))?))
    }

    fn read_output(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join("out").join(name))?)
    }
}

fn ko_thresholds() -> Thresholds {
    Thresholds {
        e_value: Some(1e-5),
        min_bit_score: Some(50.0),
        ..Default::default()
    }
}

#[test]
fn test_ko_frequency_table() -> Result<()> {
    let fx = Fixture::new()?;
    let ko = fx.dir("ko")?;
    fs::write(
        ko.join("G1.tsv"),
        [
            blast_row("p1", "K00001", "1e-10", "100"),
            blast_row("p2", "K00002", "1e-3", "100"),
        ]
        .concat(),
    )?;
    fs::write(ko.join("G2.tsv"), blast_row("p3", "K00001", "1e-1", "5"))?;

    let mut annotator = fx.annotator(ko_thresholds())?;
    let summary = annotator.run(&RunInputs {
        ko_results: Some(ko),
        ..Default::default()
    })?;

    assert_eq!(summary.genomes, 2);
    assert_eq!(summary.accepted.get(&Vocabulary::Ko), Some(&1));
    assert_eq!(
        fx.read_output("ko_frequency_table.tsv")?,
        "ID\tG1\tG2\nK00001\t1\t0\n"
    );

    let g1 = annotator.genomes().get("G1")?;
    assert_eq!(g1.annotated_header("p1"), "p1 K00001");
    assert_eq!(g1.annotated_header("p2"), "p2");
    Ok(())
}

#[test]
fn test_fixed_rows_keep_unobserved_identifiers() -> Result<()> {
    let fx = Fixture::new()?;
    let ko = fx.dir("ko")?;
    fs::write(ko.join("G1.tsv"), blast_row("p1", "K00001", "1e-10", "100"))?;

    let mut annotator = fx.annotator(ko_thresholds())?;
    let matrix = {
        annotator.run(&RunInputs {
            ko_results: Some(ko),
            ..Default::default()
        })?;
        let labels = vec!["K00001".to_string(), "K00002".to_string()];
        annotator.frequency_matrix(Vocabulary::Ko, Some(&labels))
    };
    assert_eq!(matrix.row("K00001"), Some(&[1, 0][..]));
    assert_eq!(matrix.row("K00002"), Some(&[0, 0][..]));
    Ok(())
}

#[test]
fn test_hypothetical_clusters() -> Result<()> {
    let fx = Fixture::new()?;
    let clusters = fx.root.join("clusters.tsv");
    fs::write(&clusters, "rep1\tG1~p1\nrep1\tG1~p2\nrep2\tG2~p3\n")?;

    let mut annotator = fx.annotator(Thresholds::default())?;
    let summary = annotator.run(&RunInputs {
        clusters: Some(clusters),
        ..Default::default()
    })?;

    assert_eq!(summary.clusters, ["cluster_1", "cluster_2"]);
    assert_eq!(summary.accepted.get(&Vocabulary::Cluster), Some(&3));
    assert_eq!(
        fx.read_output(HYPOTHETICAL_ANNOTATIONS)?,
        "G1\tp1\tcluster_1\nG1\tp2\tcluster_1\nG2\tp3\tcluster_2\n"
    );
    assert_eq!(
        fx.read_output("hypothetical_frequency_table.tsv")?,
        "ID\tG1\tG2\ncluster_1\t2\t0\ncluster_2\t0\t1\n"
    );
    Ok(())
}

#[test]
fn test_domain_tables_with_identity_cutoff() -> Result<()> {
    let fx = Fixture::new()?;
    let pfam = fx.dir("pfam")?;
    // Two domains of one profile on p1 count once; p3 fails the score cutoff.
    fs::write(
        pfam.join("G1.domtblout"),
        [
            "# target name accession tlen ...\n".to_string(),
            domtbl_row("p1", 300, "Abhydrolase_1", "PF00561.23", "1e-30", "110.0"),
            domtbl_row("p1", 300, "Abhydrolase_1", "PF00561.23", "1e-30", "110.0"),
            domtbl_row("p2", 300, "HTH_1", "PF00126.30", "1e-12", "55.0"),
        ]
        .concat(),
    )?;
    fs::write(
        pfam.join("G2.domtblout"),
        domtbl_row("p3", 300, "HTH_1", "PF00126.30", "1e-6", "20.0"),
    )?;

    let thresholds = Thresholds {
        min_identity: Some(0.9),
        ..ko_thresholds()
    };
    let mut annotator = fx.annotator(thresholds)?;
    let summary = annotator.run(&RunInputs {
        pfam_results: Some(pfam),
        ..Default::default()
    })?;
    assert_eq!(summary.accepted.get(&Vocabulary::Pfam), Some(&2));

    assert_eq!(
        fx.read_output("pfam_frequency_table.tsv")?,
        "ID\tG1\tG2\nPF00126\t1\t0\nPF00561\t1\t0\n"
    );
    Ok(())
}

#[test]
fn test_gzipped_results() -> Result<()> {
    let fx = Fixture::new()?;
    let ko = fx.dir("ko")?;
    let mut encoder = GzEncoder::new(fs::File::create(ko.join("G2.tsv.gz"))?, Compression::default());
    encoder.write_all(blast_row("p3", "K00005", "1e-40", "300").as_bytes())?;
    encoder.finish()?;

    let mut annotator = fx.annotator(ko_thresholds())?;
    annotator.run(&RunInputs {
        ko_results: Some(ko),
        ..Default::default()
    })?;
    assert_eq!(
        fx.read_output("ko_frequency_table.tsv")?,
        "ID\tG1\tG2\nK00005\t0\t1\n"
    );
    Ok(())
}

#[test]
fn test_cluster_with_unknown_genome_fails() -> Result<()> {
    let fx = Fixture::new()?;
    let clusters = fx.root.join("clusters.tsv");
    fs::write(&clusters, "rep1\tG1~p1\nrep1\tG5~p9\n")?;

    let mut annotator = fx.annotator(Thresholds::default())?;
    let err = annotator
        .run(&RunInputs {
            clusters: Some(clusters),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, AnnotError::UnknownGenome(g) if g == "G5"));
    Ok(())
}

#[test]
fn test_malformed_row_reports_line() -> Result<()> {
    let fx = Fixture::new()?;
    let ko = fx.dir("ko")?;
    fs::write(
        ko.join("G1.tsv"),
        format!("{}p2\tK00002\tnot-a-number\n", blast_row("p1", "K00001", "1e-10", "100")),
    )?;

    let mut annotator = fx.annotator(ko_thresholds())?;
    let err = annotator
        .run(&RunInputs {
            ko_results: Some(ko),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, AnnotError::MalformedLine { line_no: 2, .. }));
    Ok(())
}
