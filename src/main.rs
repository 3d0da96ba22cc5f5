use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, Level};
use simple_logger::init_with_level;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use annomat::annotate::{AnnotateConfig, Annotator, RunInputs};
use annomat::filter::{SearchTool, Thresholds};
use annomat::genome::{GenomeSet, Vocabulary};

fn parse_fraction(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=1.0).contains(&val) {
        Err(format!("Value must be a fraction between 0 and 1, got {}", val))
    } else {
        Ok(val)
    }
}

#[derive(Parser)]
#[command(name = "annomat")]
#[command(version)]
#[command(about = "Aggregate protein annotation evidence into genome x annotation frequency tables")]
#[command(long_about = r#"
annomat - protein annotation aggregation

Reads per-genome search results and a protein cluster table, keeps the hits
passing the thresholds, records them on each protein, and writes one
genome x annotation frequency table per vocabulary.

INPUTS:
  --proteins         Called proteins, one FASTA per genome ({genome}{suffix})
  --ko-results       Directory of DIAMOND outfmt 6 tables, one per genome
  --pfam-results     Directory of hmmsearch --domtblout tables, one per genome
  --tigrfam-results  Directory of hmmsearch --domtblout tables, one per genome
  --clusters         Two-column cluster table (rep<TAB>{genome}~{protein})

OUTPUT FILES:
  hypothetical_annotations.tsv      Genome, protein and cluster id per member
  hypothetical_frequency_table.tsv  Cluster x genome counts
  ko_frequency_table.tsv            KO x genome counts
  pfam_frequency_table.tsv          Pfam x genome counts
  tigrfam_frequency_table.tsv       TIGRFAM x genome counts

THRESHOLDS:
  Identity and coverage are fractions (0.3 = 30%). Identity does not apply
  to HMM domain hits and is ignored for them with a warning.

EXAMPLES:
  annomat --proteins proteins/ --ko-results diamond/ --evalue 1e-5 -o out/
  annomat --proteins proteins/ --clusters clusters.tsv --pfam-results pfam/ -o out/
"#)]
struct Args {
    #[arg(long, value_name = "PATH", num_args = 1.., required_unless_present = "print_search_args", help_heading = "Input")]
    proteins: Vec<PathBuf>,

    #[arg(long, value_name = "SUFFIX", default_value = ".faa", help_heading = "Input")]
    suffix: String,

    #[arg(long = "ko-results", value_name = "DIR", help_heading = "Input")]
    ko_results: Option<PathBuf>,

    #[arg(long = "pfam-results", value_name = "DIR", help_heading = "Input")]
    pfam_results: Option<PathBuf>,

    #[arg(long = "tigrfam-results", value_name = "DIR", help_heading = "Input")]
    tigrfam_results: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help_heading = "Input")]
    clusters: Option<PathBuf>,

    #[arg(long, value_name = "FLOAT", default_value = "1e-05", help_heading = "Thresholds")]
    evalue: f64,

    #[arg(long, value_name = "FLOAT", default_value = "0", help_heading = "Thresholds")]
    bit: f64,

    #[arg(long, value_name = "FRACTION", value_parser = parse_fraction, help_heading = "Thresholds")]
    id: Option<f64>,

    #[arg(long = "aln-query", value_name = "FRACTION", value_parser = parse_fraction, help_heading = "Thresholds")]
    aln_query: Option<f64>,

    #[arg(long = "aln-reference", value_name = "FRACTION", value_parser = parse_fraction, help_heading = "Thresholds")]
    aln_reference: Option<f64>,

    #[arg(short = 'o', long, value_name = "DIR", default_value = "annomat_output", help_heading = "Output")]
    output: PathBuf,

    /// Print search arguments equivalent to the thresholds and exit
    #[arg(long = "print-search-args", help_heading = "Output")]
    print_search_args: bool,

    #[arg(short = 'v', long, help_heading = "Output")]
    verbose: bool,

    #[arg(short = 't', long, value_name = "NUM", default_value = "0", help_heading = "Runtime")]
    threads: usize,
}

impl Args {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            e_value: Some(self.evalue),
            min_bit_score: Some(self.bit),
            min_identity: self.id,
            min_query_coverage: self.aln_query,
            min_subject_coverage: self.aln_reference,
        }
    }

    fn vocabularies(&self) -> Vec<Vocabulary> {
        let mut vocabularies = Vec::new();
        if self.clusters.is_some() {
            vocabularies.push(Vocabulary::Cluster);
        }
        if self.ko_results.is_some() {
            vocabularies.push(Vocabulary::Ko);
        }
        if self.pfam_results.is_some() {
            vocabularies.push(Vocabulary::Pfam);
        }
        if self.tigrfam_results.is_some() {
            vocabularies.push(Vocabulary::Tigrfam);
        }
        vocabularies
    }
}

/// Expands directories into the protein files they hold, sorted by name.
fn find_protein_files(paths: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let gz_suffix = format!("{}.gz", suffix);
    let is_protein_file = |p: &Path| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(suffix) || n.ends_with(&gz_suffix))
            .unwrap_or(false)
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Failed to read protein directory: {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_protein_file(&entry_path) {
                    found.push(entry_path);
                }
            }
            found.sort();
            debug!("{}: {} protein files", path.display(), found.len());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn print_search_args(thresholds: &Thresholds) {
    for (tool, name) in [
        (SearchTool::Diamond, "diamond"),
        (SearchTool::Hmmsearch, "hmmsearch"),
        (SearchTool::Mmseqs, "mmseqs"),
    ] {
        let (args, notes) = thresholds.tool_args(tool);
        println!("{}\t{}", name, args.join(" "));
        for note in notes {
            eprintln!("{}: {}", name, note);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let start_time = Instant::now();

    let level = if args.verbose { Level::Debug } else { Level::Info };
    init_with_level(level).context("Failed to initialize logger")?;

    let thresholds = args.thresholds();
    thresholds.validate()?;
    if args.print_search_args {
        print_search_args(&thresholds);
        return Ok(());
    }

    let vocabularies = args.vocabularies();
    if vocabularies.is_empty() {
        anyhow::bail!(
            "Nothing to annotate. Use --ko-results, --pfam-results, --tigrfam-results or --clusters"
        );
    }

    let config = AnnotateConfig {
        thresholds,
        vocabularies,
        output_dir: args.output.clone(),
        suffix: args.suffix.clone(),
        threads: args.threads,
        ..Default::default()
    };
    config.validate()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .build_global()
        .ok();

    info!("Running pipeline: annotate");
    let protein_files = find_protein_files(&args.proteins, &config.suffix)?;
    let genomes = GenomeSet::from_fasta_files(&protein_files, &config.suffix)?;
    info!("Loaded {} genomes", genomes.len());

    let inputs = RunInputs {
        ko_results: args.ko_results.clone(),
        pfam_results: args.pfam_results.clone(),
        tigrfam_results: args.tigrfam_results.clone(),
        clusters: args.clusters.clone(),
    };
    let mut annotator = Annotator::new(config, genomes);
    let summary = annotator.run(&inputs)?;

    for (vocabulary, accepted) in &summary.accepted {
        info!("{}: {} accepted", vocabulary, accepted);
    }
    for table in &summary.tables {
        info!("Wrote {}", table.display());
    }
    info!("Elapsed time: {:?}", start_time.elapsed());
    Ok(())
}
