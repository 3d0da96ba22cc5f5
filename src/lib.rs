//! annomat - Protein Annotation Aggregation and Frequency Matrices
//!
//! Turns protein search results into per-genome annotation sets and
//! genome x annotation frequency tables.
//!
//! # Modules
//! - `seqio`: Text and FASTA input with gzip support
//! - `hit`: Normalized hit records
//! - `blast`: BLAST/DIAMOND tabular (outfmt 6) parsing
//! - `domtbl`: HMMER `--domtblout` parsing
//! - `filter`: Score, identity and coverage thresholds
//! - `genome`: Genomes, proteins and their annotations
//! - `cluster`: Cluster table resolution into `cluster_{n}` ids
//! - `matrix`: Frequency matrix construction and output
//! - `annotate`: The end-to-end annotation run
//! - `error`: Error types

pub mod annotate;
pub mod blast;
pub mod cluster;
pub mod domtbl;
pub mod error;
pub mod filter;
pub mod genome;
pub mod hit;
pub mod matrix;
pub mod seqio;

pub use error::{AnnotError, Result};
