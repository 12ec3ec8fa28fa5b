//! CLI parse: clap types for treesum. No behavior; definitions only.
//!
//! Commands are flag-style and mutually exclusive per invocation:
//! `--calculate`, `--compare`, `--update`, `--find-duplicates`.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// treesum - persistent directory-tree checksum inventory
#[derive(Debug, Parser)]
#[command(name = "treesum")]
#[command(about = "Checksum inventory for directory trees: calculate, compare, update, find duplicates")]
#[command(group(
    ArgGroup::new("command")
        .required(true)
        .args(["calculate", "compare", "update", "find_duplicates"])
))]
pub struct Cli {
    /// Calculate (or refresh) the checksum record for PATH
    #[arg(long, value_name = "PATH")]
    pub calculate: Option<PathBuf>,

    /// Compare two calculated trees, record against record
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pub compare: Option<Vec<PathBuf>>,

    /// Update DESTINATION from SOURCE, skipping branches whose records agree
    #[arg(long, num_args = 2, value_names = ["SOURCE", "DESTINATION"])]
    pub update: Option<Vec<PathBuf>>,

    /// List duplicated folders within a calculated tree (writes duplicates.csv)
    #[arg(long, value_name = "PATH")]
    pub find_duplicates: Option<PathBuf>,

    /// Start a new record scope at PATH even when an enclosing record exists
    #[arg(long, requires = "calculate", conflicts_with = "continue_previous")]
    pub new: bool,

    /// Reuse finished subdirectory records from a previous (interrupted) pass
    #[arg(long = "continue", requires = "calculate")]
    pub continue_previous: bool,

    /// Record per-file hashes, sizes, and modification times
    #[arg(long, requires = "calculate")]
    pub detail_files: bool,

    /// Worker threads for file hashing
    #[arg(long, value_name = "N", default_value_t = 1, requires = "calculate")]
    pub parallel: usize,

    /// How many levels below the comparison targets the report expands
    #[arg(long, value_name = "N", default_value_t = 2, requires = "compare")]
    pub depth: usize,

    /// Report what --update would do without changing anything
    #[arg(long, requires = "update")]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(long = "v")]
    pub verbose: bool,
}
