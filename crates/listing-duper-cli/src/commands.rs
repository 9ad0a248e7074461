use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "listing-duper")]
#[command(about = "Find duplicate marketplace listings and prepare an end-item export", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect duplicates in a listing export and write the annotated and end-item CSVs
    Detect {
        /// Listing export CSV
        input: PathBuf,
        /// Directory for the output CSVs
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Start a resumable chunked run and print its process id
    Start {
        /// Listing export CSV
        input: PathBuf,
    },
    /// Advance a chunked run until it completes or its time budget runs out
    Continue {
        process_id: String,
        /// Directory for the output CSVs once the run completes
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Show the state of a chunked run without advancing it
    Status { process_id: String },
    /// Delete chunked runs started more than the given number of hours ago
    PurgeStale {
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Build the end-item CSV from an annotated CSV, keeping any edited decisions
    Export {
        /// Annotated CSV previously written by `detect`
        annotated: PathBuf,
        /// Output CSV path
        #[arg(short, long, default_value = "end_items.csv")]
        output: PathBuf,
    },
    /// Print the grouping key for a title
    Normalize {
        title: String,
        /// Use the token-based advanced key
        #[arg(long)]
        advanced: bool,
    },
    /// Print the word-set similarity of two titles
    Similarity { a: String, b: String },
    /// Print configuration values
    PrintConfig,
    /// Delete every stored process from the state databases
    TruncateState,
}
