use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "site-recode",
    version,
    about = "Recover mis-encoded documents and relocate assets with reference-consistent rewriting"
)]
struct Cli {
    /// Root the migration operates under; identifiers in reports and
    /// rewritten references are relative to it.
    #[arg(long, global = true, default_value = ".")]
    work_root: PathBuf,

    /// Explicit config file (default: <work-root>/site-recode.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect the real encoding of each document, convert it to the
    /// canonical encoding, and normalize its charset declaration.
    Recover {
        /// Documents or directories of documents to process.
        paths: Vec<PathBuf>,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Move assets to the canonical destination and rewrite every
    /// reference to them.
    Relocate {
        /// Asset files or directories to move.
        sources: Vec<PathBuf>,
        #[arg(long)]
        dest_root: PathBuf,
        /// Document roots whose references get rewritten.
        #[arg(long = "docs")]
        docs: Vec<PathBuf>,
        /// TOML table of literal old→new filename pairs to rewrite without
        /// moving anything.
        #[arg(long)]
        rename_map: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_report(report: &CommandReport) {
    for detail in &report.details {
        println!("{}", detail);
    }
    for issue in &report.issues {
        eprintln!("{}: issue: {}", report.command, issue);
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Recover {
            paths,
            recursive,
            dry_run,
        } => commands::recover::run(&commands::recover::RecoverOptions {
            work_root: cli.work_root,
            paths,
            config_path: cli.config,
            recursive,
            dry_run,
        })?,
        Commands::Relocate {
            sources,
            dest_root,
            docs,
            rename_map,
            dry_run,
        } => commands::relocate::run(&commands::relocate::RelocateOptions {
            work_root: cli.work_root,
            sources,
            dest_root,
            docs,
            rename_map,
            dry_run,
        })?,
    };

    print_report(&report);
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
