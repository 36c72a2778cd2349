//! siphon-ckpt - checkpoint maintenance tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use siphon_checkpoint::{delete_checkpoint_files, CheckpointPool, IndexCheckpoint};
use siphon_common::logging::{init_logging, LogConfig, LogLevel};
use siphon_common::CollectionTask;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "siphon-ckpt")]
#[command(author, version, about = "Siphon checkpoint maintenance tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the bucket scan state and discovered objects of a data input
    Inspect {
        /// Data input name
        input: String,

        /// Checkpoint directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Compact a data input's checkpoint stores
    Sweep {
        /// Data input name
        input: String,

        /// Checkpoint directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Delete a data input's checkpoint files
    Delete {
        /// Data input name
        input: String,

        /// Checkpoint directory
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_log_file_prefix("siphon-ckpt");
    init_logging(&log_config)?;

    match cli.command {
        Command::Inspect { input, dir } => inspect(&input, dir),
        Command::Sweep { input, dir } => sweep(&input, dir),
        Command::Delete { input, dir } => {
            delete_checkpoint_files(&input, &dir)?;
            Ok(())
        },
    }
}

fn inspect(input: &str, dir: PathBuf) -> Result<()> {
    let pool = CheckpointPool::new();
    // Inspection never creates state, so the bucket name is irrelevant here.
    let task = CollectionTask::new(input, dir, "");
    let mut index = IndexCheckpoint::open(&pool, &task, false)?;

    println!("data input:       {input}");
    println!("bucket:           {}", index.bucket_name());
    println!(
        "last modified:    {}",
        index.last_modified().unwrap_or("(unset)")
    );
    println!("latest scanned:   {}", index.latest_scanned());

    let names: Vec<String> = index.keys()?.collect();
    println!("objects:          {}", names.len());
    for name in names {
        let state = index
            .get_state(&name)?
            .map(|record| format!("{} @ {}", record.state, record.offset))
            .unwrap_or_else(|| "(no key record)".to_string());
        println!("  {name}  {state}");
    }

    pool.close_all()?;
    Ok(())
}

fn sweep(input: &str, dir: PathBuf) -> Result<()> {
    let pool = CheckpointPool::new();
    pool.get(input, &dir)?;
    pool.clean(input)?;
    info!(data_input = %input, "Checkpoint stores compacted");
    Ok(())
}
