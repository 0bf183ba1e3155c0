mod cli;

use std::path::PathBuf;

use anyhow::Result;
use cf_gen::render;
use clap::Parser;
use log::info;

use crate::cli::{enumerator, load_library, Partition};

/// Print the programs generated from a library.
#[derive(Parser, Debug)]
struct Args {
    /// Path to .toml library of free variables, operators and skeletons
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stop after this many programs
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Only enumerate slice I of N of the combination space
    #[arg(short, long, value_name = "I/N")]
    partition: Option<Partition>,
}

fn main() -> Result<()> {
    colog::init();
    let cli = Args::parse();

    let library = load_library(cli.config.as_deref())?;
    let mut programs = enumerator(&library, cli.partition)?;

    let mut printed = 0;
    for program in programs.by_ref().take(cli.count.unwrap_or(usize::MAX)) {
        let program = program?;
        println!("# candidate {printed}\n{}\n", render(&program));
        printed += 1;
    }

    let stats = programs.stats();
    info!("Printed {printed} programs, {} combinations visited, {} rejected", stats.visited, stats.rejected());
    Ok(())
}
