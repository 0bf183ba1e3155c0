mod cli;
mod run;

use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Result};
use cf_gen::render;
use clap::Parser;
use colored::Colorize;
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use similar::TextDiff;

use crate::cli::{enumerator, load_library, Partition};
use crate::run::Runner;

#[derive(Parser, Debug)]
struct Args {
    /// Path to target script under test
    target: PathBuf,
    /// Path to gold script under test
    gold: PathBuf,
    /// Output path
    out: PathBuf,

    /// Path to .toml library of free variables, operators and skeletons
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of programs to try, defaults to 100
    #[arg(short, long)]
    num_trials: Option<usize>,
    /// How long to wait before timing out the run
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Only enumerate slice I of N of the combination space
    #[arg(short, long, value_name = "I/N")]
    partition: Option<Partition>,
    /// Probability of trying each generated program
    #[arg(long, default_value_t = 1.0)]
    sample_rate: f64,
    /// Seed for the sampling
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(PartialEq)]
enum Outcome {
    Match,
    Mismatch
}

struct TrialResult {
    /// did our program output match?
    outcome: Outcome,
    /// did we terminate?
    we_terminate: bool,
    /// did they terminate?
    they_terminate: bool,
    /// did the gold script accept the program?
    compiles: bool,
    /// unified diff of the two outputs
    diff: String,
}

impl TrialResult {
    /// what is our criterion for good
    fn good(&self) -> bool {
        self.outcome == Outcome::Match ||
            !self.we_terminate && !self.they_terminate ||
            !self.compiles
    }
}

fn trial(target: &Runner, gold: &Runner, program: &str) -> Result<TrialResult> {
    // run them!
    let them = gold.run(program)?;
    let us = target.run(program)?;
    // diff them!
    let diff = TextDiff::from_lines(&us.output, &them.output);
    // 1.0 => complete match
    let outcome = if diff.ratio() == 1.0 { Outcome::Match } else { Outcome::Mismatch };
    Ok(TrialResult {
        outcome,
        we_terminate: us.termination,
        they_terminate: them.termination,
        compiles: them.compilation,
        diff: diff.unified_diff().header("target", "gold").to_string(),
    })
}

fn main() -> Result<()> {
    colog::init();
    let cli = Args::parse();

    ensure!(cli.out.exists(), "Output path `{}` doesn't exist!", cli.out.display());
    ensure!((0.0..=1.0).contains(&cli.sample_rate), "sample rate must be within [0, 1]");

    let target = Runner::new(&cli.target, cli.timeout)?;
    let gold = Runner::new(&cli.gold, cli.timeout)?;
    let library = load_library(cli.config.as_deref())?;
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let mut num_uncompiles = 0;
    let mut num_failures = 0;
    let mut num_hangs = 0;
    let mut num_runs = 0;
    let num_trials = cli.num_trials.unwrap_or(100);

    for (index, program) in enumerator(&library, cli.partition)?.enumerate() {
        if num_runs >= num_trials {
            break;
        }
        let program = program?;
        if !rng.gen_bool(cli.sample_rate) {
            continue;
        }

        let text = render(&program);
        let result = trial(&target, &gold, &text)?;
        if !result.we_terminate && !result.they_terminate {
            num_hangs += 1;
        }
        if !result.compiles {
            num_uncompiles += 1;
        }
        if !result.good() {
            let mut test_case_path = cli.out.clone();
            test_case_path.push(format!("{index}.py"));
            fs::write(&test_case_path, &text)?;
            test_case_path.set_extension("diff");
            fs::write(&test_case_path, &result.diff)?;
            warn!("Mismatch on candidate {index}, written to {}", test_case_path.display());

            num_failures += 1
        }
        num_runs += 1;
    }

    info!("Finished {num_runs} trials");
    let failures = format!("{num_failures} mismatches");
    println!(
        "{} trials, {}, {} hangs, {} rejected by gold",
        num_runs,
        if num_failures == 0 { failures.green() } else { failures.red() },
        num_hangs.to_string().yellow(),
        num_uncompiles.to_string().yellow()
    );
    Ok(())
}
