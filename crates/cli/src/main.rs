//! Command-line front end: read the settings and FASTA files, build the run
//! digest, and stream the experiment into the result file.

mod printing;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use allevo_sim::config::{Digest, FoundingPopulation, Settings};
use allevo_sim::{entropy_seed, Executor};

/// Forward-in-time allele-frequency simulator
#[derive(Parser, Debug)]
#[command(name = "allevo")]
#[command(author, version, about = "Forward-in-time allele frequency simulator", long_about = None)]
struct Cli {
    /// Settings file (KEY=VALUE lines, '#' comments)
    #[arg(short, long)]
    input: PathBuf,

    /// FASTA file with the founding sequences
    #[arg(short, long)]
    fasta: PathBuf,

    /// Result file, one row per generation plus the identifier header
    #[arg(short, long, default_value = "results.txt")]
    output: PathBuf,

    /// Master seed (drawn from entropy when absent; reruns with the same
    /// seed are byte-identical)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the resolved run configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(entropy_seed);

    let settings = Settings::from_path(&cli.input)
        .with_context(|| format!("reading settings from {}", cli.input.display()))?;
    let founders =
        FoundingPopulation::from_path_seeded(&cli.fasta, &settings.marker_sites, seed)
            .with_context(|| format!("reading founders from {}", cli.fasta.display()))?;
    let digest =
        Digest::from_input(&settings, founders, seed).context("validating run configuration")?;

    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&digest)?);
        return Ok(());
    }

    printing::banner(&digest);

    let executor = Executor::new(digest);
    let out = BufWriter::new(
        File::create(&cli.output)
            .with_context(|| format!("creating {}", cli.output.display()))?,
    );

    let started = Instant::now();
    let spinner = printing::spinner();
    executor.execute(out).context("running simulation")?;
    spinner.finish_and_clear();

    printing::summary(executor.digest(), &cli.output, started.elapsed());
    Ok(())
}
