//! Human-readable status output around a run.

use std::path::Path;
use std::time::Duration;

use allevo_sim::config::{Digest, Regime};
use indicatif::{ProgressBar, ProgressStyle};

pub fn banner(digest: &Digest) {
    println!("allevo run");
    println!("  regime:       {}", regime_name(digest.regime()));
    println!("  population:   {}", digest.population_size());
    println!("  generations:  {}", digest.generations());
    println!("  replicates:   {}", digest.replicates());
    println!("  marker sites: {}", digest.marker_len());
    println!("  seed:         {}", digest.seed());
}

pub fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]").expect("valid template"),
    );
    bar.set_message("simulating replicates");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn summary(digest: &Digest, output: &Path, elapsed: Duration) {
    println!(
        "  wrote {} rows to {} in {elapsed:.2?}",
        digest.generations() + 2,
        output.display(),
    );
}

fn regime_name(regime: Regime) -> &'static str {
    match regime {
        Regime::Drift => "drift",
        Regime::Mutation => "drift + mutation",
        Regime::Migration => "migration",
        Regime::Selection => "drift + selection",
        Regime::Bottleneck => "drift + bottleneck",
    }
}
