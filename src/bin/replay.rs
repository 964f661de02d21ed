use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use nfl_overunder::replay::ReplayCase;
use nfl_overunder::weights::global_registry;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let json = args.iter().any(|a| a == "--json");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/replay_case.json"));

    // No network: everything the prediction reads comes from the case file.
    let case = ReplayCase::load(&path)?;
    let result = case.run(global_registry())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialize prediction")?
        );
    } else {
        print!("{}", result.render_text());
    }
    Ok(())
}
