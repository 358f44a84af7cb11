mod runner;
mod scenario;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mediatab_core::{MediaTabError, ObserverConfig};
use mediatab_detect::SiteDatabase;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

/// Replay a page timeline through the tab media observer and print every
/// reported update as one JSON line.
#[derive(Debug, Parser)]
#[command(name = "mediatab-replay", version, about)]
struct Args {
    /// Scenario file (TOML).
    scenario: PathBuf,

    /// Observer config replacing the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Site database merged over the embedded one.
    #[arg(long)]
    sites: Option<PathBuf>,

    /// Log observer internals at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "mediatab=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match replay(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, scenario = %args.scenario.display(), "Replay failed");
            ExitCode::FAILURE
        }
    }
}

fn replay(args: &Args) -> Result<(), MediaTabError> {
    let config = match &args.config {
        Some(path) => ObserverConfig::load(path)?,
        None => ObserverConfig::default(),
    };

    let mut sites = SiteDatabase::embedded();
    if let Some(path) = &args.sites {
        let user = SiteDatabase::load(path)?;
        info!(sites = user.len(), path = %path.display(), "Merging user site database");
        sites.merge_user(&user);
    }

    let scenario = Scenario::load(&args.scenario)?;
    info!(
        url = %scenario.url,
        nodes = scenario.nodes.len(),
        steps = scenario.steps.len(),
        "Replaying scenario"
    );
    let updates = runner::run(&scenario, config, sites)?;

    let mut out = std::io::stdout().lock();
    for update in &updates {
        writeln!(out, "{}", serde_json::to_string(update)?)?;
    }
    info!(updates = updates.len(), "Replay finished");
    Ok(())
}
