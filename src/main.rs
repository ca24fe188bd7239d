use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pd_infra::config::{default_config_path, default_state_path};
use printdest_lib::bootstrap::tracing::init_tracing_subscriber;
use printdest_lib::{run_session, SessionPaths};

#[derive(Parser)]
#[command(name = "printdest")]
#[command(about = "Discover print destinations and pick the preferred one", long_about = None)]
struct Cli {
    /// Settings file (TOML). Defaults to the user config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Selection state file (JSON). Defaults to the user data directory.
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Recorded discovery results to replay (JSON)
    #[arg(short, long)]
    fixture: PathBuf,

    /// Give up after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Cli {
    fn paths(self) -> Result<SessionPaths> {
        let config = match self.config {
            Some(path) => path,
            None => default_config_path().context("no config directory; pass --config")?,
        };
        let state = match self.state {
            Some(path) => path,
            None => default_state_path().context("no data directory; pass --state")?,
        };
        Ok(SessionPaths {
            config,
            state,
            fixture: self.fixture,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let timeout = cli.timeout_ms.map(Duration::from_millis);
    let outcome = run_session(cli.paths()?, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
