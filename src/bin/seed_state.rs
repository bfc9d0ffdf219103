use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use starbot::config;
use starbot::dedup::select_new;
use starbot::model::PublishedEntry;
use starbot::state::{JsonStateStore, StateStore};
use starbot::subsonic::{SourceService, SubsonicClient};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Mark every current favorite as already posted, without posting anything"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only print what would be marked
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let mut store = JsonStateStore::load(cfg.state_path())?;
    let source = SubsonicClient::from_config(&cfg.source)?;

    let fetched = source.fetch_favorites().await?;
    let total = fetched.len();
    let fresh = select_new(fetched, &store);
    info!(total, unseen = fresh.len(), known = store.len(), "fetched favorites");

    for track in &fresh {
        if args.dry_run {
            println!("{}\t{} - {}", track.id, track.artist, track.title);
            continue;
        }
        store.commit(&track.id, PublishedEntry::seeded())?;
    }

    if !args.dry_run {
        info!(
            seeded = fresh.len(),
            path = %store.path().display(),
            "state file seeded"
        );
    }
    Ok(())
}
