use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use starbot::config;
use starbot::mastodon::{DryRunPublisher, MastodonClient, PublishService};
use starbot::profile::NowPlaying;
use starbot::publisher::{PostSettings, Publisher};
use starbot::scheduler::Scheduler;
use starbot::state::{JsonStateStore, StateStore};
use starbot::subsonic::{SourceService, SubsonicClient};

#[derive(Debug, Parser)]
#[command(author, version, about = "Post newly starred Navidrome tracks to Mastodon")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Log posts instead of sending them; the state file is read but never written
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
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let store = JsonStateStore::load(cfg.state_path())?;

    let source: Arc<dyn SourceService> = Arc::new(SubsonicClient::from_config(&cfg.source)?);
    let api: Arc<dyn PublishService> = if args.dry_run {
        warn!("dry run: nothing will be posted or recorded");
        Arc::new(DryRunPublisher::default())
    } else {
        Arc::new(MastodonClient::from_config(&cfg.mastodon)?)
    };
    let mut settings = PostSettings::from_config(&cfg);
    if args.dry_run {
        settings = settings.for_dry_run();
    }
    let publisher = Publisher::new(source.clone(), api.clone(), settings);
    let now_playing = cfg
        .mastodon
        .profile_field
        .as_deref()
        .map(|field| NowPlaying::new(source.clone(), api, field));

    let interval = cfg.poll_interval();
    if args.dry_run {
        let scheduler = with_profile(
            Scheduler::new(source, publisher, store.snapshot(), interval),
            now_playing,
        );
        run(scheduler, args.once).await
    } else {
        let scheduler = with_profile(
            Scheduler::new(source, publisher, store, interval),
            now_playing,
        );
        run(scheduler, args.once).await
    }
}

fn with_profile<St: StateStore>(
    scheduler: Scheduler<St>,
    now_playing: Option<NowPlaying>,
) -> Scheduler<St> {
    match now_playing {
        Some(now_playing) => {
            info!("profile field updates enabled");
            scheduler.with_now_playing(now_playing)
        }
        None => scheduler,
    }
}

async fn run<St>(mut scheduler: Scheduler<St>, once: bool) -> Result<()>
where
    St: StateStore,
{
    if once {
        let report = scheduler.run_cycle().await?;
        info!(
            fetched = report.fetched,
            new = report.new,
            published = report.published,
            failed = report.failed,
            "single cycle complete"
        );
        if let Err(err) = scheduler.refresh_profile().await {
            warn!(stage = err.stage(), error = %err, "profile not updated");
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received; finishing current cycle"),
            Err(err) => error!(?err, "failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    let store = scheduler.run(shutdown_rx).await?;
    info!(known = store.len(), "bye");
    Ok(())
}
