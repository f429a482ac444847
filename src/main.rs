use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sl_tracker::catalog::{compactor, Catalog};
use sl_tracker::config::Config;
use sl_tracker::realtime::{Poller, Reconciler};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load("config.yaml").expect("Failed to load config");

    match std::env::args().nth(1).as_deref() {
        Some("compact") => run_compaction(&config).await,
        Some("watch") => run_watch(&config).await,
        _ => {
            eprintln!("usage: sl-tracker <compact|watch>");
            std::process::exit(2);
        }
    }
}

/// One-shot batch job: stream the static archive into catalog artifacts.
async fn run_compaction(config: &Config) {
    let archive_path = config.schedule.archive.clone();
    let out_dir = config.schedule.out_dir.clone();
    let agencies = config.schedule.agencies.clone();

    tracing::info!(archive = %archive_path, "Starting schedule compaction");

    let compaction = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let compaction = compactor::compact(&mut archive, &agencies)?;
        compaction.write_to(Path::new(&out_dir))?;
        Ok::<_, sl_tracker::error::GtfsError>(compaction)
    })
    .await
    .expect("Compaction task panicked")
    .expect("Failed to compact schedule archive");

    tracing::info!(
        lines = compaction.lines.len(),
        excluded = compaction.excluded_routes.len(),
        "Schedule compaction finished"
    );
}

/// Poll the realtime feeds forever, keeping a shared vehicle snapshot.
async fn run_watch(config: &Config) {
    let Some(realtime) = config.realtime.clone() else {
        tracing::error!("config.yaml has no realtime section, cannot watch");
        std::process::exit(1);
    };

    let catalog = Catalog::read_from(Path::new(&config.schedule.out_dir))
        .expect("Failed to load catalog artifacts (run `sl-tracker compact` first)");
    let reconciler = Reconciler::new(&realtime).expect("Failed to build realtime client");

    let poller = Poller::new(
        reconciler,
        Arc::new(catalog),
        None,
        realtime.poll_interval_secs,
    );
    poller.run().await;
}
