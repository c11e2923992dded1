use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use rss_poller::output::{build_sink, OutputRouter, Publisher};
use rss_poller::source::NewSource;
use rss_poller::{
    cache, Config, Database, HttpFeedFetcher, LiveHours, Pipeline, PipelinePolicy, Scheduler,
    SchedulerOptions, SqlSourceStore,
};

/// Adaptive feed poller.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Poll every source once, deliver the results and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    if let Err(e) = config.apply_env_overrides() {
        eprintln!("Invalid environment override: {e}");
        std::process::exit(2);
    }

    if let Err(e) = rss_poller::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        rss_poller::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config, cli.once).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: Config, once: bool) -> rss_poller::Result<()> {
    config.validate()?;
    info!("rss-poller {}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(SqlSourceStore::new(db.clone()));
    let seeds: Vec<NewSource> = config.sources.iter().map(NewSource::from).collect();
    let added = store.seed(&seeds).await?;
    if added > 0 {
        info!("Added {} source(s) from configuration", added);
    }
    let change_cache = cache::build(&config.cache, &db);
    let fetcher = Arc::new(HttpFeedFetcher::new(&config.fetch)?);
    let pipeline = Arc::new(Pipeline::new(
        fetcher,
        change_cache,
        PipelinePolicy::from_config(&config)?,
    ));

    let (router, queues) = OutputRouter::new(config.output.queue_capacity);
    let sink = build_sink(&config.output)?;
    let publish_timeout = Duration::from_secs(config.output.publish_timeout_secs);
    let full_text = tokio::spawn(
        Publisher::new(sink.clone(), &config.output.full_text_topic, publish_timeout)
            .run(queues.with_full_text),
    );
    let description_only = tokio::spawn(
        Publisher::new(sink, &config.output.description_topic, publish_timeout)
            .run(queues.without_full_text),
    );

    let options = SchedulerOptions {
        live_hours: LiveHours::from_config(&config.scheduler)?,
        reconcile_interval: Duration::from_secs(config.scheduler.reconcile_interval_secs),
    };
    let scheduler = Scheduler::new(store, pipeline, router, options);

    let result = if once {
        scheduler.poll_once().await.map(|routed| {
            info!("Routed {} item(s)", routed);
        })
    } else {
        match scheduler.start().await {
            Ok(_) => {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received"),
                    Err(e) => warn!("Failed to listen for interrupt: {}", e),
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    scheduler.shutdown().await;
    // Dropping the scheduler closes the output queues.
    drop(scheduler);

    for publisher in [full_text, description_only] {
        if let Err(e) = publisher.await {
            error!("Publisher task failed: {}", e);
        }
    }
    info!("Shutdown complete");
    result
}
