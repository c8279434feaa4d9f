//! Command-line host for the offline caching worker.
//!
//! Each run rebuilds the worker from its configuration and the cache
//! snapshot named by `--state`, delivers one event, waits for background
//! cache writes, and saves the snapshot again.
//!
//! ## Usage
//!
//! ```bash
//! # Precache the asset list and activate this version
//! swr --state cache.json install
//!
//! # Request an asset through the worker
//! swr --state cache.json fetch /style.css
//!
//! # Simulate a navigation (falls back to /index.html when offline)
//! swr --state cache.json fetch / --navigate
//!
//! # Deliver a push message
//! swr push '{"title":"Drop","url":"/drops/42"}'
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use swr_cache::{CacheStore, MemoryCacheStore};
use swr_common::{init_logging, LogConfig, LogFormat, SwrError};
use swr_net::{Fetcher, HttpFetcher, LoaderConfig, Request};
use swr_worker::{
    dispatch, EventOutcome, FetchDecision, OfflineWorker, PlatformEvent, Registration,
    WorkerConfig,
};
use tracing::{debug, error};
use url::Url;

#[derive(Parser)]
#[command(name = "swr")]
#[command(about = "Offline caching worker: precache, stale-while-revalidate, push")]
struct Cli {
    /// Worker configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache snapshot file, loaded before and saved after the command
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Override the configured origin
    #[arg(long, global = true)]
    origin: Option<Url>,

    /// Log output format
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Log filter directives, e.g. `swr_worker=trace,reqwest=warn`
    #[arg(long, global = true)]
    log_filter: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Precache every asset, then activate and drop older buckets
    Install,

    /// Send a GET request through the worker
    Fetch {
        /// Absolute URL, or a path resolved against the origin
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },

    /// Deliver a push message and print the resulting notification
    Push {
        /// JSON payload; omit for a push without data
        payload: Option<String>,
    },

    /// List cache buckets and their entries
    Buckets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    if let Some(filter) = &cli.log_filter {
        log_config = log_config.with_filter(filter.as_str());
    }
    init_logging(log_config)?;

    let mut config = match &cli.config {
        Some(path) => WorkerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    if let Some(origin) = cli.origin.clone() {
        config = config.with_origin(origin);
    }

    let store = open_store(cli.state.as_deref()).await?;
    let fetcher = Arc::new(HttpFetcher::new(
        config.origin.clone(),
        LoaderConfig::default(),
    )?);

    // The registration lives only for this run; a bucket left by an earlier
    // install is taken to be the active version.
    let (registration, _events) = Registration::shared();
    if !matches!(cli.command, Commands::Install) && store.has(&config.cache_name).await {
        registration.write().await.resume(&config.cache_name);
    }

    let worker = OfflineWorker::builder(config)
        .store(Arc::new(store.clone()))
        .fetcher(fetcher.clone())
        .registration(registration)
        .build()?;

    let result = run(&cli.command, &worker, fetcher.as_ref()).await;

    worker.settle().await;
    if let Some(path) = &cli.state {
        store
            .save(path)
            .await
            .with_context(|| format!("saving state {}", path.display()))?;
    }
    if let Err(e) = &result {
        error!(category = e.category(), error = %e, "Command failed");
    }
    Ok(result?)
}

async fn run(
    command: &Commands,
    worker: &OfflineWorker,
    fetcher: &dyn Fetcher,
) -> swr_common::Result<()> {
    match command {
        Commands::Install => {
            dispatch(worker, PlatformEvent::Install).await?;
            println!("Installed {}", worker.cache_name());

            if worker.registration().read().await.ready_to_activate() {
                if let EventOutcome::Activated { deleted } =
                    dispatch(worker, PlatformEvent::Activate).await?
                {
                    println!("Activated {}", worker.cache_name());
                    for name in deleted {
                        println!("  deleted {}", name);
                    }
                }
            }
        }

        Commands::Fetch {
            url,
            navigate,
            body,
        } => {
            let url = worker.config().resolve(url)?;
            let request = if *navigate {
                Request::navigate(url)
            } else {
                Request::get(url)
            };

            let outcome = dispatch(worker, PlatformEvent::Fetch(request.clone())).await?;
            let (response, source) = match outcome {
                EventOutcome::Fetch(FetchDecision::Respond(answer)) => {
                    (answer.response, format!("{:?}", answer.source).to_lowercase())
                }
                EventOutcome::Fetch(FetchDecision::Passthrough) => {
                    debug!(url = %request.url, "Not intercepted, fetching directly");
                    (fetcher.fetch(&request).await?, "passthrough".to_string())
                }
                EventOutcome::Fetch(FetchDecision::Failed(e)) => {
                    return Err(e.into());
                }
                other => {
                    return Err(SwrError::Internal(format!("unexpected outcome {:?}", other)));
                }
            };

            println!("{} {}", response.status, response.url);
            println!("  source: {}", source);
            println!("  type:   {}", response.response_type.as_str());
            println!("  bytes:  {}", response.body.len());
            if *body {
                println!();
                println!("{}", response.text()?);
            }
        }

        Commands::Push { payload } => {
            let data = payload.clone().map(Bytes::from);
            match dispatch(worker, PlatformEvent::Push(data)).await? {
                EventOutcome::Pushed(Some(notification)) => {
                    println!("{}", serde_json::to_string_pretty(&notification)?);
                }
                EventOutcome::Pushed(None) => println!("No notification shown"),
                other => {
                    return Err(SwrError::Internal(format!("unexpected outcome {:?}", other)));
                }
            }
        }

        Commands::Buckets => {
            let store = worker.store();
            let active = worker
                .registration()
                .read()
                .await
                .active_cache()
                .map(str::to_string);
            for name in store.keys().await {
                let marker = if active.as_deref() == Some(name.as_str()) {
                    " (active)"
                } else {
                    ""
                };
                let keys = store.entry_keys(&name).await?;
                println!("{}{}: {} entries", name, marker, keys.len());
                for key in keys {
                    println!("  {}", key);
                }
            }
        }
    }

    Ok(())
}

async fn open_store(state: Option<&Path>) -> anyhow::Result<MemoryCacheStore> {
    match state {
        Some(path) => MemoryCacheStore::load(path)
            .await
            .with_context(|| format!("loading state {}", path.display())),
        None => Ok(MemoryCacheStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["swr", "--state", "s.json", "fetch", "/", "--navigate", "-v"])
            .unwrap();
        assert_eq!(cli.state, Some(PathBuf::from("s.json")));
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Fetch { url, navigate, body } => {
                assert_eq!(url, "/");
                assert!(navigate);
                assert!(!body);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_parse_log_format() {
        let cli = Cli::try_parse_from(["swr", "--log-format", "json", "buckets"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["swr", "--log-format", "xml", "buckets"]).is_err());
    }

    #[test]
    fn test_push_payload_optional() {
        let cli = Cli::try_parse_from(["swr", "push"]).unwrap();
        assert!(matches!(cli.command, Commands::Push { payload: None }));
    }

    #[test]
    fn test_parse_log_filter() {
        let cli = Cli::try_parse_from(["swr", "buckets", "--log-filter", "swr_worker=trace"])
            .unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("swr_worker=trace"));
        assert!(Cli::try_parse_from(["swr", "buckets"]).unwrap().log_filter.is_none());
    }

    fn offline_worker() -> (OfflineWorker, Arc<HttpFetcher>) {
        let origin = Url::parse("http://127.0.0.1:9/").unwrap();
        let fetcher = Arc::new(HttpFetcher::new(origin.clone(), LoaderConfig::default()).unwrap());
        let worker = OfflineWorker::builder(WorkerConfig::default().with_origin(origin))
            .fetcher(fetcher.clone())
            .build()
            .unwrap();
        (worker, fetcher)
    }

    #[tokio::test]
    async fn test_failed_passthrough_is_a_network_error() {
        let (worker, fetcher) = offline_worker();
        let command = Commands::Fetch {
            url: "/style.css".into(),
            navigate: false,
            body: false,
        };
        let err = run(&command, &worker, fetcher.as_ref()).await.unwrap_err();
        assert_eq!(err.category(), "network");
    }

    #[tokio::test]
    async fn test_push_without_activation_succeeds() {
        let (worker, fetcher) = offline_worker();
        let command = Commands::Push { payload: None };
        assert!(run(&command, &worker, fetcher.as_ref()).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(Some(&dir.path().join("absent.json"))).await.unwrap();
        assert!(store.keys().await.is_empty());
    }
}
