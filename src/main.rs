mod cli;

use magnetcast::{
    config::{self, Config},
    consumer::{self, FeedSource, FileSink},
    publisher::{sidecar_path, Publisher},
    server::{self, AppContext},
    watch,
};
use magnetcast_common::EventBus;
use magnetcast_content::{HttpSwarmFetcher, LocalSwarm};
use magnetcast_playlist::LivePlaylist;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cancellation token that fires on Ctrl+C or SIGTERM.
fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        trigger.cancel();
    });
    cancel
}

struct PublishArgs {
    path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    interval_ms: Option<u64>,
    max_sessions: Option<usize>,
}

async fn publish(args: PublishArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags override file values
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.publisher.interval_ms = interval_ms;
    }
    if let Some(max_sessions) = args.max_sessions {
        config.window.max_sessions = max_sessions;
    }
    config::validate_config(&config)?;

    let cancel = cancel_on_signal();

    let playlist = if args.path.is_dir() {
        let pattern = regex::Regex::new(&config.publisher.playlist_pattern)
            .context("Invalid playlist pattern")?;
        match watch::await_playlist(&args.path, &pattern, &cancel).await? {
            Some(found) => found,
            None => {
                tracing::info!("Interrupted before a playlist appeared");
                return Ok(());
            }
        }
    } else if args.path.is_file() {
        args.path
    } else {
        anyhow::bail!("Playlist path does not exist: {:?}", args.path);
    };

    let swarm = Arc::new(LocalSwarm::new(config.publisher.piece_length));
    let events = Arc::new(EventBus::default());
    let publisher = Publisher::new(swarm.clone(), playlist, &config, events.clone());

    let ctx = AppContext {
        swarm,
        events,
        feed_path: publisher.feed_path().to_path_buf(),
    };

    tracing::info!(
        "Feed will be served at http://{}:{}/{}",
        config.server.host,
        config.server.port,
        config.publisher.feed_name
    );

    let publisher_handle = tokio::spawn(publisher.run(cancel.clone()));

    let server_result =
        server::start_server(&config.server.host, config.server.port, ctx, cancel.clone()).await;

    tracing::info!("Shutting down...");
    cancel.cancel();
    if let Err(e) = publisher_handle.await {
        tracing::error!("Publisher task failed: {}", e);
    }

    server_result
}

struct PlayArgs {
    feed: String,
    gateway: Option<String>,
    output: Option<PathBuf>,
    order: Option<config::DeliveryOrder>,
    retries: Option<u32>,
}

async fn play(args: PlayArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if args.gateway.is_some() {
        config.consumer.gateway = args.gateway;
    }
    if args.output.is_some() {
        config.consumer.output = args.output;
    }
    if let Some(order) = args.order {
        config.consumer.delivery_order = order;
    }
    if let Some(retries) = args.retries {
        config.consumer.retrieval_retries = retries;
    }
    config::validate_config(&config)?;

    let source: FeedSource = args.feed.parse()?;
    let gateway = match config.consumer.gateway.as_deref() {
        Some(url) => url::Url::parse(url).context("Invalid gateway URL")?,
        None => source
            .gateway()
            .context("A gateway URL is required when the feed is a local file")?,
    };
    let output = config
        .consumer
        .output
        .clone()
        .context("No output file: pass --output or set consumer.output")?;

    let sink = FileSink::create(&output)
        .await
        .with_context(|| format!("Failed to create output file: {:?}", output))?;
    let fetcher = Arc::new(HttpSwarmFetcher::new(gateway.clone()));

    tracing::info!("Playing {} via {} into {:?}", source, gateway, output);

    let cancel = cancel_on_signal();
    let stats = consumer::run_consumer(
        source,
        fetcher,
        Box::new(sink),
        &config.consumer,
        None,
        cancel,
    )
    .await;

    println!(
        "Appended {} segments ({} dropped, {} still queued)",
        stats.appended, stats.dropped, stats.queued
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "magnetcast=trace,magnetcast_content=trace,magnetcast_playlist=debug,tower_http=debug"
                .to_string()
        } else {
            "magnetcast=info,magnetcast_content=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Publish {
            path,
            host,
            port,
            interval_ms,
            max_sessions,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let args = PublishArgs {
                path,
                host,
                port,
                interval_ms,
                max_sessions,
            };
            rt.block_on(publish(args, cli.config.as_deref()))
        }
        Commands::Play {
            feed,
            gateway,
            output,
            order,
            retries,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let args = PlayArgs {
                feed,
                gateway,
                output,
                order,
                retries,
            };
            rt.block_on(play(args, cli.config.as_deref()))
        }
        Commands::Inspect { playlist, json } => inspect(&playlist, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("magnetcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn inspect(playlist: &Path, json: bool) -> Result<()> {
    if !playlist.exists() {
        anyhow::bail!("Playlist does not exist: {:?}", playlist);
    }

    let text = std::fs::read_to_string(playlist)
        .with_context(|| format!("Failed to read playlist: {:?}", playlist))?;
    let parsed = LivePlaylist::parse(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    let base = playlist.parent().unwrap_or_else(|| Path::new("."));
    println!("Playlist: {}", playlist.display());
    println!("Entries: {}", parsed.len());
    for entry in &parsed.entries {
        let resolved = base.join(&entry.uri);
        let sidecar = std::fs::read_to_string(sidecar_path(&resolved)).ok();
        print!("  [{:>4}] {:<5} {}", entry.line, format!("{:?}", entry.kind).to_lowercase(), entry.uri);
        if !resolved.exists() {
            print!(" (missing)");
        }
        println!();
        if let Some(id) = sidecar {
            println!("         {}", id.trim());
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };
    config::validate_config(&config)?;

    println!("✓ Configuration is valid");
    println!("  Gateway: {}:{}", config.server.host, config.server.port);
    println!(
        "  Publisher: every {} ms, feed {:?}",
        config.publisher.interval_ms, config.publisher.feed_name
    );
    println!("  Seeding window: {} sessions", config.window.max_sessions);
    println!(
        "  Consumer: poll every {} ms, {:?} order, {} retries",
        config.consumer.poll_interval_ms,
        config.consumer.delivery_order,
        config.consumer.retrieval_retries
    );

    Ok(())
}
