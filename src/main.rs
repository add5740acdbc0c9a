//! Album Streamer - serves media albums from a local directory.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use album_streamer::{
    archive::ArchiveService,
    config::{CheckConfig, Cli, Command, ServeConfig},
    ingest::IngestPool,
    library::{AlbumName, AlbumStore},
    server::{create_router, AppState},
    thumb::{DecoderTable, ThumbnailEncoder, ThumbnailService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Album Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Root: {}", config.root.display());
    info!(
        "  Thumbnails: {}px @ q{}, {}MB in memory",
        config.thumb_size,
        config.jpeg_quality,
        config.thumb_cache_bytes / (1024 * 1024)
    );
    info!("  Upload workers: {}", config.workers);
    info!(
        "  Archives: swept every {}s after {}s",
        config.sweep_interval, config.archive_ttl
    );

    let store = AlbumStore::new(&config.root);
    if let Err(e) = store.ensure_root().await {
        error!("Cannot use album root {}: {}", config.root.display(), e);
        return ExitCode::FAILURE;
    }

    let table = DecoderTable::probe(&config.decoders.settings()).await;
    for capability in table.capabilities() {
        if !capability.available {
            warn!("  No decoder for {} thumbnails", capability.kind.name());
        }
    }

    let thumbs = Arc::new(ThumbnailService::with_cache_capacity(
        store.clone(),
        table,
        ThumbnailEncoder::new(config.thumb_size, config.jpeg_quality),
        config.thumb_cache_bytes,
    ));
    let archives = Arc::new(ArchiveService::new(store.clone()));
    let ingest = Arc::new(IngestPool::new(
        store.clone(),
        thumbs.clone(),
        config.workers,
    ));

    let sweeper = archives
        .clone()
        .spawn_sweeper(config.sweep_interval(), config.archive_ttl());

    let state = AppState::new(store, thumbs, archives, ingest.clone())
        .with_chunk_size(config.chunk_size);
    let router = create_router(state, config.router_config());

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/albums", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    info!("Waiting for {} upload task(s) to finish", ingest.in_flight());
    ingest.shutdown().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shut down cleanly");
    ExitCode::SUCCESS
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "album_streamer=debug,tower_http=debug"
    } else {
        "album_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Album Streamer Configuration Check");
    println!("═══════════════════════════════════");
    println!();

    if let Err(e) = config.decoders.validate() {
        println!("✗ Decoders: {}", e);
        return ExitCode::FAILURE;
    }

    println!("Thumbnail decoders:");
    let table = DecoderTable::probe(&config.decoders.settings()).await;
    for capability in table.capabilities() {
        let mark = if capability.available { "✓" } else { "✗" };
        println!(
            "  {} {:<6} {}",
            mark,
            capability.kind.name(),
            capability.decoder.unwrap_or("(unavailable)")
        );
    }
    println!();

    let store = AlbumStore::new(&config.root);
    let albums = match store.list_albums().await {
        Ok(albums) => {
            println!("✓ Root: {}", config.root.display());
            albums
        }
        Err(e) => {
            println!("✗ Root: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("  Found {} album(s)", albums.len());

    if config.list_albums {
        println!();
        for name in &albums {
            let count = match AlbumName::parse(name) {
                Ok(album) => store.list_assets(&album).await.map(|a| a.len()),
                Err(e) => Err(e),
            };
            match count {
                Ok(count) => println!("  {} ({} asset(s))", name, count),
                Err(e) => println!("  {} (error: {})", name, e),
            }
        }
    }

    println!();
    println!("═══════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
