use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use intake_api::config::ApiConfig;
use intake_api::dedup::{CandidateSearch, DispositionTracker, PollSettings, SearchCoordinator};
use intake_api::helpers;
use intake_api::jobs::merge_manager::MergeJobManager;
use intake_api::notifications::{Notifier, TracingNotifier};
use intake_api::store::{ContactStore, SqliteContactStore};
use matching::NameMatcher;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = args.log_file_path {
        let log_path = std::path::Path::new(&log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("intake-api.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    // Load config
    let loaded = match &args.config {
        Some(path) => ApiConfig::load_from(path),
        None => ApiConfig::load(),
    };
    let (config, config_path) = loaded.map_err(std::io::Error::other)?;
    tracing::info!("Loaded config from {}", config_path.display());

    // Initialize database
    let db = helpers::database::initialize_database(config.database.as_ref())
        .map_err(std::io::Error::other)?;

    let (host, port) = if let Some(server_config) = &config.server {
        (server_config.host.clone(), server_config.port)
    } else {
        ("127.0.0.1".to_string(), 8080)
    };

    tracing::info!("Server will listen on {}:{}", host, port);

    let dedup = config.dedup.clone();
    let store: Arc<dyn ContactStore> =
        Arc::new(SqliteContactStore::new(db.async_connection.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    let search = Arc::new(CandidateSearch::new(
        store.clone(),
        notifier.clone(),
        NameMatcher::new(dedup.similarity_threshold),
        dedup.backfill_concurrency,
    ));
    let coordinator = Arc::new(SearchCoordinator::new(search));
    let tracker = Arc::new(DispositionTracker::new(
        store.clone(),
        notifier.clone(),
        PollSettings::from(&dedup),
    ));
    let merge_manager = Arc::new(MergeJobManager::new(store.clone()));

    // Restore interrupted merges on startup
    if let Err(e) = merge_manager.restore_interrupted_jobs().await {
        tracing::warn!("Failed to restore interrupted merges: {}", e);
    }

    // Spawn periodic merge job task
    let manager_clone = merge_manager.clone();
    let merge_interval = dedup.merge_job_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(merge_interval);
        loop {
            interval.tick().await;
            if manager_clone.is_shutting_down() {
                break;
            }
            if let Err(e) = manager_clone.run_pending().await {
                tracing::error!("Merge job run failed: {}", e);
            }
        }
    });

    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = if let Some(cors_config) = &config.cors {
            let mut cors_builder = Cors::default();
            for origin in &cors_config.allowed_origins {
                cors_builder = cors_builder.allowed_origin(origin);
            }
            cors_builder
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        } else {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        };

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(coordinator.clone()))
            .app_data(web::Data::new(tracker.clone()))
            .configure(intake_api::handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run();

    let handle = server.handle();
    let shutdown_manager = merge_manager.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        tracing::info!("Ctrl+C received, shutting down...");
        if let Err(e) = shutdown_manager.shutdown().await {
            tracing::warn!("Failed to shutdown merge manager cleanly: {}", e);
        }

        handle.stop(true).await;
    });

    server.await
}
