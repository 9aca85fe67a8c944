//! vidshare server entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, extract::DefaultBodyLimit, http::StatusCode, middleware};
use sea_orm::DatabaseConnection;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vidshare_api::{AppState, auth_middleware, router as api_router};
use vidshare_common::{Config, LocalStorage, config::LogFormat};
use vidshare_core::{CommentService, ReactionService, SearchService, UserService, VideoService};
use vidshare_db::repositories::{
    CommentRepository, ReactionRepository, UserRepository, VideoRepository,
    WatchHistoryRepository,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wire repositories into services.
fn build_state(db: &Arc<DatabaseConnection>, storage: Arc<LocalStorage>) -> AppState {
    // Repositories
    let user_repo = UserRepository::new(Arc::clone(db));
    let video_repo = VideoRepository::new(Arc::clone(db));
    let comment_repo = CommentRepository::new(Arc::clone(db));
    let reaction_repo = ReactionRepository::new(Arc::clone(db));
    let watch_history_repo = WatchHistoryRepository::new(Arc::clone(db));

    // Services
    AppState {
        user_service: UserService::new(user_repo.clone(), storage.clone()),
        video_service: VideoService::new(
            video_repo.clone(),
            user_repo.clone(),
            watch_history_repo,
            storage,
        ),
        comment_service: CommentService::new(
            comment_repo.clone(),
            video_repo.clone(),
            user_repo.clone(),
            reaction_repo.clone(),
        ),
        reaction_service: ReactionService::new(reaction_repo, video_repo.clone(), comment_repo),
        search_service: SearchService::new(video_repo, user_repo),
    }
}

/// The full HTTP stack: API, static files, auth and the outer layers.
///
/// `max_upload` caps every request body; handlers past the limit answer 413.
/// Requests running longer than `timeout` answer 408.
fn build_app(
    state: AppState,
    storage: &LocalStorage,
    files_url: &str,
    max_upload: usize,
    timeout: Duration,
) -> Router {
    Router::new()
        .nest("/api", api_router())
        .nest_service(files_url, ServeDir::new(storage.base_path()))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    timeout,
                ))
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!("Starting vidshare server...");

    let db = Arc::new(vidshare_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    vidshare_db::migrate(&db).await?;
    info!("Migrations completed");

    let storage = Arc::new(LocalStorage::from_config(&config.storage));
    tokio::fs::create_dir_all(storage.base_path())
        .await
        .with_context(|| format!("failed to create {}", storage.base_path().display()))?;
    info!(path = %storage.base_path().display(), "Local storage ready");

    let state = build_state(&db, Arc::clone(&storage));
    let app = build_app(
        state,
        &storage,
        &config.storage.base_url,
        config.server.max_upload_bytes,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
