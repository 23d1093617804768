use clap::Parser;
use dotenvy::dotenv;
use osint_case_backend::api::middleware::rate_limit::RateLimiter;
use osint_case_backend::config::AppConfig;
use osint_case_backend::infrastructure::{database, storage};
use osint_case_backend::services::auth_service::AuthService;
use osint_case_backend::services::case_store::{CaseStore, SeaOrmCaseStore};
use osint_case_backend::services::thumbnail_service::ThumbnailService;
use osint_case_backend::services::upload_service::UploadService;
use osint_case_backend::services::worker::BackgroundWorker;
use osint_case_backend::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osint_case_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        "🚀 Starting OSINT case backend [{:?}] Max Size={}MB, Files/Case={}",
        config.mode,
        config.max_file_size / 1024 / 1024,
        config.max_files_per_case
    );

    // 2. Infrastructure; any failure here is fatal
    let db = database::setup_database(&config).await?;
    let local_storage = storage::setup_storage(&config).await?;

    // 3. Services
    let store: Arc<dyn CaseStore> = Arc::new(SeaOrmCaseStore::new(db.clone()));
    let auth = Arc::new(AuthService::new(
        db.clone(),
        store.clone(),
        config.session_ttl_hours,
    ));
    let uploads = Arc::new(UploadService::new(
        store.clone(),
        local_storage.clone(),
        ThumbnailService::default(),
        config.max_file_size,
        config.max_files_per_case,
    ));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));

    // 4. Worker with graceful shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = BackgroundWorker::new(
        auth.clone(),
        limiter.clone(),
        Duration::from_secs(300),
        shutdown_rx,
    );
    let worker_handle = tokio::spawn(worker.run());
    info!("👷 Worker service initialized.");

    // 5. API
    let state = AppState {
        db,
        store,
        storage: local_storage,
        uploads,
        auth,
        limiter,
        config,
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %uuid::Uuid::new_v4().simple(),
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("🛑 Shutting down backend services...");
    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
