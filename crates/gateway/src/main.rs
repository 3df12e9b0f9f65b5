//! SkuMap API Gateway
//!
//! The main entry point for all catalog API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use skumap_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::{schema::ensure_schema, DbPool, Repository},
    errors::AppError,
    matching::DetectionEngine,
    metrics::{self, IMPORT_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Multipart framing allowance on top of the raw upload limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub detector: DetectionEngine,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting SkuMap API Gateway v{}",
        skumap_common::VERSION
    );

    // Initialize metrics
    let prometheus = install_prometheus()?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    if config.database.auto_migrate {
        ensure_schema(db.write()).await?;
    }

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .context("auth.jwt_secret must be set (APP__AUTH__JWT_SECRET)")?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        repo: Repository::new(db),
        jwt: Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs)),
        detector: DetectionEngine::new(config.matching.fuzzy_threshold),
    };

    // Build the router
    let app = create_router(state, prometheus)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    stop_tx.send(()).ok();

    // In-flight requests get shutdown_timeout to drain
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(result) => result??,
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping remaining connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("detection_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_import_duration_seconds", METRICS_PREFIX)),
            IMPORT_BUCKETS,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState, prometheus: PrometheusHandle) -> skumap_common::Result<Router> {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id_header = config
        .request_id_header()
        .map_err(|e| AppError::Configuration { message: e.to_string() })?;
    let request_id = SetRequestIdLayer::new(request_id_header.clone(), MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::new(request_id_header);

    let upload_limit = DefaultBodyLimit::max(config.interchange.max_upload_bytes + MULTIPART_OVERHEAD_BYTES);

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Mapping endpoints
        .route(
            "/sku-mappings",
            get(handlers::mappings::list_mappings).post(handlers::mappings::create_mapping),
        )
        .route("/sku-mappings/lookup", get(handlers::mappings::lookup))
        .route(
            "/sku-mappings/{id}",
            get(handlers::mappings::get_mapping)
                .put(handlers::mappings::update_mapping)
                .delete(handlers::mappings::delete_mapping),
        )
        .route(
            "/sku-mappings/{id}/variations/{variation_id}",
            delete(handlers::mappings::delete_variation),
        )

        // Detection
        .route("/sku-mappings/detect", post(handlers::detection::detect))

        // Interchange
        .route(
            "/sku-mappings/import",
            post(handlers::interchange::import).layer(upload_limit),
        )
        .route("/sku-mappings/export", get(handlers::interchange::export))
        .route_layer(from_fn(middleware::metrics::track_requests));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?;
        api_routes = api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let metrics_routes = Router::new().route(
        "/metrics",
        get(move || std::future::ready(prometheus.render())),
    );

    // Compose the app
    Ok(Router::new()
        .nest("/api", api_routes)
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(GlobalConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
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
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
