use crate::config::{AllowedOrigins, HttpConfig, ImagingConfig};
use crate::handlers;
use crate::services::{connect_image_store, ImageStore};
use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Request-scoped view of the process-wide resources.
///
/// `store` is `None` when the database could not be reached at startup; it is
/// never re-initialised afterwards.
#[derive(Clone)]
pub struct AppState {
    store: Option<Arc<dyn ImageStore>>,
}

impl AppState {
    pub fn new(store: Option<Arc<dyn ImageStore>>) -> Self {
        Self { store }
    }

    pub fn unavailable() -> Self {
        Self { store: None }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Result<&dyn ImageStore, AppError> {
        self.store.as_deref().ok_or(AppError::DatabaseUnavailable)
    }
}

fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/image/index/:index_id/",
            get(handlers::get_image_by_index),
        )
        .route("/images/random/:count/", get(handlers::get_random_images))
        .route(
            "/images/random_tumor/:count/",
            get(handlers::get_random_tumor_images),
        )
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => AllowOrigin::list(list.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
}

pub fn build_router(state: AppState, http: &HttpConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(image_routes())
        .nest("/api", image_routes());

    if let Some(dir) = &http.static_dir {
        tracing::info!(static_dir = %dir, "Serving static files at /static");
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&http.allowed_origins))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: ImagingConfig) -> Result<Self, AppError> {
        let store = connect_image_store(&config.mongodb).await;
        Self::build_with_store(config, store).await
    }

    /// Binds the listener around an already-resolved store, which lets tests
    /// run the full HTTP stack against an in-memory store.
    pub async fn build_with_store(
        config: ImagingConfig,
        store: Option<Arc<dyn ImageStore>>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(store);
        if !state.is_available() {
            tracing::warn!("Image store unavailable; data endpoints will answer 500");
        }

        let app = build_router(state.clone(), &config.http);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
