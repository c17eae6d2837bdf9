use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Duration,
};

use axum::{Extension, Router, response::IntoResponse, routing::get, serve};
use axum::http::{HeaderValue, StatusCode, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use shared::config::service::{Config, LogFormat};

use crate::{
    app_state::AppState,
    db::bootstrap,
    delivery::DeliveryEngine,
    intake::NotificationIntake,
    reaper::StaleConnectionReaper,
    registry::SubscriberRegistry,
    resolver::ChannelResolver,
    routes,
    store::PgConnectionStore,
    tracer,
    transport::HttpPushTransport,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.log_format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.log_level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates the registry database connection pool.
///
/// # Errors
/// Returns an error if the database connection pool cannot be created.
pub async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    metrics::gauge!("db_pool_max_connections").set(f64::from(config.db_max_connections));
    Ok(pool)
}

/// Wires the notification core: store → registry → resolver/reaper →
/// delivery → intake, each constructed once per process and shared.
///
/// # Errors
/// Returns an error if the push transport client cannot be constructed.
pub fn create_app_state(config: &Config, pool: sqlx::PgPool) -> anyhow::Result<Arc<AppState>> {
    let store = Arc::new(PgConnectionStore::new(
        pool.clone(),
        config.channel_index.clone(),
    ));
    let registry = Arc::new(SubscriberRegistry::new(store));
    let resolver = Arc::new(ChannelResolver::new(registry.clone()));
    let reaper = Arc::new(StaleConnectionReaper::new(registry.clone()));
    let transport = Arc::new(HttpPushTransport::new(
        &config.push_endpoint,
        Duration::from_millis(config.delivery_timeout_ms),
    )?);
    let delivery = Arc::new(DeliveryEngine::new(transport, reaper));
    let intake = Arc::new(NotificationIntake::new(
        resolver,
        delivery,
        config.frame_style,
    ));

    Ok(Arc::new(AppState {
        pool: Some(pool),
        registry,
        intake,
    }))
}

/// Creates the CORS layer for the application.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .allow_origin(AllowOrigin::any())
}

/// Creates the API router with all route modules.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(routes::notify::create_notify_router())
        .merge(routes::connections::create_connections_router())
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        .merge(routes::health::create_health_router())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(metrics_handle))
        .layer(create_cors_layer())
        .layer(tracer::create_trace_layer())
        .with_state(state)
}

/// Creates the graceful shutdown signal handler.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the notification service and binds it to the configured port.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    initialize_tracing(&config);
    info!("Starting server...");

    let metrics_handle = metrics_handle();

    // Set up the registry database
    let pool = create_database_pool(&config)
        .await
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    bootstrap::ensure_liveness(&pool)
        .await
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    bootstrap::run(&pool, config.channel_index.as_deref())
        .await
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    bootstrap::ensure_readiness(&pool)
        .await
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    // Create application state and router
    let state = create_app_state(&config, pool)?;
    let app = create_app_router(state, metrics_handle.clone());

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let shutdown_signal = create_shutdown_signal();

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::ServiceExt;

    use crate::app_state::testing::test_state;
    use crate::store::testing::MemoryStore;
    use crate::transport::testing::ScriptedTransport;

    #[test]
    fn env_filter_builds_from_the_configured_level() {
        let config = Config::with_defaults();
        let filter = build_env_filter(&config);
        assert!(!filter.to_string().is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_payload() {
        let _ = metrics_handle();
        let state = test_state(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedTransport::new()),
        );
        let app = create_app_router(state, metrics_handle());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "text/plain; version=0.0.4");

        // The rendered body is valid UTF-8 exposition text (possibly empty on
        // a fresh recorder).
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(bytes.to_vec()).is_ok());
    }

    #[tokio::test]
    async fn api_routes_are_nested_under_api() {
        let _ = metrics_handle();
        let state = test_state(
            Arc::new(MemoryStore::with_subscriptions(&[("c1", "incidentes")])),
            Arc::new(ScriptedTransport::new()),
        );
        let app = create_app_router(state, metrics_handle());

        let body = serde_json::json!({
            "records": [
                r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#,
            ]
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/notify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
