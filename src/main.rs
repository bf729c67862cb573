//! Natours Server - tour booking REST API

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Uri},
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use natours_server::{
    api,
    config::AppConfig,
    error::{init_error_mode, AppError},
    repository::Repository,
    services::Services,
    AppState,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self' data: blob:; \
    script-src 'self' https://api.mapbox.com https://cdnjs.cloudflare.com https://js.stripe.com blob:; \
    style-src 'self' 'unsafe-inline' https://api.mapbox.com https://fonts.googleapis.com; \
    img-src 'self' data: blob: https://api.mapbox.com; \
    connect-src 'self' https://api.mapbox.com https://events.mapbox.com https://cdnjs.cloudflare.com; \
    font-src 'self' https://fonts.gstatic.com; \
    frame-src 'self' https://js.stripe.com; \
    object-src 'none'; \
    upgrade-insecure-requests";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);
    init_error_mode(config.run_mode);

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Uncaught panic, shutting down: {}", info);
        std::process::exit(1);
    }));

    tracing::info!(
        production = config.is_production(),
        "Starting Natours Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.connection_url())
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error, shutting down: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("natours_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received, finishing in-flight requests");
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri))
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.server.body_limit;

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Tours
        .route("/tours", get(api::tours::list_tours))
        .route("/tours", post(api::tours::create_tour))
        .route("/tours/top-5-cheap", get(api::tours::top_cheap_tours))
        .route("/tours/tour-stats", get(api::tours::tour_stats))
        .route("/tours/monthly-plan/:year", get(api::tours::monthly_plan))
        .route(
            "/tours/tours-within/:distance/center/:latlng/unit/:unit",
            get(api::tours::tours_within),
        )
        .route("/tours/distances/:latlng/unit/:unit", get(api::tours::tour_distances))
        .route("/tours/:id", get(api::tours::get_tour))
        .route("/tours/:id", patch(api::tours::update_tour))
        .route("/tours/:id", delete(api::tours::delete_tour))
        .route("/tours/:id/reviews", get(api::reviews::list_tour_reviews))
        .route("/tours/:id/reviews", post(api::reviews::create_tour_review))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users", post(api::users::create_user))
        .route("/users/:id", get(api::users::get_user))
        .route("/users/:id", patch(api::users::update_user))
        .route("/users/:id", delete(api::users::delete_user))
        // Reviews
        .route("/reviews", get(api::reviews::list_reviews))
        .route("/reviews", post(api::reviews::create_review))
        .route("/reviews/:id", get(api::reviews::get_review))
        .route("/reviews/:id", patch(api::reviews::update_review))
        .route("/reviews/:id", delete(api::reviews::delete_review))
        // Bookings
        .route("/bookings", get(api::bookings::list_bookings))
        .route("/bookings", post(api::bookings::create_booking))
        .route("/bookings/:id", get(api::bookings::get_booking))
        .route("/bookings/:id", patch(api::bookings::update_booking))
        .route("/bookings/:id", delete(api::bookings::delete_booking))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(security_header(
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=15552000; includeSubDomains",
        ))
        .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
        .layer(security_header(header::X_DNS_PREFETCH_CONTROL, "off"))
        .layer(security_header(
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ))
        .layer(security_header(header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY))
        .layer(CompressionLayer::new());

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .fallback(route_not_found)
        .layer(middleware)
}
