//! # tutorcall API
//!
//! The API crate provides the web server for the tutoring call platform:
//! slot and booking endpoints, call maintenance endpoints, and the WebSocket
//! transport that drives the session event gateway.
//!
//! ## Architecture
//!
//! - **Routes**: Define API endpoints and URL structure
//! - **Handlers**: Thin request wrappers over repositories and the coordinator
//! - **Middleware**: Error mapping
//! - **Config**: Environment configuration
//!
//! The API uses Axum as the web framework and SQLx for database interactions.

/// Configuration module for API settings
pub mod config;
/// Request handlers
pub mod handlers;
/// Middleware for error handling
pub mod middleware;
/// Route definitions and API endpoint structure
pub mod routes;

use std::sync::Arc;

use axum::Router;
use eyre::{Result, WrapErr};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use tutorcall_db::store::PgStore;
use tutorcall_gateway::{Hub, SessionEventGateway};
use tutorcall_presence::{
    CallPresenceCoordinator, PresenceConfig, PresenceHandle, store::PresenceConnector,
};

/// Shared application state that is accessible to all request handlers
pub struct ApiState {
    /// PostgreSQL connection pool for the slot and booking repositories
    pub db_pool: PgPool,

    /// Durable/ephemeral membership coordination
    pub coordinator: Arc<CallPresenceCoordinator>,

    /// Real-time join/leave handling for WebSocket connections
    pub gateway: Arc<SessionEventGateway>,
}

impl ApiState {
    /// Wires the coordinator and gateway on top of the PostgreSQL store.
    ///
    /// Spawns the presence reaper, so it must run inside a tokio runtime.
    pub fn new(
        db_pool: PgPool,
        presence: Arc<dyn PresenceConnector>,
        config: &PresenceConfig,
    ) -> Self {
        let store = Arc::new(PgStore::new(db_pool.clone()));
        let handle = PresenceHandle::new(presence, config);
        let coordinator = Arc::new(CallPresenceCoordinator::new(
            store.clone(),
            store,
            handle,
            config,
        ));
        Self::with_coordinator(db_pool, coordinator)
    }

    pub fn with_coordinator(db_pool: PgPool, coordinator: Arc<CallPresenceCoordinator>) -> Self {
        let gateway = Arc::new(SessionEventGateway::new(
            coordinator.clone(),
            Arc::new(Hub::new()),
        ));
        Self {
            db_pool,
            coordinator,
            gateway,
        }
    }
}

/// Builds the router with every route attached to `state`
pub fn app(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health check endpoints
        .merge(routes::health::routes())
        // Availability slots and bookings
        .merge(routes::slots::routes())
        // Call membership, attendance and ratification
        .merge(routes::calls::routes())
        // Real-time session events
        .merge(routes::ws::routes())
        .with_state(state)
}

/// Starts the API server with the provided configuration and database connection
///
/// Initializes logging, wires the presence coordinator and gateway, and
/// serves until the listener fails. The presence connection is closed on
/// the way out.
pub async fn start_server(
    config: config::ApiConfig,
    db_pool: PgPool,
    presence: Arc<dyn PresenceConnector>,
) -> Result<()> {
    // Initialize tracing for logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let state = Arc::new(ApiState::new(db_pool, presence, &config.presence));
    let coordinator = state.coordinator.clone();
    let app = app(state);

    // Apply CORS configuration if origins are specified
    let app = if let Some(origins) = &config.cors_origins {
        let origins = origins
            .iter()
            .map(|origin| origin.parse::<axum::http::HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("Invalid API_CORS_ORIGINS value")?;
        let cors = tower_http::cors::CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
                axum::http::HeaderName::from_static(handlers::ws::USER_ID_HEADER),
                axum::http::HeaderName::from_static(handlers::ws::USER_ROLE_HEADER),
            ])
            .allow_origin(origins)
            .allow_credentials(true);

        app.layer(cors)
    } else {
        app
    };

    // Add request tracing and timeout middleware
    let app = app.layer(
        tower::ServiceBuilder::new()
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::timeout::TimeoutLayer::new(
                std::time::Duration::from_secs(config.request_timeout),
            ))
            .into_inner(),
    );

    // Start the HTTP server
    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    let served = axum::serve(listener, app).await;

    coordinator.presence().shutdown().await;
    served?;

    Ok(())
}
