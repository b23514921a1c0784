//! # SlotSync API
//!
//! HTTP surface for the slot and message synchronizers. UI clients open slot
//! views and conversation views here and read their state back; the push
//! transport feeds events in through a webhook or an upstream WebSocket.
//!
//! ## Architecture
//!
//! - **Routes**: URL structure of the API
//! - **Handlers**: Request processing on top of `slotsync-sync`
//! - **Middleware**: Error mapping
//! - **Config**: Environment configuration

/// Configuration module for API settings
pub mod config;
/// Request handlers
pub mod handlers;
/// Error handling middleware
pub mod middleware;
/// Route definitions
pub mod routes;

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    BoxError, Router,
    error_handling::HandleErrorLayer,
    http::{Method, StatusCode, header},
};
use eyre::Result;
use slotsync_core::errors::{SyncError, SyncResult};
use slotsync_sync::{
    backend::{BackendApi, HttpBackend},
    channel::LocalPushHub,
    context::{SessionSettings, SyncContext},
    conversation::ConversationSession,
    slots::SlotSynchronizer,
};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

/// Shared application state that is accessible to all request handlers
pub struct ApiState {
    /// Backend client, push channel and in-flight registry shared by all views
    pub ctx: SyncContext,
    /// The in-process push hub the transport feeds
    pub hub: LocalPushHub,
    /// Open slot views by id
    pub slot_views: RwLock<HashMap<Uuid, SlotSynchronizer>>,
    /// Open conversation views by id
    pub conversations: RwLock<HashMap<Uuid, ConversationSession>>,
}

impl ApiState {
    pub fn new(backend: Arc<dyn BackendApi>, settings: SessionSettings) -> Self {
        let hub = LocalPushHub::new();
        let ctx = SyncContext::new(backend, Arc::new(hub.clone())).with_settings(settings);
        Self {
            ctx,
            hub,
            slot_views: RwLock::new(HashMap::new()),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn slot_view(&self, id: Uuid) -> SyncResult<SlotSynchronizer> {
        self.slot_views
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("Slot view with ID {id} not found")))
    }

    pub async fn conversation(&self, id: Uuid) -> SyncResult<ConversationSession> {
        self.conversations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("Conversation view with ID {id} not found")))
    }
}

/// All routes with state attached.
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health check endpoints
        .merge(routes::health::routes())
        // Availability calculator
        .merge(routes::slots::routes())
        // Conversation views
        .merge(routes::conversations::routes())
        // Push ingestion
        .merge(routes::push::routes())
        .with_state(state)
}

/// Starts the API server with the provided configuration
///
/// Sets up logging, builds the backend client and the router, and serves
/// until the listener fails.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> eyre::Result<()> {
/// let config = slotsync_api::config::ApiConfig::from_env()?;
/// slotsync_api::start_server(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_server(config: config::ApiConfig) -> Result<()> {
    // Initialize tracing for logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let backend = HttpBackend::new(&config.backend_url, config.backend_token.clone());
    info!(backend = %backend.base_url(), "using backend");
    let state = Arc::new(ApiState::new(Arc::new(backend), config.session.clone()));

    let app = build_router(state).layer(TraceLayer::new_for_http());

    // Apply CORS configuration if origins are specified
    let app = if let Some(origins) = &config.cors_origins {
        let allowed = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect::<Vec<_>>();
        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_origin(allowed)
            .allow_credentials(true);

        app.layer(cors)
    } else {
        app
    };

    // Add request timeout middleware
    let app = app.layer(
        tower::ServiceBuilder::new()
            .layer(HandleErrorLayer::new(|_: BoxError| async {
                StatusCode::REQUEST_TIMEOUT
            }))
            .timeout(Duration::from_secs(config.request_timeout)),
    );

    // Start the HTTP server
    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
