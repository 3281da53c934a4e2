use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_shared::ApiKey;
use hrp_core::config::{max_display_from_env_value, notification_options_from_env_values};
use hrp_core::constants::DEFAULT_REST_ADDR;
use hrp_core::{CoreConfig, HighRiskPatientStore, TracingSink};

/// Main entry point for the high-risk patient monitor
///
/// Resolves configuration once, subscribes the notification engine and the filter view to an
/// in-memory store, and serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `HRP_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HRP_MAX_DISPLAY`: Default bound on listed patients (default: 50)
/// - `HRP_NOTIFICATIONS_ENABLED`: Run the notification engine (default: true)
/// - `HRP_NOTIFY_NEW_PATIENTS`: Alert on new high-risk patients (default: true)
/// - `HRP_NOTIFY_STATUS_CHANGES`: Confirm InProgress/Resolved transitions (default: false)
/// - `API_KEY`: API key required on mutating endpoints
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hrp_run=info".parse()?)
                .add_directive("hrp_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("HRP_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let max_display = max_display_from_env_value(std::env::var("HRP_MAX_DISPLAY").ok())?;
    let notification_options = notification_options_from_env_values(
        std::env::var("HRP_NOTIFICATIONS_ENABLED").ok(),
        std::env::var("HRP_NOTIFY_NEW_PATIENTS").ok(),
        std::env::var("HRP_NOTIFY_STATUS_CHANGES").ok(),
    )?;
    let cfg = Arc::new(CoreConfig::new(max_display, notification_options)?);

    let api_key = ApiKey::new(std::env::var("API_KEY").ok());
    if !api_key.is_configured() {
        tracing::warn!("API_KEY is not set; mutating endpoints will refuse all requests");
    }

    let store = HighRiskPatientStore::new();
    let state = AppState::new(cfg, store, api_key, TracingSink)?;
    let app = api_rest::router(state);

    tracing::info!("++ Starting high-risk patient monitor REST on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down");
        })
        .await?;

    Ok(())
}
