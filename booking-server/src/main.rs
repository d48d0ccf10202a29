use std::error::Error;
use std::net::SocketAddr;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use booking_server::config::{ConfigHandle, reload_interval};
use booking_server::payment::{MockGateway, PaymentBackend, StripeConfig, StripeGateway};
use booking_server::store::MemoryStore;
use booking_server::web::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("BOOKING_CONFIG").unwrap_or_else(|_| "booking.json".into());
    let config = ConfigHandle::load(&config_path).await?;
    let current = config.current().await;
    info!(
        path = %config_path,
        countries = current.countries.len(),
        "loaded booking config"
    );

    let store = match std::env::var("BOOKING_FLEET") {
        Ok(path) => {
            let store = MemoryStore::load(&path, Utc::now()).await?;
            info!(
                path = %path,
                connections = store.connection_count().await,
                "loaded fleet"
            );
            store
        }
        Err(_) => {
            warn!("BOOKING_FLEET not set; starting with no connections");
            MemoryStore::new()
        }
    };

    let payments = match std::env::var("STRIPE_SECRET_KEY") {
        Ok(key) => {
            let stripe = StripeConfig::new(key, current.payment.return_base.clone());
            PaymentBackend::Stripe(StripeGateway::new(stripe)?)
        }
        Err(_) => {
            warn!("STRIPE_SECRET_KEY not set; payments go to the in-process mock");
            PaymentBackend::Mock(MockGateway::new())
        }
    };
    info!(backend = payments.name(), "payment gateway ready");

    // Spawn background task to reload the config
    let reload_every = reload_interval(std::env::var("CONFIG_RELOAD_SECS").ok().as_deref())?;
    let config_refresh = config.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reload_every);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            match config_refresh.reload().await {
                Ok(config) => info!(countries = config.countries.len(), "reloaded booking config"),
                Err(e) => error!(error = %e, "failed to reload booking config, keeping previous"),
            }
        }
    });

    let state = AppState::new(config, store, payments);
    let app = create_router(state);

    let addr: SocketAddr = std::env::var("BOOKING_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".into())
        .parse()?;
    info!(%addr, "booking server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
