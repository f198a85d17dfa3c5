use std::sync::Arc;

use anyhow::Context;
use coffeeshop::{
    app::{self, AppState},
    drinks::DrinkStore,
    observability, Config, TokenVerifier,
};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    observability::init_tracing(&config.log_level, &config.log_format);

    let auth = config.auth()?;
    info!(
        domain = auth.domain(),
        issuer = %auth.issuer(),
        audience = auth.audience(),
        jwks_url = %auth.jwks_url(),
        "starting coffeeshop"
    );

    let verifier = TokenVerifier::from_config(&auth).context("failed to set up token verifier")?;
    let store = Arc::new(DrinkStore::default());
    if config.seed_drinks {
        store.seed().await;
    }

    let router = app::router(AppState {
        store,
        verifier: Arc::new(verifier),
    });

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "listening for connections");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("coffeeshop stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
