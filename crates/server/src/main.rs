//! `wifi-login-server`: serves the captive portal pages and the account API
//! proxy for every organization found in the build artifacts.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::borrow::Cow;
use std::sync::Arc;

use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wifi_login_server::config::PortalConfig;
use wifi_login_server::registry::OrganizationRegistry;
use wifi_login_server::services::RadiusClient;
use wifi_login_server::state::AppState;

const DEFAULT_LOG_FILTER: &str = "wifi_login_server=info,tower_http=debug";

#[tokio::main]
async fn main() {
    let config = PortalConfig::from_env().expect("Invalid portal configuration");

    // Sentry has to be up before the subscriber so the tracing layer binds to it.
    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config.sentry_environment.clone().map(Cow::Owned),
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    });
    init_tracing();

    let registry = OrganizationRegistry::from_artifacts(&config.artifacts_dir).unwrap_or_else(|e| {
        panic!(
            "cannot load {} (run `wifi-login build` first): {e}",
            config.artifacts_dir.display()
        )
    });
    let accounts = RadiusClient::new(&config.radius).expect("Cannot build account API client");
    tracing::info!(
        organizations = registry.catalog().len(),
        radius = %config.radius.host,
        "Organizations loaded"
    );

    let addr = config.socket_addr();
    let app = wifi_login_server::app(AppState::new(config, registry, Arc::new(accounts)))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot bind {addr}: {e}"));
    tracing::info!(%addr, "Portal listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Portal server stopped unexpectedly");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let sentry_layer = sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Cannot install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Ctrl+C handler failed");
            }
        }
        () = terminate => {}
    }
    tracing::info!("Shutting down");
}
