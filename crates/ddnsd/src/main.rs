// # ddnsd - DNSPod DDNS Daemon
//
// Thin integration layer: reads the configuration document, wires the
// registered components together and hands control to the engine. All
// reconciliation logic lives in ddns-core.
//
// ## Configuration
//
// The record, credentials and address source come from a JSON document
// (`ddns.json` by default). When the document does not exist a template is
// written in its place and the daemon exits so the credentials can be filled in.
//
// ```json
// {
//   "provider": {"type": "dnspod", "id": "12345", "token": "0123456789abcdef"},
//   "record": {"domain": "example.com", "subdomain": "home", "ttl": 600},
//   "ip_source": {"url": "https://ip.example.net/json"},
//   "engine": {"interval_secs": 300}
// }
// ```
//
// Environment variables:
// - `DDNS_CONFIG`: path to the document
// - `DDNS_INTERVAL_SECS`: overrides the reconcile interval (0 = one pass, then exit)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error
// - `DDNS_MODE=dry-run`: look records up but never create or modify them
//
// ## Exit codes
//
// - 0: clean shutdown or a successful single pass
// - 1: configuration error (missing document, placeholder credentials, bad values)
// - 2: runtime error (a failed single pass, or startup failure)

mod settings;

use anyhow::Result;
use ddns_core::{DdnsConfig, DdnsEngine, EngineEvent, ProviderRegistry};
use settings::{Loaded, Settings, load_config};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl DdnsExitCode {
    /// Map the engine's final result to a process exit code
    fn from_result(result: &ddns_core::Result<()>) -> Self {
        match result {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) if e.is_fatal() => DdnsExitCode::ConfigError,
            Err(_) => DdnsExitCode::RuntimeError,
        }
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validated while loading settings
    let log_level = settings.level().unwrap_or(tracing::Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");

    let mut config = match load_config(&settings.config_path) {
        Ok(Loaded::Ready(config)) => config,
        Ok(Loaded::TemplateWritten(path)) => {
            error!(
                "No configuration found. A template was written to {}; \
                fill in the DNSPod credentials and the record, then start again",
                path.display()
            );
            return DdnsExitCode::ConfigError.into();
        }
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };
    settings.apply(&mut config);

    if let Err(e) = config.validate() {
        error!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run_daemon(config));
    if let Err(e) = &result {
        error!("Daemon error: {}", e);
    }
    DdnsExitCode::from_result(&result).into()
}

/// Build the registry with every compiled-in component
fn build_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "dnspod")]
    ddns_provider_dnspod::register(&registry);

    ddns_ip_http::register(&registry);

    debug!(
        providers = ?registry.list_providers(),
        ip_sources = ?registry.list_ip_sources(),
        "Registered components"
    );
    registry
}

/// Run the daemon
async fn run_daemon(config: DdnsConfig) -> ddns_core::Result<()> {
    let registry = build_registry();

    let provider = Arc::from(registry.create_provider(&config.provider)?);
    let ip_source = Arc::from(registry.create_ip_source(&config.ip_source)?);

    let (engine, events) = DdnsEngine::new(ip_source, provider, config)?;
    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                // Keep the sender alive; dropping it would stop the engine
                error!("Shutdown error: {}", e);
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await
}

/// Drain engine events so the bounded channel never fills
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "engine event");
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
