//! Application struct that encapsulates server assembly and serving logic.

use crate::cli::RunArgs;
use kite_core::config::Config;
use kite_core::lifecycle::signal::SignalHandler;
use kite_core::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;

pub struct Application {
    addr: String,
    app_router: axum::Router,
    shutdown_timeout: u64,
}

impl Application {
    /// Build the application from CLI args: load config, resolve the
    /// credential, build the registry and router.
    pub fn build(args: &RunArgs) -> anyhow::Result<Self> {
        let mut config = Config::load(&args.config).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load config from '{}': {e}, using defaults",
                args.config
            );
            Config::default()
        });

        // CLI overrides
        if let Some(ref host) = args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(timeout) = args.shutdown_timeout {
            config.shutdown_timeout = timeout;
        }

        let metrics = Arc::new(Metrics::new());
        let providers = kite_provider::build_providers(&config, metrics.clone())?;

        tracing::info!(
            models = ?providers.registry.model_names(),
            default = %providers.registry.default_model(),
            gemini_key = providers.registry.credential_present(),
            "Loaded model registry"
        );

        let addr = format!("{}:{}", config.host, config.port);
        let shutdown_timeout = config.shutdown_timeout;
        let state = kite_server::AppState::new(Arc::new(config), providers, metrics);
        let app_router = kite_server::build_router(state);

        Ok(Self {
            addr,
            app_router,
            shutdown_timeout,
        })
    }

    /// Serve HTTP until SIGINT/SIGTERM, then drain in-flight requests for at
    /// most `shutdown_timeout` seconds.
    pub async fn serve(self) -> anyhow::Result<()> {
        let Self {
            addr,
            app_router,
            shutdown_timeout,
        } = self;

        let (signal_handler, mut shutdown_rx) = SignalHandler::new();
        tokio::spawn(signal_handler.run());

        tracing::info!("Starting HTTP server on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let mut drain_rx = shutdown_rx.clone();
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|v| *v).await;
        };
        let server = async move {
            axum::serve(listener, app_router)
                .with_graceful_shutdown(shutdown)
                .await
        };

        tokio::select! {
            result = server => result?,
            _ = async {
                let _ = drain_rx.wait_for(|v| *v).await;
                tokio::time::sleep(Duration::from_secs(shutdown_timeout)).await;
            } => {
                tracing::warn!(
                    "In-flight requests still running after {shutdown_timeout}s, forcing shutdown"
                );
            }
        }

        tracing::info!("Server shut down.");
        Ok(())
    }
}
