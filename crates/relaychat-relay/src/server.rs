use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::RelayConfig;
use crate::data::{DirectoryDataSource, DomainDataSource, EmptyDataSource};
use crate::router;
use crate::state::RelayState;
use crate::upstream::UpstreamClient;

pub struct RelayServer {
    config: RelayConfig,
    app: Router,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let state = build_state(&config)?;
        let app = router::build_router(state, &config);
        Ok(Self { config, app })
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown).await
    }

    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            addr = %listener.local_addr()?,
            upstream = %self.config.upstream_url,
            "Relay listening"
        );

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Relay shutting down");
            })
            .await?;

        Ok(())
    }
}

pub fn build_state(config: &RelayConfig) -> Result<RelayState> {
    let upstream = UpstreamClient::new(
        &config.upstream_url,
        config.connect_timeout,
        config.request_timeout,
    )?;
    let data: Arc<dyn DomainDataSource> = match &config.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Loading domain data from directory");
            Arc::new(DirectoryDataSource::new(dir.clone()))
        }
        None => Arc::new(EmptyDataSource),
    };
    Ok(RelayState::new(upstream, data))
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
