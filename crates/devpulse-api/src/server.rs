use crate::{create_router, AppState};
use devpulse_core::{PulseConfig, PulseError, Result};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub async fn new(addr: SocketAddr, config: &PulseConfig) -> Result<Self> {
        let state = AppState::from_config(config).await?;
        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| PulseError::Internal(format!("failed to bind {}: {}", self.addr, e)))?;

        info!("DevPulse API listening on http://{}", self.addr);
        info!("  POST /generate-insights - Generate one rubric or all of them");
        info!("  GET  /projects/{{project_id}}/insights - Active insights");
        info!("  GET  /health - Health check");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PulseError::Internal(format!("server error: {}", e)))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
