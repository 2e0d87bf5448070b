//! Admin API server.

use crate::admin_api::router::route_request;
use crate::app::MqVirtualizer;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Admin API server for rift-mq
pub struct AdminApiServer {
    addr: SocketAddr,
    app: Arc<MqVirtualizer>,
}

impl AdminApiServer {
    /// Create a new admin API server
    pub fn new(addr: SocketAddr, app: Arc<MqVirtualizer>) -> Self {
        Self { addr, app }
    }

    /// Run the admin API server until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("rift-mq Admin API listening on http://{}", listener.local_addr()?);
        serve(listener, self.app, shutdown).await
    }
}

/// Accept connections on an already bound listener
pub async fn serve(
    listener: TcpListener,
    app: Arc<MqVirtualizer>,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Admin API shutting down");
                return Ok(());
            }
            accepted = listener.accept() => accepted?,
        };
        let io = TokioIo::new(stream);
        let app = Arc::clone(&app);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let app = Arc::clone(&app);
                async move { route_request(req, app).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Admin API connection error: {}", e);
            }
        });
    }
}
