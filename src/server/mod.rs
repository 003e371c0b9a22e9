use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tracing::info;

/// Speaks the service protocol over one accepted connection
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    async fn serve(&self, input: OwnedReadHalf, output: OwnedWriteHalf) -> Result<()>;
}

/// Waits for the single client of a session
///
/// Exactly one connection is accepted; afterwards the listener is dropped.
pub struct SessionListener {
    listener: TcpListener,
}

impl SessionListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accepts one connection and runs `handler` on it in a background task
    pub async fn accept_one<H: SessionHandler>(self, handler: Arc<H>) -> Result<JoinHandle<Result<()>>> {
        info!("Waiting for connection on {}", self.local_addr()?);
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        info!("Got connection from {}", peer);

        let (input, output) = stream.into_split();
        Ok(tokio::spawn(async move { handler.serve(input, output).await }))
    }
}

/// Listens on `0.0.0.0:port` and hands the first connection to `handler`
///
/// This is a library hook for the embedding service, which owns the
/// protocol spoken over the connection. The `jdk-type-index` binary only
/// indexes and never listens.
pub async fn listen<H: SessionHandler>(port: u16, handler: Arc<H>) -> Result<JoinHandle<Result<()>>> {
    let listener = SessionListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    listener.accept_one(handler).await
}
