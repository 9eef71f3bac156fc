//! TCP server loop: accept connections, dispatch frames, stop on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::envelope::{read_frame, write_frame, RpcRequest};
use crate::error::Result;
use crate::service::PsService;

/// One rank's RPC endpoint. Binding and serving are split so callers can
/// learn the bound port before the accept loop starts.
pub struct PsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl PsServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "parameter server listening");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until a shutdown request is dispatched. In-flight connections
    /// drain on their own; new ones are no longer accepted.
    pub async fn run(self, service: Arc<PsService>) -> Result<()> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "connection accepted");
                    let service = Arc::clone(&service);
                    let shutdown_tx = Arc::clone(&shutdown_tx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service, shutdown_tx).await {
                            warn!(%peer, error = %e, "connection failed");
                        }
                    });
                }
                _ = shutdown_rx.changed() => {
                    info!(local_addr = %self.local_addr, "parameter server stopping");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    service: Arc<PsService>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) -> Result<()> {
    while let Some(request) = read_frame::<_, RpcRequest>(&mut stream).await? {
        let dispatched = service.dispatch(&request);
        write_frame(&mut stream, &dispatched.response).await?;
        if dispatched.shutdown {
            let _ = shutdown_tx.send(true);
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RpcResponse;
    use sparseps_core::{ErrNo, MessageType, TrainingRule};

    async fn call(addr: SocketAddr, req: &RpcRequest) -> RpcResponse {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, req).await.unwrap();
        read_frame(&mut stream).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_serve_dispatch_and_shutdown() {
        let server = PsServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let service = Arc::new(PsService::new(Arc::new(TrainingRule::default()), 0));
        let handle = tokio::spawn(server.run(service));

        let resp = call(
            addr,
            &RpcRequest {
                message_type: MessageType::DenseTableCreate.into(),
                table_name: "w".to_string(),
                message: Vec::new(),
                is_training: false,
            },
        )
        .await;
        assert_eq!(resp.return_value, 0);

        // Same create again on a new connection hits the same registry.
        let resp = call(
            addr,
            &RpcRequest {
                message_type: MessageType::DenseTableCreate.into(),
                table_name: "w".to_string(),
                message: Vec::new(),
                is_training: false,
            },
        )
        .await;
        assert_eq!(resp.return_value, ErrNo::RegistExistingDenseTable.into());

        let resp = call(
            addr,
            &RpcRequest {
                message_type: MessageType::Shutdown.into(),
                table_name: String::new(),
                message: Vec::new(),
                is_training: false,
            },
        )
        .await;
        assert_eq!(resp.return_value, 0);

        handle.await.unwrap().unwrap();
    }
}
