//! Client-side transport: one agent addressing every rank of the cluster.

use futures::future::try_join_all;
use tokio::net::TcpStream;
use tracing::error;

use crate::envelope::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::error::{Result, RpcError};

/// Addresses every parameter server rank. Connections are opened per call;
/// a failed call surfaces as an error and is never retried here.
#[derive(Clone)]
pub struct RpcAgent {
    addrs: Vec<String>,
}

impl RpcAgent {
    pub fn new(addrs: Vec<String>) -> Self {
        Self { addrs }
    }

    pub fn world_size(&self) -> usize {
        self.addrs.len()
    }

    /// Sends one request to one rank and waits for its response.
    pub async fn send_to_one(&self, rank: usize, req: &RpcRequest) -> Result<RpcResponse> {
        let addr = self.addrs.get(rank).ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("rank {rank} out of {} ranks", self.addrs.len()),
            ))
        })?;
        let mut stream = TcpStream::connect(addr).await?;
        write_frame(&mut stream, req).await?;
        read_frame(&mut stream)
            .await?
            .ok_or(RpcError::UnexpectedEof)
    }

    /// Sends the same request to every rank, awaiting all responses in rank
    /// order. The first transport failure fails the whole call.
    pub async fn send_to_all(&self, req: &RpcRequest) -> Result<Vec<RpcResponse>> {
        try_join_all((0..self.addrs.len()).map(|rank| self.send_to_one(rank, req))).await
    }

    /// Sends per-rank requests, awaiting all responses in rank order.
    pub async fn send_each(&self, reqs: Vec<RpcRequest>) -> Result<Vec<RpcResponse>> {
        try_join_all(
            reqs.into_iter()
                .enumerate()
                .map(|(rank, req)| async move { self.send_to_one(rank, &req).await }),
        )
        .await
    }

    /// Fire-and-forget variant of [`send_each`](Self::send_each): responses
    /// are awaited off-task and only logged on failure. A failed detached
    /// push is a dropped gradient, so failures log at error level.
    pub fn send_each_detached(&self, reqs: Vec<RpcRequest>) {
        for (rank, req) in reqs.into_iter().enumerate() {
            let agent = self.clone();
            tokio::spawn(async move {
                match agent.send_to_one(rank, &req).await {
                    Ok(resp) if resp.return_value != 0 => {
                        error!(rank, return_value = resp.return_value, "detached call failed");
                    }
                    Ok(_) => {}
                    Err(e) => error!(rank, error = %e, "detached call transport error"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::PsServer;
    use crate::service::PsService;
    use sparseps_core::{MessageType, TrainingRule};
    use std::sync::Arc;

    async fn spawn_server() -> String {
        let server = PsServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();
        let service = Arc::new(PsService::new(Arc::new(TrainingRule::default()), 0));
        tokio::spawn(server.run(service));
        addr
    }

    #[tokio::test]
    async fn test_send_to_all_ranks() {
        let addrs = vec![spawn_server().await, spawn_server().await];
        let agent = RpcAgent::new(addrs);
        assert_eq!(agent.world_size(), 2);

        let responses = agent
            .send_to_all(&RpcRequest {
                message_type: MessageType::SummaryTableCreate.into(),
                table_name: "s".to_string(),
                message: Vec::new(),
                is_training: false,
            })
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.return_value == 0));
    }

    #[tokio::test]
    async fn test_detached_failures_do_not_disturb_later_calls() {
        let addrs = vec![spawn_server().await];
        let agent = RpcAgent::new(addrs);

        // Both detached failure branches: a non-zero return (missing table)
        // and a transport error (unroutable rank list on a second agent).
        agent.send_each_detached(vec![RpcRequest {
            message_type: MessageType::SparseTablePush.into(),
            table_name: "nope".to_string(),
            message: Vec::new(),
            is_training: true,
        }]);
        let dead = RpcAgent::new(vec!["127.0.0.1:1".to_string()]);
        dead.send_each_detached(vec![RpcRequest::default()]);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let resp = agent
            .send_to_one(
                0,
                &RpcRequest {
                    message_type: MessageType::SummaryTableCreate.into(),
                    table_name: "s".to_string(),
                    message: Vec::new(),
                    is_training: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.return_value, 0);
    }

    #[tokio::test]
    async fn test_rank_out_of_range() {
        let agent = RpcAgent::new(vec!["127.0.0.1:1".to_string()]);
        let err = agent
            .send_to_one(5, &RpcRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Io(_)));
    }
}
