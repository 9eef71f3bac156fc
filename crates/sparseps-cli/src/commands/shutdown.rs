//! Stops a running parameter server rank.

use anyhow::{bail, Context, Result};
use clap::Args;
use sparseps_core::{ErrNo, MessageType};
use sparseps_rpc::{RpcAgent, RpcRequest};
use tracing::info;

/// Send a shutdown request to a running parameter server.
#[derive(Args, Debug, Clone)]
pub struct ShutdownCommand {
    /// Address of the server to stop
    #[arg(long, env = "SPARSEPS_ADDR")]
    pub addr: String,
}

impl ShutdownCommand {
    pub async fn run(&self) -> Result<()> {
        let agent = RpcAgent::new(vec![self.addr.clone()]);
        let resp = agent
            .send_to_one(
                0,
                &RpcRequest {
                    message_type: MessageType::Shutdown.into(),
                    table_name: String::new(),
                    message: Vec::new(),
                    is_training: false,
                },
            )
            .await
            .with_context(|| format!("failed to reach {}", self.addr))?;

        if resp.return_value != 0 {
            bail!("shutdown refused: {}", ErrNo::from_i32(resp.return_value));
        }
        info!(addr = %self.addr, "server acknowledged shutdown");
        Ok(())
    }
}
