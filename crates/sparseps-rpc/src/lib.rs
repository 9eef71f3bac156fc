//! RPC layer: a length-prefixed protobuf envelope over TCP, the service
//! dispatcher that routes message types to table families, and the client
//! agent that addresses every rank.

mod agent;
mod envelope;
mod error;
mod server;
mod service;

pub use agent::RpcAgent;
pub use envelope::{read_frame, write_frame, RpcRequest, RpcResponse, MAX_FRAME_LEN};
pub use error::{Result, RpcError};
pub use server::PsServer;
pub use service::{Dispatched, PsService};
