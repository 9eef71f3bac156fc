use thiserror::Error;

/// Transport-level RPC failures. Domain failures travel inside the response
/// envelope as `ErrNo` codes and never become an `RpcError`.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode envelope: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("connection closed before a full frame arrived")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, RpcError>;
