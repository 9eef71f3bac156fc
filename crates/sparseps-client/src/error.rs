use sparseps_archive::ArchiveError;
use sparseps_core::ErrNo;
use sparseps_rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("server returned: {0}")]
    Server(ErrNo),

    #[error("failed to decode response payload: {0}")]
    Archive(#[from] ArchiveError),

    #[error("expected {expected} values, got {got}")]
    SizeMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, ClientError>;
