//! Worker-side clients for the four table families.
//!
//! Each client addresses every parameter server rank through an
//! [`RpcAgent`](sparseps_rpc::RpcAgent). Control-plane operations run on
//! the chief (rank 0) only and are no-ops on other workers, which
//! synchronize through a [`Barrier`] instead. Pushes are fire-and-forget;
//! pulls and all chief calls await every rank's response and surface the
//! first failure.

mod array;
mod cluster;
mod error;
mod sparse;
mod util;
mod wire;

pub use array::{ArrayTableClient, DenseTableClient, SummaryTableClient};
pub use cluster::{Barrier, Cluster, LocalBarrier};
pub use error::{ClientError, Result};
pub use sparse::{SparseEmbeddingTableClient, SparseKvTableClient, SparseTableClient};
pub use wire::{ArrayWire, SparseWire};
