//! The sharded table engine.
//!
//! Four table families share two storage shapes. The sparse families
//! ([`SparseValue`], [`EmbeddingValue`]) live in hash-map shards keyed by
//! feature sign and grow on demand during training pulls; the array families
//! ([`DenseValue`], [`SummaryValue`]) live in contiguous index-range shards
//! sized once by `resize`. Every shard is guarded by a single
//! `parking_lot::RwLock`; a lock is held only for the in-place codec update,
//! never across I/O.
//!
//! Table servers wrap a name-to-table registry per family and translate
//! archive-encoded RPC payloads into table calls, returning domain
//! [`ErrNo`](sparseps_core::ErrNo) codes for the dispatcher to put on the
//! wire.

mod array;
mod server;
mod sparse;
mod value;

pub use array::{ArrayTable, ARRAY_SHARD_COUNT};
pub use server::{
    encode_pairs, ArrayTableServer, DenseTableServer, SparseEmbeddingTableServer,
    SparseKvTableServer, SparseTableServer, SummaryTableServer,
};
pub use sparse::{SparseTable, SPARSE_SHARD_COUNT};
pub use value::{
    ArrayParam, DensePull, DensePush, DenseValue, EmbeddingValue, SparseParam, SparseValue,
    SummaryValue,
};
