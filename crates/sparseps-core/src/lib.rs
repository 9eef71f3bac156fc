//! Shared vocabulary of the parameter server.
//!
//! Everything both sides of the wire must agree on lives here: the RPC
//! operation and return-code enums ([`MessageType`], [`ErrNo`]), the
//! [`TrainingRule`] configuration tree the update math reads, the sparse
//! feature key type, and the partition arithmetic that routes keys to shards
//! and index ranges to server ranks.

mod feature;
mod message;
pub mod routing;
mod rules;

pub use feature::{SparseFeature, SparseKey, SparseSlot};
pub use message::{ErrNo, MessageType};
pub use rules::{
    CvmRule, DenseRule, EmbeddingRule, FmRule, LrRule, MfRule, SparseRule, TrainingRule, WideRule,
};
