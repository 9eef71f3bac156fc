//! Message-type bindings tying each value family to its wire operations.

use sparseps_core::MessageType;
use sparseps_table::{ArrayParam, DenseValue, EmbeddingValue, SparseParam, SparseValue, SummaryValue};

/// Wire operations of one sparse family.
pub trait SparseWire: SparseParam {
    const CREATE: MessageType;
    const SAVE: MessageType;
    const ASSIGN: MessageType;
    const PULL: MessageType;
    const PUSH: MessageType;
    const TIME_DECAY: MessageType;
    const SHRINK: MessageType;
    const FEATURE_NUM: MessageType;
}

impl SparseWire for SparseValue {
    const CREATE: MessageType = MessageType::SparseTableCreate;
    const SAVE: MessageType = MessageType::SparseTableSave;
    const ASSIGN: MessageType = MessageType::SparseTableAssign;
    const PULL: MessageType = MessageType::SparseTablePull;
    const PUSH: MessageType = MessageType::SparseTablePush;
    const TIME_DECAY: MessageType = MessageType::SparseTableTimeDecay;
    const SHRINK: MessageType = MessageType::SparseTableShrink;
    const FEATURE_NUM: MessageType = MessageType::SparseTableFeatureNum;
}

impl SparseWire for EmbeddingValue {
    const CREATE: MessageType = MessageType::EmbeddingTableCreate;
    const SAVE: MessageType = MessageType::EmbeddingTableSave;
    const ASSIGN: MessageType = MessageType::EmbeddingTableAssign;
    const PULL: MessageType = MessageType::EmbeddingTablePull;
    const PUSH: MessageType = MessageType::EmbeddingTablePush;
    const TIME_DECAY: MessageType = MessageType::EmbeddingTableTimeDecay;
    const SHRINK: MessageType = MessageType::EmbeddingTableShrink;
    const FEATURE_NUM: MessageType = MessageType::EmbeddingTableFeatureNum;
}

/// Wire operations of one array family.
pub trait ArrayWire: ArrayParam {
    const CREATE: MessageType;
    const SAVE: MessageType;
    const ASSIGN: MessageType;
    const PULL: MessageType;
    const PUSH: MessageType;
    const RESIZE: MessageType;
}

impl ArrayWire for DenseValue {
    const CREATE: MessageType = MessageType::DenseTableCreate;
    const SAVE: MessageType = MessageType::DenseTableSave;
    const ASSIGN: MessageType = MessageType::DenseTableAssign;
    const PULL: MessageType = MessageType::DenseTablePull;
    const PUSH: MessageType = MessageType::DenseTablePush;
    const RESIZE: MessageType = MessageType::DenseTableResize;
}

impl ArrayWire for SummaryValue {
    const CREATE: MessageType = MessageType::SummaryTableCreate;
    const SAVE: MessageType = MessageType::SummaryTableSave;
    const ASSIGN: MessageType = MessageType::SummaryTableAssign;
    const PULL: MessageType = MessageType::SummaryTablePull;
    const PUSH: MessageType = MessageType::SummaryTablePush;
    const RESIZE: MessageType = MessageType::SummaryTableResize;
}
