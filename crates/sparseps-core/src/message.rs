//! RPC operation ids and return codes.

use thiserror::Error;

/// Operation selector carried in every RPC request.
///
/// The numeric values are the wire protocol; they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    SparseTableCreate = 1,
    SparseTableSave = 2,
    SparseTableAssign = 3,
    SparseTablePull = 4,
    SparseTablePush = 5,
    SparseTableTimeDecay = 6,
    SparseTableShrink = 7,
    SparseTableFeatureNum = 8,
    EmbeddingTableCreate = 9,
    EmbeddingTableSave = 10,
    EmbeddingTableAssign = 11,
    EmbeddingTablePull = 12,
    EmbeddingTablePush = 13,
    EmbeddingTableTimeDecay = 14,
    EmbeddingTableShrink = 15,
    EmbeddingTableFeatureNum = 16,
    DenseTableCreate = 17,
    DenseTableSave = 18,
    DenseTableAssign = 19,
    DenseTablePull = 20,
    DenseTablePush = 21,
    DenseTableResize = 22,
    SummaryTableCreate = 23,
    SummaryTableSave = 24,
    SummaryTableAssign = 25,
    SummaryTablePull = 26,
    SummaryTablePush = 27,
    SummaryTableResize = 28,
    Shutdown = 29,
}

impl MessageType {
    /// Decodes a wire value; `None` for anything outside the protocol.
    pub fn from_u32(v: u32) -> Option<Self> {
        use MessageType::*;
        Some(match v {
            1 => SparseTableCreate,
            2 => SparseTableSave,
            3 => SparseTableAssign,
            4 => SparseTablePull,
            5 => SparseTablePush,
            6 => SparseTableTimeDecay,
            7 => SparseTableShrink,
            8 => SparseTableFeatureNum,
            9 => EmbeddingTableCreate,
            10 => EmbeddingTableSave,
            11 => EmbeddingTableAssign,
            12 => EmbeddingTablePull,
            13 => EmbeddingTablePush,
            14 => EmbeddingTableTimeDecay,
            15 => EmbeddingTableShrink,
            16 => EmbeddingTableFeatureNum,
            17 => DenseTableCreate,
            18 => DenseTableSave,
            19 => DenseTableAssign,
            20 => DenseTablePull,
            21 => DenseTablePush,
            22 => DenseTableResize,
            23 => SummaryTableCreate,
            24 => SummaryTableSave,
            25 => SummaryTableAssign,
            26 => SummaryTablePull,
            27 => SummaryTablePush,
            28 => SummaryTableResize,
            29 => Shutdown,
            _ => return None,
        })
    }

    /// The dispatcher's name for this operation, used in the performance log.
    pub fn op_name(self) -> &'static str {
        use MessageType::*;
        match self {
            SparseTableCreate => "sparse_table_create",
            SparseTableSave => "sparse_table_save",
            SparseTableAssign => "sparse_table_assign",
            SparseTablePull => "sparse_table_pull",
            SparseTablePush => "sparse_table_push",
            SparseTableTimeDecay => "sparse_table_time_decay",
            SparseTableShrink => "sparse_table_shrink",
            SparseTableFeatureNum => "sparse_table_feature_num",
            EmbeddingTableCreate => "embedding_table_create",
            EmbeddingTableSave => "embedding_table_save",
            EmbeddingTableAssign => "embedding_table_assign",
            EmbeddingTablePull => "embedding_table_pull",
            EmbeddingTablePush => "embedding_table_push",
            EmbeddingTableTimeDecay => "embedding_table_time_decay",
            EmbeddingTableShrink => "embedding_table_shrink",
            EmbeddingTableFeatureNum => "embedding_table_feature_num",
            DenseTableCreate => "dense_table_create",
            DenseTableSave => "dense_table_save",
            DenseTableAssign => "dense_table_assign",
            DenseTablePull => "dense_table_pull",
            DenseTablePush => "dense_table_push",
            DenseTableResize => "dense_table_resize",
            SummaryTableCreate => "summary_table_create",
            SummaryTableSave => "summary_table_save",
            SummaryTableAssign => "summary_table_assign",
            SummaryTablePull => "summary_table_pull",
            SummaryTablePush => "summary_table_push",
            SummaryTableResize => "summary_table_resize",
            Shutdown => "shutdown",
        }
    }
}

impl From<MessageType> for u32 {
    fn from(t: MessageType) -> u32 {
        t as u32
    }
}

/// Domain return codes carried in the RPC response `return_value`.
///
/// Doubles as a propagatable error so table and client code can use `?`;
/// [`ErrNo::Success`] never appears on an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(i32)]
pub enum ErrNo {
    #[error("rpc call finished successfully")]
    Success = 0,
    #[error("rpc call failed")]
    RpcRemoteCallFailed = 1,
    #[error("can not allocate memory")]
    CanNotAllocateMemory = 2,
    #[error("attempt to access array with an index out of bound")]
    ArrayIndexOutOfBound = 3,
    #[error("invalid RPC request message type")]
    MessageTypeInvalid = 4,
    #[error("attempt to register an existing sparse table")]
    RegistExistingSparseTable = 5,
    #[error("attempt to pick a sparse table that does not exist")]
    PickNonexistentSparseTable = 6,
    #[error("attempt to register an existing dense table")]
    RegistExistingDenseTable = 7,
    #[error("attempt to pick a dense table that does not exist")]
    PickNonexistentDenseTable = 8,
    #[error("attempt to register an existing summary table")]
    RegistExistingSummaryTable = 9,
    #[error("attempt to pick a summary table that does not exist")]
    PickNonexistentSummaryTable = 10,
    #[error("attempt to update a sparse feature that does not exist")]
    UpdateNonexistentSparseFeature = 11,
    #[error("attempt to assign a sparse feature that does not exist")]
    AssignNonexistentSparseFeature = 12,
    #[error("unknown optimizer")]
    UnknownOptimizer = 13,
    #[error("rpc call finished with unknown error")]
    UnknownError = 14,
}

impl ErrNo {
    /// Decodes a wire return value, mapping unlisted codes to `UnknownError`.
    pub fn from_i32(v: i32) -> Self {
        use ErrNo::*;
        match v {
            0 => Success,
            1 => RpcRemoteCallFailed,
            2 => CanNotAllocateMemory,
            3 => ArrayIndexOutOfBound,
            4 => MessageTypeInvalid,
            5 => RegistExistingSparseTable,
            6 => PickNonexistentSparseTable,
            7 => RegistExistingDenseTable,
            8 => PickNonexistentDenseTable,
            9 => RegistExistingSummaryTable,
            10 => PickNonexistentSummaryTable,
            11 => UpdateNonexistentSparseFeature,
            12 => AssignNonexistentSparseFeature,
            13 => UnknownOptimizer,
            _ => UnknownError,
        }
    }

    pub fn is_success(self) -> bool {
        self == ErrNo::Success
    }
}

impl From<ErrNo> for i32 {
    fn from(e: ErrNo) -> i32 {
        e as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_values() {
        assert_eq!(MessageType::SparseTableCreate as u32, 1);
        assert_eq!(MessageType::EmbeddingTableCreate as u32, 9);
        assert_eq!(MessageType::DenseTableCreate as u32, 17);
        assert_eq!(MessageType::SummaryTableCreate as u32, 23);
        assert_eq!(MessageType::Shutdown as u32, 29);
    }

    #[test]
    fn test_message_type_round_trip() {
        for v in 1..=29u32 {
            let t = MessageType::from_u32(v).unwrap();
            assert_eq!(u32::from(t), v);
        }
        assert!(MessageType::from_u32(0).is_none());
        assert!(MessageType::from_u32(30).is_none());
    }

    #[test]
    fn test_errno_round_trip() {
        for v in 0..=14i32 {
            assert_eq!(i32::from(ErrNo::from_i32(v)), v);
        }
        assert_eq!(ErrNo::from_i32(-1), ErrNo::UnknownError);
        assert_eq!(ErrNo::from_i32(99), ErrNo::UnknownError);
    }
}
