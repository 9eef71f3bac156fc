//! Request dispatcher: one `MessageType` switch over the four table
//! families, with per-operation latency accounting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sparseps_core::{ErrNo, MessageType, TrainingRule};
use sparseps_table::{
    DenseTableServer, SparseEmbeddingTableServer, SparseKvTableServer, SummaryTableServer,
};
use tracing::{info, warn};

use crate::envelope::{RpcRequest, RpcResponse};

#[derive(Default, Clone, Copy)]
struct OpStats {
    count: u64,
    total: Duration,
    max: Duration,
}

/// Outcome of dispatching one request.
pub struct Dispatched {
    pub response: RpcResponse,
    /// Set when the request was a shutdown and the server loop should exit
    /// after the response is written.
    pub shutdown: bool,
}

/// The parameter server's service state: one registry per table family plus
/// the per-operation latency log dumped at shutdown.
pub struct PsService {
    sparse: SparseKvTableServer,
    embedding: SparseEmbeddingTableServer,
    dense: DenseTableServer,
    summary: SummaryTableServer,
    perf: Mutex<HashMap<&'static str, OpStats>>,
}

impl PsService {
    pub fn new(rule: Arc<TrainingRule>, rank: usize) -> Self {
        let dense_rule = Arc::new(rule.dense.clone());
        Self {
            sparse: SparseKvTableServer::new(Arc::clone(&rule), rank),
            embedding: SparseEmbeddingTableServer::new(Arc::clone(&rule), rank),
            dense: DenseTableServer::new(Arc::clone(&dense_rule)),
            summary: SummaryTableServer::new(dense_rule),
            perf: Mutex::new(HashMap::new()),
        }
    }

    /// Routes one request to its table family and operation.
    pub fn dispatch(&self, req: &RpcRequest) -> Dispatched {
        let Some(message_type) = MessageType::from_u32(req.message_type) else {
            warn!(message_type = req.message_type, "unknown message type");
            return Dispatched {
                response: err_response(ErrNo::MessageTypeInvalid),
                shutdown: false,
            };
        };

        let start = Instant::now();
        let name = req.table_name.as_str();
        let payload = req.message.as_slice();

        use MessageType::*;
        let result = match message_type {
            SparseTableCreate => ack(self.sparse.create(name)),
            SparseTableSave => ack(save(payload).and_then(|p| self.sparse.save(name, p))),
            SparseTableAssign => ack(self.sparse.assign(name, payload)),
            SparseTablePull => self.sparse.pull(name, payload, req.is_training),
            SparseTablePush => ack(self.sparse.push(name, payload)),
            SparseTableTimeDecay => ack(self.sparse.time_decay(name)),
            SparseTableShrink => ack(self.sparse.shrink(name)),
            SparseTableFeatureNum => self.sparse.feature_num(name),

            EmbeddingTableCreate => ack(self.embedding.create(name)),
            EmbeddingTableSave => ack(save(payload).and_then(|p| self.embedding.save(name, p))),
            EmbeddingTableAssign => ack(self.embedding.assign(name, payload)),
            EmbeddingTablePull => self.embedding.pull(name, payload, req.is_training),
            EmbeddingTablePush => ack(self.embedding.push(name, payload)),
            EmbeddingTableTimeDecay => ack(self.embedding.time_decay(name)),
            EmbeddingTableShrink => ack(self.embedding.shrink(name)),
            EmbeddingTableFeatureNum => self.embedding.feature_num(name),

            DenseTableCreate => ack(self.dense.create(name)),
            DenseTableSave => ack(save(payload).and_then(|p| self.dense.save(name, p))),
            DenseTableAssign => ack(self.dense.assign(name, payload)),
            DenseTablePull => self.dense.pull(name),
            DenseTablePush => ack(self.dense.push(name, payload)),
            DenseTableResize => ack(self.dense.resize(name, payload)),

            SummaryTableCreate => ack(self.summary.create(name)),
            SummaryTableSave => ack(save(payload).and_then(|p| self.summary.save(name, p))),
            SummaryTableAssign => ack(self.summary.assign(name, payload)),
            SummaryTablePull => self.summary.pull(name),
            SummaryTablePush => ack(self.summary.push(name, payload)),
            SummaryTableResize => ack(self.summary.resize(name, payload)),

            Shutdown => {
                self.dump_perf();
                Ok(Vec::new())
            }
        };

        self.record(message_type.op_name(), start.elapsed());

        Dispatched {
            response: match result {
                Ok(message) => RpcResponse {
                    return_value: ErrNo::Success.into(),
                    message,
                },
                Err(err) => err_response(err),
            },
            shutdown: message_type == Shutdown,
        }
    }

    fn record(&self, op: &'static str, elapsed: Duration) {
        let mut perf = self.perf.lock();
        let stats = perf.entry(op).or_default();
        stats.count += 1;
        stats.total += elapsed;
        stats.max = stats.max.max(elapsed);
    }

    fn dump_perf(&self) {
        let perf = self.perf.lock();
        let mut ops: Vec<_> = perf.iter().collect();
        ops.sort_by_key(|(op, _)| *op);
        for (op, stats) in ops {
            let avg_us = stats.total.as_micros() / stats.count.max(1) as u128;
            info!(
                op,
                count = stats.count,
                avg_us,
                max_us = stats.max.as_micros(),
                "op latency"
            );
        }
    }
}

fn ack(result: Result<(), ErrNo>) -> Result<Vec<u8>, ErrNo> {
    result.map(|_| Vec::new())
}

fn save(payload: &[u8]) -> Result<&str, ErrNo> {
    std::str::from_utf8(payload).map_err(|_| {
        warn!("save path is not valid utf-8");
        ErrNo::UnknownError
    })
}

fn err_response(err: ErrNo) -> RpcResponse {
    RpcResponse {
        return_value: err.into(),
        message: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparseps_archive::BinaryArchive;

    fn service() -> PsService {
        PsService::new(Arc::new(TrainingRule::default()), 0)
    }

    fn request(message_type: MessageType, table: &str, message: Vec<u8>) -> RpcRequest {
        RpcRequest {
            message_type: message_type.into(),
            table_name: table.to_string(),
            message,
            is_training: true,
        }
    }

    #[test]
    fn test_unknown_message_type() {
        let s = service();
        let req = RpcRequest {
            message_type: 999,
            ..RpcRequest::default()
        };
        let out = s.dispatch(&req);
        assert_eq!(out.response.return_value, ErrNo::MessageTypeInvalid.into());
        assert!(!out.shutdown);
    }

    #[test]
    fn test_create_and_pull_sparse() {
        let s = service();
        let out = s.dispatch(&request(MessageType::SparseTableCreate, "t", Vec::new()));
        assert_eq!(out.response.return_value, 0);

        let mut ar = BinaryArchive::new();
        ar.put_u64(1);
        ar.put_u64(7u64);
        ar.put_u32(0u32);
        let out = s.dispatch(&request(MessageType::SparseTablePull, "t", ar.into_bytes()));
        assert_eq!(out.response.return_value, 0);
        assert!(!out.response.message.is_empty());
    }

    #[test]
    fn test_missing_table_error_travels() {
        let s = service();
        let out = s.dispatch(&request(MessageType::DenseTablePull, "nope", Vec::new()));
        assert_eq!(
            out.response.return_value,
            ErrNo::PickNonexistentDenseTable.into()
        );
    }

    #[test]
    fn test_shutdown_flags_the_loop() {
        let s = service();
        let out = s.dispatch(&request(MessageType::Shutdown, "", Vec::new()));
        assert_eq!(out.response.return_value, 0);
        assert!(out.shutdown);
    }

    #[test]
    fn test_save_path_must_be_utf8() {
        let s = service();
        s.dispatch(&request(MessageType::EmbeddingTableCreate, "e", Vec::new()));
        let out = s.dispatch(&request(
            MessageType::EmbeddingTableSave,
            "e",
            vec![0xff, 0xfe],
        ));
        assert_eq!(out.response.return_value, ErrNo::UnknownError.into());
    }
}
