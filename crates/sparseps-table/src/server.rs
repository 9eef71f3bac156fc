//! Per-family name-to-table registries operating on archive payloads.
//!
//! The RPC dispatcher hands these servers the request's table name, raw
//! payload bytes and the training flag; they decode, call into the table,
//! and hand back response payload bytes or a domain error code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use sparseps_archive::{Archivable, BinaryArchive};
use sparseps_core::{DenseRule, ErrNo, SparseFeature, TrainingRule};
use tracing::{info, warn};

use crate::array::ArrayTable;
use crate::sparse::{SparseTable, SPARSE_SHARD_COUNT};
use crate::value::{ArrayParam, DenseValue, EmbeddingValue, SparseParam, SparseValue, SummaryValue};

/// Registry for the sparse KV table family.
pub type SparseKvTableServer = SparseTableServer<SparseValue>;
/// Registry for the sparse embedding table family.
pub type SparseEmbeddingTableServer = SparseTableServer<EmbeddingValue>;
/// Registry for the dense table family.
pub type DenseTableServer = ArrayTableServer<DenseValue>;
/// Registry for the summary table family.
pub type SummaryTableServer = ArrayTableServer<SummaryValue>;

fn decode<T: Archivable>(payload: &[u8], family: &str, what: &str) -> Result<T, ErrNo> {
    let mut ar = BinaryArchive::from_bytes(payload.to_vec());
    T::get(&mut ar).map_err(|e| {
        warn!(family, what, error = %e, "malformed request payload");
        ErrNo::UnknownError
    })
}

fn encode<T: Archivable>(value: &T) -> Vec<u8> {
    let mut ar = BinaryArchive::new();
    value.put(&mut ar);
    ar.into_bytes()
}

// Sparse assign/push payloads carry the key vector and the value vector
// back to back in one archive.
fn decode_pairs<V: Archivable>(
    payload: &[u8],
    family: &str,
    what: &str,
) -> Result<(Vec<SparseFeature>, Vec<V>), ErrNo> {
    let mut ar = BinaryArchive::from_bytes(payload.to_vec());
    let keys = ar.get_vec().map_err(|e| {
        warn!(family, what, error = %e, "malformed request payload");
        ErrNo::UnknownError
    })?;
    let values = ar.get_vec().map_err(|e| {
        warn!(family, what, error = %e, "malformed request payload");
        ErrNo::UnknownError
    })?;
    Ok((keys, values))
}

pub fn encode_pairs<V: Archivable>(keys: &[SparseFeature], values: &[V]) -> Vec<u8> {
    let mut ar = BinaryArchive::new();
    ar.put_vec(keys);
    ar.put_vec(values);
    ar.into_bytes()
}

/// Name-to-table registry for one sparse family.
pub struct SparseTableServer<V> {
    tables: RwLock<HashMap<String, Arc<SparseTable<V>>>>,
    rule: Arc<TrainingRule>,
    rank: usize,
    shard_count: usize,
}

impl<V: SparseParam> SparseTableServer<V> {
    pub fn new(rule: Arc<TrainingRule>, rank: usize) -> Self {
        Self::with_shards(rule, rank, SPARSE_SHARD_COUNT)
    }

    pub fn with_shards(rule: Arc<TrainingRule>, rank: usize, shard_count: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            rule,
            rank,
            shard_count,
        }
    }

    fn table(&self, name: &str) -> Result<Arc<SparseTable<V>>, ErrNo> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or(V::PICK_NONEXISTENT)
    }

    pub fn create(&self, name: &str) -> Result<(), ErrNo> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            info!(family = V::FAMILY, table = name, "create rejected: table exists");
            return Err(V::REGIST_EXISTING);
        }
        tables.insert(
            name.to_string(),
            Arc::new(SparseTable::with_shards(
                name,
                Arc::clone(&self.rule),
                self.rank,
                self.shard_count,
            )),
        );
        info!(family = V::FAMILY, table = name, "table created");
        Ok(())
    }

    pub fn save(&self, name: &str, path: &str) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let ret = table.save(Path::new(path));
        info!(family = V::FAMILY, table = name, path, ok = ret.is_ok(), "table saved");
        ret
    }

    pub fn assign(&self, name: &str, payload: &[u8]) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let (keys, values): (Vec<SparseFeature>, Vec<V>) =
            decode_pairs(payload, V::FAMILY, "assign")?;
        table.assign(&keys, &values)
    }

    pub fn push(&self, name: &str, payload: &[u8]) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let (keys, values): (Vec<SparseFeature>, Vec<V>) =
            decode_pairs(payload, V::FAMILY, "push")?;
        table.push(&keys, &values)
    }

    pub fn pull(&self, name: &str, payload: &[u8], is_training: bool) -> Result<Vec<u8>, ErrNo> {
        let table = self.table(name)?;
        let keys: Vec<SparseFeature> = decode(payload, V::FAMILY, "pull")?;
        let values = table.pull(&keys, is_training);
        Ok(encode(&values))
    }

    pub fn time_decay(&self, name: &str) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        table.time_decay();
        info!(family = V::FAMILY, table = name, "time decay applied");
        Ok(())
    }

    pub fn shrink(&self, name: &str) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        table.shrink();
        info!(family = V::FAMILY, table = name, "table shrunk");
        Ok(())
    }

    pub fn feature_num(&self, name: &str) -> Result<Vec<u8>, ErrNo> {
        let table = self.table(name)?;
        Ok(encode(&table.feature_num()))
    }
}

/// Name-to-table registry for one array family.
pub struct ArrayTableServer<V> {
    tables: RwLock<HashMap<String, Arc<ArrayTable<V>>>>,
    rule: Arc<DenseRule>,
}

impl<V: ArrayParam> ArrayTableServer<V> {
    pub fn new(rule: Arc<DenseRule>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            rule,
        }
    }

    fn table(&self, name: &str) -> Result<Arc<ArrayTable<V>>, ErrNo> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or(V::PICK_NONEXISTENT)
    }

    pub fn create(&self, name: &str) -> Result<(), ErrNo> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            info!(family = V::FAMILY, table = name, "create rejected: table exists");
            return Err(V::REGIST_EXISTING);
        }
        tables.insert(
            name.to_string(),
            Arc::new(ArrayTable::new(name, Arc::clone(&self.rule))),
        );
        info!(family = V::FAMILY, table = name, "table created");
        Ok(())
    }

    /// Payload: this rank's element count as one archive `u64`.
    pub fn resize(&self, name: &str, payload: &[u8]) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let size: u64 = decode(payload, V::FAMILY, "resize")?;
        table.resize(size);
        info!(family = V::FAMILY, table = name, size, "table resized");
        Ok(())
    }

    pub fn save(&self, name: &str, path: &str) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        table.save(path)
    }

    pub fn assign(&self, name: &str, payload: &[u8]) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let values: Vec<V> = decode(payload, V::FAMILY, "assign")?;
        table.assign(&values)
    }

    pub fn push(&self, name: &str, payload: &[u8]) -> Result<(), ErrNo> {
        let table = self.table(name)?;
        let values: Vec<V::Push> = decode(payload, V::FAMILY, "push")?;
        table.push(&values)
    }

    pub fn pull(&self, name: &str) -> Result<Vec<u8>, ErrNo> {
        let table = self.table(name)?;
        let values = table.pull()?;
        Ok(encode(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv_server() -> SparseKvTableServer {
        SparseTableServer::new(Arc::new(TrainingRule::default()), 0)
    }

    fn dense_server() -> DenseTableServer {
        ArrayTableServer::new(Arc::new(DenseRule::default()))
    }

    fn keys_payload(signs: &[u64]) -> Vec<u8> {
        let keys: Vec<SparseFeature> = signs.iter().map(|&s| SparseFeature::new(s, 0)).collect();
        encode(&keys)
    }

    #[test]
    fn test_create_twice_fails() {
        let s = kv_server();
        s.create("a").unwrap();
        assert_eq!(s.create("a").unwrap_err(), ErrNo::RegistExistingSparseTable);
    }

    #[test]
    fn test_ops_on_missing_table_fail() {
        let s = kv_server();
        assert_eq!(
            s.pull("nope", &keys_payload(&[1]), true).unwrap_err(),
            ErrNo::PickNonexistentSparseTable
        );
        assert_eq!(s.time_decay("nope").unwrap_err(), ErrNo::PickNonexistentSparseTable);

        let d = dense_server();
        assert_eq!(d.pull("nope").unwrap_err(), ErrNo::PickNonexistentDenseTable);
    }

    #[test]
    fn test_pull_payload_round_trip() {
        let s = kv_server();
        s.create("t").unwrap();
        let out = s.pull("t", &keys_payload(&[1, 2, 3]), true).unwrap();
        let values: Vec<SparseValue> = decode(&out, "test", "pull").unwrap();
        assert_eq!(values.len(), 3);

        let num = s.feature_num("t").unwrap();
        let n: u64 = decode(&num, "test", "feature_num").unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_push_payload_applies() {
        let s = kv_server();
        s.create("t").unwrap();
        s.pull("t", &keys_payload(&[9]), true).unwrap();

        let keys = vec![SparseFeature::new(9, 0)];
        let mut grad = SparseValue::placeholder();
        grad.show = 1.0;
        let payload = encode_pairs(&keys, &[grad]);
        s.push("t", &payload).unwrap();

        let out = s.pull("t", &keys_payload(&[9]), false).unwrap();
        let values: Vec<SparseValue> = decode(&out, "test", "pull").unwrap();
        assert_eq!(values[0].version, 1);
        assert_eq!(values[0].show, 1.0);
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let s = kv_server();
        s.create("t").unwrap();
        assert_eq!(s.push("t", &[1, 2, 3]).unwrap_err(), ErrNo::UnknownError);
    }

    #[test]
    fn test_dense_resize_assign_pull() {
        let d = dense_server();
        d.create("w").unwrap();
        d.resize("w", &encode(&4u64)).unwrap();

        let values: Vec<DenseValue> = (0..4)
            .map(|i| DenseValue {
                weight: i as f32,
                ..DenseValue::default()
            })
            .collect();
        d.assign("w", &encode(&values)).unwrap();

        let out = d.pull("w").unwrap();
        let pulled: Vec<crate::value::DensePull> = decode(&out, "test", "pull").unwrap();
        assert_eq!(pulled.len(), 4);
        assert_eq!(pulled[3].weight, 3.0);
    }
}
