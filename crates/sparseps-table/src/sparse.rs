//! Hash-map shards and tables for the two sparse families.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use sparseps_core::{routing, ErrNo, SparseFeature, SparseKey, TrainingRule};
use tracing::warn;

use crate::value::SparseParam;

/// Shard count of a sparse table. Intentionally not equal to the dense shard
/// count so modulo routing spreads differently across the two layouts.
pub const SPARSE_SHARD_COUNT: usize = 31;

/// One partition of a sparse table's key space behind a single lock.
pub(crate) struct SparseShard<V> {
    data: RwLock<HashMap<SparseKey, V>>,
}

impl<V: SparseParam> SparseShard<V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up every key, creating missing ones during training. The whole
    /// read-then-maybe-insert runs under one write lock so two concurrent
    /// training pulls cannot both initialize the same key.
    fn pull(&self, keys: &[SparseFeature], is_training: bool, rule: &TrainingRule) -> Vec<V> {
        let mut out = Vec::with_capacity(keys.len());
        let mut data = self.data.write();
        for key in keys {
            match data.get(&key.sign) {
                Some(v) => out.push(v.clone()),
                None if is_training => {
                    let mut v = V::init(rule);
                    v.set_slot(key.slot);
                    data.insert(key.sign, v.clone());
                    out.push(v);
                }
                None => {
                    let mut v = V::placeholder();
                    v.set_slot(key.slot);
                    out.push(v);
                }
            }
        }
        out
    }

    /// Merges same-key gradients first, then applies each merged gradient.
    /// Every merged key must already exist.
    fn push(
        &self,
        keys: &[SparseFeature],
        values: &[V],
        rule: &TrainingRule,
    ) -> Result<(), ErrNo> {
        let mut merged: HashMap<SparseKey, V> = HashMap::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            match merged.get_mut(&key.sign) {
                Some(pending) => pending.merge(value),
                None => {
                    merged.insert(key.sign, value.clone());
                }
            }
        }

        let mut data = self.data.write();
        if merged.keys().any(|sign| !data.contains_key(sign)) {
            return Err(ErrNo::UpdateNonexistentSparseFeature);
        }
        for (sign, grad) in &merged {
            if let Some(stored) = data.get_mut(sign) {
                stored.apply_push(grad, rule);
            }
        }
        Ok(())
    }

    /// Overwrites existing values; fails without touching anything if any
    /// key is absent.
    fn assign(&self, keys: &[SparseFeature], values: &[V]) -> Result<(), ErrNo> {
        let mut data = self.data.write();
        if keys.iter().any(|key| !data.contains_key(&key.sign)) {
            return Err(ErrNo::AssignNonexistentSparseFeature);
        }
        for (key, value) in keys.iter().zip(values) {
            data.insert(key.sign, value.clone());
        }
        Ok(())
    }

    fn time_decay(&self, rule: &TrainingRule) {
        let mut data = self.data.write();
        for value in data.values_mut() {
            value.time_decay(rule);
        }
    }

    fn shrink(&self, rule: &TrainingRule) {
        let mut data = self.data.write();
        data.retain(|_, value| !value.should_evict(rule));
    }

    fn feature_num(&self) -> u64 {
        self.data.read().len() as u64
    }

    /// Writes one line per key to `file`. Empty shards write nothing.
    fn save(&self, file: &Path) -> std::io::Result<()> {
        let lines: Vec<String> = {
            let data = self.data.read();
            if data.is_empty() {
                return Ok(());
            }
            data.iter().map(|(k, v)| v.save_line(*k)).collect()
        };

        let mut out = BufWriter::new(File::create(file)?);
        for line in lines {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

/// A named sparse table: N modulo-routed shards plus the shared rule.
pub struct SparseTable<V> {
    name: String,
    rank: usize,
    rule: Arc<TrainingRule>,
    shards: Vec<SparseShard<V>>,
}

impl<V: SparseParam> SparseTable<V> {
    pub fn new(name: impl Into<String>, rule: Arc<TrainingRule>, rank: usize) -> Self {
        Self::with_shards(name, rule, rank, SPARSE_SHARD_COUNT)
    }

    pub fn with_shards(
        name: impl Into<String>,
        rule: Arc<TrainingRule>,
        rank: usize,
        shard_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            rank,
            rule,
            shards: (0..shard_count.max(1)).map(|_| SparseShard::new()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn pull(&self, keys: &[SparseFeature], is_training: bool) -> Vec<V> {
        let n = self.shards.len();
        let (buckets, mapping) = routing::partition_with_mapping(keys, n, |k| k.sign);

        let mut out = vec![V::placeholder(); keys.len()];
        for (shard, (bucket, indices)) in self.shards.iter().zip(buckets.iter().zip(&mapping)) {
            let values = shard.pull(bucket, is_training, &self.rule);
            for (value, &i) in values.into_iter().zip(indices) {
                out[i] = value;
            }
        }
        out
    }

    pub fn push(&self, keys: &[SparseFeature], values: &[V]) -> Result<(), ErrNo> {
        self.scatter(keys, values, |shard, k, v| shard.push(k, v, &self.rule))
    }

    pub fn assign(&self, keys: &[SparseFeature], values: &[V]) -> Result<(), ErrNo> {
        self.scatter(keys, values, |shard, k, v| shard.assign(k, v))
    }

    fn scatter(
        &self,
        keys: &[SparseFeature],
        values: &[V],
        op: impl Fn(&SparseShard<V>, &[SparseFeature], &[V]) -> Result<(), ErrNo>,
    ) -> Result<(), ErrNo> {
        if keys.len() != values.len() {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        let n = self.shards.len();
        let mut bucket_keys = vec![Vec::new(); n];
        let mut bucket_values = vec![Vec::new(); n];
        for (key, value) in keys.iter().zip(values) {
            let b = routing::sparse_bucket(key.sign, n);
            bucket_keys[b].push(*key);
            bucket_values[b].push(value.clone());
        }
        for (shard, (k, v)) in self.shards.iter().zip(bucket_keys.iter().zip(&bucket_values)) {
            op(shard, k, v)?;
        }
        Ok(())
    }

    pub fn time_decay(&self) {
        self.shards.par_iter().for_each(|s| s.time_decay(&self.rule));
    }

    pub fn shrink(&self) {
        self.shards.par_iter().for_each(|s| s.shrink(&self.rule));
    }

    pub fn feature_num(&self) -> u64 {
        self.shards.iter().map(SparseShard::feature_num).sum()
    }

    /// Writes every shard to `{path}/part-{rank * shard_count + i:05}`,
    /// one file per shard, fanned out across the thread pool.
    pub fn save(&self, path: &Path) -> Result<(), ErrNo> {
        if let Err(e) = std::fs::create_dir_all(path) {
            warn!(table = %self.name, error = %e, "cannot create save directory");
            return Err(ErrNo::UnknownError);
        }
        let shard_count = self.shards.len();
        self.shards
            .par_iter()
            .enumerate()
            .try_for_each(|(i, shard)| {
                let file = path.join(format!("part-{:05}", self.rank * shard_count + i));
                shard.save(&file).map_err(|e| {
                    warn!(table = %self.name, file = %file.display(), error = %e, "save failed");
                    ErrNo::UnknownError
                })
            })
    }
}
