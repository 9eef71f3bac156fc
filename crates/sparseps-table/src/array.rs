//! Contiguous index-range shards and tables for the dense and summary
//! families.

use std::sync::Arc;

use parking_lot::RwLock;
use sparseps_core::{routing, DenseRule, ErrNo};

use crate::value::ArrayParam;

/// Shard count of a dense/summary table within one rank.
pub const ARRAY_SHARD_COUNT: usize = 32;

struct ShardInner<V> {
    begin: u64,
    end: u64,
    data: Vec<V>,
}

/// One `[begin, end)` slice of the rank-local array behind a single lock.
struct ArrayShard<V> {
    inner: RwLock<ShardInner<V>>,
}

impl<V: ArrayParam> ArrayShard<V> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(ShardInner {
                begin: 0,
                end: 0,
                data: Vec::new(),
            }),
        }
    }

    fn resize(&self, begin: u64, end: u64) {
        let mut inner = self.inner.write();
        inner.begin = begin;
        inner.end = end;
        inner.data = vec![V::default(); (end - begin) as usize];
    }

    /// Overwrites this shard's slice from the rank-local `values` array.
    fn assign(&self, values: &[V]) -> Result<(), ErrNo> {
        let mut inner = self.inner.write();
        if (values.len() as u64) < inner.end {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        let begin = inner.begin as usize;
        for (i, slot) in inner.data.iter_mut().enumerate() {
            *slot = values[begin + i].clone();
        }
        Ok(())
    }

    /// Applies the codec per element, stopping at the first failure.
    fn push(&self, values: &[V::Push], rule: &DenseRule) -> Result<(), ErrNo> {
        let mut inner = self.inner.write();
        if (values.len() as u64) < inner.end {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        let begin = inner.begin as usize;
        let ShardInner { data, .. } = &mut *inner;
        for (i, slot) in data.iter_mut().enumerate() {
            slot.apply_push(&values[begin + i], rule)?;
        }
        Ok(())
    }

    /// Copies the pull projection into this shard's slice of `out`.
    fn pull(&self, out: &mut [V::Pull]) -> Result<(), ErrNo> {
        let inner = self.inner.read();
        if (out.len() as u64) < inner.end {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        let begin = inner.begin as usize;
        for (i, value) in inner.data.iter().enumerate() {
            out[begin + i] = value.pull();
        }
        Ok(())
    }
}

/// A named dense/summary table holding this rank's slice of the logical
/// array, split over [`ARRAY_SHARD_COUNT`] contiguous shards.
pub struct ArrayTable<V> {
    name: String,
    rule: Arc<DenseRule>,
    size: RwLock<u64>,
    shards: Vec<ArrayShard<V>>,
}

impl<V: ArrayParam> ArrayTable<V> {
    pub fn new(name: impl Into<String>, rule: Arc<DenseRule>) -> Self {
        Self {
            name: name.into(),
            rule,
            size: RwLock::new(0),
            shards: (0..ARRAY_SHARD_COUNT).map(|_| ArrayShard::new()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        *self.size.read()
    }

    /// Sets the rank-local element count, spreading the remainder over the
    /// first `size % shard_count` shards.
    pub fn resize(&self, size: u64) {
        *self.size.write() = size;
        for (shard, (begin, end)) in self
            .shards
            .iter()
            .zip(routing::shard_ranges(size, self.shards.len()))
        {
            shard.resize(begin, end);
        }
    }

    pub fn assign(&self, values: &[V]) -> Result<(), ErrNo> {
        if values.len() as u64 != self.size() {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        for shard in &self.shards {
            shard.assign(values)?;
        }
        Ok(())
    }

    pub fn push(&self, values: &[V::Push]) -> Result<(), ErrNo> {
        if values.len() as u64 != self.size() {
            return Err(ErrNo::ArrayIndexOutOfBound);
        }
        for shard in &self.shards {
            shard.push(values, &self.rule)?;
        }
        Ok(())
    }

    pub fn pull(&self) -> Result<Vec<V::Pull>, ErrNo> {
        let mut out = vec![V::Pull::default(); self.size() as usize];
        for shard in &self.shards {
            shard.pull(&mut out)?;
        }
        Ok(out)
    }

    /// Checkpointing of dense state rides on the client re-assigning from
    /// the training driver's own snapshot, so server-side save stores
    /// nothing.
    pub fn save(&self, _path: &str) -> Result<(), ErrNo> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DensePush, DenseValue, SummaryValue};

    fn dense_table() -> ArrayTable<DenseValue> {
        ArrayTable::new("w", Arc::new(DenseRule::default()))
    }

    #[test]
    fn test_resize_ten_over_thirty_two() {
        let t = dense_table();
        t.resize(10);
        assert_eq!(t.size(), 10);
        let lens: Vec<u64> = t
            .shards
            .iter()
            .map(|s| {
                let inner = s.inner.read();
                inner.end - inner.begin
            })
            .collect();
        assert!(lens[..10].iter().all(|&l| l == 1));
        assert!(lens[10..].iter().all(|&l| l == 0));
    }

    #[test]
    fn test_assign_then_pull_round_trips_weights() {
        let t = dense_table();
        t.resize(100);
        let values: Vec<DenseValue> = (0..100)
            .map(|i| DenseValue {
                weight: i as f32,
                ..DenseValue::default()
            })
            .collect();
        t.assign(&values).unwrap();

        let pulled = t.pull().unwrap();
        assert_eq!(pulled.len(), 100);
        for (i, p) in pulled.iter().enumerate() {
            assert_eq!(p.weight, i as f32);
        }
    }

    #[test]
    fn test_push_applies_per_element() {
        let t = dense_table();
        t.resize(5);
        let grads = vec![
            DensePush {
                weight: 1.0,
                ..DensePush::default()
            };
            5
        ];
        t.push(&grads).unwrap();
        for p in t.pull().unwrap() {
            assert!(p.weight > 0.0);
        }
    }

    #[test]
    fn test_push_unknown_optimizer_short_circuits() {
        let rule = DenseRule {
            optimizer: "sgd".to_string(),
            ..DenseRule::default()
        };
        let t: ArrayTable<DenseValue> = ArrayTable::new("w", Arc::new(rule));
        t.resize(3);
        let grads = vec![DensePush::default(); 3];
        assert_eq!(t.push(&grads).unwrap_err(), ErrNo::UnknownOptimizer);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let t = dense_table();
        t.resize(4);
        assert_eq!(
            t.assign(&vec![DenseValue::default(); 3]).unwrap_err(),
            ErrNo::ArrayIndexOutOfBound
        );
        assert_eq!(
            t.push(&vec![DensePush::default(); 5]).unwrap_err(),
            ErrNo::ArrayIndexOutOfBound
        );
    }

    #[test]
    fn test_summary_table_blend() {
        let t: ArrayTable<SummaryValue> = ArrayTable::new(
            "s",
            Arc::new(DenseRule {
                summary_decay_rate: 1.0,
                summary_squared_sum_epsilon: 0.0,
                ..DenseRule::default()
            }),
        );
        t.resize(2);
        let batch = vec![
            SummaryValue {
                n: 1.0,
                sum: 2.0,
                squared_sum: 4.0,
            };
            2
        ];
        t.push(&batch).unwrap();
        t.push(&batch).unwrap();
        let pulled = t.pull().unwrap();
        assert_eq!(pulled[0].n, 2.0);
        assert_eq!(pulled[1].sum, 4.0);
    }
}
