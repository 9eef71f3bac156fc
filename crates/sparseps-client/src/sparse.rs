//! Client for the sparse KV and embedding families.
//!
//! Signs route to ranks by `sign % world_size`. Pulls scatter the key set,
//! await every rank, and write the gathered values back in input order;
//! pushes scatter fire-and-forget.

use std::marker::PhantomData;

use sparseps_core::{routing, MessageType, SparseFeature};
use sparseps_rpc::{RpcAgent, RpcRequest};
use sparseps_table::encode_pairs;

use crate::cluster::Cluster;
use crate::error::{ClientError, Result};
use crate::util::{check, decode_value, decode_vec, encode_vec, request};
use crate::wire::SparseWire;

pub type SparseKvTableClient = SparseTableClient<sparseps_table::SparseValue>;
pub type SparseEmbeddingTableClient = SparseTableClient<sparseps_table::EmbeddingValue>;

pub struct SparseTableClient<V> {
    name: String,
    agent: RpcAgent,
    cluster: Cluster,
    _marker: PhantomData<V>,
}

impl<V: SparseWire> SparseTableClient<V> {
    pub fn new(name: impl Into<String>, agent: RpcAgent, cluster: Cluster) -> Self {
        Self {
            name: name.into(),
            agent,
            cluster,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the table on every rank. Chief only; a no-op elsewhere.
    pub async fn create(&self) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        self.broadcast(V::CREATE, Vec::new()).await
    }

    /// Overwrites existing features, routed to their owning ranks. Chief only.
    pub async fn assign(&self, keys: &[SparseFeature], values: &[V]) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        let reqs = self.pair_requests(V::ASSIGN, keys, values);
        for resp in self.agent.send_each(reqs).await? {
            check(resp)?;
        }
        Ok(())
    }

    /// Sends gradients to their owning ranks without waiting for responses.
    pub fn push(&self, keys: &[SparseFeature], grads: &[V]) {
        let reqs = self.pair_requests(V::PUSH, keys, grads);
        self.agent.send_each_detached(reqs);
    }

    /// Fetches values for `keys` in input order. Under `is_training`,
    /// missing features are created server-side; otherwise placeholders
    /// come back for them.
    pub async fn pull(&self, keys: &[SparseFeature], is_training: bool) -> Result<Vec<V>> {
        let world = self.agent.world_size();
        let (buckets, mapping) = routing::partition_with_mapping(keys, world, |k| k.sign);
        let reqs = buckets
            .iter()
            .map(|bucket| request(V::PULL, &self.name, encode_vec(bucket), is_training))
            .collect();
        let responses = self.agent.send_each(reqs).await?;

        let mut out = vec![V::placeholder(); keys.len()];
        for (resp, idx) in responses.into_iter().zip(&mapping) {
            let payload = check(resp)?;
            let values: Vec<V> = decode_vec(&payload)?;
            if values.len() != idx.len() {
                return Err(ClientError::SizeMismatch {
                    expected: idx.len(),
                    got: values.len(),
                });
            }
            for (value, &i) in values.into_iter().zip(idx) {
                out[i] = value;
            }
        }
        Ok(out)
    }

    /// Ages every feature by one decay period on every rank. Chief only.
    pub async fn time_decay(&self) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        self.broadcast(V::TIME_DECAY, Vec::new()).await
    }

    /// Evicts low-score and long-silent features on every rank. Chief only.
    pub async fn shrink(&self) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        self.broadcast(V::SHRINK, Vec::new()).await
    }

    /// Total live feature count summed over all ranks.
    pub async fn feature_num(&self) -> Result<u64> {
        let responses = self
            .agent
            .send_to_all(&request(V::FEATURE_NUM, &self.name, Vec::new(), false))
            .await?;
        let mut total = 0u64;
        for resp in responses {
            let payload = check(resp)?;
            total += decode_value::<u64>(&payload)?;
        }
        Ok(total)
    }

    /// Saves every rank's shards under `path`. Chief only.
    pub async fn save(&self, path: &str) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        self.broadcast(V::SAVE, path.as_bytes().to_vec()).await
    }

    async fn broadcast(&self, message_type: MessageType, message: Vec<u8>) -> Result<()> {
        let responses = self
            .agent
            .send_to_all(&request(message_type, &self.name, message, false))
            .await?;
        for resp in responses {
            check(resp)?;
        }
        Ok(())
    }

    fn pair_requests(
        &self,
        message_type: MessageType,
        keys: &[SparseFeature],
        values: &[V],
    ) -> Vec<RpcRequest> {
        let world = self.agent.world_size();
        let mut key_buckets = vec![Vec::new(); world];
        let mut value_buckets = vec![Vec::new(); world];
        for (key, value) in keys.iter().zip(values) {
            let b = routing::sparse_bucket(key.sign, world);
            key_buckets[b].push(*key);
            value_buckets[b].push(value.clone());
        }
        key_buckets
            .iter()
            .zip(&value_buckets)
            .map(|(k, v)| request(message_type, &self.name, encode_pairs(k, v), false))
            .collect()
    }
}
