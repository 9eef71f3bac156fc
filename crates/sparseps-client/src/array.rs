//! Client for the dense and summary families.
//!
//! The logical array spans all ranks; rank `i` owns
//! `[boundaries[i], boundaries[i + 1])` of it. Control-plane calls run on
//! the chief only, pushes go out fire-and-forget from every worker, pulls
//! gather the rank slices back in order.

use std::marker::PhantomData;

use sparseps_core::{routing, MessageType};
use sparseps_rpc::{RpcAgent, RpcRequest};

use crate::cluster::Cluster;
use crate::error::Result;
use crate::util::{check, decode_vec, encode_value, encode_vec, request};
use crate::wire::ArrayWire;

pub type DenseTableClient = ArrayTableClient<sparseps_table::DenseValue>;
pub type SummaryTableClient = ArrayTableClient<sparseps_table::SummaryValue>;

pub struct ArrayTableClient<V> {
    name: String,
    agent: RpcAgent,
    cluster: Cluster,
    _marker: PhantomData<V>,
}

impl<V: ArrayWire> ArrayTableClient<V> {
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

    /// Sizes each rank's slice of a `total`-element array. Chief only.
    pub async fn resize(&self, total: u64) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        let boundaries = routing::rank_boundaries(total, self.agent.world_size());
        let reqs = boundaries
            .windows(2)
            .map(|w| request(V::RESIZE, &self.name, encode_value(&(w[1] - w[0])), false))
            .collect();
        for resp in self.agent.send_each(reqs).await? {
            check(resp)?;
        }
        Ok(())
    }

    /// Overwrites the whole array, each rank receiving its slice. Chief only.
    pub async fn assign(&self, values: &[V]) -> Result<()> {
        if !self.cluster.is_chief() {
            return Ok(());
        }
        let reqs = self.slice_requests(V::ASSIGN, values, |slice| encode_vec(slice));
        for resp in self.agent.send_each(reqs).await? {
            check(resp)?;
        }
        Ok(())
    }

    /// Sends gradients for the whole array without waiting for responses.
    pub fn push(&self, grads: &[V::Push]) {
        let reqs = self.slice_requests(V::PUSH, grads, |slice| encode_vec(slice));
        self.agent.send_each_detached(reqs);
    }

    /// Gathers every rank's slice back into one array in rank order.
    pub async fn pull(&self) -> Result<Vec<V::Pull>> {
        let responses = self
            .agent
            .send_to_all(&request(V::PULL, &self.name, Vec::new(), false))
            .await?;
        let mut out = Vec::new();
        for resp in responses {
            let payload = check(resp)?;
            out.extend(decode_vec::<V::Pull>(&payload)?);
        }
        Ok(out)
    }

    /// Triggers server-side save on every rank. Chief only.
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

    fn slice_requests<T>(
        &self,
        message_type: MessageType,
        values: &[T],
        encode: impl Fn(&[T]) -> Vec<u8>,
    ) -> Vec<RpcRequest> {
        let boundaries = routing::rank_boundaries(values.len() as u64, self.agent.world_size());
        boundaries
            .windows(2)
            .map(|w| {
                let slice = &values[w[0] as usize..w[1] as usize];
                request(message_type, &self.name, encode(slice), false)
            })
            .collect()
    }
}
