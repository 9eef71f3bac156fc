//! Training cluster identity and worker synchronization.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// This worker's position in the training job. Control-plane calls (create,
/// resize, assign, save, decay, shrink) are issued by rank 0 only; the other
/// ranks wait at a barrier instead.
#[derive(Debug, Clone, Copy)]
pub struct Cluster {
    pub rank: usize,
    pub world_size: usize,
}

impl Cluster {
    pub fn new(rank: usize, world_size: usize) -> Self {
        Self { rank, world_size }
    }

    pub fn is_chief(&self) -> bool {
        self.rank == 0
    }
}

/// Synchronization point across all workers of the job.
#[async_trait]
pub trait Barrier: Send + Sync {
    async fn wait(&self) -> Result<()>;
}

/// In-process barrier for single-process multi-worker runs and tests.
pub struct LocalBarrier {
    inner: Arc<tokio::sync::Barrier>,
}

impl LocalBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Barrier::new(parties)),
        }
    }
}

impl Clone for LocalBarrier {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Barrier for LocalBarrier {
    async fn wait(&self) -> Result<()> {
        self.inner.wait().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chief_is_rank_zero() {
        assert!(Cluster::new(0, 4).is_chief());
        assert!(!Cluster::new(3, 4).is_chief());
    }

    #[tokio::test]
    async fn test_local_barrier_releases_all() {
        let barrier = LocalBarrier::new(3);
        let mut handles = Vec::new();
        for _ in 0..3 {
            let b = barrier.clone();
            handles.push(tokio::spawn(async move { b.wait().await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }
}
