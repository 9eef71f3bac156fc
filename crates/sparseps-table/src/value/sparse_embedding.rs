//! The embedding table's value: one vector under shared-denominator Adagrad.

use std::fmt::Write as _;

use sparseps_archive::{Archivable, BinaryArchive, Result as ArchiveResult};
use sparseps_core::{ErrNo, SparseKey, SparseSlot, TrainingRule};

use super::{clamp_weight, uniform_init, SparseParam};

/// Per-feature embedding vector with its Adagrad state: `ada_d2sum` is one
/// shared denominator accumulator for the whole vector, `ada_g2sum` is
/// per-coordinate. `count` plays the role the KV table's `show` plays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingValue {
    pub slot: SparseSlot,
    pub silent_days: i32,

    pub count: f32,
    pub ada_d2sum: f32,

    pub embedding: Vec<f32>,
    pub ada_g2sum: Vec<f32>,

    pub version: u64,
    pub delta_score: f32,
}

impl SparseParam for EmbeddingValue {
    const FAMILY: &'static str = "embedding";
    const REGIST_EXISTING: ErrNo = ErrNo::RegistExistingSparseTable;
    const PICK_NONEXISTENT: ErrNo = ErrNo::PickNonexistentSparseTable;

    fn init(rule: &TrainingRule) -> Self {
        let conf = &rule.sparse.embedding;
        let embedding = (0..conf.dim)
            .map(|_| {
                let mut x = uniform_init(conf.initial_range);
                clamp_weight(&mut x, conf.weight_lower_bound, conf.weight_upper_bound);
                x
            })
            .collect();
        Self {
            embedding,
            ada_g2sum: vec![0.0; conf.dim],
            ..Self::default()
        }
    }

    fn placeholder() -> Self {
        Self::default()
    }

    fn set_slot(&mut self, slot: SparseSlot) {
        self.slot = slot;
    }

    fn apply_push(&mut self, grad: &Self, rule: &TrainingRule) {
        let conf = &rule.sparse.embedding;

        self.count += grad.count;
        self.delta_score += grad.count;

        if !grad.embedding.is_empty() && !self.embedding.is_empty() && grad.count > 0.0 {
            let mut g_scale = grad.count;
            if conf.version_aware && self.version > grad.version {
                let diff = self.version - grad.version;
                g_scale *= ((1.0 + diff as f64).sqrt()) as f32;
            }
            self.ada_d2sum = conf.ada_decay_rate * self.ada_d2sum + 1.0;

            let dim = self.embedding.len().min(grad.embedding.len());
            // Assigned values may carry a shorter accumulator than their
            // embedding; grow it so the whole vector keeps updating.
            if self.ada_g2sum.len() < dim {
                self.ada_g2sum.resize(dim, 0.0);
            }
            for i in 0..dim {
                let origin_grad = grad.embedding[i];
                let scaled_grad = origin_grad / g_scale;

                self.ada_g2sum[i] =
                    conf.ada_decay_rate * self.ada_g2sum[i] + scaled_grad * scaled_grad;
                let scale = ((1.0 + conf.ada_epsilon)
                    / (self.ada_g2sum[i] / self.ada_d2sum + conf.ada_epsilon))
                    .sqrt();

                self.embedding[i] += conf.learning_rate * origin_grad * scale;
                clamp_weight(
                    &mut self.embedding[i],
                    conf.weight_lower_bound,
                    conf.weight_upper_bound,
                );
            }
        }

        self.version += 1;
        self.silent_days = 0;
    }

    fn merge(&mut self, other: &Self) {
        if self.embedding.len() < other.embedding.len() {
            self.embedding.resize(other.embedding.len(), 0.0);
        }
        for (a, b) in self.embedding.iter_mut().zip(&other.embedding) {
            *a += b;
        }
        self.count += other.count;
        self.version = self.version.min(other.version);
    }

    fn time_decay(&mut self, rule: &TrainingRule) {
        let conf = &rule.sparse.embedding;
        self.silent_days += 1;
        self.count *= conf.decay_rate;
        for x in &mut self.embedding {
            *x *= conf.decay_rate;
        }
    }

    fn should_evict(&self, rule: &TrainingRule) -> bool {
        let conf = &rule.sparse.embedding;
        self.count < conf.delete_threshold || self.silent_days > conf.delete_after_silent_days
    }

    fn save_line(&self, key: SparseKey) -> String {
        let mut line = format!(
            "{} {} {} {} {:.6} {:.6} {:.6}",
            key,
            self.slot,
            self.silent_days,
            self.version,
            self.delta_score,
            self.count,
            self.ada_d2sum
        );
        let _ = write!(line, " {}", self.embedding.len());
        for x in &self.embedding {
            let _ = write!(line, " {:.6}", x);
        }
        let _ = write!(line, " {}", self.ada_g2sum.len());
        for x in &self.ada_g2sum {
            let _ = write!(line, " {:.6}", x);
        }
        line
    }
}

impl Archivable for EmbeddingValue {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_u32(self.slot);
        ar.put_u64(self.version);
        ar.put_f32(self.delta_score);
        ar.put_i32(self.silent_days);
        ar.put_f32(self.count);
        ar.put_f32(self.ada_d2sum);
        ar.put_vec(&self.embedding);
        ar.put_vec(&self.ada_g2sum);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            slot: ar.get_u32()?,
            version: ar.get_u64()?,
            delta_score: ar.get_f32()?,
            silent_days: ar.get_i32()?,
            count: ar.get_f32()?,
            ada_d2sum: ar.get_f32()?,
            embedding: ar.get_vec()?,
            ada_g2sum: ar.get_vec()?,
        })
    }
}
