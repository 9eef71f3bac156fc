//! Training-rule configuration tree.
//!
//! One [`TrainingRule`] is built at process start and shared as an
//! `Arc<TrainingRule>` with every table server; it is read-only after
//! construction. The sub-rules group the hyperparameters each value codec
//! reads: the four Adagrad sub-models of the KV table, the embedding table's
//! shared-denominator Adagrad, and the dense optimizers.

use serde::{Deserialize, Serialize};

/// Logistic-regression sub-model of the KV table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LrRule {
    pub version_aware: bool,
    pub learning_rate: f32,
    pub initial_g2sum: f32,
    pub initial_range: f32,
    pub weight_upper_bound: f32,
    pub weight_lower_bound: f32,
}

impl Default for LrRule {
    fn default() -> Self {
        Self {
            version_aware: false,
            learning_rate: 0.05,
            initial_g2sum: 3.0,
            initial_range: 0.02,
            weight_upper_bound: 10.0,
            weight_lower_bound: -10.0,
        }
    }
}

/// Factorization-machine sub-model: a scalar weight plus a `dim`-wide vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FmRule {
    pub version_aware: bool,
    pub dim: usize,
    pub learning_rate: f32,
    pub initial_g2sum: f32,
    pub initial_range: f32,
    pub weight_upper_bound: f32,
    pub weight_lower_bound: f32,
}

impl Default for FmRule {
    fn default() -> Self {
        Self {
            version_aware: false,
            dim: 8,
            learning_rate: 0.05,
            initial_g2sum: 3.0,
            initial_range: 0.02,
            weight_upper_bound: 10.0,
            weight_lower_bound: -10.0,
        }
    }
}

/// Matrix-factorization sub-model, same shape as [`FmRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MfRule {
    pub version_aware: bool,
    pub dim: usize,
    pub learning_rate: f32,
    pub initial_g2sum: f32,
    pub initial_range: f32,
    pub weight_upper_bound: f32,
    pub weight_lower_bound: f32,
}

impl Default for MfRule {
    fn default() -> Self {
        Self {
            version_aware: false,
            dim: 8,
            learning_rate: 0.05,
            initial_g2sum: 3.0,
            initial_range: 0.02,
            weight_upper_bound: 10.0,
            weight_lower_bound: -10.0,
        }
    }
}

/// Wide-model scalar weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WideRule {
    pub version_aware: bool,
    pub learning_rate: f32,
    pub initial_g2sum: f32,
    pub initial_range: f32,
    pub weight_upper_bound: f32,
    pub weight_lower_bound: f32,
}

impl Default for WideRule {
    fn default() -> Self {
        Self {
            version_aware: false,
            learning_rate: 0.05,
            initial_g2sum: 3.0,
            initial_range: 0.02,
            weight_upper_bound: 10.0,
            weight_lower_bound: -10.0,
        }
    }
}

/// Show/click counter decay applied at epoch boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CvmRule {
    pub decay_rate: f32,
}

impl Default for CvmRule {
    fn default() -> Self {
        Self { decay_rate: 0.98 }
    }
}

/// Embedding-table hyperparameters: a `dim`-wide vector under Adagrad with
/// one shared denominator accumulator, plus its own decay/eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingRule {
    pub version_aware: bool,
    pub dim: usize,
    pub learning_rate: f32,
    pub initial_range: f32,
    pub ada_decay_rate: f32,
    pub ada_epsilon: f32,
    pub weight_upper_bound: f32,
    pub weight_lower_bound: f32,
    pub decay_rate: f32,
    pub delete_threshold: f32,
    pub delete_after_silent_days: i32,
}

impl Default for EmbeddingRule {
    fn default() -> Self {
        Self {
            version_aware: false,
            dim: 16,
            learning_rate: 0.05,
            initial_range: 0.02,
            ada_decay_rate: 0.9999,
            ada_epsilon: 1e-8,
            weight_upper_bound: 10.0,
            weight_lower_bound: -10.0,
            decay_rate: 0.98,
            delete_threshold: 0.25,
            delete_after_silent_days: 30,
        }
    }
}

/// Everything the two sparse table families read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseRule {
    pub clk_coeff: f32,
    pub nonclk_coeff: f32,
    pub delete_threshold: f32,
    pub delete_after_silent_days: i32,
    pub cvm: CvmRule,
    pub lr: LrRule,
    pub fm: FmRule,
    pub mf: MfRule,
    pub wide: WideRule,
    pub embedding: EmbeddingRule,
}

/// Everything the dense and summary table families read. `optimizer` selects
/// the dense update: `""`/`"base"`, `"AdamW"`, or `"RMSProp"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseRule {
    pub optimizer: String,
    pub learning_rate: f32,
    pub mom_decay_rate: f32,
    pub ada_decay_rate: f32,
    pub ada_epsilon: f32,
    pub weight_decay: f32,
    pub summary_decay_rate: f32,
    pub summary_squared_sum_epsilon: f32,
}

impl Default for DenseRule {
    fn default() -> Self {
        Self {
            optimizer: String::new(),
            learning_rate: 5e-6,
            mom_decay_rate: 0.99,
            ada_decay_rate: 0.9999,
            ada_epsilon: 1e-8,
            weight_decay: 0.0,
            summary_decay_rate: 0.999999,
            summary_squared_sum_epsilon: 1e-4,
        }
    }
}

impl Default for SparseRule {
    fn default() -> Self {
        Self {
            clk_coeff: 1.0,
            nonclk_coeff: 0.1,
            delete_threshold: 0.25,
            delete_after_silent_days: 30,
            cvm: CvmRule::default(),
            lr: LrRule::default(),
            fm: FmRule::default(),
            mf: MfRule::default(),
            wide: WideRule::default(),
            embedding: EmbeddingRule::default(),
        }
    }
}

/// The full configuration shared by every table server in a process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingRule {
    pub dense: DenseRule,
    pub sparse: SparseRule,
}
