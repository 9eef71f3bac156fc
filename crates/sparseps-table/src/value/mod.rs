//! Per-value update codecs for the four table families.

mod dense;
mod sparse_embedding;
mod sparse_kv;
mod summary;

pub use dense::{DensePull, DensePush, DenseValue};
pub use sparse_embedding::EmbeddingValue;
pub use sparse_kv::SparseValue;
pub use summary::SummaryValue;

use rand::Rng;
use sparseps_archive::Archivable;
use sparseps_core::{DenseRule, ErrNo, SparseKey, SparseSlot, TrainingRule};

/// A value stored in a hash-map shard: knows how to initialize itself from
/// the training rule, fold gradients in, age, and decide its own eviction.
pub trait SparseParam: Clone + Send + Sync + Archivable + 'static {
    /// Family tag used in logs and save-file diagnostics.
    const FAMILY: &'static str;
    /// Code returned when `create` hits an existing table of this family.
    const REGIST_EXISTING: ErrNo;
    /// Code returned when an operation names a missing table of this family.
    const PICK_NONEXISTENT: ErrNo;

    /// A freshly initialized value for a first-seen key during training.
    fn init(rule: &TrainingRule) -> Self;

    /// The transient value returned for a missing key when not training.
    /// Never persisted.
    fn placeholder() -> Self;

    fn set_slot(&mut self, slot: SparseSlot);

    /// Folds one (possibly pre-merged) gradient into storage.
    fn apply_push(&mut self, grad: &Self, rule: &TrainingRule);

    /// Combines two pending gradients for the same key before they are
    /// applied; the surviving version is the older of the two.
    fn merge(&mut self, other: &Self);

    /// Epoch-boundary aging.
    fn time_decay(&mut self, rule: &TrainingRule);

    /// Eviction predicate: low importance or long silence, either suffices.
    fn should_evict(&self, rule: &TrainingRule) -> bool;

    /// One space-separated save-file line for this key.
    fn save_line(&self, key: SparseKey) -> String;
}

/// A value stored in a contiguous array shard, with distinct wire shapes for
/// the gradient pushed in and the projection pulled out.
pub trait ArrayParam: Clone + Default + Send + Sync + Archivable + 'static {
    const FAMILY: &'static str;
    const REGIST_EXISTING: ErrNo;
    const PICK_NONEXISTENT: ErrNo;

    type Push: Clone + Send + Sync + Archivable + 'static;
    type Pull: Clone + Default + Send + Sync + Archivable + 'static;

    fn apply_push(&mut self, grad: &Self::Push, rule: &DenseRule) -> Result<(), ErrNo>;

    fn pull(&self) -> Self::Pull;
}

/// Clamps `x` into `[lower, upper]`.
pub(crate) fn clamp_weight(x: &mut f32, lower: f32, upper: f32) {
    if *x < lower {
        *x = lower;
    }
    if *x > upper {
        *x = upper;
    }
}

/// Uniform draw from `[-range, range]`.
pub(crate) fn uniform_init(range: f32) -> f32 {
    rand::thread_rng().gen_range(-range..=range)
}
