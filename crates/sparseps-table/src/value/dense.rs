//! Dense table value and its three optimizers.

use sparseps_archive::{Archivable, BinaryArchive, Result as ArchiveResult};
use sparseps_core::{DenseRule, ErrNo};

use super::ArrayParam;

/// One element of a dense parameter array with full optimizer state.
///
/// All state starts at zero; with the power betas at zero the bias-correction
/// denominators in AdamW/RMSProp are exactly 1 on the first step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenseValue {
    pub weight: f32,
    pub momentum: f32,
    pub ada_d2sum: f32,
    pub ada_g2sum: f32,
    pub power_ada_beta_1: f32,
    pub power_ada_beta_2: f32,
    pub max_g2sum: f32,
    pub norm_grad: f32,
    pub norm_weight: f32,
    pub step: i64,
}

/// Gradient wire shape. `norm_grad`/`norm_weight` may be NaN to signal that
/// no norm was computed this pass; they are carried, never read by the math.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DensePush {
    pub weight: f32,
    pub norm_grad: f32,
    pub norm_weight: f32,
}

/// Pull projection: workers only ever see the weight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DensePull {
    pub weight: f32,
}

impl ArrayParam for DenseValue {
    const FAMILY: &'static str = "dense";
    const REGIST_EXISTING: ErrNo = ErrNo::RegistExistingDenseTable;
    const PICK_NONEXISTENT: ErrNo = ErrNo::PickNonexistentDenseTable;

    type Push = DensePush;
    type Pull = DensePull;

    fn apply_push(&mut self, grad: &DensePush, rule: &DenseRule) -> Result<(), ErrNo> {
        let g = grad.weight;
        match rule.optimizer.as_str() {
            "" | "base" => {
                let wd = rule.weight_decay * self.weight;

                self.step += 1;
                self.momentum =
                    rule.mom_decay_rate * self.momentum + (1.0 - rule.mom_decay_rate) * g;
                self.ada_d2sum = rule.ada_decay_rate * self.ada_d2sum + 1.0;
                self.ada_g2sum = rule.ada_decay_rate * self.ada_g2sum + g * g;

                let m = self.momentum;
                let v = self.ada_g2sum / self.ada_d2sum;
                self.weight +=
                    rule.learning_rate * ((1.0 + rule.ada_epsilon) / (v + rule.ada_epsilon)).sqrt() * m
                        - wd;
            }
            "AdamW" => {
                let wd = rule.weight_decay * self.weight;

                self.step += 1;
                self.momentum =
                    rule.mom_decay_rate * self.momentum + (1.0 - rule.mom_decay_rate) * g;
                self.ada_g2sum =
                    rule.ada_decay_rate * self.ada_g2sum + (1.0 - rule.ada_decay_rate) * g * g;
                self.power_ada_beta_1 *= rule.mom_decay_rate;
                self.power_ada_beta_2 *= rule.ada_decay_rate;

                let m = self.momentum / (1.0 - self.power_ada_beta_1);
                let v = self.ada_g2sum / (1.0 - self.power_ada_beta_2);
                self.weight += rule.learning_rate / (v.sqrt() + rule.ada_epsilon) * m - wd;
            }
            "RMSProp" => {
                let wd = rule.weight_decay * self.weight;

                self.step += 1;
                self.momentum =
                    rule.mom_decay_rate * self.momentum + (1.0 - rule.mom_decay_rate) * g;
                self.ada_g2sum =
                    rule.ada_decay_rate * self.ada_g2sum + (1.0 - rule.ada_decay_rate) * g * g;

                let m = self.momentum / (1.0 - self.power_ada_beta_1);
                let v = self.ada_g2sum / (1.0 - self.power_ada_beta_2);
                self.weight += rule.learning_rate / (v.sqrt() + rule.ada_epsilon) * m - wd;
            }
            other => {
                tracing::error!(optimizer = other, "unknown dense optimizer");
                return Err(ErrNo::UnknownOptimizer);
            }
        }
        Ok(())
    }

    fn pull(&self) -> DensePull {
        DensePull {
            weight: self.weight,
        }
    }
}

impl Archivable for DenseValue {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_f32(self.weight);
        ar.put_f32(self.momentum);
        ar.put_f32(self.ada_d2sum);
        ar.put_f32(self.ada_g2sum);
        ar.put_f32(self.power_ada_beta_1);
        ar.put_f32(self.power_ada_beta_2);
        ar.put_f32(self.max_g2sum);
        ar.put_f32(self.norm_grad);
        ar.put_f32(self.norm_weight);
        ar.put_i64(self.step);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            weight: ar.get_f32()?,
            momentum: ar.get_f32()?,
            ada_d2sum: ar.get_f32()?,
            ada_g2sum: ar.get_f32()?,
            power_ada_beta_1: ar.get_f32()?,
            power_ada_beta_2: ar.get_f32()?,
            max_g2sum: ar.get_f32()?,
            norm_grad: ar.get_f32()?,
            norm_weight: ar.get_f32()?,
            step: ar.get_i64()?,
        })
    }
}

impl Archivable for DensePush {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_f32(self.weight);
        ar.put_f32(self.norm_grad);
        ar.put_f32(self.norm_weight);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            weight: ar.get_f32()?,
            norm_grad: ar.get_f32()?,
            norm_weight: ar.get_f32()?,
        })
    }
}

impl Archivable for DensePull {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_f32(self.weight);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            weight: ar.get_f32()?,
        })
    }
}
