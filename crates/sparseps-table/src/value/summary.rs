//! Summary statistics value: exponentially decayed n / sum / squared sum.

use sparseps_archive::{Archivable, BinaryArchive, Result as ArchiveResult};
use sparseps_core::{DenseRule, ErrNo};

use super::ArrayParam;

/// Running statistics for one summarized quantity. Pull returns the whole
/// value; push blends the incoming batch in, weighted by the decay rate,
/// and adds `n * squared_sum_epsilon` to keep the variance estimate away
/// from zero. A batch with `n <= 0` is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryValue {
    pub n: f32,
    pub sum: f32,
    pub squared_sum: f32,
}

impl ArrayParam for SummaryValue {
    const FAMILY: &'static str = "summary";
    const REGIST_EXISTING: ErrNo = ErrNo::RegistExistingSummaryTable;
    const PICK_NONEXISTENT: ErrNo = ErrNo::PickNonexistentSummaryTable;

    type Push = SummaryValue;
    type Pull = SummaryValue;

    fn apply_push(&mut self, grad: &SummaryValue, rule: &DenseRule) -> Result<(), ErrNo> {
        if grad.n > 0.0 {
            let d = rule.summary_decay_rate;
            self.n = d * self.n + grad.n;
            self.sum = d * self.sum + grad.sum;
            self.squared_sum =
                d * self.squared_sum + grad.squared_sum + grad.n * rule.summary_squared_sum_epsilon;
        }
        Ok(())
    }

    fn pull(&self) -> SummaryValue {
        *self
    }
}

impl Archivable for SummaryValue {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_f32(self.n);
        ar.put_f32(self.sum);
        ar.put_f32(self.squared_sum);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            n: ar.get_f32()?,
            sum: ar.get_f32()?,
            squared_sum: ar.get_f32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_blends_with_decay() {
        let rule = DenseRule {
            summary_decay_rate: 0.5,
            summary_squared_sum_epsilon: 0.0,
            ..DenseRule::default()
        };
        let mut v = SummaryValue {
            n: 10.0,
            sum: 20.0,
            squared_sum: 40.0,
        };
        let grad = SummaryValue {
            n: 2.0,
            sum: 4.0,
            squared_sum: 8.0,
        };
        v.apply_push(&grad, &rule).unwrap();
        assert_eq!(v.n, 7.0);
        assert_eq!(v.sum, 14.0);
        assert_eq!(v.squared_sum, 28.0);
    }

    #[test]
    fn test_epsilon_stabilizer_scales_with_n() {
        let rule = DenseRule {
            summary_decay_rate: 1.0,
            summary_squared_sum_epsilon: 0.25,
            ..DenseRule::default()
        };
        let mut v = SummaryValue::default();
        let grad = SummaryValue {
            n: 4.0,
            sum: 0.0,
            squared_sum: 0.0,
        };
        v.apply_push(&grad, &rule).unwrap();
        assert_eq!(v.squared_sum, 1.0);
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let rule = DenseRule::default();
        let mut v = SummaryValue {
            n: 1.0,
            sum: 2.0,
            squared_sum: 3.0,
        };
        let before = v;
        v.apply_push(&SummaryValue::default(), &rule).unwrap();
        assert_eq!(v, before);

        let negative = SummaryValue {
            n: -1.0,
            sum: 9.0,
            squared_sum: 9.0,
        };
        v.apply_push(&negative, &rule).unwrap();
        assert_eq!(v, before);
    }
}
