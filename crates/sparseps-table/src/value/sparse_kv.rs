//! The KV table's value: four Adagrad sub-models plus usage bookkeeping.

use std::fmt::Write as _;

use sparseps_archive::{Archivable, BinaryArchive, Result as ArchiveResult};
use sparseps_core::{ErrNo, SparseKey, SparseSlot, TrainingRule};

use super::{clamp_weight, uniform_init, SparseParam};

/// Per-feature state of the sparse KV table: logistic-regression,
/// factorization-machine, matrix-factorization and wide weights, each with
/// its Adagrad accumulator, plus show/click counters and shrink bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseValue {
    pub slot: SparseSlot,
    pub silent_days: i32,

    pub show: f32,
    pub clk: f32,

    pub lr_w: f32,
    pub lr_g2sum: f32,

    pub fm_w: f32,
    pub fm_w_g2sum: f32,
    pub fm_v: Vec<f32>,
    pub fm_v_g2sum: f32,

    pub mf_w: f32,
    pub mf_w_g2sum: f32,
    pub mf_v: Vec<f32>,
    pub mf_v_g2sum: f32,

    pub wide_w: f32,
    pub wide_g2sum: f32,

    pub version: u64,
    pub delta_score: f32,
}

impl Default for SparseValue {
    fn default() -> Self {
        Self {
            // Slot sentinel for a value that never saw a real feature.
            slot: SparseSlot::MAX,
            silent_days: 0,
            show: 0.0,
            clk: 0.0,
            lr_w: 0.0,
            lr_g2sum: 0.0,
            fm_w: 0.0,
            fm_w_g2sum: 0.0,
            fm_v: Vec::new(),
            fm_v_g2sum: 0.0,
            mf_w: 0.0,
            mf_w_g2sum: 0.0,
            mf_v: Vec::new(),
            mf_v_g2sum: 0.0,
            wide_w: 0.0,
            wide_g2sum: 0.0,
            version: 0,
            delta_score: 0.0,
        }
    }
}

/// One Adagrad step over `w` against gradient `g`.
///
/// The gradient is divided by `g_scale` (the impression count, floored to 1),
/// optionally inflated by `sqrt(1 + version_diff)` when version-aware scaling
/// is on. The weight step uses the accumulator as it was before this push;
/// the mean squared scaled gradient is folded in afterwards.
#[allow(clippy::too_many_arguments)]
fn adagrad(
    w: &mut [f32],
    g: &[f32],
    mut g_scale: f32,
    learning_rate: f32,
    g2sum: &mut f32,
    initial_g2sum: f32,
    lower_bound: f32,
    upper_bound: f32,
    version_aware: bool,
    version_diff: u64,
) {
    if g_scale <= 0.0 {
        g_scale = 1.0;
    }
    if version_aware && version_diff > 0 {
        g_scale *= ((1.0 + version_diff as f64).sqrt()) as f32;
    }
    let decay = (initial_g2sum / (initial_g2sum + *g2sum)).sqrt();
    let mut add_g2sum = 0.0;
    let n = w.len().min(g.len());
    for (wi, gi) in w.iter_mut().zip(g) {
        let scaled = gi / g_scale;
        *wi += learning_rate * scaled * decay;
        clamp_weight(wi, lower_bound, upper_bound);
        add_g2sum += scaled * scaled;
    }
    if n > 0 {
        *g2sum += add_g2sum / n as f32;
    }
}

impl SparseParam for SparseValue {
    const FAMILY: &'static str = "sparse";
    const REGIST_EXISTING: ErrNo = ErrNo::RegistExistingSparseTable;
    const PICK_NONEXISTENT: ErrNo = ErrNo::PickNonexistentSparseTable;

    fn init(rule: &TrainingRule) -> Self {
        let conf = &rule.sparse;
        let mut value = Self::placeholder();

        value.lr_w = uniform_init(conf.lr.initial_range);
        clamp_weight(
            &mut value.lr_w,
            conf.lr.weight_lower_bound,
            conf.lr.weight_upper_bound,
        );

        value.fm_w = uniform_init(conf.fm.initial_range);
        clamp_weight(
            &mut value.fm_w,
            conf.fm.weight_lower_bound,
            conf.fm.weight_upper_bound,
        );
        value.fm_v = (0..conf.fm.dim)
            .map(|_| {
                let mut x = uniform_init(conf.fm.initial_range);
                clamp_weight(&mut x, conf.fm.weight_lower_bound, conf.fm.weight_upper_bound);
                x
            })
            .collect();

        value.mf_w = uniform_init(conf.mf.initial_range);
        clamp_weight(
            &mut value.mf_w,
            conf.mf.weight_lower_bound,
            conf.mf.weight_upper_bound,
        );
        value.mf_v = (0..conf.mf.dim)
            .map(|_| {
                let mut x = uniform_init(conf.mf.initial_range);
                clamp_weight(&mut x, conf.mf.weight_lower_bound, conf.mf.weight_upper_bound);
                x
            })
            .collect();

        value.wide_w = uniform_init(conf.wide.initial_range);
        clamp_weight(
            &mut value.wide_w,
            conf.wide.weight_lower_bound,
            conf.wide.weight_upper_bound,
        );

        value
    }

    fn placeholder() -> Self {
        Self::default()
    }

    fn set_slot(&mut self, slot: SparseSlot) {
        self.slot = slot;
    }

    fn apply_push(&mut self, grad: &Self, rule: &TrainingRule) {
        let conf = &rule.sparse;

        self.silent_days = 0;
        self.show += grad.show;
        self.clk += grad.clk;

        // Storage may be ahead of the worker that produced this gradient.
        let version_diff = self.version.saturating_sub(grad.version);

        adagrad(
            std::slice::from_mut(&mut self.lr_w),
            std::slice::from_ref(&grad.lr_w),
            grad.show,
            conf.lr.learning_rate,
            &mut self.lr_g2sum,
            conf.lr.initial_g2sum,
            conf.lr.weight_lower_bound,
            conf.lr.weight_upper_bound,
            conf.lr.version_aware,
            version_diff,
        );

        adagrad(
            std::slice::from_mut(&mut self.fm_w),
            std::slice::from_ref(&grad.fm_w),
            grad.show,
            conf.fm.learning_rate,
            &mut self.fm_w_g2sum,
            conf.fm.initial_g2sum,
            conf.fm.weight_lower_bound,
            conf.fm.weight_upper_bound,
            conf.fm.version_aware,
            version_diff,
        );
        if !grad.fm_v.is_empty() && !self.fm_v.is_empty() {
            adagrad(
                &mut self.fm_v,
                &grad.fm_v,
                grad.show,
                conf.fm.learning_rate,
                &mut self.fm_v_g2sum,
                conf.fm.initial_g2sum,
                conf.fm.weight_lower_bound,
                conf.fm.weight_upper_bound,
                conf.fm.version_aware,
                version_diff,
            );
        }

        adagrad(
            std::slice::from_mut(&mut self.mf_w),
            std::slice::from_ref(&grad.mf_w),
            grad.show,
            conf.mf.learning_rate,
            &mut self.mf_w_g2sum,
            conf.mf.initial_g2sum,
            conf.mf.weight_lower_bound,
            conf.mf.weight_upper_bound,
            conf.mf.version_aware,
            version_diff,
        );
        if !grad.mf_v.is_empty() && !self.mf_v.is_empty() {
            adagrad(
                &mut self.mf_v,
                &grad.mf_v,
                grad.show,
                conf.mf.learning_rate,
                &mut self.mf_v_g2sum,
                conf.mf.initial_g2sum,
                conf.mf.weight_lower_bound,
                conf.mf.weight_upper_bound,
                conf.mf.version_aware,
                version_diff,
            );
        }

        adagrad(
            std::slice::from_mut(&mut self.wide_w),
            std::slice::from_ref(&grad.wide_w),
            grad.show,
            conf.wide.learning_rate,
            &mut self.wide_g2sum,
            conf.wide.initial_g2sum,
            conf.wide.weight_lower_bound,
            conf.wide.weight_upper_bound,
            conf.wide.version_aware,
            version_diff,
        );

        self.version += 1;
        self.delta_score +=
            (grad.show - grad.clk) * conf.nonclk_coeff + grad.clk * conf.clk_coeff;
    }

    fn merge(&mut self, other: &Self) {
        self.show += other.show;
        self.clk += other.clk;

        self.lr_w += other.lr_w;

        self.fm_w += other.fm_w;
        for (a, b) in self.fm_v.iter_mut().zip(&other.fm_v) {
            *a += b;
        }

        self.mf_w += other.mf_w;
        for (a, b) in self.mf_v.iter_mut().zip(&other.mf_v) {
            *a += b;
        }

        self.wide_w += other.wide_w;
        self.version = self.version.min(other.version);
    }

    fn time_decay(&mut self, rule: &TrainingRule) {
        self.silent_days += 1;
        self.show *= rule.sparse.cvm.decay_rate;
        self.clk *= rule.sparse.cvm.decay_rate;
    }

    fn should_evict(&self, rule: &TrainingRule) -> bool {
        let conf = &rule.sparse;
        let score = (self.show - self.clk) * conf.nonclk_coeff + self.clk * conf.clk_coeff;
        score < conf.delete_threshold || self.silent_days > conf.delete_after_silent_days
    }

    fn save_line(&self, key: SparseKey) -> String {
        let mut line = format!(
            "{} {} {} {} {:.6} {:.6} {:.6}",
            key, self.slot, self.silent_days, self.version, self.delta_score, self.show, self.clk
        );
        let _ = write!(line, " {:.6} {:.6}", self.lr_w, self.lr_g2sum);
        let _ = write!(line, " {:.6} {:.6} {}", self.fm_w, self.fm_w_g2sum, self.fm_v.len());
        for x in &self.fm_v {
            let _ = write!(line, " {:.6}", x);
        }
        let _ = write!(line, " {:.6}", self.fm_v_g2sum);
        let _ = write!(line, " {:.6} {:.6} {}", self.mf_w, self.mf_w_g2sum, self.mf_v.len());
        for x in &self.mf_v {
            let _ = write!(line, " {:.6}", x);
        }
        let _ = write!(line, " {:.6}", self.mf_v_g2sum);
        let _ = write!(line, " {:.6} {:.6}", self.wide_w, self.wide_g2sum);
        line
    }
}

impl Archivable for SparseValue {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_u32(self.slot);
        ar.put_u64(self.version);
        ar.put_f32(self.delta_score);
        ar.put_i32(self.silent_days);
        ar.put_f32(self.show);
        ar.put_f32(self.clk);
        ar.put_f32(self.lr_w);
        ar.put_f32(self.lr_g2sum);
        ar.put_f32(self.fm_w);
        ar.put_f32(self.fm_w_g2sum);
        ar.put_vec(&self.fm_v);
        ar.put_f32(self.fm_v_g2sum);
        ar.put_f32(self.mf_w);
        ar.put_f32(self.mf_w_g2sum);
        ar.put_vec(&self.mf_v);
        ar.put_f32(self.mf_v_g2sum);
        ar.put_f32(self.wide_w);
        ar.put_f32(self.wide_g2sum);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            slot: ar.get_u32()?,
            version: ar.get_u64()?,
            delta_score: ar.get_f32()?,
            silent_days: ar.get_i32()?,
            show: ar.get_f32()?,
            clk: ar.get_f32()?,
            lr_w: ar.get_f32()?,
            lr_g2sum: ar.get_f32()?,
            fm_w: ar.get_f32()?,
            fm_w_g2sum: ar.get_f32()?,
            fm_v: ar.get_vec()?,
            fm_v_g2sum: ar.get_f32()?,
            mf_w: ar.get_f32()?,
            mf_w_g2sum: ar.get_f32()?,
            mf_v: ar.get_vec()?,
            mf_v_g2sum: ar.get_f32()?,
            wide_w: ar.get_f32()?,
            wide_g2sum: ar.get_f32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> TrainingRule {
        TrainingRule::default()
    }

    #[test]
    fn test_init_respects_dims_and_bounds() {
        let rule = rule();
        let v = SparseValue::init(&rule);
        assert_eq!(v.fm_v.len(), rule.sparse.fm.dim);
        assert_eq!(v.mf_v.len(), rule.sparse.mf.dim);
        assert_eq!(v.version, 0);
        assert_eq!(v.silent_days, 0);
        let r = rule.sparse.lr.initial_range;
        assert!(v.lr_w >= -r && v.lr_w <= r);
    }

    #[test]
    fn test_push_moves_weight_toward_gradient() {
        let rule = rule();
        let mut v = SparseValue::init(&rule);
        v.lr_w = 0.0;

        let mut grad = SparseValue::placeholder();
        grad.show = 1.0;
        grad.clk = 1.0;
        grad.lr_w = 0.1;
        v.apply_push(&grad, &rule);

        assert_eq!(v.version, 1);
        assert_eq!(v.silent_days, 0);
        assert_eq!(v.show, 1.0);
        assert_eq!(v.clk, 1.0);
        assert!(v.lr_w > 0.0);
        assert!(v.lr_g2sum > 0.0);
    }

    #[test]
    fn test_push_uses_pre_update_accumulator() {
        let rule = rule();
        let mut fresh = SparseValue::placeholder();
        let mut worn = SparseValue::placeholder();
        worn.lr_g2sum = 100.0;

        let mut grad = SparseValue::placeholder();
        grad.show = 1.0;
        grad.lr_w = 1.0;
        fresh.apply_push(&grad, &rule);
        worn.apply_push(&grad, &rule);

        // A larger accumulated g2sum must damp the step.
        assert!(fresh.lr_w.abs() > worn.lr_w.abs());
    }

    #[test]
    fn test_zero_show_gradient_scales_by_one() {
        let rule = rule();
        let mut a = SparseValue::placeholder();
        let mut b = SparseValue::placeholder();

        let mut g_zero = SparseValue::placeholder();
        g_zero.show = 0.0;
        g_zero.lr_w = 0.5;
        let mut g_one = SparseValue::placeholder();
        g_one.show = 1.0;
        g_one.lr_w = 0.5;

        a.apply_push(&g_zero, &rule);
        b.apply_push(&g_one, &rule);
        assert_eq!(a.lr_w, b.lr_w);
    }

    #[test]
    fn test_merge_adds_fields_and_keeps_oldest_version() {
        let mut a = SparseValue::placeholder();
        a.show = 2.0;
        a.lr_w = 0.5;
        a.fm_v = vec![1.0, 2.0];
        a.version = 7;

        let mut b = SparseValue::placeholder();
        b.show = 3.0;
        b.clk = 1.0;
        b.lr_w = 0.25;
        b.fm_v = vec![0.5, 0.5];
        b.version = 4;

        a.merge(&b);
        assert_eq!(a.show, 5.0);
        assert_eq!(a.clk, 1.0);
        assert_eq!(a.lr_w, 0.75);
        assert_eq!(a.fm_v, vec![1.5, 2.5]);
        assert_eq!(a.version, 4);
    }

    #[test]
    fn test_time_decay_ages_and_decays() {
        let rule = rule();
        let mut v = SparseValue::placeholder();
        v.show = 10.0;
        v.clk = 5.0;
        v.time_decay(&rule);
        assert_eq!(v.silent_days, 1);
        assert_eq!(v.show, 10.0 * rule.sparse.cvm.decay_rate);
        assert_eq!(v.clk, 5.0 * rule.sparse.cvm.decay_rate);
    }

    #[test]
    fn test_shrink_score_thresholds() {
        let mut rule = rule();
        rule.sparse.nonclk_coeff = 1.0;
        rule.sparse.clk_coeff = 1.0;

        let mut v = SparseValue::placeholder();
        v.show = 10.0;
        v.clk = 0.0;

        rule.sparse.delete_threshold = 5.0;
        assert!(!v.should_evict(&rule));
        rule.sparse.delete_threshold = 15.0;
        assert!(v.should_evict(&rule));
    }

    #[test]
    fn test_shrink_on_silence_alone() {
        let mut rule = rule();
        rule.sparse.delete_threshold = -1.0;
        rule.sparse.delete_after_silent_days = 3;

        let mut v = SparseValue::placeholder();
        v.show = 100.0;
        v.silent_days = 4;
        assert!(v.should_evict(&rule));
        v.silent_days = 3;
        assert!(!v.should_evict(&rule));
    }

    #[test]
    fn test_archive_round_trip() {
        let rule = rule();
        let mut v = SparseValue::init(&rule);
        v.show = 3.0;
        v.version = 9;
        let mut ar = BinaryArchive::new();
        v.put(&mut ar);
        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert_eq!(SparseValue::get(&mut rd).unwrap(), v);
    }

    #[test]
    fn test_save_line_field_order() {
        let mut v = SparseValue::placeholder();
        v.slot = 3;
        v.fm_v = vec![0.5];
        v.mf_v = vec![0.25, 0.125];
        let line = v.save_line(42);
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields[0], "42");
        assert_eq!(fields[1], "3");
        // key slot silent version score show clk | lr 2 | fm 2+1+len+1 | mf 2+1+len+1 | wide 2
        assert_eq!(fields.len(), 7 + 2 + (3 + 1 + 1) + (3 + 2 + 1) + 2);
        assert_eq!(fields[11], "1");
        assert_eq!(fields[16], "2");
    }
}
