//! Sparse feature identity.

use sparseps_archive::{Archivable, BinaryArchive, Result as ArchiveResult};

/// 64-bit feature sign. Storage identity for both sparse table families.
pub type SparseKey = u64;

/// Feature-group tag carried next to the sign.
pub type SparseSlot = u32;

/// A feature reference as it travels on the wire.
///
/// Lookup is by `sign` alone; `slot` tags the feature group and is copied
/// into freshly created values. Two features with equal signs but different
/// slots therefore share one stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SparseFeature {
    pub sign: SparseKey,
    pub slot: SparseSlot,
}

impl SparseFeature {
    pub fn new(sign: SparseKey, slot: SparseSlot) -> Self {
        Self { sign, slot }
    }
}

impl Archivable for SparseFeature {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_u64(self.sign);
        ar.put_u32(self.slot);
    }

    fn get(ar: &mut BinaryArchive) -> ArchiveResult<Self> {
        Ok(Self {
            sign: ar.get_u64()?,
            slot: ar.get_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_round_trip() {
        let feats = vec![SparseFeature::new(42, 3), SparseFeature::new(u64::MAX, 0)];
        let mut ar = BinaryArchive::new();
        ar.put_vec(&feats);
        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert_eq!(rd.get_vec::<SparseFeature>().unwrap(), feats);
    }
}
