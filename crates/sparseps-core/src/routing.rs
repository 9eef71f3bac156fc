//! Partition arithmetic shared by tables and clients.
//!
//! Sparse keys route by straight modulo over the sign (not a hash), both
//! table-side (`sign % shard_count`) and client-side (`sign % world_size`).
//! Dense and summary tables carve contiguous index ranges: shards inside one
//! rank get `total / n` elements with the remainder spread over the first
//! `total % n` shards, and ranks split the logical array at `i * total / n`.

/// Bucket index for a sparse sign over `n` buckets.
pub fn sparse_bucket(sign: u64, n: usize) -> usize {
    (sign % n as u64) as usize
}

/// Splits `items` into `n` modulo buckets, keeping a parallel mapping of
/// original positions so gathered results can be written back in input order.
pub fn partition_with_mapping<T: Clone>(
    items: &[T],
    n: usize,
    sign_of: impl Fn(&T) -> u64,
) -> (Vec<Vec<T>>, Vec<Vec<usize>>) {
    let mut buckets = vec![Vec::new(); n];
    let mut mapping = vec![Vec::new(); n];
    for (i, item) in items.iter().enumerate() {
        let b = sparse_bucket(sign_of(item), n);
        buckets[b].push(item.clone());
        mapping[b].push(i);
    }
    (buckets, mapping)
}

/// Per-shard lengths for a dense/summary table of `total` elements over
/// `n` shards. The first `total % n` shards carry one extra element.
pub fn shard_lengths(total: u64, n: usize) -> Vec<u64> {
    (0..n as u64)
        .map(|i| total / n as u64 + u64::from(i < total % n as u64))
        .collect()
}

/// `[begin, end)` ranges matching [`shard_lengths`].
pub fn shard_ranges(total: u64, n: usize) -> Vec<(u64, u64)> {
    let mut ranges = Vec::with_capacity(n);
    let mut begin = 0;
    for len in shard_lengths(total, n) {
        ranges.push((begin, begin + len));
        begin += len;
    }
    ranges
}

/// Rank boundary offsets over the logical dense array: `n + 1` entries with
/// rank `i` owning `[boundaries[i], boundaries[i + 1])`.
pub fn rank_boundaries(total: u64, n: usize) -> Vec<u64> {
    (0..=n as u64).map(|i| i * total / n as u64).collect()
}
