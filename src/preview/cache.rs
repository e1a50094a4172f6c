//! Bounded store of encoded preview frames keyed by half-second buckets.
//!
//! Eviction is FIFO: once the cache is full, the entry that was inserted
//! first goes, regardless of how recently it was read. Scrubbing tends to
//! revisit the region that was just prefetched, so insertion order is a good
//! enough proxy for usefulness.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Number of buckets per second of media.
pub const BUCKETS_PER_SECOND: f64 = 2.0;

/// Default maximum number of cached frames.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// A timestamp quantized to half-second resolution: `floor(t * 2) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket(u64);

impl TimeBucket {
    /// Quantize a timestamp in seconds. Negative and non-finite values map to bucket zero.
    pub fn from_secs(timestamp: f64) -> Self {
        if !timestamp.is_finite() || timestamp <= 0.0 {
            return Self(0);
        }
        Self((timestamp * BUCKETS_PER_SECOND).floor() as u64)
    }

    pub fn from_index(index: u64) -> Self {
        Self(index)
    }

    pub fn index(self) -> u64 {
        self.0
    }

    /// Start of the bucket in seconds.
    pub fn as_secs(self) -> f64 {
        self.0 as f64 / BUCKETS_PER_SECOND
    }

    /// Every bucket that starts inside `[start, end)`.
    pub fn range(start: f64, end: f64) -> impl Iterator<Item = TimeBucket> {
        let first = (start.max(0.0) * BUCKETS_PER_SECOND).ceil() as u64;
        let last = (end.max(0.0) * BUCKETS_PER_SECOND).ceil() as u64;
        (first..last).map(TimeBucket)
    }
}

/// An encoded still image for one bucket. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFrame {
    pub bucket: TimeBucket,
    pub data: Arc<[u8]>,
}

impl CachedFrame {
    pub fn new(bucket: TimeBucket, data: Vec<u8>) -> Self {
        Self {
            bucket,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub struct FrameCache {
    entries: HashMap<TimeBucket, CachedFrame>,
    order: VecDeque<TimeBucket>,
    max_entries: usize,
}

impl FrameCache {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: HashMap::with_capacity(max_entries),
            order: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    pub fn get(&self, timestamp: f64) -> Option<&CachedFrame> {
        self.entries.get(&TimeBucket::from_secs(timestamp))
    }

    pub fn contains(&self, bucket: TimeBucket) -> bool {
        self.entries.contains_key(&bucket)
    }

    /// Store `data` under the bucket of `timestamp`.
    ///
    /// Replacing an existing bucket keeps its original insertion slot.
    /// Returns the evicted bucket, if any.
    pub fn put(&mut self, timestamp: f64, data: Vec<u8>) -> Option<TimeBucket> {
        let bucket = TimeBucket::from_secs(timestamp);
        self.insert(CachedFrame::new(bucket, data))
    }

    pub fn insert(&mut self, frame: CachedFrame) -> Option<TimeBucket> {
        let bucket = frame.bucket;
        if self.entries.insert(bucket, frame).is_some() {
            return None;
        }
        self.order.push_back(bucket);

        if self.order.len() > self.max_entries {
            let oldest = self.order.pop_front()?;
            self.entries.remove(&oldest);
            return Some(oldest);
        }
        None
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Sum of encoded frame sizes currently held.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(CachedFrame::len).sum()
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_quantization() {
        assert_eq!(TimeBucket::from_secs(7.3).as_secs(), 7.0);
        assert_eq!(TimeBucket::from_secs(7.5).as_secs(), 7.5);
        assert_eq!(TimeBucket::from_secs(7.99).as_secs(), 7.5);
        assert_eq!(TimeBucket::from_secs(-3.0).as_secs(), 0.0);
        assert_eq!(TimeBucket::from_secs(f64::NAN).as_secs(), 0.0);
    }

    #[test]
    fn test_same_window_collides() {
        let mut cache = FrameCache::new(10);
        cache.put(7.3, vec![1, 2, 3]);

        let a = cache.get(7.0).cloned();
        let b = cache.get(7.49).cloned();
        assert!(a.is_some());
        assert_eq!(a, b);
        assert!(cache.get(7.5).is_none());
        assert!(cache.get(6.99).is_none());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = FrameCache::new(3);
        cache.put(0.0, vec![0]);
        cache.put(0.5, vec![1]);
        cache.put(1.0, vec![2]);

        // Reading the oldest entry does not protect it
        assert!(cache.get(0.0).is_some());

        let evicted = cache.put(1.5, vec![3]);
        assert_eq!(evicted, Some(TimeBucket::from_secs(0.0)));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(0.0).is_none());
        assert!(cache.get(0.5).is_some());
        assert!(cache.get(1.0).is_some());
        assert!(cache.get(1.5).is_some());
    }

    #[test]
    fn test_size_never_exceeds_maximum() {
        let mut cache = FrameCache::new(5);
        for i in 0..40 {
            cache.put(i as f64 * 0.5, vec![i as u8]);
            assert!(cache.len() <= 5);
        }
        // Buckets 0.0 to 19.5 went in; only the last five remain
        assert_eq!(cache.len(), 5);
        assert!(cache.get(17.5).is_some());
        assert!(cache.get(19.5).is_some());
        assert!(cache.get(17.0).is_none());
        assert!(cache.get(15.0).is_none());
    }

    #[test]
    fn test_replace_keeps_insertion_slot() {
        let mut cache = FrameCache::new(2);
        cache.put(0.0, vec![0]);
        cache.put(0.5, vec![1]);
        assert_eq!(cache.put(0.2, vec![9]), None);
        assert_eq!(cache.get(0.0).map(|f| f.data.to_vec()), Some(vec![9]));

        // Bucket 0.0 is still the oldest
        assert_eq!(cache.put(1.0, vec![2]), Some(TimeBucket::from_secs(0.0)));
    }

    #[test]
    fn test_clear() {
        let mut cache = FrameCache::default();
        cache.put(1.0, vec![1, 2]);
        cache.put(2.0, vec![3]);
        assert_eq!(cache.total_bytes(), 3);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(1.0).is_none());
        assert_eq!(cache.max_entries(), DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn test_bucket_range() {
        let buckets: Vec<f64> = TimeBucket::range(10.0, 12.0).map(|b| b.as_secs()).collect();
        assert_eq!(buckets, vec![10.0, 10.5, 11.0, 11.5]);

        // A trailing partial bucket is still covered
        assert_eq!(TimeBucket::range(10.0, 12.2).count(), 5);
        assert_eq!(TimeBucket::range(0.0, 5.0).count(), 10);
        assert_eq!(TimeBucket::range(3.0, 3.0).count(), 0);
    }
}
