//! Ring buffer store for received records

use crate::metrics;
use crate::storage::{StorageLevel, Store};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ring buffer for records
///
/// When full, oldest records are dropped (FIFO eviction).
/// The receiver pushes one record at a time; a consumer drains batches.
pub struct RingBuffer<T> {
    records: Mutex<VecDeque<T>>,
    capacity: usize,
    storage_level: StorageLevel,
    metrics: BufferMetrics,
}

/// Metrics for buffer monitoring
#[derive(Default)]
pub struct BufferMetrics {
    /// Total records pushed
    pub pushed: AtomicU64,
    /// Total records dropped due to full buffer
    pub dropped: AtomicU64,
    /// Total records drained
    pub drained: AtomicU64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self::with_storage_level(capacity, StorageLevel::default())
    }

    /// Create a ring buffer that records the durability it was asked for
    ///
    /// A capacity of zero is raised to one.
    pub fn with_storage_level(capacity: usize, storage_level: StorageLevel) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            storage_level,
            metrics: BufferMetrics::default(),
        }
    }

    /// Push a single record
    ///
    /// Returns true if an older record had to be evicted to make room.
    pub fn push(&self, record: T) -> bool {
        let mut buffer = self.records.lock();
        let evicted = buffer.len() >= self.capacity;
        if evicted {
            buffer.pop_front();
        }
        buffer.push_back(record);
        let len = buffer.len();
        drop(buffer);

        self.metrics.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::try_record_dropped("buffer_full", 1);
        }
        metrics::try_set_buffer_size(len);

        evicted
    }

    /// Drain up to `n` records from the buffer
    ///
    /// Returns the drained records in FIFO order.
    pub fn drain(&self, n: usize) -> Vec<T> {
        let mut buffer = self.records.lock();
        let drain_count = n.min(buffer.len());
        let records: Vec<T> = buffer.drain(..drain_count).collect();
        let len = buffer.len();
        drop(buffer);

        self.metrics
            .drained
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        metrics::try_set_buffer_size(len);

        records
    }

    /// Drain everything currently buffered
    pub fn drain_all(&self) -> Vec<T> {
        self.drain(usize::MAX)
    }

    /// Get current number of records in buffer
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Durability requested by whoever built this buffer
    pub fn storage_level(&self) -> StorageLevel {
        self.storage_level
    }

    /// Get current fill percentage (0.0 - 1.0)
    pub fn fill_ratio(&self) -> f64 {
        let len = self.records.lock().len();
        len as f64 / self.capacity as f64
    }

    /// Get total records pushed
    pub fn total_pushed(&self) -> u64 {
        self.metrics.pushed.load(Ordering::Relaxed)
    }

    /// Get total records dropped
    pub fn total_dropped(&self) -> u64 {
        self.metrics.dropped.load(Ordering::Relaxed)
    }

    /// Get total records drained
    pub fn total_drained(&self) -> u64 {
        self.metrics.drained.load(Ordering::Relaxed)
    }
}

impl<T: Send> Store<T> for RingBuffer<T> {
    fn store(&self, record: T) {
        self.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(i: usize) -> String {
        format!("record-{i}")
    }

    #[test]
    fn test_push_and_drain() {
        let buffer = RingBuffer::new(10);

        for i in 0..5 {
            assert!(!buffer.push(make_record(i)));
        }
        assert_eq!(buffer.len(), 5);

        let drained = buffer.drain(3);
        assert_eq!(drained, vec!["record-0", "record-1", "record-2"]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = RingBuffer::new(3);

        let evictions = (0..5).filter(|i| buffer.push(make_record(*i))).count();

        assert_eq!(evictions, 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.drain_all(), vec!["record-2", "record-3", "record-4"]);
    }

    #[test]
    fn test_store_appends_in_order() {
        let buffer = RingBuffer::new(10);
        buffer.store("a".to_string());
        buffer.store("b".to_string());
        assert_eq!(buffer.drain_all(), vec!["a", "b"]);
    }

    #[test]
    fn test_fill_ratio() {
        let buffer = RingBuffer::new(100);
        for i in 0..50 {
            buffer.push(i);
        }
        assert!((buffer.fill_ratio() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_metrics() {
        let buffer = RingBuffer::new(5);
        for i in 0..10 {
            buffer.push(i);
        }
        assert_eq!(buffer.total_pushed(), 10);
        assert_eq!(buffer.total_dropped(), 5);

        buffer.drain(5);
        assert_eq!(buffer.total_drained(), 5);
    }

    #[test]
    fn test_zero_capacity_holds_one_record() {
        let buffer = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);

        assert!(!buffer.push("a"));
        assert!(buffer.push("b"));
        assert_eq!(buffer.fill_ratio(), 1.0);
        assert_eq!(buffer.drain_all(), vec!["b"]);
        assert_eq!(buffer.fill_ratio(), 0.0);
    }

    #[test]
    fn test_storage_level_passthrough() {
        let buffer: RingBuffer<String> =
            RingBuffer::with_storage_level(8, StorageLevel::MEMORY_ONLY);
        assert_eq!(buffer.storage_level(), StorageLevel::MEMORY_ONLY);
    }
}
