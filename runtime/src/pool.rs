//! Buffer pool for chunked reads.
//!
//! Provides pooled buffers that can be reused to reduce allocation overhead. Sources fill pooled
//! buffers with chunks of their input and the transport assembles spans that straddle chunks
//! into pooled buffers.
//!
//! # Thread Safety
//!
//! [BufferPool] is `Send + Sync` and can be shared by sessions on different threads.
//! Allocation and deallocation are lock-free operations using atomic counters and a lock-free
//! queue ([crossbeam_queue::ArrayQueue]).
//!
//! # Pool Lifecycle
//!
//! Buffers hold a weak reference to the pool, so:
//! - If a buffer is returned after the pool is dropped, it is deallocated directly instead of
//!   being returned to the freelist.
//! - The pool can be dropped while buffers are still in use.
//!
//! # Size Classes
//!
//! Buffers are organized into power-of-two size classes from `min_size` to `max_size`. For
//! example, with `min_size = 4096` and `max_size = 32768`:
//! - Class 0: 4096 bytes
//! - Class 1: 8192 bytes
//! - Class 2: 16384 bytes
//! - Class 3: 32768 bytes
//!
//! Allocation requests are rounded up to the next size class. Requests larger than `max_size`
//! return [PoolError::Oversized] from [BufferPool::try_alloc], or fall back to an untracked heap
//! allocation from [BufferPool::alloc].

use crate::NZUsize;
use bytes::Buf;
use crossbeam_queue::ArrayQueue;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};
use thiserror::Error;
use tracing::{debug, trace};

/// Error returned when buffer pool allocation fails.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The requested capacity exceeds the maximum buffer size.
    #[error("requested capacity exceeds maximum buffer size")]
    Oversized,
    /// The pool is exhausted for the required size class.
    #[error("pool exhausted for required size class")]
    Exhausted,
}

/// Configuration for a buffer pool.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum buffer size. Must be a power of two.
    pub min_size: NonZeroUsize,
    /// Maximum buffer size. Must be a power of two and >= min_size.
    pub max_size: NonZeroUsize,
    /// Maximum number of buffers per size class.
    pub max_per_class: NonZeroUsize,
    /// Whether to pre-allocate all buffers on pool creation.
    pub prefill: bool,
}

impl Default for Config {
    /// 4KB to 1MB buffers, 32 per class, not prefilled.
    fn default() -> Self {
        Self {
            min_size: NZUsize!(4 * 1024),
            max_size: NZUsize!(1024 * 1024),
            max_per_class: NZUsize!(32),
            prefill: false,
        }
    }
}

impl Config {
    /// Validates the configuration, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - `min_size` is not a power of two
    /// - `max_size` is not a power of two
    /// - `max_size < min_size`
    fn validate(&self) {
        assert!(
            self.min_size.is_power_of_two(),
            "min_size must be a power of two"
        );
        assert!(
            self.max_size.is_power_of_two(),
            "max_size must be a power of two"
        );
        assert!(
            self.max_size >= self.min_size,
            "max_size must be >= min_size"
        );
    }

    /// Returns the number of size classes.
    fn num_classes(&self) -> usize {
        if self.max_size < self.min_size {
            return 0;
        }
        // Classes are: min_size, min_size*2, min_size*4, ..., max_size
        (self.max_size.get() / self.min_size.get()).trailing_zeros() as usize + 1
    }

    /// Returns the size class index for a given size.
    /// Returns None if size > max_size.
    fn class_index(&self, size: usize) -> Option<usize> {
        if size > self.max_size.get() {
            return None;
        }
        if size <= self.min_size.get() {
            return Some(0);
        }
        // Find the smallest power-of-two class that fits
        let size_class = size.next_power_of_two();
        let index = (size_class / self.min_size.get()).trailing_zeros() as usize;
        if index < self.num_classes() {
            Some(index)
        } else {
            None
        }
    }

    /// Returns the buffer size for a given class index.
    const fn class_size(&self, index: usize) -> usize {
        self.min_size.get() << index
    }
}

/// Label for buffer pool metrics, identifying the size class.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SizeClassLabel {
    size_class: u64,
}

/// Metrics for the buffer pool.
struct PoolMetrics {
    /// Number of buffers currently allocated (out of pool).
    allocated: Family<SizeClassLabel, Gauge>,
    /// Number of buffers available in the pool.
    available: Family<SizeClassLabel, Gauge>,
    /// Total number of successful allocations.
    allocations_total: Family<SizeClassLabel, Counter>,
    /// Total number of failed allocations (pool exhausted).
    exhausted_total: Family<SizeClassLabel, Counter>,
    /// Total number of oversized allocation requests.
    oversized_total: Counter,
}

impl PoolMetrics {
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            allocated: Family::default(),
            available: Family::default(),
            allocations_total: Family::default(),
            exhausted_total: Family::default(),
            oversized_total: Counter::default(),
        };

        registry.register(
            "buffer_pool_allocated",
            "Number of buffers currently allocated from the pool",
            metrics.allocated.clone(),
        );
        registry.register(
            "buffer_pool_available",
            "Number of buffers available in the pool",
            metrics.available.clone(),
        );
        registry.register(
            "buffer_pool_allocations_total",
            "Total number of successful buffer allocations",
            metrics.allocations_total.clone(),
        );
        registry.register(
            "buffer_pool_exhausted_total",
            "Total number of failed allocations due to pool exhaustion",
            metrics.exhausted_total.clone(),
        );
        registry.register(
            "buffer_pool_oversized_total",
            "Total number of allocation requests exceeding max buffer size",
            metrics.oversized_total.clone(),
        );

        metrics
    }
}

/// Per-size-class state.
///
/// The freelist stores `Option<Box<[u8]>>` where:
/// - `Some(buf)` = a reusable buffer
/// - `None` = an available slot for creating a new buffer
struct SizeClass {
    /// The buffer size for this class.
    size: usize,
    /// Free list storing either reusable buffers or empty slots.
    freelist: ArrayQueue<Option<Box<[u8]>>>,
    /// Number of buffers currently allocated (out of pool).
    allocated: AtomicUsize,
}

impl SizeClass {
    fn new(size: usize, max_buffers: usize, prefill: bool) -> Self {
        let freelist = ArrayQueue::new(max_buffers);
        for _ in 0..max_buffers {
            let entry = prefill.then(|| allocate(size));
            let _ = freelist.push(entry);
        }
        Self {
            size,
            freelist,
            allocated: AtomicUsize::new(0),
        }
    }
}

fn allocate(size: usize) -> Box<[u8]> {
    vec![0u8; size].into_boxed_slice()
}

/// Internal state of the buffer pool.
struct BufferPoolInner {
    config: Config,
    classes: Vec<SizeClass>,
    metrics: PoolMetrics,

    /// Loans handed out (pooled or untracked) since creation.
    loans: AtomicUsize,
    /// Loans not yet dropped.
    outstanding: AtomicUsize,
}

impl BufferPoolInner {
    /// Try to allocate a buffer from the given size class.
    fn try_alloc(&self, class_index: usize) -> Option<Box<[u8]>> {
        let class = &self.classes[class_index];
        let label = SizeClassLabel {
            size_class: class.size as u64,
        };

        match class.freelist.pop() {
            Some(Some(buffer)) => {
                // Reuse existing buffer
                class.allocated.fetch_add(1, Ordering::Relaxed);
                self.metrics.allocations_total.get_or_create(&label).inc();
                self.metrics.allocated.get_or_create(&label).inc();
                self.metrics.available.get_or_create(&label).dec();
                Some(buffer)
            }
            Some(None) => {
                // Create new buffer (we have a slot)
                class.allocated.fetch_add(1, Ordering::Relaxed);
                self.metrics.allocations_total.get_or_create(&label).inc();
                self.metrics.allocated.get_or_create(&label).inc();
                Some(allocate(class.size))
            }
            None => {
                // Pool exhausted (no slots available)
                self.metrics.exhausted_total.get_or_create(&label).inc();
                trace!(size_class = class.size, "buffer pool exhausted");
                None
            }
        }
    }

    /// Return a buffer to the pool.
    fn return_buffer(&self, class_index: usize, buffer: Box<[u8]>) {
        let class = &self.classes[class_index];
        let label = SizeClassLabel {
            size_class: class.size as u64,
        };

        class.allocated.fetch_sub(1, Ordering::Relaxed);
        self.metrics.allocated.get_or_create(&label).dec();

        // A full freelist drops (and deallocates) the buffer
        if class.freelist.push(Some(buffer)).is_ok() {
            self.metrics.available.get_or_create(&label).inc();
        }
    }

    fn lend(&self) {
        self.loans.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_add(1, Ordering::Relaxed);
    }
}

/// A snapshot of pool usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Buffers handed out (pooled or untracked) since the pool was created.
    pub allocations: usize,
    /// Buffers handed out and not yet dropped.
    pub outstanding: usize,
}

/// A pool of reusable buffers.
///
/// Buffers are organized into power-of-two size classes. When a buffer is requested, the
/// smallest size class that fits is used. Buffers are automatically returned to the pool when
/// dropped.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.inner.config)
            .field("num_classes", &self.inner.classes.len())
            .finish()
    }
}

impl BufferPool {
    /// Creates a new buffer pool with the given configuration, registering its metrics.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: Config, registry: &mut Registry) -> Self {
        config.validate();

        let metrics = PoolMetrics::new(registry);

        let mut classes = Vec::with_capacity(config.num_classes());
        for i in 0..config.num_classes() {
            let size = config.class_size(i);
            let class = SizeClass::new(size, config.max_per_class.get(), config.prefill);
            classes.push(class);
        }

        // Update available metrics after prefill
        if config.prefill {
            for class in &classes {
                let label = SizeClassLabel {
                    size_class: class.size as u64,
                };
                let available = class.freelist.len() as i64;
                metrics.available.get_or_create(&label).set(available);
            }
        }

        Self {
            inner: Arc::new(BufferPoolInner {
                config,
                classes,
                metrics,
                loans: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocates an empty buffer with at least the given capacity.
    ///
    /// If the pool can provide a buffer (capacity within limits and pool not exhausted),
    /// returns a pooled buffer that will be returned to the pool when dropped. Otherwise,
    /// falls back to an untracked heap allocation that is deallocated when dropped.
    pub fn alloc(&self, capacity: usize) -> PooledBuf {
        self.try_alloc(capacity).unwrap_or_else(|err| {
            let size = capacity.max(self.inner.config.min_size.get());
            if err == PoolError::Oversized {
                debug!(capacity, "oversized buffer request, allocating untracked buffer");
            }
            self.inner.lend();
            PooledBuf::new(allocate(size), None, Arc::downgrade(&self.inner))
        })
    }

    /// Attempts to allocate a pooled buffer, returning an error on failure.
    ///
    /// Unlike [Self::alloc], this method does not fall back to untracked allocation.
    ///
    /// # Errors
    ///
    /// - [PoolError::Oversized]: `capacity` exceeds `max_size`
    /// - [PoolError::Exhausted]: Pool exhausted for required size class
    pub fn try_alloc(&self, capacity: usize) -> Result<PooledBuf, PoolError> {
        let Some(class_index) = self.inner.config.class_index(capacity) else {
            self.inner.metrics.oversized_total.inc();
            return Err(PoolError::Oversized);
        };

        let buffer = self
            .inner
            .try_alloc(class_index)
            .ok_or(PoolError::Exhausted)?;
        self.inner.lend();
        Ok(PooledBuf::new(
            buffer,
            Some(class_index),
            Arc::downgrade(&self.inner),
        ))
    }

    /// Returns a snapshot of the pool's usage counters.
    pub fn stats(&self) -> Stats {
        Stats {
            allocations: self.inner.loans.load(Ordering::Relaxed),
            outstanding: self.inner.outstanding.load(Ordering::Relaxed),
        }
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// A fixed-capacity buffer loaned from a [BufferPool].
///
/// # Buffer Layout
///
/// ```text
/// [0................cursor..............len.............capacity]
///  ^                 ^                   ^                 ^
///  |                 |                   |                 |
///  allocation start  read position       write position    allocation end
///                    (consumed prefix)   (filled)
/// ```
///
/// Bytes are appended with [PooledBuf::put_slice] (or written into [PooledBuf::spare_mut] and
/// published with [PooledBuf::commit]) and consumed through [Buf].
///
/// When dropped, the buffer is returned to its pool if tracked, or deallocated directly if
/// untracked.
pub struct PooledBuf {
    buffer: Option<Box<[u8]>>,
    /// Read cursor position (for `Buf` trait).
    cursor: usize,
    /// Number of bytes written.
    len: usize,
    /// Size class the buffer returns to, `None` if untracked.
    class: Option<usize>,
    /// Reference to the pool.
    pool: Weak<BufferPoolInner>,
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("cursor", &self.cursor)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

impl PooledBuf {
    fn new(buffer: Box<[u8]>, class: Option<usize>, pool: Weak<BufferPoolInner>) -> Self {
        Self {
            buffer: Some(buffer),
            cursor: 0,
            len: 0,
            class,
            pool,
        }
    }

    fn storage(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }

    /// Returns `true` if this buffer returns to a pool when dropped.
    pub fn is_tracked(&self) -> bool {
        self.class.is_some() && self.pool.strong_count() > 0
    }

    /// Returns the number of readable bytes remaining in the buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len - self.cursor
    }

    /// Returns true if no readable bytes remain.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.cursor == self.len
    }

    /// Returns the total number of bytes the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.storage().len()
    }

    /// Returns the number of bytes that can still be appended.
    pub fn remaining_mut(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends as much of `src` as fits, returning the number of bytes copied.
    pub fn put_slice(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.remaining_mut());
        self.spare_mut()[..n].copy_from_slice(&src[..n]);
        self.len += n;
        n
    }

    /// Returns the writable region after the filled bytes.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        match self.buffer.as_deref_mut() {
            Some(buffer) => &mut buffer[len..],
            None => &mut [],
        }
    }

    /// Marks `n` bytes of [PooledBuf::spare_mut] as filled.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [PooledBuf::remaining_mut].
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.remaining_mut(), "commit past end of buffer");
        self.len += n;
    }

    /// Consumes the next `len` readable bytes, returning a view of them.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `len` bytes are readable.
    pub fn consume(&mut self, len: usize) -> &[u8] {
        assert!(len <= self.len(), "consume past end of buffer");
        let start = self.cursor;
        self.cursor += len;
        &self.storage()[start..self.cursor]
    }
}

impl AsRef<[u8]> for PooledBuf {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.storage()[self.cursor..self.len]
    }
}

impl Buf for PooledBuf {
    #[inline]
    fn remaining(&self) -> usize {
        self.len()
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        self.as_ref()
    }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.len(), "advance past end of buffer");
        self.cursor += cnt;
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let Some(pool) = self.pool.upgrade() else {
            return;
        };
        pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        if let (Some(class), Some(buffer)) = (self.class, self.buffer.take()) {
            pool.return_buffer(class, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    fn test_registry() -> Registry {
        Registry::default()
    }

    fn test_config(min: usize, max: usize, per_class: usize) -> Config {
        Config {
            min_size: NZUsize!(min),
            max_size: NZUsize!(max),
            max_per_class: NZUsize!(per_class),
            prefill: false,
        }
    }

    #[test]
    fn test_config_classes() {
        let config = test_config(4096, 32768, 10);
        assert_eq!(config.num_classes(), 4);
        assert_eq!(config.class_index(1), Some(0));
        assert_eq!(config.class_index(4096), Some(0));
        assert_eq!(config.class_index(4097), Some(1));
        assert_eq!(config.class_index(32768), Some(3));
        assert_eq!(config.class_index(32769), None);
        assert_eq!(config.class_size(2), 16384);
    }

    #[test]
    #[should_panic(expected = "max_size must be >= min_size")]
    fn test_config_invalid_range() {
        let mut registry = test_registry();
        BufferPool::new(test_config(8192, 4096, 1), &mut registry);
    }

    #[test]
    #[should_panic(expected = "min_size must be a power of two")]
    fn test_config_not_power_of_two() {
        let mut registry = test_registry();
        BufferPool::new(test_config(3000, 4096, 1), &mut registry);
    }

    #[test]
    fn test_pool_reuse() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 256, 2), &mut registry);

        let buf = pool.try_alloc(100).unwrap();
        assert_eq!(buf.capacity(), 128);
        assert!(buf.is_tracked());
        assert_eq!(pool.inner.classes[1].allocated.load(Ordering::Relaxed), 1);
        drop(buf);
        assert_eq!(pool.inner.classes[1].allocated.load(Ordering::Relaxed), 0);
        assert_eq!(pool.inner.classes[1].freelist.len(), 2);

        let stats = pool.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 64, 2), &mut registry);

        let a = pool.try_alloc(64).unwrap();
        let b = pool.try_alloc(64).unwrap();
        assert_eq!(pool.try_alloc(64).unwrap_err(), PoolError::Exhausted);

        // Falls back to an untracked buffer
        let c = pool.alloc(64);
        assert!(!c.is_tracked());
        assert_eq!(pool.stats().outstanding, 3);

        drop((a, b, c));
        assert_eq!(pool.stats().outstanding, 0);
        assert!(pool.try_alloc(64).is_ok());
    }

    #[test]
    fn test_pool_oversized() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 128, 2), &mut registry);

        assert_eq!(pool.try_alloc(129).unwrap_err(), PoolError::Oversized);
        let buf = pool.alloc(1000);
        assert!(!buf.is_tracked());
        assert!(buf.capacity() >= 1000);
        assert_eq!(pool.stats().allocations, 1);
    }

    #[test]
    fn test_pool_prefill() {
        let mut registry = test_registry();
        let mut config = test_config(64, 128, 3);
        config.prefill = true;
        let pool = BufferPool::new(config, &mut registry);
        for class in &pool.inner.classes {
            assert_eq!(class.freelist.len(), 3);
            assert!(class.freelist.pop().unwrap().is_some());
        }
    }

    #[test]
    fn test_buffer_outlives_pool() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 64, 1), &mut registry);
        let mut buf = pool.alloc(10);
        drop(pool);
        assert!(!buf.is_tracked());
        assert_eq!(buf.put_slice(b"still usable"), 12);
        assert_eq!(buf.as_ref(), b"still usable");
    }

    #[test]
    fn test_put_and_consume() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(8, 8, 1), &mut registry);
        let mut buf = pool.alloc(8);
        assert!(buf.is_empty());

        assert_eq!(buf.put_slice(b"hello"), 5);
        assert_eq!(buf.put_slice(b"world"), 3);
        assert_eq!(buf.remaining_mut(), 0);
        assert_eq!(buf.as_ref(), b"hellowor");

        assert_eq!(buf.get_u8(), b'h');
        assert_eq!(buf.consume(3), b"ell");
        assert_eq!(buf.remaining(), 4);
        assert_eq!(buf.chunk(), b"owor");
    }

    #[test]
    fn test_shared_across_threads() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 1024, 4), &mut registry);

        std::thread::scope(|scope| {
            for thread in 0..4usize {
                let pool = pool.clone();
                scope.spawn(move || {
                    let mut held = Vec::new();
                    for i in 0..100usize {
                        // Mix tracked, exhausted and oversized requests.
                        let capacity = 1 + (thread * 100 + i) * 37 % 2048;
                        let mut buf = pool.alloc(capacity);
                        assert!(buf.capacity() >= capacity);
                        buf.put_slice(&[thread as u8; 8]);
                        held.push(buf);
                        if held.len() > 6 {
                            held.remove(0);
                        }
                    }
                });
            }
        });

        let stats = pool.stats();
        assert_eq!(stats.allocations, 400);
        assert_eq!(stats.outstanding, 0);
        for class in &pool.inner.classes {
            assert_eq!(class.allocated.load(Ordering::Relaxed), 0);
            assert!(class.freelist.len() <= 4);
        }
    }

    #[test]
    fn test_spare_and_commit() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(16, 16, 1), &mut registry);
        let mut buf = pool.alloc(4);
        buf.spare_mut()[..3].copy_from_slice(&[1, 2, 3]);
        buf.commit(3);
        assert_eq!(buf.as_ref(), &[1, 2, 3]);
        assert_eq!(buf.remaining_mut(), 13);
    }

    #[test]
    fn test_metrics_registered() {
        let mut registry = test_registry();
        let pool = BufferPool::new(test_config(64, 64, 1), &mut registry);
        let _buf = pool.alloc(1);

        let mut encoded = String::new();
        prometheus_client::encoding::text::encode(&mut encoded, &registry).unwrap();
        assert!(encoded.contains("buffer_pool_allocations_total"));
        assert!(encoded.contains("buffer_pool_allocated{size_class=\"64\"} 1"));
    }
}
