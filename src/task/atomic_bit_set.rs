use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};

const BITS: usize = usize::BITS as usize;

/// An atomic bit set with support for waiting on updates.
///
/// Concurrent reallocations are not supported. If capacity needs to be
/// expanded, unique access (`&mut`) is required.
pub struct AtomicBitSet {
    /// Data in this bit set.
    data: Vec<AtomicUsize>,
    /// Lock paired with `updated`. Holds no data: it only orders
    /// notifications against threads about to park.
    lock: Mutex<()>,
    /// Signalled on every notifying update.
    updated: Condvar,
}

impl AtomicBitSet {
    /// Creates a new `AtomicBitSet` able to hold
    /// at least `capacity` bits.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: iter::repeat_with(|| AtomicUsize::new(0))
                .take(words_for(capacity))
                .collect(),
            lock: Mutex::new(()),
            updated: Condvar::new(),
        }
    }

    /// Grows this set so it can hold at least `capacity` bits.
    pub fn grow(&mut self, capacity: usize) {
        let words = words_for(capacity);
        if words > self.data.len() {
            let extra = words - self.data.len();
            self.data
                .extend(iter::repeat_with(|| AtomicUsize::new(0)).take(extra));
        }
    }

    /// Returns the number of bits this set can hold.
    pub fn capacity(&self) -> usize {
        self.data.len() * BITS
    }

    /// Atomically inserts the given bit into this bit set.
    /// If `notify` is set to true, wakes threads
    /// currently waiting on updates.
    ///
    /// # Panics
    /// Panics if `index >= capacity`.
    pub fn insert(&self, index: usize, notify: bool) {
        let value = &self.data[usize_index(index)];

        value.fetch_or(1 << index_in_usize(index), Ordering::AcqRel);

        if notify {
            self.notify();
        }
    }

    /// Atomically removes the given bit from this bit set.
    ///
    /// # Panics
    /// Panics if `index >= capacity`.
    pub fn remove(&self, index: usize, notify: bool) {
        let value = &self.data[usize_index(index)];

        value.fetch_and(!(1 << index_in_usize(index)), Ordering::AcqRel);

        if notify {
            self.notify();
        }
    }

    /// Returns whether the given bit is contained within this
    /// set.
    pub fn contains(&self, index: usize) -> bool {
        let value = self.data[usize_index(index)].load(Ordering::Acquire);

        (value >> index_in_usize(index)) & 0x01 == 1
    }

    /// Clears all bits in this bit set.
    pub fn clear(&self) {
        for value in &self.data {
            value.store(0, Ordering::Release);
        }
    }

    /// Blocks until `done` returns true. `done` is re-evaluated
    /// after each notifying update.
    ///
    /// Spins briefly before parking the thread, since
    /// most waits are short.
    pub fn wait_until(&self, done: impl Fn() -> bool) {
        let backoff = Backoff::new();
        while !done() {
            if backoff.is_completed() {
                let mut guard = self.lock.lock();
                // Re-check under the lock: an update between the check
                // above and parking would otherwise be missed.
                if done() {
                    break;
                }
                self.updated.wait(&mut guard);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Wakes every thread blocked in `wait_until`.
    pub fn notify(&self) {
        let _guard = self.lock.lock();
        self.updated.notify_all();
    }
}

fn words_for(capacity: usize) -> usize {
    (capacity + BITS - 1) / BITS
}

fn usize_index(index: usize) -> usize {
    index / BITS
}

fn index_in_usize(index: usize) -> usize {
    index % BITS
}
