//! Fixed-capacity pool of reusable book-update events.
//!
//! `acquire` never blocks: an exhausted pool returns `None` and the caller
//! drops the frame. The handle returns and resets its slot on drop, from any
//! thread, on every exit path.

use model::BookUpdateEvent;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Values that can live in an [`EventPool`].
pub trait Poolable: Send + 'static {
    /// Restore the value to its default state before it re-enters the pool.
    fn reset(&mut self);
}

impl Poolable for BookUpdateEvent {
    fn reset(&mut self) {
        self.clear();
    }
}

struct PoolInner<T> {
    slots: Mutex<Vec<T>>,
}

/// Fixed-capacity object pool. All slots are allocated at construction; no
/// allocation happens in steady state.
pub struct EventPool<T: Poolable> {
    inner: Arc<PoolInner<T>>,
    capacity: usize,
}

impl<T: Poolable + Default> EventPool<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, T::default);
        Self {
            inner: Arc::new(PoolInner {
                slots: Mutex::new(slots),
            }),
            capacity,
        }
    }
}

impl<T: Poolable> EventPool<T> {
    /// Take a slot, or `None` when every slot is in flight.
    pub fn acquire(&self) -> Option<PoolHandle<T>> {
        let value = self.inner.slots.lock().pop()?;
        Some(PoolHandle {
            value: Some(value),
            pool: Arc::clone(&self.inner),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently available.
    pub fn available(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

impl<T: Poolable> Clone for EventPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

/// Owning handle to a pooled slot. Derefs to the value; drop resets the value
/// and returns the slot.
pub struct PoolHandle<T: Poolable> {
    value: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Poolable> Deref for PoolHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("pool slot present until drop")
    }
}

impl<T: Poolable> DerefMut for PoolHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pool slot present until drop")
    }
}

impl<T: Poolable> Drop for PoolHandle<T> {
    fn drop(&mut self) {
        if let Some(mut value) = self.value.take() {
            value.reset();
            self.pool.slots.lock().push(value);
        }
    }
}

impl<T: Poolable + std::fmt::Debug> std::fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}
