//! Reusable-instance object pool
//!
//! Instances are created up front (pre-warming) and recycled through a FIFO
//! queue of available slots. A slot's instance is never dropped while the pool
//! lives; it is handed out again after `release`.

use std::collections::VecDeque;
use std::fmt;

/// Lifecycle hooks invoked by the pool when an instance changes hands
pub trait Poolable {
    /// Called right after the instance is handed out
    fn on_acquire(&mut self) {}
    /// Called before the instance goes back into the available queue.
    /// Must detach the instance from whatever active context it was part of.
    fn on_release(&mut self) {}
}

/// Handle to a pool slot. Stays valid for the pool's whole lifetime; whether it
/// currently refers to an in-use instance is checked on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle(usize);

impl PoolHandle {
    /// Handle for slot `raw`, for hosts that keep their own storage
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw slot index
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool is empty and cannot be expanded (capacity {capacity})")]
    PoolExhausted { capacity: usize },
    #[error("{0} was already in the pool")]
    DoubleRelease(PoolHandle),
    #[error("{0} does not belong to this pool")]
    UnknownHandle(PoolHandle),
}

struct Slot<T> {
    value: T,
    in_use: bool,
}

/// Generic pool with optional growth
pub struct Pool<T: Poolable> {
    factory: Box<dyn FnMut() -> T + Send>,
    slots: Vec<Slot<T>>,
    available: VecDeque<usize>,
    can_expand: bool,
    /// Slots added after construction because the pool ran dry
    expansions: usize,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool and pre-fill it with `initial_size` instances from `factory`
    pub fn new<F>(factory: F, initial_size: usize, can_expand: bool) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        let mut pool = Self {
            factory: Box::new(factory),
            slots: Vec::with_capacity(initial_size),
            available: VecDeque::with_capacity(initial_size),
            can_expand,
            expansions: 0,
        };

        for _ in 0..initial_size {
            let mut value = (pool.factory)();
            value.on_release();
            pool.available.push_back(pool.slots.len());
            pool.slots.push(Slot {
                value,
                in_use: false,
            });
        }

        pool
    }

    /// Hand out an available instance, growing the pool if allowed
    pub fn acquire(&mut self) -> Result<PoolHandle, PoolError> {
        let index = match self.available.pop_front() {
            Some(index) => index,
            None if self.can_expand => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    value: (self.factory)(),
                    in_use: false,
                });
                self.expansions += 1;
                tracing::debug!("Pool expanded to {} instances", self.slots.len());
                index
            }
            None => {
                let capacity = self.slots.len();
                tracing::error!(capacity, "Pool is empty and cannot be expanded");
                return Err(PoolError::PoolExhausted { capacity });
            }
        };

        let slot = &mut self.slots[index];
        debug_assert!(!slot.in_use, "available queue held an in-use slot");
        slot.in_use = true;
        slot.value.on_acquire();
        Ok(PoolHandle(index))
    }

    /// Return an instance to the pool
    pub fn release(&mut self, handle: PoolHandle) -> Result<(), PoolError> {
        let Some(slot) = self.slots.get_mut(handle.0) else {
            tracing::warn!("Release of unknown pool handle {}", handle);
            return Err(PoolError::UnknownHandle(handle));
        };

        if !slot.in_use {
            tracing::warn!("{} was already in the pool", handle);
            return Err(PoolError::DoubleRelease(handle));
        }

        slot.value.on_release();
        slot.in_use = false;
        self.available.push_back(handle.0);
        Ok(())
    }

    /// Borrow an in-use instance
    #[inline]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.0)
            .filter(|slot| slot.in_use)
            .map(|slot| &slot.value)
    }

    /// Mutably borrow an in-use instance
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.0)
            .filter(|slot| slot.in_use)
            .map(|slot| &mut slot.value)
    }

    #[inline]
    pub fn is_in_use(&self, handle: PoolHandle) -> bool {
        self.slots.get(handle.0).is_some_and(|slot| slot.in_use)
    }

    /// Total instances owned (available + in use)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Instances waiting in the available queue
    #[inline]
    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Instances currently handed out
    #[inline]
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.available.len()
    }

    #[inline]
    pub fn can_expand(&self) -> bool {
        self.can_expand
    }

    /// Number of instances created on demand after construction
    #[inline]
    pub fn expansions(&self) -> usize {
        self.expansions
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("can_expand", &self.can_expand)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct Dummy {
        active: bool,
        acquired: u32,
        released: u32,
    }

    impl Poolable for Dummy {
        fn on_acquire(&mut self) {
            self.active = true;
            self.acquired += 1;
        }

        fn on_release(&mut self) {
            self.active = false;
            self.released += 1;
        }
    }

    fn fixed_pool(size: usize) -> Pool<Dummy> {
        Pool::new(Dummy::default, size, false)
    }

    #[test]
    fn test_prewarm_fills_initial_size() {
        let pool = fixed_pool(4);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_exhaustion_after_capacity() {
        for capacity in [0usize, 1, 3, 16] {
            let mut pool = fixed_pool(capacity);
            let handles: Vec<_> = (0..capacity).map(|_| pool.acquire().unwrap()).collect();

            let distinct: HashSet<_> = handles.iter().copied().collect();
            assert_eq!(distinct.len(), capacity);

            assert_eq!(
                pool.acquire(),
                Err(PoolError::PoolExhausted { capacity })
            );
        }
    }

    #[test]
    fn test_release_then_acquire_roundtrip() {
        let mut pool = fixed_pool(1);
        let before = pool.available();

        let handle = pool.acquire().unwrap();
        pool.release(handle).unwrap();
        assert_eq!(pool.available(), before);

        let again = pool.acquire().unwrap();
        assert_eq!(again, handle);
        assert_eq!(pool.get(again).unwrap().acquired, 2);
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut pool = fixed_pool(2);
        let handle = pool.acquire().unwrap();
        pool.release(handle).unwrap();

        assert_eq!(pool.release(handle), Err(PoolError::DoubleRelease(handle)));
        // The queue must not contain the slot twice
        assert_eq!(pool.available(), 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_handle() {
        let mut pool = fixed_pool(1);
        let bogus = PoolHandle(42);
        assert_eq!(pool.release(bogus), Err(PoolError::UnknownHandle(bogus)));
        assert!(pool.get(bogus).is_none());
    }

    #[test]
    fn test_growable_pool_expands() {
        let mut pool = Pool::new(Dummy::default, 1, true);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.expansions(), 1);
        assert!(pool.get(b).unwrap().active);
    }

    #[test]
    fn test_fifo_order() {
        let mut pool = fixed_pool(3);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        pool.release(b).unwrap();
        pool.release(a).unwrap();

        // Slot 2 was never handed out and is at the front of the queue
        assert_eq!(pool.acquire().unwrap().raw(), 2);
        assert_eq!(pool.acquire().unwrap(), b);
        assert_eq!(pool.acquire().unwrap(), a);
    }

    #[test]
    fn test_released_instance_is_not_borrowable() {
        let mut pool = fixed_pool(1);
        let handle = pool.acquire().unwrap();
        assert!(pool.get_mut(handle).is_some());
        pool.release(handle).unwrap();
        assert!(pool.get(handle).is_none());
        assert!(!pool.is_in_use(handle));
    }
}
