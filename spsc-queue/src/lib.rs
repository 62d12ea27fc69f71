//! Lock-free single-producer / single-consumer ring buffer.
//!
//! One designated thread pushes, one designated thread pops; the split
//! [`Producer`]/[`Consumer`] handles enforce that at the type level. The
//! ring never blocks and never allocates after construction.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An index written by one core and read by the other must own its cache
/// line; co-located indices would invalidate each other's cached copy on
/// every update.
#[repr(align(64))]
struct CacheAligned(AtomicUsize);

impl CacheAligned {
    const fn new(value: usize) -> Self {
        Self(AtomicUsize::new(value))
    }
}

struct Ring<T> {
    /// Consumer-owned; next slot to pop.
    head: CacheAligned,
    /// Producer-owned; next slot to fill.
    tail: CacheAligned,
    mask: usize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// The handles hand slots back and forth through the head/tail protocol;
// a slot is only ever touched by the side that currently owns it.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn occupied(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let mut head = *self.head.0.get_mut();
        let tail = *self.tail.0.get_mut();
        while head != tail {
            unsafe { (*self.slots[head].get()).assume_init_drop() };
            head = (head + 1) & self.mask;
        }
    }
}

/// Create a ring with `capacity` slots (power of two, at least 2). One slot
/// stays empty to tell full from empty, so `capacity - 1` items fit.
pub fn channel<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two() && capacity >= 2,
        "ring capacity must be a power of two >= 2, got {capacity}"
    );
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let ring = Arc::new(Ring {
        head: CacheAligned::new(0),
        tail: CacheAligned::new(0),
        mask: capacity - 1,
        slots,
    });
    (
        Producer {
            ring: Arc::clone(&ring),
        },
        Consumer { ring },
    )
}

/// The single enqueueing endpoint. Not `Clone`: exactly one producer exists.
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Producer<T> {
    /// Push without blocking. Returns the item back when the ring is full
    /// so the caller can apply back-pressure, yield, or spin.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        let ring = &*self.ring;
        // Own index: no one else writes tail, a relaxed load suffices.
        let tail = ring.tail.0.load(Ordering::Relaxed);
        let next = (tail + 1) & ring.mask;
        // Acquire pairs with the consumer's release store of head, so the
        // slot it vacated is really free before we reuse it.
        if next == ring.head.0.load(Ordering::Acquire) {
            return Err(item);
        }
        unsafe { (*ring.slots[tail].get()).write(item) };
        // Release publishes the slot write before the index advance.
        ring.tail.0.store(next, Ordering::Release);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.ring.occupied() == self.ring.mask
    }

    /// Approximate under concurrency; exact only on a quiescent ring.
    pub fn len(&self) -> usize {
        self.ring.occupied()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot count; one slot is reserved, so usable capacity is one less.
    pub fn capacity(&self) -> usize {
        self.ring.mask + 1
    }
}

/// The single dequeueing endpoint. Not `Clone`: exactly one consumer exists.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Consumer<T> {
    /// Pop without blocking; `None` when the ring is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.0.load(Ordering::Relaxed);
        // Acquire pairs with the producer's release store of tail: once we
        // observe the advanced tail, the slot contents are visible too.
        if head == ring.tail.0.load(Ordering::Acquire) {
            return None;
        }
        let item = unsafe { (*ring.slots[head].get()).assume_init_read() };
        // Release hands the slot back to the producer.
        ring.head.0.store((head + 1) & ring.mask, Ordering::Release);
        Some(item)
    }

    /// Approximate under concurrency; exact only on a quiescent ring.
    pub fn len(&self) -> usize {
        self.ring.occupied()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.mask + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_empty() {
        let (tx, mut rx) = channel::<u32>(4);
        assert!(tx.is_empty());
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn round_trip_in_order() {
        let (mut tx, mut rx) = channel(4);
        for v in [10, 20, 30] {
            assert!(tx.try_push(v).is_ok());
        }
        assert_eq!(rx.try_pop(), Some(10));
        assert_eq!(rx.try_pop(), Some(20));
        assert_eq!(rx.try_pop(), Some(30));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn full_at_capacity_minus_one() {
        let (mut tx, _rx) = channel(4);
        assert!(tx.try_push(1).is_ok());
        assert!(tx.try_push(2).is_ok());
        assert!(tx.try_push(3).is_ok());
        assert!(tx.is_full());
        assert_eq!(tx.try_push(4), Err(4));
    }

    #[test]
    fn empty_again_after_push_pop() {
        let (mut tx, mut rx) = channel(8);
        tx.try_push(7u64).unwrap();
        assert_eq!(rx.try_pop(), Some(7));
        assert_eq!(rx.try_pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn wraps_around_many_times() {
        let (mut tx, mut rx) = channel(4);
        for round in 0..100u32 {
            tx.try_push(round * 2).unwrap();
            tx.try_push(round * 2 + 1).unwrap();
            assert_eq!(rx.try_pop(), Some(round * 2));
            assert_eq!(rx.try_pop(), Some(round * 2 + 1));
        }
        assert!(rx.is_empty());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_capacity() {
        let _ = channel::<u32>(6);
    }

    #[test]
    fn drops_unconsumed_items() {
        let item = Arc::new(());
        let (mut tx, rx) = channel(8);
        for _ in 0..5 {
            tx.try_push(Arc::clone(&item)).unwrap();
        }
        drop(tx);
        drop(rx);
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn fifo_across_threads() {
        const COUNT: u64 = 100_000;
        let (mut tx, mut rx) = channel(1024);
        let producer = thread::spawn(move || {
            for v in 0..COUNT {
                let mut item = v;
                loop {
                    match tx.try_push(item) {
                        Ok(()) => break,
                        Err(back) => {
                            item = back;
                            thread::yield_now();
                        }
                    }
                }
            }
        });
        let mut seen = 0u64;
        while seen < COUNT {
            match rx.try_pop() {
                Some(v) => {
                    assert_eq!(v, seen, "values must pop in push order");
                    seen += 1;
                }
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert_eq!(rx.try_pop(), None);
    }
}
