//! What the cache-line padding buys: the padded ring and a pair of
//! line-isolated counters against twins whose hot atomics share one line.
//!
//! Two experiments. First, two threads each increment their own counter,
//! with the counters either adjacent (one line, pure false sharing) or one
//! line apart. Second, a cross-thread pump through the real ring versus an
//! unpadded twin with the identical protocol.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

const COUNTER_OPS: u64 = 4_000_000;
const RING_OPS: u64 = 1_000_000;
const RING_CAPACITY: usize = 1024;

/// Measurement twin of the padded ring: same algorithm, same memory
/// ordering, but `head` and `tail` are adjacent on one cache line. Exists
/// only for this comparison; never use it for real work.
mod unpadded {
    use std::cell::UnsafeCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Ring {
        head: AtomicUsize,
        tail: AtomicUsize,
        mask: usize,
        slots: Box<[UnsafeCell<u64>]>,
    }

    unsafe impl Send for Ring {}
    unsafe impl Sync for Ring {}

    pub fn channel(capacity: usize) -> (Producer, Consumer) {
        assert!(capacity.is_power_of_two() && capacity >= 2);
        let slots = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        let ring = Arc::new(Ring {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
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

    pub struct Producer {
        ring: Arc<Ring>,
    }

    impl Producer {
        pub fn try_push(&mut self, item: u64) -> Result<(), u64> {
            let ring = &*self.ring;
            let tail = ring.tail.load(Ordering::Relaxed);
            let next = (tail + 1) & ring.mask;
            if next == ring.head.load(Ordering::Acquire) {
                return Err(item);
            }
            unsafe { *ring.slots[tail].get() = item };
            ring.tail.store(next, Ordering::Release);
            Ok(())
        }
    }

    pub struct Consumer {
        ring: Arc<Ring>,
    }

    impl Consumer {
        pub fn try_pop(&mut self) -> Option<u64> {
            let ring = &*self.ring;
            let head = ring.head.load(Ordering::Relaxed);
            if head == ring.tail.load(Ordering::Acquire) {
                return None;
            }
            let item = unsafe { *ring.slots[head].get() };
            ring.head.store((head + 1) & ring.mask, Ordering::Release);
            Some(item)
        }
    }
}

/// Both counters in one cache line; each write invalidates the other
/// core's copy even though the threads never touch the same counter.
#[derive(Default)]
struct SharedLine {
    a: AtomicU64,
    b: AtomicU64,
}

#[derive(Default)]
#[repr(align(64))]
struct PaddedCounter(AtomicU64);

#[derive(Default)]
struct IsolatedLines {
    a: PaddedCounter,
    b: PaddedCounter,
}

fn hammer(a: &AtomicU64, b: &AtomicU64, ops: u64) -> Duration {
    let start = Instant::now();
    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ops {
                a.fetch_add(1, Ordering::Relaxed);
            }
        });
        for _ in 0..ops {
            b.fetch_add(1, Ordering::Relaxed);
        }
    });
    start.elapsed()
}

fn pump_padded(count: u64) -> Duration {
    let (mut tx, mut rx) = spsc_queue::channel::<u64>(RING_CAPACITY);
    let start = Instant::now();
    let producer = thread::spawn(move || {
        for v in 0..count {
            let mut item = v;
            while let Err(back) = tx.try_push(item) {
                item = back;
                std::hint::spin_loop();
            }
        }
    });
    let mut seen = 0u64;
    while seen < count {
        if let Some(v) = rx.try_pop() {
            black_box(v);
            seen += 1;
        } else {
            std::hint::spin_loop();
        }
    }
    producer.join().unwrap();
    start.elapsed()
}

fn pump_unpadded(count: u64) -> Duration {
    let (mut tx, mut rx) = unpadded::channel(RING_CAPACITY);
    let start = Instant::now();
    let producer = thread::spawn(move || {
        for v in 0..count {
            let mut item = v;
            while let Err(back) = tx.try_push(item) {
                item = back;
                std::hint::spin_loop();
            }
        }
    });
    let mut seen = 0u64;
    while seen < count {
        if let Some(v) = rx.try_pop() {
            black_box(v);
            seen += 1;
        } else {
            std::hint::spin_loop();
        }
    }
    producer.join().unwrap();
    start.elapsed()
}

fn false_sharing_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("false_sharing");
    group.sample_size(10);

    group.throughput(Throughput::Elements(COUNTER_OPS * 2));
    group.bench_function("counters_shared_line", |b| {
        b.iter_custom(|iters| {
            (0..iters)
                .map(|_| {
                    let pair = SharedLine::default();
                    hammer(&pair.a, &pair.b, COUNTER_OPS)
                })
                .sum()
        })
    });
    group.bench_function("counters_isolated_lines", |b| {
        b.iter_custom(|iters| {
            (0..iters)
                .map(|_| {
                    let pair = IsolatedLines::default();
                    hammer(&pair.a.0, &pair.b.0, COUNTER_OPS)
                })
                .sum()
        })
    });

    group.throughput(Throughput::Elements(RING_OPS));
    group.bench_function("ring_padded", |b| {
        b.iter_custom(|iters| (0..iters).map(|_| pump_padded(RING_OPS)).sum())
    });
    group.bench_function("ring_unpadded", |b| {
        b.iter_custom(|iters| (0..iters).map(|_| pump_unpadded(RING_OPS)).sum())
    });

    group.finish();
}

criterion_group!(benches, false_sharing_benches);
criterion_main!(benches);
