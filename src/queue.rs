use std::cell::UnsafeCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// Must be a power of two, cursors wrap with a mask.
pub const QUEUE_CAPACITY: usize = 64;

// One register value seen on the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub register: u8,
    pub value: u8,
}

impl Observation {
    pub fn new(register: u8, value: u8) -> Self {
        Self {
            register: register,
            value: value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFull(pub Observation);

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "observation queue full, overflowed at register {:X} = {:02X}", self.0.register, self.0.value)
    }
}

impl std::error::Error for QueueFull {}

// Storage shared by both ends. `tail` is only ever stored by the producer and
// `head` only by the consumer. Both count up forever and are masked on use, so
// `tail - head` is the number of slots in flight.
struct Ring<const N: usize> {
    slots: [UnsafeCell<Observation>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

// A slot is touched by the producer only while it is outside [head, tail), and
// by the consumer only while it is inside, so the two never alias.
unsafe impl<const N: usize> Sync for Ring<N> {}

impl<const N: usize> Ring<N> {
    fn new() -> Self {
        assert!(N.is_power_of_two(), "queue capacity must be a power of two, got {}", N);

        Self {
            slots: [(); N].map(|_| UnsafeCell::new(Observation::new(0, 0))),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

pub struct Producer<const N: usize = QUEUE_CAPACITY> {
    ring: Arc<Ring<N>>,
}

pub struct Consumer<const N: usize = QUEUE_CAPACITY> {
    ring: Arc<Ring<N>>,
}

// Creates the two ends of a bounded SPSC queue. Neither end is Clone, which is
// what keeps it single-producer/single-consumer.
pub fn channel<const N: usize>() -> (Producer<N>, Consumer<N>) {
    let ring = Arc::new(Ring::new());

    (Producer { ring: ring.clone() }, Consumer { ring: ring })
}

impl<const N: usize> Producer<N> {
    pub fn try_push(&mut self, observation: Observation) -> Result<(), QueueFull> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) == N {
            return Err(QueueFull(observation));
        }

        unsafe {
            *self.ring.slots[tail & (N - 1)].get() = observation;
        }

        // Publish only after the slot has been written.
        self.ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    // Overflowing the queue would silently corrupt the displayed register
    // state, so it is treated as fatal rather than dropped.
    pub fn push(&mut self, observation: Observation) {
        if let Err(e) = self.try_push(observation) {
            panic!("{}", e);
        }
    }

    pub fn capacity(&self) -> usize { N }
}

impl<const N: usize> Consumer<N> {
    pub fn try_pop(&mut self) -> Option<Observation> {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let observation = unsafe { *self.ring.slots[head & (N - 1)].get() };

        // Hand the slot back to the producer only after it has been read.
        self.ring.head.store(head.wrapping_add(1), Ordering::Release);
        Some(observation)
    }

    pub fn len(&self) -> usize { self.ring.len() }
    pub fn capacity(&self) -> usize { N }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = channel::<64>();

        for i in 0 .. 40 {
            tx.try_push(Observation::new(i % 16, i)).unwrap();
        }

        for i in 0 .. 40 {
            assert_eq!(rx.try_pop(), Some(Observation::new(i % 16, i)));
        }

        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_capacity_bound() {
        let (mut tx, mut rx) = channel::<64>();

        for i in 0 .. 64 {
            assert!(tx.try_push(Observation::new(0, i)).is_ok());
        }

        assert_eq!(rx.len(), 64);
        assert_eq!(rx.capacity(), 64);
        assert_eq!(tx.try_push(Observation::new(1, 0xff)), Err(QueueFull(Observation::new(1, 0xff))));

        // Freeing one slot makes room for exactly one more.
        assert_eq!(rx.try_pop(), Some(Observation::new(0, 0)));
        assert!(tx.try_push(Observation::new(1, 0xff)).is_ok());
        assert!(tx.try_push(Observation::new(1, 0xfe)).is_err());
    }

    #[test]
    #[should_panic(expected = "observation queue full, overflowed at register 0 = 04")]
    fn test_push_overflow_is_fatal() {
        let (mut tx, _rx) = channel::<4>();

        for i in 0 ..= 4 {
            tx.push(Observation::new(0, i));
        }
    }

    #[test]
    fn test_wrap() {
        let (mut tx, mut rx) = channel::<8>();
        let mut next_in = 0u32;
        let mut next_out = 0u32;

        // Uneven batches walk the cursors around the ring many times over.
        for round in 0 .. 200 {
            let pushes = 1 + round % 7;
            for _ in 0 .. pushes {
                if tx.try_push(Observation::new((next_in % 16) as u8, next_in as u8)).is_ok() {
                    next_in += 1;
                }
            }

            let pops = 1 + (round * 3) % 6;
            for _ in 0 .. pops {
                match rx.try_pop() {
                    Some(obs) => {
                        assert_eq!(obs, Observation::new((next_out % 16) as u8, next_out as u8));
                        next_out += 1;
                    },
                    None => assert_eq!(next_out, next_in),
                }
            }
        }

        assert!(next_in > 8 * 20);

        while let Some(obs) = rx.try_pop() {
            assert_eq!(obs.value, next_out as u8);
            next_out += 1;
        }
        assert_eq!(next_out, next_in);
        assert_eq!(rx.len(), 0);
    }

    #[test]
    fn test_cursor_overflow() {
        let (mut tx, mut rx) = channel::<4>();

        // Start both cursors just short of wrapping the usize itself.
        tx.ring.head.store(usize::MAX - 1, Ordering::Relaxed);
        tx.ring.tail.store(usize::MAX - 1, Ordering::Relaxed);

        for i in 0 .. 4 {
            tx.try_push(Observation::new(2, i)).unwrap();
        }
        assert!(tx.try_push(Observation::new(2, 4)).is_err());

        for i in 0 .. 4 {
            assert_eq!(rx.try_pop(), Some(Observation::new(2, i)));
        }
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_concurrent_spsc() {
        const N: u32 = 100_000;

        let (mut tx, mut rx) = channel::<64>();

        let producer = thread::spawn(move || {
            for i in 0 .. N {
                let obs = Observation::new((i % 16) as u8, (i % 251) as u8);
                while tx.try_push(obs).is_err() {
                    std::hint::spin_loop();
                }
            }
        });

        let consumer = thread::spawn(move || {
            for i in 0 .. N {
                let obs = loop {
                    if let Some(obs) = rx.try_pop() {
                        break obs;
                    }
                    std::hint::spin_loop();
                };
                assert_eq!(obs, Observation::new((i % 16) as u8, (i % 251) as u8));
            }
            assert_eq!(rx.len(), 0);
        });

        producer.join().unwrap();
        consumer.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_capacity_must_be_power_of_two() {
        let _ = channel::<48>();
    }
}
