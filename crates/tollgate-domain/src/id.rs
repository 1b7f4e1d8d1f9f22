//! Time-ordered identifier generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngExt;
use uuid::{Builder, Uuid};

use crate::clock::Clock;

const SEQ_BITS: u32 = 12;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

/// Produces UUIDv7 identifiers that are strictly increasing per generator.
///
/// Layout: 48-bit unix millis, 12-bit sequence, 62 random bits. The sequence restarts
/// at zero whenever the clock moves forward. Past 4096 ids in one millisecond it
/// carries into the timestamp, so ordering survives bursts and backwards clock steps.
///
/// Share one instance per process (behind an `Arc`); it is lock-free.
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> Uuid {
        let now_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let mut prev = self.last.load(Ordering::Relaxed);
        let packed = loop {
            let candidate = if now_ms > prev >> SEQ_BITS {
                now_ms << SEQ_BITS
            } else {
                prev + 1
            };
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => prev = actual,
            }
        };

        let millis = packed >> SEQ_BITS;
        let seq = (packed & SEQ_MASK) as u16;
        let random: [u8; 8] = rand::rng().random();

        let mut tail = [0u8; 10];
        tail[..2].copy_from_slice(&seq.to_be_bytes());
        tail[2..].copy_from_slice(&random);
        Builder::from_unix_timestamp_millis(millis, &tail).into_uuid()
    }
}
