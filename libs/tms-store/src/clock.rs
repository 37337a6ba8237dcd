use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tms_api::StoreError;

/// Millisecond wall clock used to stamp writes.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        tms_api::now_ms()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(AtomicI64::new(start_ms))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Timestamp and first sequence id handed to one store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSlot {
    pub timestamp: i64,
    pub first_sequence: u16,
}

/// Number of sequence ids available within one millisecond.
const SEQUENCE_SPACE: u32 = u16::MAX as u32 + 1;

#[derive(Debug)]
struct ClockState {
    last_timestamp: i64,
    next_sequence: u32,
}

/// Assigns `(timestamp, sequence)` pairs that strictly increase across calls.
///
/// The sequence restarts at zero whenever the timestamp advances. A clock
/// that stalls or steps back keeps the last timestamp and continues its
/// sequence; a call that does not fit into the rest of the current
/// millisecond moves to the next one.
pub struct WriteClock {
    clock: Arc<dyn Clock>,
    state: Mutex<ClockState>,
}

impl WriteClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(ClockState {
                last_timestamp: i64::MIN,
                next_sequence: 0,
            }),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Reserve `count` consecutive sequence ids under one timestamp.
    pub fn allocate(&self, count: usize) -> Result<WriteSlot, StoreError> {
        if count == 0 || count > SEQUENCE_SPACE as usize {
            return Err(StoreError::logic(format!(
                "cannot allocate {count} sequence ids in one call (1..={SEQUENCE_SPACE})"
            )));
        }
        let count = count as u32;

        let mut state = self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("write clock lock was poisoned, recovering");
            poisoned.into_inner()
        });
        let now = self.clock.now_ms();
        if now > state.last_timestamp {
            state.last_timestamp = now;
            state.next_sequence = 0;
        }
        if state.next_sequence + count > SEQUENCE_SPACE {
            state.last_timestamp += 1;
            state.next_sequence = 0;
        }

        let first_sequence = state.next_sequence as u16;
        state.next_sequence += count;
        Ok(WriteSlot {
            timestamp: state.last_timestamp,
            first_sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(start: i64) -> (Arc<ManualClock>, WriteClock) {
        let clock = Arc::new(ManualClock::new(start));
        (clock.clone(), WriteClock::new(clock))
    }

    #[test]
    fn sequence_continues_within_a_millisecond() {
        let (_, wc) = manual(100);
        assert_eq!(wc.allocate(3).unwrap(), WriteSlot { timestamp: 100, first_sequence: 0 });
        assert_eq!(wc.allocate(2).unwrap(), WriteSlot { timestamp: 100, first_sequence: 3 });
    }

    #[test]
    fn sequence_resets_when_millisecond_rolls_over() {
        let (clock, wc) = manual(100);
        wc.allocate(5).unwrap();
        clock.advance(1);
        assert_eq!(wc.allocate(1).unwrap(), WriteSlot { timestamp: 101, first_sequence: 0 });
    }

    #[test]
    fn clock_stepping_back_keeps_last_timestamp() {
        let (clock, wc) = manual(100);
        wc.allocate(2).unwrap();
        clock.set(90);
        assert_eq!(wc.allocate(1).unwrap(), WriteSlot { timestamp: 100, first_sequence: 2 });
    }

    #[test]
    fn exhausted_millisecond_moves_to_the_next() {
        let (_, wc) = manual(100);
        wc.allocate(65_000).unwrap();
        assert_eq!(wc.allocate(1_000).unwrap(), WriteSlot { timestamp: 101, first_sequence: 0 });
        assert_eq!(wc.allocate(1).unwrap(), WriteSlot { timestamp: 101, first_sequence: 1_000 });
    }

    #[test]
    fn oversized_and_empty_allocations_fail() {
        let (_, wc) = manual(0);
        assert!(wc.allocate(65_536).is_ok());
        assert_eq!(wc.allocate(65_537).unwrap_err().kind(), tms_api::ErrorKind::Logic);
        assert_eq!(wc.allocate(0).unwrap_err().kind(), tms_api::ErrorKind::Logic);
    }
}
