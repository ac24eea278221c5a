//! Trailing-edge throttling for high-frequency events.
//!
//! [`Throttle`] admits the first call immediately and coalesces every call
//! made inside the interval into a single pending payload, released by
//! [`Throttle::poll`] once the interval boundary has passed. The session
//! pump drives `poll` on each host loop iteration, so a burst of pointer
//! events produces one leading tick and one trailing tick, never a dropped
//! final position.
//!
//! Time is always passed in rather than read from the wall clock, so tests
//! drive the gate with a [`ManualClock`] instead of sleeping.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source injected into sessions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock advanced by hand, for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().expect("clock mutex poisoned");
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().expect("clock mutex poisoned")
    }
}

/// Throttle gate with trailing-call coalescing.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_fire: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
            pending: None,
        }
    }

    /// Admit `payload` at `now`. Returns the payload when the gate is open;
    /// otherwise stores it, replacing any earlier pending payload, for a
    /// later [`poll`](Self::poll).
    pub fn offer(&mut self, now: Instant, payload: T) -> Option<T> {
        match self.last_fire {
            Some(last) if now.duration_since(last) < self.interval => {
                self.pending = Some(payload);
                None
            }
            _ => {
                self.last_fire = Some(now);
                self.pending = None;
                Some(payload)
            }
        }
    }

    /// Release the pending payload once the interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_none() {
            return None;
        }
        if let Some(last) = self.last_fire {
            if now.duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_fire = Some(now);
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop pending work and forget the last fire time.
    pub fn reset(&mut self) {
        self.last_fire = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(ms: u64) -> (Throttle<u32>, ManualClock) {
        (Throttle::new(Duration::from_millis(ms)), ManualClock::new())
    }

    #[test]
    fn leading_call_fires_immediately() {
        let (mut gate, clock) = gate(100);
        assert_eq!(gate.offer(clock.now(), 1), Some(1));
    }

    #[test]
    fn calls_inside_interval_coalesce_to_latest() {
        let (mut gate, clock) = gate(100);
        assert_eq!(gate.offer(clock.now(), 1), Some(1));
        clock.advance(Duration::from_millis(10));
        assert_eq!(gate.offer(clock.now(), 2), None);
        clock.advance(Duration::from_millis(10));
        assert_eq!(gate.offer(clock.now(), 3), None);

        // Not due yet.
        assert_eq!(gate.poll(clock.now()), None);

        // Only the latest payload survives the interval boundary.
        clock.advance(Duration::from_millis(80));
        assert_eq!(gate.poll(clock.now()), Some(3));
        assert!(!gate.has_pending());
    }

    #[test]
    fn trailing_fire_reopens_the_gate_window() {
        let (mut gate, clock) = gate(100);
        gate.offer(clock.now(), 1);
        clock.advance(Duration::from_millis(50));
        gate.offer(clock.now(), 2);
        clock.advance(Duration::from_millis(50));
        assert_eq!(gate.poll(clock.now()), Some(2));

        // The trailing fire counts as the last invocation.
        clock.advance(Duration::from_millis(10));
        assert_eq!(gate.offer(clock.now(), 3), None);
        clock.advance(Duration::from_millis(90));
        assert_eq!(gate.poll(clock.now()), Some(3));
    }

    #[test]
    fn reset_clears_pending_and_history() {
        let (mut gate, clock) = gate(100);
        gate.offer(clock.now(), 1);
        gate.offer(clock.now(), 2);
        assert!(gate.has_pending());
        gate.reset();
        assert!(!gate.has_pending());
        assert_eq!(gate.poll(clock.now()), None);
        // A fresh gate admits immediately again.
        assert_eq!(gate.offer(clock.now(), 4), Some(4));
    }
}
