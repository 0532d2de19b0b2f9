//! Debounced trigger: coalesces bursts of requests into one delayed action.
//!
//! Firing is driven by the owner (`poll` or `fire`), never by a hidden timer,
//! so tests can run against a [`ManualClock`] and hosts can arm whatever timer
//! their event loop offers (the desktop app sleeps until [`Ticket::deadline`]).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Tokio's clock. Honours `tokio::time::pause`/`advance` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-cranked clock; clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle for one `schedule` call. Only the most recent ticket can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    deadline: Instant,
}

impl Ticket {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

struct Pending<A> {
    action: A,
    generation: u64,
    deadline: Instant,
}

pub struct Debouncer<A, C = TokioClock> {
    delay: Duration,
    clock: C,
    pending: Option<Pending<A>>,
    generation: u64,
}

impl<A> Debouncer<A, TokioClock> {
    pub fn new(delay: Duration) -> Self {
        Self::with_clock(delay, TokioClock)
    }
}

impl<A, C: Clock> Debouncer<A, C> {
    pub fn with_clock(delay: Duration, clock: C) -> Self {
        Debouncer {
            delay,
            clock,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace whatever is pending with `action`, due `delay` from now.
    pub fn schedule(&mut self, action: A) -> Ticket {
        self.generation += 1;
        let deadline = self.clock.now() + self.delay;
        self.pending = Some(Pending {
            action,
            generation: self.generation,
            deadline,
        });
        Ticket {
            generation: self.generation,
            deadline,
        }
    }

    /// Take the pending action if its quiet period has elapsed.
    pub fn poll(&mut self) -> Option<A> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|p| self.clock.now() >= p.deadline);
        if due {
            self.pending.take().map(|p| p.action)
        } else {
            None
        }
    }

    /// Take the pending action if `ticket` is still current and due.
    /// A ticket superseded by a later `schedule` never fires.
    pub fn fire(&mut self, ticket: Ticket) -> Option<A> {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == ticket.generation);
        if current {
            self.poll()
        } else {
            None
        }
    }

    pub fn cancel(&mut self) -> Option<A> {
        self.pending.take().map(|p| p.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn burst_fires_once_after_last_call() {
        let clock = ManualClock::new();
        let mut trigger = Debouncer::with_clock(DELAY, clock.clone());
        let mut runs = 0;

        for _ in 0..5 {
            trigger.schedule(|| 1);
            clock.advance(Duration::from_millis(30));
        }
        // 150ms since the first call, only 30ms since the last one.
        assert!(trigger.poll().is_none());

        clock.advance(Duration::from_millis(69));
        assert!(trigger.poll().is_none());

        clock.advance(Duration::from_millis(1));
        if let Some(action) = trigger.poll() {
            runs += action();
        }
        assert!(trigger.poll().is_none());
        assert_eq!(runs, 1);
    }

    #[test]
    fn stale_ticket_does_not_fire() {
        let clock = ManualClock::new();
        let mut trigger = Debouncer::with_clock(DELAY, clock.clone());

        let first = trigger.schedule("a");
        let second = trigger.schedule("b");
        clock.advance(DELAY);

        assert_eq!(trigger.fire(first), None);
        assert_eq!(trigger.fire(second), Some("b"));
        assert_eq!(trigger.fire(second), None);
    }

    #[test]
    fn ticket_before_deadline_is_held() {
        let clock = ManualClock::new();
        let mut trigger = Debouncer::with_clock(DELAY, clock.clone());
        let ticket = trigger.schedule(());
        assert_eq!(ticket.deadline(), clock.now() + DELAY);

        assert_eq!(trigger.fire(ticket), None);
        assert!(trigger.is_pending());
        clock.advance(DELAY);
        assert_eq!(trigger.fire(ticket), Some(()));
        assert!(!trigger.is_pending());
    }

    #[test]
    fn cancel_drops_pending_action() {
        let clock = ManualClock::new();
        let mut trigger = Debouncer::with_clock(DELAY, clock.clone());
        trigger.schedule(5);
        assert_eq!(trigger.cancel(), Some(5));
        clock.advance(DELAY * 2);
        assert_eq!(trigger.poll(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let mut trigger = Debouncer::new(DELAY);
        let ticket = trigger.schedule("search");

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(trigger.fire(ticket), None);

        tokio::time::sleep_until(ticket.deadline()).await;
        assert_eq!(trigger.fire(ticket), Some("search"));
    }
}
