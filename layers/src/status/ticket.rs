//! Ticket-Ordered Drain
//!
//! Decoder threads of every carrier register in start order against one
//! process-wide drain. On shutdown a thread may only retire once every thread
//! holding a higher ticket has retired, so the lowest ticket is always the last
//! one touching shared state.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct DrainState {
    next: usize,
    live: BTreeSet<usize>,
}

/// Registry of live decoder tickets
#[derive(Debug, Default)]
pub struct TicketDrain {
    state: Mutex<DrainState>,
    retired: Condvar,
}

impl TicketDrain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DrainState::default()),
            retired: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DrainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out the next ticket
    pub fn register(&self) -> usize {
        let mut state = self.lock();
        let ticket = state.next;
        state.next += 1;
        state.live.insert(ticket);
        trace!("Ticket {} registered", ticket);
        ticket
    }

    /// Block until no higher ticket is live, then release `ticket`
    pub fn retire(&self, ticket: usize) {
        let state = self.lock();
        let mut state = self
            .retired
            .wait_while(state, |s| s.live.range(ticket + 1..).next().is_some())
            .unwrap_or_else(PoisonError::into_inner);
        state.live.remove(&ticket);
        debug!("Ticket {} retired, {} live", ticket, state.live.len());
        drop(state);
        self.retired.notify_all();
    }

    /// Wait up to `timeout` for every ticket to retire; true when drained
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .retired
            .wait_timeout_while(state, timeout, |s| !s.live.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.live.is_empty()
    }

    /// Tickets not yet retired
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_tickets_are_sequential() {
        let drain = TicketDrain::new();
        assert_eq!(drain.register(), 0);
        assert_eq!(drain.register(), 1);
        assert_eq!(drain.live(), 2);
        drain.retire(1);
        drain.retire(0);
        assert_eq!(drain.live(), 0);
    }

    #[test]
    fn test_lower_ticket_waits_for_higher() {
        let drain = Arc::new(TicketDrain::new());
        let low = drain.register();
        let high = drain.register();

        let waiter = {
            let drain = Arc::clone(&drain);
            thread::spawn(move || drain.retire(low))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        assert_eq!(drain.live(), 2);

        drain.retire(high);
        waiter.join().unwrap();
        assert!(drain.wait_drained(Duration::from_secs(1)));
    }

    #[test]
    fn test_concurrent_drain() {
        let drain = Arc::new(TicketDrain::new());
        let handles: Vec<_> = (0..4)
            .map(|_| drain.register())
            .map(|ticket| {
                let drain = Arc::clone(&drain);
                thread::spawn(move || drain.retire(ticket))
            })
            .collect();

        assert!(drain.wait_drained(Duration::from_secs(5)));
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_wait_drained_times_out() {
        let drain = TicketDrain::new();
        drain.register();
        assert!(!drain.wait_drained(Duration::from_millis(10)));
    }
}
