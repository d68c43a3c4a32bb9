use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::common::WampId;

/// Deadline-ordered table of per-request timeouts.
///
/// Mirrors a `std::map<Deadline, RequestId>`-style scheduler: deadlines are
/// kept in a `BTreeMap` so the earliest one can be peeked/popped in O(log n),
/// with a reverse index so a request's timeout can be cancelled in O(log n)
/// when its reply arrives before the deadline.
pub struct TimeoutScheduler {
    by_deadline: BTreeMap<(Instant, WampId), ()>,
    by_request: std::collections::HashMap<WampId, Instant>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        TimeoutScheduler {
            by_deadline: BTreeMap::new(),
            by_request: std::collections::HashMap::new(),
        }
    }

    /// Arms a timeout for `request_id` that expires after `timeout`.
    pub fn arm(&mut self, request_id: WampId, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        self.cancel(request_id);
        self.by_deadline.insert((deadline, request_id), ());
        self.by_request.insert(request_id, deadline);
    }

    /// Disarms a previously armed timeout, e.g. because the reply arrived.
    pub fn cancel(&mut self, request_id: WampId) {
        if let Some(deadline) = self.by_request.remove(&request_id) {
            self.by_deadline.remove(&(deadline, request_id));
        }
    }

    /// The instant of the earliest still-armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every request whose deadline has already passed.
    pub fn pop_expired(&mut self) -> Vec<WampId> {
        let now = Instant::now();
        let expired: Vec<(Instant, WampId)> = self
            .by_deadline
            .range(..(now, WampId::MAX))
            .map(|(k, _)| *k)
            .collect();

        let mut ids = Vec::with_capacity(expired.len());
        for key in expired {
            self.by_deadline.remove(&key);
            self.by_request.remove(&key.1);
            ids.push(key.1);
        }
        ids
    }
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arms_and_expires_a_deadline() {
        let mut sched = TimeoutScheduler::new();
        sched.arm(1, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sched.pop_expired(), vec![1]);
    }

    #[test]
    fn cancel_before_expiry_prevents_pop() {
        let mut sched = TimeoutScheduler::new();
        sched.arm(1, Duration::from_millis(0));
        sched.cancel(1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(sched.pop_expired().is_empty());
    }

    #[test]
    fn next_deadline_reflects_the_earliest_armed_request() {
        let mut sched = TimeoutScheduler::new();
        sched.arm(1, Duration::from_millis(50));
        sched.arm(2, Duration::from_millis(10));
        let next = sched.next_deadline().unwrap();
        assert!(next <= Instant::now() + Duration::from_millis(50));
    }
}
