//! Delayed events on a logical clock.
//!
//! Every event belongs to a [`ViewToken`]. When a view closes, its pending
//! events are cancelled so nothing fires into a discarded session.
use std::time::Duration;

/// Identifies one open view (a discovery card, the ritual, the banner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewToken(u64);

impl ViewToken {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub owner: ViewToken,
    pub at: Duration,
    pub event: E,
}

#[derive(Debug, Clone)]
struct Pending<E> {
    id: u64,
    owner: ViewToken,
    due: Duration,
    event: E,
}

#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    now: Duration,
    next_id: u64,
    next_token: u64,
    pending: Vec<Pending<E>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            next_token: 0,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    pub fn issue_token(&mut self) -> ViewToken {
        self.next_token += 1;
        ViewToken(self.next_token)
    }

    pub fn schedule(&mut self, owner: ViewToken, delay: Duration, event: E) -> TimerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.pending.push(Pending {
            id,
            owner,
            due: self.now + delay,
            event,
        });
        TimerHandle(id)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != handle.0);
        before != self.pending.len()
    }

    /// Drop every pending event owned by `owner`; returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: ViewToken) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.owner != owner);
        before - self.pending.len()
    }

    #[must_use]
    pub fn has_pending(&self, owner: ViewToken) -> bool {
        self.pending.iter().any(|p| p.owner == owner)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the earliest event due at or before `deadline`,
    /// moving the clock to its due time. Ties fire in scheduling order.
    pub fn pop_due(&mut self, deadline: Duration) -> Option<Fired<E>> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= deadline)
            .min_by_key(|(_, p)| (p.due, p.id))
            .map(|(i, _)| i)?;
        let pending = self.pending.remove(index);
        self.now = self.now.max(pending.due);
        Some(Fired {
            owner: pending.owner,
            at: pending.due,
            event: pending.event,
        })
    }

    /// Move the clock forward without firing anything.
    pub fn settle(&mut self, deadline: Duration) {
        self.now = self.now.max(deadline);
    }

    /// Fire everything due within `elapsed`, in order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Fired<E>> {
        let deadline = self.now + elapsed;
        let mut fired = Vec::new();
        while let Some(event) = self.pop_due(deadline) {
            fired.push(event);
        }
        self.settle(deadline);
        fired
    }
}
