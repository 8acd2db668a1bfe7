//! Debounce state machine and time-weighted up/down accounting for one target.
//!
//! Raw probe results feed a *pending* candidate. The candidate is promoted to
//! the *confirmed* state only after it has been observed unchanged for the
//! confirmation window. Durations are charged to the up/down totals when a
//! confirmed state closes; the open state is only ever added on read.

use std::time::Duration;
use tokio::time::Instant;

use crate::models::{Status, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    Unconfirmed,
    Confirmed { status: Status, since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    status: Status,
    since: Instant,
}

/// Totals as seen at a given instant, open state included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub status: Status,
    pub elapsed: Duration,
    pub total_up: Duration,
    pub total_down: Duration,
}

#[derive(Debug)]
pub struct Tracker {
    confirm_after: Duration,
    confirmation: Confirmation,
    pending: Option<Pending>,
    total_up: Duration,
    total_down: Duration,
}

impl Tracker {
    pub fn new(confirm_after: Duration) -> Self {
        Self {
            confirm_after,
            confirmation: Confirmation::Unconfirmed,
            pending: None,
            total_up: Duration::ZERO,
            total_down: Duration::ZERO,
        }
    }

    /// Feeds one probe result observed at `now`.
    ///
    /// Returns a transition only when the pending state has held for the whole
    /// confirmation window and differs from what is already confirmed.
    pub fn observe(&mut self, observed: Status, now: Instant) -> Option<Transition> {
        let pending = match self.pending {
            Some(pending) if pending.status == observed => pending,
            _ => {
                self.pending = Some(Pending { status: observed, since: now });
                return None;
            }
        };

        if now.saturating_duration_since(pending.since) < self.confirm_after {
            return None;
        }

        match self.confirmation {
            Confirmation::Unconfirmed => {
                self.confirmation = Confirmation::Confirmed { status: observed, since: now };
                Some(Transition::Initial { status: observed })
            }
            Confirmation::Confirmed { status, since } if status != observed => {
                let lasted = now.saturating_duration_since(since);
                match status {
                    Status::Up => self.total_up += lasted,
                    Status::Down => self.total_down += lasted,
                }
                self.confirmation = Confirmation::Confirmed { status: observed, since: now };
                Some(Transition::Changed {
                    status: observed,
                    previous: status,
                    lasted,
                    total_up: self.total_up,
                    total_down: self.total_down,
                })
            }
            Confirmation::Confirmed { .. } => None,
        }
    }

    /// Reads the confirmed state at `now`, or `None` while still undetermined.
    pub fn reading(&self, now: Instant) -> Option<Reading> {
        let Confirmation::Confirmed { status, since } = self.confirmation else {
            return None;
        };
        let elapsed = now.saturating_duration_since(since);
        let (mut total_up, mut total_down) = (self.total_up, self.total_down);
        match status {
            Status::Up => total_up += elapsed,
            Status::Down => total_down += elapsed,
        }
        Some(Reading { status, elapsed, total_up, total_down })
    }

    #[cfg(test)]
    pub fn confirmed(&self) -> Option<Status> {
        match self.confirmation {
            Confirmation::Confirmed { status, .. } => Some(status),
            Confirmation::Unconfirmed => None,
        }
    }

    pub fn pending(&self) -> Option<Status> {
        self.pending.map(|p| p.status)
    }

    /// Totals of closed states only.
    #[cfg(test)]
    pub fn closed_totals(&self) -> (Duration, Duration) {
        (self.total_up, self.total_down)
    }
}
