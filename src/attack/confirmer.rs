//! Delta confirmation.
//!
//! Turns the raw sequence of callback source ports into deltas and only lets a
//! delta through once it has repeated often enough to rule out unrelated
//! traffic on the verifier host.
//!
//! Two variants share the same ring buffer:
//!
//! - **basic** (`extra == 0`): the buffer holds `confirmations` samples; once
//!   full, the oldest is popped and accepted when every buffered sample equals
//!   it.
//! - **extended** (`extra > 0`): the buffer holds `confirmations + extra`
//!   samples; once full, the newest is accepted when at least `confirmations`
//!   samples agree with it, and marked confident only when all of them do.

use std::collections::VecDeque;

use super::core::ConnectionEvent;

/// Delta reported when no value could be confirmed.
pub const UNCONFIRMED: i64 = -1;

/// Outcome of feeding one event to the confirmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub delta: i64,
    pub confident: bool,
}

impl Confirmation {
    fn rejected(delta: i64) -> Self {
        Self {
            delta,
            confident: false,
        }
    }

    fn unconfirmed() -> Self {
        Self::rejected(UNCONFIRMED)
    }

    /// Whether the delta is usable by the solver at all.
    pub fn is_usable(&self) -> bool {
        self.delta >= 1
    }
}

#[derive(Debug, Clone)]
pub struct DeltaConfirmer {
    confirmations: usize,
    extra: usize,
    last_connection_id: i64,
    recent_deltas: VecDeque<i64>,
}

impl DeltaConfirmer {
    /// Basic variant requiring `confirmations` identical deltas.
    pub fn new(confirmations: usize) -> Self {
        Self::with_extra(confirmations, 0)
    }

    /// Extended variant with `extra` additional samples in the window.
    pub fn with_extra(confirmations: usize, extra: usize) -> Self {
        let confirmations = confirmations.max(1);
        Self {
            confirmations,
            extra,
            last_connection_id: 0,
            recent_deltas: VecDeque::with_capacity(confirmations + extra),
        }
    }

    pub fn capacity(&self) -> usize {
        self.confirmations + self.extra
    }

    pub fn last_connection_id(&self) -> i64 {
        self.last_connection_id
    }

    /// Buffered deltas, oldest first.
    pub fn recent_deltas(&self) -> impl Iterator<Item = i64> + '_ {
        self.recent_deltas.iter().copied()
    }

    pub fn buffered(&self) -> usize {
        self.recent_deltas.len()
    }

    /// Drop buffered deltas. The connection id sequence is global to the run,
    /// so `last_connection_id` survives.
    pub fn reset(&mut self) {
        self.recent_deltas.clear();
    }

    pub fn confirm(&mut self, event: &ConnectionEvent) -> Confirmation {
        let delta = event.connection_id - self.last_connection_id;
        self.last_connection_id = event.connection_id;

        // Either the first connect or the port counter wrapped/reset.
        if delta < 1 {
            return Confirmation::rejected(delta);
        }

        if self.recent_deltas.len() == self.capacity() {
            self.recent_deltas.pop_front();
        }
        self.recent_deltas.push_back(delta);

        if self.extra == 0 {
            self.confirm_basic()
        } else {
            self.confirm_extended()
        }
    }

    fn confirm_basic(&mut self) -> Confirmation {
        if self.recent_deltas.len() < self.confirmations {
            return Confirmation::unconfirmed();
        }

        let Some(&value) = self.recent_deltas.front() else {
            return Confirmation::unconfirmed();
        };
        let stable = self.recent_deltas.iter().all(|&delta| delta == value);
        self.recent_deltas.pop_front();

        if stable {
            Confirmation {
                delta: value,
                confident: true,
            }
        } else {
            Confirmation::unconfirmed()
        }
    }

    fn confirm_extended(&self) -> Confirmation {
        if self.recent_deltas.len() < self.capacity() {
            return Confirmation::unconfirmed();
        }

        let Some(&candidate) = self.recent_deltas.back() else {
            return Confirmation::unconfirmed();
        };
        let sames = self
            .recent_deltas
            .iter()
            .filter(|&&delta| delta == candidate)
            .count();

        if sames >= self.confirmations {
            Confirmation {
                delta: candidate,
                confident: sames == self.capacity(),
            }
        } else {
            Confirmation::unconfirmed()
        }
    }
}
