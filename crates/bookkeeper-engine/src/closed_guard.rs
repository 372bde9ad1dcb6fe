//! Tombstones for agreements that have left the ledger.
//!
//! Closing or liquidating removes an agreement from the open set. The guard
//! remembers recently removed IDs so a second close reports
//! [`BookkeeperError::AgreementClosed`] rather than `AgreementNotFound`.
//!
//! The set is bounded with FIFO eviction so memory stays predictable in a
//! long-running process. An evicted ID simply reports `AgreementNotFound`;
//! either way the agreement can never be unwound twice.

use std::collections::{HashSet, VecDeque};

use bookkeeper_types::{AgreementId, BookkeeperError, Result};

#[derive(Debug)]
pub struct ClosedAgreementGuard {
    closed: HashSet<AgreementId>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<AgreementId>,
    max_size: usize,
}

impl ClosedAgreementGuard {
    /// Create a guard remembering at most `max_size` IDs (at least one).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            closed: HashSet::with_capacity(max_size.min(1024)),
            order: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Record `id` as closed.
    ///
    /// # Errors
    /// [`BookkeeperError::AgreementClosed`] if it already was.
    pub fn mark_closed(&mut self, id: AgreementId) -> Result<()> {
        if self.closed.contains(&id) {
            return Err(BookkeeperError::AgreementClosed(id));
        }

        if self.closed.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.closed.remove(&oldest);
            }
        }

        self.closed.insert(id);
        self.order.push_back(id);
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self, id: &AgreementId) -> bool {
        self.closed.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.closed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }
}
