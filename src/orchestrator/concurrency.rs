//! Cancellation and backpressure primitives for the query orchestrator.
//!
//! A question's `answer` call is sequential end to end, but many calls run
//! concurrently. Two knobs bound that concurrency: a query-side semaphore
//! rejecting with `Overloaded` once `max_concurrent_queries` callers are in
//! flight, and an ingest-side bounded queue rejecting with `QueueFull`.
//! Within a single call, a [`CancellationToken`] lets a caller abort between
//! pipeline stages without tearing down the whole process.

use crate::error::{OrchestratorError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, TryAcquireError};

/// A cooperative cancellation flag, checked between pipeline stages rather
/// than preempting mid-stage.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns [`OrchestratorError::Cancelled`] if this token has been
    /// cancelled. Call between pipeline stages, never mid-stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(OrchestratorError::Cancelled.into());
        }
        Ok(())
    }
}

/// Admission control for concurrent `answer` calls: a bounded semaphore
/// that sheds load with `Overloaded` rather than queueing, per the
/// "query handling does not queue" resource model.
pub struct QueryAdmission {
    semaphore: Semaphore,
}

/// Held for the lifetime of one `answer` call; releases its permit on drop.
pub struct QueryPermit<'a> {
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl QueryAdmission {
    /// Creates an admission gate allowing up to `max_concurrent` callers at
    /// once.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Semaphore::new(max_concurrent) }
    }

    /// Attempts to admit one caller immediately, never blocking.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Overloaded`] if every permit is in use.
    pub fn try_admit(&self) -> Result<QueryPermit<'_>> {
        match self.semaphore.try_acquire() {
            Ok(permit) => Ok(QueryPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(OrchestratorError::Overloaded.into()),
            Err(TryAcquireError::Closed) => Err(OrchestratorError::Overloaded.into()),
        }
    }
}

/// Admission control for the ingest pipeline: a bounded queue rejecting new
/// submissions with `QueueFull` rather than growing unbounded.
pub struct IngestQueue {
    capacity: usize,
    in_flight: std::sync::atomic::AtomicUsize,
}

/// Held for the duration of one queued ingest job.
pub struct IngestSlot<'a> {
    queue: &'a IngestQueue,
}

impl Drop for IngestSlot<'_> {
    fn drop(&mut self) {
        self.queue.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IngestQueue {
    /// Creates a queue admitting up to `capacity` in-flight ingest jobs.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self { capacity, in_flight: std::sync::atomic::AtomicUsize::new(0) }
    }

    /// Attempts to reserve a slot for one ingest job.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::QueueFull`] if the queue is at capacity.
    pub fn try_reserve(&self) -> Result<IngestSlot<'_>> {
        let mut current = self.in_flight.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                return Err(OrchestratorError::QueueFull.into());
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(IngestSlot { queue: self }),
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.check().is_err());
    }

    #[test]
    fn test_cloned_token_shares_cancellation_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_admission_rejects_beyond_capacity() {
        let gate = QueryAdmission::new(1);
        let first = gate.try_admit();
        assert!(first.is_ok());
        assert!(gate.try_admit().is_err());
        drop(first);
        assert!(gate.try_admit().is_ok());
    }

    #[test]
    fn test_ingest_queue_rejects_when_full() {
        let queue = IngestQueue::new(1);
        let slot = queue.try_reserve();
        assert!(slot.is_ok());
        assert!(queue.try_reserve().is_err());
        drop(slot);
        assert!(queue.try_reserve().is_ok());
    }
}
