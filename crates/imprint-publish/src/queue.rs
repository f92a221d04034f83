//! In-memory delayed-execution queue.
//!
//! [`InMemoryDelayQueue`] implements [`DelayedExecutor`] by recording every
//! accepted submission. Tests and local tooling drain it and replay the
//! invocations against an engine to simulate the facility firing.
//!
//! ## Limitations
//!
//! - **No timers**: The `<PLUSET>` delay in the condition is recorded, not honored
//! - **No retries**: A replayed invocation runs exactly once per drain
//! - **No deduplication**: Re-submissions are queued again, like the real facility

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use ulid::Ulid;

use imprint_core::delay::{DelayReceipt, DelaySubmission, DelayedExecutor};
use imprint_core::error::status;
use imprint_core::{Error, Result};

/// A submission accepted by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRule {
    /// Assigned rule identifier.
    pub rule_id: String,
    /// The submission as received.
    pub submission: DelaySubmission,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<QueuedRule>,
    reject_with: Option<i32>,
}

/// In-memory delayed-execution facility.
///
/// ## Example
///
/// ```rust
/// use imprint_publish::queue::InMemoryDelayQueue;
///
/// let queue = InMemoryDelayQueue::new();
/// assert!(queue.is_empty().unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDelayQueue {
    state: RwLock<QueueState>,
    max_capacity: Option<usize>,
}

/// Converts a lock poison error to a scheduling error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::scheduling(status::PUBLISHER, "delay queue lock poisoned")
}

/// Status code reported when the queue is at capacity.
pub const QUEUE_FULL: i32 = -1_100_000;

impl InMemoryDelayQueue {
    /// Creates an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue that rejects submissions beyond `max_capacity`.
    #[must_use]
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            state: RwLock::new(QueueState::default()),
            max_capacity: Some(max_capacity),
        }
    }

    /// Makes every later submission fail with `code` until cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn reject_with(&self, code: Option<i32>) -> Result<()> {
        self.state.write().map_err(poison_err)?.reject_with = code;
        Ok(())
    }

    /// Takes the oldest queued rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn take(&self) -> Result<Option<QueuedRule>> {
        Ok(self.state.write().map_err(poison_err)?.queue.pop_front())
    }

    /// Returns the oldest queued rule without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn peek(&self) -> Result<Option<QueuedRule>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.queue.front().cloned())
    }

    /// Removes and returns every queued rule, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn drain(&self) -> Result<Vec<QueuedRule>> {
        let mut state = self.state.write().map_err(poison_err)?;
        let drained = state.queue.drain(..).collect();
        drop(state);
        Ok(drained)
    }

    /// Number of queued rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.queue.len())
    }

    /// Returns true if nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Clears queued rules and any injected rejection.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.queue.clear();
        state.reject_with = None;
        drop(state);
        Ok(())
    }
}

#[async_trait]
impl DelayedExecutor for InMemoryDelayQueue {
    async fn submit(&self, submission: DelaySubmission) -> Result<DelayReceipt> {
        let mut state = self.state.write().map_err(poison_err)?;

        if let Some(code) = state.reject_with {
            return Err(Error::scheduling(code, "delayed execution rejected the rule"));
        }
        if let Some(max) = self.max_capacity {
            if state.queue.len() >= max {
                return Err(Error::scheduling(QUEUE_FULL, "delay queue is full"));
            }
        }

        let rule_id = Ulid::new().to_string();
        state.queue.push_back(QueuedRule {
            rule_id: rule_id.clone(),
            submission,
        });
        drop(state);

        Ok(DelayReceipt { rule_id })
    }
}
