//! Dual-mode execution: every manager operation is an `async fn`, and this
//! bridge drives one to completion for callers that are not inside a runtime.
//!
//! A blocking call first checks for an ambient Tokio runtime. If one is
//! driving the current thread the call fails with
//! [`PromptError::NestedScheduler`] instead of blocking a worker or
//! deadlocking; otherwise a private current-thread runtime is built for that
//! call alone and dropped before the call returns.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Builder, Handle};
use tracing::trace;

use crate::error::{PromptError, PromptResult};

static LIVE_PRIVATE_SCHEDULERS: AtomicUsize = AtomicUsize::new(0);

/// How the current thread may invoke manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// No runtime is active; blocking calls build a private one.
    Blocking,
    /// A runtime drives this thread; operations must be awaited.
    Suspending,
}

/// Detects whether a Tokio runtime is driving the current thread.
#[must_use]
pub fn current_mode() -> ExecutionMode {
    if Handle::try_current().is_ok() {
        ExecutionMode::Suspending
    } else {
        ExecutionMode::Blocking
    }
}

/// Number of private runtimes currently alive across all blocking calls.
///
/// Returns to zero whenever no blocking call is in flight.
#[must_use]
pub fn live_private_schedulers() -> usize {
    LIVE_PRIVATE_SCHEDULERS.load(Ordering::Acquire)
}

struct LiveScheduler;

impl LiveScheduler {
    fn enter() -> Self {
        LIVE_PRIVATE_SCHEDULERS.fetch_add(1, Ordering::AcqRel);
        Self
    }
}

impl Drop for LiveScheduler {
    fn drop(&mut self) {
        LIVE_PRIVATE_SCHEDULERS.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs `future` to completion on a private runtime scoped to this call.
///
/// # Errors
///
/// Returns [`PromptError::NestedScheduler`] when called from within a
/// runtime, [`PromptError::SchedulerUnavailable`] when the private runtime
/// cannot be built, and otherwise whatever `future` resolves to.
pub fn run_blocking<F, T>(operation: &'static str, future: F) -> PromptResult<T>
where
    F: Future<Output = PromptResult<T>>,
{
    if current_mode() == ExecutionMode::Suspending {
        return Err(PromptError::NestedScheduler { operation });
    }

    // Declared first so it drops after the runtime.
    let _live = LiveScheduler::enter();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| PromptError::SchedulerUnavailable {
            reason: err.to_string(),
        })?;
    trace!(operation, "driving operation on private runtime");
    runtime.block_on(future)
}
