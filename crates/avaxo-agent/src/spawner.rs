//! Task launch boundary
//!
//! Every per-command handler and every relay direction is started through a
//! [`TaskSpawner`]. Tasks are independent and unordered; the spawner only
//! attaches a tracing span and keeps a gauge of how many are still running.
//! No limit is enforced here.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

/// Launches independent tasks onto the tokio runtime
#[derive(Debug, Clone, Default)]
pub struct TaskSpawner {
    in_flight: Arc<AtomicUsize>,
}

impl TaskSpawner {
    /// Create a new spawner
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` as an independent task running inside `span`
    pub fn spawn<F>(&self, span: Span, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = InFlight::enter(Arc::clone(&self.in_flight));
        tokio::spawn(
            async move {
                let _guard = guard;
                future.await
            }
            .instrument(span),
        )
    }

    /// Number of spawned tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Decrements the gauge when the task's future is dropped, finished or not
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
