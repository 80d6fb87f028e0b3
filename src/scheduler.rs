//! Per-engine scheduling: a repeating sampling tick and a single-shot,
//! cancellable delayed continuation.
//!
//! Both schedules are tokio tasks owned by the [`Scheduler`]. Each carries a
//! [`CancelToken`]; cancelling sets the token and aborts the task. Callbacks
//! that race with cancellation (already woken, waiting on a lock) must check
//! the token once they hold the state they are about to mutate.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Shared cancellation flag for one scheduled task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Scheduled {
    handle: JoinHandle<()>,
    token: CancelToken,
}

impl Scheduled {
    fn cancel(self) {
        self.token.cancel();
        self.handle.abort();
    }

    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

/// Owns the sampling tick and the pending single-shot wait of one engine.
#[derive(Debug)]
pub struct Scheduler {
    runtime: Handle,
    ticker: Option<Scheduled>,
    once: Option<Scheduled>,
}

impl Scheduler {
    /// Create a scheduler that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            ticker: None,
            once: None,
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    pub fn current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Run `on_tick` every `period`, first after one full period.
    ///
    /// Replaces any ticker already running. Ticks missed because a callback
    /// overran are skipped, never replayed in a burst.
    pub fn start_ticking<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut(&CancelToken) + Send + 'static,
    {
        self.stop_ticking();

        let token = CancelToken::new();
        let task_token = token.clone();
        let handle = self.runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if task_token.is_cancelled() {
                    break;
                }
                on_tick(&task_token);
            }
        });

        self.ticker = Some(Scheduled { handle, token });
    }

    /// Stop the repeating tick, if any.
    pub fn stop_ticking(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().map_or(false, Scheduled::is_live)
    }

    /// Run `continuation` once after `delay`.
    ///
    /// Any wait already scheduled is cancelled first, so at most one is ever
    /// pending. The continuation receives the token of its own wait.
    pub fn schedule_once<F, Fut>(&mut self, delay: Duration, continuation: F) -> CancelToken
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel_scheduled();

        let token = CancelToken::new();
        let task_token = token.clone();
        let handle = self.runtime.spawn(async move {
            time::sleep(delay).await;
            if task_token.is_cancelled() {
                return;
            }
            continuation(task_token).await;
        });

        self.once = Some(Scheduled {
            handle,
            token: token.clone(),
        });
        token
    }

    /// Cancel the pending single-shot wait, if any.
    pub fn cancel_scheduled(&mut self) {
        if let Some(once) = self.once.take() {
            once.cancel();
        }
    }

    pub fn has_scheduled(&self) -> bool {
        self.once.as_ref().map_or(false, Scheduled::is_live)
    }

    /// Cancel everything.
    pub fn shutdown(&mut self) {
        self.stop_ticking();
        self.cancel_scheduled();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
