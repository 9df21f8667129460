//! Periodic task scheduling.
//!
//! The alarm monitor needs a fixed-period tick. Rather than owning a timer
//! thread, it asks a [`Scheduler`] for one and keeps the returned
//! [`CancelToken`]. Production code uses [`TokioScheduler`]; tests use
//! [`ManualScheduler`], which only fires when virtual time is advanced.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, ManualClock};

/// A periodic callback.
pub type Task = Box<dyn FnMut() + Send>;

type CancelHook = Box<dyn FnOnce() + Send>;

pub trait Scheduler {
    /// Run `task` every `period` until the returned token is cancelled.
    /// The first run happens one full period after scheduling.
    fn schedule(&self, period: Duration, task: Task) -> CancelToken;
}

/// Handle for a scheduled task. Cancelling twice is a no-op.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    cancelled: AtomicBool,
    hook: Mutex<Option<CancelHook>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                hook: Mutex::new(None),
            }),
        }
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hook = self
            .inner
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register cleanup to run on cancellation. Runs immediately if the
    /// token is already cancelled.
    fn on_cancel(&self, hook: CancelHook) {
        if self.is_cancelled() {
            hook();
            return;
        }
        *self.inner.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
        // cancel() may have raced in between the check and the store
        if self.is_cancelled() {
            let hook = self
                .inner
                .hook
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(hook) = hook {
                hook();
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Runs tasks on a tokio runtime with `tokio::time::interval`.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, period: Duration, mut task: Task) -> CancelToken {
        let token = CancelToken::new();
        let flag = token.clone();
        let join = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if flag.is_cancelled() {
                    break;
                }
                task();
            }
        });
        token.on_cancel(Box::new(move || join.abort()));
        token
    }
}

struct ManualTask {
    period: chrono::Duration,
    next_due: DateTime<Utc>,
    task: Task,
    token: CancelToken,
}

/// Virtual-time scheduler driven by [`ManualScheduler::advance`].
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    tasks: Arc<Mutex<Vec<ManualTask>>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of tasks that have not been cancelled.
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Move virtual time forward, firing every task that falls due, in due
    /// order. The clock is set to each due instant before its task runs.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + to_chrono(by);
        loop {
            let next = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                tasks.retain(|t| !t.token.is_cancelled());
                let idx = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.next_due <= target)
                    .min_by_key(|(_, t)| t.next_due)
                    .map(|(i, _)| i);
                idx.map(|i| tasks.remove(i))
            };
            let Some(mut due) = next else { break };

            self.clock.set(due.next_due);
            (due.task)();
            due.next_due += due.period;

            if !due.token.is_cancelled() {
                self.tasks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(due);
            }
        }
        self.clock.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, period: Duration, task: Task) -> CancelToken {
        let token = CancelToken::new();
        let period = to_chrono(period).max(chrono::Duration::milliseconds(1));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ManualTask {
                period,
                next_due: self.clock.now() + period,
                task,
                token: token.clone(),
            });
        token
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
