//! One-shot and periodic software timers.
//!
//! Callbacks run on a context spawned through the backend, never on the
//! caller's task, and must not block; manager timers only enqueue an
//! envelope. A generation counter makes `cancel` safe against an expiry that
//! is already in flight: the callback fires only when its generation is still
//! current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapter::Osal;
use crate::error::OsResult;

pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

pub struct Timer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    osal: Osal,
    name: &'static str,
    callback: TimerCallback,
    generation: AtomicU64,
}

impl Timer {
    pub fn new(osal: &Osal, name: &'static str, callback: TimerCallback) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                osal: osal.clone(),
                name,
                callback,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Arms the timer to fire once after `ms`. Re-arming supersedes any
    /// previously scheduled expiry.
    pub fn start_once(&self, ms: u64) -> OsResult<()> {
        let armed = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        self.inner.osal.spawn(
            self.inner.name,
            Box::new(move || {
                inner.osal.sleep_ms(ms);
                if inner.generation.load(Ordering::SeqCst) == armed {
                    (inner.callback)();
                }
            }),
        )
    }

    /// Arms the timer to fire every `ms` until cancelled or re-armed.
    pub fn start_periodic(&self, ms: u64) -> OsResult<()> {
        let armed = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        self.inner.osal.spawn(
            self.inner.name,
            Box::new(move || loop {
                inner.osal.sleep_ms(ms);
                if inner.generation.load(Ordering::SeqCst) != armed {
                    break;
                }
                (inner.callback)();
            }),
        )
    }

    /// Disarms the timer. An expiry already past its generation check may
    /// still complete; new expiries will not fire.
    pub fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }
}
