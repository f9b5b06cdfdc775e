//! Host (std) backend.
//!
//! Used for development and testing on a regular OS. There is no preemption
//! to mask on a hosted target, so the critical-section slots only track
//! nesting depth to keep the 1:1 pairing contract observable; mutual
//! exclusion on the host comes from the [`crate::sync`] primitives.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::warn;

use crate::adapter::{CriticalToken, OsBackend};
use crate::error::{OsError, OsResult};

pub struct HostBackend {
    epoch: Instant,
    critical_depth: AtomicU32,
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            critical_depth: AtomicU32::new(0),
        }
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OsBackend for HostBackend {
    fn enter_critical(&self) -> CriticalToken {
        CriticalToken(self.critical_depth.fetch_add(1, Ordering::SeqCst))
    }

    fn exit_critical(&self, token: CriticalToken) {
        let depth = self.critical_depth.fetch_sub(1, Ordering::SeqCst);
        if depth == 0 || depth - 1 != token.level() {
            warn!("unbalanced critical section exit (depth {depth}, token {})", token.level());
        }
    }

    fn sleep_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn tick(&self) -> u32 {
        self.now_ms() as u32
    }

    fn spawn(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> OsResult<()> {
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || entry())
            .map(|_| ())
            .map_err(|_| OsError::SpawnFailed)
    }
}
