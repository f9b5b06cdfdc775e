//! Backend capability surface and versioned installation.
//!
//! The original firmware contract is a process-wide table of function
//! pointers with a leading version field, set once before anything else runs.
//! Here the table is a trait object injected through [`Osal::install`]; the
//! "missing slot" failure class is absorbed by the type system (an
//! implementation cannot omit a method), while the version check remains the
//! runtime gate against a stale backend.

use std::sync::Arc;

use crate::error::{OsError, OsResult};

/// Version the manager core was built against. A backend advertising any
/// other value is rejected at installation.
pub const ADAPTER_VERSION: u32 = 0x0000_0001;

/// Opaque nesting level returned by `enter_critical`.
///
/// Enter/exit calls pair 1:1; reentrant nesting is tracked by the token
/// value, not by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalToken(pub(crate) u32);

impl CriticalToken {
    pub fn level(self) -> u32 {
        self.0
    }
}

/// Capability surface one target OS must provide.
///
/// Implementations must be safe to call from any task context. Only
/// `enter_critical`/`exit_critical` carry an ordering obligation: exit must
/// receive exactly the token the matching enter returned.
pub trait OsBackend: Send + Sync {
    /// Masks preemption for the calling context and returns the previous
    /// nesting level.
    fn enter_critical(&self) -> CriticalToken;

    /// Restores the preemption state captured in `token`.
    fn exit_critical(&self, token: CriticalToken);

    /// Blocks the calling task for at least `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);

    /// Monotonic milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u64;

    /// Raw tick counter; wraps at `u32::MAX`.
    fn tick(&self) -> u32;

    /// Creates a detached task running `entry`.
    fn spawn(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> OsResult<()>;
}

/// Installed, version-checked handle to the OS services.
///
/// Cheap to clone; all clones share the same backend. Exactly one backend is
/// expected per process, installed before the manager is constructed.
#[derive(Clone)]
pub struct Osal {
    backend: Arc<dyn OsBackend>,
}

impl std::fmt::Debug for Osal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Osal").finish_non_exhaustive()
    }
}

impl Osal {
    /// Binds `backend` as the OS services provider.
    ///
    /// Fails fast with [`OsError::VersionMismatch`] when `version` differs
    /// from [`ADAPTER_VERSION`]; a mismatched table must never be consulted.
    pub fn install(version: u32, backend: Arc<dyn OsBackend>) -> OsResult<Self> {
        if version != ADAPTER_VERSION {
            return Err(OsError::VersionMismatch {
                expected: ADAPTER_VERSION,
                found: version,
            });
        }
        Ok(Self { backend })
    }

    pub fn backend(&self) -> &Arc<dyn OsBackend> {
        &self.backend
    }

    pub fn now_ms(&self) -> u64 {
        self.backend.now_ms()
    }

    /// Millisecond timestamp truncated to the 32-bit counter width used by
    /// freshness bookkeeping. Consumers compare with wrapping subtraction.
    pub fn now_ms32(&self) -> u32 {
        self.backend.now_ms() as u32
    }

    pub fn tick(&self) -> u32 {
        self.backend.tick()
    }

    pub fn sleep_ms(&self, ms: u64) {
        self.backend.sleep_ms(ms)
    }

    pub fn spawn(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> OsResult<()> {
        self.backend.spawn(name, entry)
    }

    /// Runs `f` with preemption masked, restoring the previous level after.
    pub fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        let token = self.backend.enter_critical();
        let out = f();
        self.backend.exit_critical(token);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostBackend;

    #[test]
    fn install_rejects_wrong_version() {
        let err = Osal::install(0xdead_beef, Arc::new(HostBackend::new())).unwrap_err();
        assert_eq!(
            err,
            OsError::VersionMismatch {
                expected: ADAPTER_VERSION,
                found: 0xdead_beef,
            }
        );
    }

    #[test]
    fn install_accepts_matching_version() {
        let osal = Osal::install(ADAPTER_VERSION, Arc::new(HostBackend::new())).unwrap();
        let t0 = osal.now_ms();
        assert!(osal.now_ms() >= t0);
    }

    #[test]
    fn handle_debug_is_opaque() {
        let osal = Osal::install(ADAPTER_VERSION, Arc::new(HostBackend::new())).unwrap();
        assert!(format!("{osal:?}").starts_with("Osal"));
    }

    #[test]
    fn critical_sections_nest() {
        let osal = Osal::install(ADAPTER_VERSION, Arc::new(HostBackend::new())).unwrap();
        let value = osal.critical(|| osal.critical(|| 7));
        assert_eq!(value, 7);
    }
}
