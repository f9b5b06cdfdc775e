//! # osal
//!
//! Portable OS services layer for the Wi-Fi connection manager. Everything
//! above this crate talks to the operating system through a versioned,
//! injected capability surface instead of calling an RTOS directly, so the
//! manager core stays free of any scheduler-specific symbol.
//!
//! ## Module Overview
//! - [`adapter`] – the [`OsBackend`] trait, version gate and installed handle.
//! - [`sync`]    – semaphores, event groups and bounded message queues with
//!   RTOS-style timeout conventions.
//! - [`timer`]   – one-shot and periodic software timers whose callbacks run
//!   on a separate, non-blocking context.
//! - [`host`]    – the std-based backend shipped with this workspace.
//!
//! One backend implementation exists per target OS; the embedding application
//! installs exactly one at boot via [`Osal::install`].

pub mod adapter;
pub mod error;
pub mod host;
pub mod sync;
pub mod timer;

pub use adapter::{CriticalToken, Osal, OsBackend, ADAPTER_VERSION};
pub use error::{OsError, OsResult};
pub use host::HostBackend;
pub use sync::{EventGroup, MessageQueue, Semaphore, Wait, WaitMode, NO_WAIT, WAIT_FOREVER};
pub use timer::Timer;
