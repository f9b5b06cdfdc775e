//! Embedded Wi-Fi connection manager core.
//!
//! A single consumer task owns a five-state station machine (plus an
//! orthogonal soft-AP flag), a bounded scan-result table and a saved-profile
//! store. Every stimulus, whether an application command, a firmware
//! indication or a timer expiry, arrives as an [`event::Envelope`] through
//! one bounded queue and is consumed strictly in arrival order.
//!
//! OS services (tasks, timers, queues, time) come from the [`osal`] crate
//! behind an injected backend, so the same manager runs on a host build for
//! tests and on an RTOS port in production. The radio driver, the network
//! stack and the application observe the manager through the [`manager::Radio`],
//! [`manager::NetStack`] and [`manager::AppCallbacks`] trait seams.

pub mod error;
pub mod event;
pub mod manager;
pub mod profile;
pub mod scan;
pub mod state;
pub mod wire;

pub use error::{MgmrError, MgmrResult};
pub use event::{Envelope, EventClass, EventId, Payload};
pub use manager::{
    AppCallbacks, MgmrConfig, NetStack, NullCallbacks, Radio, WifiMgmr, QUEUE_DEPTH,
};
pub use profile::{Profile, ProfileStore, PROFILES_MAX};
pub use scan::{
    Auth, Cipher, ScanItem, ScanTable, StaInfo, StaList, AP_STA_MAX, SCAN_ITEMS_MAX,
    SCAN_ITEM_TIMEOUT_MS,
};
pub use state::{ApState, ConnState, ConnectIndInfo, Features, IndType, WlanInterface, WlanMode};
pub use wire::{
    ApMsg, CfgElementMsg, ConnectIndMsg, IpInfoMsg, PmkBuf, ProfileMsg, PskBuf, ScanIndMsg,
    SsidBuf, StaIndMsg, PMK_MAX, PSK_MAX, SSID_MAX,
};
