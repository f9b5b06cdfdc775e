//! Manager context: event queue, timers, trait collaborators and the status
//! facade.
//!
//! One [`WifiMgmr`] per process is the supported convention. The context is
//! constructed explicitly and handed its collaborators; nothing here is a
//! global. Producers on any task enqueue envelopes; a single consumer task
//! (spawned by [`WifiMgmr::start`], or driven manually with
//! [`WifiMgmr::poll_once`]) dequeues and runs the state machine, one envelope
//! at a time, in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use osal::{MessageQueue, Osal, Timer, Wait};
use parking_lot::Mutex;

use crate::error::{MgmrError, MgmrResult};
use crate::event::{Envelope, EventId, Payload};
use crate::scan::{ScanItem, StaInfo, SCAN_ITEM_TIMEOUT_MS};
use crate::state::{
    Action, ApState, ConnState, ConnectIndInfo, Core, Features, WlanInterface,
    STATUS_CODE_CONNECT_TIMEOUT,
};
use crate::wire::{ApMsg, CfgElementMsg, ConnectIndMsg, IpInfoMsg, ProfileMsg, ScanIndMsg, StaIndMsg};

/// Event queue capacity.
pub const QUEUE_DEPTH: usize = 16;

/// Bound on how long an application command may wait for a queue slot.
const APP_POST_TIMEOUT_MS: u32 = 1_000;

/// Radio command surface. The firmware driver implements this; the manager
/// only issues commands, it never blocks in them.
pub trait Radio: Send + Sync {
    fn connect(&self, profile: &ProfileMsg);
    fn disconnect(&self);
    fn scan(&self);
    fn ap_start(&self, ap: &ApMsg);
    fn ap_stop(&self);
    fn sniffer(&self) {}
    fn channel_set(&self, _channel: u32) {}
    fn powersave(&self, _mode: u32) {}
    fn raw_send(&self, _frame: &[u8]) {}
    fn cfg_req(&self, _cfg: &CfgElementMsg) {}
    fn conf_max_sta(&self, _limit: u32) {}
    fn rc_config(&self, _value: u32) {}
    fn denoise(&self, _value: u32) {}
    fn reload_tsen(&self) {}
}

/// Network stack notifications.
pub trait NetStack: Send + Sync {
    fn ip_acquired(&self, info: &IpInfoMsg);
    fn link_down(&self);
}

/// Application-level notifications. All optional.
pub trait AppCallbacks: Send + Sync {
    fn scan_complete(&self) {}
    fn state_changed(&self, _old: ConnState, _new: ConnState) {}
}

/// No-op callbacks for embeddings that poll the facade instead.
pub struct NullCallbacks;

impl AppCallbacks for NullCallbacks {}

/// Manager tunables, built once and handed to [`WifiMgmr::new`].
#[derive(Debug, Clone)]
pub struct MgmrConfig {
    scan_item_timeout_ms: u32,
    connect_timeout_ms: u64,
    scan_timeout_ms: u64,
    country_code: String,
    hostname: String,
    features: Features,
}

impl Default for MgmrConfig {
    fn default() -> Self {
        Self {
            scan_item_timeout_ms: SCAN_ITEM_TIMEOUT_MS,
            connect_timeout_ms: 10_000,
            scan_timeout_ms: 10_000,
            country_code: "EU".to_owned(),
            hostname: String::new(),
            features: Features::default(),
        }
    }
}

impl MgmrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan_item_timeout_ms(mut self, ms: u32) -> Self {
        self.scan_item_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn scan_timeout_ms(mut self, ms: u64) -> Self {
        self.scan_timeout_ms = ms;
        self
    }

    pub fn country_code(mut self, code: &str) -> Self {
        self.country_code = code.to_owned();
        self
    }

    pub fn hostname(mut self, name: &str) -> Self {
        self.hostname = name.to_owned();
        self
    }

    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }
}

struct Shared {
    osal: Osal,
    config: MgmrConfig,
    queue: MessageQueue<Envelope, QUEUE_DEPTH>,
    core: Mutex<Core>,
    radio: Arc<dyn Radio>,
    net: Arc<dyn NetStack>,
    app: Arc<dyn AppCallbacks>,
    connect_timer: Timer,
    scan_timer: Timer,
    running: AtomicBool,
    country_code: Mutex<String>,
    hostname: Mutex<String>,
}

/// The manager context. Cheap to clone; all clones share one queue and one
/// state machine.
#[derive(Clone)]
pub struct WifiMgmr {
    shared: Arc<Shared>,
}

impl WifiMgmr {
    pub fn new(
        osal: Osal,
        config: MgmrConfig,
        radio: Arc<dyn Radio>,
        net: Arc<dyn NetStack>,
        app: Arc<dyn AppCallbacks>,
    ) -> MgmrResult<Self> {
        if config.country_code.len() != 2 {
            return Err(MgmrError::InvalidArgument("country code must be 2 letters"));
        }
        let queue = MessageQueue::new();

        // Timer expiries only enqueue; the consumer task does the work.
        let q = queue.clone();
        let connect_timer = Timer::new(
            &osal,
            "wmgr-connect-tmr",
            Arc::new(move || {
                let env = Envelope::with_payload(
                    EventId::FwIndDisconnect,
                    Payload::ConnectInd(ConnectIndMsg::failure(STATUS_CODE_CONNECT_TIMEOUT)),
                );
                if q.try_send(env).is_err() {
                    warn!("queue full, connect timeout indication dropped");
                }
            }),
        );
        let q = queue.clone();
        let scan_timer = Timer::new(
            &osal,
            "wmgr-scan-tmr",
            Arc::new(move || {
                if q.try_send(Envelope::new(EventId::GlbScanDone)).is_err() {
                    warn!("queue full, scan timeout indication dropped");
                }
            }),
        );

        let core = Core::new(config.scan_item_timeout_ms, config.features);
        let country_code = Mutex::new(config.country_code.clone());
        let hostname = Mutex::new(config.hostname.clone());
        Ok(Self {
            shared: Arc::new(Shared {
                osal,
                config,
                queue,
                core: Mutex::new(core),
                radio,
                net,
                app,
                connect_timer,
                scan_timer,
                running: AtomicBool::new(false),
                country_code,
                hostname,
            }),
        })
    }

    // ---- producer API: application commands (bounded blocking enqueue) ----

    pub fn connect(&self, ssid: &str, psk: &str) -> MgmrResult<()> {
        self.connect_profile(ProfileMsg::new(ssid, psk)?)
    }

    /// Each connect session starts with the default reconnect policy, so a
    /// disable left behind by an earlier manual disconnect does not leak into
    /// the new link.
    pub fn connect_profile(&self, profile: ProfileMsg) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::GlbEnableAutoreconnect))?;
        self.post_app(Envelope::with_payload(
            EventId::AppConnect,
            Payload::Profile(profile),
        ))
    }

    /// Tears the link down and disables autoreconnect first, so the drop
    /// indication that follows does not schedule a reconnect.
    pub fn disconnect(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::GlbDisableAutoreconnect))?;
        self.post_app(Envelope::new(EventId::AppDisconnect))
    }

    pub fn reconnect(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::AppReconnect))
    }

    pub fn trigger_scan(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::FwScan))
    }

    pub fn ap_start(&self, ap: ApMsg) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(EventId::AppApStart, Payload::Ap(ap)))
    }

    pub fn ap_stop(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::AppApStop))
    }

    pub fn autoreconnect_enable(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::GlbEnableAutoreconnect))
    }

    pub fn autoreconnect_disable(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::GlbDisableAutoreconnect))
    }

    /// Address assignment from the network stack (DHCP bound or renewed).
    pub fn ip_update(&self, info: IpInfoMsg) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(
            EventId::AppIpGot,
            Payload::IpInfo(info),
        ))
    }

    pub fn phy_up(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::AppPhyUp))
    }

    pub fn sniffer(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::AppSniffer))
    }

    pub fn conf_max_sta(&self, limit: u32) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(
            EventId::AppConfMaxSta,
            Payload::Value(limit),
        ))
    }

    pub fn rc_config(&self, value: u32) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(
            EventId::AppRcConfig,
            Payload::Value(value),
        ))
    }

    pub fn denoise(&self, value: u32) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(
            EventId::AppDenoise,
            Payload::Value(value),
        ))
    }

    pub fn reload_tsen(&self) -> MgmrResult<()> {
        self.post_app(Envelope::new(EventId::AppReloadTsen))
    }

    // ---- producer API: firmware indications (never block) ----

    pub fn fw_ind_connected(&self, ind: ConnectIndMsg) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::FwIndConnected,
            Payload::ConnectInd(ind),
        ))
    }

    pub fn fw_ind_disconnect(&self, ind: ConnectIndMsg) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::FwIndDisconnect,
            Payload::ConnectInd(ind),
        ))
    }

    /// Scan results are the droppable indication class: a full queue loses
    /// the sighting, the next beacon resupplies it.
    pub fn fw_scan_ind(&self, ind: ScanIndMsg, probe_resp: bool) {
        let id = if probe_resp {
            EventId::GlbScanIndProbeResp
        } else {
            EventId::GlbScanIndBeacon
        };
        if self
            .shared
            .queue
            .try_send(Envelope::with_payload(id, Payload::ScanInd(ind)))
            .is_err()
        {
            debug!("queue full, scan sighting dropped");
        }
    }

    pub fn fw_scan_done(&self) -> MgmrResult<()> {
        self.post_fw(Envelope::new(EventId::GlbScanDone))
    }

    pub fn fw_sta_new(&self, ind: StaIndMsg) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::GlbApIndStaNew,
            Payload::StaInd(ind),
        ))
    }

    pub fn fw_sta_del(&self, sta_idx: u8) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::GlbApIndStaDel,
            Payload::StaIdx(sta_idx),
        ))
    }

    pub fn fw_channel_set(&self, channel: u32) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::FwChannelSet,
            Payload::Value(channel),
        ))
    }

    pub fn fw_powersaving(&self, mode: u32) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::FwPowersaving,
            Payload::Value(mode),
        ))
    }

    pub fn fw_data_raw_send(&self, frame: Vec<u8>) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(
            EventId::FwDataRawSend,
            Payload::Raw(frame),
        ))
    }

    pub fn fw_cfg_req(&self, cfg: CfgElementMsg) -> MgmrResult<()> {
        self.post_fw(Envelope::with_payload(EventId::FwCfgReq, Payload::Cfg(cfg)))
    }

    fn post_app(&self, env: Envelope) -> MgmrResult<()> {
        self.shared
            .queue
            .send(env, Wait::Millis(APP_POST_TIMEOUT_MS))
            .map_err(MgmrError::from)
    }

    fn post_fw(&self, env: Envelope) -> MgmrResult<()> {
        self.shared.queue.try_send(env).map_err(|err| {
            warn!("queue full, {:?} indication lost", err);
            MgmrError::QueueFull
        })
    }

    // ---- consumer ----

    /// Spawns the manager task through the backend. Idempotent while running.
    pub fn start(&self) -> MgmrResult<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let this = self.clone();
        self.shared
            .osal
            .spawn("wifi-mgmr", Box::new(move || this.run()))
            .map_err(MgmrError::from)
    }

    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Consumer loop body. Bounded waits so `stop` is observed promptly.
    pub fn run(&self) {
        info!("manager task up");
        while self.shared.running.load(Ordering::SeqCst) {
            match self.poll_once(Wait::Millis(200)) {
                Ok(_) | Err(MgmrError::Timeout) => {}
                Err(err) => {
                    warn!("manager poll failed: {err}");
                }
            }
        }
        info!("manager task down");
    }

    /// Dequeues and dispatches one envelope. Returns `Ok(true)` when one was
    /// processed, `Err(Timeout)` when the wait elapsed empty.
    pub fn poll_once(&self, wait: Wait) -> MgmrResult<bool> {
        let env = self.shared.queue.recv(wait)?;
        self.dispatch(env);
        Ok(true)
    }

    fn dispatch(&self, env: Envelope) {
        let now = self.shared.osal.now_ms32();
        let (old, new, actions) = {
            let mut core = self.shared.core.lock();
            let old = core.state();
            let actions = core.dispatch(env, now);
            (old, core.state(), actions)
        };
        // Side effects run outside the lock; collaborators may call back into
        // the facade.
        for action in actions {
            self.execute(action);
        }
        if old != new {
            info!("station state {:?} -> {:?}", old, new);
            self.shared.app.state_changed(old, new);
        }
    }

    fn execute(&self, action: Action) {
        let s = &self.shared;
        match action {
            Action::RadioConnect(profile) => s.radio.connect(&profile),
            Action::RadioDisconnect => s.radio.disconnect(),
            Action::RadioScan => s.radio.scan(),
            Action::RadioSniffer => s.radio.sniffer(),
            Action::RadioApStart(ap) => s.radio.ap_start(&ap),
            Action::RadioApStop => s.radio.ap_stop(),
            Action::RadioChannelSet(ch) => s.radio.channel_set(ch),
            Action::RadioPowersave(mode) => s.radio.powersave(mode),
            Action::RadioRawSend(frame) => s.radio.raw_send(&frame),
            Action::RadioCfgReq(cfg) => s.radio.cfg_req(&cfg),
            Action::RadioConfMaxSta(limit) => s.radio.conf_max_sta(limit),
            Action::RadioRcConfig(value) => s.radio.rc_config(value),
            Action::RadioDenoise(value) => s.radio.denoise(value),
            Action::RadioReloadTsen => s.radio.reload_tsen(),
            Action::ArmConnectTimer => {
                if s.connect_timer.start_once(s.config.connect_timeout_ms).is_err() {
                    warn!("connect timer failed to arm");
                }
            }
            Action::CancelConnectTimer => s.connect_timer.cancel(),
            Action::ArmScanTimer => {
                if s.scan_timer.start_once(s.config.scan_timeout_ms).is_err() {
                    warn!("scan timer failed to arm");
                }
            }
            Action::CancelScanTimer => s.scan_timer.cancel(),
            Action::NotifyIpAcquired(info) => s.net.ip_acquired(&info),
            Action::NotifyLinkDown => s.net.link_down(),
            Action::NotifyScanComplete => s.app.scan_complete(),
            Action::Enqueue(env) => {
                if s.queue.try_send(env).is_err() {
                    warn!("queue full, self-posted envelope dropped");
                }
            }
        }
    }

    // ---- status facade: copy-out snapshots, never live references ----

    pub fn state_get(&self) -> ConnState {
        self.shared.core.lock().state()
    }

    pub fn ap_state_get(&self) -> ApState {
        self.shared.core.lock().ap_state()
    }

    pub fn status_code_get(&self) -> u16 {
        self.shared.core.lock().connect_ind.status_code
    }

    pub fn status_code_clean(&self) {
        self.shared.core.lock().connect_ind.status_code = 0;
    }

    pub fn connect_ind_info(&self) -> ConnectIndInfo {
        self.shared.core.lock().connect_ind.clone()
    }

    pub fn ip_info_get(&self) -> Option<IpInfoMsg> {
        self.shared.core.lock().ip_info
    }

    pub fn rssi_get(&self) -> i8 {
        self.shared.core.lock().rssi
    }

    pub fn channel_get(&self) -> u32 {
        self.shared.core.lock().channel()
    }

    pub fn is_phy_ready(&self) -> bool {
        self.shared.core.lock().phy_ready()
    }

    pub fn sta_interface_get(&self) -> WlanInterface {
        self.shared.core.lock().sta_if
    }

    pub fn ap_interface_get(&self) -> WlanInterface {
        self.shared.core.lock().ap_if
    }

    pub fn set_sta_mac(&self, mac: [u8; 6]) {
        self.shared.core.lock().sta_if.mac = mac;
    }

    pub fn set_ap_mac(&self, mac: [u8; 6]) {
        self.shared.core.lock().ap_if.mac = mac;
    }

    pub fn sta_cnt_get(&self) -> usize {
        self.shared.core.lock().stas.count()
    }

    pub fn sta_info_get(&self, sta_idx: u8) -> Option<StaInfo> {
        self.shared.core.lock().stas.get(sta_idx).copied()
    }

    pub fn sta_list_get(&self) -> Vec<StaInfo> {
        self.shared.core.lock().stas.snapshot()
    }

    /// Kicks a station off the list through the queue, so the removal is
    /// serialized with every other mutation.
    pub fn sta_delete(&self, sta_idx: u8) -> MgmrResult<()> {
        self.post_app(Envelope::with_payload(
            EventId::GlbApIndStaDel,
            Payload::StaIdx(sta_idx),
        ))
    }

    /// Timeout-filtered scan snapshot.
    pub fn scan_items_get(&self) -> Vec<ScanItem> {
        let now = self.shared.osal.now_ms32();
        self.shared.core.lock().scan.snapshot(now)
    }

    pub fn set_country_code(&self, code: &str) -> MgmrResult<()> {
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(MgmrError::InvalidArgument("country code must be 2 letters"));
        }
        *self.shared.country_code.lock() = code.to_ascii_uppercase();
        Ok(())
    }

    pub fn country_code_get(&self) -> String {
        self.shared.country_code.lock().clone()
    }

    pub fn set_hostname(&self, name: &str) -> MgmrResult<()> {
        if name.is_empty() || name.len() > 32 {
            return Err(MgmrError::InvalidArgument("hostname must be 1..=32 bytes"));
        }
        *self.shared.hostname.lock() = name.to_owned();
        Ok(())
    }

    pub fn hostname_get(&self) -> String {
        self.shared.hostname.lock().clone()
    }
}
