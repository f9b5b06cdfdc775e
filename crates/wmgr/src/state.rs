//! Connection state machine.
//!
//! [`Core`] is the single-threaded heart of the manager: it consumes one
//! envelope at a time and returns the side effects as [`Action`] values for
//! the caller to execute outside the lock. It never talks to the radio, the
//! network stack or the timers directly, which is what makes the transition
//! table testable in isolation.

use log::{debug, warn};

use crate::event::{Envelope, EventId, Payload};
use crate::profile::ProfileStore;
use crate::scan::{ScanTable, StaInfo, StaList};
use crate::wire::{ApMsg, CfgElementMsg, ConnectIndMsg, IpInfoMsg, ProfileMsg, PskBuf, SsidBuf};

/// Station-role connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnState {
    #[default]
    Idle,
    Connecting,
    ConnectedNoIp,
    ConnectedIp,
    Disconnected,
}

/// Soft-AP role state, orthogonal to [`ConnState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApState {
    #[default]
    Stopped,
    Started,
}

/// What the last recorded firmware indication was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndType {
    #[default]
    None,
    Connection,
    Disconnection,
}

/// Synthetic status code injected when the connect timer expires before any
/// firmware indication. Outside the 802.11 status-code range.
pub const STATUS_CODE_CONNECT_TIMEOUT: u16 = 0xFFFE;

/// Last connect/disconnect indication, recorded verbatim for the status
/// facade. Firmware status codes are data here, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectIndInfo {
    pub ind: IndType,
    pub status_code: u16,
    pub ssid: SsidBuf,
    /// Credentials of the profile the indication belongs to.
    pub psk: PskBuf,
    pub bssid: [u8; 6],
    pub chan_freq: u16,
    pub chan_band: u8,
}

/// Role of one wlan interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WlanMode {
    Sta,
    Ap,
}

/// Per-role interface bookkeeping: virtual interface index, hardware
/// address and whether DHCP has been kicked off on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WlanInterface {
    pub mode: WlanMode,
    pub vif_index: u8,
    pub mac: [u8; 6],
    pub dhcp_started: bool,
}

impl WlanInterface {
    fn new(mode: WlanMode, vif_index: u8) -> Self {
        Self {
            mode,
            vif_index,
            mac: [0; 6],
            dhcp_started: false,
        }
    }
}

/// Deferred-work bits, one per long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingTask(pub u32);

impl PendingTask {
    pub const SCAN: u32 = 1 << 0;

    pub fn set(&mut self, bit: u32) {
        self.0 |= bit;
    }

    pub fn clear(&mut self, bit: u32) {
        self.0 &= !bit;
    }

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

/// Behavior toggles, kept as a bitmask for interface stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features(pub u32);

impl Features {
    pub const SCAN_SAVE_HIDDEN_SSID: u32 = 1 << 0;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

/// Side effect requested by a transition, executed by the manager after the
/// dispatch returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RadioConnect(ProfileMsg),
    RadioDisconnect,
    RadioScan,
    RadioSniffer,
    RadioApStart(ApMsg),
    RadioApStop,
    RadioChannelSet(u32),
    RadioPowersave(u32),
    RadioRawSend(Vec<u8>),
    RadioCfgReq(CfgElementMsg),
    RadioConfMaxSta(u32),
    RadioRcConfig(u32),
    RadioDenoise(u32),
    RadioReloadTsen,
    ArmConnectTimer,
    CancelConnectTimer,
    ArmScanTimer,
    CancelScanTimer,
    NotifyIpAcquired(IpInfoMsg),
    NotifyLinkDown,
    NotifyScanComplete,
    Enqueue(Envelope),
}

pub(crate) struct Core {
    state: ConnState,
    ap_state: ApState,
    pub(crate) profiles: ProfileStore,
    pub(crate) scan: ScanTable,
    pub(crate) stas: StaList,
    pub(crate) connect_ind: ConnectIndInfo,
    pub(crate) ip_info: Option<IpInfoMsg>,
    pub(crate) sta_if: WlanInterface,
    pub(crate) ap_if: WlanInterface,
    pub(crate) rssi: i8,
    channel: u32,
    autoreconnect: bool,
    phy_ready: bool,
    pending: PendingTask,
}

impl Core {
    pub(crate) fn new(scan_item_timeout_ms: u32, features: Features) -> Self {
        Self {
            state: ConnState::Idle,
            ap_state: ApState::Stopped,
            profiles: ProfileStore::new(),
            scan: ScanTable::new(
                scan_item_timeout_ms,
                features.contains(Features::SCAN_SAVE_HIDDEN_SSID),
            ),
            stas: StaList::new(),
            connect_ind: ConnectIndInfo::default(),
            ip_info: None,
            sta_if: WlanInterface::new(WlanMode::Sta, 0),
            ap_if: WlanInterface::new(WlanMode::Ap, 1),
            rssi: 0,
            channel: 0,
            autoreconnect: true,
            phy_ready: false,
            pending: PendingTask::default(),
        }
    }

    pub(crate) fn state(&self) -> ConnState {
        self.state
    }

    pub(crate) fn ap_state(&self) -> ApState {
        self.ap_state
    }

    pub(crate) fn channel(&self) -> u32 {
        self.channel
    }

    pub(crate) fn phy_ready(&self) -> bool {
        self.phy_ready
    }

    /// Consumes one envelope and returns the requested side effects.
    ///
    /// `now` is the 32-bit millisecond tick used for scan-table timestamps.
    pub(crate) fn dispatch(&mut self, env: Envelope, now: u32) -> Vec<Action> {
        let mut out = Vec::new();
        match (env.id, env.payload) {
            (EventId::AppIdle, _) => {}
            (EventId::AppConnect, Payload::Profile(msg)) => {
                self.on_connect_request(msg, &mut out);
            }
            (EventId::AppConnected, _) => {
                // Informational marker from the supplicant glue.
                debug!("supplicant reports link established");
            }
            (EventId::AppIpGot, Payload::IpInfo(info))
            | (EventId::GlbIpUpdate, Payload::IpInfo(info)) => {
                self.on_ip_update(info, &mut out);
            }
            (EventId::AppDisconnect, _) => {
                self.on_disconnect_request(&mut out);
            }
            (EventId::AppReconnect, _) => {
                self.on_reconnect(&mut out);
            }
            (EventId::AppPhyUp, _) => {
                self.phy_ready = true;
            }
            (EventId::AppApStart, Payload::Ap(msg)) => {
                if self.ap_state == ApState::Stopped {
                    self.ap_state = ApState::Started;
                    out.push(Action::RadioApStart(msg));
                } else {
                    warn!("ap start ignored, already started");
                }
            }
            (EventId::AppApStop, _) => {
                if self.ap_state == ApState::Started {
                    self.ap_state = ApState::Stopped;
                    self.stas.clear();
                    out.push(Action::RadioApStop);
                }
            }
            (EventId::AppConfMaxSta, Payload::Value(n)) => {
                out.push(Action::RadioConfMaxSta(n));
            }
            (EventId::AppRcConfig, Payload::Value(v)) => {
                out.push(Action::RadioRcConfig(v));
            }
            (EventId::AppDenoise, Payload::Value(v)) => {
                out.push(Action::RadioDenoise(v));
            }
            (EventId::AppReloadTsen, _) => {
                out.push(Action::RadioReloadTsen);
            }
            (EventId::AppSniffer, _) => {
                out.push(Action::RadioSniffer);
            }
            (EventId::FwDisconnect, _) => {
                out.push(Action::RadioDisconnect);
            }
            (EventId::FwPowersaving, Payload::Value(mode)) => {
                out.push(Action::RadioPowersave(mode));
            }
            (EventId::FwChannelSet, Payload::Value(ch)) => {
                self.channel = ch;
                out.push(Action::RadioChannelSet(ch));
            }
            (EventId::FwScan, _) => {
                self.on_scan_request(&mut out);
            }
            (EventId::FwIndDisconnect, payload) => {
                let ind = match payload {
                    Payload::ConnectInd(ind) => ind,
                    _ => ConnectIndMsg::default(),
                };
                self.on_fw_disconnect(ind, &mut out);
            }
            (EventId::FwIndConnected, Payload::ConnectInd(ind)) => {
                self.on_fw_connected(ind, &mut out);
            }
            (EventId::FwDataRawSend, Payload::Raw(bytes)) => {
                out.push(Action::RadioRawSend(bytes));
            }
            (EventId::FwCfgReq, Payload::Cfg(msg)) => {
                out.push(Action::RadioCfgReq(msg));
            }
            (EventId::GlbScanIndBeacon, Payload::ScanInd(ind))
            | (EventId::GlbScanIndProbeResp, Payload::ScanInd(ind)) => {
                if matches!(self.state, ConnState::ConnectedNoIp | ConnState::ConnectedIp)
                    && ind.bssid == self.connect_ind.bssid
                {
                    self.rssi = ind.rssi;
                }
                self.scan.upsert(&ind, now);
            }
            (EventId::GlbApIndStaNew, Payload::StaInd(ind)) => {
                if !self.stas.add(StaInfo::from(&ind)) {
                    warn!("station list full, join record dropped");
                }
            }
            (EventId::GlbApIndStaDel, Payload::StaIdx(idx)) => {
                self.stas.delete(idx);
            }
            (EventId::GlbDisableAutoreconnect, _) => {
                self.autoreconnect = false;
            }
            (EventId::GlbEnableAutoreconnect, _) => {
                self.autoreconnect = true;
            }
            (EventId::GlbScanDone, _) => {
                self.on_scan_done(&mut out);
            }
            (id, payload) => {
                debug!("envelope {:?} with mismatched payload {:?} ignored", id, payload);
            }
        }
        out
    }

    fn on_connect_request(&mut self, msg: ProfileMsg, out: &mut Vec<Action>) {
        match self.state {
            ConnState::Idle | ConnState::Disconnected => {
                let idx = self.profiles.set(msg.clone());
                self.profiles.activate(idx);
                self.connect_ind = ConnectIndInfo::default();
                self.state = ConnState::Connecting;
                out.push(Action::RadioConnect(msg));
                out.push(Action::ArmConnectTimer);
            }
            other => {
                warn!("connect request ignored in state {:?}", other);
            }
        }
    }

    fn on_disconnect_request(&mut self, out: &mut Vec<Action>) {
        match self.state {
            ConnState::Connecting | ConnState::ConnectedNoIp | ConnState::ConnectedIp => {
                // Manual disconnect never schedules a reconnect.
                self.profiles.deactivate_all();
                out.push(Action::CancelConnectTimer);
                out.push(Action::RadioDisconnect);
            }
            other => {
                debug!("disconnect request ignored in state {:?}", other);
            }
        }
    }

    fn on_reconnect(&mut self, out: &mut Vec<Action>) {
        if !matches!(self.state, ConnState::Idle | ConnState::Disconnected) {
            debug!("reconnect ignored in state {:?}", self.state);
            return;
        }
        if let Some(profile) = self.profiles.active() {
            let msg = profile.msg.clone();
            self.state = ConnState::Connecting;
            out.push(Action::RadioConnect(msg));
            out.push(Action::ArmConnectTimer);
        }
    }

    fn on_fw_connected(&mut self, ind: ConnectIndMsg, out: &mut Vec<Action>) {
        if self.state != ConnState::Connecting {
            warn!("connected indication ignored in state {:?}", self.state);
            return;
        }
        out.push(Action::CancelConnectTimer);
        self.record_ind(IndType::Connection, &ind);
        if ind.status_code == 0 {
            self.state = ConnState::ConnectedNoIp;
            self.sta_if.dhcp_started = true;
        } else {
            debug!("association failed with status {}", ind.status_code);
            self.settle_after_drop(out);
        }
    }

    fn on_fw_disconnect(&mut self, ind: ConnectIndMsg, out: &mut Vec<Action>) {
        match self.state {
            ConnState::Connecting => {
                out.push(Action::CancelConnectTimer);
                self.record_ind(IndType::Disconnection, &ind);
                self.settle_after_drop(out);
            }
            ConnState::ConnectedNoIp | ConnState::ConnectedIp => {
                let had_ip = self.state == ConnState::ConnectedIp;
                self.record_ind(IndType::Disconnection, &ind);
                self.ip_info = None;
                self.sta_if.dhcp_started = false;
                self.rssi = 0;
                if had_ip {
                    out.push(Action::NotifyLinkDown);
                }
                self.settle_after_drop(out);
            }
            other => {
                debug!("disconnect indication ignored in state {:?}", other);
            }
        }
    }

    /// Picks the landing state after any drop: with autoreconnect enabled and
    /// a profile still active the machine parks in `Disconnected` and posts
    /// itself a reconnect; otherwise it goes back to `Idle`.
    fn settle_after_drop(&mut self, out: &mut Vec<Action>) {
        if self.autoreconnect && self.profiles.active().is_some() {
            self.state = ConnState::Disconnected;
            out.push(Action::Enqueue(Envelope::new(EventId::AppReconnect)));
        } else {
            self.state = ConnState::Idle;
        }
    }

    fn on_ip_update(&mut self, info: IpInfoMsg, out: &mut Vec<Action>) {
        match self.state {
            ConnState::ConnectedNoIp => {
                self.state = ConnState::ConnectedIp;
                self.ip_info = Some(info);
                out.push(Action::NotifyIpAcquired(info));
            }
            ConnState::ConnectedIp => {
                // Lease refresh: keep the record current, no renotification.
                self.ip_info = Some(info);
            }
            other => {
                debug!("ip update ignored in state {:?}", other);
            }
        }
    }

    fn on_scan_request(&mut self, out: &mut Vec<Action>) {
        if self.pending.contains(PendingTask::SCAN) {
            debug!("scan already in flight");
            return;
        }
        self.pending.set(PendingTask::SCAN);
        out.push(Action::RadioScan);
        out.push(Action::ArmScanTimer);
    }

    /// Completion arbitration: firmware done and session timeout race through
    /// the same event, first one wins, the other is a no-op.
    fn on_scan_done(&mut self, out: &mut Vec<Action>) {
        if !self.pending.contains(PendingTask::SCAN) {
            return;
        }
        self.pending.clear(PendingTask::SCAN);
        out.push(Action::CancelScanTimer);
        out.push(Action::NotifyScanComplete);
    }

    fn record_ind(&mut self, ind_type: IndType, ind: &ConnectIndMsg) {
        let psk = self
            .profiles
            .active()
            .map(|p| p.msg.psk.clone())
            .unwrap_or_default();
        self.connect_ind = ConnectIndInfo {
            ind: ind_type,
            status_code: ind.status_code,
            ssid: ind.ssid.clone(),
            psk,
            bssid: ind.bssid,
            chan_freq: ind.chan_freq,
            chan_band: ind.chan_band,
        };
    }
}
