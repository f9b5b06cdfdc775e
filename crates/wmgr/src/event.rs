//! Event identities and the envelope that carries them.
//!
//! The numeric identities are part of the firmware interface and are split
//! into three classes by two boundary markers: application requests below
//! [`MAX_APP_MIN_FW`], firmware indications between the boundaries, and
//! global/broadcast indications above [`MAX_FW_MIN_GLB`]. New identities are
//! appended after the existing ones so the established numbering never moves.

use crate::wire::{
    ApMsg, CfgElementMsg, ConnectIndMsg, IpInfoMsg, ProfileMsg, ScanIndMsg, StaIndMsg,
};

/// Boundary between application requests and firmware indications.
pub const MAX_APP_MIN_FW: u32 = 14;
/// Boundary between firmware indications and global indications.
pub const MAX_FW_MIN_GLB: u32 = 23;

/// Every event the manager task consumes, with its interface-stable raw id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventId {
    // Application requests.
    AppIdle = 0,
    AppConnect = 1,
    AppSniffer = 2,
    AppConnected = 3,
    AppIpGot = 4,
    AppDisconnect = 5,
    AppReconnect = 6,
    AppPhyUp = 7,
    AppApStart = 8,
    AppApStop = 9,
    AppConfMaxSta = 10,
    AppRcConfig = 11,
    AppDenoise = 12,
    AppReloadTsen = 13,
    // Firmware indications.
    FwDisconnect = 15,
    FwPowersaving = 16,
    FwChannelSet = 17,
    FwScan = 18,
    FwIndDisconnect = 19,
    FwIndConnected = 20,
    FwDataRawSend = 21,
    FwCfgReq = 22,
    // Global indications.
    GlbScanIndBeacon = 24,
    GlbScanIndProbeResp = 25,
    GlbApIndStaNew = 26,
    GlbApIndStaDel = 27,
    GlbDisableAutoreconnect = 28,
    GlbEnableAutoreconnect = 29,
    GlbIpUpdate = 30,
    GlbScanDone = 31,
}

/// Which side of the interface an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    App,
    Fw,
    Glb,
}

impl EventId {
    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        use EventId::*;
        Some(match raw {
            0 => AppIdle,
            1 => AppConnect,
            2 => AppSniffer,
            3 => AppConnected,
            4 => AppIpGot,
            5 => AppDisconnect,
            6 => AppReconnect,
            7 => AppPhyUp,
            8 => AppApStart,
            9 => AppApStop,
            10 => AppConfMaxSta,
            11 => AppRcConfig,
            12 => AppDenoise,
            13 => AppReloadTsen,
            15 => FwDisconnect,
            16 => FwPowersaving,
            17 => FwChannelSet,
            18 => FwScan,
            19 => FwIndDisconnect,
            20 => FwIndConnected,
            21 => FwDataRawSend,
            22 => FwCfgReq,
            24 => GlbScanIndBeacon,
            25 => GlbScanIndProbeResp,
            26 => GlbApIndStaNew,
            27 => GlbApIndStaDel,
            28 => GlbDisableAutoreconnect,
            29 => GlbEnableAutoreconnect,
            30 => GlbIpUpdate,
            31 => GlbScanDone,
            _ => return None,
        })
    }

    pub fn class(self) -> EventClass {
        let raw = self.raw();
        if raw < MAX_APP_MIN_FW {
            EventClass::App
        } else if raw < MAX_FW_MIN_GLB {
            EventClass::Fw
        } else {
            EventClass::Glb
        }
    }
}

/// Typed payload variants. Each event id carries at most one of these; the
/// dispatcher ignores a payload that does not match the id rather than
/// failing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    None,
    Profile(ProfileMsg),
    Ap(ApMsg),
    IpInfo(IpInfoMsg),
    ScanInd(ScanIndMsg),
    StaInd(StaIndMsg),
    ConnectInd(ConnectIndMsg),
    Cfg(CfgElementMsg),
    StaIdx(u8),
    Value(u32),
    Raw(Vec<u8>),
}

/// One queued unit of work for the manager task.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: EventId,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            payload: Payload::None,
        }
    }

    pub fn with_payload(id: EventId, payload: Payload) -> Self {
        Self { id, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_ids_survive_round_trip() {
        for raw in 0..40 {
            if let Some(id) = EventId::from_raw(raw) {
                assert_eq!(id.raw(), raw);
            }
        }
    }

    #[test]
    fn boundary_values_are_not_events() {
        assert_eq!(EventId::from_raw(MAX_APP_MIN_FW), None);
        assert_eq!(EventId::from_raw(MAX_FW_MIN_GLB), None);
    }

    #[test]
    fn classes_follow_the_boundaries() {
        assert_eq!(EventId::AppConnect.class(), EventClass::App);
        assert_eq!(EventId::AppReloadTsen.class(), EventClass::App);
        assert_eq!(EventId::FwDisconnect.class(), EventClass::Fw);
        assert_eq!(EventId::FwCfgReq.class(), EventClass::Fw);
        assert_eq!(EventId::GlbScanIndBeacon.class(), EventClass::Glb);
        assert_eq!(EventId::GlbScanDone.class(), EventClass::Glb);
    }
}
