//! Scan result table and connected-station list.
//!
//! Both are fixed-capacity stores owned by the manager task. Timestamps are
//! 32-bit millisecond ticks compared with `wrapping_sub`, so staleness stays
//! correct across the ~49.7 day tick wraparound as long as no entry sits
//! untouched for longer than half the wrap period; with a 15 s timeout that
//! margin is enormous.

use heapless::Vec;

use crate::wire::{ScanIndMsg, SsidBuf, StaIndMsg};

/// Scan table capacity.
pub const SCAN_ITEMS_MAX: usize = 50;
/// Age at which an entry stops being reported.
pub const SCAN_ITEM_TIMEOUT_MS: u32 = 15_000;
/// Connected-station list capacity in soft-AP mode.
pub const AP_STA_MAX: usize = 8;

/// Authentication mode advertised by a beacon or probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Auth {
    #[default]
    Unknown,
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    WpaEnterprise,
    Wpa3Sae,
    Wpa2PskWpa3Sae,
}

impl Auth {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Wep,
            2 => Self::WpaPsk,
            3 => Self::Wpa2Psk,
            4 => Self::WpaWpa2Psk,
            5 => Self::WpaEnterprise,
            6 => Self::Wpa3Sae,
            7 => Self::Wpa2PskWpa3Sae,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Wep => "WEP",
            Self::WpaPsk => "WPA-PSK",
            Self::Wpa2Psk => "WPA2-PSK",
            Self::WpaWpa2Psk => "WPA2-PSK/WPA-PSK",
            Self::WpaEnterprise => "WPA-ENT",
            Self::Wpa3Sae => "WPA3-SAE",
            Self::Wpa2PskWpa3Sae => "WPA2-PSK/WPA3-SAE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Pairwise cipher, kept as the raw firmware code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cipher(pub u8);

impl Cipher {
    pub fn as_str(self) -> &'static str {
        match self.0 {
            0 => "NONE",
            1 => "WEP",
            2 => "TKIP",
            3 => "AES",
            4 => "TKIP/AES",
            _ => "UNKNOWN",
        }
    }
}

/// One access point observed by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    pub bssid: [u8; 6],
    pub ssid: SsidBuf,
    pub channel: u8,
    pub rssi: i8,
    pub auth: Auth,
    pub cipher: Cipher,
    /// Absolute and relative frequency offsets reported with the sighting.
    pub ppm_abs: i8,
    pub ppm_rel: i8,
    /// Last-seen tick, for staleness filtering and eviction.
    pub seen_at: u32,
}

impl ScanItem {
    fn age(&self, now: u32) -> u32 {
        now.wrapping_sub(self.seen_at)
    }

    fn is_fresh(&self, now: u32, timeout_ms: u32) -> bool {
        self.age(now) < timeout_ms
    }
}

pub struct ScanTable {
    slots: [Option<ScanItem>; SCAN_ITEMS_MAX],
    timeout_ms: u32,
    save_hidden_ssid: bool,
}

impl ScanTable {
    pub fn new(timeout_ms: u32, save_hidden_ssid: bool) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            timeout_ms,
            save_hidden_ssid,
        }
    }

    /// Folds a scan indication into the table.
    ///
    /// The same BSSID refreshes in place (last sighting wins). A new BSSID
    /// takes a free slot, or with none free, evicts the stalest entry, with
    /// weakest signal breaking ties. Hidden networks are skipped unless
    /// opted in.
    pub fn upsert(&mut self, ind: &ScanIndMsg, now: u32) {
        if ind.ssid.is_empty() && !self.save_hidden_ssid {
            return;
        }
        let item = ScanItem {
            bssid: ind.bssid,
            ssid: ind.ssid.clone(),
            channel: ind.channel,
            rssi: ind.rssi,
            auth: Auth::from_raw(ind.auth),
            cipher: Cipher(ind.cipher),
            ppm_abs: ind.ppm_abs,
            ppm_rel: ind.ppm_rel,
            seen_at: now,
        };
        if let Some(slot) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|it| it.bssid == ind.bssid)
        {
            *slot = item;
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(item);
            return;
        }
        if let Some(slot) = self.slots.iter_mut().min_by(|a, b| {
            let (a, b) = (a.as_ref(), b.as_ref());
            // Victim sorts first: largest age, then weakest rssi.
            let age = |it: &ScanItem| it.age(now);
            match (a, b) {
                (Some(a), Some(b)) => age(b).cmp(&age(a)).then(a.rssi.cmp(&b.rssi)),
                _ => core::cmp::Ordering::Equal,
            }
        }) {
            *slot = Some(item);
        }
    }

    /// Fresh entries, in slot order.
    pub fn snapshot(&self, now: u32) -> std::vec::Vec<ScanItem> {
        self.slots
            .iter()
            .flatten()
            .filter(|it| it.is_fresh(now, self.timeout_ms))
            .cloned()
            .collect()
    }

    pub fn reset(&mut self) {
        self.slots = core::array::from_fn(|_| None);
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A station associated to the local soft AP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaInfo {
    pub sta_idx: u8,
    pub mac: [u8; 6],
    pub rssi: i32,
    pub tsf_hi: u32,
    pub tsf_lo: u32,
    pub data_rate: u8,
}

impl From<&StaIndMsg> for StaInfo {
    fn from(ind: &StaIndMsg) -> Self {
        Self {
            sta_idx: ind.sta_idx,
            mac: ind.mac,
            rssi: ind.rssi,
            tsf_hi: ind.tsf_hi,
            tsf_lo: ind.tsf_lo,
            data_rate: ind.data_rate,
        }
    }
}

#[derive(Debug, Default)]
pub struct StaList {
    entries: Vec<StaInfo, AP_STA_MAX>,
}

impl StaList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a join; a duplicate index updates in place, and a full list
    /// drops the record.
    pub fn add(&mut self, info: StaInfo) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.sta_idx == info.sta_idx) {
            *existing = info;
            return true;
        }
        self.entries.push(info).is_ok()
    }

    pub fn delete(&mut self, sta_idx: u8) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.sta_idx != sta_idx);
        self.entries.len() != before
    }

    pub fn get(&self, sta_idx: u8) -> Option<&StaInfo> {
        self.entries.iter().find(|e| e.sta_idx == sta_idx)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> std::vec::Vec<StaInfo> {
        self.entries.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
