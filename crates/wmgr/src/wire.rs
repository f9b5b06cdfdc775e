//! Fixed-layout interop encodings.
//!
//! These are the only formats crossing the firmware boundary: a packed
//! little-endian envelope header and the profile/AP/IP payload records. The
//! on-wire profile layout keeps the one-byte tail guard after each bounded
//! string field for compatibility with the firmware's terminator convention;
//! the decoded Rust types carry length-bounded buffers instead, so the guard
//! exists only on the wire.

use heapless::Vec;

use crate::error::{MgmrError, MgmrResult};
use crate::event::EventId;

/// Maximum SSID length in bytes.
pub const SSID_MAX: usize = 32;
/// Maximum pre-shared key (passphrase) length.
pub const PSK_MAX: usize = 64;
/// Maximum pairwise master key length.
pub const PMK_MAX: usize = 64;

pub type SsidBuf = Vec<u8, SSID_MAX>;
pub type PskBuf = Vec<u8, PSK_MAX>;
pub type PmkBuf = Vec<u8, PMK_MAX>;

/// Packed envelope header: event id and payload length, both `u32` LE.
pub const ENVELOPE_HEADER_LEN: usize = 8;

pub fn encode_envelope_header(id: EventId, payload_len: u32) -> [u8; ENVELOPE_HEADER_LEN] {
    let mut out = [0u8; ENVELOPE_HEADER_LEN];
    out[0..4].copy_from_slice(&id.raw().to_le_bytes());
    out[4..8].copy_from_slice(&payload_len.to_le_bytes());
    out
}

pub fn decode_envelope_header(buf: &[u8]) -> MgmrResult<(EventId, u32)> {
    if buf.len() < ENVELOPE_HEADER_LEN {
        return Err(MgmrError::InvalidArgument("envelope header too short"));
    }
    let raw = read_u32(buf, 0);
    let len = read_u32(buf, 4);
    let id = EventId::from_raw(raw).ok_or(MgmrError::InvalidArgument("unknown event id"))?;
    Ok((id, len))
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    let mut word = [0u8; 2];
    word.copy_from_slice(&buf[at..at + 2]);
    u16::from_le_bytes(word)
}

fn bounded_field<const N: usize>(
    buf: &[u8],
    at: usize,
    len: usize,
    what: &'static str,
) -> MgmrResult<Vec<u8, N>> {
    if len > N {
        return Err(MgmrError::InvalidArgument(what));
    }
    Vec::from_slice(&buf[at..at + len]).map_err(|_| MgmrError::InvalidArgument(what))
}

/// Connect-request record carried by the `AppConnect` event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileMsg {
    pub ssid: SsidBuf,
    pub psk: PskBuf,
    pub pmk: PmkBuf,
    pub mac: [u8; 6],
    pub band: u8,
    pub freq: u16,
}

impl ProfileMsg {
    /// Builds a record from text credentials, rejecting oversized fields.
    pub fn new(ssid: &str, psk: &str) -> MgmrResult<Self> {
        let ssid = SsidBuf::from_slice(ssid.as_bytes())
            .map_err(|_| MgmrError::InvalidArgument("ssid longer than 32 bytes"))?;
        let psk = PskBuf::from_slice(psk.as_bytes())
            .map_err(|_| MgmrError::InvalidArgument("psk longer than 64 bytes"))?;
        Ok(Self {
            ssid,
            psk,
            ..Self::default()
        })
    }

    pub fn with_bssid(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
    }

    pub fn with_band_freq(mut self, band: u8, freq: u16) -> Self {
        self.band = band;
        self.freq = freq;
        self
    }

    /// Packed length: three guarded string fields, their lengths, MAC, band
    /// and frequency.
    pub const ENCODED_LEN: usize =
        SSID_MAX + 1 + 4 + PSK_MAX + 1 + PMK_MAX + 1 + 4 + 4 + 6 + 1 + 2;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..self.ssid.len()].copy_from_slice(&self.ssid);
        // out[32] stays 0: ssid tail guard.
        out[33..37].copy_from_slice(&(self.ssid.len() as u32).to_le_bytes());
        out[37..37 + self.psk.len()].copy_from_slice(&self.psk);
        // out[101]: psk tail guard.
        out[102..102 + self.pmk.len()].copy_from_slice(&self.pmk);
        // out[166]: pmk tail guard.
        out[167..171].copy_from_slice(&(self.psk.len() as u32).to_le_bytes());
        out[171..175].copy_from_slice(&(self.pmk.len() as u32).to_le_bytes());
        out[175..181].copy_from_slice(&self.mac);
        out[181] = self.band;
        out[182..184].copy_from_slice(&self.freq.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> MgmrResult<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(MgmrError::InvalidArgument("profile record too short"));
        }
        let ssid_len = read_u32(buf, 33) as usize;
        let psk_len = read_u32(buf, 167) as usize;
        let pmk_len = read_u32(buf, 171) as usize;
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&buf[175..181]);
        Ok(Self {
            ssid: bounded_field(buf, 0, ssid_len, "ssid longer than 32 bytes")?,
            psk: bounded_field(buf, 37, psk_len, "psk longer than 64 bytes")?,
            pmk: bounded_field(buf, 102, pmk_len, "pmk longer than 64 bytes")?,
            mac,
            band: buf[181],
            freq: read_u16(buf, 182),
        })
    }
}

/// Soft-AP start record carried by the `AppApStart` event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApMsg {
    pub channel: i32,
    pub ssid: SsidBuf,
    pub hidden_ssid: bool,
    pub psk: PskBuf,
}

impl ApMsg {
    pub fn new(ssid: &str, psk: &str, channel: i32) -> MgmrResult<Self> {
        let ssid = SsidBuf::from_slice(ssid.as_bytes())
            .map_err(|_| MgmrError::InvalidArgument("ssid longer than 32 bytes"))?;
        let psk = PskBuf::from_slice(psk.as_bytes())
            .map_err(|_| MgmrError::InvalidArgument("psk longer than 64 bytes"))?;
        Ok(Self {
            channel,
            ssid,
            hidden_ssid: false,
            psk,
        })
    }

    pub const ENCODED_LEN: usize = 4 + SSID_MAX + 1 + 1 + 4 + PSK_MAX + 1 + 4;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..4].copy_from_slice(&self.channel.to_le_bytes());
        out[4..4 + self.ssid.len()].copy_from_slice(&self.ssid);
        // out[36]: ssid tail guard.
        out[37] = u8::from(self.hidden_ssid);
        out[38..42].copy_from_slice(&(self.ssid.len() as u32).to_le_bytes());
        out[42..42 + self.psk.len()].copy_from_slice(&self.psk);
        // out[106]: psk tail guard.
        out[107..111].copy_from_slice(&(self.psk.len() as u32).to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> MgmrResult<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(MgmrError::InvalidArgument("ap record too short"));
        }
        let ssid_len = read_u32(buf, 38) as usize;
        let psk_len = read_u32(buf, 107) as usize;
        Ok(Self {
            channel: read_u32(buf, 0) as i32,
            ssid: bounded_field(buf, 4, ssid_len, "ssid longer than 32 bytes")?,
            hidden_ssid: buf[37] != 0,
            psk: bounded_field(buf, 42, psk_len, "psk longer than 64 bytes")?,
        })
    }
}

/// Address bundle delivered with the "IP acquired" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IpInfoMsg {
    pub ip: u32,
    pub mask: u32,
    pub gw: u32,
    pub dns1: u32,
    pub dns2: u32,
}

impl IpInfoMsg {
    pub const ENCODED_LEN: usize = 20;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        for (slot, word) in out
            .chunks_exact_mut(4)
            .zip([self.ip, self.mask, self.gw, self.dns1, self.dns2])
        {
            slot.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn decode(buf: &[u8]) -> MgmrResult<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(MgmrError::InvalidArgument("ip record too short"));
        }
        Ok(Self {
            ip: read_u32(buf, 0),
            mask: read_u32(buf, 4),
            gw: read_u32(buf, 8),
            dns1: read_u32(buf, 12),
            dns2: read_u32(buf, 16),
        })
    }
}

impl core::fmt::Display for IpInfoMsg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [a, b, c, d] = self.ip.to_be_bytes();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/// Scan result carried by the `GlbScanIndBeacon`/`GlbScanIndProbeResp`
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanIndMsg {
    pub bssid: [u8; 6],
    pub ssid: SsidBuf,
    pub channel: u8,
    pub rssi: i8,
    pub auth: u8,
    pub cipher: u8,
    pub ppm_abs: i8,
    pub ppm_rel: i8,
}

/// Station join record carried by the `GlbApIndStaNew` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaIndMsg {
    pub sta_idx: u8,
    pub mac: [u8; 6],
    pub rssi: i32,
    pub tsf_hi: u32,
    pub tsf_lo: u32,
    pub data_rate: u8,
}

/// Firmware configuration element request carried by `FwCfgReq`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CfgElementMsg {
    pub ops: u32,
    pub task: u32,
    pub element: u32,
    pub kind: u32,
    pub buf: std::vec::Vec<u32>,
}

/// Connect/disconnect indication record from the firmware.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectIndMsg {
    pub status_code: u16,
    pub chan_freq: u16,
    pub chan_band: u8,
    pub ssid: SsidBuf,
    pub bssid: [u8; 6],
}

impl ConnectIndMsg {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }
}
