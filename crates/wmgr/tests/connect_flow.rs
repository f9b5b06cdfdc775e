//! End-to-end station flows through the public API, driven synchronously
//! with `poll_once` so every assertion observes a settled machine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use osal::{HostBackend, Osal, Wait, ADAPTER_VERSION};
use parking_lot::Mutex;
use wmgr::{
    AppCallbacks, ConnState, ConnectIndMsg, IpInfoMsg, MgmrConfig, MgmrError, NetStack,
    ProfileMsg, Radio, WifiMgmr, WlanMode,
};

#[derive(Default)]
struct RecordingRadio {
    connects: Mutex<Vec<ProfileMsg>>,
    disconnects: AtomicU32,
    scans: AtomicU32,
}

impl Radio for RecordingRadio {
    fn connect(&self, profile: &ProfileMsg) {
        self.connects.lock().push(profile.clone());
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn scan(&self) {
        self.scans.fetch_add(1, Ordering::SeqCst);
    }

    fn ap_start(&self, _ap: &wmgr::ApMsg) {}

    fn ap_stop(&self) {}
}

#[derive(Default)]
struct RecordingNet {
    ips: Mutex<Vec<IpInfoMsg>>,
    link_downs: AtomicU32,
}

impl NetStack for RecordingNet {
    fn ip_acquired(&self, info: &IpInfoMsg) {
        self.ips.lock().push(*info);
    }

    fn link_down(&self) {
        self.link_downs.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingApp {
    transitions: Mutex<Vec<(ConnState, ConnState)>>,
}

impl AppCallbacks for RecordingApp {
    fn state_changed(&self, old: ConnState, new: ConnState) {
        self.transitions.lock().push((old, new));
    }
}

struct Rig {
    mgmr: WifiMgmr,
    radio: Arc<RecordingRadio>,
    net: Arc<RecordingNet>,
    app: Arc<RecordingApp>,
}

impl Rig {
    fn new() -> Self {
        let osal = Osal::install(ADAPTER_VERSION, Arc::new(HostBackend::new())).unwrap();
        let radio = Arc::new(RecordingRadio::default());
        let net = Arc::new(RecordingNet::default());
        let app = Arc::new(RecordingApp::default());
        // Long timeouts keep the timers out of these synchronous tests.
        let config = MgmrConfig::new()
            .connect_timeout_ms(60_000)
            .scan_timeout_ms(60_000);
        let mgmr = WifiMgmr::new(
            osal,
            config,
            radio.clone(),
            net.clone(),
            app.clone(),
        )
        .unwrap();
        Self {
            mgmr,
            radio,
            net,
            app,
        }
    }

    fn drain(&self) {
        while matches!(self.mgmr.poll_once(Wait::None), Ok(true)) {}
    }

    fn bring_up(&self) {
        self.mgmr.connect("home-net", "passphrase").unwrap();
        self.drain();
        self.mgmr.fw_ind_connected(ConnectIndMsg::success()).unwrap();
        self.drain();
        self.mgmr
            .ip_update(IpInfoMsg {
                ip: 0x0a00_0005,
                ..IpInfoMsg::default()
            })
            .unwrap();
        self.drain();
        assert_eq!(self.mgmr.state_get(), ConnState::ConnectedIp);
    }
}

#[test]
fn happy_path_reaches_connected_ip() {
    let rig = Rig::new();

    rig.mgmr.connect("home-net", "passphrase").unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Connecting);
    assert_eq!(rig.radio.connects.lock().len(), 1);

    rig.mgmr.fw_ind_connected(ConnectIndMsg::success()).unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::ConnectedNoIp);
    assert_eq!(rig.mgmr.status_code_get(), 0);

    rig.mgmr
        .ip_update(IpInfoMsg {
            ip: 0x0a00_0005,
            ..IpInfoMsg::default()
        })
        .unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::ConnectedIp);
    assert_eq!(rig.net.ips.lock().len(), 1);

    let transitions = rig.app.transitions.lock();
    assert_eq!(
        *transitions,
        vec![
            (ConnState::Idle, ConnState::Connecting),
            (ConnState::Connecting, ConnState::ConnectedNoIp),
            (ConnState::ConnectedNoIp, ConnState::ConnectedIp),
        ]
    );
}

#[test]
fn dhcp_renew_notifies_only_once() {
    let rig = Rig::new();
    rig.bring_up();
    rig.mgmr
        .ip_update(IpInfoMsg {
            ip: 0x0a00_0006,
            ..IpInfoMsg::default()
        })
        .unwrap();
    rig.drain();
    assert_eq!(rig.net.ips.lock().len(), 1);
    assert_eq!(rig.mgmr.ip_info_get().unwrap().ip, 0x0a00_0006);
}

#[test]
fn manual_disconnect_lands_idle_without_reconnect() {
    let rig = Rig::new();
    rig.bring_up();

    rig.mgmr.disconnect().unwrap();
    rig.drain();
    assert_eq!(rig.radio.disconnects.load(Ordering::SeqCst), 1);

    rig.mgmr.fw_ind_disconnect(ConnectIndMsg::failure(3)).unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Idle);
    assert_eq!(rig.net.link_downs.load(Ordering::SeqCst), 1);
    // No self-posted reconnect: one connect command total.
    assert_eq!(rig.radio.connects.lock().len(), 1);
}

#[test]
fn unexpected_drop_autoreconnects() {
    let rig = Rig::new();
    rig.bring_up();

    rig.mgmr.fw_ind_disconnect(ConnectIndMsg::failure(1)).unwrap();
    // First poll settles in Disconnected and self-posts the reconnect,
    // second poll re-enters Connecting.
    rig.mgmr.poll_once(Wait::None).unwrap();
    assert_eq!(rig.mgmr.state_get(), ConnState::Disconnected);
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Connecting);

    let connects = rig.radio.connects.lock();
    assert_eq!(connects.len(), 2);
    assert_eq!(connects[0].ssid, connects[1].ssid);
}

#[test]
fn manual_disconnect_does_not_poison_later_sessions() {
    let rig = Rig::new();
    rig.bring_up();
    rig.mgmr.disconnect().unwrap();
    rig.drain();
    rig.mgmr.fw_ind_disconnect(ConnectIndMsg::failure(3)).unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Idle);

    // Second session: an unexpected drop must autoreconnect again.
    rig.mgmr.connect("home-net", "passphrase").unwrap();
    rig.drain();
    rig.mgmr.fw_ind_connected(ConnectIndMsg::success()).unwrap();
    rig.drain();
    rig.mgmr.fw_ind_disconnect(ConnectIndMsg::failure(1)).unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Connecting);
    assert_eq!(rig.radio.connects.lock().len(), 3);
}

#[test]
fn firmware_status_code_is_reported_verbatim() {
    let rig = Rig::new();
    rig.mgmr.connect("home-net", "passphrase").unwrap();
    // Opting out after the connect command sticks for this session.
    rig.mgmr.autoreconnect_disable().unwrap();
    rig.drain();

    rig.mgmr.fw_ind_connected(ConnectIndMsg::failure(17)).unwrap();
    rig.drain();
    assert_eq!(rig.mgmr.state_get(), ConnState::Idle);
    assert_eq!(rig.mgmr.status_code_get(), 17);

    rig.mgmr.status_code_clean();
    assert_eq!(rig.mgmr.status_code_get(), 0);
}

#[test]
fn full_queue_rejects_firmware_posts_without_blocking() {
    let rig = Rig::new();
    // Nothing is polling; saturate the queue.
    while rig.mgmr.fw_channel_set(6).is_ok() {}
    assert!(matches!(rig.mgmr.fw_scan_done(), Err(MgmrError::QueueFull)));

    // Dropped scan sightings are silent and must not wedge anything.
    rig.mgmr.fw_scan_ind(wmgr::ScanIndMsg::default(), false);

    rig.drain();
    assert!(rig.mgmr.fw_scan_done().is_ok());
}

#[test]
fn interface_roles_are_distinct() {
    let rig = Rig::new();
    rig.mgmr.set_sta_mac([0x18, 0xb9, 0x05, 0x00, 0x00, 0x01]);
    rig.mgmr.set_ap_mac([0x18, 0xb9, 0x05, 0x00, 0x00, 0x02]);

    let sta = rig.mgmr.sta_interface_get();
    let ap = rig.mgmr.ap_interface_get();
    assert_eq!(sta.mode, WlanMode::Sta);
    assert_eq!(ap.mode, WlanMode::Ap);
    assert_ne!(sta.vif_index, ap.vif_index);
    assert_ne!(sta.mac, ap.mac);
    assert!(!sta.dhcp_started);

    rig.bring_up();
    assert!(rig.mgmr.sta_interface_get().dhcp_started);
}

#[test]
fn facade_validates_country_code_and_hostname() {
    let rig = Rig::new();
    assert_eq!(rig.mgmr.country_code_get(), "EU");
    rig.mgmr.set_country_code("us").unwrap();
    assert_eq!(rig.mgmr.country_code_get(), "US");
    assert!(rig.mgmr.set_country_code("USA").is_err());
    assert!(rig.mgmr.set_country_code("1A").is_err());

    rig.mgmr.set_hostname("bl602-node").unwrap();
    assert_eq!(rig.mgmr.hostname_get(), "bl602-node");
    assert!(rig.mgmr.set_hostname("").is_err());
}
