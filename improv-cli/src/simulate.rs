//! Simulated device: serves the Improv session over TCP so the host
//! commands can be exercised without hardware.

use improv_mcu::{
    ChipFamily, CredentialStore, DeviceInfo, ErrorCode, FnObserver, IpInfo, Persisting, ScanResult, Session,
    SessionConfig, ThreadedTransport, Wifi, WifiStatus, reconnect_saved,
};
use log::*;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;
use std::time::Duration;

const IDLE: Duration = Duration::from_millis(5);

/// Everything about the simulated device, loadable from JSON
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub device: DeviceInfo,
    pub session: SessionConfig,
    pub networks: Vec<SimNetwork>,
    /// Address the device gets once joined
    pub address: Ipv4Addr,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            device: DeviceInfo {
                firmware_name: "improv-sim".to_string(),
                firmware_version: env!("CARGO_PKG_VERSION").to_string(),
                chip_family: ChipFamily::Esp32,
                device_name: "Simulated device".to_string(),
                device_url: None,
            },
            session: SessionConfig::default(),
            networks: Vec::new(),
            address: Ipv4Addr::new(192, 168, 4, 2),
        }
    }
}

impl Scenario {
    pub fn load(path: &str) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimNetwork {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_rssi")]
    pub rssi: i8,
}

fn default_rssi() -> i8 {
    -60
}

/// Radio that joins any scenario network given its password
pub struct SimWifi {
    networks: Vec<SimNetwork>,
    address: Ipv4Addr,
    joined: Option<String>,
    failed: bool,
}

impl SimWifi {
    pub fn new(networks: Vec<SimNetwork>, address: Ipv4Addr) -> Self {
        Self { networks, address, joined: None, failed: false }
    }
}

impl Wifi for SimWifi {
    type Error = Infallible;

    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error> {
        Ok(self
            .networks
            .iter()
            .map(|n| ScanResult {
                ssid: n.ssid.clone(),
                channel: 6,
                rssi: n.rssi,
                auth_required: !n.password.is_empty(),
            })
            .collect())
    }

    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        let known = self.networks.iter().any(|n| n.ssid == ssid && n.password == password);
        self.joined = known.then(|| ssid.to_string());
        self.failed = !known;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.joined = None;
        self.failed = false;
        Ok(())
    }

    fn status(&self) -> WifiStatus {
        match (&self.joined, self.failed) {
            (Some(_), _) => WifiStatus::Connected,
            (None, true) => WifiStatus::Failed,
            (None, false) => WifiStatus::Disconnected,
        }
    }

    fn ip_info(&self) -> Option<IpInfo> {
        let ip = self.address.octets();
        self.joined.as_ref().map(|_| IpInfo {
            ip,
            gateway: [ip[0], ip[1], ip[2], 1],
            netmask: [255, 255, 255, 0],
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    ssid: String,
    password: String,
}

/// Credentials kept in a JSON file. Without a path nothing is persisted.
pub struct FileStore {
    path: Option<PathBuf>,
}

impl FileStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileStore {
    type Error = io::Error;

    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let stored: StoredCredentials = serde_json::from_str(&content)?;
        Ok(Some((stored.ssid, stored.password)))
    }

    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let stored = StoredCredentials { ssid: ssid.to_string(), password: password.to_string() };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)
    }

    fn clear_wifi_credentials(&mut self) -> Result<(), Self::Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Serve hosts one at a time until the listener fails. Radio and stored
/// credentials carry over between connections. `reset` forgets stored
/// credentials first.
pub fn run(listen: &str, scenario: Scenario, store: Option<PathBuf>, reset: bool) -> io::Result<()> {
    let listener = TcpListener::bind(listen)?;
    println!("Simulated device listening on {}", listener.local_addr()?);
    serve(listener, scenario, FileStore::new(store), reset)
}

fn serve(listener: TcpListener, scenario: Scenario, mut store: FileStore, reset: bool) -> io::Result<()> {
    let mut wifi = SimWifi::new(scenario.networks.clone(), scenario.address);
    if reset {
        store.clear_wifi_credentials()?;
        info!("Cleared stored credentials");
    }
    if reconnect_saved(&mut wifi, &store, &scenario.session.retry_policy()) {
        info!("Rejoined saved network, address {}", wifi.local_address());
    }

    for stream in listener.incoming() {
        let stream = stream?;
        info!("Host connected from {}", stream.peer_addr()?);
        stream.set_nodelay(true)?;

        let transport = ThreadedTransport::spawn(stream.try_clone()?, stream)?;
        let observer = Persisting::new(
            &mut store,
            FnObserver::new(
                |error: ErrorCode| warn!("Reported to host: {}", error),
                |ssid: &str, _password: &str| info!("Provisioned onto '{}'", ssid),
            ),
        );
        let mut session = Session::new(transport, &mut wifi, observer, scenario.device.clone(), &scenario.session);

        match session.run(IDLE) {
            Err(improv_mcu::Error::Transport(e)) if is_disconnect(&e) => {
                info!("Host disconnected in state {}", session.state())
            }
            Err(improv_mcu::Error::Transport(e)) => return Err(e),
            Err(improv_mcu::Error::Encode(e)) => return Err(io::Error::other(e)),
            Ok(()) => {}
        }
    }
    Ok(())
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}
