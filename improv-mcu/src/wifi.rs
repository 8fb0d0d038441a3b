//! WiFi Abstraction Traits
//!
//! Traits for WiFi operations that MCU-specific crates implement.

use log::*;
use std::time::Duration;

/// WiFi network scan result
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub ssid: String,
    pub channel: u8,
    pub rssi: i8,
    pub auth_required: bool,
}

/// WiFi connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// IP address info
#[derive(Debug, Clone)]
pub struct IpInfo {
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub netmask: [u8; 4],
}

impl IpInfo {
    pub fn ip_str(&self) -> String {
        format!("{}.{}.{}.{}", self.ip[0], self.ip[1], self.ip[2], self.ip[3])
    }
}

/// How long a blocking connect keeps polling the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_millis(500),
        }
    }
}

/// Trait for WiFi operations
///
/// MCU-specific crates implement this trait using their WiFi stack.
pub trait Wifi {
    /// Error type for WiFi operations
    type Error: std::fmt::Debug;

    /// Scan for available networks
    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error>;

    /// Start joining a WiFi network; completion is observed through [`Wifi::status`]
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Disconnect from WiFi
    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Get current connection status
    fn status(&self) -> WifiStatus;

    /// Get IP info (if connected)
    fn ip_info(&self) -> Option<IpInfo>;

    /// Check if connected
    fn is_connected(&self) -> bool {
        self.status() == WifiStatus::Connected
    }

    /// Address the device is reachable at, as dotted quad
    fn local_address(&self) -> String {
        self.ip_info()
            .map(|info| info.ip_str())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    /// Join a network and wait for the link, polling `status` at most
    /// `policy.max_attempts` times. Gives up with a disconnect.
    fn connect_blocking(&mut self, ssid: &str, password: &str, policy: &RetryPolicy) -> bool {
        if let Err(e) = self.connect(ssid, password) {
            warn!("WiFi connect to '{}' failed to start: {:?}", ssid, e);
            return false;
        }

        for attempt in 1..=policy.max_attempts {
            if self.is_connected() {
                return true;
            }
            debug!("Waiting for '{}' ({}/{})", ssid, attempt, policy.max_attempts);
            std::thread::sleep(policy.delay);
        }
        if self.is_connected() {
            return true;
        }

        if let Err(e) = self.disconnect() {
            warn!("WiFi disconnect failed: {:?}", e);
        }
        false
    }
}

impl<W: Wifi + ?Sized> Wifi for &mut W {
    type Error = W::Error;

    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error> {
        (**self).scan()
    }

    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        (**self).connect(ssid, password)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        (**self).disconnect()
    }

    fn status(&self) -> WifiStatus {
        (**self).status()
    }

    fn ip_info(&self) -> Option<IpInfo> {
        (**self).ip_info()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn local_address(&self) -> String {
        (**self).local_address()
    }

    fn connect_blocking(&mut self, ssid: &str, password: &str, policy: &RetryPolicy) -> bool {
        (**self).connect_blocking(ssid, password, policy)
    }
}
