//! Persistent Storage Abstraction Traits
//!
//! Non-volatile storage for the credentials a host provisioned.

use crate::observer::Observer;
use crate::wifi::{RetryPolicy, Wifi};
use improv_proto::ErrorCode;
use log::*;

/// Trait for persistent credential storage
///
/// MCU-specific crates implement this trait using their storage backend
/// (NVS for ESP32, flash for Pico, etc.)
pub trait CredentialStore {
    /// Error type for storage operations
    type Error: std::fmt::Debug;

    /// Get WiFi credentials (SSID, password)
    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error>;

    /// Save WiFi credentials
    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Clear WiFi credentials
    fn clear_wifi_credentials(&mut self) -> Result<(), Self::Error>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for &mut S {
    type Error = S::Error;

    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error> {
        (**self).get_wifi_credentials()
    }

    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        (**self).set_wifi_credentials(ssid, password)
    }

    fn clear_wifi_credentials(&mut self) -> Result<(), Self::Error> {
        (**self).clear_wifi_credentials()
    }
}

/// Observer that saves credentials once the device has joined the network,
/// then forwards to `inner`
pub struct Persisting<S, O> {
    store: S,
    inner: O,
}

impl<S: CredentialStore, O: Observer> Persisting<S, O> {
    pub fn new(store: S, inner: O) -> Self {
        Self { store, inner }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<S: CredentialStore, O: Observer> Observer for Persisting<S, O> {
    fn on_error(&mut self, error: ErrorCode) {
        self.inner.on_error(error)
    }

    fn on_connected(&mut self, ssid: &str, password: &str) {
        match self.store.set_wifi_credentials(ssid, password) {
            Ok(()) => info!("Saved credentials for '{}'", ssid),
            Err(e) => error!("Failed to save credentials for '{}': {:?}", ssid, e),
        }
        self.inner.on_connected(ssid, password)
    }
}

/// Rejoin the stored network, typically at boot before the session starts.
///
/// Returns false when nothing is stored or the network cannot be joined.
pub fn reconnect_saved<W: Wifi, S: CredentialStore>(wifi: &mut W, store: &S, policy: &RetryPolicy) -> bool {
    let (ssid, password) = match store.get_wifi_credentials() {
        Ok(Some(creds)) => creds,
        Ok(None) => {
            info!("No stored WiFi credentials");
            return false;
        }
        Err(e) => {
            warn!("Failed to read stored credentials: {:?}", e);
            return false;
        }
    };

    info!("Rejoining '{}' (password len={})", ssid, password.len());
    wifi.connect_blocking(&ssid, &password, policy)
}


#[cfg(test)]
mod tests {
    use super::fake::MemoryStore;
    use super::*;
    use crate::observer::fake::Recorder;
    use crate::wifi::fake::FakeWifi;
    use std::time::Duration;

    #[test]
    fn persists_then_forwards() {
        let mut observer = Persisting::new(MemoryStore::default(), Recorder::default());
        observer.on_connected("home", "secret");
        observer.on_error(ErrorCode::UnableToConnect);

        assert_eq!(observer.store().creds, Some(("home".into(), "secret".into())));
        assert_eq!(observer.inner().connected.len(), 1);
        assert_eq!(observer.inner().errors, vec![ErrorCode::UnableToConnect]);
    }

    #[test]
    fn storage_failure_still_forwards() {
        let store = MemoryStore { read_only: true, ..Default::default() };
        let mut observer = Persisting::new(store, Recorder::default());
        observer.on_connected("home", "secret");
        assert!(observer.store().creds.is_none());
        assert_eq!(observer.inner().connected.len(), 1);
    }

    #[test]
    fn reconnect_uses_stored_network() {
        let policy = RetryPolicy { max_attempts: 3, delay: Duration::ZERO };
        let mut wifi = FakeWifi::with_network("home", "secret", 1);

        assert!(!reconnect_saved(&mut wifi, &MemoryStore::default(), &policy));

        let store = MemoryStore { creds: Some(("home".into(), "secret".into())), read_only: false };
        assert!(reconnect_saved(&mut wifi, &store, &policy));
        assert!(wifi.is_connected());
    }

    #[test]
    fn cleared_store_does_not_reconnect() {
        let policy = RetryPolicy { max_attempts: 3, delay: Duration::ZERO };
        let mut wifi = FakeWifi::with_network("home", "secret", 0);
        let mut store = MemoryStore { creds: Some(("home".into(), "secret".into())), read_only: false };

        store.clear_wifi_credentials().unwrap();
        assert!(!reconnect_saved(&mut wifi, &store, &policy));
        assert!(!wifi.is_connected());
    }
}
