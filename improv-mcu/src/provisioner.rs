//! Provisioning state machine
//!
//! Interprets decoded RPC commands, drives the radio and writes the
//! resulting state, error and response frames. Every command runs to
//! completion before the next one is looked at.

use crate::config::SessionConfig;
use crate::device::DeviceInfo;
use crate::error::Error;
use crate::observer::Observer;
use crate::transport::Transport;
use crate::wifi::{RetryPolicy, Wifi};
use improv_proto::{ErrorCode, RpcCommand, State, commands, encode_error, encode_rpc_response, encode_state};
use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    /// Command id not recognised, UNKNOWN_RPC was reported
    Rejected,
}

pub struct Provisioner<W, O> {
    wifi: W,
    observer: O,
    device: DeviceInfo,
    state: State,
    retry: RetryPolicy,
    response_checksum: bool,
}

impl<W: Wifi, O: Observer> Provisioner<W, O> {
    pub fn new(wifi: W, observer: O, device: DeviceInfo, config: &SessionConfig) -> Self {
        Self {
            wifi,
            observer,
            device,
            state: State::Authorized,
            retry: config.retry_policy(),
            response_checksum: config.rpc_response_checksum,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn handle<T: Transport + ?Sized>(&mut self, command: RpcCommand, tx: &mut T) -> Result<Outcome, Error> {
        debug!("Handling {:?} in state {}", command, self.state);
        match command {
            RpcCommand::GetCurrentState => {
                if self.wifi.is_connected() {
                    self.set_state(State::Provisioned, tx)?;
                    self.send_device_url(commands::GET_CURRENT_STATE, tx)?;
                } else {
                    self.set_state(State::Authorized, tx)?;
                }
            }
            RpcCommand::WifiSettings { ssid, password } => {
                if ssid.is_empty() {
                    self.report_error(ErrorCode::InvalidRpc, tx)?;
                } else {
                    self.provision(&ssid, &password, tx)?;
                }
            }
            RpcCommand::GetDeviceInfo => {
                let fields = self.device.info_fields();
                self.send_response(commands::GET_DEVICE_INFO, &fields, tx)?;
            }
            RpcCommand::GetWifiNetworks => self.send_networks(tx)?,
            RpcCommand::Unknown(id) => {
                warn!("Unknown RPC command 0x{:02x}", id);
                self.report_error(ErrorCode::UnknownRpc, tx)?;
                return Ok(Outcome::Rejected);
            }
        }
        Ok(Outcome::Handled)
    }

    /// Send ERROR_STATE and tell the observer
    pub fn report_error<T: Transport + ?Sized>(&mut self, error: ErrorCode, tx: &mut T) -> Result<(), Error> {
        self.set_error(error, tx)?;
        self.observer.on_error(error);
        Ok(())
    }

    fn provision<T: Transport + ?Sized>(&mut self, ssid: &str, password: &str, tx: &mut T) -> Result<(), Error> {
        info!("Connecting to '{}' (password len={})", ssid, password.len());
        self.set_state(State::Provisioning, tx)?;

        if self.wifi.connect_blocking(ssid, password, &self.retry) {
            info!("Connected to '{}', IP {}", ssid, self.wifi.local_address());
            self.set_error(ErrorCode::None, tx)?;
            self.set_state(State::Provisioned, tx)?;
            self.send_device_url(commands::WIFI_SETTINGS, tx)?;
            self.observer.on_connected(ssid, password);
        } else {
            error!(
                "Unable to connect to '{}' after {} attempts",
                ssid, self.retry.max_attempts
            );
            self.set_state(State::Stopped, tx)?;
            self.report_error(ErrorCode::UnableToConnect, tx)?;
        }
        Ok(())
    }

    fn send_networks<T: Transport + ?Sized>(&mut self, tx: &mut T) -> Result<(), Error> {
        let networks = match self.wifi.scan() {
            Ok(networks) => networks,
            Err(e) => {
                warn!("WiFi scan failed: {:?}", e);
                Vec::new()
            }
        };
        debug!("Reporting {} networks", networks.len());

        for network in &networks {
            let rssi = network.rssi.to_string();
            let auth = if network.auth_required { "YES" } else { "NO" };
            self.send_response(
                commands::GET_WIFI_NETWORKS,
                &[network.ssid.as_str(), rssi.as_str(), auth],
                tx,
            )?;
        }
        // an empty response ends the list
        self.send_response::<&str, T>(commands::GET_WIFI_NETWORKS, &[], tx)
    }

    fn send_device_url<T: Transport + ?Sized>(&self, command: u8, tx: &mut T) -> Result<(), Error> {
        let url = self.device.url_for(&self.wifi.local_address());
        debug!("Device URL: {}", url);
        self.send_response(command, &[url], tx)
    }

    fn send_response<S: AsRef<str>, T: Transport + ?Sized>(
        &self,
        command: u8,
        fields: &[S],
        tx: &mut T,
    ) -> Result<(), Error> {
        let frame = encode_rpc_response(command, fields, self.response_checksum)?;
        tx.write(&frame)?;
        Ok(())
    }

    fn set_state<T: Transport + ?Sized>(&mut self, state: State, tx: &mut T) -> Result<(), Error> {
        if state != self.state {
            info!("State {} -> {}", self.state, state);
            self.state = state;
        }
        tx.write(&encode_state(state))?;
        Ok(())
    }

    fn set_error<T: Transport + ?Sized>(&mut self, error: ErrorCode, tx: &mut T) -> Result<(), Error> {
        if error != ErrorCode::None {
            debug!("Reporting error: {}", error);
        }
        tx.write(&encode_error(error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ChipFamily;
    use crate::observer::fake::Recorder;
    use crate::transport::fake::{FakeTransport, Sent};
    use crate::wifi::ScanResult;
    use crate::wifi::fake::FakeWifi;
    use improv_proto::{Frame, decode_rpc_response};

    fn device() -> DeviceInfo {
        DeviceInfo {
            firmware_name: "lamp".into(),
            firmware_version: "1.2.0".into(),
            chip_family: ChipFamily::Esp32,
            device_name: "Hall lamp".into(),
            device_url: None,
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            max_connect_attempts: 3,
            connect_retry_delay_ms: 0,
            ..Default::default()
        }
    }

    fn provisioner(wifi: FakeWifi) -> Provisioner<FakeWifi, Recorder> {
        Provisioner::new(wifi, Recorder::default(), device(), &config())
    }

    fn wifi_settings(ssid: &str, password: &str) -> RpcCommand {
        RpcCommand::WifiSettings { ssid: ssid.into(), password: password.into() }
    }

    fn url() -> Vec<String> {
        vec!["http://192.168.4.7".to_string()]
    }

    #[test]
    fn current_state_while_disconnected() {
        let mut p = provisioner(FakeWifi::default());
        let mut tx = FakeTransport::default();

        assert_eq!(p.handle(RpcCommand::GetCurrentState, &mut tx).unwrap(), Outcome::Handled);
        assert_eq!(p.state(), State::Authorized);
        assert_eq!(tx.sent(), vec![Sent::State(State::Authorized)]);
    }

    #[test]
    fn current_state_while_connected() {
        let mut p = provisioner(FakeWifi::connected("home"));
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetCurrentState, &mut tx).unwrap();
        assert_eq!(p.state(), State::Provisioned);
        assert_eq!(
            tx.sent(),
            vec![
                Sent::State(State::Provisioned),
                Sent::Response(commands::GET_CURRENT_STATE, url()),
            ]
        );
    }

    #[test]
    fn empty_ssid_is_invalid() {
        let mut p = provisioner(FakeWifi::default());
        let mut tx = FakeTransport::default();

        assert_eq!(p.handle(wifi_settings("", "secret"), &mut tx).unwrap(), Outcome::Handled);
        assert_eq!(p.state(), State::Authorized);
        assert_eq!(tx.sent(), vec![Sent::Error(ErrorCode::InvalidRpc)]);
        assert_eq!(p.observer().errors, vec![ErrorCode::InvalidRpc]);
    }

    #[test]
    fn provisioning_succeeds() {
        let mut p = provisioner(FakeWifi::with_network("home", "secret", 1));
        let mut tx = FakeTransport::default();

        p.handle(wifi_settings("home", "secret"), &mut tx).unwrap();
        assert_eq!(p.state(), State::Provisioned);
        assert_eq!(
            tx.sent(),
            vec![
                Sent::State(State::Provisioning),
                Sent::Error(ErrorCode::None),
                Sent::State(State::Provisioned),
                Sent::Response(commands::WIFI_SETTINGS, url()),
            ]
        );
        assert_eq!(p.observer().connected, vec![("home".to_string(), "secret".to_string())]);
        assert!(p.observer().errors.is_empty());
    }

    #[test]
    fn provisioning_fails_then_recovers() {
        let mut p = provisioner(FakeWifi::with_network("home", "secret", 0));
        let mut tx = FakeTransport::default();

        p.handle(wifi_settings("home", "wrong"), &mut tx).unwrap();
        assert_eq!(p.state(), State::Stopped);
        assert_eq!(
            tx.sent(),
            vec![
                Sent::State(State::Provisioning),
                Sent::State(State::Stopped),
                Sent::Error(ErrorCode::UnableToConnect),
            ]
        );
        assert_eq!(p.observer().errors, vec![ErrorCode::UnableToConnect]);
        assert!(p.observer().connected.is_empty());
        assert_eq!(p.wifi().disconnects, 1);

        // stopped is not terminal for later commands
        let mut tx = FakeTransport::default();
        p.handle(RpcCommand::GetCurrentState, &mut tx).unwrap();
        assert_eq!(p.state(), State::Authorized);

        let mut tx = FakeTransport::default();
        p.handle(wifi_settings("home", "secret"), &mut tx).unwrap();
        assert_eq!(p.state(), State::Provisioned);
    }

    #[test]
    fn url_template_is_filled_in() {
        let mut device = device();
        device.device_url = Some("http://{LOCAL_IPV4}:8080/setup".into());
        let mut p = Provisioner::new(FakeWifi::connected("home"), Recorder::default(), device, &config());
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetCurrentState, &mut tx).unwrap();
        assert_eq!(
            tx.sent()[1],
            Sent::Response(commands::GET_CURRENT_STATE, vec!["http://192.168.4.7:8080/setup".into()])
        );
    }

    #[test]
    fn device_info_fields() {
        let mut p = provisioner(FakeWifi::default());
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetDeviceInfo, &mut tx).unwrap();
        assert_eq!(p.state(), State::Authorized);
        assert_eq!(
            tx.sent(),
            vec![Sent::Response(
                commands::GET_DEVICE_INFO,
                vec!["lamp".into(), "1.2.0".into(), "ESP32".into(), "Hall lamp".into()]
            )]
        );
    }

    #[test]
    fn networks_in_scan_order_then_terminator() {
        let mut wifi = FakeWifi::default();
        wifi.visible = vec![
            ScanResult { ssid: "home".into(), channel: 6, rssi: -40, auth_required: true },
            ScanResult { ssid: "cafe".into(), channel: 11, rssi: -71, auth_required: false },
        ];
        let mut p = provisioner(wifi);
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetWifiNetworks, &mut tx).unwrap();
        let id = commands::GET_WIFI_NETWORKS;
        assert_eq!(
            tx.sent(),
            vec![
                Sent::Response(id, vec!["home".into(), "-40".into(), "YES".into()]),
                Sent::Response(id, vec!["cafe".into(), "-71".into(), "NO".into()]),
                Sent::Response(id, vec![]),
            ]
        );
    }

    #[test]
    fn failed_scan_reports_empty_list() {
        let mut wifi = FakeWifi::default();
        wifi.scan_fails = true;
        let mut p = provisioner(wifi);
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetWifiNetworks, &mut tx).unwrap();
        assert_eq!(tx.sent(), vec![Sent::Response(commands::GET_WIFI_NETWORKS, vec![])]);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut p = provisioner(FakeWifi::default());
        let mut tx = FakeTransport::default();

        assert_eq!(p.handle(RpcCommand::Unknown(0x42), &mut tx).unwrap(), Outcome::Rejected);
        assert_eq!(p.state(), State::Authorized);
        assert_eq!(tx.sent(), vec![Sent::Error(ErrorCode::UnknownRpc)]);
        assert_eq!(p.observer().errors, vec![ErrorCode::UnknownRpc]);
    }

    #[test]
    fn response_checksum_is_optional() {
        let config = SessionConfig { rpc_response_checksum: true, ..config() };
        let mut p = Provisioner::new(FakeWifi::default(), Recorder::default(), device(), &config);
        let mut tx = FakeTransport::default();

        p.handle(RpcCommand::GetWifiNetworks, &mut tx).unwrap();
        let frame = Frame::decode(&tx.output).unwrap();
        // command, total length, payload checksum
        assert_eq!(frame.payload(), &[0x04, 0x00, 0x04]);
        assert!(decode_rpc_response(frame.payload()).unwrap().fields.is_empty());
    }
}
