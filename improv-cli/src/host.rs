//! Host side of the protocol: send one RPC, interpret what comes back

use improv_proto::async_io::{read_frame, write_frame};
use improv_proto::{
    ErrorCode, Frame, FrameType, ProtoError, RpcCommand, RpcResponse, State, commands, decode_rpc_response,
    rpc_command_payload,
};
use log::*;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("link error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Proto(#[from] ProtoError),
    #[error("no reply from device within {0:?}")]
    Timeout(Duration),
    #[error("device reported: {0}")]
    Device(ErrorCode),
}

/// A frame from the device, decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    State(State),
    Error(ErrorCode),
    Response(RpcResponse),
}

/// One entry of a GET_WIFI_NETWORKS listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub ssid: String,
    pub rssi: i32,
    pub secured: bool,
}

impl Network {
    fn from_fields(fields: &[String]) -> Option<Self> {
        let [ssid, rssi, auth] = fields else {
            return None;
        };
        Some(Self {
            ssid: ssid.clone(),
            rssi: rssi.parse().ok()?,
            secured: auth == "YES",
        })
    }
}

pub struct Host<R, W> {
    reader: R,
    writer: W,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Host<R, W> {
    /// `timeout` bounds the wait for each frame, not a whole exchange
    pub fn new(reader: R, writer: W, timeout: Duration) -> Self {
        Self { reader, writer, timeout }
    }

    pub async fn send(&mut self, command: &RpcCommand) -> Result<(), HostError> {
        debug!("Sending {:?}", command);
        let frame = Frame::new(FrameType::RpcCommand, rpc_command_payload(command)?)?;
        write_frame(&mut self.writer, &frame).await?;
        Ok(())
    }

    /// Next state, error or response frame. Corrupt frames and echoed
    /// commands are skipped.
    pub async fn next_event(&mut self) -> Result<Event, HostError> {
        loop {
            let frame = match tokio::time::timeout(self.timeout, read_frame(&mut self.reader)).await {
                Err(_) => return Err(HostError::Timeout(self.timeout)),
                Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Skipping bad frame: {}", e);
                    continue;
                }
                Ok(frame) => frame?,
            };

            let event = match frame.frame_type() {
                FrameType::CurrentState => frame.as_state().map(Event::State),
                FrameType::ErrorState => frame.as_error().map(Event::Error),
                FrameType::RpcResponse => match decode_rpc_response(frame.payload()) {
                    Ok(response) => Some(Event::Response(response)),
                    Err(e) => {
                        warn!("Skipping bad response: {}", e);
                        None
                    }
                },
                FrameType::RpcCommand => None,
            };

            match event {
                Some(event) => {
                    trace!("Received {:?}", event);
                    return Ok(event);
                }
                None => debug!("Ignoring {:?} frame {:02x?}", frame.frame_type(), frame.payload()),
            }
        }
    }

    /// Current state, plus the device URL once provisioned
    pub async fn current_state(&mut self) -> Result<(State, Option<String>), HostError> {
        self.send(&RpcCommand::GetCurrentState).await?;
        let state = loop {
            match self.next_event().await? {
                Event::State(state) => break state,
                Event::Error(ErrorCode::None) => {}
                Event::Error(e) => return Err(HostError::Device(e)),
                Event::Response(r) => debug!("Ignoring stale response 0x{:02x}", r.command),
            }
        };

        if state != State::Provisioned {
            return Ok((state, None));
        }
        let response = self.response(commands::GET_CURRENT_STATE).await?;
        Ok((state, response.fields.into_iter().next()))
    }

    /// Firmware name, firmware version, chip family and device name
    pub async fn device_info(&mut self) -> Result<Vec<String>, HostError> {
        self.send(&RpcCommand::GetDeviceInfo).await?;
        Ok(self.response(commands::GET_DEVICE_INFO).await?.fields)
    }

    pub async fn scan(&mut self) -> Result<Vec<Network>, HostError> {
        self.send(&RpcCommand::GetWifiNetworks).await?;
        let mut networks = Vec::new();
        loop {
            let response = self.response(commands::GET_WIFI_NETWORKS).await?;
            if response.fields.is_empty() {
                return Ok(networks);
            }
            match Network::from_fields(&response.fields) {
                Some(network) => networks.push(network),
                None => warn!("Malformed network entry: {:?}", response.fields),
            }
        }
    }

    /// Send credentials and wait for the outcome. Returns the device URL.
    pub async fn provision(&mut self, ssid: &str, password: &str) -> Result<String, HostError> {
        self.send(&RpcCommand::WifiSettings {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
        .await?;

        loop {
            match self.next_event().await? {
                Event::State(State::Provisioning) => info!("Device is connecting to '{}'", ssid),
                Event::State(State::Provisioned) => info!("Device joined '{}'", ssid),
                Event::State(state) => debug!("Device state: {}", state),
                Event::Error(ErrorCode::None) => {}
                Event::Error(e) => return Err(HostError::Device(e)),
                Event::Response(r) if r.command == commands::WIFI_SETTINGS => {
                    return Ok(r.fields.into_iter().next().unwrap_or_default());
                }
                Event::Response(r) => debug!("Ignoring response 0x{:02x}", r.command),
            }
        }
    }

    async fn response(&mut self, command: u8) -> Result<RpcResponse, HostError> {
        loop {
            match self.next_event().await? {
                Event::Response(r) if r.command == command => return Ok(r),
                Event::Error(e) if e != ErrorCode::None => return Err(HostError::Device(e)),
                other => debug!("Waiting for response 0x{:02x}, got {:?}", command, other),
            }
        }
    }

    #[cfg(test)]
    fn writer(&self) -> &W {
        &self.writer
    }
}
