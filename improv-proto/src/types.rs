//! Wire constants and the enums carried in Improv frames
//!
//! Every enum maps to and from its wire byte explicitly. Unknown bytes are
//! rejected with [`ProtoError`] instead of producing an out-of-range variant.

use crate::ProtoError;

/// Frame marker, always the first six bytes of a frame
pub const MAGIC: &[u8; 6] = b"IMPROV";

/// The only protocol version this crate speaks
pub const VERSION: u8 = 1;

/// Bytes before the payload: magic, version, type, length
pub const HEADER_LEN: usize = MAGIC.len() + 3;

/// Largest payload a single length byte can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Header + maximum payload + checksum
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN + 1;

/// Frame type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Device -> host, payload is one [`State`] byte
    CurrentState,
    /// Device -> host, payload is one [`ErrorCode`] byte
    ErrorState,
    /// Host -> device
    RpcCommand,
    /// Device -> host
    RpcResponse,
}

impl From<FrameType> for u8 {
    fn from(t: FrameType) -> u8 {
        match t {
            FrameType::CurrentState => 0x01,
            FrameType::ErrorState => 0x02,
            FrameType::RpcCommand => 0x03,
            FrameType::RpcResponse => 0x04,
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = ProtoError;

    fn try_from(b: u8) -> Result<Self, ProtoError> {
        match b {
            0x01 => Ok(FrameType::CurrentState),
            0x02 => Ok(FrameType::ErrorState),
            0x03 => Ok(FrameType::RpcCommand),
            0x04 => Ok(FrameType::RpcResponse),
            other => Err(ProtoError::UnknownFrameType(other)),
        }
    }
}

/// RPC command ids
pub mod commands {
    /// Send WiFi credentials: ssid and password as length-prefixed strings
    pub const WIFI_SETTINGS: u8 = 0x01;

    /// Ask for the current provisioning state
    pub const GET_CURRENT_STATE: u8 = 0x02;

    /// Ask for firmware name/version, chip family and device name
    pub const GET_DEVICE_INFO: u8 = 0x03;

    /// Ask for the networks visible to the radio
    pub const GET_WIFI_NETWORKS: u8 = 0x04;
}

/// Provisioning state reported in CURRENT_STATE frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Last connection attempt failed
    Stopped,
    /// Ready to accept credentials
    Authorized,
    /// Connection attempt in progress
    Provisioning,
    /// Connected to a network
    Provisioned,
}

impl From<State> for u8 {
    fn from(s: State) -> u8 {
        match s {
            State::Stopped => 0x00,
            State::Authorized => 0x02,
            State::Provisioning => 0x03,
            State::Provisioned => 0x04,
        }
    }
}

impl TryFrom<u8> for State {
    type Error = ProtoError;

    fn try_from(b: u8) -> Result<Self, ProtoError> {
        match b {
            0x00 => Ok(State::Stopped),
            0x02 => Ok(State::Authorized),
            0x03 => Ok(State::Provisioning),
            0x04 => Ok(State::Provisioned),
            other => Err(ProtoError::UnknownState(other)),
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            State::Stopped => "stopped",
            State::Authorized => "authorized",
            State::Provisioning => "provisioning",
            State::Provisioned => "provisioned",
        })
    }
}

/// Error reported in ERROR_STATE frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    None,
    InvalidRpc,
    UnknownRpc,
    UnableToConnect,
    NotAuthorized,
}

impl From<ErrorCode> for u8 {
    fn from(e: ErrorCode) -> u8 {
        match e {
            ErrorCode::None => 0x00,
            ErrorCode::InvalidRpc => 0x01,
            ErrorCode::UnknownRpc => 0x02,
            ErrorCode::UnableToConnect => 0x03,
            ErrorCode::NotAuthorized => 0x04,
        }
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = ProtoError;

    fn try_from(b: u8) -> Result<Self, ProtoError> {
        match b {
            0x00 => Ok(ErrorCode::None),
            0x01 => Ok(ErrorCode::InvalidRpc),
            0x02 => Ok(ErrorCode::UnknownRpc),
            0x03 => Ok(ErrorCode::UnableToConnect),
            0x04 => Ok(ErrorCode::NotAuthorized),
            other => Err(ProtoError::UnknownErrorCode(other)),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorCode::None => "none",
            ErrorCode::InvalidRpc => "invalid rpc",
            ErrorCode::UnknownRpc => "unknown rpc",
            ErrorCode::UnableToConnect => "unable to connect",
            ErrorCode::NotAuthorized => "not authorized",
        })
    }
}

/// Decoded payload of an RPC_COMMAND frame
#[derive(Clone, PartialEq, Eq)]
pub enum RpcCommand {
    WifiSettings { ssid: String, password: String },
    GetCurrentState,
    GetDeviceInfo,
    GetWifiNetworks,
    /// Well-formed frame carrying a command id this device does not know
    Unknown(u8),
}

// Passwords stay out of logs.
impl std::fmt::Debug for RpcCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcCommand::WifiSettings { ssid, password } => f
                .debug_struct("WifiSettings")
                .field("ssid", ssid)
                .field("password_len", &password.len())
                .finish(),
            RpcCommand::GetCurrentState => f.write_str("GetCurrentState"),
            RpcCommand::GetDeviceInfo => f.write_str("GetDeviceInfo"),
            RpcCommand::GetWifiNetworks => f.write_str("GetWifiNetworks"),
            RpcCommand::Unknown(id) => write!(f, "Unknown(0x{id:02x})"),
        }
    }
}

impl RpcCommand {
    pub fn id(&self) -> u8 {
        match self {
            RpcCommand::WifiSettings { .. } => commands::WIFI_SETTINGS,
            RpcCommand::GetCurrentState => commands::GET_CURRENT_STATE,
            RpcCommand::GetDeviceInfo => commands::GET_DEVICE_INFO,
            RpcCommand::GetWifiNetworks => commands::GET_WIFI_NETWORKS,
            RpcCommand::Unknown(id) => *id,
        }
    }
}
