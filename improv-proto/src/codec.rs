//! Frame encoding and the RPC payload codecs

use crate::ProtoError;
use crate::types::*;

/// Additive checksum, truncated to 8 bits
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// One Improv frame. The payload never exceeds 255 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    frame_type: FrameType,
    payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: Vec<u8>) -> Result<Self, ProtoError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtoError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { frame_type, payload })
    }

    pub fn state(state: State) -> Self {
        Self { frame_type: FrameType::CurrentState, payload: vec![state.into()] }
    }

    pub fn error(error: ErrorCode) -> Self {
        Self { frame_type: FrameType::ErrorState, payload: vec![error.into()] }
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + 1);
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.push(self.frame_type.into());
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(&buf));
        buf
    }

    /// Decode one complete frame; `data` must hold exactly that frame
    pub fn decode(data: &[u8]) -> Result<Self, ProtoError> {
        if data.len() < HEADER_LEN + 1 {
            return Err(ProtoError::Truncated);
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(ProtoError::BadMagic);
        }
        if data[6] != VERSION {
            return Err(ProtoError::UnsupportedVersion(data[6]));
        }
        let frame_type = FrameType::try_from(data[7])?;

        let declared = data[8] as usize;
        let actual = data.len() - HEADER_LEN - 1;
        if declared != actual {
            return Err(ProtoError::LengthMismatch { declared, actual });
        }

        let (body, trailer) = data.split_at(data.len() - 1);
        let expected = checksum(body);
        if expected != trailer[0] {
            return Err(ProtoError::Checksum { expected, found: trailer[0] });
        }

        Ok(Self { frame_type, payload: body[HEADER_LEN..].to_vec() })
    }

    /// State carried by a CURRENT_STATE frame
    pub fn as_state(&self) -> Option<State> {
        match (self.frame_type, self.payload.as_slice()) {
            (FrameType::CurrentState, [b]) => State::try_from(*b).ok(),
            _ => None,
        }
    }

    /// Error carried by an ERROR_STATE frame
    pub fn as_error(&self) -> Option<ErrorCode> {
        match (self.frame_type, self.payload.as_slice()) {
            (FrameType::ErrorState, [b]) => ErrorCode::try_from(*b).ok(),
            _ => None,
        }
    }
}

pub fn encode_state(state: State) -> Vec<u8> {
    Frame::state(state).to_bytes()
}

pub fn encode_error(error: ErrorCode) -> Vec<u8> {
    Frame::error(error).to_bytes()
}

/// RPC_RESPONSE payload: `command | total_len | (len | bytes)*`.
///
/// `total_len` counts each field's length byte plus its content. With
/// `include_checksum` the additive checksum of the payload is appended to it.
pub fn rpc_response_payload<S: AsRef<str>>(
    command: u8,
    fields: &[S],
    include_checksum: bool,
) -> Result<Vec<u8>, ProtoError> {
    let mut out = vec![command, 0];
    let mut total = 0usize;

    for field in fields {
        let bytes = field.as_ref().as_bytes();
        if bytes.len() > u8::MAX as usize {
            return Err(ProtoError::FieldTooLong(bytes.len()));
        }
        total += 1 + bytes.len();
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }

    let limit = MAX_PAYLOAD_LEN - 2 - include_checksum as usize;
    if total > limit {
        return Err(ProtoError::PayloadTooLarge(total + 2 + include_checksum as usize));
    }
    out[1] = total as u8;

    if include_checksum {
        out.push(checksum(&out));
    }
    Ok(out)
}

/// Complete RPC_RESPONSE frame for `command` carrying `fields`
pub fn encode_rpc_response<S: AsRef<str>>(
    command: u8,
    fields: &[S],
    include_checksum: bool,
) -> Result<Vec<u8>, ProtoError> {
    let payload = rpc_response_payload(command, fields, include_checksum)?;
    Ok(Frame::new(FrameType::RpcResponse, payload)?.to_bytes())
}

/// RPC_COMMAND payload: `command | arg_len | args`
pub fn rpc_command_payload(command: &RpcCommand) -> Result<Vec<u8>, ProtoError> {
    let mut args = Vec::new();
    if let RpcCommand::WifiSettings { ssid, password } = command {
        for field in [ssid, password] {
            if field.len() > u8::MAX as usize {
                return Err(ProtoError::FieldTooLong(field.len()));
            }
            args.push(field.len() as u8);
            args.extend_from_slice(field.as_bytes());
        }
    }
    if args.len() > MAX_PAYLOAD_LEN - 2 {
        return Err(ProtoError::PayloadTooLarge(args.len() + 2));
    }

    let mut payload = Vec::with_capacity(2 + args.len());
    payload.push(command.id());
    payload.push(args.len() as u8);
    payload.extend_from_slice(&args);
    Ok(payload)
}

/// Complete RPC_COMMAND frame, as sent by a host
pub fn encode_rpc_command(command: &RpcCommand) -> Result<Vec<u8>, ProtoError> {
    Ok(Frame::new(FrameType::RpcCommand, rpc_command_payload(command)?)?.to_bytes())
}

/// Decode an RPC_COMMAND payload: `command | arg_len | args`
pub fn decode_rpc_command(payload: &[u8]) -> Result<RpcCommand, ProtoError> {
    let (&id, rest) = payload
        .split_first()
        .ok_or(ProtoError::InvalidRpc("empty payload"))?;

    let args = match rest.split_first() {
        None => rest,
        Some((&len, args)) => {
            if len as usize != args.len() {
                return Err(ProtoError::InvalidRpc("argument length does not match payload"));
            }
            args
        }
    };

    match id {
        commands::WIFI_SETTINGS => {
            let mut fields = Fields::new(args);
            let ssid = fields.next_string()?;
            let password = fields.next_string()?;
            if !fields.is_empty() {
                return Err(ProtoError::InvalidRpc("trailing bytes after password"));
            }
            if ssid.is_empty() {
                return Err(ProtoError::InvalidRpc("empty ssid"));
            }
            Ok(RpcCommand::WifiSettings { ssid, password })
        }
        commands::GET_CURRENT_STATE => Ok(RpcCommand::GetCurrentState),
        commands::GET_DEVICE_INFO => Ok(RpcCommand::GetDeviceInfo),
        commands::GET_WIFI_NETWORKS => Ok(RpcCommand::GetWifiNetworks),
        other => Ok(RpcCommand::Unknown(other)),
    }
}

/// Decoded RPC_RESPONSE payload, as seen by a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub command: u8,
    pub fields: Vec<String>,
}

/// Decode an RPC_RESPONSE payload, with or without the trailing payload checksum
pub fn decode_rpc_response(payload: &[u8]) -> Result<RpcResponse, ProtoError> {
    let [command, total, body @ ..] = payload else {
        return Err(ProtoError::InvalidRpc("response shorter than its header"));
    };
    let total = *total as usize;

    let body = if body.len() == total {
        body
    } else if body.len() == total + 1 {
        let (inner, trailer) = payload.split_at(payload.len() - 1);
        let expected = checksum(inner);
        if expected != trailer[0] {
            return Err(ProtoError::Checksum { expected, found: trailer[0] });
        }
        &body[..total]
    } else {
        return Err(ProtoError::InvalidRpc("response length does not match payload"));
    };

    let mut reader = Fields::new(body);
    let mut fields = Vec::new();
    while !reader.is_empty() {
        fields.push(String::from_utf8_lossy(reader.next_field()?).into_owned());
    }
    Ok(RpcResponse { command: *command, fields })
}

/// Reads successive `len | bytes` fields
struct Fields<'a> {
    data: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn next_field(&mut self) -> Result<&'a [u8], ProtoError> {
        let (&len, rest) = self
            .data
            .split_first()
            .ok_or(ProtoError::InvalidRpc("missing field length"))?;
        let len = len as usize;
        if len > rest.len() {
            return Err(ProtoError::InvalidRpc("field runs past end of payload"));
        }
        let (field, rest) = rest.split_at(len);
        self.data = rest;
        Ok(field)
    }

    fn next_string(&mut self) -> Result<String, ProtoError> {
        let field = self.next_field()?;
        String::from_utf8(field.to_vec()).map_err(|_| ProtoError::InvalidRpc("field is not utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_frame_bytes() {
        let bytes = encode_state(State::Authorized);
        assert_eq!(&bytes[..9], b"IMPROV\x01\x01\x01");
        assert_eq!(bytes[9], 0x02);
        assert_eq!(bytes.len(), 11);
        assert_eq!(bytes[10], checksum(&bytes[..10]));
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn decode_error_frame() {
        let frame = Frame::decode(&encode_error(ErrorCode::UnableToConnect)).unwrap();
        assert_eq!(frame.as_error(), Some(ErrorCode::UnableToConnect));
        assert_eq!(frame.as_state(), None);
    }

    #[test]
    fn decode_rejects_corruption() {
        let good = encode_state(State::Provisioned);

        let mut bad = good.clone();
        bad[9] = 0x03;
        assert!(matches!(Frame::decode(&bad), Err(ProtoError::Checksum { .. })));

        let mut bad = good.clone();
        bad[6] = 2;
        assert_eq!(Frame::decode(&bad), Err(ProtoError::UnsupportedVersion(2)));

        assert_eq!(Frame::decode(&good[..10]), Err(ProtoError::LengthMismatch { declared: 1, actual: 0 }));
        assert_eq!(Frame::decode(b"IMPROV"), Err(ProtoError::Truncated));
    }

    #[test]
    fn response_total_len_counts_length_bytes() {
        let payload = rpc_response_payload(commands::GET_DEVICE_INFO, &["ab", "cde"], false).unwrap();
        assert_eq!(payload, vec![0x03, 7, 2, b'a', b'b', 3, b'c', b'd', b'e']);
    }

    #[test]
    fn response_with_inner_checksum() {
        let payload = rpc_response_payload(commands::GET_CURRENT_STATE, &["x"], true).unwrap();
        assert_eq!(payload.len(), 5);
        assert_eq!(payload[4], checksum(&payload[..4]));

        let decoded = decode_rpc_response(&payload).unwrap();
        assert_eq!(decoded.fields, vec!["x".to_string()]);
    }

    #[test]
    fn empty_response() {
        let frame = encode_rpc_response::<&str>(commands::GET_WIFI_NETWORKS, &[], false).unwrap();
        let frame = Frame::decode(&frame).unwrap();
        assert_eq!(frame.frame_type(), FrameType::RpcResponse);
        assert_eq!(frame.payload(), &[0x04, 0x00]);
        assert!(decode_rpc_response(frame.payload()).unwrap().fields.is_empty());
    }

    #[test]
    fn oversized_response_is_refused() {
        let long = "x".repeat(200);
        assert!(matches!(
            rpc_response_payload(1, &[long.as_str(), long.as_str()], false),
            Err(ProtoError::PayloadTooLarge(_))
        ));
        assert_eq!(
            rpc_response_payload(1, &["y".repeat(300)], false),
            Err(ProtoError::FieldTooLong(300))
        );
    }

    #[test]
    fn wifi_settings_decode() {
        let payload = [0x01, 12, 4, b'h', b'o', b'm', b'e', 6, b's', b'e', b'c', b'r', b'e', b't'];
        assert_eq!(
            decode_rpc_command(&payload),
            Ok(RpcCommand::WifiSettings { ssid: "home".into(), password: "secret".into() })
        );
    }

    #[test]
    fn wifi_settings_open_network() {
        let payload = [0x01, 6, 4, b'h', b'o', b'm', b'e', 0];
        assert_eq!(
            decode_rpc_command(&payload),
            Ok(RpcCommand::WifiSettings { ssid: "home".into(), password: String::new() })
        );
    }

    #[test]
    fn wifi_settings_rejects_bad_lengths() {
        // ssid claims 9 bytes, only 4 follow
        let payload = [0x01, 5, 9, b'h', b'o', b'm', b'e'];
        assert!(matches!(decode_rpc_command(&payload), Err(ProtoError::InvalidRpc(_))));

        // password length missing
        let payload = [0x01, 5, 4, b'h', b'o', b'm', b'e'];
        assert!(matches!(decode_rpc_command(&payload), Err(ProtoError::InvalidRpc(_))));

        // empty ssid
        let payload = [0x01, 2, 0, 0];
        assert_eq!(decode_rpc_command(&payload), Err(ProtoError::InvalidRpc("empty ssid")));

        // arg length disagrees with payload
        let payload = [0x02, 3];
        assert!(matches!(decode_rpc_command(&payload), Err(ProtoError::InvalidRpc(_))));
    }

    #[test]
    fn wifi_settings_rejects_trailing_bytes() {
        let payload = [0x01, 7, 2, b'h', b'i', 2, b'p', b'w', 0xaa];
        assert_eq!(
            decode_rpc_command(&payload),
            Err(ProtoError::InvalidRpc("trailing bytes after password"))
        );
    }

    #[test]
    fn plain_commands_decode() {
        assert_eq!(decode_rpc_command(&[0x02]), Ok(RpcCommand::GetCurrentState));
        assert_eq!(decode_rpc_command(&[0x03, 0]), Ok(RpcCommand::GetDeviceInfo));
        assert_eq!(decode_rpc_command(&[0x04, 0]), Ok(RpcCommand::GetWifiNetworks));
        assert_eq!(decode_rpc_command(&[0x7e, 0]), Ok(RpcCommand::Unknown(0x7e)));
        assert!(decode_rpc_command(&[]).is_err());
    }

    #[test]
    fn command_frame_carries_arguments() {
        let cmd = RpcCommand::WifiSettings { ssid: "net".into(), password: "pw".into() };
        let frame = Frame::decode(&encode_rpc_command(&cmd).unwrap()).unwrap();
        assert_eq!(frame.frame_type(), FrameType::RpcCommand);
        assert_eq!(frame.payload(), &[0x01, 7, 3, b'n', b'e', b't', 2, b'p', b'w']);
    }

    #[test]
    fn response_length_mismatch() {
        assert!(decode_rpc_response(&[0x03, 9, 1, b'a']).is_err());
        assert!(decode_rpc_response(&[0x03]).is_err());
    }
}
