//! Improv serial protocol - wire types, framing and the incremental parser
//!
//! Frame layout:
//!
//! ```text
//! "IMPROV" | VERSION | TYPE | LENGTH | PAYLOAD (LENGTH bytes) | CHECKSUM
//! ```
//!
//! The checksum is the additive sum, mod 256, of every byte before it.

pub mod codec;
pub mod parser;
pub mod types;

pub use codec::{
    Frame, RpcResponse, checksum, decode_rpc_command, decode_rpc_response, encode_error,
    encode_rpc_command, encode_rpc_response, encode_state, rpc_command_payload,
    rpc_response_payload,
};
pub use parser::{Feed, StreamParser};
pub use types::{
    ErrorCode, FrameType, HEADER_LEN, MAGIC, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, RpcCommand, State,
    VERSION, commands,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("frame truncated")]
    Truncated,
    #[error("frame does not start with IMPROV")]
    BadMagic,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),
    #[error("frame declares {declared} payload bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch: computed 0x{expected:02x}, received 0x{found:02x}")]
    Checksum { expected: u8, found: u8 },
    #[error("frame does not fit in {capacity} byte buffer")]
    Overflow { capacity: usize },
    #[error("payload of {0} bytes exceeds 255")]
    PayloadTooLarge(usize),
    #[error("field of {0} bytes exceeds 255")]
    FieldTooLong(usize),
    #[error("invalid rpc: {0}")]
    InvalidRpc(&'static str),
    #[error("unknown state 0x{0:02x}")]
    UnknownState(u8),
    #[error("unknown error code 0x{0:02x}")]
    UnknownErrorCode(u8),
}

impl ProtoError {
    /// Wire error to report to the host, if this error is one the host should hear about
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ProtoError::InvalidRpc(_) | ProtoError::Checksum { .. } | ProtoError::Overflow { .. } => {
                Some(ErrorCode::InvalidRpc)
            }
            _ => None,
        }
    }
}

/// Async frame operations for tokio
#[cfg(feature = "async")]
pub mod async_io {
    use super::*;
    use std::io;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> io::Result<()> {
        writer.write_all(&frame.to_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read the next complete frame of any type.
    ///
    /// Bytes before the magic marker are skipped, as is a marker followed by
    /// an unknown version or frame type. A frame that fails validation is
    /// returned as `InvalidData`; the stream stays usable.
    pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
        let mut matched = 0;
        let (version, frame_type) = loop {
            let b = reader.read_u8().await?;
            if matched < MAGIC.len() {
                matched = resync(matched, b);
                continue;
            }
            if b != VERSION {
                matched = resync(0, b);
                continue;
            }
            let t = reader.read_u8().await?;
            match FrameType::try_from(t) {
                Ok(_) => break (b, t),
                Err(_) => matched = resync(0, t),
            }
        };

        let len = reader.read_u8().await? as usize;
        let mut rest = vec![0u8; len + 1];
        reader.read_exact(&mut rest).await?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + len + 1);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[version, frame_type, len as u8]);
        bytes.extend_from_slice(&rest);

        Frame::decode(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    // Magic bytes matched after seeing `b` with `matched` already matched
    fn resync(matched: usize, b: u8) -> usize {
        if b == MAGIC[matched] {
            matched + 1
        } else if b == MAGIC[0] {
            1
        } else {
            0
        }
    }

}
