//! Incremental parser for host -> device RPC_COMMAND frames
//!
//! Bytes arrive one at a time with no delimiter other than the magic marker
//! and the length byte. The parser owns the only buffering state; it is reset
//! whenever a frame completes or a byte does not fit the frame being built.

use crate::ProtoError;
use crate::codec::decode_rpc_command;
use crate::types::*;

/// What happened to the byte handed to [`StreamParser::push`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Byte joined the current frame attempt
    Pending,
    /// Byte could not start or continue a frame and was dropped
    Discarded,
    /// Byte completed a valid frame
    Command(RpcCommand),
}

impl Feed {
    pub fn consumed(&self) -> bool {
        !matches!(self, Feed::Discarded)
    }
}

#[derive(Debug)]
pub struct StreamParser {
    buffer: Vec<u8>,
    capacity: usize,
    // running additive sum of everything in `buffer`
    sum: u8,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    /// Parser able to hold the largest possible frame
    pub fn new() -> Self {
        Self::with_capacity(MAX_FRAME_LEN)
    }

    /// Parser with a smaller buffer. Frames declaring a payload that would
    /// not fit are refused with [`ProtoError::Overflow`], so anything below
    /// [`MAX_FRAME_LEN`] refuses some valid frames.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(HEADER_LEN + 1, MAX_FRAME_LEN);
        Self { buffer: Vec::with_capacity(capacity), capacity, sum: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the next byte slot in the frame being assembled
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.sum = 0;
    }

    /// Feed one byte.
    ///
    /// Errors are per-frame: the buffer is already reset when one is
    /// returned and the next byte starts a fresh attempt.
    pub fn push(&mut self, byte: u8) -> Result<Feed, ProtoError> {
        let p = self.buffer.len();
        match p {
            0..=5 if byte != MAGIC[p] => return Ok(self.realign(byte)),
            6 if byte != VERSION => return Ok(self.realign(byte)),
            7 if byte != u8::from(FrameType::RpcCommand) => return Ok(self.realign(byte)),
            8 => {
                if HEADER_LEN + byte as usize + 1 > self.capacity {
                    self.reset();
                    return Err(ProtoError::Overflow { capacity: self.capacity });
                }
            }
            _ if p > 8 && p == HEADER_LEN + self.buffer[8] as usize => {
                return self.finish(byte);
            }
            _ => {}
        }

        self.buffer.push(byte);
        self.sum = self.sum.wrapping_add(byte);
        Ok(Feed::Pending)
    }

    fn finish(&mut self, received: u8) -> Result<Feed, ProtoError> {
        let expected = self.sum;
        if received != expected {
            self.reset();
            return Err(ProtoError::Checksum { expected, found: received });
        }

        let command = decode_rpc_command(&self.buffer[HEADER_LEN..]);
        self.reset();
        command.map(Feed::Command)
    }

    // A mismatching byte may itself be the start of the next frame.
    fn realign(&mut self, byte: u8) -> Feed {
        self.reset();
        if byte == MAGIC[0] {
            self.buffer.push(byte);
            self.sum = byte;
            Feed::Pending
        } else {
            Feed::Discarded
        }
    }
}
