//! Serial session: pulls bytes from the transport into the parser and hands
//! completed commands to the provisioner.

use crate::config::SessionConfig;
use crate::device::DeviceInfo;
use crate::error::Error;
use crate::observer::Observer;
use crate::provisioner::{Outcome, Provisioner};
use crate::transport::Transport;
use crate::wifi::Wifi;
use improv_proto::{Feed, ProtoError, State, StreamParser};
use log::*;
use std::time::Duration;

/// Result of one [`Session::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// No byte was waiting
    Idle,
    /// Byte joined the frame being assembled
    Consumed,
    /// Byte dropped while looking for a frame
    Discarded,
    /// Byte completed a command, which was handled
    Handled(Outcome),
    /// Byte completed a frame that was dropped
    Invalid(ProtoError),
}

pub struct Session<T, W, O> {
    transport: T,
    parser: StreamParser,
    provisioner: Provisioner<W, O>,
    report_checksum_errors: bool,
}

impl<T: Transport, W: Wifi, O: Observer> Session<T, W, O> {
    pub fn new(transport: T, wifi: W, observer: O, device: DeviceInfo, config: &SessionConfig) -> Self {
        info!(
            "Improv session for {} {} ({}, {})",
            device.firmware_name,
            device.firmware_version,
            device.device_name,
            device.chip_family.label()
        );
        Self {
            transport,
            parser: StreamParser::new(),
            provisioner: Provisioner::new(wifi, observer, device, config),
            report_checksum_errors: config.report_checksum_errors,
        }
    }

    pub fn state(&self) -> State {
        self.provisioner.state()
    }

    pub fn provisioner(&self) -> &Provisioner<W, O> {
        &self.provisioner
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Capacity of the frame buffer, always enough for the largest frame
    pub fn buffer_capacity(&self) -> usize {
        self.parser.capacity()
    }

    /// Read at most one byte and act on it. Never waits for input.
    pub fn poll(&mut self) -> Result<Poll, Error> {
        let Some(byte) = self.transport.read_byte()? else {
            return Ok(Poll::Idle);
        };

        match self.parser.push(byte) {
            Ok(Feed::Pending) => Ok(Poll::Consumed),
            Ok(Feed::Discarded) => {
                trace!("Discarded byte 0x{:02x}", byte);
                Ok(Poll::Discarded)
            }
            Ok(Feed::Command(command)) => {
                let outcome = self.provisioner.handle(command, &mut self.transport)?;
                Ok(Poll::Handled(outcome))
            }
            Err(e) => {
                warn!("Dropped frame: {}", e);
                let report = match e {
                    ProtoError::Checksum { .. } => self.report_checksum_errors,
                    _ => true,
                };
                if let Some(code) = e.error_code().filter(|_| report) {
                    self.provisioner.report_error(code, &mut self.transport)?;
                }
                Ok(Poll::Invalid(e))
            }
        }
    }

    /// Poll forever, sleeping for `idle` whenever no byte is waiting.
    /// Returns only when the transport or an encode fails.
    pub fn run(&mut self, idle: Duration) -> Result<(), Error> {
        loop {
            if self.poll()? == Poll::Idle {
                std::thread::sleep(idle);
            }
        }
    }
}
