//! Byte transport the session runs over (typically a UART)

use improv_proto::MAX_FRAME_LEN;
use log::*;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};

/// Point-to-point byte stream
pub trait Transport {
    /// Next byte if one has already arrived. Must not block.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write a whole frame
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }
}

/// Turns a blocking reader into a [`Transport`] by draining it on a
/// background thread. At most one frame's worth of bytes is queued; past
/// that the thread stops reading until the session catches up.
pub struct ThreadedTransport<W> {
    rx: Receiver<io::Result<u8>>,
    writer: W,
}

impl<W: Write> ThreadedTransport<W> {
    pub fn spawn<R: Read + Send + 'static>(mut reader: R, writer: W) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(MAX_FRAME_LEN);
        std::thread::Builder::new()
            .name("improv-rx".to_string())
            .spawn(move || {
                let mut buf = [0u8; 64];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            let _ = tx.send(Err(io::ErrorKind::UnexpectedEof.into()));
                            return;
                        }
                        Ok(n) => {
                            for b in &buf[..n] {
                                if tx.send(Ok(*b)).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!("Transport reader stopped: {}", e);
                            let _ = tx.send(Err(e));
                            return;
                        }
                    }
                }
            })?;
        Ok(Self { rx, writer })
    }
}

impl<W: Write> Transport for ThreadedTransport<W> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.rx.try_recv() {
            Ok(byte) => byte.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }
}
