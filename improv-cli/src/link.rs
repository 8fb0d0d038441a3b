//! Byte link to a device: a serial port or a TCP socket

use log::*;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;

pub type Reader = Box<dyn AsyncRead + Unpin + Send>;
pub type Writer = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Serial { path: String, baud: u32 },
    Tcp(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Serial { path, baud } => write!(f, "{} @ {} baud", path, baud),
            Target::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

pub async fn open(target: &Target) -> io::Result<(Reader, Writer)> {
    info!("Opening {}", target);
    match target {
        Target::Serial { path, baud } => {
            let port = tokio_serial::new(path, *baud)
                .open_native_async()
                .map_err(|e| io::Error::other(format!("Failed to open {}: {}", path, e)))?;
            let (r, w) = tokio::io::split(port);
            Ok((Box::new(r), Box::new(w)))
        }
        Target::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
    }
}
