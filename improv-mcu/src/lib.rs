//! Improv MCU Library
//!
//! Device side of Improv WiFi provisioning over a serial line.
//!
//! This crate provides:
//! - A provisioning state machine driven by decoded RPC commands
//! - A byte-at-a-time session loop over any [`Transport`]
//! - Traits for the WiFi radio and persistent credential storage
//!
//! Board support implements [`Wifi`] (and optionally [`CredentialStore`]),
//! wraps its UART in a [`Transport`] and calls [`Session::poll`] from its
//! main loop, or hands the thread to [`Session::run`].
//!
//! Frame encoding and parsing live in `improv-proto`, re-exported here.

pub mod config;
pub mod device;
pub mod error;
pub mod observer;
pub mod provisioner;
pub mod session;
pub mod storage;
pub mod transport;
pub mod wifi;

pub use config::SessionConfig;
pub use device::{ChipFamily, DeviceInfo, URL_PLACEHOLDER};
pub use error::Error;
pub use observer::{FnObserver, Observer};
pub use provisioner::{Outcome, Provisioner};
pub use session::{Poll, Session};
pub use storage::{CredentialStore, Persisting, reconnect_saved};
pub use transport::{ThreadedTransport, Transport};
pub use wifi::*;

pub use improv_proto::{ErrorCode, RpcCommand, State};
