//! Mender client, Update Control Map interface.
//!
//! The Mender client exposes a single D-Bus method to install an
//! Update Control Map, returning the number of seconds after which
//! the map expires unless it is set again.
//!
//! Blocking D-Bus work happens on a `SyncArbiter` worker (`DbusClient`),
//! which async callers drive through the helpers in `client`.

mod blocking;
mod client;
mod endpoint;
#[cfg(test)]
pub(crate) mod mock;

pub(crate) use blocking::DbusClient;
pub(crate) use client::{apply, connect, ApplyError};
pub(crate) use endpoint::DbusConnector;

use failure::Fallible;

/// Refresh timeout (in time units) reported on every failed apply.
pub(crate) const FALLBACK_REFRESH_TIMEOUT: u32 = 30;

/// Fatal errors in the control relationship with the Mender client.
#[derive(Clone, Debug, Fail, PartialEq, Eq)]
pub(crate) enum ControlError {
    /// Unable to reach the update control endpoint.
    #[fail(display = "failed to acquire update control endpoint: {}", _0)]
    Acquisition(String),
    /// Bus-level failure while calling the endpoint.
    #[fail(display = "{}", _0)]
    Transport(String),
    /// The endpoint answered with a non-positive refresh timeout.
    #[fail(
        display = "io.mender.Update1.SetUpdateControlMap returned refresh_timeout={}",
        _0
    )]
    ProtocolViolation(i32),
}

/// Acquire handles to the update control endpoint.
///
/// Connectors are shared across worker threads, endpoints stay
/// on the thread which acquired them.
pub(crate) trait Connector: Send + Sync {
    fn connect(&self) -> Fallible<Box<dyn ControlEndpoint>>;
}

/// The remote `SetUpdateControlMap` operation.
pub(crate) trait ControlEndpoint {
    /// Install `payload` as the active control map, returning the raw refresh timeout.
    fn set_update_control_map(&self, payload: &str) -> Fallible<i32>;
}
