//! Asynchronous Mender client helpers.
//!
//! These wrap requests to the blocking `DbusClient`, turning replies into
//! typed `ControlError`s. No retry happens here, callers decide what to do
//! on failure.

use super::blocking::{Connect, DbusClient, SetControlMap};
use super::ControlError;
use crate::control_map::ControlMap;
use actix::prelude::*;
use failure::Fallible;
use futures::prelude::*;

/// Failed apply, with the timeout to use for the next attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ApplyError {
    pub(crate) error: ControlError,
    pub(crate) retry_after: u32,
}

/// Acquire the update control endpoint on the D-Bus worker.
pub(crate) fn connect(addr: &Addr<DbusClient>) -> impl Future<Item = (), Error = ControlError> {
    addr.send(Connect {}).then(|res| match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ControlError::Acquisition(error_chain(&e))),
        Err(e) => Err(ControlError::Acquisition(e.to_string())),
    })
}

/// Install `map` on the Mender client, returning its refresh timeout.
///
/// On failure, `fallback` is reported as the timeout before the next attempt.
pub(crate) fn apply(
    addr: &Addr<DbusClient>,
    map: ControlMap,
    fallback: u32,
) -> impl Future<Item = u32, Error = ApplyError> {
    trace!("requesting to set control map '{}'", map.id());

    addr.send(SetControlMap { map }).then(move |res| {
        let reply = match res {
            Ok(r) => r,
            Err(e) => Err(format_err!("D-Bus worker unavailable: {}", e)),
        };
        check_reply(reply).map_err(|error| ApplyError {
            error,
            retry_after: fallback,
        })
    })
}

/// Classify a raw `SetUpdateControlMap` reply.
fn check_reply(reply: Fallible<i32>) -> Result<u32, ControlError> {
    match reply {
        Err(e) => Err(ControlError::Transport(error_chain(&e))),
        Ok(timeout) if timeout <= 0 => Err(ControlError::ProtocolViolation(timeout)),
        Ok(timeout) => Ok(timeout as u32),
    }
}

fn error_chain(err: &failure::Error) -> String {
    err.iter_chain()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
