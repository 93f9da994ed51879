//! Blocking D-Bus client for the Mender client.

use super::{ControlEndpoint, Connector};
use crate::control_map::ControlMap;
use actix::prelude::*;
use failure::Fallible;
use std::sync::Arc;

/// D-Bus client, blocking implementation.
///
/// The endpoint is acquired on the worker thread itself, upon `Connect`.
pub(crate) struct DbusClient {
    connector: Arc<dyn Connector>,
    endpoint: Option<Box<dyn ControlEndpoint>>,
}

impl DbusClient {
    pub(crate) fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            endpoint: None,
        }
    }
}

impl Actor for DbusClient {
    type Context = SyncContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        trace!("dbus client started");
    }
}

/// DBus request: acquire the update control endpoint.
pub(crate) struct Connect {}

impl Message for Connect {
    type Result = Fallible<()>;
}

impl Handler<Connect> for DbusClient {
    type Result = Fallible<()>;

    fn handle(&mut self, _msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        let endpoint = self.connector.connect()?;
        self.endpoint = Some(endpoint);
        Ok(())
    }
}

/// DBus request: install a control map.
pub(crate) struct SetControlMap {
    pub(crate) map: ControlMap,
}

impl Message for SetControlMap {
    type Result = Fallible<i32>;
}

impl Handler<SetControlMap> for DbusClient {
    type Result = Fallible<i32>;

    fn handle(&mut self, msg: SetControlMap, _ctx: &mut Self::Context) -> Self::Result {
        let endpoint = match self.endpoint {
            Some(ref e) => e,
            None => bail!("update control endpoint not acquired"),
        };
        let payload = msg.map.to_payload()?;
        endpoint.set_update_control_map(&payload)
    }
}
