//! D-Bus endpoint for `io.mender.Update1`.

use super::{ControlEndpoint, Connector};
use crate::config::{BusKind, DbusSettings};
use dbus::{BusName, BusType, Connection, Interface, Member, Path};
use failure::{Fallible, ResultExt};

/// Remote method installing a control map.
static SET_CONTROL_MAP_METHOD: &str = "SetUpdateControlMap";

/// Connector to the Mender client over D-Bus.
#[derive(Clone, Debug)]
pub(crate) struct DbusConnector {
    settings: DbusSettings,
}

impl DbusConnector {
    pub(crate) fn new(settings: DbusSettings) -> Self {
        Self { settings }
    }
}

impl Connector for DbusConnector {
    fn connect(&self) -> Fallible<Box<dyn ControlEndpoint>> {
        let cfg = &self.settings;
        let bus_type = match cfg.bus {
            BusKind::System => BusType::System,
            BusKind::Session => BusType::Session,
        };
        trace!("connecting to {:?} bus", cfg.bus);

        let conn = Connection::get_private(bus_type)
            .map_err(|e| format_err!("failed to connect to D-Bus: {}", e))?;
        let endpoint = DbusEndpoint {
            conn,
            destination: BusName::new(cfg.bus_name.as_str()).map_err(|e| format_err!("{}", e))?,
            path: Path::new(cfg.object_path.as_str()).map_err(|e| format_err!("{}", e))?,
            interface: Interface::new(cfg.interface.as_str())
                .map_err(|e| format_err!("{}", e))?,
            method: Member::new(SET_CONTROL_MAP_METHOD).map_err(|e| format_err!("{}", e))?,
            timeout_ms: cfg.call_timeout_ms,
        };

        if !endpoint
            .name_has_owner(&cfg.bus_name)
            .context("failed to look up bus name")?
        {
            bail!("service '{}' not available on the bus", cfg.bus_name);
        }
        debug!(
            "acquired update control endpoint {}:{}",
            cfg.bus_name, cfg.object_path
        );

        Ok(Box::new(endpoint))
    }
}

/// Private D-Bus connection bound to a single remote object.
struct DbusEndpoint {
    conn: Connection,
    destination: BusName<'static>,
    path: Path<'static>,
    interface: Interface<'static>,
    method: Member<'static>,
    timeout_ms: i32,
}

impl DbusEndpoint {
    /// Check whether `name` is currently owned on the bus.
    fn name_has_owner(&self, name: &str) -> Fallible<bool> {
        let call = dbus::Message::new_method_call(
            "org.freedesktop.DBus",
            "/org/freedesktop/DBus",
            "org.freedesktop.DBus",
            "NameHasOwner",
        )
        .map_err(|e| format_err!("{}", e))?
        .append1(name);

        let reply = self
            .conn
            .send_with_reply_and_block(call, self.timeout_ms)
            .map_err(|e| format_err!("{}", e))?;
        let owned: bool = reply.read1().map_err(|e| format_err!("{:?}", e))?;
        Ok(owned)
    }
}

impl ControlEndpoint for DbusEndpoint {
    fn set_update_control_map(&self, payload: &str) -> Fallible<i32> {
        let call = dbus::Message::new_method_call(
            self.destination.clone(),
            self.path.clone(),
            self.interface.clone(),
            self.method.clone(),
        )
        .map_err(|e| format_err!("{}", e))?
        .append1(payload);

        let reply = self
            .conn
            .send_with_reply_and_block(call, self.timeout_ms)
            .map_err(|e| format_err!("{}", e))?;
        let refresh_timeout: i32 = reply
            .read1()
            .map_err(|e| format_err!("unexpected reply to {}: {:?}", SET_CONTROL_MAP_METHOD, e))?;
        trace!("{} reply: refresh_timeout={}", SET_CONTROL_MAP_METHOD, refresh_timeout);

        Ok(refresh_timeout)
    }
}
