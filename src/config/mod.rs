/// Configuration parsing and validation.
///
/// This module contains three logical entities:
///  * Snippets: single configuration files, holding a subset of configuration entries.
///  * Inputs: configuration snippets merged, but not yet validated.
///  * Settings: validated configuration for the controller.
mod inputs;
mod snippets;

use failure::{Fallible, ResultExt};
use std::time::Duration;

/// Message bus hosting the Mender client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BusKind {
    System,
    Session,
}

/// Runtime configuration for the controller.
///
/// It holds validated configuration.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct Settings {
    pub(crate) dbus: DbusSettings,
    pub(crate) refresh: RefreshSettings,
    pub(crate) console: ConsoleSettings,
}

/// Location of the update control endpoint.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct DbusSettings {
    pub(crate) bus: BusKind,
    pub(crate) bus_name: String,
    pub(crate) object_path: String,
    pub(crate) interface: String,
    pub(crate) call_timeout_ms: i32,
}

/// Refresh scheduling for the active control map.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct RefreshSettings {
    /// Duration of one unit of the refresh timeouts reported by Mender.
    pub(crate) time_unit: Duration,
    pub(crate) fallback_timeout: u32,
    pub(crate) safety_margin: u32,
}

impl RefreshSettings {
    /// Delay before a map installed with `refresh_timeout` must be set again.
    pub(crate) fn refresh_delay(&self, refresh_timeout: u32) -> Duration {
        self.time_unit * refresh_timeout.saturating_sub(self.safety_margin)
    }
}

/// Interactive console behavior.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ConsoleSettings {
    pub(crate) error_wait: Duration,
    pub(crate) clear_screen: bool,
}

impl Settings {
    pub(crate) fn read_config(dirs: &[&str]) -> Fallible<Self> {
        let cfg = inputs::ConfigInput::read_config(dirs)?;
        Self::try_from_input(cfg)
    }

    /// Validate inputs and return valid settings.
    fn try_from_input(cfg: inputs::ConfigInput) -> Fallible<Self> {
        let dbus = DbusSettings::try_from_input(cfg.dbus).context("invalid [dbus] section")?;

        if cfg.refresh.fallback_timeout_secs == 0 {
            bail!("invalid [refresh] section: fallback_timeout_secs must be positive");
        }
        let refresh = RefreshSettings {
            time_unit: Duration::from_secs(1),
            fallback_timeout: cfg.refresh.fallback_timeout_secs,
            safety_margin: cfg.refresh.safety_margin_secs,
        };

        let console = ConsoleSettings {
            error_wait: Duration::from_millis(cfg.console.error_wait_ms),
            clear_screen: cfg.console.clear_screen,
        };

        let settings = Self {
            dbus,
            refresh,
            console,
        };
        debug!(
            "runtime configuration:\n{}",
            serde_json::to_string_pretty(&settings).unwrap_or_default()
        );

        Ok(settings)
    }
}

impl DbusSettings {
    fn try_from_input(cfg: inputs::DbusInput) -> Fallible<Self> {
        let bus = match cfg.bus.as_ref() {
            "system" => BusKind::System,
            "session" => BusKind::Session,
            x => bail!("unsupported bus '{}'", x),
        };
        for (key, value) in &[
            ("bus_name", &cfg.bus_name),
            ("object_path", &cfg.object_path),
            ("interface", &cfg.interface),
        ] {
            if value.is_empty() {
                bail!("empty '{}'", key);
            }
        }
        if cfg.call_timeout_ms == 0 || cfg.call_timeout_ms > i32::max_value() as u32 {
            bail!("call_timeout_ms out of range: {}", cfg.call_timeout_ms);
        }

        let settings = Self {
            bus,
            bus_name: cfg.bus_name,
            object_path: cfg.object_path,
            interface: cfg.interface,
            call_timeout_ms: cfg.call_timeout_ms as i32,
        };
        Ok(settings)
    }
}
