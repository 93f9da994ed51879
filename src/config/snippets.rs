/// Top-level configuration stanza.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigSnippet {
    /// D-Bus endpoint configuration.
    pub(crate) dbus: Option<DbusSnippet>,
    /// Control map refresh configuration.
    pub(crate) refresh: Option<RefreshSnippet>,
    /// Interactive console configuration.
    pub(crate) console: Option<ConsoleSnippet>,
}

/// Config snippet for the Mender D-Bus endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct DbusSnippet {
    /// Bus to connect to, `system` or `session` (default: system)
    pub(crate) bus: Option<String>,
    /// Well-known name of the Mender client (default: io.mender.UpdateManager)
    pub(crate) bus_name: Option<String>,
    pub(crate) object_path: Option<String>,
    pub(crate) interface: Option<String>,
    /// Timeout for a single method call, in milliseconds.
    pub(crate) call_timeout_ms: Option<u32>,
}

/// Config snippet for control map refreshing.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshSnippet {
    /// Refresh timeout assumed after a failed call (default: 30)
    pub(crate) fallback_timeout_secs: Option<u32>,
    /// Seconds to refresh ahead of map expiry (default: 1)
    pub(crate) safety_margin_secs: Option<u32>,
}

/// Config snippet for the interactive console.
#[derive(Debug, Deserialize)]
pub(crate) struct ConsoleSnippet {
    /// How long to wait for errors after each choice, in milliseconds.
    pub(crate) error_wait_ms: Option<u64>,
    pub(crate) clear_screen: Option<bool>,
}
