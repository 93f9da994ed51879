use crate::config::snippets;
use crate::mender::FALLBACK_REFRESH_TIMEOUT;
use failure::{Fallible, ResultExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Sub-path of each configuration directory holding snippets.
static SNIPPETS_SUBDIR: &str = "mender-update-flow-control/config.d";

/// Runtime configuration holding environmental inputs.
#[derive(Debug, Serialize)]
pub(crate) struct ConfigInput {
    pub(crate) dbus: DbusInput,
    pub(crate) refresh: RefreshInput,
    pub(crate) console: ConsoleInput,
}

impl ConfigInput {
    /// Read config snippets and merge them into a single config.
    ///
    /// Snippets are applied in lexical filename order. A snippet in a later
    /// directory masks any snippet with the same filename in earlier ones.
    pub(crate) fn read_config(dirs: &[&str]) -> Fallible<Self> {
        let mut fragments = BTreeMap::new();
        for dir in dirs {
            let path = Path::new(dir).join(SNIPPETS_SUBDIR);
            for (name, fpath) in collect_snippets(&path)? {
                fragments.insert(name, fpath);
            }
        }

        let mut snips = Vec::with_capacity(fragments.len());
        for (_, fpath) in fragments {
            trace!("reading config snippet {:?}", fpath);
            let content = fs::read_to_string(&fpath)
                .context(format!("failed to read file '{}'", fpath.display()))?;
            let snippet: snippets::ConfigSnippet = toml::from_str(&content)
                .context(format!("failed to parse TOML in '{}'", fpath.display()))?;
            snips.push(snippet);
        }

        let cfg = Self::merge_snippets(snips);
        debug!(
            "configuration input:\n{}",
            toml::to_string_pretty(&cfg).unwrap_or_default()
        );

        Ok(cfg)
    }

    /// Merge multiple snippets into a single configuration.
    pub(crate) fn merge_snippets(snippets: Vec<snippets::ConfigSnippet>) -> Self {
        let mut dbus = vec![];
        let mut refresh = vec![];
        let mut console = vec![];

        for snip in snippets {
            if let Some(d) = snip.dbus {
                dbus.push(d);
            }
            if let Some(r) = snip.refresh {
                refresh.push(r);
            }
            if let Some(c) = snip.console {
                console.push(c);
            }
        }

        Self {
            dbus: DbusInput::from_snippets(dbus),
            refresh: RefreshInput::from_snippets(refresh),
            console: ConsoleInput::from_snippets(console),
        }
    }
}

/// List `*.toml` files in `dir`, keyed by filename. A missing directory is empty.
fn collect_snippets(dir: &Path) -> Fallible<BTreeMap<String, PathBuf>> {
    let mut snippets = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(snippets),
        Err(e) => bail!("failed to list directory '{}': {}", dir.display(), e),
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "toml") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            snippets.insert(name.to_string(), path.clone());
        }
    }

    Ok(snippets)
}

#[derive(Debug, Serialize)]
pub(crate) struct DbusInput {
    pub(crate) bus: String,
    pub(crate) bus_name: String,
    pub(crate) object_path: String,
    pub(crate) interface: String,
    pub(crate) call_timeout_ms: u32,
}

impl DbusInput {
    fn from_snippets(snippets: Vec<snippets::DbusSnippet>) -> Self {
        let mut cfg = Self {
            bus: String::from("system"),
            bus_name: String::from("io.mender.UpdateManager"),
            object_path: String::from("/io/mender/UpdateManager"),
            interface: String::from("io.mender.Update1"),
            call_timeout_ms: 2000,
        };

        for snip in snippets {
            if let Some(b) = snip.bus {
                cfg.bus = b;
            }
            if let Some(n) = snip.bus_name {
                cfg.bus_name = n;
            }
            if let Some(p) = snip.object_path {
                cfg.object_path = p;
            }
            if let Some(i) = snip.interface {
                cfg.interface = i;
            }
            if let Some(t) = snip.call_timeout_ms {
                cfg.call_timeout_ms = t;
            }
        }

        cfg
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshInput {
    pub(crate) fallback_timeout_secs: u32,
    pub(crate) safety_margin_secs: u32,
}

impl RefreshInput {
    fn from_snippets(snippets: Vec<snippets::RefreshSnippet>) -> Self {
        let mut cfg = Self {
            fallback_timeout_secs: FALLBACK_REFRESH_TIMEOUT,
            safety_margin_secs: 1,
        };

        for snip in snippets {
            if let Some(f) = snip.fallback_timeout_secs {
                cfg.fallback_timeout_secs = f;
            }
            if let Some(m) = snip.safety_margin_secs {
                cfg.safety_margin_secs = m;
            }
        }

        cfg
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ConsoleInput {
    pub(crate) error_wait_ms: u64,
    pub(crate) clear_screen: bool,
}

impl ConsoleInput {
    fn from_snippets(snippets: Vec<snippets::ConsoleSnippet>) -> Self {
        let mut cfg = Self {
            error_wait_ms: 500,
            clear_screen: true,
        };

        for snip in snippets {
            if let Some(w) = snip.error_wait_ms {
                cfg.error_wait_ms = w;
            }
            if let Some(c) = snip.clear_screen {
                cfg.clear_screen = c;
            }
        }

        cfg
    }
}
