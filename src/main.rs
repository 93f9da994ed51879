//! mender-update-flow-control: interactive Update Control Map manager.
//!
//! This binary drives the update flow of a Mender client over D-Bus,
//! keeping an Update Control Map active on it for as long as it runs.
//!
//! It is made of two actors connected by explicitly owned channels:
//!  * `RefreshAgent` - installs the pause-all map first, then keeps the
//!    current map alive and replaces it on request.
//!  * `SourceLoop` - menu-driven source of replacement maps, which also
//!    reports fatal errors surfaced by the refresh agent.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod config;
mod control_map;
mod mender;
mod refresh_agent;
mod source;
mod supervisor;

use crate::config::Settings;
use crate::mender::DbusConnector;
use crate::source::Outcome;
use failure::Fallible;
use std::sync::Arc;
use structopt::StructOpt;

/// Base directories scanned for configuration snippets, lowest priority first.
static CONFIG_DIRS: &[&str] = &["/usr/lib", "/run", "/etc"];

#[derive(Debug, StructOpt)]
#[structopt(name = "mender-update-flow-control")]
struct CliOptions {
    /// Verbosity level (higher is more verbose).
    #[structopt(short = "v", parse(from_occurrences))]
    verbosity: u8,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            for cause in e.iter_causes() {
                eprintln!("  caused by: {}", cause);
            }
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Fallible<i32> {
    let opts = CliOptions::from_args();
    init_logging(opts.verbosity)?;
    info!("starting mender-update-flow-control");

    let settings = Settings::read_config(CONFIG_DIRS)?;
    let connector = Arc::new(DbusConnector::new(settings.dbus.clone()));

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let outcome = supervisor::run(&settings, connector, stdin.lock(), stdout.lock())?;

    // Fatal errors were already reported on the console.
    match outcome {
        Outcome::Quit => Ok(0),
        Outcome::Failed(_) => Ok(1),
    }
}

/// Initialize logging, raising this crate's level with verbosity.
fn init_logging(verbosity: u8) -> Fallible<()> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter(Some(module_path!()), level)
        .try_init()?;
    Ok(())
}
