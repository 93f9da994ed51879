//! Wiring between the control map source and the refresh agent.
//!
//! The refresh agent runs in its own thread and actix system, with the
//! blocking D-Bus worker next to it. The source loop runs on the caller's
//! thread. Once the source is done, the refresh agent is cancelled and its
//! thread joined.

use crate::config::Settings;
use crate::mender::{Connector, DbusClient};
use crate::refresh_agent::RefreshAgent;
use crate::source::{Outcome, SourceLoop};
use actix::prelude::*;
use failure::{Fallible, ResultExt};
use futures::sync::{mpsc, oneshot};
use std::io::{BufRead, Write};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;

/// Run a full control session, until the source ends or a fatal error.
pub(crate) fn run<R, W>(
    settings: &Settings,
    connector: Arc<dyn Connector>,
    input: R,
    output: W,
) -> Fallible<Outcome>
where
    R: BufRead,
    W: Write,
{
    let (handoff_tx, handoff_rx) = mpsc::unbounded();
    let (errors_tx, errors_rx) = std_mpsc::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let refresh_settings = settings.refresh.clone();
    let refresh_thread = thread::Builder::new()
        .name("refresh".to_string())
        .spawn(move || {
            let sys = System::new("refresh");
            let client = SyncArbiter::start(1, move || DbusClient::new(Arc::clone(&connector)));
            let _agent =
                RefreshAgent::new(refresh_settings, client, handoff_rx, errors_tx, cancel_rx)
                    .start();
            sys.run();
            trace!("refresh system terminated");
        })
        .context("failed to spawn refresh thread")?;

    let source = SourceLoop::new(
        input,
        output,
        handoff_tx,
        errors_rx,
        settings.console.clone(),
    );
    let outcome = source.run();

    // The agent may already be gone after a fatal error.
    if cancel_tx.send(()).is_err() {
        trace!("refresh agent already stopped");
    }
    if refresh_thread.join().is_err() {
        bail!("refresh thread panicked");
    }

    outcome
}
