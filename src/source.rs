//! Interactive control map source.
//!
//! Presents the catalog of control maps, forwards the selected one to the
//! refresh agent and watches for fatal errors reported back by it.

use crate::config::ConsoleSettings;
use crate::control_map::catalog::{self, Entry};
use crate::control_map::ControlMap;
use crate::mender::ControlError;
use failure::Fallible;
use futures::sync::mpsc;
use std::io::{BufRead, Write};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};

/// ANSI sequence clearing the terminal and homing the cursor.
static CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

/// How a source session ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// User asked to quit, or input ended.
    Quit,
    /// The refresh agent reported a fatal error.
    Failed(ControlError),
}

/// A parsed user reply.
#[derive(Debug)]
enum Selection {
    Quit,
    Map(&'static Entry),
    Unknown(String),
}

impl Selection {
    fn parse(reply: &str) -> Self {
        if reply.eq_ignore_ascii_case("q") {
            return Selection::Quit;
        }
        match catalog::lookup(reply) {
            Some(entry) => Selection::Map(entry),
            None => Selection::Unknown(reply.to_string()),
        }
    }
}

/// Menu-driven loop feeding the handoff queue.
pub(crate) struct SourceLoop<R, W> {
    input: R,
    output: W,
    handoff: mpsc::UnboundedSender<ControlMap>,
    errors: std_mpsc::Receiver<ControlError>,
    settings: ConsoleSettings,
    /// Last submitted map, for display only.
    displayed: ControlMap,
}

impl<R: BufRead, W: Write> SourceLoop<R, W> {
    pub(crate) fn new(
        input: R,
        output: W,
        handoff: mpsc::UnboundedSender<ControlMap>,
        errors: std_mpsc::Receiver<ControlError>,
        settings: ConsoleSettings,
    ) -> Self {
        Self {
            input,
            output,
            handoff,
            errors,
            settings,
            displayed: catalog::pause_all(),
        }
    }

    /// Run until the user quits or a fatal error is reported.
    pub(crate) fn run(mut self) -> Fallible<Outcome> {
        // Initialization errors show up here, before any menu.
        if let Some(err) = self.check_errors()? {
            return Ok(Outcome::Failed(err));
        }

        loop {
            self.show_menu()?;
            let reply = match self.ask("Choice? ")? {
                Some(r) => r,
                None => {
                    debug!("end of input, quitting");
                    return Ok(Outcome::Quit);
                }
            };

            match Selection::parse(&reply) {
                Selection::Quit => return Ok(Outcome::Quit),
                Selection::Map(entry) => self.submit(entry),
                Selection::Unknown(r) => writeln!(self.output, "Unknown option: {}", r)?,
            }

            if let Some(err) = self.check_errors()? {
                return Ok(Outcome::Failed(err));
            }
        }
    }

    fn submit(&mut self, entry: &Entry) {
        trace!("submitting control map '{}'", entry.key);
        if self.handoff.unbounded_send(entry.map.clone()).is_err() {
            warn!("handoff queue closed, control map not submitted");
        }
        self.displayed = entry.map.clone();
    }

    /// Wait a bounded time for a fatal error, reporting it if any.
    fn check_errors(&mut self) -> Fallible<Option<ControlError>> {
        match self.errors.recv_timeout(self.settings.error_wait) {
            Ok(err) => {
                writeln!(self.output, "ERROR: {}", err)?;
                self.output.flush()?;
                Ok(Some(err))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => bail!("refresh agent exited unexpectedly"),
        }
    }

    fn show_menu(&mut self) -> Fallible<()> {
        if self.settings.clear_screen {
            write!(self.output, "{}", CLEAR_SCREEN)?;
        }
        writeln!(self.output, "Current map is:")?;
        writeln!(self.output, "{}", self.displayed)?;
        writeln!(self.output, "-----------------------")?;
        writeln!(self.output, "What do you want to do?")?;
        for entry in catalog::entries() {
            writeln!(self.output, "  {}) {}", entry.key, entry.description)?;
        }
        writeln!(self.output, "  q) Quit")?;
        Ok(())
    }

    /// Prompt for a reply. Returns `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Fallible<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        writeln!(self.output)?;
        Ok(Some(line.trim().to_string()))
    }
}
