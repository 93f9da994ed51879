//! Scripted update control endpoint, for tests.

use super::{ControlEndpoint, Connector};
use crate::control_map::ControlMap;
use failure::Fallible;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A single observed `SetUpdateControlMap` call.
#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub(crate) at: Instant,
    pub(crate) map: ControlMap,
}

#[derive(Debug, Default)]
struct Script {
    connect_error: Option<String>,
    replies: VecDeque<Result<i32, String>>,
    default_reply: i32,
    calls: Vec<Call>,
}

/// Connector handing out endpoints which answer from a shared script.
///
/// Queued replies are consumed in order, then `default_reply` is used.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub(crate) fn new(default_reply: i32) -> Self {
        let script = Script {
            default_reply,
            ..Script::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub(crate) fn unreachable(reason: &str) -> Self {
        let connector = Self::new(1);
        connector.script.lock().unwrap().connect_error = Some(reason.to_string());
        connector
    }

    /// Queue a reply: a refresh timeout, or a transport error message.
    pub(crate) fn push_reply(&self, reply: Result<i32, &str>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(reply.map_err(String::from));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> Fallible<Box<dyn ControlEndpoint>> {
        if let Some(ref reason) = self.script.lock().unwrap().connect_error {
            bail!("{}", reason);
        }
        Ok(Box::new(ScriptedEndpoint {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedEndpoint {
    script: Arc<Mutex<Script>>,
}

impl ControlEndpoint for ScriptedEndpoint {
    fn set_update_control_map(&self, payload: &str) -> Fallible<i32> {
        let map: ControlMap = serde_json::from_str(payload)?;
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call {
            at: Instant::now(),
            map,
        });

        match script.replies.pop_front() {
            Some(Ok(timeout)) => Ok(timeout),
            Some(Err(msg)) => bail!("{}", msg),
            None => Ok(script.default_reply),
        }
    }
}
