//! Update Control Maps.
//!
//! An Update Control Map tells the Mender client which states of its
//! update state-machine to pause at, and which ones to continue through.
//! Maps are built once and then only ever replaced as a whole.

pub(crate) mod catalog;

use failure::{Fallible, ResultExt};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Action the Mender client takes when entering a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Action {
    Pause,
    Continue,
}

/// Per-state entry of a control map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StateAction {
    pub(crate) action: Action,
}

/// Update Control Map, as accepted by `io.mender.Update1.SetUpdateControlMap`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ControlMap {
    priority: i32,
    states: BTreeMap<String, StateAction>,
    id: Uuid,
}

impl ControlMap {
    /// Start a map with no state entries.
    pub(crate) fn new(priority: i32, id: Uuid) -> Self {
        Self {
            priority,
            states: BTreeMap::new(),
            id,
        }
    }

    /// Add (or overwrite) the action for `state`.
    pub(crate) fn with_state(mut self, state: &str, action: Action) -> Self {
        self.states.insert(state.to_string(), StateAction { action });
        self
    }

    pub(crate) fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Action configured for `state`, if any.
    #[cfg(test)]
    pub(crate) fn action(&self, state: &str) -> Option<Action> {
        self.states.get(state).map(|s| s.action)
    }

    /// Serialize to the JSON payload sent over D-Bus.
    pub(crate) fn to_payload(&self) -> Fallible<String> {
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize control map")?;
        Ok(payload)
    }
}

impl fmt::Display for ControlMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_payload() {
            Ok(payload) => f.write_str(&payload),
            Err(_) => write!(f, "<control map {}>", self.id),
        }
    }
}
