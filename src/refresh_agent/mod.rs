//! Control map refresh state-machine.

mod agent;

pub(crate) use agent::RefreshAgent;
