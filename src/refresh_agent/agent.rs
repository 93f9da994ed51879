//! Refresh agent.

use crate::config::RefreshSettings;
use crate::control_map::{catalog, ControlMap};
use crate::mender::{self, ApplyError, ControlError, DbusClient};
use actix::prelude::*;
use futures::prelude::*;
use futures::sync::{mpsc, oneshot};
use std::sync::mpsc as std_mpsc;
use std::time::Instant;

/// Actor keeping a control map alive on the Mender client.
pub(crate) struct RefreshAgent {
    settings: RefreshSettings,
    client: Addr<DbusClient>,
    state: AgentState,
    handoff: Option<mpsc::UnboundedReceiver<ControlMap>>,
    cancel: Option<oneshot::Receiver<()>>,
    errors: std_mpsc::Sender<ControlError>,
    refresh_timer: Option<SpawnHandle>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AgentState {
    /// Initial state upon actor start.
    Initializing,
    /// A control map is installed and kept alive.
    Running {
        current: ControlMap,
        next_refresh: Instant,
    },
    /// A fatal error was reported, actor is stopping.
    Terminated,
}

impl RefreshAgent {
    pub(crate) fn new(
        settings: RefreshSettings,
        client: Addr<DbusClient>,
        handoff: mpsc::UnboundedReceiver<ControlMap>,
        errors: std_mpsc::Sender<ControlError>,
        cancel: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            settings,
            client,
            state: AgentState::Initializing,
            handoff: Some(handoff),
            cancel: Some(cancel),
            errors,
            refresh_timer: None,
        }
    }
}

impl Actor for RefreshAgent {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        trace!("refresh agent started");

        // Stop on explicit cancellation, or once the canceller goes away.
        if let Some(cancel) = self.cancel.take() {
            let cancellation =
                actix::fut::wrap_future::<_, Self>(cancel).then(|_res, _actor, ctx| {
                    debug!("refresh agent cancelled");
                    ctx.stop();
                    actix::fut::ok(())
                });
            ctx.spawn(cancellation);
        }

        self.try_initialize(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        trace!("refresh agent stopped, state: {:?}", self.state);
        System::current().stop();
    }
}

impl StreamHandler<ControlMap, ()> for RefreshAgent {
    fn handle(&mut self, map: ControlMap, ctx: &mut Self::Context) {
        info!("replacing control map '{}'", map.id());
        self.try_apply(map, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!("handoff queue closed, keeping current control map alive");
    }
}

impl RefreshAgent {
    /// Acquire the endpoint and install the fail-safe map.
    fn try_initialize(&mut self, ctx: &mut Context<Self>) {
        let client = self.client.clone();
        let fallback = self.settings.fallback_timeout;
        let pause_all = catalog::pause_all();

        let first_map = pause_all.clone();
        let init = mender::connect(&self.client)
            .map_err(move |error| ApplyError {
                error,
                retry_after: fallback,
            })
            .and_then(move |_| mender::apply(&client, first_map, fallback));

        let initialization = actix::fut::wrap_future::<_, Self>(init).then(|res, actor, ctx| {
            actor.on_applied(pause_all, res, ctx);
            actix::fut::ok(())
        });

        // Nothing else runs until the first map is in place.
        ctx.wait(initialization);
    }

    /// Install `map`, replacing the current one on success.
    fn try_apply(&mut self, map: ControlMap, ctx: &mut Context<Self>) {
        if self.state == AgentState::Terminated {
            trace!("agent terminated, dropping control map '{}'", map.id());
            return;
        }

        let req = mender::apply(&self.client, map.clone(), self.settings.fallback_timeout);

        let applied = actix::fut::wrap_future::<_, Self>(req).then(|res, actor, ctx| {
            actor.on_applied(map, res, ctx);
            actix::fut::ok(())
        });

        ctx.wait(applied);
    }

    /// Set the current map again, ahead of its expiry.
    fn try_refresh(&mut self, ctx: &mut Context<Self>) {
        let (current, due) = match self.state {
            AgentState::Running {
                ref current,
                next_refresh,
            } => (current.clone(), next_refresh),
            _ => return,
        };

        debug!(
            "refreshing control map '{}' ({:?} after deadline)",
            current.id(),
            Instant::now().saturating_duration_since(due)
        );
        self.try_apply(current, ctx);
    }

    fn on_applied(
        &mut self,
        map: ControlMap,
        res: Result<u32, ApplyError>,
        ctx: &mut Context<Self>,
    ) {
        let refresh_timeout = match res {
            Ok(t) => t,
            Err(e) => return self.terminate(e, ctx),
        };

        if self.state == AgentState::Initializing {
            info!("initial control map set, accepting replacements");
            // Registered ahead of the first deadline timer, so that a pending
            // replacement is always handled before a concurrent refresh.
            if let Some(handoff) = self.handoff.take() {
                ctx.add_stream(handoff);
            }
        }

        let delay = self.settings.refresh_delay(refresh_timeout);
        trace!(
            "control map '{}' (priority {}) set, refresh_timeout={}, next refresh in {:?}",
            map.id(),
            map.priority(),
            refresh_timeout,
            delay
        );
        self.state = AgentState::Running {
            current: map,
            next_refresh: Instant::now() + delay,
        };
        self.schedule_refresh(delay, ctx);
    }

    /// Replace any pending refresh with one firing after `delay`.
    fn schedule_refresh(&mut self, delay: std::time::Duration, ctx: &mut Context<Self>) {
        if let Some(handle) = self.refresh_timer.take() {
            ctx.cancel_future(handle);
        }

        let handle = ctx.run_later(delay, |actor, ctx| {
            actor.refresh_timer = None;
            actor.try_refresh(ctx);
        });
        self.refresh_timer = Some(handle);
    }

    /// Report a fatal error and stop.
    fn terminate(&mut self, failure: ApplyError, ctx: &mut Context<Self>) {
        error!("{}", failure.error);
        debug!(
            "fallback refresh would be due in {:?}, not retrying",
            self.settings.refresh_delay(failure.retry_after)
        );

        self.state = AgentState::Terminated;
        if self.errors.send(failure.error).is_err() {
            debug!("error channel closed, nobody to report to");
        }
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mender::mock::ScriptedConnector;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn settings(unit_ms: u64) -> RefreshSettings {
        RefreshSettings {
            time_unit: Duration::from_millis(unit_ms),
            fallback_timeout: mender::FALLBACK_REFRESH_TIMEOUT,
            safety_margin: 1,
        }
    }

    fn catalog_map(key: &str) -> ControlMap {
        catalog::lookup(key).unwrap().map.clone()
    }

    /// Run an agent with `handoff` already queued, cancelling it after `stop_after`.
    ///
    /// Returns all errors published by the agent.
    fn run_agent(
        connector: &ScriptedConnector,
        unit_ms: u64,
        handoff: Vec<ControlMap>,
        stop_after: Duration,
    ) -> Vec<ControlError> {
        let (map_tx, map_rx) = mpsc::unbounded();
        for map in handoff {
            map_tx.unbounded_send(map).unwrap();
        }
        let (err_tx, err_rx) = std_mpsc::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let canceller = thread::spawn(move || {
            thread::sleep(stop_after);
            let _ = cancel_tx.send(());
        });

        let sys = System::new("refresh-agent-test");
        let worker = connector.clone();
        let client = SyncArbiter::start(1, move || DbusClient::new(Arc::new(worker.clone())));
        let _agent =
            RefreshAgent::new(settings(unit_ms), client, map_rx, err_tx, cancel_rx).start();
        sys.run();

        canceller.join().unwrap();
        drop(map_tx);
        err_rx.try_iter().collect()
    }

    #[test]
    fn pause_all_first_then_refresh() {
        let connector = ScriptedConnector::new(10);

        let errors = run_agent(&connector, 20, vec![], Duration::from_millis(280));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        // Initial set, then one refresh 9 units (180ms) later.
        let calls = connector.calls();
        assert_eq!(calls.len(), 2, "calls: {:?}", calls);
        assert_eq!(calls[0].map, catalog::pause_all());
        assert_eq!(calls[1].map, catalog::pause_all());
        let gap = calls[1].at.duration_since(calls[0].at);
        assert!(gap >= Duration::from_millis(175), "refreshed too early: {:?}", gap);
    }

    #[test]
    fn replacement_reschedules_refresh() {
        let connector = ScriptedConnector::new(15);
        connector.push_reply(Ok(100)).push_reply(Ok(15));

        let install = catalog_map("1");
        let errors = run_agent(&connector, 20, vec![install.clone()], Duration::from_millis(420));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let calls = connector.calls();
        let maps: Vec<_> = calls.iter().map(|c| c.map.clone()).collect();
        assert_eq!(maps, vec![catalog::pause_all(), install.clone(), install]);
        let gap = calls[2].at.duration_since(calls[1].at);
        assert!(gap >= Duration::from_millis(275), "refreshed too early: {:?}", gap);
    }

    #[test]
    fn handoff_applied_in_order() {
        let connector = ScriptedConnector::new(100);
        let sent = vec![catalog_map("1"), catalog_map("2"), catalog_map("3")];

        let errors = run_agent(&connector, 20, sent.clone(), Duration::from_millis(150));
        assert!(errors.is_empty());

        let maps: Vec<_> = connector.calls().into_iter().map(|c| c.map).collect();
        let mut expected = vec![catalog::pause_all()];
        expected.extend(sent);
        assert_eq!(maps, expected);
    }

    #[test]
    fn handoff_beats_due_refresh() {
        let connector = ScriptedConnector::new(100);
        // No margin left, the refresh is due right after the initial set.
        connector.push_reply(Ok(1));

        let install = catalog_map("1");
        let errors = run_agent(&connector, 20, vec![install.clone()], Duration::from_millis(150));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        // The replacement goes first and re-arms the deadline.
        let maps: Vec<_> = connector.calls().into_iter().map(|c| c.map).collect();
        assert_eq!(maps, vec![catalog::pause_all(), install]);
    }

    #[test]
    fn same_map_applied_twice() {
        let connector = ScriptedConnector::new(100);
        let install = catalog_map("1");

        let sent = vec![install.clone(), install.clone()];
        let errors = run_agent(&connector, 20, sent, Duration::from_millis(150));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let maps: Vec<_> = connector.calls().into_iter().map(|c| c.map).collect();
        assert_eq!(maps, vec![catalog::pause_all(), install.clone(), install]);
    }

    #[test]
    fn initial_transport_error() {
        let connector = ScriptedConnector::new(100);
        connector.push_reply(Err("org.freedesktop.DBus.Error.ServiceUnknown"));

        let errors = run_agent(&connector, 20, vec![catalog_map("1")], Duration::from_millis(100));
        assert_eq!(
            errors,
            vec![ControlError::Transport(
                "org.freedesktop.DBus.Error.ServiceUnknown".to_string()
            )]
        );
        assert_eq!(connector.calls().len(), 1);
    }

    #[test]
    fn unreachable_endpoint() {
        let connector = ScriptedConnector::unreachable("no system bus");

        let errors = run_agent(&connector, 20, vec![], Duration::from_millis(100));
        assert_eq!(
            errors,
            vec![ControlError::Acquisition("no system bus".to_string())]
        );
        assert!(connector.calls().is_empty());
    }

    #[test]
    fn zero_timeout_on_replacement() {
        let connector = ScriptedConnector::new(100);
        connector.push_reply(Ok(100)).push_reply(Ok(0));

        let sent = vec![catalog_map("1"), catalog_map("2")];
        let errors = run_agent(&connector, 20, sent, Duration::from_millis(150));
        assert_eq!(errors, vec![ControlError::ProtocolViolation(0)]);

        // The queued reboot map is never sent.
        let maps: Vec<_> = connector.calls().into_iter().map(|c| c.map).collect();
        assert_eq!(maps, vec![catalog::pause_all(), catalog_map("1")]);
    }

    #[test]
    fn transport_error_on_refresh() {
        let connector = ScriptedConnector::new(100);
        // A one-unit timeout leaves no margin, the refresh is immediate.
        connector.push_reply(Ok(1)).push_reply(Err("connection reset"));

        let errors = run_agent(&connector, 20, vec![], Duration::from_millis(150));
        assert_eq!(
            errors,
            vec![ControlError::Transport("connection reset".to_string())]
        );
        assert_eq!(connector.calls().len(), 2);
    }
}
