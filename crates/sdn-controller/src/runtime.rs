//! Controller runtime
//!
//! A single task owns the [`Controller`]; switch events arrive over an mpsc
//! channel and the probe timer is a tokio interval, so the state machine is
//! never touched concurrently.

use sdn_common::{ControlCommand, ControllerEvent, Tenths};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::channel::ControlChannel;
use crate::config::ControllerConfig;
use crate::controller::Controller;

/// Monotonic controller clock in tenths of a millisecond
#[derive(Debug, Clone, Copy)]
pub struct ControllerClock {
    origin: Instant,
}

impl ControllerClock {
    /// Clock starting at zero now
    pub fn start() -> Self {
        Self { origin: Instant::now() }
    }

    /// Time since start
    pub fn now(&self) -> Tenths {
        Tenths((self.origin.elapsed().as_micros() / 100) as u64)
    }
}

/// Event loop driving a [`Controller`] over a [`ControlChannel`]
pub struct ControllerRuntime<C> {
    controller: Controller,
    channel: Arc<C>,
    events: mpsc::Receiver<ControllerEvent>,
    shutdown: watch::Receiver<bool>,
    probe_interval: Duration,
    teardown_on_exit: bool,
    clock: ControllerClock,
}

impl<C: ControlChannel> ControllerRuntime<C> {
    /// Create a runtime for `config`
    pub fn new(
        config: &ControllerConfig,
        channel: Arc<C>,
        events: mpsc::Receiver<ControllerEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            controller: Controller::new(config),
            channel,
            events,
            shutdown,
            probe_interval: config.probe_interval(),
            teardown_on_exit: config.teardown_on_exit,
            clock: ControllerClock::start(),
        }
    }

    /// Run until shutdown is signalled or every event sender is gone
    ///
    /// Returns the controller so callers can inspect the final state.
    pub async fn run(mut self) -> Controller {
        info!(interval_ms = self.probe_interval.as_millis() as u64, "controller running");

        let mut ticker = interval(self.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch(ControllerEvent::Tick).await;
                }

                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        info!("event channel closed");
                        break;
                    }
                },

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("shutdown requested");
                        break;
                    }
                }
            }
        }

        if self.teardown_on_exit {
            let commands = self.controller.teardown_all();
            info!(rules = commands.len(), "removing installed routes");
            self.send_all(commands).await;
        }
        self.controller
    }

    async fn dispatch(&mut self, event: ControllerEvent) {
        let now = self.clock.now();
        let commands = self.controller.handle(event, now);
        self.send_all(commands).await;
    }

    async fn send_all(&self, commands: Vec<ControlCommand>) {
        for command in commands {
            let target = command.target();
            if let Err(e) = self.channel.send(command).await {
                warn!(switch = %target.role, error = %e, "failed to send command");
            } else {
                debug!(switch = %target.role, "command sent");
            }
        }
    }
}
