use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::models::{Status, StatusSnapshot, Transition};
use crate::notify::Notifier;
use crate::probe::Probe;
use crate::report;
use crate::state::Tracker;

/// Watches one target: probes it, debounces the results and keeps up/down totals.
pub struct Monitor {
    name: String,
    address: String,
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
    tracker: Mutex<Tracker>,
}

impl Monitor {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        probe: Arc<dyn Probe>,
        probe_timeout: Duration,
        confirm_after: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            probe,
            probe_timeout,
            tracker: Mutex::new(Tracker::new(confirm_after)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the probe under the monitor's own deadline. Overruns count as down.
    async fn check(&self) -> Status {
        match tokio::time::timeout(self.probe_timeout, self.probe.probe(&self.address)).await {
            Ok(reachable) => Status::from(reachable),
            Err(_) => {
                debug!(monitor = %self.name, "Probe timed out");
                Status::Down
            }
        }
    }

    /// One probe cycle. Returns the confirmed transition, if this cycle produced one.
    pub async fn tick(&self) -> Option<Transition> {
        let started = Instant::now();
        let observed = self.check().await;

        let transition = {
            let mut tracker = self.tracker.lock().await;
            let before = tracker.pending();
            let transition = tracker.observe(observed, started);
            if before.is_some() && before != tracker.pending() {
                debug!(monitor = %self.name, observed = %observed, "Pending state changed");
            }
            transition
        }?;

        match &transition {
            Transition::Initial { status } => {
                info!(monitor = %self.name, status = %status, "Initial state confirmed");
            }
            Transition::Changed { status: Status::Down, lasted, .. } => {
                error!(monitor = %self.name, up_for = lasted.as_secs(), "[CHANGE] {} -> DOWN", self.address);
            }
            Transition::Changed { status: Status::Up, lasted, .. } => {
                warn!(monitor = %self.name, down_for = lasted.as_secs(), "[CHANGE] {} -> UP", self.address);
            }
        }

        Some(transition)
    }

    /// Probes forever on a fixed cadence. Never returns on its own.
    ///
    /// Alerts go through a queue drained by a single delivery task, so a slow
    /// notifier never delays probing and messages keep their order.
    pub async fn run(self: Arc<Self>, notifier: Arc<dyn Notifier>, interval: Duration) {
        info!(monitor = %self.name, address = %self.address, "Monitoring started");
        let (alerts, queue) = mpsc::unbounded_channel();
        tokio::spawn(deliver(self.name.clone(), queue, notifier));

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(transition) = self.tick().await {
                let message = report::transition_message(&self.name, &transition);
                if alerts.send(message).is_err() {
                    warn!(monitor = %self.name, "Alert queue closed, notification dropped");
                }
            }
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let tracker = self.tracker.lock().await;
        let reading = tracker.reading(Instant::now());
        drop(tracker);

        match reading {
            Some(r) => StatusSnapshot {
                name: self.name.clone(),
                address: self.address.clone(),
                state: Some(r.status),
                since: chrono::Duration::from_std(r.elapsed).ok().map(|d| Utc::now() - d),
                elapsed: r.elapsed,
                total_up: r.total_up,
                total_down: r.total_down,
            },
            None => StatusSnapshot {
                name: self.name.clone(),
                address: self.address.clone(),
                state: None,
                since: None,
                elapsed: Duration::ZERO,
                total_up: Duration::ZERO,
                total_down: Duration::ZERO,
            },
        }
    }

    /// Human-readable report of the current state.
    pub async fn status(&self) -> String {
        report::status_report(&self.snapshot().await)
    }
}

/// Hands queued alerts to the notifier one at a time until the monitor goes away.
async fn deliver(name: String, mut queue: mpsc::UnboundedReceiver<String>, notifier: Arc<dyn Notifier>) {
    while let Some(message) = queue.recv().await {
        notifier.notify(&name, &message).await;
    }
    debug!(monitor = %name, "Alert delivery stopped");
}
