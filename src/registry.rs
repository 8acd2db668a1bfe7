use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::MonitorConfig;
use crate::engine::Monitor;
use crate::models::StatusSnapshot;
use crate::notify::Notifier;
use crate::probe::ProbeFactory;

pub const STATUS_SEPARATOR: &str = "\n\n";

/// Fixed, ordered set of monitors built once at startup.
pub struct Registry {
    monitors: Vec<Arc<Monitor>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn from_config(config: &MonitorConfig, probes: &mut ProbeFactory) -> Result<Self> {
        let monitors = config
            .targets
            .iter()
            .map(|target| {
                let probe = probes.build(&target.check)?;
                Ok(Arc::new(Monitor::new(
                    target.name.clone(),
                    target.address.clone(),
                    probe,
                    config.probe_timeout(),
                    config.confirmation(),
                )))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(monitors))
    }

    /// Later duplicates are shadowed by the first monitor with the same name.
    pub fn new(monitors: Vec<Arc<Monitor>>) -> Self {
        let mut index = HashMap::with_capacity(monitors.len());
        for (i, monitor) in monitors.iter().enumerate() {
            index.entry(monitor.name().to_string()).or_insert(i);
        }
        Self { monitors, index }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Monitor>> {
        self.index.get(name).map(|&i| &self.monitors[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Monitor>> {
        self.monitors.iter()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub async fn status_of(&self, name: &str) -> Option<String> {
        match self.get(name) {
            Some(monitor) => Some(monitor.status().await),
            None => None,
        }
    }

    /// Reports for every monitor whose name is in `visible`, in registry order.
    pub async fn status_for(&self, visible: &[String]) -> String {
        let mut parts = Vec::new();
        for monitor in self.iter().filter(|m| visible.iter().any(|v| v == m.name())) {
            parts.push(monitor.status().await);
        }
        parts.join(STATUS_SEPARATOR)
    }

    pub async fn snapshots(&self) -> Vec<StatusSnapshot> {
        let mut out = Vec::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            out.push(monitor.snapshot().await);
        }
        out
    }

    /// Starts one independent probe loop per monitor.
    pub fn spawn(&self, notifier: Arc<dyn Notifier>, interval: Duration) -> Vec<JoinHandle<()>> {
        info!(monitors = self.monitors.len(), interval_secs = interval.as_secs(), "Starting probe loops");
        self.monitors
            .iter()
            .map(|monitor| tokio::spawn(Arc::clone(monitor).run(Arc::clone(&notifier), interval)))
            .collect()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::probe::testing::ScriptedProbe;

    pub fn scripted(targets: &[(&str, Vec<bool>)]) -> Registry {
        Registry::new(
            targets
                .iter()
                .map(|(name, script)| {
                    Arc::new(Monitor::new(
                        *name,
                        format!("{name}.example"),
                        Arc::new(ScriptedProbe::new(script.clone())),
                        Duration::from_secs(2),
                        Duration::from_secs(5),
                    ))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::scripted;
    use super::*;
    use crate::config::CheckType;
    use crate::notify::testing::RecordingNotifier;
    use tokio::time::Instant;

    #[test]
    fn lookup_preserves_config_order() {
        let registry = scripted(&[("b", vec![]), ("a", vec![]), ("c", vec![])]);
        let names: Vec<_> = registry.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(registry.get("a").unwrap().name(), "a");
        assert!(registry.get("zzz").is_none());
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn builds_from_config() {
        let config = MonitorConfig::from_json(
            r#"{"targets": [
                {"name": "web", "address": "127.0.0.1", "check": {"type": "TcpPort", "port": 8080}},
                {"name": "db", "address": "127.0.0.1", "check": {"type": "TcpPort", "port": 5432}}
            ]}"#,
        )
        .unwrap();
        let registry = Registry::from_config(&config, &mut ProbeFactory::new()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("db").is_some());
        assert!(matches!(config.targets[0].check, CheckType::TcpPort { port: 8080, .. }));
    }

    #[tokio::test]
    async fn status_for_filters_and_joins() {
        let registry = scripted(&[("home", vec![]), ("office", vec![]), ("cottage", vec![])]);
        let report = registry
            .status_for(&["cottage".to_string(), "home".to_string()])
            .await;
        let parts: Vec<_> = report.split(STATUS_SEPARATOR).collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("home"));
        assert!(parts[1].contains("cottage"));
        assert!(registry.status_of("office").await.is_some());
        assert!(registry.status_of("missing").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn monitors_run_independently() {
        let mut flaky = vec![true; 8];
        flaky.extend([false; 20]);
        let registry = scripted(&[("steady", vec![true; 30]), ("flaky", flaky)]);
        let notifier = Arc::new(RecordingNotifier::default());
        let t0 = Instant::now();
        let handles = registry.spawn(notifier.clone(), Duration::from_secs(1));

        tokio::time::sleep_until(t0 + Duration::from_millis(14_500)).await;
        let sent = notifier.messages().await;
        let steady: Vec<_> = sent.iter().filter(|(n, _)| n == "steady").collect();
        let flaky: Vec<_> = sent.iter().filter(|(n, _)| n == "flaky").collect();
        assert_eq!(steady.len(), 1);
        assert_eq!(flaky.len(), 2);
        assert!(flaky[0].1.contains("initial state"));
        assert!(flaky[1].1.contains("went DOWN"));

        let snapshots = registry.snapshots().await;
        assert_eq!(snapshots[0].name, "steady");
        assert_eq!(snapshots[1].total_up.as_secs(), 8);

        for handle in handles {
            handle.abort();
        }
    }
}
