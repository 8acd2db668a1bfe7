use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "8.8.8.8";
pub const DEFAULT_TARGET_NAME: &str = "default";
/// Pause between unanswered echo requests of one ping check.
pub const ECHO_RETRY_GAP: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_confirmation_secs")]
    pub confirmation_secs: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Target {
    pub name: String,
    pub address: String,
    /// Chat ids allowed to see this target and receive its alerts.
    #[serde(default)]
    pub members: Vec<i64>,
    #[serde(default)]
    pub check: CheckType,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Bot token; normally supplied through `BOT_TOKEN`.
    #[serde(default, skip_serializing)]
    pub bot_token: Option<String>,
    #[serde(default = "default_true")]
    pub commands: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum CheckType {
    Ping {
        #[serde(default = "default_ping_count")]
        count: u32,
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
        /// Ports tried over TCP when ICMP gets no answer.
        #[serde(default)]
        tcp_fallback: Vec<u16>,
    },
    TcpPort {
        port: u16,
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
}

impl CheckType {
    /// Longest a single check can take before giving up on its own.
    pub fn worst_case(&self) -> Duration {
        match self {
            CheckType::Ping { count, timeout_ms, tcp_fallback } => {
                let timeout = Duration::from_millis(*timeout_ms);
                let mut total = timeout * *count + ECHO_RETRY_GAP * count.saturating_sub(1);
                // fallback ports are tried concurrently
                if !tcp_fallback.is_empty() {
                    total += timeout;
                }
                total
            }
            CheckType::TcpPort { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: None, commands: true }
    }
}

impl Default for CheckType {
    fn default() -> Self {
        CheckType::Ping {
            count: default_ping_count(),
            timeout_ms: default_timeout(),
            tcp_fallback: Vec::new(),
        }
    }
}

fn default_check_interval() -> u64 { 3 }
fn default_confirmation_secs() -> u64 { 15 }
fn default_probe_timeout_ms() -> u64 { 5000 }
fn default_api_port() -> u16 { 3000 }
fn default_true() -> bool { true }
pub fn default_ping_count() -> u32 { 1 }
pub fn default_timeout() -> u64 { 2000 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            check_interval: default_check_interval(),
            confirmation_secs: default_confirmation_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            api_port: default_api_port(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Reads the JSON file if present, applies the process environment and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_json(&content)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config")
    }

    /// Overlays environment values. `lookup` is injected so tests don't touch the real env.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = parse_env(&lookup, "PING_INTERVAL")? {
            self.check_interval = v;
        }
        if let Some(v) = parse_env(&lookup, "STATE_CONFIRMATION")? {
            self.confirmation_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "PROBE_TIMEOUT_MS")? {
            self.probe_timeout_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "API_PORT")? {
            self.api_port = v;
        }
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.bot_token = Some(token);
        }

        if self.targets.is_empty() {
            let address = lookup("TARGET_IP").unwrap_or_else(|| DEFAULT_TARGET.to_string());
            let members = parse_env::<i64>(&lookup, "CHAT_ID")?
                .filter(|id| *id != 0)
                .into_iter()
                .collect();
            self.targets.push(Target {
                name: DEFAULT_TARGET_NAME.to_string(),
                address,
                members,
                check: CheckType::default(),
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval == 0 {
            bail!("check_interval must be greater than zero");
        }
        if self.confirmation_secs == 0 {
            bail!("confirmation_secs must be greater than zero");
        }
        if self.probe_timeout_ms == 0 {
            bail!("probe_timeout_ms must be greater than zero");
        }
        if self.targets.is_empty() {
            bail!("no targets configured");
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                bail!("target with address '{}' has an empty name", target.address);
            }
            if target.address.trim().is_empty() {
                bail!("target '{}' has an empty address", target.name);
            }
            if !seen.insert(target.name.as_str()) {
                bail!("duplicate target name '{}'", target.name);
            }
            match &target.check {
                CheckType::Ping { count: 0, .. } => {
                    bail!("target '{}': ping count must be at least 1", target.name)
                }
                CheckType::TcpPort { port: 0, .. } => {
                    bail!("target '{}': TCP port must be non-zero", target.name)
                }
                _ => {}
            }
            let needed = target.check.worst_case();
            if needed > self.probe_timeout() {
                bail!(
                    "target '{}': check may take {} ms, longer than probe_timeout_ms ({})",
                    target.name,
                    needed.as_millis(),
                    self.probe_timeout_ms
                );
            }
        }

        let has_members = self.targets.iter().any(|t| !t.members.is_empty());
        if has_members && self.telegram.bot_token.is_none() {
            bail!("targets list alert recipients but BOT_TOKEN is not set");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn confirmation(&self) -> Duration {
        Duration::from_secs(self.confirmation_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        None => Ok(None),
    }
}
