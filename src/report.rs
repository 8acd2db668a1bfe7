use std::time::Duration;

use crate::models::{Status, StatusSnapshot, Transition};

/// Formats whole seconds as `H:MM:SS`, prefixed with a day count past 24h.
pub fn fmt_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let rem = total % 86_400;
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

fn icon(status: Status) -> &'static str {
    match status {
        Status::Up => "🟢",
        Status::Down => "🔴",
    }
}

fn label(status: Status) -> &'static str {
    match status {
        Status::Up => "Reachable",
        Status::Down => "Unreachable",
    }
}

pub fn transition_message(name: &str, transition: &Transition) -> String {
    match transition {
        Transition::Initial { status } => format!(
            "ℹ️ {name}: initial state after startup\n\n{} {}",
            icon(*status),
            label(*status)
        ),
        Transition::Changed { status, previous, lasted, total_up, total_down } => {
            let headline = match status {
                Status::Up => format!("✅ {name} is back UP"),
                Status::Down => format!("🚨 {name} went DOWN"),
            };
            format!(
                "{headline}\n\n⏱ Was {} for: {}\n\n📊 Overall:\n🟢 Up:   {}\n🔴 Down: {}",
                label(*previous).to_lowercase(),
                fmt_duration(*lasted),
                fmt_duration(*total_up),
                fmt_duration(*total_down),
            )
        }
    }
}

pub fn status_report(snapshot: &StatusSnapshot) -> String {
    let Some(state) = snapshot.state else {
        return format!("ℹ️ {}: state not determined yet, wait a few seconds…", snapshot.name);
    };
    format!(
        "📡 {} ({})\n\n{} NOW: {}\n⏱ For: {}\n\n📊 Total up:   {}\n📊 Total down: {}",
        snapshot.name,
        snapshot.address,
        icon(state),
        label(state),
        fmt_duration(snapshot.elapsed),
        fmt_duration(snapshot.total_up),
        fmt_duration(snapshot.total_down),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_like_clock() {
        assert_eq!(fmt_duration(Duration::ZERO), "0:00:00");
        assert_eq!(fmt_duration(Duration::from_millis(59_999)), "0:00:59");
        assert_eq!(fmt_duration(Duration::from_secs(3_725)), "1:02:05");
        assert_eq!(fmt_duration(Duration::from_secs(86_405)), "1 day, 0:00:05");
        assert_eq!(fmt_duration(Duration::from_secs(3 * 86_400 + 36_000)), "3 days, 10:00:00");
    }

    #[test]
    fn transition_message_carries_closed_duration_and_totals() {
        let msg = transition_message(
            "home",
            &Transition::Changed {
                status: Status::Down,
                previous: Status::Up,
                lasted: Duration::from_secs(10),
                total_up: Duration::from_secs(70),
                total_down: Duration::from_secs(5),
            },
        );
        assert!(msg.starts_with("🚨 home went DOWN"));
        assert!(msg.contains("Was reachable for: 0:00:10"));
        assert!(msg.contains("🟢 Up:   0:01:10"));
        assert!(msg.contains("🔴 Down: 0:00:05"));
    }

    #[test]
    fn initial_message_differs_from_transition() {
        let msg = transition_message("home", &Transition::Initial { status: Status::Up });
        assert!(msg.contains("initial state"));
        assert!(msg.contains("🟢 Reachable"));
        assert!(!msg.contains("Overall"));
    }

    #[test]
    fn undetermined_status() {
        let snapshot = StatusSnapshot {
            name: "office".into(),
            address: "10.0.0.1".into(),
            state: None,
            since: None,
            elapsed: Duration::ZERO,
            total_up: Duration::ZERO,
            total_down: Duration::ZERO,
        };
        assert!(status_report(&snapshot).contains("not determined yet"));
    }
}
