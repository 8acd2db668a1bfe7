//! Chat commands: `/start`, `/status` and the status keyboard button.

use crate::access::AccessMap;
use crate::registry::Registry;

pub const STATUS_BUTTON: &str = "📊 Status";
pub const ACCESS_DENIED: &str = "❌ Access denied.";
pub const START_HINT: &str = "Press «📊 Status» to see the current state.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == STATUS_BUTTON {
            return Some(Command::Status);
        }
        // "/status@SomeBot arg" in group chats
        let word = text.split_whitespace().next()?;
        let command = word.split('@').next()?;
        match command {
            "/start" => Some(Command::Start),
            "/status" => Some(Command::Status),
            _ => None,
        }
    }
}

/// Reply text for a message from `user`, or `None` when the message is not a command.
pub async fn respond(registry: &Registry, access: &AccessMap, user: i64, text: &str) -> Option<String> {
    match Command::parse(text)? {
        Command::Start => Some(START_HINT.to_string()),
        Command::Status => match access.visible_to(user) {
            Some(visible) => Some(registry.status_for(visible).await),
            None => Some(ACCESS_DENIED.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckType, Target};
    use crate::registry::testing::scripted;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse(" /status "), Some(Command::Status));
        assert_eq!(Command::parse("/status@pulse_bot"), Some(Command::Status));
        assert_eq!(Command::parse("📊 Status"), Some(Command::Status));
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn status_respects_access() {
        let registry = scripted(&[("home", vec![]), ("office", vec![])]);
        let access = AccessMap::from_targets(&[Target {
            name: "office".into(),
            address: "office.example".into(),
            members: vec![7],
            check: CheckType::default(),
        }]);

        let reply = respond(&registry, &access, 7, "/status").await.unwrap();
        assert!(reply.contains("office"));
        assert!(!reply.contains("home"));

        let denied = respond(&registry, &access, 8, STATUS_BUTTON).await.unwrap();
        assert_eq!(denied, ACCESS_DENIED);

        assert_eq!(respond(&registry, &access, 8, "/start").await.unwrap(), START_HINT);
        assert!(respond(&registry, &access, 7, "what's up").await.is_none());
    }
}
