//! Telegram Bot API: alert delivery and the command long-poll loop.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::access::AccessMap;
use crate::commands::{self, STATUS_BUTTON};
use crate::config::Target;
use crate::notify::{NotifyError, Notifier};
use crate::registry::Registry;

pub const API_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, NotifyError> {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base, method))
            .timeout(timeout)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(NotifyError::Api(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    /// Sends `text`, optionally attaching the persistent status keyboard.
    pub async fn send_message(&self, chat_id: i64, text: &str, keyboard: bool) -> Result<(), NotifyError> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if keyboard {
            payload["reply_markup"] = json!({
                "keyboard": [[{ "text": STATUS_BUTTON }]],
                "resize_keyboard": true,
                "one_time_keyboard": false,
                "selective": true,
            });
        }
        self.call::<serde_json::Value>("sendMessage", payload, SEND_TIMEOUT)
            .await
            .map(|_| ())
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, NotifyError> {
        let mut payload = json!({ "timeout": timeout_secs, "allowed_updates": ["message"] });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload, Duration::from_secs(timeout_secs) + SEND_TIMEOUT)
            .await
    }
}

/// Delivers each alert to every member chat of the target.
pub struct TelegramNotifier {
    client: TelegramClient,
    recipients: HashMap<String, Vec<i64>>,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, targets: &[Target]) -> Self {
        let recipients = targets
            .iter()
            .map(|t| (t.name.clone(), t.members.clone()))
            .collect();
        Self { client, recipients }
    }

    async fn deliver(&self, target: &str, message: &str) -> Result<usize, NotifyError> {
        let chats = self
            .recipients
            .get(target)
            .filter(|chats| !chats.is_empty())
            .ok_or_else(|| NotifyError::NoRecipients(target.to_string()))?;

        let mut delivered = 0;
        for &chat_id in chats {
            match self.client.send_message(chat_id, message, false).await {
                Ok(()) => delivered += 1,
                Err(e) => error!(monitor = %target, chat_id, error = %e, "Failed to send notification"),
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, target: &str, message: &str) {
        match self.deliver(target, message).await {
            Ok(0) => warn!(monitor = %target, "Notification not delivered to any member"),
            Ok(delivered) => debug!(monitor = %target, delivered, "Notification sent"),
            Err(e) => warn!(monitor = %target, error = %e, "Notification dropped"),
        }
    }
}

/// Answers chat commands until the process exits. API failures are retried after a pause.
pub async fn poll_commands(client: TelegramClient, registry: Arc<Registry>, access: Arc<AccessMap>) {
    info!("Telegram command polling started");
    let mut offset = None;
    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::time::sleep(POLL_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let (Some(user), Some(text)) = (message.from, message.text) else { continue };

            if let Some(reply) = commands::respond(&registry, &access, user.id, &text).await {
                if let Err(e) = client.send_message(message.chat.id, &reply, true).await {
                    error!(chat_id = message.chat.id, error = %e, "Failed to answer command");
                }
            }
        }
    }
}
