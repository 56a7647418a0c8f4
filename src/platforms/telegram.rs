use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::BotSettings;
use crate::platforms::{
    ApiError, BotIdentity, CallbackPress, ChatKind, ChatMemberInfo, ChatPlatform, CommandMessage, InboundUpdate,
    Keyboard, UpdateBatch,
};
use crate::types::{ChatId, MemberStatus, MembershipEvent, UserId};

/// Bot API reply envelope
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
    chat_member: Option<TgChatMemberUpdated>,
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChatMemberUpdated {
    chat: TgChat,
    from: TgUser,
    date: i64,
    old_chat_member: TgChatMember,
    new_chat_member: TgChatMember,
}

#[derive(Debug, Deserialize)]
struct TgChatMember {
    status: MemberStatus,
    user: TgUser,
    #[serde(default)]
    can_promote_members: bool,
    #[serde(default)]
    can_restrict_members: bool,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    message: Option<TgMessage>,
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct TgInlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

/// Configuration for the Bot API connection
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub poll_timeout_seconds: u64,
}

impl TelegramConfig {
    /// Load the token from the environment, everything else from settings
    pub fn from_env(settings: &BotSettings) -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN environment variable not set")?;

        if token.trim().is_empty() {
            return Err(anyhow::anyhow!("TELEGRAM_BOT_TOKEN is empty"));
        }

        info!("Loaded Telegram config (api: {})", settings.api_base_url);

        Ok(Self {
            token: token.trim().to_string(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(settings.api_timeout_seconds),
            poll_timeout_seconds: settings.poll_timeout_seconds,
        })
    }
}

/// Bot API client over HTTPS long polling
pub struct TelegramClient {
    config: TelegramConfig,
    http_client: reqwest::Client,
    identity: OnceCell<BotIdentity>,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            http_client,
            identity: OnceCell::new(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base_url, self.config.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T, ApiError> {
        self.call_with_timeout(method, body, None).await
    }

    async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, ApiError> {
        let mut request = self.http_client.post(self.method_url(method)).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // The request URL embeds the token, keep it out of error text
        let response = request.send().await.map_err(|e| ApiError::from(e.without_url()))?;
        let status = response.status();

        let reply: ApiReply<T> = response.json().await.map_err(|e| {
            ApiError::Transient(format!("{} returned unreadable reply ({}): {}", method, status, e.without_url()))
        })?;

        if reply.ok {
            return reply
                .result
                .ok_or_else(|| ApiError::Rejected(format!("{} returned ok without result", method)));
        }

        let error_code = reply.error_code.unwrap_or_else(|| i64::from(status.as_u16()));
        let description = reply.description.unwrap_or_else(|| "Unknown error".to_string());
        let retry_after = reply.parameters.and_then(|p| p.retry_after);

        debug!("{} failed with {}: {}", method, error_code, description);
        Err(ApiError::from_reply(error_code, &description, retry_after))
    }

    /// Convert a raw update into our dispatcher format
    fn convert_update(update: TgUpdate) -> Option<InboundUpdate> {
        if let Some(change) = update.chat_member {
            let timestamp = Utc
                .timestamp_opt(change.date, 0)
                .single()
                .unwrap_or_else(Utc::now);

            return Some(InboundUpdate::MemberChange {
                chat_kind: chat_kind(&change.chat.kind),
                event: MembershipEvent {
                    channel_id: change.chat.id,
                    actor_user_id: change.from.id,
                    target_user_id: change.new_chat_member.user.id,
                    old_status: change.old_chat_member.status,
                    new_status: change.new_chat_member.status,
                    timestamp,
                    actor_privilege: None,
                    actor_name: change.from.username,
                    target_name: change.new_chat_member.user.username,
                },
            });
        }

        if let Some(query) = update.callback_query {
            let message = query.message?;
            return Some(InboundUpdate::Callback(CallbackPress {
                id: query.id,
                chat_id: message.chat.id,
                message_id: message.message_id,
                user_id: query.from.id,
                username: query.from.username,
                data: query.data?,
            }));
        }

        let message = update.message?;
        let text = message.text?;
        if !text.starts_with('/') {
            return None;
        }
        let from = message.from?;

        Some(InboundUpdate::Command(CommandMessage {
            chat_id: message.chat.id,
            chat_kind: chat_kind(&message.chat.kind),
            message_id: message.message_id,
            user_id: from.id,
            username: from.username,
            text,
        }))
    }
}

fn chat_kind(kind: &str) -> ChatKind {
    match kind {
        "channel" => ChatKind::Channel,
        "supergroup" => ChatKind::Supergroup,
        "group" => ChatKind::Group,
        _ => ChatKind::Private,
    }
}

fn keyboard_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<TgInlineButton<'_>>> = keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| TgInlineButton {
                    text: &b.text,
                    callback_data: &b.callback_data,
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    fn platform_name(&self) -> &str {
        "telegram"
    }

    async fn get_me(&self) -> Result<BotIdentity, ApiError> {
        let identity = self
            .identity
            .get_or_try_init(|| async {
                let me: TgUser = self.call("getMe", json!({})).await?;
                info!("Authenticated as bot {} (@{})", me.id, me.username.as_deref().unwrap_or("?"));
                Ok::<_, ApiError>(BotIdentity {
                    user_id: me.id,
                    username: me.username,
                })
            })
            .await?;
        Ok(identity.clone())
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, ApiError> {
        let body = json!({
            "offset": offset,
            "timeout": self.config.poll_timeout_seconds,
            "allowed_updates": ["message", "chat_member", "callback_query"],
        });
        // Long poll outlives the regular request timeout
        let timeout = Duration::from_secs(self.config.poll_timeout_seconds) + self.config.request_timeout;

        let raw: Vec<serde_json::Value> = self.call_with_timeout("getUpdates", body, Some(timeout)).await?;

        let mut batch = UpdateBatch::default();
        for value in raw {
            let update_id = value.get("update_id").and_then(|v| v.as_i64());
            if let Some(id) = update_id {
                batch.next_offset = Some(batch.next_offset.map_or(id + 1, |o: i64| o.max(id + 1)));
            }

            match serde_json::from_value::<TgUpdate>(value) {
                Ok(update) => {
                    let update_id = update.update_id;
                    match Self::convert_update(update) {
                        Some(inbound) => batch.updates.push(inbound),
                        None => debug!("Skipping update {} with no handled content", update_id),
                    }
                }
                Err(e) => warn!("Skipping malformed update {:?}: {}", update_id, e),
            }
        }

        Ok(batch)
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberInfo, ApiError> {
        let member: TgChatMember = self
            .call("getChatMember", json!({ "chat_id": chat_id, "user_id": user_id }))
            .await?;

        Ok(ChatMemberInfo {
            user_id: member.user.id,
            username: member.user.username,
            first_name: member.user.first_name,
            status: member.status,
            can_promote_members: member.can_promote_members,
            can_restrict_members: member.can_restrict_members,
        })
    }

    async fn demote_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        // Promoting with every right cleared is how the API demotes
        let _: bool = self
            .call(
                "promoteChatMember",
                json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                    "is_anonymous": false,
                    "can_manage_chat": false,
                    "can_delete_messages": false,
                    "can_manage_video_chats": false,
                    "can_restrict_members": false,
                    "can_promote_members": false,
                    "can_change_info": false,
                    "can_invite_users": false,
                    "can_pin_messages": false,
                    "can_post_messages": false,
                    "can_edit_messages": false,
                }),
            )
            .await?;
        Ok(())
    }

    async fn ban_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        let _: bool = self
            .call("banChatMember", json!({ "chat_id": chat_id, "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<(), ApiError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }

        let _: serde_json::Value = self.call("sendMessage", body).await?;
        debug!("Sent message to {}", chat_id);
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ApiError> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }

        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), ApiError> {
        let _: bool = self
            .call("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}
