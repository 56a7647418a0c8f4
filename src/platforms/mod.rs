use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::types::{ChatId, MemberStatus, MembershipEvent, UserId};

pub mod telegram;

/// Failure reported by the messaging platform API, classified by kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("rate limited, retry after {retry_after}s: {description}")]
    RateLimited { retry_after: u64, description: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The target is the chat owner, whom no administrator can demote or ban
    #[error("target is protected: {0}")]
    ProtectedTarget(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Classify an unsuccessful API reply from its error code and description
    pub fn from_reply(error_code: i64, description: &str, retry_after: Option<u64>) -> Self {
        let description = description.to_string();
        let lowered = description.to_lowercase();

        match error_code {
            429 => ApiError::RateLimited {
                retry_after: retry_after.unwrap_or(1),
                description,
            },
            401 | 403 => ApiError::Forbidden(description),
            400 if is_owner_error(&lowered) => ApiError::ProtectedTarget(description),
            400 if is_rights_error(&lowered) => ApiError::Forbidden(description),
            400 if is_absent_error(&lowered) => ApiError::NotFound(description),
            404 => ApiError::NotFound(description),
            code if code >= 500 => ApiError::Transient(description),
            _ => ApiError::Rejected(description),
        }
    }

    /// Backoff the platform asked for, if this is a rate limit
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after, .. } => Some(Duration::from_secs(*retry_after)),
            _ => None,
        }
    }
}

fn is_owner_error(description: &str) -> bool {
    ["can't remove chat owner", "can't demote chat creator"]
        .iter()
        .any(|needle| description.contains(needle))
}

fn is_rights_error(description: &str) -> bool {
    ["not enough rights", "chat_admin_required", "have no rights", "can't demote"]
        .iter()
        .any(|needle| description.contains(needle))
}

fn is_absent_error(description: &str) -> bool {
    ["user not found", "member not found", "participant_id_invalid", "user_not_participant", "user is not a member"]
        .iter()
        .any(|needle| description.contains(needle))
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transient(err.to_string())
    }
}

/// Kind of chat an update originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Chats whose administrators are watched
    pub fn is_monitored_kind(&self) -> bool {
        matches!(self, ChatKind::Channel | ChatKind::Supergroup)
    }
}

/// A text message that may carry a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub message_id: i64,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

/// An inline keyboard button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPress {
    pub id: String,
    pub chat_id: ChatId,
    pub message_id: i64,
    pub user_id: UserId,
    pub username: Option<String>,
    pub data: String,
}

/// Everything the dispatcher can receive from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    MemberChange { chat_kind: ChatKind, event: MembershipEvent },
    Command(CommandMessage),
    Callback(CallbackPress),
}

/// A batch of updates together with the offset that acknowledges it
#[derive(Debug, Default)]
pub struct UpdateBatch {
    pub next_offset: Option<i64>,
    pub updates: Vec<InboundUpdate>,
}

/// Member lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMemberInfo {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub status: MemberStatus,
    pub can_promote_members: bool,
    pub can_restrict_members: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

pub type Keyboard = Vec<Vec<InlineButton>>;

/// Who the bot is on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: UserId,
    pub username: Option<String>,
}

/// Interface the moderation core needs from the messaging platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Get the platform identifier (e.g., "telegram")
    fn platform_name(&self) -> &str;

    /// The bot's own account, fetched once and cached
    async fn get_me(&self) -> Result<BotIdentity, ApiError>;

    /// Long-poll for the next batch of updates after `offset`
    async fn get_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, ApiError>;

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberInfo, ApiError>;

    /// Strip every administrator right from the user
    async fn demote_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError>;

    async fn ban_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError>;

    async fn send_message(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<(), ApiError>;

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ApiError>;

    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory platform that records every call

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        GetChatMember(ChatId, UserId),
        Demote(ChatId, UserId),
        Ban(ChatId, UserId),
        Send(ChatId, String),
        Edit(ChatId, i64, String),
        Answer(String),
    }

    pub struct MockPlatform {
        pub bot_id: UserId,
        members: Mutex<HashMap<(ChatId, UserId), ChatMemberInfo>>,
        member_errors: Mutex<VecDeque<ApiError>>,
        demote_results: Mutex<VecDeque<Result<(), ApiError>>>,
        ban_results: Mutex<VecDeque<Result<(), ApiError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockPlatform {
        pub fn new(bot_id: UserId) -> Self {
            Self {
                bot_id,
                members: Mutex::new(HashMap::new()),
                member_errors: Mutex::new(VecDeque::new()),
                demote_results: Mutex::new(VecDeque::new()),
                ban_results: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn set_member(&self, chat_id: ChatId, user_id: UserId, status: MemberStatus) {
            let info = ChatMemberInfo {
                user_id,
                username: Some(format!("user{}", user_id)),
                first_name: format!("User {}", user_id),
                status,
                can_promote_members: status.has_admin_rights(),
                can_restrict_members: status.has_admin_rights(),
            };
            self.members.lock().unwrap().insert((chat_id, user_id), info);
        }

        pub fn set_member_info(&self, chat_id: ChatId, info: ChatMemberInfo) {
            self.members.lock().unwrap().insert((chat_id, info.user_id), info);
        }

        /// Bot is an administrator with both rights it needs
        pub fn grant_bot_rights(&self, chat_id: ChatId) {
            self.set_member(chat_id, self.bot_id, MemberStatus::Admin);
        }

        /// Fail the next `get_chat_member` call with `err`, whoever is looked up
        pub fn queue_member_error(&self, err: ApiError) {
            self.member_errors.lock().unwrap().push_back(err);
        }

        pub fn queue_demote_result(&self, result: Result<(), ApiError>) {
            self.demote_results.lock().unwrap().push_back(result);
        }

        pub fn queue_ban_result(&self, result: Result<(), ApiError>) {
            self.ban_results.lock().unwrap().push_back(result);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn enforcement_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Demote(..) | Call::Ban(..)))
                .collect()
        }

        pub fn sent_messages(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send(_, text) | Call::Edit(_, _, text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ChatPlatform for MockPlatform {
        fn platform_name(&self) -> &str {
            "mock"
        }

        async fn get_me(&self) -> Result<BotIdentity, ApiError> {
            Ok(BotIdentity {
                user_id: self.bot_id,
                username: Some("guardbot".to_string()),
            })
        }

        async fn get_updates(&self, _offset: Option<i64>) -> Result<UpdateBatch, ApiError> {
            Ok(UpdateBatch::default())
        }

        async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberInfo, ApiError> {
            self.record(Call::GetChatMember(chat_id, user_id));
            if let Some(err) = self.member_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.members
                .lock()
                .unwrap()
                .get(&(chat_id, user_id))
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Bad Request: user not found".into()))
        }

        async fn demote_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
            self.record(Call::Demote(chat_id, user_id));
            self.demote_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn ban_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
            self.record(Call::Ban(chat_id, user_id));
            self.ban_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn send_message(&self, chat_id: ChatId, text: &str, _keyboard: Option<&Keyboard>) -> Result<(), ApiError> {
            self.record(Call::Send(chat_id, text.to_string()));
            Ok(())
        }

        async fn edit_message_text(
            &self,
            chat_id: ChatId,
            message_id: i64,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ApiError> {
            self.record(Call::Edit(chat_id, message_id, text.to_string()));
            Ok(())
        }

        async fn answer_callback_query(&self, callback_id: &str) -> Result<(), ApiError> {
            self.record(Call::Answer(callback_id.to_string()));
            Ok(())
        }
    }
}
