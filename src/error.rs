use thiserror::Error;

use crate::platforms::ApiError;
use crate::types::{ChatId, UserId};

/// Errors surfaced by the moderation core
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("channel {0} is not registered for protection")]
    UnregisteredChannel(ChatId),

    #[error("bot lacks promotion/ban rights in channel {channel_id} (missing: {})", .missing.join(", "))]
    InsufficientBotPrivilege {
        channel_id: ChatId,
        missing: Vec<String>,
    },

    #[error("transient platform failure: {0}")]
    RemoteTransient(String),

    #[error("target already absent: {0}")]
    RemoteNotFound(String),

    #[error("platform rejected request: {0}")]
    Remote(String),

    #[error("user {user_id} is not a member of channel {channel_id}")]
    LookupError { channel_id: ChatId, user_id: UserId },

    #[error("configuration store is corrupt: {0}")]
    ConfigCorrupt(String),

    #[error("configuration store io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for GuardError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimited { .. } | ApiError::Transient(_) => {
                GuardError::RemoteTransient(err.to_string())
            }
            ApiError::NotFound(desc) => GuardError::RemoteNotFound(desc),
            ApiError::ProtectedTarget(desc) | ApiError::Forbidden(desc) | ApiError::Rejected(desc) => GuardError::Remote(desc),
        }
    }
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;
