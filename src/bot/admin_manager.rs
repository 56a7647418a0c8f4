// src/bot/admin_manager.rs - Privilege lookups and enforcement against the platform

use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::bot::audit::ActionLogger;
use crate::error::{GuardError, GuardResult};
use crate::platforms::{ApiError, ChatMemberInfo, ChatPlatform};
use crate::types::{
    ActionTaken, AuditRecord, ChatId, EnforcementAction, EnforcementOutcome, MemberStatus,
    PrivilegeLevel, UserId,
};

pub const REASON_BOT_LACKS_RIGHTS: &str = "bot lacks promotion/ban rights";
pub const REASON_TARGET_ABSENT: &str = "target already absent";
pub const REASON_TARGET_PROTECTED: &str = "target is the channel owner";

pub struct AdminManager {
    platform: Arc<dyn ChatPlatform>,
    audit: Arc<ActionLogger>,
    bot_user_id: UserId,
    max_retry_after: Duration,
}

impl AdminManager {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        audit: Arc<ActionLogger>,
        bot_user_id: UserId,
        max_retry_after_seconds: u64,
    ) -> Self {
        Self {
            platform,
            audit,
            bot_user_id,
            max_retry_after: Duration::from_secs(max_retry_after_seconds),
        }
    }

    /// Member details of `user_id`, or `LookupError` if they are not in the channel
    pub async fn lookup_member(&self, channel_id: ChatId, user_id: UserId) -> GuardResult<ChatMemberInfo> {
        let member = self
            .with_rate_limit_retry("getChatMember", || self.platform.get_chat_member(channel_id, user_id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => GuardError::LookupError { channel_id, user_id },
                other => GuardError::from(other),
            })?;

        if !member.status.is_present() {
            return Err(GuardError::LookupError { channel_id, user_id });
        }

        Ok(member)
    }

    /// Current privilege level of `user_id`, or `LookupError` if they are not in the channel
    pub async fn verify_admin_status(&self, channel_id: ChatId, user_id: UserId) -> GuardResult<PrivilegeLevel> {
        let member = self.lookup_member(channel_id, user_id).await?;
        Ok(PrivilegeLevel::from_status(member.status))
    }

    /// Rights the bot is missing among those enforcement needs
    pub async fn check_bot_permissions(&self, channel_id: ChatId) -> GuardResult<Vec<String>> {
        let member = match self
            .with_rate_limit_retry("getChatMember", || self.platform.get_chat_member(channel_id, self.bot_user_id))
            .await
        {
            Ok(member) => member,
            Err(ApiError::NotFound(_)) | Err(ApiError::Forbidden(_)) => {
                return Ok(vec!["can_promote_members".to_string(), "can_restrict_members".to_string()]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut missing = Vec::new();
        let is_admin = member.status == MemberStatus::Admin || member.status == MemberStatus::Creator;

        if !is_admin || !member.can_promote_members {
            missing.push("can_promote_members".to_string());
        }
        if !is_admin || !member.can_restrict_members {
            missing.push("can_restrict_members".to_string());
        }

        if !missing.is_empty() {
            warn!("Bot missing permissions in chat {}: {:?}", channel_id, missing);
        }
        Ok(missing)
    }

    /// Demote `target_user_id` and, when the action asks for it, ban them.
    ///
    /// Writes exactly one audit record for the attempt, whatever the outcome.
    pub async fn enforce(
        &self,
        channel_id: ChatId,
        target_user_id: UserId,
        action: &EnforcementAction,
    ) -> GuardResult<EnforcementOutcome> {
        let missing = match self.check_bot_permissions(channel_id).await {
            Ok(missing) => missing,
            Err(e) => {
                self.record(channel_id, target_user_id, ActionTaken::None, format!("permission check failed: {}", e))
                    .await;
                return Err(e);
            }
        };

        let needed: Vec<String> = missing
            .into_iter()
            .filter(|right| right == "can_promote_members" || action.bans())
            .collect();

        if !needed.is_empty() {
            self.record(channel_id, target_user_id, ActionTaken::None, REASON_BOT_LACKS_RIGHTS).await;
            return Err(GuardError::InsufficientBotPrivilege { channel_id, missing: needed });
        }

        if let Err(e) = self
            .with_rate_limit_retry("promoteChatMember", || self.platform.demote_chat_member(channel_id, target_user_id))
            .await
        {
            return self.demote_failed(channel_id, target_user_id, e).await;
        }
        info!("Demoted admin {} in chat {}", target_user_id, channel_id);

        let mut outcome = EnforcementOutcome {
            action_taken: ActionTaken::Demoted,
            reason: action.reason().to_string(),
        };

        if action.bans() {
            match self
                .with_rate_limit_retry("banChatMember", || self.platform.ban_chat_member(channel_id, target_user_id))
                .await
            {
                Ok(()) => {
                    info!("Banned admin {} from chat {}", target_user_id, channel_id);
                    outcome.action_taken = ActionTaken::Banned;
                }
                Err(ApiError::NotFound(_)) => {
                    outcome.reason = format!("{}; {} for ban", outcome.reason, REASON_TARGET_ABSENT);
                }
                Err(e) => {
                    error!("Failed to ban admin {} from chat {}: {}", target_user_id, channel_id, e);
                    outcome.reason = format!("{}; ban failed: {}", outcome.reason, e);
                }
            }
        }

        self.record(channel_id, target_user_id, outcome.action_taken, outcome.reason.clone())
            .await;
        Ok(outcome)
    }

    async fn demote_failed(
        &self,
        channel_id: ChatId,
        target_user_id: UserId,
        err: ApiError,
    ) -> GuardResult<EnforcementOutcome> {
        match err {
            ApiError::NotFound(_) => {
                info!("Admin {} already left chat {}, nothing to enforce", target_user_id, channel_id);
                self.record(channel_id, target_user_id, ActionTaken::None, REASON_TARGET_ABSENT).await;
                Ok(EnforcementOutcome {
                    action_taken: ActionTaken::None,
                    reason: REASON_TARGET_ABSENT.to_string(),
                })
            }
            ApiError::ProtectedTarget(description) => {
                warn!("Refusing to act on owner {} in chat {}: {}", target_user_id, channel_id, description);
                self.record(channel_id, target_user_id, ActionTaken::None, REASON_TARGET_PROTECTED).await;
                Ok(EnforcementOutcome {
                    action_taken: ActionTaken::None,
                    reason: REASON_TARGET_PROTECTED.to_string(),
                })
            }
            ApiError::Forbidden(description) => {
                // Rights revoked between the check and the call
                error!("Demote of {} in chat {} forbidden: {}", target_user_id, channel_id, description);
                self.record(channel_id, target_user_id, ActionTaken::None, REASON_BOT_LACKS_RIGHTS).await;
                Err(GuardError::InsufficientBotPrivilege {
                    channel_id,
                    missing: vec!["can_promote_members".to_string()],
                })
            }
            other => {
                error!("Failed to demote {} in chat {}: {}", target_user_id, channel_id, other);
                self.record(channel_id, target_user_id, ActionTaken::None, format!("demote failed: {}", other))
                    .await;
                Err(other.into())
            }
        }
    }

    async fn record(&self, channel_id: ChatId, target_user_id: UserId, action: ActionTaken, reason: impl Into<String>) {
        self.audit
            .record(AuditRecord::new(channel_id, self.bot_user_id, target_user_id, action, reason))
            .await;
    }

    /// Run `call`, retrying once after the platform's requested backoff if rate limited
    async fn with_rate_limit_retry<T, F, Fut>(&self, method: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match call().await {
            Err(e) => match e.retry_after() {
                Some(retry_after) => {
                    let wait = retry_after.min(self.max_retry_after);
                    warn!("{} rate limited, retrying once in {:?}", method, wait);
                    sleep(wait).await;
                    call().await
                }
                None => Err(e),
            },
            ok => ok,
        }
    }
}
