// src/types/mod.rs - Shared data model for membership events, channel config and audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Platform-assigned chat identifier (channels and supergroups are negative)
pub type ChatId = i64;

/// Platform-assigned user identifier
pub type UserId = i64;

/// Membership status of a user in a chat.
///
/// Serialized with the platform's wire names, so `Admin` is `"administrator"`
/// and `Banned` is `"kicked"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    #[serde(rename = "member")]
    Member,
    #[serde(rename = "administrator")]
    Admin,
    #[serde(rename = "kicked")]
    Banned,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "restricted")]
    Restricted,
    #[serde(rename = "creator")]
    Creator,
}

impl MemberStatus {
    /// Whether this status carries administrator rights (owner included)
    pub fn has_admin_rights(&self) -> bool {
        matches!(self, MemberStatus::Admin | MemberStatus::Creator)
    }

    /// Whether the user is still part of the chat
    pub fn is_present(&self) -> bool {
        !matches!(self, MemberStatus::Banned | MemberStatus::Left)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Member => "member",
            MemberStatus::Admin => "admin",
            MemberStatus::Banned => "banned",
            MemberStatus::Left => "left",
            MemberStatus::Restricted => "restricted",
            MemberStatus::Creator => "creator",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic meaning of an old/new status pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Promotion,
    Demotion,
    Ban,
    Unban,
    Kick,
    Restriction,
    Join,
    Leave,
    Other,
}

impl Transition {
    /// Classify a status change. `by_self` is true when the user changed their own status.
    pub fn classify(old: MemberStatus, new: MemberStatus, by_self: bool) -> Self {
        use MemberStatus::*;

        // Permission edits on an already restricted member are not a move to Restricted
        if old == new {
            return Transition::Other;
        }

        match (old, new) {
            (_, Banned) => Transition::Ban,
            (Banned, Left) | (Banned, Member) => Transition::Unban,
            (_, Restricted) => Transition::Restriction,
            (Member, Admin) | (Restricted, Admin) => Transition::Promotion,
            (Admin, Member) => Transition::Demotion,
            (Left, _) => Transition::Join,
            (_, Left) if by_self => Transition::Leave,
            (_, Left) => Transition::Kick,
            _ => Transition::Other,
        }
    }

    /// Removal or restriction of a member's standing
    pub fn is_removal(&self) -> bool {
        matches!(self, Transition::Ban | Transition::Restriction)
    }
}

/// Privilege level reported by an admin status lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeLevel {
    None,
    Admin,
    Owner,
}

impl PrivilegeLevel {
    pub fn from_status(status: MemberStatus) -> Self {
        match status {
            MemberStatus::Creator => PrivilegeLevel::Owner,
            MemberStatus::Admin => PrivilegeLevel::Admin,
            _ => PrivilegeLevel::None,
        }
    }
}

/// Protection settings for one registered channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Map key in the persisted document, filled in on load
    #[serde(skip)]
    pub channel_id: ChatId,
    #[serde(default)]
    pub authorized_admins: BTreeSet<UserId>,
    #[serde(default = "default_true")]
    pub auto_ban_enabled: bool,
    #[serde(default = "default_true")]
    pub notify_owner: bool,
}

fn default_true() -> bool {
    true
}

impl ChannelConfig {
    pub fn new(channel_id: ChatId) -> Self {
        Self {
            channel_id,
            authorized_admins: BTreeSet::new(),
            auto_ban_enabled: true,
            notify_owner: true,
        }
    }

    pub fn is_authorized(&self, user_id: UserId) -> bool {
        self.authorized_admins.contains(&user_id)
    }
}

/// A single membership change reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    pub channel_id: ChatId,
    pub actor_user_id: UserId,
    pub target_user_id: UserId,
    pub old_status: MemberStatus,
    pub new_status: MemberStatus,
    pub timestamp: DateTime<Utc>,
    /// Actor's privilege at processing time, when the dispatcher could look it up
    pub actor_privilege: Option<PrivilegeLevel>,
    pub actor_name: Option<String>,
    pub target_name: Option<String>,
}

impl MembershipEvent {
    pub fn transition(&self) -> Transition {
        Transition::classify(
            self.old_status,
            self.new_status,
            self.actor_user_id == self.target_user_id,
        )
    }

    pub fn actor_display(&self) -> String {
        display_name(self.actor_name.as_deref(), self.actor_user_id)
    }

    pub fn target_display(&self) -> String {
        display_name(self.target_name.as_deref(), self.target_user_id)
    }
}

fn display_name(name: Option<&str>, id: UserId) -> String {
    match name {
        Some(name) => format!("@{}", name),
        None => id.to_string(),
    }
}

/// Outcome recorded in an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    None,
    Warned,
    Demoted,
    Banned,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::None => "none",
            ActionTaken::Warned => "warned",
            ActionTaken::Demoted => "demoted",
            ActionTaken::Banned => "banned",
        }
    }
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the append-only action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub channel_id: ChatId,
    pub actor_user_id: UserId,
    pub target_user_id: UserId,
    pub action_taken: ActionTaken,
    pub reason: String,
}

impl AuditRecord {
    pub fn new(
        channel_id: ChatId,
        actor_user_id: UserId,
        target_user_id: UserId,
        action_taken: ActionTaken,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            channel_id,
            actor_user_id,
            target_user_id,
            action_taken,
            reason: reason.into(),
        }
    }
}

/// Corrective action recommended for an abusive administrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementAction {
    DemoteAndOptionallyBan { ban: bool, reason: String },
}

impl EnforcementAction {
    pub fn bans(&self) -> bool {
        match self {
            EnforcementAction::DemoteAndOptionallyBan { ban, .. } => *ban,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            EnforcementAction::DemoteAndOptionallyBan { reason, .. } => reason,
        }
    }
}

/// Result of evaluating one membership event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Benign,
    Abusive { action: EnforcementAction },
    Ignored { reason: String },
}

impl Classification {
    pub fn is_abusive(&self) -> bool {
        matches!(self, Classification::Abusive { .. })
    }
}

/// What an enforcement run actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementOutcome {
    pub action_taken: ActionTaken,
    pub reason: String,
}
