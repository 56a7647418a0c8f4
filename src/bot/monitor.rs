// src/bot/monitor.rs - Classifies membership changes as benign or abusive

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::types::{
    ChannelConfig, ChatId, Classification, EnforcementAction, MembershipEvent, PrivilegeLevel,
    Transition, UserId,
};

const MAX_TRACKED_REMOVALS: usize = 1000;

/// Sender the platform reports for actions of anonymous group administrators
pub const ANONYMOUS_ADMIN_USER_ID: UserId = 1087968824;

/// A removal observed in a monitored channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalRecord {
    pub channel_id: ChatId,
    pub actor_user_id: UserId,
    pub target_user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

pub struct ChannelMonitor {
    bot_user_id: UserId,
    burst_threshold: usize,
    burst_window: Duration,
    removals: RwLock<VecDeque<RemovalRecord>>,
}

impl ChannelMonitor {
    pub fn new(bot_user_id: UserId, burst_threshold: usize, burst_window_minutes: i64) -> Self {
        Self {
            bot_user_id,
            burst_threshold,
            burst_window: Duration::minutes(burst_window_minutes),
            removals: RwLock::new(VecDeque::new()),
        }
    }

    pub fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    pub fn burst_window_minutes(&self) -> i64 {
        self.burst_window.num_minutes()
    }

    /// Decide whether `event` is an administrator abusing their rights.
    ///
    /// Pure: depends only on the event and the channel's config snapshot.
    /// `None` config means the channel is not registered.
    pub fn evaluate(&self, event: &MembershipEvent, config: Option<&ChannelConfig>) -> Classification {
        let Some(config) = config else {
            return Classification::Ignored {
                reason: format!("channel {} is not registered", event.channel_id),
            };
        };

        if config.channel_id != event.channel_id {
            return Classification::Ignored {
                reason: format!("config for {} does not match event channel {}", config.channel_id, event.channel_id),
            };
        }

        // Our own enforcement shows up as membership changes too
        if event.actor_user_id == self.bot_user_id {
            return Classification::Ignored {
                reason: "change performed by the bot".to_string(),
            };
        }

        if event.actor_user_id == ANONYMOUS_ADMIN_USER_ID {
            return Classification::Ignored {
                reason: "change performed by an anonymous administrator".to_string(),
            };
        }

        let transition = event.transition();
        if !transition.is_removal() || event.actor_user_id == event.target_user_id {
            return Classification::Benign;
        }

        // Only administrators can ban or restrict, so the event itself shows the
        // actor held admin rights. The owner is the one admin never enforced against.
        if event.actor_privilege == Some(PrivilegeLevel::Owner) {
            return Classification::Benign;
        }

        if config.is_authorized(event.actor_user_id) {
            return Classification::Benign;
        }

        let verb = match transition {
            Transition::Ban => "banned",
            _ => "restricted",
        };

        debug!(
            "Unauthorized admin {} {} member {} in channel {}",
            event.actor_user_id, verb, event.target_user_id, event.channel_id
        );

        Classification::Abusive {
            action: EnforcementAction::DemoteAndOptionallyBan {
                ban: config.auto_ban_enabled,
                reason: format!("{} member {}", verb, event.target_user_id),
            },
        }
    }

    /// Remember a removal for burst tracking. Non-removals are ignored.
    pub async fn track(&self, event: &MembershipEvent) {
        if !event.transition().is_removal() || event.actor_user_id == event.target_user_id {
            return;
        }

        let mut removals = self.removals.write().await;
        removals.push_back(RemovalRecord {
            channel_id: event.channel_id,
            actor_user_id: event.actor_user_id,
            target_user_id: event.target_user_id,
            timestamp: event.timestamp,
        });

        while removals.len() > MAX_TRACKED_REMOVALS {
            removals.pop_front();
        }
    }

    /// Most recent removals in a channel, newest first
    pub async fn recent_removals(&self, channel_id: ChatId, limit: usize) -> Vec<RemovalRecord> {
        let removals = self.removals.read().await;
        let mut recent: Vec<RemovalRecord> = removals
            .iter()
            .filter(|r| r.channel_id == channel_id)
            .cloned()
            .collect();

        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        recent
    }

    /// Removals by `actor_user_id` in `channel_id` within `window` before `now`
    pub async fn removal_count(&self, actor_user_id: UserId, channel_id: ChatId, window: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - window;
        self.removals
            .read()
            .await
            .iter()
            .filter(|r| r.actor_user_id == actor_user_id && r.channel_id == channel_id && r.timestamp > cutoff)
            .count()
    }

    /// Removal count for the actor if it exceeds the burst threshold
    pub async fn burst_count(&self, actor_user_id: UserId, channel_id: ChatId, now: DateTime<Utc>) -> Option<usize> {
        let count = self.removal_count(actor_user_id, channel_id, self.burst_window, now).await;
        (count > self.burst_threshold).then_some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberStatus;

    const BOT: UserId = 1000;
    const CHANNEL: ChatId = -100;

    fn monitor() -> ChannelMonitor {
        ChannelMonitor::new(BOT, 5, 60)
    }

    fn config(authorized: &[UserId], auto_ban: bool) -> ChannelConfig {
        let mut config = ChannelConfig::new(CHANNEL);
        config.authorized_admins = authorized.iter().copied().collect();
        config.auto_ban_enabled = auto_ban;
        config
    }

    fn event(actor: UserId, target: UserId, old: MemberStatus, new: MemberStatus) -> MembershipEvent {
        MembershipEvent {
            channel_id: CHANNEL,
            actor_user_id: actor,
            target_user_id: target,
            old_status: old,
            new_status: new,
            timestamp: Utc::now(),
            actor_privilege: Some(PrivilegeLevel::Admin),
            actor_name: None,
            target_name: None,
        }
    }

    #[test]
    fn test_unauthorized_admin_ban_is_abusive() {
        let result = monitor().evaluate(&event(2, 3, MemberStatus::Member, MemberStatus::Banned), Some(&config(&[1], true)));

        assert_eq!(
            result,
            Classification::Abusive {
                action: EnforcementAction::DemoteAndOptionallyBan { ban: true, reason: "banned member 3".into() }
            }
        );
    }

    #[test]
    fn test_restriction_is_abusive_and_respects_auto_ban() {
        let result = monitor().evaluate(&event(2, 3, MemberStatus::Member, MemberStatus::Restricted), Some(&config(&[], false)));

        match result {
            Classification::Abusive { action } => {
                assert!(!action.bans());
                assert_eq!(action.reason(), "restricted member 3");
            }
            other => panic!("expected abusive, got {:?}", other),
        }
    }

    #[test]
    fn test_authorized_admin_is_always_benign() {
        let monitor = monitor();
        let config = config(&[1], true);
        let statuses = [
            MemberStatus::Member,
            MemberStatus::Admin,
            MemberStatus::Banned,
            MemberStatus::Left,
            MemberStatus::Restricted,
            MemberStatus::Creator,
        ];

        for old in statuses {
            for new in statuses {
                let result = monitor.evaluate(&event(1, 3, old, new), Some(&config));
                assert_eq!(result, Classification::Benign, "{:?} -> {:?}", old, new);
            }
        }
    }

    #[test]
    fn test_self_change_is_benign() {
        let monitor = monitor();
        let config = config(&[], true);

        for new in [MemberStatus::Banned, MemberStatus::Restricted, MemberStatus::Left, MemberStatus::Member] {
            let result = monitor.evaluate(&event(2, 2, MemberStatus::Admin, new), Some(&config));
            assert_eq!(result, Classification::Benign);
        }
    }

    #[test]
    fn test_owner_action_is_benign() {
        let mut owner_event = event(2, 3, MemberStatus::Member, MemberStatus::Banned);
        owner_event.actor_privilege = Some(PrivilegeLevel::Owner);

        assert_eq!(monitor().evaluate(&owner_event, Some(&config(&[], true))), Classification::Benign);
    }

    #[test]
    fn test_unknown_privilege_still_counts_as_admin() {
        let mut unknown = event(2, 3, MemberStatus::Member, MemberStatus::Banned);
        unknown.actor_privilege = None;

        assert!(monitor().evaluate(&unknown, Some(&config(&[], true))).is_abusive());
    }

    #[test]
    fn test_non_removal_transitions_are_benign() {
        let monitor = monitor();
        let config = config(&[], true);

        let promotion = event(2, 3, MemberStatus::Member, MemberStatus::Admin);
        let unban = event(2, 3, MemberStatus::Banned, MemberStatus::Left);
        let kick_rejoin = event(2, 3, MemberStatus::Left, MemberStatus::Member);

        for e in [promotion, unban, kick_rejoin] {
            assert_eq!(monitor.evaluate(&e, Some(&config)), Classification::Benign);
        }
    }

    #[test]
    fn test_unregistered_channel_is_ignored() {
        let result = monitor().evaluate(&event(2, 3, MemberStatus::Member, MemberStatus::Banned), None);
        assert!(matches!(result, Classification::Ignored { .. }));
    }

    #[test]
    fn test_bot_actions_are_ignored() {
        let result = monitor().evaluate(&event(BOT, 2, MemberStatus::Admin, MemberStatus::Banned), Some(&config(&[], true)));
        assert!(matches!(result, Classification::Ignored { .. }));
    }

    #[test]
    fn test_anonymous_admin_actions_are_ignored() {
        let result = monitor().evaluate(
            &event(ANONYMOUS_ADMIN_USER_ID, 3, MemberStatus::Member, MemberStatus::Banned),
            Some(&config(&[], true)),
        );
        assert!(matches!(result, Classification::Ignored { .. }));
    }

    #[test]
    fn test_permission_edit_on_restricted_member_is_benign() {
        let monitor = monitor();
        let config = config(&[], true);

        let loosened = event(2, 3, MemberStatus::Restricted, MemberStatus::Restricted);
        assert_eq!(monitor.evaluate(&loosened, Some(&config)), Classification::Benign);

        let tightened = event(2, 3, MemberStatus::Member, MemberStatus::Restricted);
        assert!(monitor.evaluate(&tightened, Some(&config)).is_abusive());
    }

    #[tokio::test]
    async fn test_burst_detection() {
        let monitor = monitor();
        let now = Utc::now();

        for target in 0..6 {
            monitor.track(&event(1, target, MemberStatus::Member, MemberStatus::Banned)).await;
        }
        // Promotions are not removals
        monitor.track(&event(1, 50, MemberStatus::Member, MemberStatus::Admin)).await;

        assert_eq!(monitor.removal_count(1, CHANNEL, Duration::minutes(60), now).await, 6);
        assert_eq!(monitor.burst_count(1, CHANNEL, now).await, Some(6));
        assert_eq!(monitor.burst_count(2, CHANNEL, now).await, None);
        assert_eq!(monitor.recent_removals(CHANNEL, 3).await.len(), 3);
    }

    #[tokio::test]
    async fn test_old_removals_fall_out_of_window() {
        let monitor = monitor();
        let mut old = event(1, 3, MemberStatus::Member, MemberStatus::Banned);
        old.timestamp = Utc::now() - Duration::hours(2);
        monitor.track(&old).await;

        assert_eq!(monitor.removal_count(1, CHANNEL, Duration::minutes(60), Utc::now()).await, 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let monitor = monitor();
        for target in 0..(MAX_TRACKED_REMOVALS as i64 + 10) {
            monitor.track(&event(1, target, MemberStatus::Member, MemberStatus::Banned)).await;
        }
        assert_eq!(monitor.removals.read().await.len(), MAX_TRACKED_REMOVALS);
    }
}
