use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{BotSettings, ConfigStore};
use crate::error::{GuardError, GuardResult};
use crate::platforms::{
    ApiError, CallbackPress, ChatKind, ChatPlatform, CommandMessage, InboundUpdate, InlineButton, Keyboard,
};
use crate::types::{
    ActionTaken, AuditRecord, ChatId, Classification, EnforcementOutcome, MemberStatus, MembershipEvent,
    PrivilegeLevel, Transition, UserId,
};

pub mod admin_manager;
pub mod audit;
pub mod commands;
pub mod messages;
pub mod monitor;

use admin_manager::AdminManager;
use audit::ActionLogger;
use commands::{BotCommand, CommandParser, ConfigRequest, ConfigSetting, MenuAction, UserArg};
use messages::{MessageKey, Messages};
use monitor::{ChannelMonitor, ANONYMOUS_ADMIN_USER_ID};

const LOGS_SHOWN: usize = 10;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Text and optional inline keyboard sent back to a chat
#[derive(Debug, Clone)]
struct Reply {
    text: String,
    keyboard: Option<Keyboard>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Dispatches platform updates to the monitor, the admin manager and the command handlers
pub struct GuardBot {
    platform: Arc<dyn ChatPlatform>,
    config: ConfigStore,
    monitor: ChannelMonitor,
    admin_manager: AdminManager,
    audit: Arc<ActionLogger>,
    messages: Messages,
    parser: CommandParser,
}

impl GuardBot {
    pub async fn new(platform: Arc<dyn ChatPlatform>, config: ConfigStore, settings: &BotSettings) -> Result<Self> {
        let me = platform
            .get_me()
            .await
            .context("Failed to fetch bot identity")?;

        let audit = Arc::new(ActionLogger::new(&settings.actions_log));
        let admin_manager = AdminManager::new(
            Arc::clone(&platform),
            Arc::clone(&audit),
            me.user_id,
            settings.max_retry_after_seconds,
        );

        info!(
            "Channel guard ready on {} as {} (language: {})",
            platform.platform_name(),
            me.user_id,
            settings.language
        );

        Ok(Self {
            monitor: ChannelMonitor::new(me.user_id, settings.burst_ban_threshold, settings.burst_window_minutes),
            parser: CommandParser::new(me.username),
            messages: Messages::new(settings.language),
            platform,
            config,
            admin_manager,
            audit,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn audit(&self) -> &ActionLogger {
        &self.audit
    }

    /// Long-poll for updates until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        info!("Starting update polling...");
        let mut offset: Option<i64> = None;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping update polling");
                    break;
                }
                result = self.platform.get_updates(offset) => {
                    match result {
                        Ok(batch) => {
                            if let Some(next) = batch.next_offset {
                                offset = Some(next);
                            }
                            for update in batch.updates {
                                self.handle_update(update).await;
                            }
                        }
                        Err(ApiError::Forbidden(description)) => {
                            return Err(anyhow::anyhow!(
                                "Bot token rejected by {}: {}",
                                self.platform.platform_name(),
                                description
                            ));
                        }
                        Err(e) => match e.retry_after() {
                            Some(wait) => {
                                warn!("Polling rate limited, waiting {:?}", wait);
                                sleep(wait).await;
                            }
                            None => {
                                error!("Failed to fetch updates: {}", e);
                                sleep(POLL_ERROR_BACKOFF).await;
                            }
                        },
                    }
                }
            }
        }

        Ok(())
    }

    /// Process one update. Failures are logged and never escape.
    pub async fn handle_update(&self, update: InboundUpdate) {
        match update {
            InboundUpdate::MemberChange { chat_kind, event } => {
                self.handle_member_change(chat_kind, event).await;
            }
            InboundUpdate::Command(message) => self.handle_command(message).await,
            InboundUpdate::Callback(press) => self.handle_callback(press).await,
        }
    }

    pub async fn handle_member_change(&self, chat_kind: ChatKind, mut event: MembershipEvent) -> Classification {
        if !chat_kind.is_monitored_kind() {
            debug!("Ignoring membership change in {:?} chat {}", chat_kind, event.channel_id);
            return Classification::Ignored {
                reason: format!("{:?} chats are not monitored", chat_kind),
            };
        }

        let config = self.config.get(event.channel_id).await;
        let transition = event.transition();

        if let Some(config) = &config {
            let needs_lookup = transition.is_removal()
                && event.actor_user_id != self.monitor.bot_user_id()
                && event.actor_user_id != ANONYMOUS_ADMIN_USER_ID
                && event.actor_user_id != event.target_user_id
                && !config.is_authorized(event.actor_user_id);

            if needs_lookup {
                match self
                    .admin_manager
                    .verify_admin_status(event.channel_id, event.actor_user_id)
                    .await
                {
                    Ok(level) => event.actor_privilege = Some(level),
                    Err(GuardError::LookupError { .. }) => {
                        debug!("Actor {} is no longer in channel {}", event.actor_user_id, event.channel_id);
                    }
                    Err(e) => {
                        // The actor might be the owner, so never enforce blind
                        warn!(
                            "Could not verify actor {} in channel {}, skipping event: {}",
                            event.actor_user_id, event.channel_id, e
                        );
                        return Classification::Ignored {
                            reason: format!("could not verify actor {}: {}", event.actor_user_id, e),
                        };
                    }
                }
            }
        }

        let classification = self.monitor.evaluate(&event, config.as_ref());

        let config = match config {
            Some(config) if !matches!(classification, Classification::Ignored { .. }) => config,
            _ => {
                debug!("Membership change in {} not handled: {:?}", event.channel_id, classification);
                return classification;
            }
        };

        self.monitor.track(&event).await;

        match &classification {
            Classification::Abusive { action } => {
                warn!(
                    "Admin {} {} member {} in channel {} without authorization",
                    event.actor_user_id,
                    removal_verb(transition),
                    event.target_user_id,
                    event.channel_id
                );

                let result = self.admin_manager.enforce(event.channel_id, event.actor_user_id, action).await;
                if config.notify_owner {
                    self.notify_enforcement(&event, result).await;
                } else if let Err(e) = result {
                    error!("Enforcement in channel {} failed: {}", event.channel_id, e);
                }
            }
            Classification::Benign if transition.is_removal() && event.actor_user_id != event.target_user_id => {
                let burst = if config.is_authorized(event.actor_user_id) {
                    self.monitor
                        .burst_count(event.actor_user_id, event.channel_id, Utc::now())
                        .await
                } else {
                    None
                };

                let reason = format!("{} member {} (permitted)", removal_verb(transition), event.target_user_id);
                match burst {
                    Some(count) => {
                        warn!(
                            "Trusted admin {} removed {} members in channel {} within {} minutes",
                            event.actor_user_id,
                            count,
                            event.channel_id,
                            self.monitor.burst_window_minutes()
                        );
                        self.record(&event, ActionTaken::Warned, format!("{}; {} removals in window", reason, count))
                            .await;

                        if config.notify_owner {
                            let text = self.messages.render(
                                MessageKey::BurstWarning,
                                &[
                                    ("admin", event.actor_display().as_str()),
                                    ("count", count.to_string().as_str()),
                                    ("window", self.monitor.burst_window_minutes().to_string().as_str()),
                                ],
                            );
                            self.send(event.channel_id, Reply::text(text)).await;
                        }
                    }
                    None => self.record(&event, ActionTaken::None, reason).await,
                }
            }
            _ => debug!(
                "Benign {:?} of {} by {} in channel {}",
                transition, event.target_user_id, event.actor_user_id, event.channel_id
            ),
        }

        classification
    }

    async fn notify_enforcement(&self, event: &MembershipEvent, result: GuardResult<EnforcementOutcome>) {
        let admin = event.actor_display();
        let text = match result {
            Ok(outcome) => {
                let key = match outcome.action_taken {
                    ActionTaken::Banned => MessageKey::AdminBanned,
                    ActionTaken::Demoted => MessageKey::AdminDemoted,
                    _ => return,
                };
                self.messages.render(
                    key,
                    &[
                        ("admin", admin.as_str()),
                        ("member", event.target_display().as_str()),
                        ("timestamp", Utc::now().format("%Y-%m-%d %H:%M:%S").to_string().as_str()),
                    ],
                )
            }
            Err(GuardError::InsufficientBotPrivilege { missing, .. }) => self.messages.render(
                MessageKey::BotMissingRights,
                &[("admin", admin.as_str()), ("missing", missing.join(", ").as_str())],
            ),
            Err(e) => {
                error!("Enforcement in channel {} failed: {}", event.channel_id, e);
                self.messages
                    .render(MessageKey::EnforcementFailed, &[("admin", admin.as_str()), ("reason", e.to_string().as_str())])
            }
        };

        self.send(event.channel_id, Reply::text(text)).await;
    }

    async fn record(&self, event: &MembershipEvent, action: ActionTaken, reason: String) {
        self.audit
            .record(AuditRecord::new(
                event.channel_id,
                event.actor_user_id,
                event.target_user_id,
                action,
                reason,
            ))
            .await;
    }

    pub async fn handle_command(&self, message: CommandMessage) {
        let command = match self.parser.parse(&message.text) {
            Some(command) => command,
            None => return,
        };

        info!(
            "Executing command '{}' for user {} in chat {}",
            command.name(),
            message.username.as_deref().unwrap_or("?"),
            message.chat_id
        );

        let reply = match self.authorize(message.chat_id, message.user_id, &command).await {
            Some(denied) => denied,
            None => self.execute(message.chat_id, command).await,
        };

        self.send(message.chat_id, reply).await;
    }

    pub async fn handle_callback(&self, press: CallbackPress) {
        if let Err(e) = self.platform.answer_callback_query(&press.id).await {
            debug!("Failed to answer callback {}: {}", press.id, e);
        }

        let action = match MenuAction::from_callback(&press.data) {
            Some(action) => action,
            None => {
                warn!("Unknown callback data: {}", press.data);
                return;
            }
        };

        let reply = match action {
            MenuAction::MainMenu => self.welcome(),
            MenuAction::AddChannel => Reply::with_keyboard(
                self.messages.get(MessageKey::AddChannelInstructions),
                vec![
                    vec![self.button(MessageKey::ButtonConfirmAddChannel, MenuAction::ConfirmAddChannel)],
                    vec![self.button(MessageKey::ButtonMainMenu, MenuAction::MainMenu)],
                ],
            ),
            other => {
                let command = match other.as_command() {
                    Some(command) => command,
                    None => return,
                };
                let reply = match self.authorize(press.chat_id, press.user_id, &command).await {
                    Some(denied) => denied,
                    None => self.execute(press.chat_id, command).await,
                };
                Reply::with_keyboard(
                    reply.text,
                    vec![vec![self.button(MessageKey::ButtonMainMenu, MenuAction::MainMenu)]],
                )
            }
        };

        if let Err(e) = self
            .platform
            .edit_message_text(press.chat_id, press.message_id, &reply.text, reply.keyboard.as_ref())
            .await
        {
            error!("Failed to update menu in chat {}: {}", press.chat_id, e);
        }
    }

    /// A denial reply if the caller lacks the privilege the command needs
    async fn authorize(&self, chat_id: ChatId, user_id: UserId, command: &BotCommand) -> Option<Reply> {
        let required = command.required_privilege();
        if required == PrivilegeLevel::None {
            return None;
        }

        let level = self
            .admin_manager
            .verify_admin_status(chat_id, user_id)
            .await
            .unwrap_or(PrivilegeLevel::None);

        if level >= required {
            return None;
        }

        debug!("User {} denied '{}' in chat {}", user_id, command.name(), chat_id);
        let key = match required {
            PrivilegeLevel::Owner => MessageKey::OnlyCreatorAllowed,
            _ => MessageKey::Unauthorized,
        };
        Some(Reply::text(self.messages.get(key)))
    }

    async fn execute(&self, chat_id: ChatId, command: BotCommand) -> Reply {
        let name = command.name();
        match self.run_command(chat_id, command).await {
            Ok(reply) => reply,
            Err(GuardError::UnregisteredChannel(_)) => Reply::text(self.messages.get(MessageKey::NotConfigured)),
            Err(e) => {
                error!("Command '{}' failed in chat {}: {}", name, chat_id, e);
                Reply::text(self.messages.get(MessageKey::CommandFailed))
            }
        }
    }

    async fn run_command(&self, chat_id: ChatId, command: BotCommand) -> GuardResult<Reply> {
        let reply = match command {
            BotCommand::Start => self.welcome(),
            BotCommand::Help => Reply::text(self.messages.get(MessageKey::Help)),
            BotCommand::Status => Reply::text(self.status_text(chat_id).await?),
            BotCommand::Logs => Reply::text(self.logs_text(chat_id).await),
            BotCommand::Config(ConfigRequest::Show) => Reply::text(self.config_text(chat_id).await?),
            BotCommand::Config(ConfigRequest::Invalid) => Reply::text(self.messages.get(MessageKey::ConfigUsage)),
            BotCommand::Config(ConfigRequest::Set { setting, enabled }) => {
                match setting {
                    ConfigSetting::AutoBan => self.config.set_auto_ban(chat_id, enabled).await?,
                    ConfigSetting::Notify => self.config.set_notify_owner(chat_id, enabled).await?,
                };
                Reply::text(self.messages.render(
                    MessageKey::ConfigUpdated,
                    &[("setting", setting.as_str()), ("value", self.messages.on_off(enabled))],
                ))
            }
            BotCommand::AddAdmin(arg) => Reply::text(self.add_admin(chat_id, arg).await?),
            BotCommand::RemoveAdmin(arg) => Reply::text(self.remove_admin(chat_id, arg).await?),
            BotCommand::ListAdmins => Reply::text(self.list_admins_text(chat_id).await?),
            BotCommand::AddChannel => {
                let key = if self.config.register_channel(chat_id).await? {
                    MessageKey::ChannelAddedSuccess
                } else {
                    MessageKey::ChannelAlreadyProtected
                };
                Reply::text(self.messages.get(key))
            }
            BotCommand::RemoveChannel => {
                if !self.config.unregister_channel(chat_id).await? {
                    return Err(GuardError::UnregisteredChannel(chat_id));
                }
                Reply::text(self.messages.get(MessageKey::ChannelRemovedSuccess))
            }
        };

        Ok(reply)
    }

    async fn add_admin(&self, chat_id: ChatId, arg: UserArg) -> GuardResult<String> {
        let user_id = match arg {
            UserArg::Missing => return Ok(self.messages.get(MessageKey::AddAdminUsage).to_string()),
            UserArg::Invalid(_) => return Ok(self.messages.get(MessageKey::InvalidUserId).to_string()),
            UserArg::Id(id) => id,
        };

        match self.admin_manager.verify_admin_status(chat_id, user_id).await {
            Ok(PrivilegeLevel::Admin) | Ok(PrivilegeLevel::Owner) => {}
            Ok(PrivilegeLevel::None) | Err(GuardError::LookupError { .. }) => {
                return Ok(self.messages.get(MessageKey::AdminAddFailed).to_string());
            }
            Err(e) => return Err(e),
        }

        self.config.register_channel(chat_id).await?;
        self.config.add_authorized_admin(chat_id, user_id).await?;

        Ok(self
            .messages
            .render(MessageKey::AdminAddedSuccess, &[("admin_id", user_id.to_string().as_str())]))
    }

    async fn remove_admin(&self, chat_id: ChatId, arg: UserArg) -> GuardResult<String> {
        let user_id = match arg {
            UserArg::Missing => return Ok(self.messages.get(MessageKey::RemoveAdminUsage).to_string()),
            UserArg::Invalid(_) => return Ok(self.messages.get(MessageKey::InvalidUserId).to_string()),
            UserArg::Id(id) => id,
        };

        if !self.config.remove_authorized_admin(chat_id, user_id).await? {
            return Ok(self.messages.get(MessageKey::AdminNotMonitored).to_string());
        }

        Ok(self
            .messages
            .render(MessageKey::AdminRemovedSuccess, &[("admin_id", user_id.to_string().as_str())]))
    }

    async fn list_admins_text(&self, chat_id: ChatId) -> GuardResult<String> {
        let config = self
            .config
            .get(chat_id)
            .await
            .ok_or(GuardError::UnregisteredChannel(chat_id))?;

        if config.authorized_admins.is_empty() {
            return Ok(self.messages.get(MessageKey::NoMonitoredAdmins).to_string());
        }

        let mut text = self.messages.get(MessageKey::MonitoredAdminsHeader).to_string();
        for (index, admin_id) in config.authorized_admins.iter().enumerate() {
            let (name, status) = match self.admin_manager.lookup_member(chat_id, *admin_id).await {
                Ok(member) => {
                    let name = match member.username {
                        Some(username) => format!("@{}", username),
                        None => member.first_name,
                    };
                    let status = match member.status {
                        MemberStatus::Creator => MessageKey::StatusOwner,
                        MemberStatus::Admin => MessageKey::StatusAdmin,
                        _ => MessageKey::StatusNone,
                    };
                    (name, status)
                }
                Err(e) => {
                    debug!("Lookup of trusted admin {} failed: {}", admin_id, e);
                    (admin_id.to_string(), MessageKey::StatusUnknown)
                }
            };

            text.push_str(&self.messages.render(
                MessageKey::MonitoredAdminEntry,
                &[
                    ("index", (index + 1).to_string().as_str()),
                    ("name", name.as_str()),
                    ("admin_id", admin_id.to_string().as_str()),
                    ("status", self.messages.get(status)),
                ],
            ));
        }

        Ok(text)
    }

    async fn status_text(&self, chat_id: ChatId) -> GuardResult<String> {
        let channels = self.config.snapshot().await;
        let config = channels.get(&chat_id);

        let bot_rights = match self.admin_manager.check_bot_permissions(chat_id).await {
            Ok(missing) if missing.is_empty() => "✅".to_string(),
            Ok(missing) => format!("❌ {}", missing.join(", ")),
            Err(e) => {
                debug!("Permission check for status failed: {}", e);
                self.messages.get(MessageKey::StatusUnknown).to_string()
            }
        };

        let last_removal = match self.monitor.recent_removals(chat_id, 1).await.first() {
            Some(removal) => format!(
                "{} → {} ({})",
                removal.actor_user_id,
                removal.target_user_id,
                removal.timestamp.format("%Y-%m-%d %H:%M")
            ),
            None => "-".to_string(),
        };

        Ok(self.messages.render(
            MessageKey::Status,
            &[
                ("protected_channels", channels.len().to_string().as_str()),
                (
                    "authorized_admins",
                    config.map(|c| c.authorized_admins.len()).unwrap_or(0).to_string().as_str(),
                ),
                ("auto_ban", self.messages.on_off(config.map(|c| c.auto_ban_enabled).unwrap_or(false))),
                ("bot_rights", bot_rights.as_str()),
                ("last_removal", last_removal.as_str()),
                ("timestamp", Utc::now().format("%Y-%m-%d %H:%M:%S").to_string().as_str()),
            ],
        ))
    }

    async fn config_text(&self, chat_id: ChatId) -> GuardResult<String> {
        let channels = self.config.snapshot().await;
        let config = channels
            .get(&chat_id)
            .ok_or(GuardError::UnregisteredChannel(chat_id))?;

        Ok(self.messages.render(
            MessageKey::ConfigDisplay,
            &[
                ("auto_ban", self.messages.on_off(config.auto_ban_enabled)),
                ("notify", self.messages.on_off(config.notify_owner)),
                ("protected_count", channels.len().to_string().as_str()),
                ("authorized_count", config.authorized_admins.len().to_string().as_str()),
            ],
        ))
    }

    async fn logs_text(&self, chat_id: ChatId) -> String {
        let records = self.audit.recent_for_channel(chat_id, LOGS_SHOWN).await;
        if records.is_empty() {
            return self.messages.get(MessageKey::NoLogs).to_string();
        }

        records.iter().fold(
            self.messages.get(MessageKey::LogsHeader).to_string(),
            |mut text, record| {
                text.push_str(&self.messages.render(
                    MessageKey::LogEntry,
                    &[
                        ("time", record.timestamp.format("%Y-%m-%d %H:%M").to_string().as_str()),
                        ("action", record.action_taken.as_str()),
                        ("actor", record.actor_user_id.to_string().as_str()),
                        ("target", record.target_user_id.to_string().as_str()),
                    ],
                ));
                text
            },
        )
    }

    fn welcome(&self) -> Reply {
        Reply::with_keyboard(
            self.messages.get(MessageKey::Welcome),
            vec![
                vec![self.button(MessageKey::ButtonAddChannel, MenuAction::AddChannel)],
                vec![
                    self.button(MessageKey::ButtonListAdmins, MenuAction::ListAdmins),
                    self.button(MessageKey::ButtonStatus, MenuAction::Status),
                ],
                vec![
                    self.button(MessageKey::ButtonLogs, MenuAction::Logs),
                    self.button(MessageKey::ButtonConfig, MenuAction::Config),
                ],
                vec![self.button(MessageKey::ButtonHelp, MenuAction::Help)],
            ],
        )
    }

    fn button(&self, label: MessageKey, action: MenuAction) -> InlineButton {
        InlineButton::new(self.messages.get(label), action.callback_data())
    }

    async fn send(&self, chat_id: ChatId, reply: Reply) {
        if let Err(e) = self
            .platform
            .send_message(chat_id, &reply.text, reply.keyboard.as_ref())
            .await
        {
            error!("Failed to send message to chat {}: {}", chat_id, e);
        }
    }
}

fn removal_verb(transition: Transition) -> &'static str {
    match transition {
        Transition::Ban => "banned",
        Transition::Restriction => "restricted",
        _ => "changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::messages::Language;
    use crate::platforms::mock::{Call, MockPlatform};
    use tempfile::{tempdir, TempDir};

    const BOT: UserId = 1000;
    const C1: ChatId = -1001;
    const C2: ChatId = -1002;
    const OWNER: UserId = 10;
    const U1: UserId = 1;
    const U2: UserId = 2;
    const U3: UserId = 3;

    struct Harness {
        _dir: TempDir,
        platform: Arc<MockPlatform>,
        bot: GuardBot,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let settings = BotSettings {
            language: Language::En,
            actions_log: dir.path().join("actions.jsonl"),
            channels_file: dir.path().join("channels.json"),
            ..BotSettings::default()
        };

        let config = ConfigStore::open(&settings.channels_file).await;
        config.register_channel(C1).await.unwrap();
        config.add_authorized_admin(C1, U1).await.unwrap();

        let platform = Arc::new(MockPlatform::new(BOT));
        platform.grant_bot_rights(C1);
        platform.set_member(C1, OWNER, MemberStatus::Creator);
        platform.set_member(C1, U2, MemberStatus::Admin);

        let bot = GuardBot::new(platform.clone(), config, &settings).await.unwrap();
        Harness { _dir: dir, platform, bot }
    }

    fn ban(channel_id: ChatId, actor: UserId, target: UserId) -> MembershipEvent {
        MembershipEvent {
            channel_id,
            actor_user_id: actor,
            target_user_id: target,
            old_status: MemberStatus::Member,
            new_status: MemberStatus::Banned,
            timestamp: Utc::now(),
            actor_privilege: None,
            actor_name: None,
            target_name: None,
        }
    }

    fn command(user_id: UserId, text: &str) -> CommandMessage {
        CommandMessage {
            chat_id: C1,
            chat_kind: ChatKind::Supergroup,
            message_id: 1,
            user_id,
            username: None,
            text: text.to_string(),
        }
    }

    fn last_message(platform: &MockPlatform) -> String {
        platform.sent_messages().pop().unwrap_or_default()
    }

    #[test_log::test(tokio::test)]
    async fn test_unauthorized_admin_ban_is_enforced() {
        let h = harness().await;

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await;

        assert!(result.is_abusive());
        assert_eq!(h.platform.enforcement_calls(), vec![Call::Demote(C1, U2), Call::Ban(C1, U2)]);

        let records = h.bot.audit().recent(10).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_user_id, U2);
        assert_eq!(records[0].action_taken, ActionTaken::Banned);
        assert!(last_message(&h.platform).contains("Banned admin: 2"));
    }

    #[tokio::test]
    async fn test_auto_ban_disabled_only_demotes() {
        let h = harness().await;
        h.bot.config().set_auto_ban(C1, false).await.unwrap();

        h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await;

        assert_eq!(h.platform.enforcement_calls(), vec![Call::Demote(C1, U2)]);
        assert_eq!(h.bot.audit().recent(10).await[0].action_taken, ActionTaken::Demoted);
    }

    #[tokio::test]
    async fn test_authorized_admin_ban_is_benign() {
        let h = harness().await;

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, U1, U3)).await;

        assert_eq!(result, Classification::Benign);
        assert!(h.platform.enforcement_calls().is_empty());
        let records = h.bot.audit().recent(10).await;
        assert!(records.iter().all(|r| r.action_taken == ActionTaken::None));
    }

    #[tokio::test]
    async fn test_owner_ban_is_benign() {
        let h = harness().await;

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, OWNER, U3)).await;

        assert_eq!(result, Classification::Benign);
        assert!(h.platform.enforcement_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_channel_makes_no_calls() {
        let h = harness().await;

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C2, U2, U3)).await;

        assert!(matches!(result, Classification::Ignored { .. }));
        assert!(h.platform.calls().is_empty());
        assert!(h.bot.audit().recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_private_chats_are_not_monitored() {
        let h = harness().await;

        let result = h.bot.handle_member_change(ChatKind::Group, ban(C1, U2, U3)).await;

        assert!(matches!(result, Classification::Ignored { .. }));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bot_rights_are_reported() {
        let h = harness().await;
        h.platform.set_member(C1, BOT, MemberStatus::Member);

        h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await;

        assert!(h.platform.enforcement_calls().is_empty());
        let records = h.bot.audit().recent(10).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action_taken, ActionTaken::None);
        assert!(last_message(&h.platform).contains("Missing rights"));
    }

    #[tokio::test]
    async fn test_notifications_can_be_disabled() {
        let h = harness().await;
        h.bot.config().set_notify_owner(C1, false).await.unwrap();

        h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await;

        assert_eq!(h.platform.enforcement_calls().len(), 2);
        assert!(h.platform.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_trusted_admin_burst_is_warned() {
        let h = harness().await;

        for target in 100..106 {
            h.bot.handle_member_change(ChatKind::Channel, ban(C1, U1, target)).await;
        }

        assert!(h.platform.enforcement_calls().is_empty());
        let records = h.bot.audit().recent(10).await;
        assert_eq!(records.len(), 6);
        assert_eq!(records[4].action_taken, ActionTaken::None);
        assert_eq!(records[5].action_taken, ActionTaken::Warned);
        assert!(last_message(&h.platform).contains("removed 6 members within 60 minutes"));
    }

    #[tokio::test]
    async fn test_bot_own_actions_are_ignored() {
        let h = harness().await;
        let mut demotion = ban(C1, BOT, U2);
        demotion.old_status = MemberStatus::Admin;

        let result = h.bot.handle_member_change(ChatKind::Channel, demotion).await;

        assert!(matches!(result, Classification::Ignored { .. }));
        assert!(h.bot.audit().recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_add_admin_flow() {
        let h = harness().await;
        h.platform.set_member(C1, 5, MemberStatus::Admin);
        h.platform.set_member(C1, 6, MemberStatus::Member);

        h.bot.handle_command(command(OWNER, "/add_admin 5")).await;
        assert!(last_message(&h.platform).contains("Admin 5 added"));
        assert!(h.bot.config().get(C1).await.unwrap().is_authorized(5));

        h.bot.handle_command(command(OWNER, "/add_admin 6")).await;
        assert!(last_message(&h.platform).contains("Could not add"));

        h.bot.handle_command(command(OWNER, "/add_admin abc")).await;
        assert!(last_message(&h.platform).contains("Invalid user id"));

        h.bot.handle_command(command(OWNER, "/add_admin")).await;
        assert!(last_message(&h.platform).contains("Usage"));

        h.bot.handle_command(command(U2, "/add_admin 5")).await;
        assert!(last_message(&h.platform).contains("only available to the channel owner"));
    }

    #[tokio::test]
    async fn test_remove_admin_and_list() {
        let h = harness().await;

        h.bot.handle_command(command(U2, "/list_admins")).await;
        let listing = last_message(&h.platform);
        assert!(listing.contains("(1)"));
        assert!(listing.contains("unknown"));

        h.bot.handle_command(command(OWNER, "/remove_admin 1")).await;
        assert!(last_message(&h.platform).contains("removed from the trusted list"));

        h.bot.handle_command(command(OWNER, "/remove_admin 1")).await;
        assert!(last_message(&h.platform).contains("not on the trusted list"));

        h.bot.handle_command(command(OWNER, "/list_admins")).await;
        assert!(last_message(&h.platform).contains("no trusted admins"));
    }

    #[tokio::test]
    async fn test_config_toggles() {
        let h = harness().await;

        h.bot.handle_command(command(OWNER, "/config autoban off")).await;
        assert!(last_message(&h.platform).contains("autoban = off"));
        assert!(!h.bot.config().get(C1).await.unwrap().auto_ban_enabled);

        h.bot.handle_command(command(U2, "/config notify off")).await;
        assert!(h.bot.config().get(C1).await.unwrap().notify_owner);

        h.bot.handle_command(command(U2, "/config")).await;
        assert!(last_message(&h.platform).contains("Auto ban: off"));

        h.bot.handle_command(command(OWNER, "/config autoban sometimes")).await;
        assert!(last_message(&h.platform).contains("Usage"));
    }

    #[tokio::test]
    async fn test_status_and_logs_need_admin() {
        let h = harness().await;
        h.platform.set_member(C1, U3, MemberStatus::Member);

        h.bot.handle_command(command(U3, "/status")).await;
        assert!(last_message(&h.platform).contains("not allowed"));

        h.bot.handle_command(command(U2, "/logs")).await;
        assert!(last_message(&h.platform).contains("No records"));

        h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await;
        h.bot.handle_command(command(OWNER, "/logs")).await;
        assert!(last_message(&h.platform).contains("banned (actor: 1000, target: 2)"));

        h.bot.handle_command(command(U2, "/status")).await;
        let status = last_message(&h.platform);
        assert!(status.contains("Protected channels: 1"));
        assert!(status.contains("Bot rights: ✅"));
        assert!(status.contains("Last ban or restriction: 2 → 3"));
    }

    #[tokio::test]
    async fn test_channel_registration_commands() {
        let h = harness().await;

        h.bot.handle_command(command(OWNER, "/add_channel")).await;
        assert!(last_message(&h.platform).contains("already protected"));

        h.bot.handle_command(command(OWNER, "/remove_channel")).await;
        assert!(last_message(&h.platform).contains("no longer protected"));
        assert!(!h.bot.config().is_registered(C1).await);

        h.bot.handle_command(command(OWNER, "/config")).await;
        assert!(last_message(&h.platform).contains("not protected yet"));

        h.bot.handle_command(command(OWNER, "/add_channel")).await;
        assert!(last_message(&h.platform).contains("now protected"));
    }

    #[tokio::test]
    async fn test_start_and_help_need_no_privilege() {
        let h = harness().await;

        h.bot.handle_command(command(999, "/start")).await;
        assert!(last_message(&h.platform).starts_with("🛡️ Welcome"));
        h.bot.handle_command(command(999, "/help@guardbot")).await;
        assert!(last_message(&h.platform).contains("Bot commands"));
        assert!(!h.platform.calls().iter().any(|c| matches!(c, Call::GetChatMember(..))));
    }

    #[tokio::test]
    async fn test_menu_callbacks_edit_in_place() {
        let h = harness().await;
        let press = |data: &str| CallbackPress {
            id: format!("cb-{}", data),
            chat_id: C1,
            message_id: 77,
            user_id: OWNER,
            username: None,
            data: data.to_string(),
        };

        h.bot.handle_callback(press("status")).await;
        h.bot.handle_callback(press("main_menu")).await;
        h.bot.handle_callback(press("bogus")).await;

        let calls = h.platform.calls();
        assert!(calls.contains(&Call::Answer("cb-status".into())));
        assert!(calls.contains(&Call::Answer("cb-bogus".into())));

        let edits: Vec<String> = calls
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit(C1, 77, text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(edits.len(), 2);
        assert!(edits[0].contains("Bot status: active"));
        assert!(edits[1].starts_with("🛡️ Welcome"));
    }

    #[tokio::test]
    async fn test_unverifiable_actor_is_not_enforced() {
        let h = harness().await;
        h.platform.queue_member_error(ApiError::Transient("timed out".into()));

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, OWNER, U3)).await;

        assert!(matches!(result, Classification::Ignored { .. }));
        assert!(h.platform.enforcement_calls().is_empty());
        assert!(h.platform.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_departed_actor_is_still_evaluated() {
        let h = harness().await;
        h.platform.set_member(C1, 7, MemberStatus::Left);
        h.platform.queue_demote_result(Err(ApiError::NotFound("Bad Request: user not found".into())));

        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, 7, U3)).await;

        assert!(result.is_abusive());
        assert_eq!(h.platform.enforcement_calls(), vec![Call::Demote(C1, 7)]);
        assert_eq!(h.bot.audit().recent(10).await[0].action_taken, ActionTaken::None);
    }

    #[tokio::test]
    async fn test_anonymous_admin_is_skipped() {
        let h = harness().await;

        let result = h
            .bot
            .handle_member_change(ChatKind::Supergroup, ban(C1, ANONYMOUS_ADMIN_USER_ID, U3))
            .await;

        assert!(matches!(result, Classification::Ignored { .. }));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_loosening_restrictions_is_benign() {
        let h = harness().await;
        let mut edit = ban(C1, U2, U3);
        edit.old_status = MemberStatus::Restricted;
        edit.new_status = MemberStatus::Restricted;

        let result = h.bot.handle_member_change(ChatKind::Supergroup, edit).await;

        assert_eq!(result, Classification::Benign);
        assert!(h.platform.enforcement_calls().is_empty());
        assert!(h.bot.audit().recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_event_from_removed_admin_is_handled_independently() {
        let h = harness().await;

        assert!(h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await.is_abusive());

        // A late event from the same admin arrives after they were banned
        h.platform.set_member(C1, U2, MemberStatus::Banned);
        h.platform.queue_demote_result(Err(ApiError::NotFound("Bad Request: user not found".into())));
        let messages_before = h.platform.sent_messages().len();

        assert!(h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, 4)).await.is_abusive());

        let records = h.bot.audit().recent(10).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action_taken, ActionTaken::Banned);
        assert_eq!(records[1].action_taken, ActionTaken::None);
        assert_eq!(records[1].reason, admin_manager::REASON_TARGET_ABSENT);
        assert_eq!(h.platform.sent_messages().len(), messages_before);
    }

    #[tokio::test]
    async fn test_each_event_uses_current_allow_list() {
        let h = harness().await;
        h.bot.config().set_auto_ban(C1, false).await.unwrap();

        assert!(h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, U3)).await.is_abusive());

        h.bot.config().add_authorized_admin(C1, U2).await.unwrap();
        let result = h.bot.handle_member_change(ChatKind::Channel, ban(C1, U2, 4)).await;

        assert_eq!(result, Classification::Benign);
        assert_eq!(h.platform.enforcement_calls(), vec![Call::Demote(C1, U2)]);
    }
}
