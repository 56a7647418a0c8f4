// src/bot/commands.rs - Text command and menu callback parsing

use log::debug;

use crate::types::{PrivilegeLevel, UserId};

/// Numeric user argument of add_admin / remove_admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserArg {
    Missing,
    Invalid(String),
    Id(UserId),
}

impl UserArg {
    fn parse(args: &[&str]) -> Self {
        match args.first() {
            None => UserArg::Missing,
            Some(raw) => raw
                .parse::<UserId>()
                .map(UserArg::Id)
                .unwrap_or_else(|_| UserArg::Invalid(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSetting {
    AutoBan,
    Notify,
}

impl ConfigSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSetting::AutoBan => "autoban",
            ConfigSetting::Notify => "notify",
        }
    }
}

/// What a `config` command asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigRequest {
    Show,
    Set { setting: ConfigSetting, enabled: bool },
    Invalid,
}

impl ConfigRequest {
    fn parse(args: &[&str]) -> Self {
        match args {
            [] => ConfigRequest::Show,
            [setting, value] => {
                let setting = match setting.to_lowercase().as_str() {
                    "autoban" | "auto_ban" => ConfigSetting::AutoBan,
                    "notify" | "notifications" => ConfigSetting::Notify,
                    _ => return ConfigRequest::Invalid,
                };
                match parse_switch(value) {
                    Some(enabled) => ConfigRequest::Set { setting, enabled },
                    None => ConfigRequest::Invalid,
                }
            }
            _ => ConfigRequest::Invalid,
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "enable" | "1" => Some(true),
        "off" | "false" | "disable" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Status,
    Logs,
    Config(ConfigRequest),
    AddAdmin(UserArg),
    RemoveAdmin(UserArg),
    ListAdmins,
    AddChannel,
    RemoveChannel,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::Status => "status",
            BotCommand::Logs => "logs",
            BotCommand::Config(_) => "config",
            BotCommand::AddAdmin(_) => "add_admin",
            BotCommand::RemoveAdmin(_) => "remove_admin",
            BotCommand::ListAdmins => "list_admins",
            BotCommand::AddChannel => "add_channel",
            BotCommand::RemoveChannel => "remove_channel",
        }
    }

    /// Lowest privilege in the chat allowed to run the command
    pub fn required_privilege(&self) -> PrivilegeLevel {
        match self {
            BotCommand::Start | BotCommand::Help => PrivilegeLevel::None,
            BotCommand::Status | BotCommand::Logs | BotCommand::ListAdmins => PrivilegeLevel::Admin,
            BotCommand::Config(ConfigRequest::Set { .. }) => PrivilegeLevel::Owner,
            BotCommand::Config(_) => PrivilegeLevel::Admin,
            BotCommand::AddAdmin(_)
            | BotCommand::RemoveAdmin(_)
            | BotCommand::AddChannel
            | BotCommand::RemoveChannel => PrivilegeLevel::Owner,
        }
    }
}

/// Parses `/command@botname args` messages
pub struct CommandParser {
    command_prefix: String,
    bot_username: Option<String>,
}

impl CommandParser {
    pub fn new(bot_username: Option<String>) -> Self {
        Self {
            command_prefix: "/".to_string(),
            bot_username: bot_username.map(|name| name.to_lowercase()),
        }
    }

    /// `None` for plain text, unknown commands and commands addressed to another bot
    pub fn parse(&self, text: &str) -> Option<BotCommand> {
        let content = text.trim().strip_prefix(&self.command_prefix)?;
        let parts: Vec<&str> = content.split_whitespace().collect();
        let (head, args) = parts.split_first()?;

        let (name, addressee) = match head.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee.to_lowercase())),
            None => (*head, None),
        };

        if let (Some(addressee), Some(ours)) = (&addressee, &self.bot_username) {
            if addressee != ours {
                debug!("Ignoring command for another bot: {}", head);
                return None;
            }
        }

        let command = match name.to_lowercase().as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "status" => BotCommand::Status,
            "logs" => BotCommand::Logs,
            "config" => BotCommand::Config(ConfigRequest::parse(args)),
            "add_admin" => BotCommand::AddAdmin(UserArg::parse(args)),
            "remove_admin" => BotCommand::RemoveAdmin(UserArg::parse(args)),
            "list_admins" => BotCommand::ListAdmins,
            "add_channel" => BotCommand::AddChannel,
            "remove_channel" => BotCommand::RemoveChannel,
            other => {
                debug!("Unknown command: {}", other);
                return None;
            }
        };

        Some(command)
    }
}

/// Inline menu buttons, identified by their callback data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    AddChannel,
    ConfirmAddChannel,
    ListAdmins,
    Status,
    Help,
    Logs,
    Config,
    MainMenu,
}

impl MenuAction {
    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            "add_channel" => Some(MenuAction::AddChannel),
            "confirm_add_channel" => Some(MenuAction::ConfirmAddChannel),
            "list_admins" => Some(MenuAction::ListAdmins),
            "status" => Some(MenuAction::Status),
            "help" => Some(MenuAction::Help),
            "logs" => Some(MenuAction::Logs),
            "config" => Some(MenuAction::Config),
            "main_menu" => Some(MenuAction::MainMenu),
            _ => None,
        }
    }

    pub fn callback_data(&self) -> &'static str {
        match self {
            MenuAction::AddChannel => "add_channel",
            MenuAction::ConfirmAddChannel => "confirm_add_channel",
            MenuAction::ListAdmins => "list_admins",
            MenuAction::Status => "status",
            MenuAction::Help => "help",
            MenuAction::Logs => "logs",
            MenuAction::Config => "config",
            MenuAction::MainMenu => "main_menu",
        }
    }

    /// The command a button stands for, if it maps onto one
    pub fn as_command(&self) -> Option<BotCommand> {
        match self {
            MenuAction::ConfirmAddChannel => Some(BotCommand::AddChannel),
            MenuAction::ListAdmins => Some(BotCommand::ListAdmins),
            MenuAction::Status => Some(BotCommand::Status),
            MenuAction::Help => Some(BotCommand::Help),
            MenuAction::Logs => Some(BotCommand::Logs),
            MenuAction::Config => Some(BotCommand::Config(ConfigRequest::Show)),
            MenuAction::AddChannel | MenuAction::MainMenu => None,
        }
    }
}
