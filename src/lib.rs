//! # Channel Guard
//!
//! A Telegram bot that protects channels from administrators who abuse their
//! rights. When an administrator who is not on the channel's trusted list bans
//! or restricts a member, the bot strips their admin rights, optionally bans
//! them, records the action and tells the channel what happened.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use channelguard::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = BotSettings::load_or_create(Path::new("config/bot.yaml")).await?;
//!     let store = ConfigStore::open(&settings.channels_file).await;
//!
//!     let client = TelegramClient::new(TelegramConfig::from_env(&settings)?)?;
//!     let bot = GuardBot::new(Arc::new(client), store, &settings).await?;
//!
//!     bot.run().await
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod types;

#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::GuardBot;
    pub use crate::config::{BotSettings, ConfigStore};
    pub use crate::error::{GuardError, GuardResult};
    pub use crate::platforms::{
        telegram::{TelegramClient, TelegramConfig},
        ChatPlatform,
    };
    pub use crate::types::{
        ActionTaken, AuditRecord, ChannelConfig, Classification, MemberStatus, MembershipEvent, PrivilegeLevel,
    };
    #[cfg(feature = "web")]
    pub use crate::web::HealthServer;
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
