// src/config/mod.rs - Runtime settings and the channel configuration store

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::bot::messages::Language;
use crate::error::{GuardError, GuardResult};
use crate::types::{ChannelConfig, ChatId, UserId};

/// Process-wide settings loaded from `bot.yaml` with environment overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub language: Language,
    pub channels_file: PathBuf,
    pub actions_log: PathBuf,
    pub log_dir: PathBuf,
    pub api_base_url: String,
    pub api_timeout_seconds: u64,
    pub poll_timeout_seconds: u64,
    /// Upper bound on a platform-requested rate limit backoff
    pub max_retry_after_seconds: u64,
    pub burst_ban_threshold: usize,
    pub burst_window_minutes: i64,
    pub health_port: u16,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            language: Language::Ar,
            channels_file: PathBuf::from("config/channels.json"),
            actions_log: PathBuf::from("logs/actions.jsonl"),
            log_dir: PathBuf::from("logs"),
            api_base_url: "https://api.telegram.org".to_string(),
            api_timeout_seconds: 30,
            poll_timeout_seconds: 25,
            max_retry_after_seconds: 60,
            burst_ban_threshold: 5,
            burst_window_minutes: 60,
            health_port: 5000,
        }
    }
}

impl BotSettings {
    /// Load settings from a YAML file, writing defaults when it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let content = fs::read_to_string(path).await?;
            match serde_yaml::from_str::<BotSettings>(&content) {
                Ok(settings) => {
                    debug!("Loaded bot settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse {}, using defaults: {}", path.display(), e);
                    BotSettings::default()
                }
            }
        } else {
            let settings = BotSettings::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, serde_yaml::to_string(&settings)?).await?;
            info!("Created default bot settings: {}", path.display());
            settings
        };

        Ok(settings.with_env_overrides())
    }

    /// Apply `PORT`, `BOT_LANGUAGE` and `CHANNELS_FILE` from the environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.health_port = port,
                Err(_) => warn!("Ignoring invalid PORT value '{}'", port),
            }
        }

        if let Ok(language) = env::var("BOT_LANGUAGE") {
            match language.parse::<Language>() {
                Ok(language) => self.language = language,
                Err(e) => warn!("{}", e),
            }
        }

        if let Ok(path) = env::var("CHANNELS_FILE") {
            self.channels_file = PathBuf::from(path);
        }

        self
    }
}

/// Persisted channel document: channel id -> settings
pub type ChannelMap = BTreeMap<ChatId, ChannelConfig>;

/// Parse a persisted channel document, filling in each entry's channel id
pub fn parse_channels(content: &str) -> GuardResult<ChannelMap> {
    let mut channels: ChannelMap =
        serde_json::from_str(content).map_err(|e| GuardError::ConfigCorrupt(e.to_string()))?;

    for (id, config) in channels.iter_mut() {
        config.channel_id = *id;
    }
    Ok(channels)
}

/// Read the channel document at `path`. A missing file is an empty store.
pub async fn load_channels(path: &Path) -> GuardResult<ChannelMap> {
    match fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(ChannelMap::new()),
        Ok(content) => parse_channels(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChannelMap::new()),
        Err(e) => Err(GuardError::Io(e)),
    }
}

/// Sole owner of the registered channels.
///
/// Readers get cloned snapshots. Every mutation is applied to a copy of the
/// document, persisted while holding the write lock, and only then swapped in,
/// so memory never runs ahead of disk.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    channels: Arc<RwLock<ChannelMap>>,
}

impl ConfigStore {
    /// Open the store. A corrupt document is logged and replaced by an empty configuration.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let channels = match load_channels(&path).await {
            Ok(channels) => {
                info!("Loaded {} protected channel(s) from {}", channels.len(), path.display());
                channels
            }
            Err(e) => {
                warn!("{} ({}), starting with an empty configuration", e, path.display());
                ChannelMap::new()
            }
        };

        Self {
            path,
            channels: Arc::new(RwLock::new(channels)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, channel_id: ChatId) -> Option<ChannelConfig> {
        self.channels.read().await.get(&channel_id).cloned()
    }

    pub async fn is_registered(&self, channel_id: ChatId) -> bool {
        self.channels.read().await.contains_key(&channel_id)
    }

    pub async fn snapshot(&self) -> ChannelMap {
        self.channels.read().await.clone()
    }

    /// Register a channel with default settings. Returns false if already present.
    pub async fn register_channel(&self, channel_id: ChatId) -> GuardResult<bool> {
        let mut channels = self.channels.write().await;
        if channels.contains_key(&channel_id) {
            return Ok(false);
        }

        let mut next = channels.clone();
        next.insert(channel_id, ChannelConfig::new(channel_id));
        self.persist(&next).await?;
        *channels = next;
        info!("Registered channel {} for protection", channel_id);
        Ok(true)
    }

    /// Remove a channel. Returns false if it was not registered.
    pub async fn unregister_channel(&self, channel_id: ChatId) -> GuardResult<bool> {
        let mut channels = self.channels.write().await;
        let mut next = channels.clone();
        if next.remove(&channel_id).is_none() {
            return Ok(false);
        }

        self.persist(&next).await?;
        *channels = next;
        info!("Unregistered channel {}", channel_id);
        Ok(true)
    }

    /// Add a user to the allow-list. Returns false if already present.
    pub async fn add_authorized_admin(&self, channel_id: ChatId, user_id: UserId) -> GuardResult<bool> {
        self.update(channel_id, |config| config.authorized_admins.insert(user_id))
            .await
    }

    /// Remove a user from the allow-list. Returns false if absent.
    pub async fn remove_authorized_admin(&self, channel_id: ChatId, user_id: UserId) -> GuardResult<bool> {
        self.update(channel_id, |config| config.authorized_admins.remove(&user_id))
            .await
    }

    pub async fn set_auto_ban(&self, channel_id: ChatId, enabled: bool) -> GuardResult<bool> {
        self.update(channel_id, |config| {
            let changed = config.auto_ban_enabled != enabled;
            config.auto_ban_enabled = enabled;
            changed
        })
        .await
    }

    pub async fn set_notify_owner(&self, channel_id: ChatId, enabled: bool) -> GuardResult<bool> {
        self.update(channel_id, |config| {
            let changed = config.notify_owner != enabled;
            config.notify_owner = enabled;
            changed
        })
        .await
    }

    /// Apply `mutate` to a registered channel, persisting only when it reports a change
    async fn update<F>(&self, channel_id: ChatId, mutate: F) -> GuardResult<bool>
    where
        F: FnOnce(&mut ChannelConfig) -> bool,
    {
        let mut channels = self.channels.write().await;
        let mut next = channels.clone();
        let config = next
            .get_mut(&channel_id)
            .ok_or(GuardError::UnregisteredChannel(channel_id))?;

        if !mutate(config) {
            return Ok(false);
        }

        self.persist(&next).await?;
        *channels = next;
        debug!("Updated configuration for channel {}", channel_id);
        Ok(true)
    }

    /// Write to a sibling temp file, then rename over the real one
    async fn persist(&self, channels: &ChannelMap) -> GuardResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(channels)
            .map_err(|e| GuardError::ConfigCorrupt(e.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
