use anyhow::{Context, Result};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

use channelguard::logging;
use channelguard::prelude::*;

const SETTINGS_FILE: &str = "config/bot.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and settings, then initialize logging
    dotenv::dotenv().ok();
    let settings = BotSettings::load_or_create(Path::new(SETTINGS_FILE))
        .await
        .context("Failed to load bot settings")?;
    logging::init(&settings.log_dir)?;

    info!("Starting channel guard v{}", channelguard::VERSION);

    let store = ConfigStore::open(&settings.channels_file).await;

    let telegram_config = TelegramConfig::from_env(&settings)?;
    let client = Arc::new(TelegramClient::new(telegram_config)?);

    #[cfg(feature = "web")]
    {
        let port = settings.health_port;
        tokio::spawn(async move {
            if let Err(e) = HealthServer::start_server(port).await {
                error!("Health endpoint failed: {:#}", e);
            }
        });
    }

    let bot = GuardBot::new(client, store, &settings).await?;

    if let Err(e) = bot.run().await {
        error!("Bot stopped with error: {:#}", e);
        return Err(e);
    }

    info!("Channel guard stopped");
    Ok(())
}
