// src/bot/audit.rs - Append-only JSON-lines action log

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::GuardResult;
use crate::types::{ActionTaken, AuditRecord, ChatId};

/// Writes one JSON object per processed event and answers queries over the log.
///
/// Records are never rewritten. The file is reopened for every append, so a
/// rotation that moves it away is picked up by the next write.
pub struct ActionLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActionLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, reporting IO failures to the caller
    pub async fn append(&self, record: &AuditRecord) -> GuardResult<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(
            "Audit: channel {} actor {} target {} -> {} ({})",
            record.channel_id, record.actor_user_id, record.target_user_id, record.action_taken, record.reason
        );
        Ok(())
    }

    /// Append a record; failures are logged and never propagate
    pub async fn record(&self, record: AuditRecord) {
        if let Err(e) = self.append(&record).await {
            error!("Failed to write audit record to {}: {}", self.path.display(), e);
        }
    }

    /// Most recent records, oldest first
    pub async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        self.query(limit, |_| true).await
    }

    pub async fn recent_for_channel(&self, channel_id: ChatId, limit: usize) -> Vec<AuditRecord> {
        self.query(limit, |r| r.channel_id == channel_id).await
    }

    pub async fn by_action(&self, action: ActionTaken, limit: usize) -> Vec<AuditRecord> {
        self.query(limit, |r| r.action_taken == action).await
    }

    async fn query<F>(&self, limit: usize, filter: F) -> Vec<AuditRecord>
    where
        F: Fn(&AuditRecord) -> bool,
    {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Actions log file not found: {}", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                error!("Error reading actions log: {}", e);
                return Vec::new();
            }
        };

        let matching: Vec<AuditRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<AuditRecord>(line).ok())
            .filter(|record| filter(record))
            .collect();

        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).collect()
    }
}
