//! Plain-text transcript of a run

use async_trait::async_trait;
use chrono::{DateTime, Local};
use duet_stream::{DeliveryError, Turn, TurnSink};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Appends every turn to a transcript file.
///
/// A topic marker is written before the first turn and whenever the topic
/// changes.
pub struct TranscriptSink {
    path: PathBuf,
    last_topic: Mutex<Option<String>>,
}

impl TranscriptSink {
    /// Create (or truncate) the transcript and write its header
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let started = Local::now().format("%Y-%m-%d %H:%M:%S");
        let header = format!("AI Discussion Stream - started {}\n{}\n\n", started, "=".repeat(50));
        tokio::fs::write(&path, header).await?;

        Ok(Self {
            path,
            last_topic: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn format_entry(turn: &Turn, topic_changed: bool) -> String {
    let local: DateTime<Local> = turn.timestamp.with_timezone(&Local);
    let clock = local.format("%H:%M:%S");
    let mut entry = String::new();
    if topic_changed {
        if let Some(topic) = &turn.topic {
            entry.push_str(&format!("\n[{}] Topic: {}\n\n", clock, topic));
        }
    }
    entry.push_str(&format!("[{}] {}: {}\n", clock, turn.agent_name, turn.text));
    entry
}

#[async_trait]
impl TurnSink for TranscriptSink {
    async fn deliver(&self, turn: &Turn, _cancel: CancellationToken) -> Result<(), DeliveryError> {
        // Held across the write: entries must not interleave
        let mut last_topic = self.last_topic.lock().await;
        let topic_changed = turn.topic.is_some() && *last_topic != turn.topic;
        let entry = format_entry(turn, topic_changed);

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        if topic_changed {
            *last_topic = turn.topic.clone();
        }
        Ok(())
    }
}
