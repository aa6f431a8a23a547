//! src/router/dlq_fallback.rs
//!
//! Last-resort append-only local file used when a DLQ stream write itself
//! fails. One file per UTC day, capped in size so a wedged forwarding path
//! can't fill the disk.

use std::path::PathBuf;

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const MAX_DLQ_FILE_BYTES: u64 = 100 * 1024 * 1024;

pub struct DlqFallback {
    dir: PathBuf,
}

impl DlqFallback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, now_ms: i64) -> PathBuf {
        let date = chrono_date_from_ms(now_ms);
        self.dir.join(format!("dlq-forwarding-fallback-{date}.jsonl"))
    }

    /// Appends `line` (expected to be a single JSON object, newline added
    /// here) to today's file. Returns `Err` if the file is already at
    /// capacity or the write fails for any other reason.
    pub async fn append(&self, line: &str, now_ms: i64) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(now_ms);

        if let Ok(meta) = fs::metadata(&path).await {
            if meta.len() >= MAX_DLQ_FILE_BYTES {
                return Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "dlq fallback file at capacity"));
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

fn chrono_date_from_ms(now_ms: i64) -> String {
    chrono::DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_lines_and_creates_directory() {
        let dir = std::env::temp_dir().join(format!("dlq-fallback-test-{}", uuid::Uuid::new_v4()));
        let fallback = DlqFallback::new(&dir);
        fallback.append(r#"{"opportunityId":"o1"}"#, 1_700_000_000_000).await.unwrap();
        fallback.append(r#"{"opportunityId":"o2"}"#, 1_700_000_000_000).await.unwrap();

        let path = fallback.path_for(1_700_000_000_000);
        let contents = fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);

        let _ = fs::remove_dir_all(&dir).await;
    }
}
