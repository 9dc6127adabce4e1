use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{Database, timestamp};

impl Database {
    /// Append one search-log entry. Callers treat this as best-effort.
    pub fn log_search(&self, keyword: &str, user_id: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO search_logs (keyword, user_id, created_at) VALUES (?1, ?2, ?3)",
                (keyword, user_id, timestamp(now)),
            )?;
            Ok(())
        })
    }
}
