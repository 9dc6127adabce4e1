use anyhow::Result;
use chrono::{DateTime, Utc};
use kbase_types::models::Vote;
use tracing::debug;

use crate::models::{FeedbackRow, VoteCounts};
use crate::queries::articles::article_exists;
use crate::queries::{Violation, constraint_violation};
use crate::{Database, timestamp};

/// Result of recording a vote. Business outcomes are values, not errors.
#[derive(Debug)]
pub enum FeedbackOutcome {
    Recorded(FeedbackRow),
    /// The caller already voted on this article; nothing was written.
    AlreadyVoted,
    ArticleMissing,
}

impl Database {
    /// Record a vote. The `UNIQUE(article_id, user_id)` constraint is what rejects a
    /// second vote, so two racing submissions can never both land.
    pub fn submit_feedback(
        &self,
        id: &str,
        article_id: &str,
        user_id: &str,
        vote: Vote,
        now: DateTime<Utc>,
    ) -> Result<FeedbackOutcome> {
        let created_at = timestamp(now);

        self.with_conn(|conn| {
            if !article_exists(conn, article_id)? {
                return Ok(FeedbackOutcome::ArticleMissing);
            }

            let inserted = conn.execute(
                "INSERT INTO feedback (id, article_id, user_id, vote, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, article_id, user_id, vote.as_str(), &created_at),
            );

            match inserted {
                Ok(_) => Ok(FeedbackOutcome::Recorded(FeedbackRow {
                    id: id.to_string(),
                    article_id: article_id.to_string(),
                    user_id: user_id.to_string(),
                    vote: vote.as_str().to_string(),
                    created_at,
                })),
                Err(e) => match constraint_violation(&e) {
                    Some(Violation::Unique) => {
                        debug!("Duplicate vote from {} on article {}", user_id, article_id);
                        Ok(FeedbackOutcome::AlreadyVoted)
                    }
                    // Article deleted between the existence check and the insert.
                    Some(Violation::ForeignKey) => Ok(FeedbackOutcome::ArticleMissing),
                    None => Err(e.into()),
                },
            }
        })
    }

    pub fn feedback_counts(&self, article_id: &str) -> Result<VoteCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(CASE WHEN vote = 'helpful' THEN 1 END),
                        COUNT(CASE WHEN vote = 'not helpful' THEN 1 END)
                 FROM feedback WHERE article_id = ?1",
                [article_id],
                |row| {
                    Ok(VoteCounts {
                        helpful: row.get(0)?,
                        not_helpful: row.get(1)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }
}
