//! Read-only aggregations over feedback, articles and the search log.
//!
//! Every ranking sorts by count descending with a deterministic secondary key,
//! and returns fewer than `limit` entries when there are fewer groups.

use anyhow::Result;
use kbase_types::models::Vote;
use rusqlite::Connection;

use crate::Database;
use crate::models::{AnalyticsSummary, ArticleVoteCount, KeywordCountRow};

pub const DEFAULT_LIMIT: u32 = 10;

impl Database {
    pub fn most_helpful(&self, limit: u32) -> Result<Vec<ArticleVoteCount>> {
        self.with_conn(|conn| vote_ranking(conn, Vote::Helpful, limit))
    }

    pub fn least_helpful(&self, limit: u32) -> Result<Vec<ArticleVoteCount>> {
        self.with_conn(|conn| vote_ranking(conn, Vote::NotHelpful, limit))
    }

    pub fn most_searched(&self, limit: u32) -> Result<Vec<KeywordCountRow>> {
        self.with_conn(|conn| keyword_ranking(conn, limit))
    }

    /// All dashboard figures, read under one lock so they agree with each other.
    pub fn analytics_summary(&self) -> Result<AnalyticsSummary> {
        self.with_conn(|conn| {
            let total_articles = count(conn, "articles")?;
            let total_feedbacks = count(conn, "feedback")?;
            let total_searches = count(conn, "search_logs")?;
            let most_helpful = vote_ranking(conn, Vote::Helpful, DEFAULT_LIMIT)?;
            let least_helpful = vote_ranking(conn, Vote::NotHelpful, DEFAULT_LIMIT)?;
            let most_searched = keyword_ranking(conn, DEFAULT_LIMIT)?;

            Ok(AnalyticsSummary {
                avg_helpfulness: avg_helpfulness(&most_helpful, total_feedbacks),
                total_articles,
                total_feedbacks,
                total_searches,
                most_searched,
                most_helpful,
                least_helpful,
            })
        })
    }
}

/// Helpful votes on the top-ranked articles as a rounded percentage of all
/// feedback. Zero when there is no feedback at all.
pub fn avg_helpfulness(top_helpful: &[ArticleVoteCount], total_feedbacks: i64) -> u32 {
    if total_feedbacks <= 0 {
        return 0;
    }
    let helpful: i64 = top_helpful.iter().map(|a| a.count).sum();
    (helpful as f64 * 100.0 / total_feedbacks as f64).round() as u32
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
    Ok(n)
}

fn vote_ranking(conn: &Connection, vote: Vote, limit: u32) -> Result<Vec<ArticleVoteCount>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.title, a.category, a.created_at, COUNT(*) AS votes
         FROM feedback f
         JOIN articles a ON a.id = f.article_id
         WHERE f.vote = ?1
         GROUP BY a.id
         ORDER BY votes DESC, a.id ASC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![vote.as_str(), limit], |row| {
            Ok(ArticleVoteCount {
                article_id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                created_at: row.get(3)?,
                count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn keyword_ranking(conn: &Connection, limit: u32) -> Result<Vec<KeywordCountRow>> {
    let mut stmt = conn.prepare(
        "SELECT keyword, COUNT(*) AS hits
         FROM search_logs
         GROUP BY keyword
         ORDER BY hits DESC, keyword ASC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(KeywordCountRow {
                keyword: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
