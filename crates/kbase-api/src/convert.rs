//! Store rows → API responses. A row that fails to parse means the database
//! holds something this service never writes, so it surfaces as an internal error.

use anyhow::{Context, Result};
use uuid::Uuid;

use kbase_db::models::{AnnouncementRow, ArticleRow, ArticleVoteCount, FeedbackRow, KeywordCountRow, UserRow};
use kbase_db::parse_timestamp;
use kbase_types::api::{
    AnnouncementResponse, ArticleResponse, ArticleSummary, AuthorSummary, FeedbackResponse, KeywordCount,
    UserResponse,
};

use crate::error::ApiError;

fn uuid(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt {} id '{}'", what, raw))
}

/// Path ids that aren't UUIDs can't name a stored entity.
pub fn parse_id(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound(what))
}

fn author(id: Uuid, name: Option<String>, email: Option<String>) -> Option<AuthorSummary> {
    match (name, email) {
        (Some(name), Some(email)) => Some(AuthorSummary { id, name, email }),
        _ => None,
    }
}

pub fn user(row: &UserRow) -> Result<UserResponse> {
    Ok(UserResponse {
        id: uuid(&row.id, "user")?,
        email: row.email.clone(),
        name: row.name.clone(),
        role: row.role.parse()?,
    })
}

pub fn article(row: ArticleRow) -> Result<ArticleResponse> {
    let created_by = uuid(&row.created_by, "author")?;
    Ok(ArticleResponse {
        id: uuid(&row.id, "article")?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
        helpful_count: row.helpful_count.max(0) as u64,
        not_helpful_count: row.not_helpful_count.max(0) as u64,
        author: author(created_by, row.author_name, row.author_email),
        created_by,
        title: row.title,
        category: row.category,
        content: row.content,
        tags: row.tags,
    })
}

pub fn articles(rows: Vec<ArticleRow>) -> Result<Vec<ArticleResponse>> {
    rows.into_iter().map(article).collect()
}

pub fn feedback(row: &FeedbackRow) -> Result<FeedbackResponse> {
    Ok(FeedbackResponse {
        id: uuid(&row.id, "feedback")?,
        article_id: uuid(&row.article_id, "article")?,
        user_id: uuid(&row.user_id, "user")?,
        feedback: row.vote.parse()?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn announcement(row: AnnouncementRow) -> Result<AnnouncementResponse> {
    let created_by = uuid(&row.created_by, "author")?;
    Ok(AnnouncementResponse {
        id: uuid(&row.id, "announcement")?,
        priority: row.priority.parse()?,
        date: parse_timestamp(&row.date)?,
        created_at: parse_timestamp(&row.created_at)?,
        author: author(created_by, row.author_name, row.author_email),
        created_by,
        title: row.title,
        content: row.content,
    })
}

/// Ranking entry → (count, article summary).
pub fn ranked_article(row: ArticleVoteCount) -> Result<(u64, ArticleSummary)> {
    Ok((
        row.count.max(0) as u64,
        ArticleSummary {
            id: uuid(&row.article_id, "article")?,
            created_at: parse_timestamp(&row.created_at)?,
            title: row.title,
            category: row.category,
        },
    ))
}

pub fn keyword(row: KeywordCountRow) -> KeywordCount {
    KeywordCount {
        keyword: row.keyword,
        count: row.count.max(0) as u64,
    }
}
