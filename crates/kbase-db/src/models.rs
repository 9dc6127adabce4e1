//! Row shapes read from and written to SQLite. API types live in kbase-types.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
}

pub struct ArticleRow {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// Derived at read time from the feedback table.
    pub helpful_count: i64,
    pub not_helpful_count: i64,
}

pub struct NewArticle<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
}

#[derive(Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct FeedbackRow {
    pub id: String,
    pub article_id: String,
    pub user_id: String,
    pub vote: String,
    pub created_at: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub helpful: i64,
    pub not_helpful: i64,
}

pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub priority: String,
    pub date: String,
    pub created_by: String,
    pub created_at: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// One entry of a helpful / not-helpful ranking.
#[derive(Debug, Clone)]
pub struct ArticleVoteCount {
    pub article_id: String,
    pub title: String,
    pub category: String,
    pub created_at: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCountRow {
    pub keyword: String,
    pub count: i64,
}

pub struct AnalyticsSummary {
    pub total_articles: i64,
    pub total_feedbacks: i64,
    pub total_searches: i64,
    pub avg_helpfulness: u32,
    pub most_searched: Vec<KeywordCountRow>,
    pub most_helpful: Vec<ArticleVoteCount>,
    pub least_helpful: Vec<ArticleVoteCount>,
}
