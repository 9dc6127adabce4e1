use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, types::Type};

use crate::models::{ArticlePatch, ArticleRow, NewArticle};
use crate::queries::OptionalExt;
use crate::{Database, timestamp};

/// Article columns plus author and per-vote counts. Counts come from a LEFT JOIN
/// so articles without feedback report zero.
const ARTICLE_SELECT: &str = "
    SELECT a.id, a.title, a.category, a.content, a.tags, a.created_by, a.created_at, a.updated_at,
           u.name, u.email,
           COUNT(CASE WHEN f.vote = 'helpful' THEN 1 END),
           COUNT(CASE WHEN f.vote = 'not helpful' THEN 1 END)
    FROM articles a
    LEFT JOIN users u ON u.id = a.created_by
    LEFT JOIN feedback f ON f.article_id = a.id";

/// Filters for [`Database::list_articles`]. `None` means "don't filter".
#[derive(Debug, Default)]
pub struct ArticleFilter<'a> {
    /// Case-insensitive substring of the title.
    pub title_contains: Option<&'a str>,
    /// Exact category.
    pub category: Option<&'a str>,
}

impl Database {
    pub fn create_article(
        &self,
        id: &str,
        created_by: &str,
        article: &NewArticle<'_>,
        now: DateTime<Utc>,
    ) -> Result<ArticleRow> {
        let tags = serde_json::to_string(&normalize_tags(article.tags))?;
        let at = timestamp(now);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO articles (id, title, category, content, tags, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![id, article.title, article.category, article.content, tags, created_by, at],
            )?;
            query_article(conn, id)?.ok_or_else(|| anyhow::anyhow!("Article {} vanished after insert", id))
        })
    }

    pub fn get_article(&self, id: &str) -> Result<Option<ArticleRow>> {
        self.with_conn(|conn| query_article(conn, id))
    }

    pub fn article_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| article_exists(conn, id))
    }

    /// Newest-updated first; ties fall back to id so the order is stable.
    pub fn list_articles(&self, filter: &ArticleFilter<'_>) -> Result<Vec<ArticleRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{ARTICLE_SELECT}
                 WHERE (?1 IS NULL OR instr(unicode_lower(a.title), unicode_lower(?1)) > 0)
                   AND (?2 IS NULL OR a.category = ?2)
                 GROUP BY a.id
                 ORDER BY a.updated_at DESC, a.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![filter.title_contains, filter.category], map_article)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies the provided fields and bumps `updated_at`. `None` if the article doesn't exist.
    pub fn update_article(
        &self,
        id: &str,
        patch: &ArticlePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<ArticleRow>> {
        let tags = patch
            .tags
            .as_deref()
            .map(|tags| serde_json::to_string(&normalize_tags(tags)))
            .transpose()?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE articles SET
                    title = COALESCE(?2, title),
                    category = COALESCE(?3, category),
                    content = COALESCE(?4, content),
                    tags = COALESCE(?5, tags),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![id, patch.title, patch.category, patch.content, tags, timestamp(now)],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_article(conn, id)
        })
    }

    /// Deletes the article and, via cascade, its feedback. Returns whether it existed.
    pub fn delete_article(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM articles WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

/// Tags are a set: trimmed, empties dropped, first occurrence wins.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub(crate) fn article_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM articles WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn query_article(conn: &Connection, id: &str) -> Result<Option<ArticleRow>> {
    let sql = format!("{ARTICLE_SELECT} WHERE a.id = ?1 GROUP BY a.id");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], map_article).optional()
}

fn map_article(row: &Row<'_>) -> rusqlite::Result<ArticleRow> {
    let raw_tags: String = row.get(4)?;
    let tags: Vec<String> = serde_json::from_str(&raw_tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(ArticleRow {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        content: row.get(3)?,
        tags,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        author_name: row.get(8)?,
        author_email: row.get(9)?,
        helpful_count: row.get(10)?,
        not_helpful_count: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_article, seed_user, t, test_db};
    use kbase_types::models::{Role, Vote};

    #[test]
    fn listing_orders_by_updated_at_desc() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let first = seed_article(&db, &admin, "VPN setup", "IT", 0);
        let second = seed_article(&db, &admin, "Leave policy", "HR", 10);

        let ids: Vec<String> = db
            .list_articles(&ArticleFilter::default())
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![second.clone(), first.clone()]);

        // Editing the older one moves it to the top.
        let patch = ArticlePatch { content: Some("new body".into()), ..Default::default() };
        db.update_article(&first, &patch, t(20)).unwrap().unwrap();
        let ids: Vec<String> = db
            .list_articles(&ArticleFilter::default())
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn title_search_is_case_insensitive_substring() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        seed_article(&db, &admin, "Connecting to the VPN", "IT", 0);
        seed_article(&db, &admin, "Expense reports", "Finance", 1);

        let hits = db
            .list_articles(&ArticleFilter { title_contains: Some("vpn"), category: None })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Connecting to the VPN");

        let none = db
            .list_articles(&ArticleFilter { title_contains: Some("vpn"), category: Some("Finance") })
            .unwrap();
        assert!(none.is_empty());

        let by_category = db
            .list_articles(&ArticleFilter { title_contains: None, category: Some("Finance") })
            .unwrap();
        assert_eq!(by_category.len(), 1);
    }

    #[test]
    fn title_search_folds_non_ascii_case() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        seed_article(&db, &admin, "Überweisung beantragen", "Finance", 0);
        seed_article(&db, &admin, "ÉQUIPE onboarding", "HR", 1);

        let hits = db
            .list_articles(&ArticleFilter { title_contains: Some("überweisung"), category: None })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Überweisung beantragen");

        let hits = db
            .list_articles(&ArticleFilter { title_contains: Some("Équipe"), category: None })
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn counts_are_derived_from_feedback() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let article = seed_article(&db, &admin, "A", "IT", 0);

        let votes = [Vote::Helpful, Vote::Helpful, Vote::Helpful, Vote::NotHelpful];
        for (i, vote) in votes.iter().enumerate() {
            let user = seed_user(&db, &format!("e{}@corp.io", i), Role::Employee);
            db.submit_feedback(&format!("f{}", i), &article, &user, *vote, t(1)).unwrap();
        }

        let row = db.get_article(&article).unwrap().unwrap();
        assert_eq!(row.helpful_count, 3);
        assert_eq!(row.not_helpful_count, 1);
        assert_eq!(row.author_email.as_deref(), Some("admin@corp.io"));

        let listed = db.list_articles(&ArticleFilter::default()).unwrap();
        assert_eq!(listed[0].helpful_count + listed[0].not_helpful_count, 4);
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let tags = vec!["net".to_string(), " net ".to_string(), "".to_string(), "vpn".to_string()];
        let row = db
            .create_article(
                "a1",
                &admin,
                &NewArticle { title: "VPN", category: "IT", content: "body", tags: &tags },
                t(0),
            )
            .unwrap();
        assert_eq!(row.tags, vec!["net", "vpn"]);

        let patch = ArticlePatch { title: Some("VPN 2".into()), ..Default::default() };
        let updated = db.update_article("a1", &patch, t(5)).unwrap().unwrap();
        assert_eq!(updated.title, "VPN 2");
        assert_eq!(updated.category, "IT");
        assert_eq!(updated.tags, vec!["net", "vpn"]);
        assert!(updated.updated_at > updated.created_at);

        assert!(db.update_article("missing", &patch, t(6)).unwrap().is_none());
    }

    #[test]
    fn delete_cascades_to_feedback() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let article = seed_article(&db, &admin, "A", "IT", 0);
        db.submit_feedback("f1", &article, &admin, Vote::Helpful, t(1)).unwrap();

        assert!(db.delete_article(&article).unwrap());
        assert!(!db.delete_article(&article).unwrap());
        assert!(!db.article_exists(&article).unwrap());

        let remaining: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM feedback", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
