use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                name        TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('admin', 'employee')),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE articles (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                category    TEXT NOT NULL,
                content     TEXT NOT NULL,
                tags        TEXT NOT NULL DEFAULT '[]',
                created_by  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_articles_updated ON articles(updated_at);
            CREATE INDEX idx_articles_category ON articles(category);

            -- One vote per (article, user); the constraint is the duplicate guard.
            CREATE TABLE feedback (
                id          TEXT PRIMARY KEY,
                article_id  TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                vote        TEXT NOT NULL CHECK (vote IN ('helpful', 'not helpful')),
                created_at  TEXT NOT NULL,
                UNIQUE(article_id, user_id)
            );

            CREATE INDEX idx_feedback_vote ON feedback(vote, article_id);

            CREATE TABLE search_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword     TEXT NOT NULL,
                user_id     TEXT REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_search_logs_keyword ON search_logs(keyword);

            CREATE TABLE announcements (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                priority    TEXT NOT NULL DEFAULT 'low' CHECK (priority IN ('low', 'medium', 'high')),
                date        TEXT NOT NULL,
                created_by  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE otp_codes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL,
                code        TEXT NOT NULL,
                purpose     TEXT NOT NULL CHECK (purpose IN ('register', 'forgot')),
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_otp_lookup ON otp_codes(email, purpose);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
