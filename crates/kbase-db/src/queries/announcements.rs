use anyhow::Result;
use chrono::{DateTime, Utc};
use kbase_types::models::Priority;
use rusqlite::{Connection, Row};

use crate::models::AnnouncementRow;
use crate::queries::OptionalExt;
use crate::{Database, timestamp};

const ANNOUNCEMENT_SELECT: &str = "
    SELECT n.id, n.title, n.content, n.priority, n.date, n.created_by, n.created_at, u.name, u.email
    FROM announcements n
    LEFT JOIN users u ON u.id = n.created_by";

pub struct NewAnnouncement<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub priority: Priority,
    /// Display date; defaults to the creation time when absent.
    pub date: Option<DateTime<Utc>>,
}

impl Database {
    pub fn create_announcement(
        &self,
        id: &str,
        created_by: &str,
        announcement: &NewAnnouncement<'_>,
        now: DateTime<Utc>,
    ) -> Result<AnnouncementRow> {
        let date = timestamp(announcement.date.unwrap_or(now));

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcements (id, title, content, priority, date, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    announcement.title,
                    announcement.content,
                    announcement.priority.as_str(),
                    date,
                    created_by,
                    timestamp(now),
                ],
            )?;
            query_announcement(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Announcement {} vanished after insert", id))
        })
    }

    /// Newest display date first.
    pub fn list_announcements(&self) -> Result<Vec<AnnouncementRow>> {
        self.with_conn(|conn| {
            let sql = format!("{ANNOUNCEMENT_SELECT} ORDER BY n.date DESC, n.created_at DESC, n.id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_announcement)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_announcement(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_announcement(conn: &Connection, id: &str) -> Result<Option<AnnouncementRow>> {
    let sql = format!("{ANNOUNCEMENT_SELECT} WHERE n.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], map_announcement).optional()
}

fn map_announcement(row: &Row<'_>) -> rusqlite::Result<AnnouncementRow> {
    Ok(AnnouncementRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        priority: row.get(3)?,
        date: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        author_name: row.get(7)?,
        author_email: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, t, test_db};
    use kbase_types::models::Role;

    #[test]
    fn listed_newest_first_with_author() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let old = NewAnnouncement { title: "Old", content: "c", priority: Priority::Low, date: None };
        let new = NewAnnouncement { title: "New", content: "c", priority: Priority::High, date: Some(t(100)) };
        db.create_announcement("n1", &admin, &old, t(0)).unwrap();
        let created = db.create_announcement("n2", &admin, &new, t(1)).unwrap();
        assert_eq!(created.priority, "high");
        assert_eq!(created.date, timestamp(t(100)));

        let titles: Vec<String> = db.list_announcements().unwrap().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["New", "Old"]);
        assert_eq!(
            db.list_announcements().unwrap()[0].author_email.as_deref(),
            Some("admin@corp.io")
        );
    }

    #[test]
    fn delete_reports_existence() {
        let db = test_db();
        let admin = seed_user(&db, "admin@corp.io", Role::Admin);
        let n = NewAnnouncement { title: "T", content: "c", priority: Priority::Medium, date: None };
        db.create_announcement("n1", &admin, &n, t(0)).unwrap();

        assert!(db.delete_announcement("n1").unwrap());
        assert!(!db.delete_announcement("n1").unwrap());
        assert!(db.list_announcements().unwrap().is_empty());
    }
}
