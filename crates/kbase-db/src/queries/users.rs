use anyhow::Result;
use chrono::{DateTime, Utc};
use kbase_types::models::Role;
use rusqlite::{Connection, Row};

use crate::models::UserRow;
use crate::queries::{OptionalExt, Violation, constraint_violation};
use crate::{Database, timestamp};

const USER_COLUMNS: &str = "SELECT id, email, password, name, role, created_at FROM users";

impl Database {
    /// Inserts a user. Returns `false` when the email is already taken.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, email, password_hash, name, role.as_str(), timestamp(now)),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if constraint_violation(&e) == Some(Violation::Unique) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn email_registered(&self, email: &str) -> Result<bool> {
        Ok(self.get_user_by_email(email)?.is_some())
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("{USER_COLUMNS} WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}
