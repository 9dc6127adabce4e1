use anyhow::Result;
use chrono::{DateTime, Utc};
use kbase_types::models::OtpPurpose;
use rusqlite::Connection;

use crate::{Database, timestamp};

/// Deletes every code for (email, purpose), but only when a matching,
/// unexpired code is among them. One statement, so a code can be used once.
const CONSUME_SQL: &str = "
    DELETE FROM otp_codes
    WHERE email = ?1 AND purpose = ?3
      AND EXISTS (
          SELECT 1 FROM otp_codes
          WHERE email = ?1 AND code = ?2 AND purpose = ?3 AND expires_at > ?4
      )";

#[derive(Debug, PartialEq, Eq)]
pub enum PasswordReset {
    Updated,
    InvalidCode,
    UnknownUser,
}

impl Database {
    /// Stores a fresh code, replacing any still-pending codes for the same (email, purpose).
    pub fn issue_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM otp_codes WHERE email = ?1 AND purpose = ?2",
                (email, purpose.as_str()),
            )?;
            tx.execute(
                "INSERT INTO otp_codes (email, code, purpose, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (email, code, purpose.as_str(), timestamp(expires_at), timestamp(now)),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Returns `true` and consumes the pending codes when `code` is valid at `now`.
    pub fn consume_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| consume(conn, email, code, purpose, now))
    }

    /// Consumes a `forgot` code and swaps the password hash in one transaction.
    pub fn reset_password_with_otp(
        &self,
        email: &str,
        code: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<PasswordReset> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !consume(&tx, email, code, OtpPurpose::Forgot, now)? {
                return Ok(PasswordReset::InvalidCode);
            }
            let updated = tx.execute(
                "UPDATE users SET password = ?2 WHERE email = ?1",
                (email, password_hash),
            )?;
            if updated == 0 {
                // Dropping the transaction rolls the consumed codes back.
                return Ok(PasswordReset::UnknownUser);
            }
            tx.commit()?;
            Ok(PasswordReset::Updated)
        })
    }
}

fn consume(
    conn: &Connection,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> Result<bool> {
    let removed = conn.execute(CONSUME_SQL, (email, code, purpose.as_str(), timestamp(now)))?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, t, test_db};
    use kbase_types::models::Role;

    fn pending(db: &Database, email: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM otp_codes WHERE email = ?1", [email], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn valid_code_is_single_use() {
        let db = test_db();
        db.issue_otp("x@y.com", "123456", OtpPurpose::Register, t(600), t(0)).unwrap();

        assert!(!db.consume_otp("x@y.com", "000000", OtpPurpose::Register, t(1)).unwrap());
        assert!(db.consume_otp("x@y.com", "123456", OtpPurpose::Register, t(1)).unwrap());
        assert!(!db.consume_otp("x@y.com", "123456", OtpPurpose::Register, t(2)).unwrap());
        assert_eq!(pending(&db, "x@y.com"), 0);
    }

    #[test]
    fn expired_code_fails_even_when_it_matches() {
        let db = test_db();
        db.issue_otp("x@y.com", "123456", OtpPurpose::Register, t(600), t(0)).unwrap();

        assert!(!db.consume_otp("x@y.com", "123456", OtpPurpose::Register, t(600)).unwrap());
        assert!(!db.consume_otp("x@y.com", "123456", OtpPurpose::Register, t(3600)).unwrap());
        // Expired rows are left in place, not purged.
        assert_eq!(pending(&db, "x@y.com"), 1);
    }

    #[test]
    fn purpose_must_match() {
        let db = test_db();
        db.issue_otp("x@y.com", "123456", OtpPurpose::Register, t(600), t(0)).unwrap();
        assert!(!db.consume_otp("x@y.com", "123456", OtpPurpose::Forgot, t(1)).unwrap());
        assert!(db.consume_otp("x@y.com", "123456", OtpPurpose::Register, t(1)).unwrap());
    }

    #[test]
    fn new_code_supersedes_the_pending_one() {
        let db = test_db();
        db.issue_otp("x@y.com", "111111", OtpPurpose::Register, t(600), t(0)).unwrap();
        db.issue_otp("x@y.com", "222222", OtpPurpose::Register, t(660), t(60)).unwrap();
        assert_eq!(pending(&db, "x@y.com"), 1);

        assert!(!db.consume_otp("x@y.com", "111111", OtpPurpose::Register, t(61)).unwrap());
        assert!(db.consume_otp("x@y.com", "222222", OtpPurpose::Register, t(61)).unwrap());
    }

    #[test]
    fn reset_updates_hash_and_consumes_codes() {
        let db = test_db();
        seed_user(&db, "x@y.com", Role::Employee);
        db.issue_otp("x@y.com", "654321", OtpPurpose::Forgot, t(600), t(0)).unwrap();

        assert_eq!(
            db.reset_password_with_otp("x@y.com", "000000", "new-hash", t(1)).unwrap(),
            PasswordReset::InvalidCode
        );
        assert_eq!(
            db.reset_password_with_otp("x@y.com", "654321", "new-hash", t(1)).unwrap(),
            PasswordReset::Updated
        );
        assert_eq!(db.get_user_by_email("x@y.com").unwrap().unwrap().password, "new-hash");
        assert_eq!(pending(&db, "x@y.com"), 0);
    }

    #[test]
    fn reset_for_vanished_user_rolls_back() {
        let db = test_db();
        db.issue_otp("ghost@y.com", "654321", OtpPurpose::Forgot, t(600), t(0)).unwrap();
        assert_eq!(
            db.reset_password_with_otp("ghost@y.com", "654321", "h", t(1)).unwrap(),
            PasswordReset::UnknownUser
        );
        assert_eq!(pending(&db, "ghost@y.com"), 1);
    }
}
