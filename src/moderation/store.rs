//! Persistent SQLite store for user stats and the ban, mute and admin lists.

use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::moderation::error::StoreError;

/// Per-user statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub reputation: i64,
    pub warn_count: u32,
    pub message_count: u64,
}

/// Presence-only user sets. All share the user id key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Ban,
    Mute,
    Admin,
}

impl Marker {
    fn table(self) -> &'static str {
        match self {
            Marker::Ban => "bans",
            Marker::Mute => "mutes",
            Marker::Admin => "admins",
        }
    }
}

/// Process-wide store handle.
///
/// Every call takes the connection lock and runs a single autocommitted
/// statement, so operations on the same user serialize and counters never
/// lose updates. Opened once at startup and closed at shutdown.
pub struct Store {
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        let store = Self::with_connection(conn)?;
        info!(
            "Opened store at {:?} (journal: {}, {} users)",
            path,
            journal,
            store.user_count()?
        );
        Ok(store)
    }

    /// Create a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(Some(conn)) })
    }

    /// Close the underlying connection. Later calls fail with `StoreError::Closed`.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        match guard.take() {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::Sqlite(e)),
            None => Ok(()),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let guard: MutexGuard<'_, Option<Connection>> =
            self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        match &*guard {
            Some(conn) => Ok(f(conn)?),
            None => Err(StoreError::Closed),
        }
    }

    // ==================== USER METHODS ====================

    /// Create the user's record if missing.
    pub fn ensure_user(&self, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", params![user_id])
        })?;
        Ok(())
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT reputation, warns, messages FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserRecord {
                        reputation: row.get(0)?,
                        warn_count: row.get::<_, i64>(1)? as u32,
                        message_count: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()
        })
    }

    /// Add `delta` to the user's reputation, creating the record if needed.
    /// Returns the new reputation.
    pub fn adjust_reputation(&self, user_id: i64, delta: i64) -> Result<i64, StoreError> {
        let reputation = self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO users (user_id, reputation) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET reputation = reputation + excluded.reputation
                 RETURNING reputation",
                params![user_id, delta],
                |row| row.get(0),
            )
        })?;
        debug!("Reputation of {} adjusted by {} to {}", user_id, delta, reputation);
        Ok(reputation)
    }

    /// Returns the new warn count.
    pub fn increment_warn(&self, user_id: i64) -> Result<u32, StoreError> {
        let warns: i64 = self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO users (user_id, warns) VALUES (?1, 1)
                 ON CONFLICT(user_id) DO UPDATE SET warns = warns + 1
                 RETURNING warns",
                params![user_id],
                |row| row.get(0),
            )
        })?;
        Ok(warns as u32)
    }

    pub fn reset_warns(&self, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id) VALUES (?1)
                 ON CONFLICT(user_id) DO UPDATE SET warns = 0",
                params![user_id],
            )
        })?;
        Ok(())
    }

    pub fn increment_message_count(&self, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, messages) VALUES (?1, 1)
                 ON CONFLICT(user_id) DO UPDATE SET messages = messages + 1",
                params![user_id],
            )
        })?;
        Ok(())
    }

    /// Users with the most messages, highest first. Ties go to the lower user id.
    pub fn top_by_message_count(&self, limit: usize) -> Result<Vec<(i64, u64)>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, messages FROM users
                 ORDER BY messages DESC, user_id ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            rows.collect()
        })
    }

    /// Number of users with a record.
    pub fn user_count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)))?;
        Ok(count as usize)
    }

    // ==================== LIST METHODS ====================

    pub fn ban(&self, user_id: i64) -> Result<(), StoreError> {
        self.mark(Marker::Ban, user_id)
    }

    pub fn unban(&self, user_id: i64) -> Result<(), StoreError> {
        self.unmark(Marker::Ban, user_id)
    }

    pub fn is_banned(&self, user_id: i64) -> Result<bool, StoreError> {
        self.is_marked(Marker::Ban, user_id)
    }

    pub fn list_banned(&self) -> Result<BTreeSet<i64>, StoreError> {
        self.list(Marker::Ban)
    }

    pub fn mute(&self, user_id: i64) -> Result<(), StoreError> {
        self.mark(Marker::Mute, user_id)
    }

    pub fn unmute(&self, user_id: i64) -> Result<(), StoreError> {
        self.unmark(Marker::Mute, user_id)
    }

    pub fn is_muted(&self, user_id: i64) -> Result<bool, StoreError> {
        self.is_marked(Marker::Mute, user_id)
    }

    pub fn list_muted(&self) -> Result<BTreeSet<i64>, StoreError> {
        self.list(Marker::Mute)
    }

    pub fn grant_admin(&self, user_id: i64) -> Result<(), StoreError> {
        self.mark(Marker::Admin, user_id)
    }

    pub fn revoke_admin(&self, user_id: i64) -> Result<(), StoreError> {
        self.unmark(Marker::Admin, user_id)
    }

    pub fn is_admin(&self, user_id: i64) -> Result<bool, StoreError> {
        self.is_marked(Marker::Admin, user_id)
    }

    pub fn list_admins(&self) -> Result<BTreeSet<i64>, StoreError> {
        self.list(Marker::Admin)
    }

    fn mark(&self, marker: Marker, user_id: i64) -> Result<(), StoreError> {
        let sql = format!("INSERT OR IGNORE INTO {} (user_id) VALUES (?1)", marker.table());
        let inserted = self.with_conn(|conn| conn.execute(&sql, params![user_id]))?;
        if inserted > 0 {
            info!("Added {} to {}", user_id, marker.table());
        }
        Ok(())
    }

    fn unmark(&self, marker: Marker, user_id: i64) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE user_id = ?1", marker.table());
        let removed = self.with_conn(|conn| conn.execute(&sql, params![user_id]))?;
        if removed > 0 {
            info!("Removed {} from {}", user_id, marker.table());
        }
        Ok(())
    }

    fn is_marked(&self, marker: Marker, user_id: i64) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {} WHERE user_id = ?1", marker.table());
        let found = self.with_conn(|conn| {
            conn.query_row(&sql, params![user_id], |_| Ok(())).optional()
        })?;
        Ok(found.is_some())
    }

    fn list(&self, marker: Marker) -> Result<BTreeSet<i64>, StoreError> {
        let sql = format!("SELECT user_id FROM {}", marker.table());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect()
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            reputation INTEGER NOT NULL DEFAULT 0,
            warns INTEGER NOT NULL DEFAULT 0,
            messages INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS bans (user_id INTEGER PRIMARY KEY);
        CREATE TABLE IF NOT EXISTS mutes (user_id INTEGER PRIMARY KEY);
        CREATE TABLE IF NOT EXISTS admins (user_id INTEGER PRIMARY KEY);

        CREATE INDEX IF NOT EXISTS idx_users_messages ON users(messages);
    "#,
    )
}
