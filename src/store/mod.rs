//! Fragments store layer: SQLite-backed persistence for projects, chat
//! messages, generated fragments and usage credits.
//!
//! Every module exposes plain functions over a `&Connection`; [`Store`] owns
//! the shared connection and hands it out one closure at a time.

pub mod messages;
pub mod projects;
pub mod usage;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Create tables if needed on an open connection.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS projects (
             id TEXT PRIMARY KEY,
             name TEXT NOT NULL,
             created_at TEXT NOT NULL,
             updated_at TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS messages (
             id TEXT PRIMARY KEY,
             project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
             content TEXT NOT NULL,
             role TEXT NOT NULL,
             type TEXT NOT NULL,
             created_at TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_messages_project
             ON messages(project_id, created_at);

         CREATE TABLE IF NOT EXISTS fragments (
             id TEXT PRIMARY KEY,
             message_id TEXT NOT NULL UNIQUE REFERENCES messages(id) ON DELETE CASCADE,
             sandbox_url TEXT NOT NULL,
             title TEXT NOT NULL,
             files TEXT NOT NULL,
             created_at TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS usage (
             key TEXT PRIMARY KEY,
             points INTEGER NOT NULL,
             expire_at TEXT NOT NULL
         );",
    )?;
    Ok(())
}

/// Initialize the Fragments SQLite database and create tables if needed.
pub fn init_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;",
    )?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Timestamp format used in every table. Fixed-width so text order matches
/// time order.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Shared handle to the database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = init_db(db_path)?;
        tracing::info!(path = %db_path.display(), "Store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let conn = self.conn.lock();
        f(&conn)
    }
}
