// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::debug;

use crate::MemoryError;

/// The default session always exists after open.
pub const DEFAULT_SESSION_ID: i64 = 1;

/// One row of the recall log.
#[derive(Debug, Clone)]
pub struct RecallRow {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub token_count: i64,
    pub timestamp: i64,
    /// Id of the row this one summarizes, or 0.
    pub summary_of: i64,
}

/// One archival fact.
#[derive(Debug, Clone)]
pub struct ArchivalFact {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub category: String,
    pub importance: f64,
    pub created_at: i64,
    pub updated_at: i64,
    pub access_count: i64,
}

/// Thread-safe store over a single SQLite connection.
///
/// Readers and writers serialize on the connection mutex; cross-process
/// writers serialize through SQLite's busy-timeout handling.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (creating on first use) a file-backed store.
    pub fn open(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path)?;
        // WAL + NORMAL is the durability/speed balance for a local agent:
        // fsync on checkpoint, not on every transaction.
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        Self::init(&conn)?;
        debug!(path = %path.display(), "memory store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory store (tests, ephemeral sessions).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        Self::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS core_memory (
                label TEXT PRIMARY KEY,
                content TEXT NOT NULL DEFAULT '',
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                title TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS recall_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                token_count INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL DEFAULT (unixepoch()),
                summary_of INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_recall_session
                ON recall_log(session_id, timestamp);

            CREATE VIRTUAL TABLE IF NOT EXISTS recall_fts USING fts5(
                content,
                content=recall_log,
                content_rowid=id,
                tokenize='porter unicode61'
            );

            CREATE TRIGGER IF NOT EXISTS recall_ai AFTER INSERT ON recall_log BEGIN
                INSERT INTO recall_fts(rowid, content) VALUES (new.id, new.content);
            END;
            CREATE TRIGGER IF NOT EXISTS recall_ad AFTER DELETE ON recall_log BEGIN
                INSERT INTO recall_fts(recall_fts, rowid, content)
                    VALUES('delete', old.id, old.content);
            END;
            CREATE TRIGGER IF NOT EXISTS recall_au AFTER UPDATE ON recall_log BEGIN
                INSERT INTO recall_fts(recall_fts, rowid, content)
                    VALUES('delete', old.id, old.content);
                INSERT INTO recall_fts(rowid, content) VALUES (new.id, new.content);
            END;

            CREATE TABLE IF NOT EXISTS archival (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                importance REAL NOT NULL DEFAULT 0.5,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                access_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS archival_fts USING fts5(
                key, value,
                content=archival,
                content_rowid=id,
                tokenize='porter unicode61'
            );

            CREATE TRIGGER IF NOT EXISTS archival_ai AFTER INSERT ON archival BEGIN
                INSERT INTO archival_fts(rowid, key, value)
                    VALUES (new.id, new.key, new.value);
            END;
            CREATE TRIGGER IF NOT EXISTS archival_ad AFTER DELETE ON archival BEGIN
                INSERT INTO archival_fts(archival_fts, rowid, key, value)
                    VALUES('delete', old.id, old.key, old.value);
            END;
            CREATE TRIGGER IF NOT EXISTS archival_au AFTER UPDATE ON archival BEGIN
                INSERT INTO archival_fts(archival_fts, rowid, key, value)
                    VALUES('delete', old.id, old.key, old.value);
                INSERT INTO archival_fts(rowid, key, value)
                    VALUES (new.id, new.key, new.value);
            END;
            ",
        )?;

        // Default session and core blocks.
        conn.execute(
            "INSERT OR IGNORE INTO sessions (id, title) VALUES (?1, 'default')",
            params![DEFAULT_SESSION_ID],
        )?;
        for (label, content) in [
            ("persona", "I am a helpful local assistant."),
            ("human", "Nothing known about the user yet."),
            ("instructions", "Follow the user's instructions carefully."),
        ] {
            conn.execute(
                "INSERT OR IGNORE INTO core_memory (label, content) VALUES (?1, ?2)",
                params![label, content],
            )?;
        }
        Ok(())
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, MemoryError>
    where
        F: FnOnce(&Connection) -> Result<T, MemoryError>,
    {
        let conn = self.conn.lock().map_err(|_| MemoryError::Poisoned)?;
        f(&conn)
    }

    // ── Core blocks ───────────────────────────────────────────────────────────

    pub fn core_set(&self, label: &str, content: &str) -> Result<(), MemoryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO core_memory (label, content, updated_at)
                 VALUES (?1, ?2, unixepoch())
                 ON CONFLICT(label) DO UPDATE SET
                    content = excluded.content,
                    updated_at = unixepoch()",
                params![label, content],
            )?;
            Ok(())
        })
    }

    pub fn core_get(&self, label: &str) -> Result<Option<String>, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT content FROM core_memory WHERE label = ?1")?;
            let mut rows = stmt.query(params![label])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get(0)?)),
                None => Ok(None),
            }
        })
    }

    /// Append to a block, creating it when absent.
    pub fn core_append(&self, label: &str, text: &str) -> Result<(), MemoryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO core_memory (label, content, updated_at)
                 VALUES (?1, ?2, unixepoch())
                 ON CONFLICT(label) DO UPDATE SET
                    content = content || excluded.content,
                    updated_at = unixepoch()",
                params![label, text],
            )?;
            Ok(())
        })
    }

    /// All blocks formatted for prompt inclusion:
    /// `label:\ncontent\n---\n` per block, in creation order.
    pub fn core_dump(&self) -> Result<String, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT label, content FROM core_memory ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut out = String::new();
            for row in rows {
                let (label, content) = row?;
                out.push_str(&format!("{label}:\n{content}\n---\n"));
            }
            Ok(out)
        })
    }

    // ── Recall log ────────────────────────────────────────────────────────────

    /// Append a transcript row; returns the new id.
    pub fn recall_add(
        &self,
        session: i64,
        role: &str,
        content: &str,
        tokens: usize,
    ) -> Result<i64, MemoryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recall_log (session_id, role, content, token_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session, role, content, tokens as i64],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Newest-first page of the session transcript.
    pub fn recall_recent(&self, session: i64, limit: usize) -> Result<Vec<RecallRow>, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, token_count, timestamp, summary_of
                 FROM recall_log WHERE session_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![session, limit as i64], row_to_recall)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Full-text search over recall content, FTS rank order, recency on ties.
    pub fn recall_search(&self, query: &str, max: usize) -> Result<Vec<RecallRow>, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.session_id, r.role, r.content, r.token_count,
                        r.timestamp, r.summary_of
                 FROM recall_fts f
                 JOIN recall_log r ON r.id = f.rowid
                 WHERE recall_fts MATCH ?1
                 ORDER BY rank, r.timestamp DESC, r.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, max as i64], row_to_recall)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// `(message_count, token_sum)` for a session.
    pub fn recall_stats(&self, session: i64) -> Result<(i64, i64), MemoryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(token_count), 0)
                 FROM recall_log WHERE session_id = ?1",
                params![session],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(Into::into)
        })
    }

    /// Delete the oldest rows beyond either bound (0 disables a bound).
    /// Returns the number of rows deleted.
    pub fn recall_gc(
        &self,
        session: i64,
        max_messages: usize,
        max_age_seconds: i64,
    ) -> Result<usize, MemoryError> {
        self.with_conn(|conn| {
            let mut deleted = 0usize;
            if max_age_seconds > 0 {
                deleted += conn.execute(
                    "DELETE FROM recall_log
                     WHERE session_id = ?1 AND timestamp < unixepoch() - ?2",
                    params![session, max_age_seconds],
                )?;
            }
            if max_messages > 0 {
                deleted += conn.execute(
                    "DELETE FROM recall_log
                     WHERE session_id = ?1 AND id NOT IN (
                        SELECT id FROM recall_log WHERE session_id = ?1
                        ORDER BY timestamp DESC, id DESC LIMIT ?2)",
                    params![session, max_messages as i64],
                )?;
            }
            Ok(deleted)
        })
    }

    // ── Archival facts ────────────────────────────────────────────────────────

    /// Upsert by key.  An update bumps `updated_at` but preserves
    /// `created_at` and `access_count`.
    pub fn archival_store(
        &self,
        key: &str,
        value: &str,
        category: &str,
        importance: f64,
    ) -> Result<(), MemoryError> {
        let importance = importance.clamp(0.0, 1.0);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO archival (key, value, category, importance)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    category = excluded.category,
                    importance = excluded.importance,
                    updated_at = unixepoch()",
                params![key, value, category, importance],
            )?;
            Ok(())
        })
    }

    /// Read a fact by key, bumping its access count in the same lock scope.
    pub fn archival_recall(&self, key: &str) -> Result<String, MemoryError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE archival SET access_count = access_count + 1 WHERE key = ?1",
                params![key],
            )?;
            if n == 0 {
                return Err(MemoryError::NoSuchKey(key.to_string()));
            }
            conn.query_row(
                "SELECT value FROM archival WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }

    /// Full-text search over key ∪ value.
    pub fn archival_search(
        &self,
        query: &str,
        max: usize,
    ) -> Result<Vec<ArchivalFact>, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.key, a.value, a.category, a.importance,
                        a.created_at, a.updated_at, a.access_count
                 FROM archival_fts f
                 JOIN archival a ON a.id = f.rowid
                 WHERE archival_fts MATCH ?1
                 ORDER BY rank, a.updated_at DESC, a.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, max as i64], |row| {
                Ok(ArchivalFact {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    category: row.get(3)?,
                    importance: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                    access_count: row.get(7)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn archival_count(&self) -> Result<i64, MemoryError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM archival", [], |row| row.get(0))
                .map_err(Into::into)
        })
    }

    /// Direct fact lookup used by tests and the `archival_recall` error path.
    pub fn archival_get(&self, key: &str) -> Result<Option<ArchivalFact>, MemoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, key, value, category, importance, created_at, updated_at, access_count
                 FROM archival WHERE key = ?1",
            )?;
            let mut rows = stmt.query(params![key])?;
            match rows.next()? {
                Some(row) => Ok(Some(ArchivalFact {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    category: row.get(3)?,
                    importance: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                    access_count: row.get(7)?,
                })),
                None => Ok(None),
            }
        })
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// Allocate a new session id.
    pub fn session_create(&self, title: &str) -> Result<i64, MemoryError> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO sessions (title) VALUES (?1)", params![title])?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn row_to_recall(row: &rusqlite::Row<'_>) -> Result<RecallRow, rusqlite::Error> {
    Ok(RecallRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        token_count: row.get(4)?,
        timestamp: row.get(5)?,
        summary_of: row.get(6)?,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
