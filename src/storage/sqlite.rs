//! SQLite mirror of the conversation log.
//!
//! One table `(id, role, content)`. A connection is opened for each call
//! and dropped when the call returns; nothing is pooled or shared.

use crate::core::conversation::{ConversationLog, Message};
use crate::error::StorageError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A row of the mirror table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
}

// The table name is spliced into SQL text, so only plain identifiers pass.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    table: String,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, table: &str) -> Result<Self, StorageError> {
        if !IDENTIFIER.is_match(table) {
            return Err(StorageError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            path: path.into(),
            table: table.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn open(&self) -> Result<Connection, StorageError> {
        Ok(Connection::open(&self.path)?)
    }

    fn open_readonly(&self) -> Result<Connection, StorageError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }

    pub fn create_table(&self) -> Result<(), StorageError> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    role TEXT,
                    content TEXT
                )",
                self.table
            ),
            [],
        )?;
        tracing::debug!("[SqliteStore] Ensured table '{}' in {}", self.table, self.path.display());
        Ok(())
    }

    /// Insert every message of `log` in order. Returns the number of rows written.
    pub fn insert_all(&self, log: &ConversationLog) -> Result<usize, StorageError> {
        self.insert_messages(log.messages())
    }

    pub fn insert_messages(&self, messages: &[Message]) -> Result<usize, StorageError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (role, content) VALUES (?1, ?2)",
                self.table
            ))?;
            for message in messages {
                stmt.execute(params![message.role().as_str(), message.content()])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            "[SqliteStore] Inserted {} messages into '{}'",
            messages.len(),
            self.table
        );
        Ok(messages.len())
    }

    pub fn delete_all(&self) -> Result<usize, StorageError> {
        let conn = self.open()?;
        let deleted = conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        tracing::info!("[SqliteStore] Deleted {} rows from '{}'", deleted, self.table);
        Ok(deleted)
    }

    pub fn load_all(&self) -> Result<Vec<StoredMessage>, StorageError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, role, content FROM {} ORDER BY id",
            self.table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                role: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.open()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Schema description handed to the query chain: the `CREATE TABLE`
    /// statement followed by up to `sample_rows` rows.
    pub fn table_info(&self, sample_rows: usize) -> Result<String, StorageError> {
        let conn = self.open()?;
        let create: String = conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, role, content FROM {} ORDER BY id LIMIT ?1",
            self.table
        ))?;
        let mut rows = stmt.query(params![sample_rows as i64])?;
        let mut lines = vec!["id\trole\tcontent".to_string()];
        while let Some(row) = rows.next()? {
            let cells: Vec<String> = (0..3).map(|i| render_value(row.get_ref(i))).collect();
            lines.push(cells.join("\t"));
        }

        Ok(format!(
            "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
            create.trim(),
            lines.len() - 1,
            self.table,
            lines.join("\n")
        ))
    }

    /// Run one statement on a read-only connection and render up to
    /// `max_rows` result rows as `[(v1, v2), ...]`.
    pub fn query_readonly(&self, sql: &str, max_rows: usize) -> Result<String, StorageError> {
        let conn = self.open_readonly()?;
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(StorageError::WriteRejected(sql.to_string()));
        }

        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut rendered = Vec::new();
        while let Some(row) = rows.next()? {
            if rendered.len() == max_rows {
                break;
            }
            let cells: Vec<String> = (0..columns).map(|i| quote_value(row.get_ref(i))).collect();
            if cells.len() == 1 {
                rendered.push(format!("({},)", cells[0]));
            } else {
                rendered.push(format!("({})", cells.join(", ")));
            }
        }

        tracing::debug!("[SqliteStore] Query returned {} rows: {}", rendered.len(), sql);
        Ok(format!("[{}]", rendered.join(", ")))
    }
}

fn render_value(value: rusqlite::Result<ValueRef<'_>>) -> String {
    match value {
        Ok(ValueRef::Null) => "NULL".to_string(),
        Ok(ValueRef::Integer(i)) => i.to_string(),
        Ok(ValueRef::Real(f)) => f.to_string(),
        Ok(ValueRef::Text(t)) => String::from_utf8_lossy(t).into_owned(),
        Ok(ValueRef::Blob(b)) => format!("<{} bytes>", b.len()),
        Err(_) => String::new(),
    }
}

fn quote_value(value: rusqlite::Result<ValueRef<'_>>) -> String {
    match value {
        Ok(ValueRef::Null) => "None".to_string(),
        Ok(ValueRef::Text(t)) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "\\'")),
        other => render_value(other),
    }
}
