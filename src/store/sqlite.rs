use rusqlite::{params, Connection, OptionalExtension};

use super::table::{fingerprint, Table};
use super::{ArtifactName, ArtifactStore};
use crate::error::{DashError, Result};
use crate::logging::ts_now;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS artifacts (
                name TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    /// Fingerprint recorded with the last write of `name`.
    pub fn stored_fingerprint(&self, name: &ArtifactName) -> Result<Option<String>> {
        let fp = self
            .conn
            .query_row(
                "SELECT fingerprint FROM artifacts WHERE name = ?1",
                params![name.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(fp)
    }

    fn upsert(conn: &Connection, name: &ArtifactName, table: &Table) -> Result<()> {
        conn.execute(
            "INSERT INTO artifacts (name, fingerprint, row_count, updated_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                row_count = excluded.row_count,
                updated_at = excluded.updated_at,
                payload = excluded.payload",
            params![
                name.as_str(),
                fingerprint(table)?,
                table.len() as i64,
                ts_now(),
                table.to_json()?
            ],
        )?;
        Ok(())
    }
}

impl ArtifactStore for SqliteStore {
    fn load(&self, name: &ArtifactName) -> Result<Option<Table>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM artifacts WHERE name = ?1",
                params![name.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match payload {
            Some(raw) => Table::from_json(&raw)
                .map(Some)
                .map_err(|e| DashError::Persistence(format!("artifact {} unreadable: {}", name, e))),
            None => Ok(None),
        }
    }

    fn save(&mut self, name: &ArtifactName, table: &Table) -> Result<()> {
        Self::upsert(&self.conn, name, table)
    }

    fn save_generation(&mut self, entries: &[(ArtifactName, Table)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, table) in entries {
            Self::upsert(&tx, name, table)?;
        }
        tx.commit()?;
        Ok(())
    }
}
