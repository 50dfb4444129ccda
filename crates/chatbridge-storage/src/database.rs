// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: PRAGMA setup, migrations, lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so
//! writes from one process are serialized. Cross-process races are settled by
//! the conditional statements in [`crate::queries`].

use chatbridge_core::BridgeError;
use tracing::debug;

/// Timestamp expression used for every `*_at` column.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// An open SQLite database with migrations applied.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` with WAL enabled.
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, BridgeError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(BridgeError::store)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(BridgeError::store)?;

        let applied = conn
            .call(move |conn| {
                let journal = if wal_mode { "WAL" } else { "DELETE" };
                conn.execute_batch(&format!(
                    "PRAGMA journal_mode = {journal};
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;"
                ))?;
                Ok::<_, rusqlite::Error>(
                    crate::migrations::run_migrations(conn).map_err(|e| e.to_string()),
                )
            })
            .await
            .map_err(map_tr_err)?
            .map_err(|e| BridgeError::store(std::io::Error::other(e)))?;

        debug!(path, applied, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BridgeError> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| BridgeError::store(std::io::Error::other(e.to_string())))
    }
}

/// Converts tokio-rusqlite errors into store errors.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> BridgeError {
    BridgeError::store(e)
}
