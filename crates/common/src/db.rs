use anyhow::Result;

/// Async database wrapper around `tokio_rusqlite::Connection`.
///
/// Runs all SQLite operations on a dedicated background thread via
/// `tokio_rusqlite`, keeping the Tokio runtime cooperative. Clone is
/// cheap (shared mpsc sender to the background thread). Because every
/// write goes through the single background connection, multi-statement
/// ballot commits are serialized process-wide in addition to their own
/// SQL transaction.
#[derive(Clone)]
pub struct AsyncDb {
    conn: tokio_rusqlite::Connection,
}

impl AsyncDb {
    /// Open a database at `path`, set PRAGMAs (WAL, foreign keys, busy_timeout),
    /// and run migrations — all on the background thread.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path).await?;

        // Startup migrations require a write lock and can race concurrent
        // readers (a second server instance, an admin sqlite3 session, a
        // deploy check). Retry with backoff instead of crash-looping under
        // systemd. busy_timeout stays short per attempt so backoff is
        // handled here rather than inside SQLite.
        let mut backoff = std::time::Duration::from_secs(1);
        let max_backoff = std::time::Duration::from_secs(30);
        let max_total_wait = std::time::Duration::from_secs(10 * 60);
        let start = std::time::Instant::now();

        loop {
            let res = conn
                .call(|conn| -> std::result::Result<(), rusqlite::Error> {
                    conn.busy_timeout(std::time::Duration::from_secs(1))?;
                    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
                    conn.execute_batch(SCHEMA)?;
                    migrate_events_team_count(conn)?;
                    migrate_teams_table_number(conn)?;
                    conn.busy_timeout(std::time::Duration::from_secs(30))?;
                    Ok(())
                })
                .await;

            match res {
                Ok(()) => break,
                Err(tokio_rusqlite::Error::Error(err)) => {
                    let is_locked = matches!(
                        err,
                        rusqlite::Error::SqliteFailure(
                            rusqlite::ffi::Error {
                                code: rusqlite::ffi::ErrorCode::DatabaseBusy
                                    | rusqlite::ffi::ErrorCode::DatabaseLocked,
                                ..
                            },
                            _,
                        )
                    );
                    if !is_locked {
                        return Err(
                            anyhow::Error::from(err).context("AsyncDb::open: migration failed")
                        );
                    }

                    if start.elapsed() >= max_total_wait {
                        return Err(anyhow::Error::from(err).context(
                            "AsyncDb::open: migration failed (database stayed locked too long)",
                        ));
                    }

                    tracing::warn!(
                        wait_for = ?backoff,
                        "AsyncDb::open: database is locked; retrying migrations"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(other) => return Err(anyhow::anyhow!("AsyncDb::open: {other}")),
            }
        }

        Ok(Self { conn })
    }

    /// Run a closure on the background SQLite thread and return the result.
    ///
    /// The closure receives `&mut rusqlite::Connection` and can perform
    /// arbitrary sync SQLite operations, including explicit transactions.
    pub async fn call<F, R>(&self, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(move |conn| function(conn)).await.map_err(
            |e: tokio_rusqlite::Error<anyhow::Error>| match e {
                tokio_rusqlite::Error::ConnectionClosed => {
                    anyhow::anyhow!("database connection closed")
                }
                tokio_rusqlite::Error::Close((_, err)) => {
                    anyhow::anyhow!("database close error: {err}")
                }
                tokio_rusqlite::Error::Error(err) => err,
                other => anyhow::anyhow!("database error: {other}"),
            },
        )
    }

    /// Like [`Self::call`], but records Prometheus metrics for DB latency and errors.
    ///
    /// Measures full wall-clock time including queueing on the dedicated
    /// SQLite thread and execution of all SQL in the closure.
    pub async fn call_named<F, R>(&self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let start = std::time::Instant::now();
        let res = self.call(function).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match &res {
            Ok(_) => {
                metrics::histogram!(
                    "ideafund_db_query_latency_ms",
                    "op" => op,
                    "status" => "ok"
                )
                .record(ms);
            }
            Err(_) => {
                metrics::histogram!(
                    "ideafund_db_query_latency_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(ms);
                metrics::counter!("ideafund_db_query_errors_total", "op" => op).increment(1);
            }
        }

        res
    }
}

/// Add team_count to events if missing (DBs created while the
/// exactly-3-teams rule was still hardcoded).
fn migrate_events_team_count(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let has: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('events') WHERE name='team_count'",
        [],
        |row| row.get(0),
    )?;
    if has == 0 {
        conn.execute(
            "ALTER TABLE events ADD COLUMN team_count INTEGER NOT NULL DEFAULT 3",
            [],
        )?;
    }
    Ok(())
}

/// Add table_number to teams if missing (pre-venue-seating DBs).
fn migrate_teams_table_number(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let has: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('teams') WHERE name='table_number'",
        [],
        |row| row.get(0),
    )?;
    if has == 0 {
        conn.execute("ALTER TABLE teams ADD COLUMN table_number INTEGER", [])?;
    }
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phase TEXT NOT NULL DEFAULT 'registration',   -- see EventPhase
    rubric TEXT NOT NULL DEFAULT 'hackathon',     -- ideathon | hackathon
    team_count INTEGER NOT NULL DEFAULT 3,        -- distinct teams per ballot
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS teams (
    team_id TEXT PRIMARY KEY,
    event_id TEXT NOT NULL REFERENCES events(event_id),
    name TEXT NOT NULL,
    table_number INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS participants (
    participant_id TEXT PRIMARY KEY,
    event_id TEXT NOT NULL REFERENCES events(event_id),
    team_id TEXT REFERENCES teams(team_id),
    display_name TEXT NOT NULL,
    wallet_balance INTEGER NOT NULL,              -- fixed at registration
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only ledger of participant -> team transfers. Never UPDATEd or
-- DELETEd; team totals and remaining balances are derived by summing rows.
CREATE TABLE IF NOT EXISTS investments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL REFERENCES events(event_id),
    participant_id TEXT NOT NULL REFERENCES participants(participant_id),
    team_id TEXT NOT NULL REFERENCES teams(team_id),
    amount INTEGER NOT NULL CHECK (amount > 0),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(event_id, participant_id, team_id)
);

-- One row per (juror, team); re-scoring replaces the row in place so only
-- the juror's latest evaluation counts.
CREATE TABLE IF NOT EXISTS jury_scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL REFERENCES events(event_id),
    juror_id TEXT NOT NULL,
    team_id TEXT NOT NULL REFERENCES teams(team_id),
    scores_json TEXT NOT NULL,                    -- {criterion: integer score}
    comments TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(juror_id, team_id)
);

CREATE INDEX IF NOT EXISTS idx_teams_event ON teams(event_id);
CREATE INDEX IF NOT EXISTS idx_participants_event ON participants(event_id);
CREATE INDEX IF NOT EXISTS idx_investments_event_participant ON investments(event_id, participant_id);
CREATE INDEX IF NOT EXISTS idx_investments_event_team ON investments(event_id, team_id);
CREATE INDEX IF NOT EXISTS idx_jury_scores_event_team ON jury_scores(event_id, team_id);
"#;
