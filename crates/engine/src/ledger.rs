use std::collections::BTreeMap;

use anyhow::Result;
use common::db::AsyncDb;
use common::types::Investment;

/// Whether any ledger rows exist for this participant+event. "Has voted" is
/// an existence query over the ledger, never a separate flag that could
/// drift from it.
pub(crate) fn voted_sync(
    conn: &rusqlite::Connection,
    event_id: &str,
    participant_id: &str,
) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM investments WHERE event_id = ?1 AND participant_id = ?2",
        [event_id, participant_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Append one ledger row per entry. Caller owns the surrounding transaction;
/// this function never commits.
pub(crate) fn insert_investments_sync(
    conn: &rusqlite::Connection,
    event_id: &str,
    participant_id: &str,
    entries: &[(String, i64)],
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "INSERT INTO investments (event_id, participant_id, team_id, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let now = chrono::Utc::now().to_rfc3339();
    for (team_id, amount) in entries {
        stmt.execute(rusqlite::params![
            event_id,
            participant_id,
            team_id,
            amount,
            now
        ])?;
    }
    Ok(())
}

/// Sum of received investment per team, computed at read time.
pub(crate) fn event_totals_sync(
    conn: &rusqlite::Connection,
    event_id: &str,
) -> Result<BTreeMap<String, i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT team_id, SUM(amount) FROM investments WHERE event_id = ?1 GROUP BY team_id",
    )?;
    let rows = stmt
        .query_map([event_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<String, i64>, _>>()?;
    Ok(rows)
}

/// Whether the participant has submitted a ballot for this event.
pub async fn has_voted(db: &AsyncDb, event_id: &str, participant_id: &str) -> Result<bool> {
    let event_id = event_id.to_string();
    let participant_id = participant_id.to_string();
    db.call_named("ledger.has_voted", move |conn| {
        Ok(voted_sync(conn, &event_id, &participant_id)?)
    })
    .await
}

/// All ledger rows the participant created for this event, oldest first.
/// An empty list means "has not voted".
pub async fn participant_investments(
    db: &AsyncDb,
    event_id: &str,
    participant_id: &str,
) -> Result<Vec<Investment>> {
    let event_id = event_id.to_string();
    let participant_id = participant_id.to_string();
    db.call_named("ledger.participant_investments", move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, event_id, participant_id, team_id, amount, created_at
             FROM investments
             WHERE event_id = ?1 AND participant_id = ?2
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map([&event_id, &participant_id], |row| {
                Ok(Investment {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    participant_id: row.get(2)?,
                    team_id: row.get(3)?,
                    amount: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
    .await
}

/// Total investment a team has received. Summed from the ledger on every
/// call; there is no cached counter to go stale.
pub async fn team_total(db: &AsyncDb, event_id: &str, team_id: &str) -> Result<i64> {
    let event_id = event_id.to_string();
    let team_id = team_id.to_string();
    db.call_named("ledger.team_total", move |conn| {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM investments
             WHERE event_id = ?1 AND team_id = ?2",
            [&event_id, &team_id],
            |row| row.get(0),
        )?;
        Ok(total)
    })
    .await
}
