//! Shared fixtures for engine tests: a seeded event with four teams and a
//! few registered participants, plus raw-SQL helpers that bypass the
//! submitter so individual components can be exercised in isolation.

use common::db::AsyncDb;

pub struct SeedSpec {
    pub rubric: &'static str,
    pub team_count: u32,
    pub phase: &'static str,
}

impl Default for SeedSpec {
    fn default() -> Self {
        Self {
            rubric: "hackathon",
            team_count: 3,
            phase: "voting",
        }
    }
}

/// Open an in-memory DB and seed event `ev-1` with teams `t-1..t-4`
/// (Alpha..Delta) and participants `p-1`/`p-2` (members of `t-4`) and
/// `p-3` (no team), each with a 1000-unit wallet.
pub async fn seed_event(spec: SeedSpec) -> AsyncDb {
    let db = AsyncDb::open(":memory:").await.unwrap();
    let rubric = spec.rubric.to_string();
    let phase = spec.phase.to_string();
    let team_count = spec.team_count;

    db.call(move |conn| {
        conn.execute(
            "INSERT INTO events (event_id, name, phase, rubric, team_count)
             VALUES ('ev-1', 'Test Event', ?1, ?2, ?3)",
            rusqlite::params![phase, rubric, team_count],
        )?;
        for (team_id, name) in [
            ("t-1", "Alpha"),
            ("t-2", "Bravo"),
            ("t-3", "Charlie"),
            ("t-4", "Delta"),
        ] {
            conn.execute(
                "INSERT INTO teams (team_id, event_id, name) VALUES (?1, 'ev-1', ?2)",
                [team_id, name],
            )?;
        }
        for (participant_id, team_id, name) in [
            ("p-1", Some("t-4"), "Ada"),
            ("p-2", Some("t-4"), "Grace"),
            ("p-3", None, "Linus"),
        ] {
            conn.execute(
                "INSERT INTO participants (participant_id, event_id, team_id, display_name, wallet_balance)
                 VALUES (?1, 'ev-1', ?2, ?3, 1000)",
                rusqlite::params![participant_id, team_id, name],
            )?;
        }
        Ok(())
    })
    .await
    .unwrap();

    db
}

/// Insert ledger rows directly, bypassing validation and the submitter.
pub async fn insert_ballot(
    db: &AsyncDb,
    event_id: &str,
    participant_id: &str,
    entries: &[(&str, i64)],
) {
    let event_id = event_id.to_string();
    let participant_id = participant_id.to_string();
    let entries: Vec<(String, i64)> = entries
        .iter()
        .map(|(team, amount)| (team.to_string(), *amount))
        .collect();

    db.call(move |conn| {
        for (team_id, amount) in &entries {
            conn.execute(
                "INSERT INTO investments (event_id, participant_id, team_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![event_id, participant_id, team_id, amount],
            )?;
        }
        Ok(())
    })
    .await
    .unwrap();
}

/// Insert a jury row directly with a raw criterion-score JSON map.
pub async fn insert_jury_row(db: &AsyncDb, juror_id: &str, team_id: &str, scores_json: &str) {
    let juror_id = juror_id.to_string();
    let team_id = team_id.to_string();
    let scores_json = scores_json.to_string();

    db.call(move |conn| {
        conn.execute(
            "INSERT INTO jury_scores (event_id, juror_id, team_id, scores_json)
             VALUES ('ev-1', ?1, ?2, ?3)",
            rusqlite::params![juror_id, team_id, scores_json],
        )?;
        Ok(())
    })
    .await
    .unwrap();
}
