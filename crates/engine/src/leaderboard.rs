use anyhow::{Context, Result};
use common::db::AsyncDb;
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::jury::{self, RubricVersion};
use crate::ledger;

/// Relative weight of the jury component vs the normalized investment
/// component in the blended final score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub jury_weight: f64,
    pub investment_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            jury_weight: 0.7,
            investment_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub team_id: String,
    pub team_name: String,
    pub table_number: Option<i64>,
    /// Sum of per-criterion juror averages. None = no jury rows yet,
    /// which is not the same thing as scoring zero.
    pub jury_score: Option<f64>,
    pub juror_count: u32,
    pub total_investment: i64,
    pub final_score: f64,
}

/// Blend the jury component with the normalized investment total.
///
/// The investment side is normalized against the highest team total
/// observed in the event, then scaled onto the rubric's own range so the
/// two components stay comparable across rubric versions:
///
///   final = jury_weight * jury + investment_weight * (inv / max_inv) * rubric_max
///
/// A missing jury component contributes 0 to the blend (the entry still
/// reports jury_score = null). While no investments exist, the investment
/// component is 0 for everyone.
pub fn blend(
    jury_score: Option<f64>,
    total_investment: i64,
    max_investment: i64,
    rubric_max: f64,
    weights: &ScoreWeights,
) -> f64 {
    let jury_part = weights.jury_weight * jury_score.unwrap_or(0.0);
    let investment_part = if max_investment > 0 {
        weights.investment_weight * (total_investment as f64 / max_investment as f64) * rubric_max
    } else {
        0.0
    };
    jury_part + investment_part
}

/// Rank every team of the event. Recomputed from the ledger and rubric
/// tables on every call; the result can never be stale relative to them.
///
/// Ordering is deterministic: final score desc, jury component desc
/// (absent component sorts below any present one), team id asc.
pub async fn leaderboard(
    db: &AsyncDb,
    event_id: &str,
    weights: ScoreWeights,
) -> Result<Vec<LeaderboardEntry>> {
    let event_id_owned = event_id.to_string();

    let entries = db
        .call_named("leaderboard.compute", move |conn| {
            compute_sync(conn, &event_id_owned, &weights)
        })
        .await
        .context("leaderboard computation failed")?;

    metrics::counter!("ideafund_leaderboard_computations_total").increment(1);
    Ok(entries)
}

fn compute_sync(
    conn: &rusqlite::Connection,
    event_id: &str,
    weights: &ScoreWeights,
) -> Result<Vec<LeaderboardEntry>> {
    let rubric_str: String = conn
        .query_row(
            "SELECT rubric FROM events WHERE event_id = ?1",
            [event_id],
            |row| row.get(0),
        )
        .optional()?
        .with_context(|| format!("event {event_id} not found"))?;
    let rubric = RubricVersion::parse(&rubric_str)
        .with_context(|| format!("event {event_id} has unknown rubric {rubric_str}"))?;

    let mut stmt = conn.prepare(
        "SELECT team_id, name, table_number FROM teams WHERE event_id = ?1 ORDER BY team_id",
    )?;
    let teams = stmt
        .query_map([event_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let totals = ledger::event_totals_sync(conn, event_id)?;
    let jury_rows = jury::team_scores_sync(conn, event_id)?;

    let max_investment = totals.values().copied().max().unwrap_or(0);

    let mut entries: Vec<LeaderboardEntry> = teams
        .into_iter()
        .map(|(team_id, team_name, table_number)| {
            let rows = jury_rows.get(&team_id).map_or(&[][..], Vec::as_slice);
            let jury_score = jury::jury_component(rubric, rows);
            let total_investment = totals.get(&team_id).copied().unwrap_or(0);
            let final_score = blend(
                jury_score,
                total_investment,
                max_investment,
                rubric.max_total(),
                weights,
            );
            LeaderboardEntry {
                rank: 0,
                team_id,
                team_name,
                table_number,
                jury_score,
                juror_count: rows.len() as u32,
                total_investment,
                final_score,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| jury_sort_key(b).total_cmp(&jury_sort_key(a)))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx as u32 + 1;
    }

    Ok(entries)
}

fn jury_sort_key(entry: &LeaderboardEntry) -> f64 {
    entry.jury_score.unwrap_or(f64::NEG_INFINITY)
}
