use std::collections::BTreeMap;

use anyhow::{Context, Result};
use common::db::AsyncDb;
use thiserror::Error;

/// One named rubric criterion and the top of its integer sub-scale
/// (scores run 1..=max).
#[derive(Debug, Clone, Copy)]
pub struct Criterion {
    pub key: &'static str,
    pub max: i64,
}

const IDEATHON_CRITERIA: [Criterion; 4] = [
    Criterion { key: "innovation", max: 10 },
    Criterion { key: "feasibility", max: 10 },
    Criterion { key: "impact", max: 10 },
    Criterion { key: "presentation", max: 10 },
];

const HACKATHON_CRITERIA: [Criterion; 5] = [
    Criterion { key: "innovation", max: 20 },
    Criterion { key: "technical_execution", max: 20 },
    Criterion { key: "market_potential", max: 20 },
    Criterion { key: "presentation", max: 20 },
    Criterion { key: "progress", max: 20 },
];

/// The active criteria set for an event. The two variants are not
/// numerically comparable (max totals 40 vs 100) and must never be mixed
/// within one leaderboard, so the version is fixed per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricVersion {
    /// 4 criteria on a 1-10 scale, max total 40.
    Ideathon,
    /// 5 criteria on a 1-20 scale, max total 100.
    Hackathon,
}

impl RubricVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ideathon => "ideathon",
            Self::Hackathon => "hackathon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ideathon" => Some(Self::Ideathon),
            "hackathon" => Some(Self::Hackathon),
            _ => None,
        }
    }

    pub fn criteria(&self) -> &'static [Criterion] {
        match self {
            Self::Ideathon => &IDEATHON_CRITERIA,
            Self::Hackathon => &HACKATHON_CRITERIA,
        }
    }

    /// Best possible jury component: every criterion at its max.
    pub fn max_total(&self) -> f64 {
        self.criteria().iter().map(|c| c.max as f64).sum()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RubricError {
    #[error("missing score for criterion {0}")]
    MissingCriterion(String),

    #[error("unknown criterion {0}")]
    UnknownCriterion(String),

    #[error("score {score} for {criterion} is outside 1..={max}")]
    OutOfRange {
        criterion: String,
        score: i64,
        max: i64,
    },
}

/// Check a juror's submission against the event's rubric: every criterion
/// present, nothing extra, every score within its sub-scale.
pub fn validate_scores(
    rubric: RubricVersion,
    scores: &BTreeMap<String, i64>,
) -> Result<(), RubricError> {
    for criterion in rubric.criteria() {
        match scores.get(criterion.key) {
            None => return Err(RubricError::MissingCriterion(criterion.key.to_string())),
            Some(score) if *score < 1 || *score > criterion.max => {
                return Err(RubricError::OutOfRange {
                    criterion: criterion.key.to_string(),
                    score: *score,
                    max: criterion.max,
                });
            }
            Some(_) => {}
        }
    }
    if let Some(extra) = scores
        .keys()
        .find(|key| !rubric.criteria().iter().any(|c| c.key == key.as_str()))
    {
        return Err(RubricError::UnknownCriterion(extra.clone()));
    }
    Ok(())
}

/// Aggregate one team's jury rows into a single comparable component:
/// each criterion is averaged across jurors, then the per-criterion
/// averages are summed. Returns None when the team has no jury rows —
/// deliberately distinguishable from a team that scored zero everywhere.
pub fn jury_component(
    rubric: RubricVersion,
    rows: &[BTreeMap<String, i64>],
) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let juror_count = rows.len() as f64;
    let total = rubric
        .criteria()
        .iter()
        .map(|criterion| {
            let sum: i64 = rows.iter().filter_map(|row| row.get(criterion.key)).sum();
            sum as f64 / juror_count
        })
        .sum();
    Some(total)
}

/// Store or replace a juror's evaluation of a team. One row per
/// (juror, team): re-scoring updates in place so only the latest
/// evaluation counts.
pub async fn upsert_jury_score(
    db: &AsyncDb,
    event_id: &str,
    juror_id: &str,
    team_id: &str,
    rubric: RubricVersion,
    scores: BTreeMap<String, i64>,
    comments: Option<String>,
) -> Result<(), UpsertError> {
    validate_scores(rubric, &scores)?;

    let scores_json =
        serde_json::to_string(&scores).map_err(|e| UpsertError::Storage(e.into()))?;
    let event_id = event_id.to_string();
    let juror_id = juror_id.to_string();
    let team_id = team_id.to_string();

    db.call_named("jury.upsert_score", move |conn| {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO jury_scores (event_id, juror_id, team_id, scores_json, comments, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(juror_id, team_id) DO UPDATE SET
                 scores_json = excluded.scores_json,
                 comments = excluded.comments,
                 updated_at = excluded.updated_at",
            rusqlite::params![event_id, juror_id, team_id, scores_json, comments, now],
        )?;
        Ok(())
    })
    .await
    .map_err(UpsertError::Storage)
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error(transparent)]
    Rubric(#[from] RubricError),

    #[error("failed to store jury score: {0}")]
    Storage(#[source] anyhow::Error),
}

/// All jury rows for an event, parsed and grouped by team.
pub(crate) fn team_scores_sync(
    conn: &rusqlite::Connection,
    event_id: &str,
) -> Result<BTreeMap<String, Vec<BTreeMap<String, i64>>>> {
    let mut stmt = conn
        .prepare("SELECT team_id, scores_json FROM jury_scores WHERE event_id = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([event_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_team: BTreeMap<String, Vec<BTreeMap<String, i64>>> = BTreeMap::new();
    for (team_id, scores_json) in rows {
        let scores: BTreeMap<String, i64> = serde_json::from_str(&scores_json)
            .with_context(|| format!("corrupt scores_json for team {team_id}"))?;
        by_team.entry(team_id).or_default().push(scores);
    }
    Ok(by_team)
}
