use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rusqlite::OptionalExtension;
use serde::Deserialize;

use common::types::{Event, EventPhase, Team};
use engine::jury::RubricVersion;

use crate::api::{fetch_event, AppState};
use crate::error::{ApiError, ApiResult};

/// GET /api/events/{event_id}
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Event>> {
    Ok(Json(fetch_event(&state, &event_id).await?))
}

/// GET /api/events/{event_id}/teams
pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<Team>>> {
    fetch_event(&state, &event_id).await?;

    let event_id_owned = event_id.clone();
    let teams = state
        .db
        .call_named("api.list_teams", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT team_id, event_id, name, table_number, created_at
                 FROM teams WHERE event_id = ?1 ORDER BY team_id",
            )?;
            let rows = stmt
                .query_map([&event_id_owned], |row| {
                    Ok(Team {
                        team_id: row.get(0)?,
                        event_id: row.get(1)?,
                        name: row.get(2)?,
                        table_number: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(ApiError::ComputationFailed)?;

    Ok(Json(teams))
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    /// Defaults to a slug of the name.
    pub event_id: Option<String>,
    pub name: String,
    /// ideathon | hackathon; defaults to hackathon.
    pub rubric: Option<String>,
    /// Distinct teams per ballot; defaults to the [voting] config value.
    pub team_count: Option<u32>,
}

/// POST /api/admin/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("event name must not be empty".into()));
    }
    let rubric = req.rubric.unwrap_or_else(|| "hackathon".to_string());
    if RubricVersion::parse(&rubric).is_none() {
        return Err(ApiError::BadRequest(format!("unknown rubric {rubric}")));
    }
    let team_count = req.team_count.unwrap_or(state.voting.team_count);
    if team_count == 0 {
        return Err(ApiError::BadRequest("team_count must be at least 1".into()));
    }
    let event_id = req.event_id.unwrap_or_else(|| slugify(&req.name));
    if event_id.is_empty() {
        return Err(ApiError::BadRequest("event id must not be empty".into()));
    }

    let event = state
        .db
        .call_named("api.create_event", {
            let event_id = event_id.clone();
            let name = req.name.clone();
            move |conn| {
                conn.execute(
                    "INSERT INTO events (event_id, name, rubric, team_count)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![event_id, name, rubric, team_count],
                )?;
                load_event(conn, &event_id)
            }
        })
        .await
        .map_err(|e| conflict_or_internal(e, format!("event {event_id} already exists")))?;

    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Deserialize)]
pub struct SetPhaseRequest {
    pub phase: String,
}

/// PUT /api/admin/events/{event_id}/phase
pub async fn set_phase(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<SetPhaseRequest>,
) -> ApiResult<Json<Event>> {
    fetch_event(&state, &event_id).await?;
    if EventPhase::parse(&req.phase).is_none() {
        return Err(ApiError::BadRequest(format!("unknown phase {}", req.phase)));
    }

    let event = state
        .db
        .call_named("api.set_phase", {
            let event_id = event_id.clone();
            move |conn| {
                conn.execute(
                    "UPDATE events SET phase = ?1 WHERE event_id = ?2",
                    [&req.phase, &event_id],
                )?;
                load_event(conn, &event_id)
            }
        })
        .await
        .map_err(ApiError::ComputationFailed)?;

    tracing::info!(event_id = %event_id, phase = %event.phase, "event phase changed");
    Ok(Json(event))
}

#[derive(Deserialize)]
pub struct CreateTeamRequest {
    pub team_id: Option<String>,
    pub name: String,
    pub table_number: Option<i64>,
}

/// POST /api/admin/events/{event_id}/teams
pub async fn create_team(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    fetch_event(&state, &event_id).await?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("team name must not be empty".into()));
    }
    let team_id = req.team_id.unwrap_or_else(|| slugify(&req.name));
    if team_id.is_empty() {
        return Err(ApiError::BadRequest("team id must not be empty".into()));
    }

    let team = state
        .db
        .call_named("api.create_team", {
            let team_id = team_id.clone();
            let event_id = event_id.clone();
            move |conn| {
                conn.execute(
                    "INSERT INTO teams (team_id, event_id, name, table_number)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![team_id, event_id, req.name, req.table_number],
                )?;
                let team = conn.query_row(
                    "SELECT team_id, event_id, name, table_number, created_at
                     FROM teams WHERE team_id = ?1",
                    [&team_id],
                    |row| {
                        Ok(Team {
                            team_id: row.get(0)?,
                            event_id: row.get(1)?,
                            name: row.get(2)?,
                            table_number: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )?;
                Ok(team)
            }
        })
        .await
        .map_err(|e| conflict_or_internal(e, format!("team {team_id} already exists")))?;

    Ok((StatusCode::CREATED, Json(team)))
}

#[derive(Deserialize)]
pub struct RegisterParticipantRequest {
    /// Badge/activation code handed out at check-in.
    pub participant_id: String,
    pub display_name: String,
    pub team_id: Option<String>,
    /// Defaults to the [voting] config wallet.
    pub wallet_balance: Option<i64>,
}

/// POST /api/admin/events/{event_id}/participants
pub async fn register_participant(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<RegisterParticipantRequest>,
) -> ApiResult<(StatusCode, Json<common::types::Participant>)> {
    fetch_event(&state, &event_id).await?;
    if req.participant_id.trim().is_empty() || req.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "participant_id and display_name must not be empty".into(),
        ));
    }
    let wallet_balance = req.wallet_balance.unwrap_or(state.voting.wallet_balance);
    if wallet_balance <= 0 {
        return Err(ApiError::BadRequest("wallet_balance must be positive".into()));
    }

    // Team affiliation must point into this event.
    if let Some(team_id) = &req.team_id {
        let team_id_owned = team_id.clone();
        let event_id_owned = event_id.clone();
        let exists: bool = state
            .db
            .call_named("api.team_in_event", move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM teams WHERE team_id = ?1 AND event_id = ?2",
                    [&team_id_owned, &event_id_owned],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(ApiError::ComputationFailed)?;
        if !exists {
            return Err(ApiError::NotFound(format!("team {team_id}")));
        }
    }

    let participant_id = req.participant_id.clone();
    let participant = state
        .db
        .call_named("api.register_participant", {
            let event_id = event_id.clone();
            let participant_id = participant_id.clone();
            move |conn| {
                conn.execute(
                    "INSERT INTO participants (participant_id, event_id, team_id, display_name, wallet_balance)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        participant_id,
                        event_id,
                        req.team_id,
                        req.display_name,
                        wallet_balance
                    ],
                )?;
                let participant = conn.query_row(
                    "SELECT participant_id, event_id, team_id, display_name, wallet_balance, created_at
                     FROM participants WHERE participant_id = ?1",
                    [&participant_id],
                    |row| {
                        Ok(common::types::Participant {
                            participant_id: row.get(0)?,
                            event_id: row.get(1)?,
                            team_id: row.get(2)?,
                            display_name: row.get(3)?,
                            wallet_balance: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )?;
                Ok(participant)
            }
        })
        .await
        .map_err(|e| {
            conflict_or_internal(e, format!("participant {participant_id} already exists"))
        })?;

    Ok((StatusCode::CREATED, Json(participant)))
}

#[derive(Deserialize)]
pub struct JuryScoreRequest {
    pub juror_id: String,
    pub scores: BTreeMap<String, i64>,
    pub comments: Option<String>,
}

/// PUT /api/admin/events/{event_id}/teams/{team_id}/jury-score
///
/// Upsert: a juror re-scoring a team replaces their previous row.
pub async fn upsert_jury_score(
    State(state): State<Arc<AppState>>,
    Path((event_id, team_id)): Path<(String, String)>,
    Json(req): Json<JuryScoreRequest>,
) -> ApiResult<StatusCode> {
    let event = fetch_event(&state, &event_id).await?;
    let rubric = RubricVersion::parse(&event.rubric)
        .ok_or_else(|| ApiError::BadRequest(format!("event has unknown rubric {}", event.rubric)))?;
    if req.juror_id.trim().is_empty() {
        return Err(ApiError::BadRequest("juror_id must not be empty".into()));
    }

    let team_id_owned = team_id.clone();
    let event_id_owned = event_id.clone();
    let team_exists: bool = state
        .db
        .call_named("api.team_in_event", move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM teams WHERE team_id = ?1 AND event_id = ?2",
                [&team_id_owned, &event_id_owned],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(ApiError::ComputationFailed)?;
    if !team_exists {
        return Err(ApiError::NotFound(format!("team {team_id}")));
    }

    engine::jury::upsert_jury_score(
        &state.db,
        &event_id,
        &req.juror_id,
        &team_id,
        rubric,
        req.scores,
        req.comments,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn load_event(conn: &rusqlite::Connection, event_id: &str) -> anyhow::Result<Event> {
    let event = conn
        .query_row(
            "SELECT event_id, name, phase, rubric, team_count, created_at
             FROM events WHERE event_id = ?1",
            [event_id],
            |row| {
                Ok(Event {
                    event_id: row.get(0)?,
                    name: row.get(1)?,
                    phase: row.get(2)?,
                    rubric: row.get(3)?,
                    team_count: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    event.ok_or_else(|| anyhow::anyhow!("event {event_id} vanished mid-request"))
}

/// Lowercase, alphanumerics kept, everything else collapsed to single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Map a unique/primary-key violation to 409; anything else is internal.
fn conflict_or_internal(err: anyhow::Error, conflict_msg: String) -> ApiError {
    let is_constraint = err
        .downcast_ref::<rusqlite::Error>()
        .is_some_and(|e| {
            matches!(
                e,
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                        ..
                    },
                    _,
                )
            )
        });
    if is_constraint {
        ApiError::Conflict(conflict_msg)
    } else {
        ApiError::ComputationFailed(err)
    }
}
