pub mod admin;
pub mod ballots;
pub mod standings;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rusqlite::OptionalExtension;
use serde::Serialize;
use std::sync::Arc;

use common::config::{Scoring, Voting};
use common::db::AsyncDb;
use common::types::Event;

use crate::error::{ApiError, ApiResult};

/// Shared application state available to all handlers.
pub struct AppState {
    pub db: AsyncDb,
    pub voting: Voting,
    pub scoring: Scoring,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub api_key: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    // Read and vote routes are open; participants authenticate upstream.
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/events/{event_id}", get(admin::get_event))
        .route("/api/events/{event_id}/teams", get(admin::list_teams))
        .route("/api/events/{event_id}/ballots", post(ballots::submit_ballot))
        .route(
            "/api/events/{event_id}/participants/{participant_id}/ballot",
            get(ballots::ballot_status),
        )
        .route(
            "/api/events/{event_id}/leaderboard",
            get(standings::get_leaderboard),
        )
        .route(
            "/api/events/{event_id}/investors/top",
            get(standings::get_top_investors),
        );

    // Organizer routes require the bearer token (when one is configured).
    let protected = Router::new()
        .route("/api/admin/events", post(admin::create_event))
        .route("/api/admin/events/{event_id}/phase", put(admin::set_phase))
        .route("/api/admin/events/{event_id}/teams", post(admin::create_team))
        .route(
            "/api/admin/events/{event_id}/participants",
            post(admin::register_participant),
        )
        .route(
            "/api/admin/events/{event_id}/teams/{team_id}/jury-score",
            put(admin::upsert_jury_score),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bearer token auth middleware. Skipped when no api_key is configured.
async fn auth_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(api_key) = &state.api_key else {
        return next.run(req).await; // No key configured = dev mode
    };

    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header) if header.starts_with("Bearer ") => {
            let token = &header[7..];
            if constant_time_eq(token.as_bytes(), api_key.as_bytes()) {
                next.run(req).await
            } else {
                ApiError::Unauthorized.into_response()
            }
        }
        _ => ApiError::Unauthorized.into_response(),
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime,
    })
}

/// Load an event row or produce the 404 every handler wants.
pub(crate) async fn fetch_event(state: &AppState, event_id: &str) -> ApiResult<Event> {
    let event_id_owned = event_id.to_string();
    let event = state
        .db
        .call_named("api.fetch_event", move |conn| {
            let row = conn
                .query_row(
                    "SELECT event_id, name, phase, rubric, team_count, created_at
                     FROM events WHERE event_id = ?1",
                    [&event_id_owned],
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
            Ok(row)
        })
        .await
        .map_err(ApiError::ComputationFailed)?;

    event.ok_or_else(|| ApiError::NotFound(format!("event {event_id}")))
}
