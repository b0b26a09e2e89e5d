use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use common::types::{EventPhase, Investment};
use engine::submit::BallotReceipt;

use crate::api::{fetch_event, AppState};
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct SubmitBallotRequest {
    pub participant_id: String,
    /// team id -> amount. Amounts arrive as JSON numbers; fractional or
    /// negative values are rejected server-side, never rounded.
    pub allocation: BTreeMap<String, f64>,
}

/// POST /api/events/{event_id}/ballots
///
/// Phase gating lives here, not in the engine: the voting core only cares
/// about ledger consistency, the product decides when voting is open.
/// Everything else is re-validated inside the transactional submitter
/// against fresh storage state — client-side checks are a convenience,
/// never the authority.
pub async fn submit_ballot(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<SubmitBallotRequest>,
) -> ApiResult<(StatusCode, Json<BallotReceipt>)> {
    let event = fetch_event(&state, &event_id).await?;
    if EventPhase::parse(&event.phase) != Some(EventPhase::Voting) {
        return Err(ApiError::VotingClosed { phase: event.phase });
    }

    let receipt =
        engine::submit_portfolio(&state.db, &event_id, &req.participant_id, req.allocation)
            .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Serialize)]
pub struct BallotStatusResponse {
    pub participant_id: String,
    pub has_voted: bool,
    pub wallet_balance: i64,
    pub invested: i64,
    pub remaining: i64,
    pub investments: Vec<Investment>,
}

/// GET /api/events/{event_id}/participants/{participant_id}/ballot
///
/// The client that timed out mid-submission calls this to learn whether its
/// ballot actually landed: `has_voted` is the contract, not the fate of any
/// single request.
pub async fn ballot_status(
    State(state): State<Arc<AppState>>,
    Path((event_id, participant_id)): Path<(String, String)>,
) -> ApiResult<Json<BallotStatusResponse>> {
    fetch_event(&state, &event_id).await?;

    let event_id_owned = event_id.clone();
    let participant_id_owned = participant_id.clone();
    let wallet_balance: Option<i64> = state
        .db
        .call_named("api.participant_wallet", move |conn| {
            let balance = conn
                .query_row(
                    "SELECT wallet_balance FROM participants
                     WHERE participant_id = ?1 AND event_id = ?2",
                    [&participant_id_owned, &event_id_owned],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(balance)
        })
        .await
        .map_err(ApiError::ComputationFailed)?;
    let wallet_balance = wallet_balance
        .ok_or_else(|| ApiError::NotFound(format!("participant {participant_id}")))?;

    let investments = engine::ledger::participant_investments(&state.db, &event_id, &participant_id)
        .await
        .map_err(ApiError::ComputationFailed)?;
    let invested: i64 = investments.iter().map(|row| row.amount).sum();

    Ok(Json(BallotStatusResponse {
        participant_id,
        has_voted: !investments.is_empty(),
        wallet_balance,
        invested,
        remaining: wallet_balance - invested,
        investments,
    }))
}
