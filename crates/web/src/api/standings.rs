use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use engine::investors::TopInvestorEntry;
use engine::leaderboard::{LeaderboardEntry, ScoreWeights};

use crate::api::{fetch_event, AppState};
use crate::error::{ApiError, ApiResult};

fn weights(state: &AppState) -> ScoreWeights {
    ScoreWeights {
        jury_weight: state.scoring.jury_weight,
        investment_weight: state.scoring.investment_weight,
    }
}

/// GET /api/events/{event_id}/leaderboard
///
/// Always a fresh computation over the ledger and rubric tables; there is
/// no cache to invalidate and nothing to go stale.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    fetch_event(&state, &event_id).await?;

    let entries = engine::leaderboard(&state.db, &event_id, weights(&state))
        .await
        .map_err(ApiError::ComputationFailed)?;
    Ok(Json(entries))
}

/// GET /api/events/{event_id}/investors/top
pub async fn get_top_investors(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<TopInvestorEntry>>> {
    fetch_event(&state, &event_id).await?;

    let entries = engine::top_investors(
        &state.db,
        &event_id,
        weights(&state),
        &state.scoring.rank_multipliers,
    )
    .await
    .map_err(ApiError::ComputationFailed)?;
    Ok(Json(entries))
}
