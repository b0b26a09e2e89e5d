use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::ballot::BallotRejection;
use engine::jury::{RubricError, UpsertError};
use engine::submit::SubmitError;
use serde_json::json;
use std::fmt;

/// Web layer errors. Every variant maps to a distinct machine-readable
/// `error` kind in the JSON body so clients can react to rejections without
/// parsing prose.
#[derive(Debug)]
pub enum ApiError {
    /// A ballot failed validation or was already submitted.
    Ballot(BallotRejection),
    /// The atomic commit failed; nothing was written, safe to retry.
    SubmissionFailed(anyhow::Error),
    /// The event exists but is not in its voting phase.
    VotingClosed { phase: String },
    /// A jury submission failed rubric validation.
    Rubric(RubricError),
    /// Leaderboard / top-investor computation could not complete.
    ComputationFailed(anyhow::Error),
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Unauthorized,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Ballot(rejection) => rejection.kind(),
            Self::SubmissionFailed(_) => "submission_failed",
            Self::VotingClosed { .. } => "voting_closed",
            Self::Rubric(_) => "invalid_rubric_scores",
            Self::ComputationFailed(_) => "computation_failed",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            // AlreadyVoted is terminal, not correctable: conflict.
            Self::Ballot(BallotRejection::AlreadyVoted) => StatusCode::CONFLICT,
            Self::Ballot(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SubmissionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::VotingClosed { .. } => StatusCode::CONFLICT,
            Self::Rubric(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ComputationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ballot(rejection) => write!(f, "{rejection}"),
            Self::SubmissionFailed(e) => write!(f, "ballot submission failed: {e}"),
            Self::VotingClosed { phase } => {
                write!(f, "voting is not open (event phase is {phase})")
            }
            Self::Rubric(e) => write!(f, "{e}"),
            Self::ComputationFailed(_) => write!(f, "computation failed"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Conflict(msg) => write!(f, "{msg}"),
            Self::BadRequest(msg) => write!(f, "{msg}"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        // Structured details the ballot form needs to correct itself.
        match &self {
            ApiError::Ballot(BallotRejection::WrongTeamCount { actual, required }) => {
                body["actual"] = json!(actual);
                body["required"] = json!(required);
            }
            ApiError::Ballot(BallotRejection::BudgetExceeded {
                allocated,
                available,
            }) => {
                body["allocated"] = json!(allocated);
                body["available"] = json!(available);
            }
            ApiError::ComputationFailed(e) => {
                // Operational problem: log the cause, return nothing internal.
                tracing::error!(error = %e, "computation failed");
            }
            ApiError::SubmissionFailed(e) => {
                tracing::warn!(error = %e, "submission failed");
                body["retryable"] = json!(true);
            }
            _ => {}
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::Rejected(rejection) => Self::Ballot(rejection),
            SubmitError::Failed(cause) => Self::SubmissionFailed(cause),
        }
    }
}

impl From<UpsertError> for ApiError {
    fn from(error: UpsertError) -> Self {
        match error {
            UpsertError::Rubric(e) => Self::Rubric(e),
            UpsertError::Storage(cause) => Self::SubmissionFailed(cause),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
