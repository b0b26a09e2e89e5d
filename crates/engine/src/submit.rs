use std::collections::BTreeMap;

use anyhow::{Context, Result};
use common::db::AsyncDb;
use rusqlite::{OptionalExtension, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ballot::{validate_ballot, BallotContext, BallotRejection};
use crate::ledger;

/// Outcome of an accepted submission.
#[derive(Debug, Clone, Serialize)]
pub struct BallotReceipt {
    pub event_id: String,
    pub participant_id: String,
    pub teams_funded: usize,
    pub total_invested: i64,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The ballot itself is not acceptable. Nothing was written.
    #[error(transparent)]
    Rejected(#[from] BallotRejection),

    /// The atomic commit failed (storage unavailable, constraint violation).
    /// Nothing was written; safe to retry as-is.
    #[error("ballot submission failed: {0}")]
    Failed(#[source] anyhow::Error),
}

/// The sole write path into the investment ledger.
///
/// Runs the entire submission as one unit on the DB thread: fetch the
/// participant's ground truth, re-validate the full allocation against it,
/// then insert all ledger rows inside a single IMMEDIATE transaction.
/// Either every row of the ballot lands or none do, so a concurrent
/// leaderboard read can never observe a partial ballot, and a duplicate
/// submission racing this one resolves to `AlreadyVoted` rather than a
/// second ballot.
pub async fn submit_portfolio(
    db: &AsyncDb,
    event_id: &str,
    participant_id: &str,
    allocation: BTreeMap<String, f64>,
) -> Result<BallotReceipt, SubmitError> {
    let event_id_owned = event_id.to_string();
    let participant_id_owned = participant_id.to_string();

    let outcome = db
        .call_named("submit.portfolio", move |conn| {
            commit_sync(conn, &event_id_owned, &participant_id_owned, &allocation)
        })
        .await;

    match outcome {
        Ok(Ok(receipt)) => {
            info!(
                event_id,
                participant_id,
                teams = receipt.teams_funded,
                total = receipt.total_invested,
                "ballot accepted"
            );
            metrics::counter!("ideafund_ballots_accepted_total").increment(1);
            Ok(receipt)
        }
        Ok(Err(rejection)) => {
            // Expected, user-correctable outcomes — not system errors.
            debug!(event_id, participant_id, reason = rejection.kind(), "ballot rejected");
            metrics::counter!(
                "ideafund_ballots_rejected_total",
                "reason" => rejection.kind()
            )
            .increment(1);
            Err(SubmitError::Rejected(rejection))
        }
        Err(err) => {
            warn!(event_id, participant_id, error = %err, "ballot submission failed");
            metrics::counter!("ideafund_ballot_failures_total").increment(1);
            Err(SubmitError::Failed(err))
        }
    }
}

/// Inner Result distinguishes a rejected ballot (no storage problem) from a
/// failed commit; both leave zero rows behind.
fn commit_sync(
    conn: &mut rusqlite::Connection,
    event_id: &str,
    participant_id: &str,
    allocation: &BTreeMap<String, f64>,
) -> Result<std::result::Result<BallotReceipt, BallotRejection>> {
    let required_teams: u32 = conn
        .query_row(
            "SELECT team_count FROM events WHERE event_id = ?1",
            [event_id],
            |row| row.get(0),
        )
        .optional()?
        .with_context(|| format!("event {event_id} not found"))?;

    let (wallet_balance, own_team): (i64, Option<String>) = conn
        .query_row(
            "SELECT wallet_balance, team_id FROM participants
             WHERE participant_id = ?1 AND event_id = ?2",
            [participant_id, event_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .with_context(|| format!("participant {participant_id} not registered for {event_id}"))?;

    // IMMEDIATE takes the write lock up front, so the voted re-check and the
    // inserts observe the same ledger state. Dropping the transaction on any
    // early return rolls everything back.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // A prior ballot short-circuits everything else: the answer to any
    // resubmission is "your ballot already exists", whatever its shape.
    if ledger::voted_sync(&tx, event_id, participant_id)? {
        return Ok(Err(BallotRejection::AlreadyVoted));
    }

    let ctx = BallotContext {
        wallet_balance,
        own_team,
        required_teams,
        already_voted: false,
    };
    let entries = match validate_ballot(&ctx, allocation) {
        Ok(entries) => entries,
        Err(rejection) => return Ok(Err(rejection)),
    };

    ledger::insert_investments_sync(&tx, event_id, participant_id, &entries)?;
    tx.commit()?;

    let total_invested = entries.iter().map(|(_, amount)| amount).sum();
    Ok(Ok(BallotReceipt {
        event_id: event_id.to_string(),
        participant_id: participant_id.to_string(),
        teams_funded: entries.len(),
        total_invested,
    }))
}
