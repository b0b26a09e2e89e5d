use std::collections::BTreeMap;

use thiserror::Error;

/// Everything the validator needs to know about the submitting participant.
/// Always populated from storage at commit time — never from client state.
#[derive(Debug, Clone)]
pub struct BallotContext {
    /// Fixed wallet assigned at registration.
    pub wallet_balance: i64,
    /// The participant's own team, if they belong to one.
    pub own_team: Option<String>,
    /// Exact number of distinct teams a ballot must fund.
    pub required_teams: u32,
    /// Whether any ledger rows already exist for this participant+event.
    pub already_voted: bool,
}

/// Why a proposed allocation cannot be committed. All variants are
/// user-correctable except `AlreadyVoted`, which is terminal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BallotRejection {
    #[error("amount {amount} for team {team_id} must be a non-negative whole number")]
    InvalidAmount { team_id: String, amount: f64 },

    #[error("cannot invest in own team {team_id}")]
    SelfInvestment { team_id: String },

    #[error("ballot funds {actual} teams but must fund exactly {required}")]
    WrongTeamCount { actual: usize, required: u32 },

    #[error("allocated {allocated} exceeds wallet balance {available}")]
    BudgetExceeded { allocated: i64, available: i64 },

    #[error("a ballot already exists for this participant and event")]
    AlreadyVoted,
}

impl BallotRejection {
    /// Stable machine-readable kind, used for API error bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::SelfInvestment { .. } => "self_investment",
            Self::WrongTeamCount { .. } => "wrong_team_count",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::AlreadyVoted => "already_voted",
        }
    }
}

/// Pure, side-effect-free check of a proposed allocation.
///
/// Checks run in a fixed order so the caller always sees the same rejection
/// for the same ballot: amount shape, self-investment, team count, budget,
/// prior ballot. Entries with amount 0 are treated as "not selected" and
/// stripped from the normalized output.
pub fn validate_ballot(
    ctx: &BallotContext,
    allocation: &BTreeMap<String, f64>,
) -> Result<Vec<(String, i64)>, BallotRejection> {
    for (team_id, amount) in allocation {
        if !amount.is_finite() || *amount < 0.0 || amount.fract() != 0.0 {
            return Err(BallotRejection::InvalidAmount {
                team_id: team_id.clone(),
                amount: *amount,
            });
        }
    }

    // BTreeMap keys are distinct, so funded entries are distinct teams.
    let funded: Vec<(String, i64)> = allocation
        .iter()
        .filter(|(_, amount)| **amount > 0.0)
        .map(|(team_id, amount)| (team_id.clone(), *amount as i64))
        .collect();

    if let Some(own) = &ctx.own_team {
        if let Some((team_id, _)) = funded.iter().find(|(team_id, _)| team_id == own) {
            return Err(BallotRejection::SelfInvestment {
                team_id: team_id.clone(),
            });
        }
    }

    if funded.len() != ctx.required_teams as usize {
        return Err(BallotRejection::WrongTeamCount {
            actual: funded.len(),
            required: ctx.required_teams,
        });
    }

    let allocated: i64 = funded.iter().map(|(_, amount)| amount).sum();
    if allocated > ctx.wallet_balance {
        return Err(BallotRejection::BudgetExceeded {
            allocated,
            available: ctx.wallet_balance,
        });
    }

    if ctx.already_voted {
        return Err(BallotRejection::AlreadyVoted);
    }

    Ok(funded)
}
