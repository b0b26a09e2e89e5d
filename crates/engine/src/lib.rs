//! The voting/scoring core: wallet ledger, ballot validation, transactional
//! portfolio submission, jury aggregation, and the derived leaderboard and
//! top-investor rankings.
//!
//! Everything here is recomputed from the ledger and rubric tables on
//! demand; no aggregate is ever stored.

pub mod ballot;
pub mod investors;
pub mod jury;
pub mod leaderboard;
pub mod ledger;
pub mod submit;

#[cfg(test)]
pub(crate) mod test_support;

pub use ballot::{validate_ballot, BallotContext, BallotRejection};
pub use investors::{top_investors, TopInvestorEntry, WinningInvestment};
pub use jury::RubricVersion;
pub use leaderboard::{leaderboard, LeaderboardEntry, ScoreWeights};
pub use submit::{submit_portfolio, BallotReceipt, SubmitError};
