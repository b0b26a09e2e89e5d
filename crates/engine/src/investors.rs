use std::collections::BTreeMap;

use anyhow::{Context, Result};
use common::db::AsyncDb;
use serde::Serialize;

use crate::leaderboard::{self, LeaderboardEntry, ScoreWeights};

/// How many leaderboard positions count as "winning" for the ranking.
const WINNING_RANKS: usize = 3;

/// One investment into a team that finished in the top 3.
#[derive(Debug, Clone, Serialize)]
pub struct WinningInvestment {
    pub team_id: String,
    pub team_name: String,
    pub rank: u32,
    pub amount: i64,
    pub multiplier: f64,
    pub weighted: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopInvestorEntry {
    pub participant_id: String,
    pub display_name: String,
    pub team_id: Option<String>,
    pub winning_investments: Vec<WinningInvestment>,
    /// Everything the participant invested, winning or not.
    pub total_invested: i64,
    /// Sum of amount x rank multiplier over winning investments only.
    pub roi_score: f64,
}

/// Multiplier for an investment into the team that finished at `rank`
/// (1-based). Ranks beyond the configured list pay nothing.
fn rank_multiplier(multipliers: &[f64], rank: u32) -> f64 {
    multipliers.get(rank as usize - 1).copied().unwrap_or(0.0)
}

struct LedgerRow {
    participant_id: String,
    display_name: String,
    team_affiliation: Option<String>,
    team_id: String,
    amount: i64,
}

/// Pure ranking over a computed leaderboard and the event's ledger rows.
/// Participants whose stake all went to teams outside the top 3 are
/// excluded — this is a top-performers view, not a roster.
fn rank_investors(
    standings: &[LeaderboardEntry],
    rows: &[LedgerRow],
    multipliers: &[f64],
) -> Vec<TopInvestorEntry> {
    let winners: BTreeMap<&str, &LeaderboardEntry> = standings
        .iter()
        .take(WINNING_RANKS)
        .map(|entry| (entry.team_id.as_str(), entry))
        .collect();

    let mut by_participant: BTreeMap<&str, TopInvestorEntry> = BTreeMap::new();
    for row in rows {
        let entry = by_participant
            .entry(row.participant_id.as_str())
            .or_insert_with(|| TopInvestorEntry {
                participant_id: row.participant_id.clone(),
                display_name: row.display_name.clone(),
                team_id: row.team_affiliation.clone(),
                winning_investments: Vec::new(),
                total_invested: 0,
                roi_score: 0.0,
            });
        entry.total_invested += row.amount;

        if let Some(winner) = winners.get(row.team_id.as_str()) {
            let multiplier = rank_multiplier(multipliers, winner.rank);
            let weighted = row.amount as f64 * multiplier;
            entry.roi_score += weighted;
            entry.winning_investments.push(WinningInvestment {
                team_id: winner.team_id.clone(),
                team_name: winner.team_name.clone(),
                rank: winner.rank,
                amount: row.amount,
                multiplier,
                weighted,
            });
        }
    }

    let mut ranked: Vec<TopInvestorEntry> = by_participant
        .into_values()
        .filter(|entry| !entry.winning_investments.is_empty())
        .collect();
    ranked.sort_by(|a, b| {
        b.roi_score
            .total_cmp(&a.roi_score)
            .then_with(|| b.total_invested.cmp(&a.total_invested))
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });
    ranked
}

/// Secondary ranking rewarding participants who backed the eventual top-3
/// teams. Read-only; recomputes the leaderboard it depends on, so it is
/// safe to call arbitrarily often while voting is still moving.
pub async fn top_investors(
    db: &AsyncDb,
    event_id: &str,
    weights: ScoreWeights,
    multipliers: &[f64],
) -> Result<Vec<TopInvestorEntry>> {
    let standings = leaderboard::leaderboard(db, event_id, weights).await?;

    let event_id_owned = event_id.to_string();
    let rows = db
        .call_named("investors.ledger_rows", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT i.participant_id, p.display_name, p.team_id, i.team_id, i.amount
                 FROM investments i
                 JOIN participants p ON p.participant_id = i.participant_id
                 WHERE i.event_id = ?1
                 ORDER BY i.id",
            )?;
            let rows = stmt
                .query_map([&event_id_owned], |row| {
                    Ok(LedgerRow {
                        participant_id: row.get(0)?,
                        display_name: row.get(1)?,
                        team_affiliation: row.get(2)?,
                        team_id: row.get(3)?,
                        amount: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .context("top-investor computation failed")?;

    Ok(rank_investors(&standings, &rows, multipliers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_ballot, insert_jury_row, seed_event, SeedSpec};

    const MULTIPLIERS: [f64; 3] = [3.0, 2.0, 1.0];

    fn standings(teams: &[(&str, u32)]) -> Vec<LeaderboardEntry> {
        teams
            .iter()
            .map(|(team_id, rank)| LeaderboardEntry {
                rank: *rank,
                team_id: team_id.to_string(),
                team_name: team_id.to_uppercase(),
                table_number: None,
                jury_score: None,
                juror_count: 0,
                total_investment: 0,
                final_score: 0.0,
            })
            .collect()
    }

    fn row(participant: &str, team: &str, amount: i64) -> LedgerRow {
        LedgerRow {
            participant_id: participant.to_string(),
            display_name: participant.to_uppercase(),
            team_affiliation: None,
            team_id: team.to_string(),
            amount,
        }
    }

    #[test]
    fn test_rank_multiplier_lookup() {
        assert!((rank_multiplier(&MULTIPLIERS, 1) - 3.0).abs() < 1e-9);
        assert!((rank_multiplier(&MULTIPLIERS, 2) - 2.0).abs() < 1e-9);
        assert!((rank_multiplier(&MULTIPLIERS, 3) - 1.0).abs() < 1e-9);
        assert!((rank_multiplier(&MULTIPLIERS, 4) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights_stake_by_rank() {
        let standings = standings(&[("t-1", 1), ("t-2", 2), ("t-3", 3), ("t-4", 4)]);
        let rows = vec![
            row("p-1", "t-1", 400),
            row("p-1", "t-2", 400),
            row("p-1", "t-3", 200),
        ];
        let ranked = rank_investors(&standings, &rows, &MULTIPLIERS);

        assert_eq!(ranked.len(), 1);
        let entry = &ranked[0];
        // 400*3 + 400*2 + 200*1
        assert!((entry.roi_score - 2200.0).abs() < 1e-9);
        assert_eq!(entry.total_invested, 1000);
        assert_eq!(entry.winning_investments.len(), 3);
    }

    #[test]
    fn test_excludes_participants_with_no_winning_stake() {
        let standings = standings(&[("t-1", 1), ("t-2", 2), ("t-3", 3), ("t-4", 4), ("t-5", 5)]);
        let rows = vec![
            row("p-backs-winners", "t-1", 100),
            row("p-backs-losers", "t-4", 500),
            row("p-backs-losers", "t-5", 500),
        ];
        let ranked = rank_investors(&standings, &rows, &MULTIPLIERS);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].participant_id, "p-backs-winners");
    }

    #[test]
    fn test_losing_stake_counts_toward_total_but_not_roi() {
        let standings = standings(&[("t-1", 1), ("t-2", 2), ("t-3", 3), ("t-4", 4)]);
        let rows = vec![row("p-1", "t-1", 100), row("p-1", "t-4", 900)];
        let ranked = rank_investors(&standings, &rows, &MULTIPLIERS);

        let entry = &ranked[0];
        assert_eq!(entry.total_invested, 1000);
        assert!((entry.roi_score - 300.0).abs() < 1e-9);
        assert_eq!(entry.winning_investments.len(), 1);
    }

    #[test]
    fn test_concentration_beats_spread() {
        let standings = standings(&[("t-1", 1), ("t-2", 2), ("t-3", 3), ("t-4", 4)]);
        // Same spend, different conviction: all-in on the winner pays more.
        let rows = vec![
            row("p-concentrated", "t-1", 600),
            row("p-concentrated", "t-3", 200),
            row("p-concentrated", "t-4", 200),
            row("p-spread", "t-1", 200),
            row("p-spread", "t-2", 200),
            row("p-spread", "t-3", 200),
        ];
        let ranked = rank_investors(&standings, &rows, &MULTIPLIERS);

        assert_eq!(ranked[0].participant_id, "p-concentrated"); // 600*3 + 200*1 = 2000
        assert_eq!(ranked[1].participant_id, "p-spread"); // 200*3 + 200*2 + 200*1 = 1200
    }

    #[test]
    fn test_ties_break_by_total_then_id() {
        let standings = standings(&[("t-1", 1), ("t-2", 2), ("t-3", 3)]);
        let rows = vec![
            row("p-b", "t-1", 100),
            row("p-a", "t-1", 100),
        ];
        let ranked = rank_investors(&standings, &rows, &MULTIPLIERS);
        assert_eq!(ranked[0].participant_id, "p-a");
        assert_eq!(ranked[1].participant_id, "p-b");
    }

    #[tokio::test]
    async fn test_top_investors_end_to_end() {
        let db = seed_event(SeedSpec::default()).await;

        // Jury puts t-1 clearly first; investments decide 2nd/3rd.
        insert_jury_row(
            &db,
            "juror-a",
            "t-1",
            r#"{"innovation":20,"technical_execution":20,"market_potential":20,"presentation":20,"progress":20}"#,
        )
        .await;
        insert_jury_row(
            &db,
            "juror-a",
            "t-2",
            r#"{"innovation":10,"technical_execution":10,"market_potential":10,"presentation":10,"progress":10}"#,
        )
        .await;
        insert_jury_row(
            &db,
            "juror-a",
            "t-3",
            r#"{"innovation":5,"technical_execution":5,"market_potential":5,"presentation":5,"progress":5}"#,
        )
        .await;

        insert_ballot(&db, "ev-1", "p-1", &[("t-1", 600), ("t-2", 300), ("t-3", 100)]).await;
        insert_ballot(&db, "ev-1", "p-3", &[("t-4", 900), ("t-2", 50), ("t-3", 50)]).await;

        let ranked = top_investors(&db, "ev-1", ScoreWeights::default(), &MULTIPLIERS)
            .await
            .unwrap();

        // Totals: t-1 600, t-2 350, t-3 150, t-4 900 (event max).
        // Final: t-1 = 70 + 20 = 90, t-2 = 35 + 11.7 = 46.7,
        // t-4 = 0 + 30 = 30, t-3 = 17.5 + 5 = 22.5. Top 3: t-1, t-2, t-4.
        assert_eq!(ranked.len(), 2);
        let p1 = ranked.iter().find(|e| e.participant_id == "p-1").unwrap();
        // p-1: 600*3 into rank-1 + 300*2 into rank-2 = 2400; t-3 pays nothing.
        assert!((p1.roi_score - 2400.0).abs() < 1e-9);
        assert_eq!(p1.total_invested, 1000);

        let p3 = ranked.iter().find(|e| e.participant_id == "p-3").unwrap();
        // p-3: 900*1 into rank-3 (t-4) + 50*2 into rank-2 = 1000.
        assert!((p3.roi_score - 1000.0).abs() < 1e-9);

        assert_eq!(ranked[0].participant_id, "p-1");
    }

    #[tokio::test]
    async fn test_recomputation_is_stable() {
        let db = seed_event(SeedSpec::default()).await;
        insert_ballot(&db, "ev-1", "p-1", &[("t-1", 500), ("t-2", 300), ("t-3", 200)]).await;

        let first = top_investors(&db, "ev-1", ScoreWeights::default(), &MULTIPLIERS)
            .await
            .unwrap();
        let second = top_investors(&db, "ev-1", ScoreWeights::default(), &MULTIPLIERS)
            .await
            .unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.participant_id, b.participant_id);
            assert!((a.roi_score - b.roi_score).abs() < 1e-12);
        }
    }
}
