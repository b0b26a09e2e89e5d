use serde::Serialize;

/// Lifecycle of a hackathon/ideathon event. Submissions are only accepted
/// while the event sits in `Voting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Registration,
    TeamBuilding,
    Hacking,
    Voting,
    Judging,
    Results,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::TeamBuilding => "team_building",
            Self::Hacking => "hacking",
            Self::Voting => "voting",
            Self::Judging => "judging",
            Self::Results => "results",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(Self::Registration),
            "team_building" => Some(Self::TeamBuilding),
            "hacking" => Some(Self::Hacking),
            "voting" => Some(Self::Voting),
            "judging" => Some(Self::Judging),
            "results" => Some(Self::Results),
            _ => None,
        }
    }
}

/// Event row as stored. `rubric` names the criteria set jurors score
/// against; it is interpreted by the engine crate.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_id: String,
    pub name: String,
    pub phase: String,
    pub rubric: String,
    pub team_count: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Team {
    pub team_id: String,
    pub event_id: String,
    pub name: String,
    pub table_number: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub participant_id: String,
    pub event_id: String,
    pub team_id: Option<String>,
    pub display_name: String,
    pub wallet_balance: i64,
    pub created_at: String,
}

/// One ledger row: `participant_id` invested `amount` into `team_id`.
/// Rows are append-only; corrections are new rows, never edits.
#[derive(Debug, Clone, Serialize)]
pub struct Investment {
    pub id: i64,
    pub event_id: String,
    pub participant_id: String,
    pub team_id: String,
    pub amount: i64,
    pub created_at: String,
}

/// One juror's latest rubric evaluation of one team. `scores_json` maps
/// criterion key -> integer score on the rubric's scale.
#[derive(Debug, Clone, Serialize)]
pub struct JuryScore {
    pub id: i64,
    pub event_id: String,
    pub juror_id: String,
    pub team_id: String,
    pub scores_json: String,
    pub comments: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
