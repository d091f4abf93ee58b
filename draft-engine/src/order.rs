// Pick order calculation: which team is on the clock for a given pick.
//
// Pure functions with no state; both the pick validator and the
// recommendation engine call through here to determine whose turn it is.

use serde::{Deserialize, Serialize};

/// The ordering discipline for a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftType {
    /// Order reverses every round (1..T, then T..1, ...).
    Snake,
    /// Same order every round.
    Linear,
    /// No forced turn; the calculator reports a nominating team using the
    /// linear round-robin convention.
    Auction,
}

impl DraftType {
    pub fn from_str_type(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "snake" => Some(DraftType::Snake),
            "linear" => Some(DraftType::Linear),
            "auction" => Some(DraftType::Auction),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DraftType::Snake => "snake",
            DraftType::Linear => "linear",
            DraftType::Auction => "auction",
        }
    }

    /// Whether picks must come from the on-the-clock team. Auction drafts
    /// only use the order for nominations, never to reject a winning bid.
    pub fn enforces_turn(&self) -> bool {
        !matches!(self, DraftType::Auction)
    }
}

/// Round and pick-within-round for an overall pick number (all 1-based).
pub fn round_info(pick_number: u32, team_count: u32) -> (u32, u32) {
    let round = (pick_number + team_count - 1) / team_count;
    let pick_in_round = (pick_number - 1) % team_count + 1;
    (round, pick_in_round)
}

/// The 1-based team index on the clock for `pick_number`.
pub fn team_for_pick(pick_number: u32, team_count: u32, draft_type: DraftType) -> u32 {
    let (round, pick_in_round) = round_info(pick_number, team_count);
    match draft_type {
        DraftType::Linear | DraftType::Auction => pick_in_round,
        DraftType::Snake => {
            if round % 2 == 1 {
                pick_in_round
            } else {
                team_count - pick_in_round + 1
            }
        }
    }
}
