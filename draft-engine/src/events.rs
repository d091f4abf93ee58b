// Event log types and derived-state folding.
//
// Every mutation of a running draft is an appended event; the in-memory
// draft state (picks, drafted set, rosters, redo stack) is a pure fold
// over the event sequence. Replaying the log from seq 1 after a restart
// reproduces the exact state, so nothing derived is ever persisted as
// authoritative.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::{Position, Roster};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A completed draft selection, as recorded in the log and in the picks
/// projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    /// 1-based overall pick number.
    pub pick_number: u32,
    pub round: u32,
    pub pick_in_round: u32,
    /// 1-based index of the team that made the pick.
    pub team_index: u32,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    /// Real-world team abbreviation.
    pub player_team: String,
    /// True when this pick was settled from a keeper assignment.
    pub keeper: bool,
    pub at: DateTime<Utc>,
}

/// The payload of one log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    PickMade { pick: DraftPick },
    /// Compensating event: the pick at `pick_number` is reversed. The
    /// original PICK_MADE entry stays in the log untouched.
    PickUndone { pick_number: u32, player_id: String },
    SessionPaused,
    SessionResumed,
    SettingsChanged { timer_seconds: u32 },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::PickMade { .. } => "pick_made",
            EventPayload::PickUndone { .. } => "pick_undone",
            EventPayload::SessionPaused => "session_paused",
            EventPayload::SessionResumed => "session_resumed",
            EventPayload::SettingsChanged { .. } => "settings_changed",
        }
    }
}

/// One entry in a session's append-only log. `seq` is gapless and starts
/// at 1 within each session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEvent {
    pub seq: u64,
    pub payload: EventPayload,
    /// Who triggered the event.
    pub user_id: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// Everything the engine derives by folding a session's event log.
#[derive(Debug, Clone)]
pub struct DerivedState {
    /// Standing picks in pick-number order. Undone picks are removed.
    pub picks: Vec<DraftPick>,
    /// Player ids currently on a roster.
    pub drafted: HashSet<String>,
    /// One roster per team, indexed by `team_index - 1`.
    pub rosters: Vec<Roster>,
    /// Picks reversed by consecutive undos, available for redo. Making any
    /// other pick clears it.
    pub redo_stack: Vec<DraftPick>,
}

impl DerivedState {
    pub fn new(team_count: u32, roster_config: &HashMap<String, usize>) -> Self {
        DerivedState {
            picks: Vec::new(),
            drafted: HashSet::new(),
            rosters: (0..team_count).map(|_| Roster::new(roster_config)).collect(),
            redo_stack: Vec::new(),
        }
    }

    /// Fold one event payload into the state.
    pub fn apply(&mut self, payload: &EventPayload) {
        match payload {
            EventPayload::PickMade { pick } => self.apply_pick(pick),
            EventPayload::PickUndone {
                pick_number,
                player_id,
            } => self.apply_undo(*pick_number, player_id),
            EventPayload::SessionPaused
            | EventPayload::SessionResumed
            | EventPayload::SettingsChanged { .. } => {}
        }
    }

    fn apply_pick(&mut self, pick: &DraftPick) {
        // A redone pick pops the matching redo entry; any other pick
        // invalidates the whole redo stack.
        match self.redo_stack.last() {
            Some(top)
                if top.pick_number == pick.pick_number && top.player_id == pick.player_id =>
            {
                self.redo_stack.pop();
            }
            Some(_) => self.redo_stack.clear(),
            None => {}
        }

        self.drafted.insert(pick.player_id.clone());
        self.picks.push(pick.clone());

        match self.rosters.get_mut(pick.team_index as usize - 1) {
            Some(roster) => {
                if !roster.add_player(&pick.player_id, &pick.player_name, pick.position) {
                    warn!(
                        "No roster room on team {} for {} ({}); pick {} recorded without a slot",
                        pick.team_index, pick.player_name, pick.position, pick.pick_number
                    );
                }
            }
            None => warn!(
                "Pick {} references unknown team index {}",
                pick.pick_number, pick.team_index
            ),
        }
    }

    fn apply_undo(&mut self, pick_number: u32, player_id: &str) {
        let Some(idx) = self
            .picks
            .iter()
            .rposition(|p| p.pick_number == pick_number && p.player_id == player_id)
        else {
            warn!(
                "PICK_UNDONE for pick {} player {} matches no standing pick",
                pick_number, player_id
            );
            return;
        };
        let pick = self.picks.remove(idx);
        self.drafted.remove(&pick.player_id);
        if let Some(roster) = self.rosters.get_mut(pick.team_index as usize - 1) {
            roster.remove_player(&pick.player_id);
        }
        self.redo_stack.push(pick);
    }

    /// Rebuild state from a full event log.
    pub fn replay(
        team_count: u32,
        roster_config: &HashMap<String, usize>,
        events: &[DraftEvent],
    ) -> Self {
        let mut state = Self::new(team_count, roster_config);
        for event in events {
            state.apply(&event.payload);
        }
        state
    }

    /// The most recent standing pick, if any.
    pub fn last_pick(&self) -> Option<&DraftPick> {
        self.picks.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_config() -> HashMap<String, usize> {
        let mut m = HashMap::new();
        m.insert("QB".into(), 1);
        m.insert("RB".into(), 2);
        m.insert("WR".into(), 2);
        m.insert("FLEX".into(), 1);
        m.insert("BE".into(), 2);
        m
    }

    fn pick(number: u32, team: u32, id: &str, pos: Position) -> DraftPick {
        DraftPick {
            pick_number: number,
            round: (number - 1) / 2 + 1,
            pick_in_round: (number - 1) % 2 + 1,
            team_index: team,
            player_id: id.to_string(),
            player_name: format!("Player {id}"),
            position: pos,
            player_team: "FA".to_string(),
            keeper: false,
            at: Utc::now(),
        }
    }

    #[test]
    fn pick_made_updates_all_projections() {
        let mut state = DerivedState::new(2, &roster_config());
        state.apply(&EventPayload::PickMade {
            pick: pick(1, 1, "p1", Position::RunningBack),
        });

        assert_eq!(state.picks.len(), 1);
        assert!(state.drafted.contains("p1"));
        assert!(state.rosters[0].has_player("p1"));
        assert!(!state.rosters[1].has_player("p1"));
    }

    #[test]
    fn undo_reverses_pick_and_feeds_redo_stack() {
        let mut state = DerivedState::new(2, &roster_config());
        state.apply(&EventPayload::PickMade {
            pick: pick(1, 1, "p1", Position::RunningBack),
        });
        state.apply(&EventPayload::PickUndone {
            pick_number: 1,
            player_id: "p1".into(),
        });

        assert!(state.picks.is_empty());
        assert!(!state.drafted.contains("p1"));
        assert!(!state.rosters[0].has_player("p1"));
        assert_eq!(state.redo_stack.len(), 1);
        assert_eq!(state.redo_stack[0].player_id, "p1");
    }

    #[test]
    fn redoing_the_same_pick_pops_redo_stack() {
        let mut state = DerivedState::new(2, &roster_config());
        let p = pick(1, 1, "p1", Position::RunningBack);
        state.apply(&EventPayload::PickMade { pick: p.clone() });
        state.apply(&EventPayload::PickUndone {
            pick_number: 1,
            player_id: "p1".into(),
        });
        state.apply(&EventPayload::PickMade { pick: p });

        assert!(state.redo_stack.is_empty());
        assert!(state.drafted.contains("p1"));
    }

    #[test]
    fn different_pick_clears_redo_stack() {
        let mut state = DerivedState::new(2, &roster_config());
        state.apply(&EventPayload::PickMade {
            pick: pick(1, 1, "p1", Position::RunningBack),
        });
        state.apply(&EventPayload::PickUndone {
            pick_number: 1,
            player_id: "p1".into(),
        });
        state.apply(&EventPayload::PickMade {
            pick: pick(1, 1, "p2", Position::WideReceiver),
        });

        assert!(state.redo_stack.is_empty());
        assert!(state.drafted.contains("p2"));
        assert!(!state.drafted.contains("p1"));
    }

    #[test]
    fn consecutive_undos_stack_in_order() {
        let mut state = DerivedState::new(2, &roster_config());
        state.apply(&EventPayload::PickMade {
            pick: pick(1, 1, "p1", Position::RunningBack),
        });
        state.apply(&EventPayload::PickMade {
            pick: pick(2, 2, "p2", Position::WideReceiver),
        });
        state.apply(&EventPayload::PickUndone {
            pick_number: 2,
            player_id: "p2".into(),
        });
        state.apply(&EventPayload::PickUndone {
            pick_number: 1,
            player_id: "p1".into(),
        });

        // Redo order is most-recently-undone first
        assert_eq!(state.redo_stack.len(), 2);
        assert_eq!(state.redo_stack.last().unwrap().player_id, "p1");
    }

    #[test]
    fn replay_matches_incremental_fold() {
        let payloads = vec![
            EventPayload::PickMade {
                pick: pick(1, 1, "p1", Position::RunningBack),
            },
            EventPayload::PickMade {
                pick: pick(2, 2, "p2", Position::WideReceiver),
            },
            EventPayload::PickUndone {
                pick_number: 2,
                player_id: "p2".into(),
            },
            EventPayload::SessionPaused,
            EventPayload::SessionResumed,
            EventPayload::PickMade {
                pick: pick(2, 2, "p3", Position::Quarterback),
            },
        ];

        let mut incremental = DerivedState::new(2, &roster_config());
        for p in &payloads {
            incremental.apply(p);
        }

        let events: Vec<DraftEvent> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| DraftEvent {
                seq: i as u64 + 1,
                payload,
                user_id: "user_1".into(),
                at: Utc::now(),
            })
            .collect();
        let replayed = DerivedState::replay(2, &roster_config(), &events);

        assert_eq!(replayed.picks, incremental.picks);
        assert_eq!(replayed.drafted, incremental.drafted);
        assert_eq!(replayed.redo_stack, incremental.redo_stack);
    }

    #[test]
    fn unmatched_undo_is_ignored() {
        let mut state = DerivedState::new(2, &roster_config());
        state.apply(&EventPayload::PickUndone {
            pick_number: 5,
            player_id: "ghost".into(),
        });
        assert!(state.picks.is_empty());
        assert!(state.redo_stack.is_empty());
    }

    #[test]
    fn payload_serde_uses_kind_tag() {
        let payload = EventPayload::PickUndone {
            pick_number: 3,
            player_id: "p9".into(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"pick_undone\""));
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), "pick_undone");
    }
}
