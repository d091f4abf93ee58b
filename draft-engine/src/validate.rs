// Pick validation: the single gate every pick passes through.
//
// Checks run in a fixed order so the caller always sees the most specific
// rejection first. Validation never mutates anything; on success it hands
// back the fully-built DraftPick for the engine to append.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::catalog::PlayerCatalog;
use crate::error::DraftError;
use crate::events::{DerivedState, DraftPick};
use crate::order::{round_info, team_for_pick};
use crate::session::{DraftSession, SessionStatus};

/// Validate a proposed pick against the current session state.
///
/// Check order: session active, pick number current, correct team on the
/// clock, player available, player known, roster room. `bypass_turn` skips
/// the turn check for engine-initiated picks (auto-draft); auction drafts
/// never enforce turn order.
pub fn validate_pick(
    session: &DraftSession,
    derived: &DerivedState,
    catalog: &PlayerCatalog,
    player_id: &str,
    team_index: u32,
    pick_number: u32,
    bypass_turn: bool,
    now: DateTime<Utc>,
) -> Result<DraftPick, DraftError> {
    if session.status != SessionStatus::Active {
        return Err(DraftError::SessionNotActive(session.status));
    }
    if pick_number != session.current_pick {
        return Err(DraftError::PickNumberMismatch {
            expected: session.current_pick,
            got: pick_number,
        });
    }

    let expected_team = team_for_pick(pick_number, session.team_count, session.draft_type);
    // Range check first: auction drafts accept picks from any team, so the
    // turn check below cannot be relied on to reject a bogus index.
    if !(1..=session.team_count).contains(&team_index) {
        return Err(DraftError::OutOfTurn {
            pick_number,
            expected_team,
            got_team: team_index,
        });
    }
    if session.draft_type.enforces_turn() && !bypass_turn && team_index != expected_team {
        return Err(DraftError::OutOfTurn {
            pick_number,
            expected_team,
            got_team: team_index,
        });
    }

    if derived.drafted.contains(player_id) {
        return Err(DraftError::PlayerAlreadyDrafted(player_id.to_string()));
    }
    // Keeper assignments reserve their player for the owning slot.
    if session
        .keepers
        .iter()
        .any(|k| k.player_id == player_id && k.pick_number != pick_number)
    {
        return Err(DraftError::PlayerAlreadyDrafted(player_id.to_string()));
    }

    let Some(player) = catalog.get(player_id) else {
        error!(
            "Pick for session {} references unknown player id {}",
            session.session_id, player_id
        );
        return Err(DraftError::PlayerNotFound(player_id.to_string()));
    };

    let roster = derived
        .rosters
        .get(team_index as usize - 1)
        .ok_or(DraftError::OutOfTurn {
            pick_number,
            expected_team,
            got_team: team_index,
        })?;
    if !roster.has_room(player.position) {
        return Err(DraftError::RosterSlotFull {
            team_index,
            position: player.position,
        });
    }

    let (round, pick_in_round) = round_info(pick_number, session.team_count);
    Ok(DraftPick {
        pick_number,
        round,
        pick_in_round,
        team_index,
        player_id: player.player_id.clone(),
        player_name: player.name.clone(),
        position: player.position,
        player_team: player.team.clone(),
        keeper: session
            .keeper_at(pick_number)
            .map_or(false, |k| k.player_id == player_id),
        at: now,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::catalog::CatalogPlayer;
    use crate::order::DraftType;
    use crate::roster::Position;
    use crate::session::{KeeperPick, SessionConfig};

    fn roster_config() -> HashMap<String, usize> {
        let mut m = HashMap::new();
        m.insert("QB".into(), 1);
        m.insert("RB".into(), 1);
        m.insert("WR".into(), 1);
        m.insert("BE".into(), 1);
        m
    }

    fn catalog() -> PlayerCatalog {
        let mk = |id: &str, pos, adp| CatalogPlayer {
            player_id: id.to_string(),
            name: format!("Player {id}"),
            position: pos,
            team: "FA".to_string(),
            adp,
            adp_rank: 0,
            projected_points: 100.0,
        };
        PlayerCatalog::from_players(vec![
            mk("rb1", Position::RunningBack, 1.0),
            mk("rb2", Position::RunningBack, 2.0),
            mk("wr1", Position::WideReceiver, 3.0),
            mk("qb1", Position::Quarterback, 4.0),
        ])
    }

    fn session(draft_type: DraftType) -> DraftSession {
        let config = SessionConfig {
            user_id: "user_1".into(),
            league_id: None,
            draft_type,
            team_count: 2,
            round_count: 4,
            user_draft_position: 1,
            roster_config: roster_config(),
            scoring_format: "ppr".into(),
            timer_seconds: 0,
            keepers: vec![],
        };
        let mut s = DraftSession::new("s1".into(), config, Utc::now());
        s.start(Utc::now()).unwrap();
        s
    }

    fn derived(session: &DraftSession) -> DerivedState {
        DerivedState::new(session.team_count, &session.roster_config)
    }

    #[test]
    fn accepts_a_legal_pick() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        let pick =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 1, false, Utc::now()).unwrap();
        assert_eq!(pick.pick_number, 1);
        assert_eq!(pick.round, 1);
        assert_eq!(pick.team_index, 1);
        assert_eq!(pick.position, Position::RunningBack);
        assert!(!pick.keeper);
    }

    #[test]
    fn rejects_when_not_active() {
        let mut s = session(DraftType::Snake);
        s.pause().unwrap();
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::SessionNotActive(_)));
    }

    #[test]
    fn rejects_stale_pick_number() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 2, false, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DraftError::PickNumberMismatch { expected: 1, got: 2 }
        ));
    }

    #[test]
    fn rejects_out_of_turn_team() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 2, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DraftError::OutOfTurn { expected_team: 1, got_team: 2, .. }
        ));
    }

    #[test]
    fn bypass_turn_skips_the_turn_check() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        assert!(validate_pick(&s, &d, &catalog(), "rb1", 2, 1, true, Utc::now()).is_ok());
    }

    #[test]
    fn auction_never_enforces_turn() {
        let s = session(DraftType::Auction);
        let d = derived(&s);
        assert!(validate_pick(&s, &d, &catalog(), "rb1", 2, 1, false, Utc::now()).is_ok());
    }

    #[test]
    fn auction_rejects_out_of_range_team_index() {
        // No turn enforcement on auction drafts, so the range check is the
        // only thing standing between a zero index and the roster lookup.
        let s = session(DraftType::Auction);
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 0, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::OutOfTurn { got_team: 0, .. }));
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 3, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::OutOfTurn { got_team: 3, .. }));
    }

    #[test]
    fn bypass_turn_still_rejects_out_of_range_team_index() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 0, 1, true, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::OutOfTurn { got_team: 0, .. }));
    }

    #[test]
    fn rejects_already_drafted_player() {
        let s = session(DraftType::Snake);
        let mut d = derived(&s);
        d.drafted.insert("rb1".into());
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::PlayerAlreadyDrafted(_)));
    }

    #[test]
    fn rejects_player_reserved_by_keeper() {
        let mut s = session(DraftType::Snake);
        s.keepers = vec![KeeperPick {
            pick_number: 4,
            player_id: "rb2".into(),
        }];
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "rb2", 1, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::PlayerAlreadyDrafted(_)));
    }

    #[test]
    fn keeper_pick_at_its_own_slot_is_flagged() {
        let mut s = session(DraftType::Snake);
        s.keepers = vec![KeeperPick {
            pick_number: 1,
            player_id: "rb1".into(),
        }];
        let d = derived(&s);
        let pick =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 1, false, Utc::now()).unwrap();
        assert!(pick.keeper);
    }

    #[test]
    fn rejects_unknown_player() {
        let s = session(DraftType::Snake);
        let d = derived(&s);
        let err =
            validate_pick(&s, &d, &catalog(), "ghost", 1, 1, false, Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::PlayerNotFound(_)));
    }

    #[test]
    fn rejects_when_roster_has_no_room() {
        let mut s = session(DraftType::Snake);
        let mut d = derived(&s);
        // Fill team 1's RB slot and bench
        assert!(d.rosters[0].add_player("x1", "X1", Position::RunningBack));
        assert!(d.rosters[0].add_player("x2", "X2", Position::RunningBack));
        s.current_pick = 4; // snake: round 2 pick 2 -> team 1
        let err =
            validate_pick(&s, &d, &catalog(), "rb1", 1, 4, false, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DraftError::RosterSlotFull {
                team_index: 1,
                position: Position::RunningBack
            }
        ));
    }
}
