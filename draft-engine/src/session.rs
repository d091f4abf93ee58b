// Draft session aggregate and lifecycle state machine.
//
// A session moves NOT_STARTED -> ACTIVE -> {PAUSED <-> ACTIVE} ->
// COMPLETED, with ABANDONED reachable from any non-terminal state. All
// transition guards live here; event logging and persistence are the
// engine's job.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::order::DraftType;
use crate::roster::{Position, Roster};

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(SessionStatus::NotStarted),
            "active" => Some(SessionStatus::Active),
            "paused" => Some(SessionStatus::Paused),
            "completed" => Some(SessionStatus::Completed),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session config
// ---------------------------------------------------------------------------

/// A pre-set pick that belongs to whichever team owns its slot; applied
/// automatically when the draft reaches that pick number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperPick {
    pub pick_number: u32,
    pub player_id: String,
}

/// Caller-supplied settings for a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: String,
    pub league_id: Option<String>,
    pub draft_type: DraftType,
    pub team_count: u32,
    pub round_count: u32,
    /// The caller's draft slot, 1-based.
    pub user_draft_position: u32,
    /// Position string -> slot count, e.g. {"QB": 1, "RB": 2, "BE": 6}.
    pub roster_config: HashMap<String, usize>,
    /// Scoring format label (e.g. "ppr", "standard"); carried for the
    /// caller, not interpreted by the engine.
    pub scoring_format: String,
    /// Seconds per pick; 0 disables the timer.
    pub timer_seconds: u32,
    pub keepers: Vec<KeeperPick>,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.team_count < 2 {
            return Err(DraftError::InvalidConfig {
                field: "team_count",
                message: format!("need at least 2 teams, got {}", self.team_count),
            });
        }
        if self.round_count < 1 {
            return Err(DraftError::InvalidConfig {
                field: "round_count",
                message: "need at least 1 round".to_string(),
            });
        }
        if self.user_draft_position < 1 || self.user_draft_position > self.team_count {
            return Err(DraftError::InvalidConfig {
                field: "user_draft_position",
                message: format!(
                    "slot {} out of range 1..={}",
                    self.user_draft_position, self.team_count
                ),
            });
        }

        // Each team's roster must be able to hold one player per round.
        let capacity = Roster::new(&self.roster_config).total_count();
        if capacity < self.round_count as usize {
            return Err(DraftError::InvalidConfig {
                field: "roster_config",
                message: format!(
                    "roster holds {} players but the draft has {} rounds",
                    capacity, self.round_count
                ),
            });
        }
        let recognized = self
            .roster_config
            .keys()
            .any(|k| Position::from_str_pos(k).is_some());
        if !recognized {
            return Err(DraftError::InvalidConfig {
                field: "roster_config",
                message: "no recognized position slots".to_string(),
            });
        }

        let total_picks = self.team_count * self.round_count;
        let mut seen_slots = HashSet::new();
        let mut seen_players = HashSet::new();
        for keeper in &self.keepers {
            if keeper.pick_number < 1 || keeper.pick_number > total_picks {
                return Err(DraftError::InvalidConfig {
                    field: "keepers",
                    message: format!(
                        "keeper pick {} out of range 1..={}",
                        keeper.pick_number, total_picks
                    ),
                });
            }
            if !seen_slots.insert(keeper.pick_number) {
                return Err(DraftError::InvalidConfig {
                    field: "keepers",
                    message: format!("duplicate keeper slot {}", keeper.pick_number),
                });
            }
            if !seen_players.insert(keeper.player_id.as_str()) {
                return Err(DraftError::InvalidConfig {
                    field: "keepers",
                    message: format!("player {} kept twice", keeper.player_id),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Draft session
// ---------------------------------------------------------------------------

/// The aggregate root for one live draft. Picks and events are reachable
/// only through the session's event log; this struct holds the lifecycle
/// and configuration fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSession {
    pub session_id: String,
    pub user_id: String,
    pub league_id: Option<String>,
    pub draft_type: DraftType,
    pub team_count: u32,
    pub round_count: u32,
    pub user_draft_position: u32,
    /// 1-based overall pick currently on the clock. One past the last pick
    /// marks completion.
    pub current_pick: u32,
    pub status: SessionStatus,
    pub roster_config: HashMap<String, usize>,
    pub scoring_format: String,
    pub timer_seconds: u32,
    /// When the current pick auto-drafts, if a timer is running.
    pub pick_deadline: Option<DateTime<Utc>>,
    pub keepers: Vec<KeeperPick>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Generate a session id from the current UTC timestamp. The millisecond
/// suffix keeps ids unique even when two sessions start in the same second.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    now.format("session_%Y%m%d_%H%M%S_%3f").to_string()
}

impl DraftSession {
    pub fn new(session_id: String, config: SessionConfig, now: DateTime<Utc>) -> Self {
        DraftSession {
            session_id,
            user_id: config.user_id,
            league_id: config.league_id,
            draft_type: config.draft_type,
            team_count: config.team_count,
            round_count: config.round_count,
            user_draft_position: config.user_draft_position,
            current_pick: 1,
            status: SessionStatus::NotStarted,
            roster_config: config.roster_config,
            scoring_format: config.scoring_format,
            timer_seconds: config.timer_seconds,
            pick_deadline: None,
            keepers: config.keepers,
            started_at: None,
            completed_at: None,
            created_at: now,
        }
    }

    /// Total number of picks in the draft.
    pub fn total_picks(&self) -> u32 {
        self.team_count * self.round_count
    }

    /// The keeper assigned to a pick slot, if any.
    pub fn keeper_at(&self, pick_number: u32) -> Option<&KeeperPick> {
        self.keepers.iter().find(|k| k.pick_number == pick_number)
    }

    fn illegal(&self, action: &'static str) -> DraftError {
        DraftError::InvalidStateTransition {
            status: self.status,
            action,
        }
    }

    /// Begin the draft. Legal only from NOT_STARTED.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DraftError> {
        if self.status != SessionStatus::NotStarted {
            return Err(self.illegal("start"));
        }
        self.status = SessionStatus::Active;
        self.started_at = Some(now);
        self.current_pick = 1;
        self.arm_deadline(now);
        Ok(())
    }

    /// Suspend the draft, cancelling the current pick's deadline without
    /// losing position.
    pub fn pause(&mut self) -> Result<(), DraftError> {
        if self.status != SessionStatus::Active {
            return Err(self.illegal("pause"));
        }
        self.status = SessionStatus::Paused;
        self.pick_deadline = None;
        Ok(())
    }

    /// Resume a paused draft. The pick timer restarts at the full
    /// configured duration.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), DraftError> {
        if self.status != SessionStatus::Paused {
            return Err(self.illegal("resume"));
        }
        self.status = SessionStatus::Active;
        self.arm_deadline(now);
        Ok(())
    }

    /// Abandon the draft. Legal from any non-terminal state.
    pub fn abandon(&mut self) -> Result<(), DraftError> {
        if self.status.is_terminal() {
            return Err(self.illegal("abandon"));
        }
        self.status = SessionStatus::Abandoned;
        self.pick_deadline = None;
        Ok(())
    }

    /// Move to the next pick after a successful PICK_MADE. Returns `true`
    /// when the draft just completed.
    pub fn advance_pick(&mut self, now: DateTime<Utc>) -> bool {
        self.current_pick += 1;
        if self.current_pick > self.total_picks() {
            self.status = SessionStatus::Completed;
            self.completed_at = Some(now);
            self.pick_deadline = None;
            true
        } else {
            self.arm_deadline(now);
            false
        }
    }

    /// Step back one pick after an undo.
    pub fn retreat_pick(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.current_pick > 1);
        self.current_pick -= 1;
        self.arm_deadline(now);
    }

    fn arm_deadline(&mut self, now: DateTime<Utc>) {
        self.pick_deadline = if self.timer_seconds > 0 {
            Some(now + Duration::seconds(i64::from(self.timer_seconds)))
        } else {
            None
        };
    }

    /// Whether the current pick's deadline has passed. Always false for
    /// untimed sessions and outside ACTIVE.
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active
            && self.pick_deadline.map_or(false, |d| now >= d)
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
        m.insert("TE".into(), 1);
        m.insert("FLEX".into(), 1);
        m.insert("K".into(), 1);
        m.insert("DST".into(), 1);
        m.insert("BE".into(), 6);
        m
    }

    fn config() -> SessionConfig {
        SessionConfig {
            user_id: "user_1".into(),
            league_id: None,
            draft_type: DraftType::Snake,
            team_count: 10,
            round_count: 15,
            user_draft_position: 3,
            roster_config: roster_config(),
            scoring_format: "ppr".into(),
            timer_seconds: 0,
            keepers: vec![],
        }
    }

    fn session() -> DraftSession {
        DraftSession::new("s1".into(), config(), Utc::now())
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_slot() {
        let mut c = config();
        c.user_draft_position = 11;
        assert!(matches!(
            c.validate(),
            Err(DraftError::InvalidConfig { field: "user_draft_position", .. })
        ));
        c.user_draft_position = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_roster_smaller_than_rounds() {
        let mut c = config();
        c.round_count = 30; // roster only holds 15
        assert!(matches!(
            c.validate(),
            Err(DraftError::InvalidConfig { field: "roster_config", .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_keepers() {
        let mut c = config();
        c.keepers = vec![
            KeeperPick { pick_number: 3, player_id: "p1".into() },
            KeeperPick { pick_number: 3, player_id: "p2".into() },
        ];
        assert!(c.validate().is_err());

        c.keepers = vec![
            KeeperPick { pick_number: 3, player_id: "p1".into() },
            KeeperPick { pick_number: 7, player_id: "p1".into() },
        ];
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_keeper_slot_out_of_range() {
        let mut c = config();
        c.keepers = vec![KeeperPick { pick_number: 151, player_id: "p1".into() }];
        assert!(c.validate().is_err());
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut s = session();
        assert_eq!(s.status, SessionStatus::NotStarted);

        s.start(Utc::now()).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.current_pick, 1);
        assert!(s.started_at.is_some());

        s.pause().unwrap();
        assert_eq!(s.status, SessionStatus::Paused);
        s.resume(Utc::now()).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
    }

    #[test]
    fn start_twice_is_illegal() {
        let mut s = session();
        s.start(Utc::now()).unwrap();
        let err = s.start(Utc::now()).unwrap_err();
        assert!(matches!(err, DraftError::InvalidStateTransition { .. }));
        // State unchanged by the failed transition
        assert_eq!(s.status, SessionStatus::Active);
    }

    #[test]
    fn pause_requires_active() {
        let mut s = session();
        assert!(s.pause().is_err());
        s.start(Utc::now()).unwrap();
        s.pause().unwrap();
        assert!(s.pause().is_err());
    }

    #[test]
    fn resume_requires_paused() {
        let mut s = session();
        assert!(s.resume(Utc::now()).is_err());
        s.start(Utc::now()).unwrap();
        assert!(s.resume(Utc::now()).is_err());
    }

    #[test]
    fn abandon_from_any_non_terminal_state() {
        let mut s = session();
        s.abandon().unwrap();
        assert_eq!(s.status, SessionStatus::Abandoned);
        // Terminal: no further transitions
        assert!(s.start(Utc::now()).is_err());
        assert!(s.abandon().is_err());

        let mut s = session();
        s.start(Utc::now()).unwrap();
        s.pause().unwrap();
        s.abandon().unwrap();
        assert_eq!(s.status, SessionStatus::Abandoned);
    }

    #[test]
    fn advance_pick_completes_at_boundary() {
        let mut c = config();
        c.team_count = 2;
        c.round_count = 2;
        c.user_draft_position = 1;
        let mut s = DraftSession::new("s1".into(), c, Utc::now());
        s.start(Utc::now()).unwrap();

        assert!(!s.advance_pick(Utc::now())); // -> pick 2
        assert!(!s.advance_pick(Utc::now())); // -> pick 3
        assert!(!s.advance_pick(Utc::now())); // -> pick 4
        let completed = s.advance_pick(Utc::now()); // -> pick 5, past the end
        assert!(completed);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.current_pick, s.total_picks() + 1);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn timer_deadline_lifecycle() {
        let mut c = config();
        c.timer_seconds = 60;
        let mut s = DraftSession::new("s1".into(), c, Utc::now());
        let t0 = Utc::now();

        s.start(t0).unwrap();
        let deadline = s.pick_deadline.unwrap();
        assert_eq!(deadline, t0 + Duration::seconds(60));
        assert!(!s.deadline_passed(t0));
        assert!(s.deadline_passed(t0 + Duration::seconds(61)));

        // Pause clears the deadline without losing position
        s.pause().unwrap();
        assert!(s.pick_deadline.is_none());
        assert!(!s.deadline_passed(t0 + Duration::seconds(120)));

        // Resume re-arms a fresh full-duration timer
        let t1 = t0 + Duration::seconds(300);
        s.resume(t1).unwrap();
        assert_eq!(s.pick_deadline.unwrap(), t1 + Duration::seconds(60));
    }

    #[test]
    fn untimed_session_has_no_deadline() {
        let mut s = session();
        s.start(Utc::now()).unwrap();
        assert!(s.pick_deadline.is_none());
        assert!(!s.deadline_passed(Utc::now() + Duration::days(1)));
    }

    #[test]
    fn generate_session_id_format() {
        let id = generate_session_id(Utc::now());
        assert!(id.starts_with("session_"));
        assert!(id.len() >= 25);
    }
}
