// Draft engine error taxonomy.
//
// Every variant is a recoverable, user-facing rejection: the caller maps it
// to a message and may refetch state and retry. A rejected operation never
// leaves partial state behind.

use thiserror::Error;

use crate::roster::Position;
use crate::session::SessionStatus;

pub type Result<T> = std::result::Result<T, DraftError>;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("invalid state transition: cannot {action} while {status}")]
    InvalidStateTransition {
        status: SessionStatus,
        action: &'static str,
    },

    #[error("session is not active (status: {0})")]
    SessionNotActive(SessionStatus),

    #[error("pick number mismatch: session is at pick {expected}, request was for pick {got}")]
    PickNumberMismatch { expected: u32, got: u32 },

    #[error("out of turn: pick {pick_number} belongs to team {expected_team}, not team {got_team}")]
    OutOfTurn {
        pick_number: u32,
        expected_team: u32,
        got_team: u32,
    },

    #[error("player {0} has already been drafted")]
    PlayerAlreadyDrafted(String),

    #[error("no open roster slot for {position} on team {team_index}")]
    RosterSlotFull { team_index: u32, position: Position },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("concurrent modification: expected event sequence {expected}, log is at {actual}")]
    ConcurrentModification { expected: u64, actual: u64 },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Data-integrity error: an id referenced by the draft has no catalog
    /// entry. Logged and surfaced distinctly from draft-logic rejections.
    #[error("player not found in catalog: {0}")]
    PlayerNotFound(String),

    #[error("no draftable players remain in the pool")]
    PlayerPoolExhausted,

    #[error("invalid session config: {field}: {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DraftError {
    /// Whether the caller can resolve this error by refetching the current
    /// state and resubmitting the operation.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DraftError::ConcurrentModification { .. })
    }
}
