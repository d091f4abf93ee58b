// Positions, roster slots, and slot-assignment legality.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Football positions used for roster slot assignment.
///
/// `Flex` and `Bench` are meta-slots: a slot on a roster can carry them, but
/// a player's own position is always a concrete one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Kicker,
    Defense,
    Flex,
    Bench,
}

impl Position {
    /// Parse a position string into a Position enum.
    ///
    /// Handles the common platform abbreviations:
    /// - "DST"/"DEF"/"D/ST" -> Defense
    /// - "FLEX"/"FLX"/"W/R/T" -> Flex
    /// - "BE"/"BN" -> Bench
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" => Some(Position::Kicker),
            "DST" | "DEF" | "D/ST" => Some(Position::Defense),
            "FLEX" | "FLX" | "W/R/T" => Some(Position::Flex),
            "BE" | "BN" => Some(Position::Bench),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DST",
            Position::Flex => "FLEX",
            Position::Bench => "BE",
        }
    }

    /// Whether a player at this position may occupy a FLEX slot.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }

    /// Whether this is a meta-slot (not a concrete playing position).
    pub fn is_meta_slot(&self) -> bool {
        matches!(self, Position::Flex | Position::Bench)
    }

    /// Deterministic ordering index for roster slot display and tie-breaks.
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Quarterback => 0,
            Position::RunningBack => 1,
            Position::WideReceiver => 2,
            Position::TightEnd => 3,
            Position::Flex => 4,
            Position::Kicker => 5,
            Position::Defense => 6,
            Position::Bench => 7,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// A player assigned to a roster slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosteredPlayer {
    pub player_id: String,
    pub name: String,
    /// The player's own position, not the slot they landed in.
    pub position: Position,
}

/// A single slot on a team's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSlot {
    /// The position designation of this slot.
    pub position: Position,
    /// The player occupying this slot, if any.
    pub player: Option<RosteredPlayer>,
}

/// A team's complete roster of slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub slots: Vec<RosterSlot>,
}

impl Roster {
    /// Create a new roster from a config mapping position strings to slot
    /// counts, e.g. `{"QB": 1, "RB": 2, "WR": 2, "TE": 1, "FLEX": 1,
    /// "K": 1, "DST": 1, "BE": 6}`. Unrecognized keys are skipped.
    ///
    /// Slots are created in deterministic order based on
    /// `Position::sort_order()`.
    pub fn new(roster_config: &HashMap<String, usize>) -> Self {
        let mut slots: Vec<RosterSlot> = Vec::new();

        for (pos_str, &count) in roster_config {
            if let Some(pos) = Position::from_str_pos(pos_str) {
                for _ in 0..count {
                    slots.push(RosterSlot {
                        position: pos,
                        player: None,
                    });
                }
            }
        }

        slots.sort_by_key(|s| s.position.sort_order());

        Roster { slots }
    }

    /// Whether there is an empty slot with the given designation.
    pub fn has_empty_slot(&self, pos: Position) -> bool {
        self.slots
            .iter()
            .any(|s| s.position == pos && s.player.is_none())
    }

    /// Whether a player at `pos` could still be placed somewhere on this
    /// roster. A position only runs out of room once its dedicated slots,
    /// the FLEX slots (if eligible), and the bench are all full.
    pub fn has_room(&self, pos: Position) -> bool {
        if self.has_empty_slot(pos) {
            return true;
        }
        if pos.is_flex_eligible() && self.has_empty_slot(Position::Flex) {
            return true;
        }
        self.has_empty_slot(Position::Bench)
    }

    /// Add a player to the roster.
    ///
    /// Slot assignment priority:
    /// 1. Dedicated position slot (exact match)
    /// 2. FLEX slot (RB/WR/TE only)
    /// 3. Bench slot
    ///
    /// Returns `true` if the player was placed, `false` if no slot is open.
    pub fn add_player(&mut self, player_id: &str, name: &str, pos: Position) -> bool {
        let player = RosteredPlayer {
            player_id: player_id.to_string(),
            name: name.to_string(),
            position: pos,
        };

        // 1. Dedicated position slot
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.position == pos && s.player.is_none())
        {
            slot.player = Some(player);
            return true;
        }

        // 2. FLEX slot for eligible positions
        if pos.is_flex_eligible() {
            if let Some(slot) = self
                .slots
                .iter_mut()
                .find(|s| s.position == Position::Flex && s.player.is_none())
            {
                slot.player = Some(player);
                return true;
            }
        }

        // 3. Bench slot
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.position == Position::Bench && s.player.is_none())
        {
            slot.player = Some(player);
            return true;
        }

        false
    }

    /// Remove a player by id, emptying their slot. Returns the removed
    /// player, or `None` if the id is not on this roster.
    pub fn remove_player(&mut self, player_id: &str) -> Option<RosteredPlayer> {
        let slot = self.slots.iter_mut().find(|s| {
            s.player
                .as_ref()
                .map_or(false, |p| p.player_id == player_id)
        })?;
        slot.player.take()
    }

    /// Whether a player id is already on this roster.
    pub fn has_player(&self, player_id: &str) -> bool {
        self.slots.iter().any(|s| {
            s.player
                .as_ref()
                .map_or(false, |p| p.player_id == player_id)
        })
    }

    /// Number of filled (non-empty) slots.
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.player.is_some()).count()
    }

    /// Total number of slots.
    pub fn total_count(&self) -> usize {
        self.slots.len()
    }

    /// Open starter slots a player at `pos` could still claim: empty
    /// dedicated slots plus empty FLEX slots when eligible. Bench is
    /// excluded; it holds anyone and says nothing about need.
    pub fn open_starter_slots(&self, pos: Position) -> usize {
        let dedicated = self
            .slots
            .iter()
            .filter(|s| s.position == pos && s.player.is_none())
            .count();
        let flex = if pos.is_flex_eligible() {
            self.slots
                .iter()
                .filter(|s| s.position == Position::Flex && s.player.is_none())
                .count()
        } else {
            0
        };
        dedicated + flex
    }

    /// Count of rostered players whose own position is `pos`, wherever they
    /// were slotted.
    pub fn filled_for(&self, pos: Position) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.player.as_ref())
            .filter(|p| p.position == pos)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
