// Player catalog: read-only lookup of draftable players.
//
// The catalog is an external data source as far as the engine is concerned;
// it is loaded once (CSV import or programmatic construction), shared
// without locking, and never mutated during a draft.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::roster::Position;

/// A single draftable player with consensus draft data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPlayer {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    /// Real-world team abbreviation (e.g. "KC").
    pub team: String,
    /// Average Draft Position: the consensus overall slot where this player
    /// is typically taken.
    pub adp: f64,
    /// 1-based rank by ascending ADP, assigned at load time.
    pub adp_rank: u32,
    /// Season-long projected fantasy points.
    pub projected_points: f64,
}

/// Raw CSV row; `adp_rank` is derived, not imported.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    player_id: String,
    name: String,
    position: String,
    team: String,
    adp: f64,
    projected_points: f64,
}

/// Read-only, shared player lookup keyed by player id.
#[derive(Debug, Clone, Default)]
pub struct PlayerCatalog {
    players: HashMap<String, CatalogPlayer>,
}

impl PlayerCatalog {
    /// Build a catalog from already-constructed players, assigning ADP
    /// ranks by ascending ADP (ties broken by id for determinism). Any
    /// `adp_rank` on the input is overwritten.
    pub fn from_players(mut players: Vec<CatalogPlayer>) -> Self {
        players.sort_by(|a, b| {
            a.adp
                .partial_cmp(&b.adp)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        let players = players
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.adp_rank = i as u32 + 1;
                (p.player_id.clone(), p)
            })
            .collect();
        PlayerCatalog { players }
    }

    /// Load a catalog from a CSV file with the columns
    /// `player_id,name,position,team,adp,projected_points`.
    ///
    /// Rows with an unrecognized or meta position are skipped rather than
    /// failing the whole import.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open player catalog at {}", path.display()))?;

        let mut players = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize() {
            let row: CatalogRow = row.context("failed to parse player catalog row")?;
            match Position::from_str_pos(&row.position) {
                Some(pos) if !pos.is_meta_slot() => players.push(CatalogPlayer {
                    player_id: row.player_id,
                    name: row.name,
                    position: pos,
                    team: row.team,
                    adp: row.adp,
                    adp_rank: 0,
                    projected_points: row.projected_points,
                }),
                _ => skipped += 1,
            }
        }

        info!(
            "Loaded {} catalog players from {} ({} rows skipped)",
            players.len(),
            path.display(),
            skipped
        );
        Ok(Self::from_players(players))
    }

    /// Look up a player by id.
    pub fn get(&self, player_id: &str) -> Option<&CatalogPlayer> {
        self.players.get(player_id)
    }

    /// Iterate over all players in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogPlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
