// Recommendation engine: score the available player pool for the team on
// the clock.
//
// Composite score = weighted sum of three normalized components:
//   value    - how far the player has fallen past consensus ADP
//   need     - open starter slots at the player's position on the roster
//   scarcity - projected-points dropoff among remaining players there
// Weights come from RecommendationConfig, so a league-specific strategy is
// a config change, not a code change.

use std::collections::HashMap;

use crate::catalog::{CatalogPlayer, PlayerCatalog};
use crate::config::RecommendationConfig;
use crate::events::DerivedState;
use crate::order::team_for_pick;
use crate::roster::Position;
use crate::session::DraftSession;

/// One scored suggestion for the current pick.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecommendation {
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub player_team: String,
    /// Composite score in 0..=100.
    pub score: f64,
    /// Raw value component: current pick number minus adp_rank. Positive
    /// means the player has outlasted their consensus slot.
    pub value_over_adp: f64,
    /// Open starter slots at this position on the picking team's roster.
    pub positional_need: usize,
    pub rationale: String,
}

struct Candidate<'a> {
    player: &'a CatalogPlayer,
    value_raw: f64,
    need_raw: f64,
    scarcity_raw: f64,
    need_slots: usize,
}

/// Score the available pool for the team currently on the clock.
///
/// Results are sorted best-first and truncated to `config.top_n`. An
/// optional position filter restricts candidates before scoring, so the
/// normalization baseline is the filtered pool.
pub fn recommend(
    session: &DraftSession,
    derived: &DerivedState,
    catalog: &PlayerCatalog,
    config: &RecommendationConfig,
    position_filter: Option<Position>,
) -> Vec<DraftRecommendation> {
    if session.current_pick > session.total_picks() {
        return Vec::new();
    }
    let team_index = team_for_pick(session.current_pick, session.team_count, session.draft_type);
    let Some(roster) = derived.rosters.get(team_index as usize - 1) else {
        return Vec::new();
    };

    let available: Vec<&CatalogPlayer> = catalog
        .iter()
        .filter(|p| !derived.drafted.contains(&p.player_id))
        .filter(|p| {
            // Keeper reservations are off the board unless this very slot
            // is the keeper's.
            !session
                .keepers
                .iter()
                .any(|k| k.player_id == p.player_id && k.pick_number != session.current_pick)
        })
        .filter(|p| position_filter.map_or(true, |f| p.position == f))
        .collect();
    if available.is_empty() {
        return Vec::new();
    }

    let scarcity_by_pos = scarcity_dropoffs(&available, session.team_count as usize);

    let mut candidates: Vec<Candidate> = available
        .iter()
        .map(|player| {
            let open = roster.open_starter_slots(player.position);
            let filled = roster.filled_for(player.position);
            let need_raw = if open == 0 {
                0.0
            } else {
                open as f64 / (filled as f64 + 1.0)
            };
            Candidate {
                player,
                value_raw: session.current_pick as f64 - player.adp_rank as f64,
                need_raw,
                scarcity_raw: scarcity_by_pos
                    .get(&player.position)
                    .copied()
                    .unwrap_or(0.0),
                need_slots: open,
            }
        })
        .collect();

    // Saturated positions (no open starter slot) drop out entirely while an
    // open-position alternative exists; they only come back once every
    // remaining candidate is bench-bound.
    if candidates.iter().any(|c| c.need_raw > 0.0) {
        candidates.retain(|c| c.need_raw > 0.0);
    }

    let value_raws: Vec<f64> = candidates.iter().map(|c| c.value_raw).collect();
    let need_raws: Vec<f64> = candidates.iter().map(|c| c.need_raw).collect();
    let scarcity_raws: Vec<f64> = candidates.iter().map(|c| c.scarcity_raw).collect();
    let value_norm = normalizer(&value_raws);
    let need_norm = normalizer(&need_raws);
    let scarcity_norm = normalizer(&scarcity_raws);

    let weight_total = config.value_weight + config.need_weight + config.scarcity_weight;
    let mut out: Vec<DraftRecommendation> = candidates
        .drain(..)
        .map(|c| {
            let value = value_norm(c.value_raw);
            let need = need_norm(c.need_raw);
            let scarcity = scarcity_norm(c.scarcity_raw);
            let weighted = [
                ("value", config.value_weight * value),
                ("need", config.need_weight * need),
                ("scarcity", config.scarcity_weight * scarcity),
            ];
            let score =
                (100.0 * weighted.iter().map(|(_, w)| w).sum::<f64>() / weight_total)
                    .clamp(0.0, 100.0);
            DraftRecommendation {
                player_id: c.player.player_id.clone(),
                player_name: c.player.name.clone(),
                position: c.player.position,
                player_team: c.player.team.clone(),
                score,
                value_over_adp: c.value_raw,
                positional_need: c.need_slots,
                rationale: rationale(&weighted, c.value_raw, c.need_slots, c.player.position),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ar = catalog.get(&a.player_id).map_or(u32::MAX, |p| p.adp_rank);
                let br = catalog.get(&b.player_id).map_or(u32::MAX, |p| p.adp_rank);
                ar.cmp(&br)
            })
            .then_with(|| {
                config
                    .priority_index(a.position)
                    .cmp(&config.priority_index(b.position))
            })
    });
    out.truncate(config.top_n);
    out
}

/// Projected-points dropoff per position: best remaining minus the
/// team_count-th best remaining. A steep dropoff means the position empties
/// out within one full round.
fn scarcity_dropoffs(
    available: &[&CatalogPlayer],
    team_count: usize,
) -> HashMap<Position, f64> {
    let mut by_pos: HashMap<Position, Vec<f64>> = HashMap::new();
    for p in available {
        by_pos.entry(p.position).or_default().push(p.projected_points);
    }
    by_pos
        .into_iter()
        .map(|(pos, mut points)| {
            points.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            let best = points[0];
            let horizon = points.get(team_count - 1).or_else(|| points.last());
            let drop = horizon.map_or(0.0, |h| (best - h).max(0.0));
            (pos, drop)
        })
        .collect()
}

/// Min-max normalizer over a set of raw values. A degenerate range (all
/// values equal) maps everything to 0.5 so the component neither helps nor
/// hurts anyone. The bounds are computed eagerly; the returned closure owns
/// only the two floats.
fn normalizer(values: &[f64]) -> impl Fn(f64) -> f64 {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    move |v: f64| {
        if max - min > f64::EPSILON {
            (v - min) / (max - min)
        } else {
            0.5
        }
    }
}

fn rationale(
    weighted: &[(&str, f64); 3],
    value_raw: f64,
    need_slots: usize,
    pos: Position,
) -> String {
    let dominant = weighted
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| *name)
        .unwrap_or("value");
    match dominant {
        "need" => {
            if value_raw > 0.0 {
                format!("fills an open {pos} starter slot at a value ({need_slots} open)")
            } else {
                format!("fills an open {pos} starter slot ({need_slots} open)")
            }
        }
        "scarcity" => format!("{pos} pool is thinning out fast"),
        _ => {
            if value_raw > 0.0 {
                format!("available {value_raw:.0} picks past consensus ADP")
            } else {
                "best player available by consensus ADP".to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
