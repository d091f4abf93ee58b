// Draft engine facade: session registry and orchestration.
//
// One mutex per session serializes all mutation of that draft; distinct
// sessions never contend. Every mutating operation follows the same
// shape: validate against in-memory state, append to the event log
// (which is where a concurrent writer gets rejected), fold the event
// into derived state, update the session row. Crash recovery on open is
// a replay of each session's log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::catalog::PlayerCatalog;
use crate::config::EngineConfig;
use crate::error::DraftError;
use crate::events::{DerivedState, DraftPick, EventPayload};
use crate::order::team_for_pick;
use crate::recommend::{recommend, DraftRecommendation};
use crate::roster::Position;
use crate::session::{generate_session_id, DraftSession, SessionConfig, SessionStatus};
use crate::store::Store;
use crate::validate::validate_pick;

/// A read-only snapshot of a session for callers: the session row, its
/// standing picks, who is on the clock, and the remaining player pool.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session: DraftSession,
    pub picks: Vec<DraftPick>,
    /// Team on the clock, when the draft is still running.
    pub on_the_clock: Option<u32>,
    /// Available player ids, best consensus rank first.
    pub available: Vec<String>,
}

struct SessionHandle {
    session: DraftSession,
    derived: DerivedState,
    last_seq: u64,
    /// Unfiltered recommendations memoized per pick number; any append
    /// invalidates them.
    cached_recs: Option<(u32, Vec<DraftRecommendation>)>,
}

impl SessionHandle {
    fn invalidate_cache(&mut self) {
        self.cached_recs = None;
    }
}

pub struct DraftEngine {
    store: Store,
    catalog: Arc<PlayerCatalog>,
    config: EngineConfig,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionHandle>>>>,
}

impl DraftEngine {
    /// Open the engine over a database path, recovering every persisted
    /// session by replaying its event log.
    pub fn open(db_path: &str, catalog: Arc<PlayerCatalog>, config: EngineConfig) -> Result<Self> {
        let store = Store::open(db_path)?;
        store.log_summary()?;

        let mut handles = HashMap::new();
        for mut session in store.load_sessions()? {
            let events = store.load_events(&session.session_id)?;
            let last_seq = events.last().map_or(0, |e| e.seq);
            let derived = DerivedState::replay(session.team_count, &session.roster_config, &events);

            // The event log wins over the saved session row: a crash between
            // append and save leaves the row one step behind.
            if !session.status.is_terminal() {
                let expected = derived.picks.last().map_or(1, |p| p.pick_number + 1);
                if session.current_pick != expected {
                    warn!(
                        "Session {} row was at pick {} but log replays to pick {}; using the log",
                        session.session_id, session.current_pick, expected
                    );
                    session.current_pick = expected;
                }
            }

            handles.insert(
                session.session_id.clone(),
                Arc::new(Mutex::new(SessionHandle {
                    session,
                    derived,
                    last_seq,
                    cached_recs: None,
                })),
            );
        }
        if !handles.is_empty() {
            info!("Recovered {} draft sessions", handles.len());
        }

        Ok(Self {
            store,
            catalog,
            config,
            sessions: Mutex::new(handles),
        })
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<SessionHandle>>, DraftError> {
        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| DraftError::SessionNotFound(session_id.to_string()))
    }

    fn lock_handle<'a>(
        handle: &'a Arc<Mutex<SessionHandle>>,
    ) -> MutexGuard<'a, SessionHandle> {
        handle.lock().expect("session mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a new session in NOT_STARTED. The config is validated up
    /// front; nothing is persisted on rejection.
    pub fn create_session(
        &self,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<DraftSession, DraftError> {
        config.validate()?;
        for keeper in &config.keepers {
            if self.catalog.get(&keeper.player_id).is_none() {
                return Err(DraftError::PlayerNotFound(keeper.player_id.clone()));
            }
        }

        let session = DraftSession::new(generate_session_id(now), config, now);
        self.store.save_session(&session).map_err(DraftError::Storage)?;
        info!(
            "Created session {} ({} teams, {} rounds, {})",
            session.session_id,
            session.team_count,
            session.round_count,
            session.draft_type.as_str()
        );

        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .insert(
                session.session_id.clone(),
                Arc::new(Mutex::new(SessionHandle {
                    session: session.clone(),
                    derived: DerivedState::new(session.team_count, &session.roster_config),
                    last_seq: 0,
                    cached_recs: None,
                })),
            );
        Ok(session)
    }

    /// Start the draft at pick 1. Keeper assignments at the top of the
    /// order are settled immediately.
    pub fn start_draft(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftSession, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        h.session.start(now)?;
        info!("Session {} started", session_id);
        self.settle_keepers(&mut h, now)?;
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        Ok(h.session.clone())
    }

    /// Pause the clock without losing position.
    pub fn pause_draft(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftSession, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status != SessionStatus::Active {
            return Err(DraftError::InvalidStateTransition {
                status: h.session.status,
                action: "pause",
            });
        }
        self.append(&mut h, EventPayload::SessionPaused, now)?;
        h.session.pause()?;
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        Ok(h.session.clone())
    }

    /// Resume a paused draft with a fresh pick timer.
    pub fn resume_draft(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftSession, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status != SessionStatus::Paused {
            return Err(DraftError::InvalidStateTransition {
                status: h.session.status,
                action: "resume",
            });
        }
        self.append(&mut h, EventPayload::SessionResumed, now)?;
        h.session.resume(now)?;
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        Ok(h.session.clone())
    }

    /// Abandon the draft permanently.
    pub fn abandon_draft(&self, session_id: &str) -> Result<DraftSession, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        h.session.abandon()?;
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        info!("Session {} abandoned", session_id);
        Ok(h.session.clone())
    }

    /// Change the per-pick timer mid-draft. Takes effect from the next
    /// armed deadline; the change is logged like any other mutation.
    pub fn update_timer(
        &self,
        session_id: &str,
        timer_seconds: u32,
        now: DateTime<Utc>,
    ) -> Result<DraftSession, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status.is_terminal() {
            return Err(DraftError::InvalidStateTransition {
                status: h.session.status,
                action: "update timer",
            });
        }
        self.append(&mut h, EventPayload::SettingsChanged { timer_seconds }, now)?;
        h.session.timer_seconds = timer_seconds;
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        Ok(h.session.clone())
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Record a pick for the team on the clock. Rejections leave the
    /// session untouched; a success advances the pick and settles any
    /// keeper slots that follow.
    pub fn record_pick(
        &self,
        session_id: &str,
        team_index: u32,
        player_id: &str,
        pick_number: u32,
        now: DateTime<Utc>,
    ) -> Result<DraftPick, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);

        let pick = validate_pick(
            &h.session,
            &h.derived,
            &self.catalog,
            player_id,
            team_index,
            pick_number,
            false,
            now,
        )?;
        self.commit_pick(&mut h, pick, now)
    }

    /// Undo the most recent pick. Keeper picks cannot be undone; a keeper
    /// on top of the log blocks undo entirely.
    pub fn undo_pick(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftPick, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status != SessionStatus::Active {
            return Err(DraftError::SessionNotActive(h.session.status));
        }
        let last = match h.derived.last_pick() {
            Some(p) if !p.keeper => p.clone(),
            _ => return Err(DraftError::NothingToUndo),
        };

        self.append(
            &mut h,
            EventPayload::PickUndone {
                pick_number: last.pick_number,
                player_id: last.player_id.clone(),
            },
            now,
        )?;
        h.session.retreat_pick(now);
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        info!(
            "Session {}: undid pick {} ({})",
            session_id, last.pick_number, last.player_name
        );
        Ok(last)
    }

    /// Re-apply the most recently undone pick. Fails once any other pick
    /// has been made since the undo.
    pub fn redo_pick(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftPick, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status != SessionStatus::Active {
            return Err(DraftError::SessionNotActive(h.session.status));
        }
        let top = match h.derived.redo_stack.last() {
            Some(p) if p.pick_number == h.session.current_pick => p.clone(),
            _ => return Err(DraftError::NothingToRedo),
        };
        let pick = DraftPick { at: now, ..top };
        self.commit_pick(&mut h, pick, now)
    }

    /// Make the best available pick for whoever is on the clock. This is
    /// the timer expiry path, but callers may invoke it directly.
    pub fn auto_draft(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DraftPick, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);
        if h.session.status != SessionStatus::Active {
            return Err(DraftError::SessionNotActive(h.session.status));
        }
        let team_index = team_for_pick(
            h.session.current_pick,
            h.session.team_count,
            h.session.draft_type,
        );

        // Recommendations first, then the rest of the pool by consensus
        // rank; the first candidate that survives validation wins.
        let recs = recommend(
            &h.session,
            &h.derived,
            &self.catalog,
            &self.config.recommendation,
            None,
        );
        let mut candidates: Vec<String> = recs.into_iter().map(|r| r.player_id).collect();
        let mut pool: Vec<&crate::catalog::CatalogPlayer> = self
            .catalog
            .iter()
            .filter(|p| !h.derived.drafted.contains(&p.player_id))
            .filter(|p| !candidates.contains(&p.player_id))
            .collect();
        pool.sort_by_key(|p| p.adp_rank);
        candidates.extend(pool.into_iter().map(|p| p.player_id.clone()));

        for player_id in candidates {
            match validate_pick(
                &h.session,
                &h.derived,
                &self.catalog,
                &player_id,
                team_index,
                h.session.current_pick,
                true,
                now,
            ) {
                Ok(pick) => {
                    info!(
                        "Session {}: auto-drafted {} for team {}",
                        session_id, pick.player_name, team_index
                    );
                    return self.commit_pick(&mut h, pick, now);
                }
                Err(DraftError::RosterSlotFull { .. })
                | Err(DraftError::PlayerAlreadyDrafted(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DraftError::PlayerPoolExhausted)
    }

    /// Sessions whose pick deadline has passed as of `now`. The caller
    /// drives the clock; each returned id wants an `auto_draft`.
    pub fn expired_sessions(&self, now: DateTime<Utc>) -> Vec<String> {
        let registry = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        registry
            .iter()
            .filter(|(_, handle)| Self::lock_handle(handle).session.deadline_passed(now))
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Scored suggestions for the current pick. Unfiltered results are
    /// memoized until the board changes.
    pub fn get_recommendations(
        &self,
        session_id: &str,
        position_filter: Option<Position>,
    ) -> Result<Vec<DraftRecommendation>, DraftError> {
        let handle = self.handle(session_id)?;
        let mut h = Self::lock_handle(&handle);

        if let Some(filter) = position_filter {
            return Ok(recommend(
                &h.session,
                &h.derived,
                &self.catalog,
                &self.config.recommendation,
                Some(filter),
            ));
        }

        let current = h.session.current_pick;
        if let Some((pick, recs)) = &h.cached_recs {
            if *pick == current {
                return Ok(recs.clone());
            }
        }
        let recs = recommend(
            &h.session,
            &h.derived,
            &self.catalog,
            &self.config.recommendation,
            None,
        );
        h.cached_recs = Some((current, recs.clone()));
        Ok(recs)
    }

    /// Current snapshot of a session.
    pub fn get_state(&self, session_id: &str) -> Result<SessionState, DraftError> {
        let handle = self.handle(session_id)?;
        let h = Self::lock_handle(&handle);

        let on_the_clock = (!h.session.status.is_terminal()
            && h.session.current_pick <= h.session.total_picks())
        .then(|| {
            team_for_pick(
                h.session.current_pick,
                h.session.team_count,
                h.session.draft_type,
            )
        });

        let mut available: Vec<&crate::catalog::CatalogPlayer> = self
            .catalog
            .iter()
            .filter(|p| !h.derived.drafted.contains(&p.player_id))
            .filter(|p| {
                !h.session
                    .keepers
                    .iter()
                    .any(|k| k.player_id == p.player_id && k.pick_number >= h.session.current_pick)
            })
            .collect();
        available.sort_by_key(|p| p.adp_rank);

        Ok(SessionState {
            session: h.session.clone(),
            picks: h.derived.picks.clone(),
            on_the_clock,
            available: available.into_iter().map(|p| p.player_id.clone()).collect(),
        })
    }

    /// All known sessions, as saved snapshots.
    pub fn list_sessions(&self) -> Result<Vec<DraftSession>, DraftError> {
        self.store.load_sessions().map_err(DraftError::Storage)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Append to the log and fold into derived state. The optimistic
    /// sequence check happens in the store; on success the in-memory seq
    /// and cache move forward together.
    fn append(
        &self,
        h: &mut SessionHandle,
        payload: EventPayload,
        now: DateTime<Utc>,
    ) -> Result<(), DraftError> {
        let event = self.store.append_event(
            &h.session.session_id,
            h.last_seq,
            &payload,
            &h.session.user_id,
            now,
        )?;
        h.derived.apply(&event.payload);
        h.last_seq = event.seq;
        h.invalidate_cache();
        Ok(())
    }

    /// Commit a validated pick: log it, advance the session, settle any
    /// keeper slots that come next, persist.
    fn commit_pick(
        &self,
        h: &mut SessionHandle,
        pick: DraftPick,
        now: DateTime<Utc>,
    ) -> Result<DraftPick, DraftError> {
        self.append(&mut *h, EventPayload::PickMade { pick: pick.clone() }, now)?;
        info!(
            "Session {}: pick {} team {} takes {} ({})",
            h.session.session_id,
            pick.pick_number,
            pick.team_index,
            pick.player_name,
            pick.position
        );
        if h.session.advance_pick(now) {
            info!("Session {} complete", h.session.session_id);
        } else {
            self.settle_keepers(h, now)?;
        }
        self.store.save_session(&h.session).map_err(DraftError::Storage)?;
        Ok(pick)
    }

    /// Apply keeper assignments for as long as the current pick slot has
    /// one. An unusable keeper (unknown or already-drafted player) is
    /// skipped with a warning and the slot drafts normally.
    fn settle_keepers(&self, h: &mut SessionHandle, now: DateTime<Utc>) -> Result<(), DraftError> {
        while h.session.status == SessionStatus::Active {
            let Some(keeper) = h.session.keeper_at(h.session.current_pick) else {
                break;
            };
            let Some(player) = self.catalog.get(&keeper.player_id) else {
                warn!(
                    "Session {}: keeper at pick {} names unknown player {}; slot drafts normally",
                    h.session.session_id, keeper.pick_number, keeper.player_id
                );
                break;
            };
            if h.derived.drafted.contains(&player.player_id) {
                warn!(
                    "Session {}: keeper {} already on a roster; slot drafts normally",
                    h.session.session_id, player.name
                );
                break;
            }

            let pick_number = h.session.current_pick;
            let (round, pick_in_round) =
                crate::order::round_info(pick_number, h.session.team_count);
            let pick = DraftPick {
                pick_number,
                round,
                pick_in_round,
                team_index: team_for_pick(
                    pick_number,
                    h.session.team_count,
                    h.session.draft_type,
                ),
                player_id: player.player_id.clone(),
                player_name: player.name.clone(),
                position: player.position,
                player_team: player.team.clone(),
                keeper: true,
                at: now,
            };
            self.append(&mut *h, EventPayload::PickMade { pick: pick.clone() }, now)?;
            info!(
                "Session {}: keeper {} settled at pick {}",
                h.session.session_id, pick.player_name, pick_number
            );
            if h.session.advance_pick(now) {
                info!("Session {} complete", h.session.session_id);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
