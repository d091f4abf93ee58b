// SQLite persistence layer for sessions and their event logs.
//
// The events table is the source of truth: appends go through a
// transaction that checks the caller's expected sequence number against
// MAX(seq), which is what turns a lost-update race into a clean
// ConcurrentModification rejection. The picks table is a queryable
// projection maintained inside the same transaction.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::DraftError;
use crate::events::{DraftEvent, DraftPick, EventPayload};
use crate::order::DraftType;
use crate::roster::Position;
use crate::session::{DraftSession, KeeperPick, SessionStatus};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                session_id          TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL,
                league_id           TEXT,
                draft_type          TEXT NOT NULL,
                team_count          INTEGER NOT NULL,
                round_count         INTEGER NOT NULL,
                user_draft_position INTEGER NOT NULL,
                current_pick        INTEGER NOT NULL,
                status              TEXT NOT NULL,
                roster_config       TEXT NOT NULL,
                scoring_format      TEXT NOT NULL,
                timer_seconds       INTEGER NOT NULL,
                pick_deadline       TEXT,
                keepers             TEXT NOT NULL,
                started_at          TEXT,
                completed_at        TEXT,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                seq        INTEGER NOT NULL,
                kind       TEXT NOT NULL,
                payload    TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                at         TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            );

            CREATE TABLE IF NOT EXISTS picks (
                session_id    TEXT NOT NULL REFERENCES sessions(session_id),
                pick_number   INTEGER NOT NULL,
                round         INTEGER NOT NULL,
                pick_in_round INTEGER NOT NULL,
                team_index    INTEGER NOT NULL,
                player_id     TEXT NOT NULL,
                player_name   TEXT NOT NULL,
                position      TEXT NOT NULL,
                player_team   TEXT NOT NULL,
                keeper        INTEGER NOT NULL,
                at            TEXT NOT NULL,
                PRIMARY KEY (session_id, pick_number)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Persist a session snapshot. Uses INSERT OR REPLACE so repeated saves
    /// overwrite the previous row.
    pub fn save_session(&self, session: &DraftSession) -> Result<()> {
        let conn = self.conn();
        let roster_config = serde_json::to_string(&session.roster_config)
            .context("failed to serialize roster config")?;
        let keepers = serde_json::to_string(&session.keepers)
            .context("failed to serialize keepers")?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions
                (session_id, user_id, league_id, draft_type, team_count, round_count,
                 user_draft_position, current_pick, status, roster_config, scoring_format,
                 timer_seconds, pick_deadline, keepers, started_at, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                session.session_id,
                session.user_id,
                session.league_id,
                session.draft_type.as_str(),
                session.team_count,
                session.round_count,
                session.user_draft_position,
                session.current_pick,
                session.status.as_str(),
                roster_config,
                session.scoring_format,
                session.timer_seconds,
                session.pick_deadline.map(|d| d.to_rfc3339()),
                keepers,
                session.started_at.map(|d| d.to_rfc3339()),
                session.completed_at.map(|d| d.to_rfc3339()),
                session.created_at.to_rfc3339(),
            ],
        )
        .context("failed to save session")?;
        Ok(())
    }

    /// Load a single session by id. Returns `None` if it does not exist.
    pub fn load_session(&self, session_id: &str) -> Result<Option<DraftSession>> {
        let sessions = self.load_sessions_where("WHERE session_id = ?1", &[&session_id])?;
        Ok(sessions.into_iter().next())
    }

    /// Load every persisted session, newest first.
    pub fn load_sessions(&self) -> Result<Vec<DraftSession>> {
        self.load_sessions_where("ORDER BY created_at DESC", &[])
    }

    fn load_sessions_where(
        &self,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<DraftSession>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT session_id, user_id, league_id, draft_type, team_count, round_count,
                    user_draft_position, current_pick, status, roster_config, scoring_format,
                    timer_seconds, pick_deadline, keepers, started_at, completed_at, created_at
             FROM sessions {clause}"
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare session query")?;

        struct Row {
            session_id: String,
            user_id: String,
            league_id: Option<String>,
            draft_type: String,
            team_count: u32,
            round_count: u32,
            user_draft_position: u32,
            current_pick: u32,
            status: String,
            roster_config: String,
            scoring_format: String,
            timer_seconds: u32,
            pick_deadline: Option<String>,
            keepers: String,
            started_at: Option<String>,
            completed_at: Option<String>,
            created_at: String,
        }

        let rows = stmt
            .query_map(args, |row| {
                Ok(Row {
                    session_id: row.get(0)?,
                    user_id: row.get(1)?,
                    league_id: row.get(2)?,
                    draft_type: row.get(3)?,
                    team_count: row.get(4)?,
                    round_count: row.get(5)?,
                    user_draft_position: row.get(6)?,
                    current_pick: row.get(7)?,
                    status: row.get(8)?,
                    roster_config: row.get(9)?,
                    scoring_format: row.get(10)?,
                    timer_seconds: row.get(11)?,
                    pick_deadline: row.get(12)?,
                    keepers: row.get(13)?,
                    started_at: row.get(14)?,
                    completed_at: row.get(15)?,
                    created_at: row.get(16)?,
                })
            })
            .context("failed to query sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map session rows")?;

        rows.into_iter()
            .map(|r| {
                let keepers: Vec<KeeperPick> = serde_json::from_str(&r.keepers)
                    .context("failed to deserialize keepers")?;
                Ok(DraftSession {
                    session_id: r.session_id,
                    user_id: r.user_id,
                    league_id: r.league_id,
                    draft_type: DraftType::from_str_type(&r.draft_type)
                        .ok_or_else(|| anyhow!("unknown draft type `{}`", r.draft_type))?,
                    team_count: r.team_count,
                    round_count: r.round_count,
                    user_draft_position: r.user_draft_position,
                    current_pick: r.current_pick,
                    status: SessionStatus::from_str_status(&r.status)
                        .ok_or_else(|| anyhow!("unknown session status `{}`", r.status))?,
                    roster_config: serde_json::from_str(&r.roster_config)
                        .context("failed to deserialize roster config")?,
                    scoring_format: r.scoring_format,
                    timer_seconds: r.timer_seconds,
                    pick_deadline: parse_opt_ts(r.pick_deadline.as_deref())?,
                    keepers,
                    started_at: parse_opt_ts(r.started_at.as_deref())?,
                    completed_at: parse_opt_ts(r.completed_at.as_deref())?,
                    created_at: parse_ts(&r.created_at)?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Event log
    // ------------------------------------------------------------------

    /// Append one event to a session's log.
    ///
    /// `expected_seq` must equal the current highest sequence number (0 for
    /// an empty log); a mismatch means another writer got there first and
    /// the whole append is rejected without side effects. PICK_MADE and
    /// PICK_UNDONE update the picks projection in the same transaction.
    pub fn append_event(
        &self,
        session_id: &str,
        expected_seq: u64,
        payload: &EventPayload,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> std::result::Result<DraftEvent, DraftError> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin append transaction")?;

        let actual: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM events WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .context("failed to read event log head")?;
        let actual = actual as u64;
        if actual != expected_seq {
            return Err(DraftError::ConcurrentModification {
                expected: expected_seq,
                actual,
            });
        }
        let seq = actual + 1;

        let payload_json =
            serde_json::to_string(payload).context("failed to serialize event payload")?;
        tx.execute(
            "INSERT INTO events (session_id, seq, kind, payload, user_id, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                seq,
                payload.kind(),
                payload_json,
                user_id,
                at.to_rfc3339()
            ],
        )
        .context("failed to append event")?;

        match payload {
            EventPayload::PickMade { pick } => {
                tx.execute(
                    "INSERT INTO picks
                        (session_id, pick_number, round, pick_in_round, team_index,
                         player_id, player_name, position, player_team, keeper, at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        session_id,
                        pick.pick_number,
                        pick.round,
                        pick.pick_in_round,
                        pick.team_index,
                        pick.player_id,
                        pick.player_name,
                        pick.position.display_str(),
                        pick.player_team,
                        pick.keeper,
                        pick.at.to_rfc3339(),
                    ],
                )
                .context("failed to project pick")?;
            }
            EventPayload::PickUndone { pick_number, .. } => {
                tx.execute(
                    "DELETE FROM picks WHERE session_id = ?1 AND pick_number = ?2",
                    params![session_id, pick_number],
                )
                .context("failed to remove undone pick projection")?;
            }
            _ => {}
        }

        tx.commit().context("failed to commit event append")?;
        Ok(DraftEvent {
            seq,
            payload: payload.clone(),
            user_id: user_id.to_string(),
            at,
        })
    }

    /// Load a session's full event log in sequence order.
    pub fn load_events(&self, session_id: &str) -> Result<Vec<DraftEvent>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT seq, payload, user_id, at FROM events
                 WHERE session_id = ?1 ORDER BY seq",
            )
            .context("failed to prepare load_events query")?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("failed to query events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map event rows")?;

        rows.into_iter()
            .map(|(seq, payload_json, user_id, at)| {
                Ok(DraftEvent {
                    seq: seq as u64,
                    payload: serde_json::from_str(&payload_json)
                        .context("failed to deserialize event payload")?,
                    user_id,
                    at: parse_ts(&at)?,
                })
            })
            .collect()
    }

    /// The highest sequence number in a session's log (0 if empty).
    pub fn last_seq(&self, session_id: &str) -> Result<u64> {
        let conn = self.conn();
        let seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM events WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .context("failed to read last seq")?;
        Ok(seq as u64)
    }

    /// Load the standing picks projection for a session, ordered by pick
    /// number.
    pub fn load_picks(&self, session_id: &str) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT pick_number, round, pick_in_round, team_index, player_id,
                        player_name, position, player_team, keeper, at
                 FROM picks WHERE session_id = ?1 ORDER BY pick_number",
            )
            .context("failed to prepare load_picks query")?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, bool>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })
            .context("failed to query picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick rows")?;

        rows.into_iter()
            .map(
                |(pick_number, round, pick_in_round, team_index, player_id, player_name, position, player_team, keeper, at)| {
                    Ok(DraftPick {
                        pick_number,
                        round,
                        pick_in_round,
                        team_index,
                        player_id,
                        player_name,
                        position: Position::from_str_pos(&position)
                            .ok_or_else(|| anyhow!("unknown position `{position}`"))?,
                        player_team,
                        keeper,
                        at: parse_ts(&at)?,
                    })
                },
            )
            .collect()
    }

    /// Log a one-line summary of what is in the database, for startup
    /// diagnostics.
    pub fn log_summary(&self) -> Result<()> {
        let conn = self.conn();
        let sessions: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .context("failed to count sessions")?;
        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .context("failed to count events")?;
        info!("Store opened: {sessions} sessions, {events} events");
        Ok(())
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp `{s}`"))
}

fn parse_opt_ts(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
