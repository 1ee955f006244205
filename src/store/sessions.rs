use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{de::DeserializeOwned, Serialize};

use super::helpers::{known_dimension, parse_datetime, to_u32, to_u64};
use crate::models::{
    Frame, NavigationEvent, ScrollEvent, Session, SessionSummary, TapEvent, UploadBatch,
};

const KIND_TAP: &str = "tap";
const KIND_SCROLL: &str = "scroll";
const KIND_NAVIGATION: &str = "navigation";

fn row_to_summary(row: &Row) -> Result<SessionSummary> {
    let updated_at: String = row.get("updated_at")?;

    Ok(SessionSummary {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        device: row.get("device")?,
        app_version: row.get("app_version")?,
        frame_count: to_u64(row.get("frame_count")?, "frame_count")?,
        tap_count: to_u64(row.get("tap_count")?, "tap_count")?,
        scroll_count: to_u64(row.get("scroll_count")?, "scroll_count")?,
        navigation_count: to_u64(row.get("navigation_count")?, "navigation_count")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_session(row: &Row) -> Result<Session> {
    let device_width: Option<i64> = row.get("device_width")?;
    let device_height: Option<i64> = row.get("device_height")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Session {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        device: row.get("device")?,
        app_version: row.get("app_version")?,
        device_width: device_width
            .map(|w| to_u32(w, "device_width"))
            .transpose()?,
        device_height: device_height
            .map(|h| to_u32(h, "device_height"))
            .transpose()?,
        frames: Vec::new(),
        taps: Vec::new(),
        scrolls: Vec::new(),
        navigations: Vec::new(),
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

/// Creates the session row or refreshes it. Known dimensions are only
/// replaced by other known dimensions.
fn upsert_session(tx: &Transaction<'_>, batch: &UploadBatch, now: &str) -> Result<()> {
    tx.execute(
        "INSERT INTO sessions (id, user_id, device, app_version, device_width, device_height, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(id) DO UPDATE SET
             user_id = excluded.user_id,
             device = excluded.device,
             app_version = excluded.app_version,
             device_width = COALESCE(excluded.device_width, sessions.device_width),
             device_height = COALESCE(excluded.device_height, sessions.device_height),
             updated_at = excluded.updated_at",
        params![
            batch.session_id,
            batch.user_id,
            batch.device,
            batch.app_version,
            known_dimension(batch.device_width),
            known_dimension(batch.device_height),
            now,
        ],
    )
    .context("failed to upsert session")?;
    Ok(())
}

fn append_events<T: Serialize>(
    tx: &Transaction<'_>,
    session_id: &str,
    kind: &str,
    events: &[T],
    timestamp_of: impl Fn(&T) -> Option<i64>,
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO events (session_id, kind, timestamp, payload_json)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for event in events {
        let payload = serde_json::to_string(event)
            .with_context(|| format!("failed to serialize {kind} event"))?;
        stmt.execute(params![session_id, kind, timestamp_of(event), payload])?;
    }
    Ok(())
}

fn load_events<T: DeserializeOwned>(conn: &Connection, session_id: &str, kind: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(
        "SELECT payload_json FROM events
         WHERE session_id = ?1 AND kind = ?2
         ORDER BY id ASC",
    )?;

    let mut rows = stmt.query(params![session_id, kind])?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        let payload: String = row.get(0)?;
        events.push(
            serde_json::from_str(&payload)
                .with_context(|| format!("failed to parse stored {kind} event"))?,
        );
    }
    Ok(events)
}

fn load_frames(conn: &Connection, session_id: &str) -> Result<Vec<Frame>> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, image FROM frames
         WHERE session_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let frames = stmt
        .query_map(params![session_id], |row| {
            Ok(Frame {
                timestamp: row.get(0)?,
                image: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(frames)
}

/// Upserts the session row and appends the batch contents in one transaction.
pub(super) fn ingest(conn: &mut Connection, batch: &UploadBatch) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    upsert_session(&tx, batch, &now)?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO frames (session_id, timestamp, image) VALUES (?1, ?2, ?3)")?;
        for frame in &batch.frames {
            stmt.execute(params![batch.session_id, frame.timestamp, frame.image])?;
        }
    }
    append_events(&tx, &batch.session_id, KIND_TAP, &batch.taps, |t: &TapEvent| {
        t.timestamp
    })?;
    append_events(&tx, &batch.session_id, KIND_SCROLL, &batch.scrolls, |s: &ScrollEvent| {
        s.timestamp
    })?;
    append_events(
        &tx,
        &batch.session_id,
        KIND_NAVIGATION,
        &batch.navigations,
        |n: &NavigationEvent| n.timestamp,
    )?;

    tx.commit().context("failed to commit ingested batch")?;
    Ok(())
}

pub(super) fn summaries(conn: &Connection) -> Result<Vec<SessionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, s.device, s.app_version, s.updated_at,
                (SELECT COUNT(*) FROM frames f WHERE f.session_id = s.id) AS frame_count,
                (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id AND e.kind = 'tap') AS tap_count,
                (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id AND e.kind = 'scroll') AS scroll_count,
                (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id AND e.kind = 'navigation') AS navigation_count
         FROM sessions s
         ORDER BY s.updated_at DESC, s.id ASC",
    )?;

    let mut rows = stmt.query([])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_summary(row)?);
    }
    Ok(sessions)
}

pub(super) fn load(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            "SELECT id, user_id, device, app_version, device_width, device_height, created_at, updated_at
             FROM sessions
             WHERE id = ?1",
            params![session_id],
            |row| Ok(row_to_session(row)),
        )
        .optional()?
        .transpose()?;

    let Some(mut session) = session else {
        return Ok(None);
    };
    session.frames = load_frames(conn, session_id)?;
    session.taps = load_events(conn, session_id, KIND_TAP)?;
    session.scrolls = load_events(conn, session_id, KIND_SCROLL)?;
    session.navigations = load_events(conn, session_id, KIND_NAVIGATION)?;
    Ok(Some(session))
}

/// Frames and events go with the session via `ON DELETE CASCADE`.
pub(super) fn remove(conn: &Connection, session_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(deleted > 0)
}
