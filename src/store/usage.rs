//! Credit limiter for premium runs: a fixed window of `free_points` per key
//! that resets `duration_secs` after the first consumption.

use crate::config::UsageConfig;
use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatus {
    pub consumed_points: u32,
    pub remaining_points: u32,
    /// Milliseconds until the window resets.
    pub ms_before_next: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("credits exhausted, retry in {retry_after_secs}s")]
    Exhausted { retry_after_secs: i64 },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

struct Window {
    points: u32,
    expire_at: DateTime<Utc>,
}

fn load_window(conn: &Connection, key: &str, now: DateTime<Utc>) -> Result<Option<Window>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT points, expire_at FROM usage WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((points, expire_at)) = row else {
        return Ok(None);
    };
    let expire_at = DateTime::parse_from_rfc3339(&expire_at)
        .map_err(|e| anyhow::anyhow!("Invalid usage expiry for {key}: {e}"))?
        .with_timezone(&Utc);
    if expire_at <= now {
        return Ok(None);
    }
    Ok(Some(Window {
        points: u32::try_from(points).unwrap_or(u32::MAX),
        expire_at,
    }))
}

fn window_end(now: DateTime<Utc>, duration_secs: u64) -> DateTime<Utc> {
    let fallback = Duration::days(3650);
    let ttl = i64::try_from(duration_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(fallback);
    now.checked_add_signed(ttl).unwrap_or(now + fallback)
}

fn status(config: &UsageConfig, window: &Window, now: DateTime<Utc>) -> UsageStatus {
    UsageStatus {
        consumed_points: window.points,
        remaining_points: config.free_points.saturating_sub(window.points),
        ms_before_next: (window.expire_at - now).num_milliseconds().max(0),
    }
}

/// Spend `generation_cost` points for `key`. Rejected spends consume nothing.
pub fn consume(conn: &Connection, config: &UsageConfig, key: &str) -> Result<UsageStatus, UsageError> {
    consume_at(conn, config, key, Utc::now())
}

fn consume_at(
    conn: &Connection,
    config: &UsageConfig,
    key: &str,
    now: DateTime<Utc>,
) -> Result<UsageStatus, UsageError> {
    let window = match load_window(conn, key, now)? {
        Some(w) => w,
        None => Window {
            points: 0,
            expire_at: window_end(now, config.duration_secs),
        },
    };

    let points = window.points.saturating_add(config.generation_cost);
    if points > config.free_points {
        let retry_after_secs = (window.expire_at - now).num_seconds().max(0);
        tracing::info!(key, retry_after_secs, "Usage credits exhausted");
        return Err(UsageError::Exhausted { retry_after_secs });
    }

    conn.execute(
        "INSERT INTO usage (key, points, expire_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
             points = excluded.points,
             expire_at = excluded.expire_at",
        params![
            key,
            i64::from(points),
            window.expire_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        ],
    )
    .map_err(anyhow::Error::from)?;

    Ok(status(
        config,
        &Window {
            points,
            expire_at: window.expire_at,
        },
        now,
    ))
}

/// Current window for `key`; `None` when nothing has been spent in it.
pub fn get_status(conn: &Connection, config: &UsageConfig, key: &str) -> Result<Option<UsageStatus>> {
    let now = Utc::now();
    Ok(load_window(conn, key, now)?.map(|w| status(config, &w, now)))
}
