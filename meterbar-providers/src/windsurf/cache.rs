//! Windsurf local state cache.
//!
//! The IDE keeps the signed-in user's status in its VS Code-style
//! `state.vscdb` under the `windsurfAuthStatus` key. The value is JSON whose
//! `userStatusProtoBinaryBase64` member holds a base64 tagged-record blob;
//! older builds store the base64 text directly.
//!
//! Field layout of the blob, as far as it is needed here:
//!
//! | Path           | Meaning                                 |
//! |----------------|-----------------------------------------|
//! | `3`            | account email                           |
//! | `13.1.2`       | plan name                               |
//! | `13.4`         | prompt credits in the plan (hundredths) |
//! | `13.5`         | prompt credits used (hundredths)        |
//! | `13.9`         | fraction remaining (fixed32 float)      |
//! | `13.10.1`      | plan period end (unix seconds)          |

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, warn};

use meterbar_core::wire::{self, WireMessage};
use meterbar_core::{Candidate, RawValue, UsageModel, keys};

use super::error::WindsurfError;

/// ItemTable key holding the auth status.
pub const AUTH_STATUS_KEY: &str = "windsurfAuthStatus";

const EMAIL: u32 = 3;
const PLAN_STATUS: u32 = 13;
const PLAN_NAME: &[u32] = &[PLAN_STATUS, 1, 2];
const CREDITS_AVAILABLE: &[u32] = &[PLAN_STATUS, 4];
const CREDITS_USED: &[u32] = &[PLAN_STATUS, 5];
const FRACTION_REMAINING: &[u32] = &[PLAN_STATUS, 9];
const PLAN_END: &[u32] = &[PLAN_STATUS, 10, 1];

static COPY_SEQ: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Locating
// ============================================================================

/// Returns the default `state.vscdb` path.
pub fn state_db_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("Windsurf/User/globalStorage/state.vscdb"))
}

// ============================================================================
// Reading
// ============================================================================

/// Reads the raw auth status value from a state database.
///
/// The database is copied to a temporary file first so the running IDE's
/// lock is never contended.
///
/// # Errors
///
/// Returns [`WindsurfError::CacheNotFound`] if `db_path` does not exist and
/// [`WindsurfError::MissingKey`] if nobody is signed in.
#[instrument(skip_all, fields(path = %db_path.display()))]
pub fn read_auth_status(db_path: &Path) -> Result<String, WindsurfError> {
    if !db_path.exists() {
        return Err(WindsurfError::CacheNotFound);
    }

    let seq = COPY_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = std::env::temp_dir().join(format!("meterbar_windsurf_{}_{seq}.db", std::process::id()));
    std::fs::copy(db_path, &temp_path)?;
    let result = query_auth_status(&temp_path);
    if let Err(e) = std::fs::remove_file(&temp_path) {
        warn!(error = %e, "Failed to remove temporary database copy");
    }
    result
}

fn query_auth_status(path: &Path) -> Result<String, WindsurfError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let value: Option<SqlValue> = conn
        .query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            [AUTH_STATUS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(SqlValue::Text(text)) => Ok(text),
        Some(SqlValue::Blob(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        _ => Err(WindsurfError::MissingKey),
    }
}

/// Extracts and decodes the binary user status from the stored value.
///
/// # Errors
///
/// Returns an error for malformed JSON, base64 or framing.
pub fn decode_user_status(stored: &str) -> Result<WireMessage, WindsurfError> {
    let trimmed = stored.trim();
    let encoded = if trimmed.starts_with('{') {
        let json: serde_json::Value = serde_json::from_str(trimmed)?;
        json.get("userStatusProtoBinaryBase64")
            .and_then(serde_json::Value::as_str)
            .ok_or(WindsurfError::MissingKey)?
            .to_string()
    } else {
        trimmed.to_string()
    };

    let bytes = STANDARD.decode(encoded.as_bytes())?;
    debug!(bytes = bytes.len(), "Decoding user status");
    Ok(wire::decode(&bytes)?)
}

// ============================================================================
// Interpreting
// ============================================================================

/// Turns a decoded user status into a candidate.
///
/// Credit counts are preferred; the remaining-fraction float is the fallback
/// for plans that only report a share.
///
/// # Errors
///
/// Returns [`WindsurfError::MissingField`] when neither credits nor the
/// fraction are present.
pub fn candidate_from_status(
    status: &WireMessage,
    priority: i32,
    label: &str,
) -> Result<Candidate, WindsurfError> {
    let usage = usage_from_status(status)?;
    let usage = match plan_end(status)? {
        Some(at) => usage.with_resets_at(at),
        None => usage,
    };

    let mut candidate = Candidate::new(usage, priority, label).with_detail(keys::LOGIN_METHOD, "local_cache");
    if let Some(email) = status.first(EMAIL).and_then(|v| v.as_str()) {
        candidate.email = Some(email.to_string());
    }
    let plan = status.path(PLAN_NAME)?;
    if let Some(plan) = plan.as_ref().and_then(RawValue::as_str) {
        candidate.details.insert(keys::PLAN, plan);
    }
    Ok(candidate)
}

#[allow(clippy::cast_precision_loss)]
fn usage_from_status(status: &WireMessage) -> Result<UsageModel, WindsurfError> {
    let available = status.path(CREDITS_AVAILABLE)?.and_then(|v| v.as_u64());
    let used = status.path(CREDITS_USED)?.and_then(|v| v.as_u64());

    if let (Some(available), Some(used)) = (available, used) {
        if available > 0 {
            let total = available as f64 / 100.0;
            let used = used as f64 / 100.0;
            return Ok(UsageModel::quota(total - used, total, false)?);
        }
    }

    if let Some(fraction) = status.path(FRACTION_REMAINING)?.and_then(|v| v.as_f32()) {
        let remaining = f64::from(fraction.clamp(0.0, 1.0)) * 100.0;
        return Ok(UsageModel::quota(remaining, 100.0, false)?);
    }

    Err(WindsurfError::MissingField {
        path: CREDITS_AVAILABLE.to_vec(),
    })
}

fn plan_end(status: &WireMessage) -> Result<Option<DateTime<Utc>>, WindsurfError> {
    let seconds = status.path(PLAN_END)?.and_then(|v| v.as_u64());
    Ok(seconds
        .and_then(|s| i64::try_from(s).ok())
        .and_then(|s| DateTime::from_timestamp(s, 0)))
}

/// Reads the cache at `db_path` and returns the account's candidate.
///
/// # Errors
///
/// See [`read_auth_status`], [`decode_user_status`] and
/// [`candidate_from_status`].
pub fn read_candidate(db_path: &Path, priority: i32, label: &str) -> Result<Candidate, WindsurfError> {
    let stored = read_auth_status(db_path)?;
    let status = decode_user_status(&stored)?;
    candidate_from_status(&status, priority, label)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn varint(mut v: u64, out: &mut Vec<u8>) {
        while v >= 0x80 {
            out.push((v as u8) | 0x80);
            v >>= 7;
        }
        out.push(v as u8);
    }

    fn key(field: u32, wire_type: u8, out: &mut Vec<u8>) {
        varint((u64::from(field) << 3) | u64::from(wire_type), out);
    }

    fn uint(field: u32, v: u64, out: &mut Vec<u8>) {
        key(field, 0, out);
        varint(v, out);
    }

    fn bytes(field: u32, payload: &[u8], out: &mut Vec<u8>) {
        key(field, 2, out);
        varint(payload.len() as u64, out);
        out.extend_from_slice(payload);
    }

    fn float(field: u32, v: f32, out: &mut Vec<u8>) {
        key(field, 5, out);
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// Encodes a user status blob with credits and/or a remaining fraction.
    pub(crate) fn user_status(credits: Option<(u64, u64)>, fraction: Option<f32>) -> Vec<u8> {
        let mut plan_info = Vec::new();
        bytes(2, b"Pro", &mut plan_info);

        let mut plan_end = Vec::new();
        uint(1, 1_798_761_600, &mut plan_end);

        let mut plan = Vec::new();
        bytes(1, &plan_info, &mut plan);
        if let Some((available, used)) = credits {
            uint(4, available, &mut plan);
            uint(5, used, &mut plan);
        }
        if let Some(fraction) = fraction {
            float(9, fraction, &mut plan);
        }
        bytes(10, &plan_end, &mut plan);
        uint(99, 7, &mut plan);

        let mut root = Vec::new();
        bytes(1, b"Dev", &mut root);
        bytes(EMAIL, b"dev@example.com", &mut root);
        bytes(PLAN_STATUS, &plan, &mut root);
        root
    }

    fn write_db(path: &Path, value: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)")
            .unwrap();
        conn.execute(
            "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
            [AUTH_STATUS_KEY, value],
        )
        .unwrap();
    }

    #[test]
    fn test_credits_reading() {
        let status = wire::decode(&user_status(Some((50_000, 12_500)), Some(0.9))).unwrap();
        let candidate = candidate_from_status(&status, 20, "cache").unwrap();

        assert_eq!(
            candidate.usage,
            UsageModel::quota(375.0, 500.0, false)
                .unwrap()
                .with_resets_at(DateTime::from_timestamp(1_798_761_600, 0).unwrap())
        );
        assert_eq!(candidate.email.as_deref(), Some("dev@example.com"));
        assert_eq!(candidate.details.text(keys::PLAN), Some("Pro"));
    }

    #[test]
    fn test_fraction_fallback() {
        let status = wire::decode(&user_status(None, Some(0.25))).unwrap();
        let candidate = candidate_from_status(&status, 20, "cache").unwrap();
        assert_eq!(candidate.usage.used_percent(), Some(75.0));
    }

    #[test]
    fn test_zero_credits_falls_back_to_fraction() {
        let status = wire::decode(&user_status(Some((0, 0)), Some(1.0))).unwrap();
        let candidate = candidate_from_status(&status, 20, "cache").unwrap();
        assert_eq!(candidate.usage.used_percent(), Some(0.0));
    }

    #[test]
    fn test_missing_usage_fields() {
        let status = wire::decode(&user_status(None, None)).unwrap();
        let err = candidate_from_status(&status, 20, "cache").unwrap_err();
        assert!(matches!(err, WindsurfError::MissingField { ref path } if path == &[13, 4]));
    }

    #[test]
    fn test_decode_json_wrapper_and_raw_base64() {
        let blob = STANDARD.encode(user_status(Some((100, 50)), None));
        let wrapped = format!(r#"{{"userStatusProtoBinaryBase64": "{blob}"}}"#);

        assert_eq!(decode_user_status(&wrapped).unwrap(), decode_user_status(&blob).unwrap());
    }

    #[test]
    fn test_decode_truncated_blob() {
        let mut raw = user_status(Some((100, 50)), None);
        raw.truncate(raw.len() - 3);
        let err = decode_user_status(&STANDARD.encode(raw)).unwrap_err();
        assert!(matches!(err, WindsurfError::Wire(_)));
    }

    #[test]
    fn test_decode_bad_base64() {
        assert!(matches!(
            decode_user_status("!!not base64!!"),
            Err(WindsurfError::Base64(_))
        ));
    }

    #[test]
    fn test_read_from_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        let blob = STANDARD.encode(user_status(Some((1_000, 250)), None));
        write_db(&db, &format!(r#"{{"userStatusProtoBinaryBase64":"{blob}"}}"#));

        let candidate = read_candidate(&db, 20, "local:state.vscdb").unwrap();
        assert_eq!(candidate.usage.used_percent(), Some(25.0));
        assert_eq!(candidate.source_labels, vec!["local:state.vscdb".to_string()]);
    }

    #[test]
    fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_auth_status(&dir.path().join("absent.vscdb")).unwrap_err();
        assert!(matches!(err, WindsurfError::CacheNotFound));
    }

    #[test]
    fn test_signed_out_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE ItemTable (key TEXT, value BLOB)").unwrap();
        drop(conn);

        assert!(matches!(read_auth_status(&db), Err(WindsurfError::MissingKey)));
    }
}
