//! Attached report logs.
//!
//! The tool ships each log as a base64-encoded zlib stream together with the
//! sizes it measured. Attach re-verifies the encoding and the declared sizes
//! before anything hits the database; downloads hand the stored stream back
//! in the same base64+zlib form.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::ZlibDecoder;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;

use panel_core::report::AttachedLog;

use crate::error::{Error, Result};
use crate::store::{Store, now};

/// Metadata for one stored log (no payload).
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Database id.
    pub id: i64,
    /// Owning report.
    pub report_id: i64,
    /// Original filename.
    pub filename: String,
    /// Log timestamp as the tool formatted it.
    pub datetime: String,
    /// Uncompressed size in bytes.
    pub size_original: u64,
    /// Compressed size in bytes.
    pub size_compressed: u64,
    /// When the log was attached.
    pub created_at: String,
}

/// A downloaded log: metadata plus the base64 zlib stream.
#[derive(Debug, Clone, Serialize)]
pub struct LogDownload {
    /// Metadata.
    #[serde(flatten)]
    pub entry: LogEntry,
    /// Base64-encoded zlib stream.
    pub data: String,
}

// Logs are capped well below SQLite's blob limit; a multi-hundred-MB
// "log" is a mistake, not data.
const MAX_COMPRESSED_BYTES: usize = 32 * 1024 * 1024;
const MAX_ORIGINAL_BYTES: u64 = 256 * 1024 * 1024;

fn bad_log(filename: &str, message: impl Into<String>) -> Error {
    Error::BadLog {
        filename: filename.to_string(),
        message: message.into(),
    }
}

/// Decode and verify one attached log, returning the compressed bytes.
fn verify_log(log: &AttachedLog) -> Result<Vec<u8>> {
    if log.filename.trim().is_empty() {
        return Err(bad_log(&log.filename, "filename must not be empty"));
    }
    let compressed = BASE64
        .decode(&log.data)
        .map_err(|e| bad_log(&log.filename, format!("invalid base64: {e}")))?;
    if compressed.len() > MAX_COMPRESSED_BYTES {
        return Err(bad_log(&log.filename, "compressed payload too large"));
    }
    if log.size_compressed != 0 && log.size_compressed != compressed.len() as u64 {
        return Err(bad_log(
            &log.filename,
            format!(
                "declared compressed size {} does not match payload size {}",
                log.size_compressed,
                compressed.len()
            ),
        ));
    }

    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut decompressed = 0u64;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| bad_log(&log.filename, format!("invalid zlib stream: {e}")))?;
        if n == 0 {
            break;
        }
        decompressed += n as u64;
        if decompressed > MAX_ORIGINAL_BYTES {
            return Err(bad_log(&log.filename, "decompressed payload too large"));
        }
    }
    if log.size_original != 0 && log.size_original != decompressed {
        return Err(bad_log(
            &log.filename,
            format!(
                "declared original size {} does not match decompressed size {decompressed}",
                log.size_original
            ),
        ));
    }
    Ok(compressed)
}

/// Deserialize and verify a batch of raw log values. Any bad log fails
/// the whole batch before anything is written.
pub(crate) fn verify_logs(raw_logs: &[Value]) -> Result<Vec<(AttachedLog, Vec<u8>)>> {
    let mut verified = Vec::with_capacity(raw_logs.len());
    for raw in raw_logs {
        let log: AttachedLog = serde_json::from_value(raw.clone())?;
        let compressed = verify_log(&log)?;
        verified.push((log, compressed));
    }
    Ok(verified)
}

/// Insert verified logs for a report. The caller owns the transaction.
pub(crate) fn insert_logs(
    conn: &rusqlite::Connection,
    report_id: i64,
    verified: &[(AttachedLog, Vec<u8>)],
    timestamp: &str,
) -> Result<usize> {
    for (log, compressed) in verified {
        conn.execute(
            "INSERT INTO report_logs
               (report_id, filename, log_datetime, size_original, size_compressed, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                report_id,
                log.filename,
                log.datetime,
                log.size_original as i64,
                compressed.len() as i64,
                compressed,
                timestamp
            ],
        )?;
    }
    Ok(verified.len())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get("id")?,
        report_id: row.get("report_id")?,
        filename: row.get("filename")?,
        datetime: row.get("log_datetime")?,
        size_original: row.get::<_, i64>("size_original")? as u64,
        size_compressed: row.get::<_, i64>("size_compressed")? as u64,
        created_at: row.get("created_at")?,
    })
}

impl Store {
    /// Attach a batch of raw log values to a report, returning how many
    /// were stored. Any bad log fails the whole batch.
    pub fn attach_logs(&self, report_id: i64, raw_logs: &[Value]) -> Result<usize> {
        let verified = verify_logs(raw_logs)?;
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let stored = insert_logs(&tx, report_id, &verified, &now())?;
        tx.commit()?;
        Ok(stored)
    }

    /// Log metadata for a report, in attach order.
    pub fn logs_for_report(&self, report_id: i64) -> Result<Vec<LogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, report_id, filename, log_datetime, size_original, size_compressed, created_at
             FROM report_logs WHERE report_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![report_id], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Download one log as base64 zlib, the same shape the tool uploaded.
    pub fn download_log(&self, log_id: i64) -> Result<LogDownload> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, report_id, filename, log_datetime, size_original, size_compressed,
                    data, created_at
             FROM report_logs WHERE id = ?1",
            params![log_id],
            |row| {
                let entry = row_to_entry(row)?;
                let data: Vec<u8> = row.get("data")?;
                Ok(LogDownload {
                    entry,
                    data: BASE64.encode(data),
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::not_found("log", log_id.to_string()))
    }

    /// Delete one log.
    pub fn delete_log(&self, log_id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM report_logs WHERE id = ?1", params![log_id])?;
        if changed == 0 {
            return Err(Error::not_found("log", log_id.to_string()));
        }
        Ok(())
    }
}
