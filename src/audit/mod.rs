//! Hash-chained append-only audit log.
//!
//! One JSON record per line. Each record's `entry_hash` covers the
//! canonical form of its own fields plus the previous record's hash, so
//! truncation and in-place edits are both detectable. The file is opened
//! append-only with mode 0600 and never rewritten in place.

pub mod verify;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Non-sensitive facts about one terminal outcome, supplied by the handler.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub request_id: String,
    pub policy_version: String,
    pub action_summary: String,
    pub risk_category: String,
    pub route: String,
}

/// One line of the audit log. Field order here is the serialization order
/// and the canonical hash order; do not reorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub request_id: String,
    pub policy_version: String,
    pub action_summary: String,
    pub risk_category: String,
    pub route: String,
    pub prev_hash: String,
    pub entry_hash: String,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Contract for audit sinks the dispatch handler writes through.
pub trait AuditWriter: Send + Sync {
    fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError>;
}

/// Appends hash-chained records to a newline-delimited JSON file.
///
/// The in-memory `prev_hash` is the chain head. The lock is held across the
/// whole append sequence (hash, write, commit) so concurrent requests
/// serialize at this point; record order in the file is lock-acquisition
/// order, not request-arrival order.
pub struct ChainWriter {
    path: PathBuf,
    prev_hash: Mutex<String>,
}

impl ChainWriter {
    /// Open the log at `path`, adopting the last record's `entry_hash` as
    /// the chain head. Absent or empty file starts a fresh chain.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let prev_hash = load_prev_hash(&path)?;
        Ok(Self {
            path,
            prev_hash: Mutex::new(prev_hash),
        })
    }
}

impl AuditWriter for ChainWriter {
    fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        let mut prev_hash = self
            .prev_hash
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut record = AuditRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            request_id: event.request_id,
            policy_version: event.policy_version,
            action_summary: event.action_summary,
            risk_category: event.risk_category,
            route: event.route,
            prev_hash: prev_hash.clone(),
            entry_hash: String::new(),
        };
        record.entry_hash = entry_hash(&record);

        let line = serde_json::to_string(&record)?;

        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        // Commit the chain head only after the write landed.
        *prev_hash = record.entry_hash.clone();
        Ok(record)
    }
}

/// Canonical JSON payload hashed into `entry_hash`: the six content fields
/// in fixed order, no whitespace, with `prev_hash` concatenated after.
/// Built by hand so the byte layout never depends on serializer settings.
fn canonical_payload(record: &AuditRecord) -> String {
    format!(
        r#"{{"timestamp":{},"request_id":{},"policy_version":{},"action_summary":{},"risk_category":{},"route":{}}}"#,
        json_string(&record.timestamp),
        json_string(&record.request_id),
        json_string(&record.policy_version),
        json_string(&record.action_summary),
        json_string(&record.risk_category),
        json_string(&record.route),
    )
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub(crate) fn entry_hash(record: &AuditRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_payload(record).as_bytes());
    hasher.update(record.prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn load_prev_hash(path: &Path) -> Result<String, AuditError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(err.into()),
    };

    let Some(last_line) = contents.lines().rev().find(|line| !line.trim().is_empty()) else {
        return Ok(String::new());
    };

    let record: AuditRecord = serde_json::from_str(last_line.trim())?;
    Ok(record.entry_hash)
}
