//! Audit chain verification.
//!
//! Streams the log from the beginning and re-derives the expected hash
//! chain. The first divergence is reported with its 1-based line number;
//! an absent file verifies trivially.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use super::{entry_hash, AuditRecord};

/// How a line failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    BadPrevHash,
    BadEntryHash,
    Malformed,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::BadPrevHash => "bad_prev_hash",
            ViolationKind::BadEntryHash => "bad_entry_hash",
            ViolationKind::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("audit chain violation at line {line}: {}", .kind.as_str())]
    Violation { line: usize, kind: ViolationKind },

    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Walk the chain at `path`, failing on the first bad line.
pub fn verify_chain(path: impl AsRef<Path>) -> Result<(), VerifyError> {
    let file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    let reader = BufReader::new(file);
    let mut prev = String::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: AuditRecord = serde_json::from_str(trimmed).map_err(|_| {
            VerifyError::Violation {
                line: line_number,
                kind: ViolationKind::Malformed,
            }
        })?;

        if record.prev_hash != prev {
            return Err(VerifyError::Violation {
                line: line_number,
                kind: ViolationKind::BadPrevHash,
            });
        }

        if record.entry_hash != entry_hash(&record) {
            return Err(VerifyError::Violation {
                line: line_number,
                kind: ViolationKind::BadEntryHash,
            });
        }

        prev = record.entry_hash;
    }

    Ok(())
}
