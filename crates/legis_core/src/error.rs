//! Error types for the reconciliation core

use crate::schema::SourceKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source adapter produced a record that breaks the candidate contract.
    #[error("Invalid record {source_id} from {origin}: {reason}")]
    Contract {
        origin: SourceKind,
        source_id: String,
        reason: String,
    },

    /// Upstream payload could not be turned into a candidate (one record only).
    #[error("Malformed {origin} payload: {reason}")]
    Payload { origin: SourceKind, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync already running for {0}")]
    AlreadyRunning(SourceKind),
}

impl Error {
    /// True for UNIQUE / PRIMARY KEY violations, which a sync pass retries as updates.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    /// Errors that drop a single record but never abort the pass.
    pub fn is_record_scoped(&self) -> bool {
        matches!(self, Error::Contract { .. } | Error::Payload { .. })
    }

    pub(crate) fn contract(
        source: SourceKind,
        source_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Contract {
            origin: source,
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn payload(source: SourceKind, reason: impl Into<String>) -> Self {
        Error::Payload {
            origin: source,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn unique_failure_is_a_constraint_violation() {
        let conn = db::open_in_memory().unwrap();
        let insert = "INSERT INTO tags (name, name_normalized) VALUES ('Zdrowie', 'zdrowie')";
        conn.execute(insert, []).unwrap();

        let err: Error = conn.execute(insert, []).unwrap_err().into();
        assert!(err.is_constraint_violation());
        assert!(!err.is_record_scoped());
    }

    #[test]
    fn other_errors_are_not_retried() {
        let conn = db::open_in_memory().unwrap();
        let err: Error = conn.execute("SELECT * FROM no_such_table", []).unwrap_err().into();
        assert!(!err.is_constraint_violation());
        assert!(!Error::Config("x".into()).is_constraint_violation());
        assert!(Error::payload(SourceKind::Sejm, "bad").is_record_scoped());
    }
}
