use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoadmapError {
    /// Malformed request: missing or unparseable ids, empty text, bad status.
    #[error("Input error: {0}")]
    InputError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// No caller identity could be resolved.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Not allowed: {0}")]
    NotAllowed(String),
    /// A store operation failed. Covers busy/locked databases, I/O failures and
    /// constraint violations; the driver error is kept as the source.
    #[error("Conflict in {op}: {source}")]
    Conflict {
        op: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<rusqlite::Error> for RoadmapError {
    fn from(source: rusqlite::Error) -> Self {
        RoadmapError::Conflict {
            op: "store".to_string(),
            source,
        }
    }
}

impl RoadmapError {
    /// Tags a store conflict with the operation that produced it.
    pub fn in_op(self, op: &str) -> Self {
        match self {
            RoadmapError::Conflict { source, .. } => RoadmapError::Conflict {
                op: op.to_string(),
                source,
            },
            other => other,
        }
    }

    /// Stable machine-readable error kind used in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RoadmapError::InputError(_) => "input_error",
            RoadmapError::NotFound(_) => "not_found",
            RoadmapError::Unauthenticated(_) => "unauthenticated",
            RoadmapError::NotAllowed(_) => "not_allowed",
            RoadmapError::Conflict { .. } => "conflict",
            RoadmapError::IoError(_) | RoadmapError::JsonError(_) => "internal",
            RoadmapError::ConfigError(_) => "config_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            RoadmapError::InputError(_) => 400,
            RoadmapError::Unauthenticated(_) => 401,
            RoadmapError::NotAllowed(_) => 403,
            RoadmapError::NotFound(_) => 404,
            RoadmapError::Conflict { .. } => 409,
            RoadmapError::IoError(_)
            | RoadmapError::JsonError(_)
            | RoadmapError::ConfigError(_) => 500,
        }
    }

    /// True when the store rejected a write because of a UNIQUE/CHECK/FK constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            RoadmapError::Conflict {
                source: rusqlite::Error::SqliteFailure(err, _),
                ..
            } if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
