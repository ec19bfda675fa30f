//! Error types for dcrsynth-core.
//!
//! Every per-table failure in the synthesis engine maps onto one variant of
//! [`CoreError`]. The batch loop records these by [`CoreError::code`] so that
//! summaries stay stable even if messages are reworded.

use thiserror::Error;

/// Result alias used across the core crate.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No usable columns remained after normalization.
    #[error("no usable schema for table {table}")]
    SchemaUnavailable { table: String },

    /// The trimmed name candidate is shorter than the minimum length.
    #[error("resource name '{candidate}' is shorter than {min} characters")]
    NameTooShort { candidate: String, min: usize },

    /// The template document is missing required structure.
    #[error("template structure error: {reason}")]
    TemplateStructure { reason: String },

    /// The canonical "latest" artifact copy could not be written.
    #[error("failed to persist latest artifact for {table}: {reason}")]
    PersistenceFatal { table: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn template(reason: impl Into<String>) -> Self {
        Self::TemplateStructure {
            reason: reason.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SchemaUnavailable { .. } => "schema.unavailable",
            Self::NameTooShort { .. } => "naming.too_short",
            Self::TemplateStructure { .. } => "template.structure",
            Self::PersistenceFatal { .. } => "persist.fatal",
            Self::Serialization(_) => "serialization",
            Self::Invariant(_) => "invariant",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CoreError::SchemaUnavailable {
                table: "Syslog".into()
            }
            .code(),
            "schema.unavailable"
        );
        assert_eq!(CoreError::template("x").code(), "template.structure");
    }

    #[test]
    fn display_includes_context() {
        let e = CoreError::NameTooShort {
            candidate: "ab".into(),
            min: 3,
        };
        assert!(e.to_string().contains("'ab'"));
    }
}
