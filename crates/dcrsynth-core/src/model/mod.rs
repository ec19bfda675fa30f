//! dcrsynth data models.
//!
//! Plain serde-friendly values that flow between the engine stages:
//! - [`ColumnDefinition`] comes from an external schema source
//! - [`NormalizedColumn`] is what the normalizer keeps
//! - [`ResourceName`] is the validated output of the naming resolver
//! - [`SynthesizedArtifact`] is the deployment-ready document for one table
//! - [`RiskAssessment`] is the deploy/manual decision for that artifact
//! - [`ArtifactVersion`] describes one persisted copy of an artifact
//!
//! Models carry no policy beyond the invariants of their constructors. All of
//! them are owned by the generation run that creates them.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CoreError, CoreResult};

/// Minimum length of any resolved resource name.
pub const MIN_NAME_LEN: usize = 3;

/// Characters trimmed from both ends of a resource name.
pub const NAME_SEPARATORS: &[char] = &['-', '_', '.'];

/// A raw column as reported by a schema source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type", alias = "sourceType")]
    pub source_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
        }
    }
}

/// Column types accepted by a data collection rule stream declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    String,
    Int,
    Long,
    Real,
    Boolean,
    Datetime,
    Dynamic,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column that survived filtering, in the shape a stream declaration expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: TargetType,
}

/// A validated resource name.
///
/// Invariants: `MIN_NAME_LEN <= len <= max_len` (in characters) and no leading
/// or trailing separator characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Validate `value` against the name invariants.
    pub fn new(value: impl Into<String>, max_len: usize) -> CoreResult<Self> {
        let value = value.into();
        let len = value.chars().count();
        if len < MIN_NAME_LEN {
            return Err(CoreError::NameTooShort {
                candidate: value,
                min: MIN_NAME_LEN,
            });
        }
        if len > max_len {
            return Err(CoreError::invariant(format!(
                "resource name '{value}' exceeds {max_len} characters"
            )));
        }
        if value.starts_with(NAME_SEPARATORS) || value.ends_with(NAME_SEPARATORS) {
            return Err(CoreError::invariant(format!(
                "resource name '{value}' has a leading or trailing separator"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The fully assembled resource definition for one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedArtifact {
    pub table_id: String,
    pub resource_name: ResourceName,
    pub columns: Vec<NormalizedColumn>,
    pub stream_input_name: String,
    pub stream_output_name: String,
    pub raw_document: Value,
    /// Size of the pretty-printed document, which is exactly what gets persisted.
    pub size_bytes: u64,
}

impl SynthesizedArtifact {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Complexity bucket derived from column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "VeryHigh",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub column_count: usize,
    pub size_bytes: u64,
    pub complexity: Complexity,
    pub should_deploy: bool,
    pub manual_deployment_advised: bool,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

/// One persisted copy of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub table_id: String,
    /// Creation timestamp, or `"latest"` for the canonical copy.
    pub timestamp: String,
    pub path: PathBuf,
    pub is_latest: bool,
    pub size_bytes: u64,
    pub sha256: Option<String>,
}

/// Outcome of persisting one artifact: the canonical copy plus the audit copy
/// when it could be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedArtifact {
    pub latest: ArtifactVersion,
    pub timestamped: Option<ArtifactVersion>,
    pub warnings: Vec<String>,
}
