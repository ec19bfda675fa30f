//! dcrsynth-core
//!
//! Resource definition synthesis for data collection rules:
//! - Schema normalization into the stream declaration type system
//! - Deterministic, length-constrained resource naming
//! - Template synthesis from one shared, immutable template
//! - Deployment risk scoring
//! - Per-table pipeline and partial-failure batch loop
//!
//! Persistence is behind the [`sink::ArtifactSink`] trait; this crate does no
//! filesystem or network I/O.

pub mod config;
pub mod errors;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod risk;
pub mod sink;
pub mod synthesize;

pub use crate::errors::{CoreError, CoreResult};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::{validate_config, EngineConfig, ProvisioningMode};
    pub use crate::model::{
        ArtifactVersion, ColumnDefinition, Complexity, NormalizedColumn, PersistedArtifact,
        ResourceName, RiskAssessment, SynthesizedArtifact, TargetType,
    };
    pub use crate::naming::{detect_collisions, resolve_name, NameCollision, NameRequest};
    pub use crate::normalize::{normalize, NormalizedSchema};
    pub use crate::pipeline::batch::{BatchOptions, BatchSummary, TableOutcome};
    pub use crate::pipeline::{Engine, Plan, TableInput, TableReport};
    pub use crate::risk::assess;
    pub use crate::sink::{ArtifactSink, DiscardSink};
    pub use crate::synthesize::{synthesize, Template};
    pub use crate::{CoreError, CoreResult};
}
