//! Deployment risk assessment.
//!
//! The single gate between synthesis and automated deployment. A rejected
//! artifact is not an error: it is routed to the manual-deployment list.

use bytesize::ByteSize;

use crate::config::RiskConfig;
use crate::model::{Complexity, RiskAssessment, SynthesizedArtifact};

/// Column-count bucket boundaries (inclusive upper bounds).
pub const LOW_MAX_COLUMNS: usize = 50;
pub const MEDIUM_MAX_COLUMNS: usize = 100;
pub const HIGH_MAX_COLUMNS: usize = 150;

pub fn complexity_for(column_count: usize) -> Complexity {
    if column_count <= LOW_MAX_COLUMNS {
        Complexity::Low
    } else if column_count <= MEDIUM_MAX_COLUMNS {
        Complexity::Medium
    } else if column_count <= HIGH_MAX_COLUMNS {
        Complexity::High
    } else {
        Complexity::VeryHigh
    }
}

/// Score raw measurements. [`assess`] is the artifact-level entry point.
pub fn assess_measurements(column_count: usize, size_bytes: u64, limits: &RiskConfig) -> RiskAssessment {
    let complexity = complexity_for(column_count);

    let mut reasons = Vec::new();
    if size_bytes > limits.size_limit_bytes {
        reasons.push(format!(
            "document size {} exceeds the deployment limit of {}",
            ByteSize::b(size_bytes),
            ByteSize::b(limits.size_limit_bytes)
        ));
    }
    if column_count > limits.column_count_hard_limit {
        reasons.push(format!(
            "{column_count} columns exceeds the hard limit of {}",
            limits.column_count_hard_limit
        ));
    }

    let mut warnings = Vec::new();
    if reasons.is_empty() && size_bytes > limits.size_warning_bytes {
        warnings.push(format!(
            "document size {} is close to the deployment limit of {}",
            ByteSize::b(size_bytes),
            ByteSize::b(limits.size_limit_bytes)
        ));
    }
    if reasons.is_empty() && complexity >= Complexity::High {
        warnings.push(format!(
            "{complexity} complexity ({column_count} columns); validation may be slow"
        ));
    }

    let should_deploy = reasons.is_empty();
    RiskAssessment {
        column_count,
        size_bytes,
        complexity,
        should_deploy,
        manual_deployment_advised: !should_deploy,
        reason: (!should_deploy).then(|| reasons.join("; ")),
        warnings,
    }
}

/// Assess a synthesized artifact against the configured limits.
pub fn assess(artifact: &SynthesizedArtifact, limits: &RiskConfig) -> RiskAssessment {
    assess_measurements(artifact.column_count(), artifact.size_bytes, limits)
}
