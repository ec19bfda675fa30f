//! Configuration structures for dcrsynth-core.
//!
//! This module defines explicit, serializable configuration objects used by
//! the CLI to control naming, normalization, risk thresholds, retention and
//! template handling.
//!
//! The core crate itself does not read files or environment variables. Hosts
//! deserialize an [`EngineConfig`] (every field has a default), apply their own
//! overrides and pass the result in.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::model::MIN_NAME_LEN;

/// Global configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub template: TemplateConfig,
}

impl EngineConfig {
    /// Effective maximum name length: the explicit override, or the mode default.
    pub fn max_name_length(&self) -> usize {
        self.naming
            .max_length
            .unwrap_or_else(|| self.template.mode.default_max_name_length())
    }
}

/// Provisioning mode. Selects the template variant and the name length limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningMode {
    /// Rule ingests directly, no auxiliary endpoint resource.
    #[default]
    Direct,
    /// Rule is bound to a separately provisioned endpoint resource.
    WithEndpoint,
}

impl ProvisioningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::WithEndpoint => "with-endpoint",
        }
    }

    pub fn default_max_name_length(&self) -> usize {
        match self {
            Self::Direct => 30,
            Self::WithEndpoint => 64,
        }
    }
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningMode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "with-endpoint" | "dce" | "endpoint" => Ok(Self::WithEndpoint),
            other => Err(CoreError::invalid_argument(format!(
                "unknown provisioning mode: {other}"
            ))),
        }
    }
}

/// Naming resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "NamingConfig::default_prefix")]
    pub prefix: String,

    /// Location string, used both as the name suffix and the location default.
    #[serde(default = "NamingConfig::default_location")]
    pub location: String,

    /// Optional trailing name component (environment tag, etc).
    #[serde(default)]
    pub suffix: Option<String>,

    /// Overrides the mode-dependent maximum.
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Short forms for well-known table ids, used when a name is over length.
    #[serde(default = "NamingConfig::default_abbreviations")]
    pub abbreviations: BTreeMap<String, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            location: Self::default_location(),
            suffix: None,
            max_length: None,
            abbreviations: Self::default_abbreviations(),
        }
    }
}

impl NamingConfig {
    fn default_prefix() -> String {
        "dcr-".to_string()
    }

    fn default_location() -> String {
        "eastus".to_string()
    }

    pub fn default_abbreviations() -> BTreeMap<String, String> {
        [
            ("CommonSecurityLog", "CSL"),
            ("SecurityEvent", "SecEvt"),
            ("WindowsEvent", "WinEvt"),
            ("ASimAuditEventLogs", "AsimAud"),
            ("ASimAuthenticationEventLogs", "AsimAuth"),
            ("ASimDnsActivityLogs", "AsimDns"),
            ("ASimFileEventLogs", "AsimFile"),
            ("ASimNetworkSessionLogs", "AsimNet"),
            ("ASimProcessEventLogs", "AsimProc"),
            ("ASimWebSessionLogs", "AsimWeb"),
            ("DeviceNetworkEvents", "DevNet"),
            ("DeviceProcessEvents", "DevProc"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}

/// Schema normalizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    /// Platform-managed columns that must never be declared in a stream.
    #[serde(default = "NormalizationConfig::default_exclude_columns")]
    pub exclude_columns: BTreeSet<String>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            exclude_columns: Self::default_exclude_columns(),
        }
    }
}

impl NormalizationConfig {
    pub fn default_exclude_columns() -> BTreeSet<String> {
        [
            "TenantId",
            "Type",
            "SourceSystem",
            "MG",
            "ManagementGroupName",
            "_ResourceId",
            "_SubscriptionId",
            "_ItemId",
            "_BilledSize",
            "_IsBillable",
            "_TimeReceived",
            "_Internal_WorkspaceResourceId",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

/// Deployment risk thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Deployment payload ceiling.
    #[serde(default = "RiskConfig::default_size_limit_bytes")]
    pub size_limit_bytes: u64,

    /// Above this size the artifact is still deployable but flagged.
    #[serde(default = "RiskConfig::default_size_warning_bytes")]
    pub size_warning_bytes: u64,

    #[serde(default = "RiskConfig::default_column_count_hard_limit")]
    pub column_count_hard_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            size_limit_bytes: Self::default_size_limit_bytes(),
            size_warning_bytes: Self::default_size_warning_bytes(),
            column_count_hard_limit: Self::default_column_count_hard_limit(),
        }
    }
}

impl RiskConfig {
    fn default_size_limit_bytes() -> u64 {
        4_000_000
    }
    fn default_size_warning_bytes() -> u64 {
        3_000_000
    }
    fn default_column_count_hard_limit() -> usize {
        300
    }
}

/// Artifact retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Number of timestamped versions kept per table.
    #[serde(default = "RetentionConfig::default_keep")]
    pub keep: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: Self::default_keep(),
        }
    }
}

impl RetentionConfig {
    fn default_keep() -> usize {
        5
    }
}

/// Template handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub mode: ProvisioningMode,

    /// Blank out external resource references so the artifact deploys standalone.
    #[serde(default)]
    pub detached: bool,

    /// Write `_CL` tables to `Custom-<id>` instead of `Microsoft-<id>`.
    #[serde(default)]
    pub custom_table_output: bool,

    #[serde(default)]
    pub parameters: TemplateParameters,
}

/// Names of the template parameters the synthesizer reads or rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParameters {
    #[serde(default = "TemplateParameters::default_resource_name")]
    pub resource_name: String,
    #[serde(default = "TemplateParameters::default_location")]
    pub location: String,
    /// Resolved to a literal and removed.
    #[serde(default = "TemplateParameters::default_table_name")]
    pub table_name: String,
    /// Resolved to a literal and removed.
    #[serde(default = "TemplateParameters::default_columns")]
    pub columns: String,
    /// External resource references blanked in detached mode.
    #[serde(default = "TemplateParameters::default_references")]
    pub references: Vec<String>,
}

impl Default for TemplateParameters {
    fn default() -> Self {
        Self {
            resource_name: Self::default_resource_name(),
            location: Self::default_location(),
            table_name: Self::default_table_name(),
            columns: Self::default_columns(),
            references: Self::default_references(),
        }
    }
}

impl TemplateParameters {
    fn default_resource_name() -> String {
        "dataCollectionRuleName".to_string()
    }
    fn default_location() -> String {
        "location".to_string()
    }
    fn default_table_name() -> String {
        "tableName".to_string()
    }
    fn default_columns() -> String {
        "columns".to_string()
    }
    fn default_references() -> Vec<String> {
        vec![
            "workspaceResourceId".to_string(),
            "endpointResourceId".to_string(),
        ]
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &EngineConfig) -> CoreResult<()> {
    if cfg.max_name_length() < MIN_NAME_LEN {
        return Err(CoreError::invalid_argument(format!(
            "max name length must be at least {MIN_NAME_LEN}"
        )));
    }

    if cfg.risk.size_limit_bytes == 0 {
        return Err(CoreError::invalid_argument(
            "size_limit_bytes must be greater than zero",
        ));
    }

    if cfg.risk.size_warning_bytes > cfg.risk.size_limit_bytes {
        return Err(CoreError::invalid_argument(
            "size_warning_bytes must not exceed size_limit_bytes",
        ));
    }

    if cfg.risk.column_count_hard_limit == 0 {
        return Err(CoreError::invalid_argument(
            "column_count_hard_limit must be greater than zero",
        ));
    }

    let p = &cfg.template.parameters;
    let names = [&p.resource_name, &p.location, &p.table_name, &p.columns];
    if names.iter().any(|n| n.trim().is_empty()) || p.references.iter().any(|n| n.trim().is_empty())
    {
        return Err(CoreError::invalid_argument(
            "template parameter names must not be empty",
        ));
    }

    if cfg.naming.location.trim().is_empty() {
        return Err(CoreError::invalid_argument("location must not be empty"));
    }

    Ok(())
}
