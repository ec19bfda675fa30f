//! Constrained resource naming.
//!
//! Names are built as `prefix + tableId + "-" + location [+ "-" + suffix]`.
//! When that exceeds the maximum length the table id is replaced by its entry
//! in the abbreviation table (or its first six characters), and if the result
//! is still too long it is hard-truncated. Separator characters are trimmed
//! from both ends at every exit.
//!
//! Resolution is deterministic: no randomness and no state. Re-runs rely on
//! this to find resources created by an earlier run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::errors::{CoreError, CoreResult};
use crate::model::{ResourceName, MIN_NAME_LEN, NAME_SEPARATORS};

/// Characters kept from a table id that has no abbreviation.
pub const FALLBACK_ABBREVIATION_LEN: usize = 6;

/// Inputs for one name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRequest {
    pub prefix: String,
    pub table_id: String,
    pub location_suffix: String,
    pub optional_suffix: Option<String>,
    pub max_length: usize,
}

impl NameRequest {
    pub fn from_config(cfg: &EngineConfig, table_id: impl Into<String>) -> Self {
        Self {
            prefix: cfg.naming.prefix.clone(),
            table_id: table_id.into(),
            location_suffix: cfg.naming.location.clone(),
            optional_suffix: cfg.naming.suffix.clone().filter(|s| !s.is_empty()),
            max_length: cfg.max_name_length(),
        }
    }

    fn candidate(&self, id: &str) -> String {
        let mut s = format!("{}{}-{}", self.prefix, id, self.location_suffix);
        if let Some(suffix) = &self.optional_suffix {
            s.push('-');
            s.push_str(suffix);
        }
        s
    }
}

/// Short form used for an over-length table id.
pub fn abbreviate<'a>(table_id: &'a str, abbreviations: &'a BTreeMap<String, String>) -> &'a str {
    match abbreviations.get(table_id) {
        Some(short) => short.as_str(),
        None => match table_id.char_indices().nth(FALLBACK_ABBREVIATION_LEN) {
            Some((idx, _)) => &table_id[..idx],
            None => table_id,
        },
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(NAME_SEPARATORS)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Resolve a resource name that fits `req.max_length`.
pub fn resolve_name(
    req: &NameRequest,
    abbreviations: &BTreeMap<String, String>,
) -> CoreResult<ResourceName> {
    if req.max_length < MIN_NAME_LEN {
        return Err(CoreError::invalid_argument(format!(
            "max_length must be at least {MIN_NAME_LEN}, got {}",
            req.max_length
        )));
    }

    let full = req.candidate(&req.table_id);
    if char_len(&full) <= req.max_length {
        return ResourceName::new(trim_separators(&full), req.max_length);
    }

    let short = abbreviate(&req.table_id, abbreviations);
    let abbreviated = req.candidate(short);
    if char_len(&abbreviated) <= req.max_length {
        return ResourceName::new(trim_separators(&abbreviated), req.max_length);
    }

    let truncated: String = abbreviated.chars().take(req.max_length).collect();
    ResourceName::new(trim_separators(&truncated), req.max_length)
}

/// A resolved name shared by more than one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCollision {
    pub name: ResourceName,
    pub tables: Vec<String>,
}

/// Group `(tableId, name)` pairs by name and report every shared name.
pub fn detect_collisions<'a, I>(resolved: I) -> Vec<NameCollision>
where
    I: IntoIterator<Item = (&'a str, &'a ResourceName)>,
{
    let mut by_name: BTreeMap<&ResourceName, Vec<String>> = BTreeMap::new();
    for (table, name) in resolved {
        by_name.entry(name).or_default().push(table.to_string());
    }

    by_name
        .into_iter()
        .filter(|(_, tables)| tables.len() > 1)
        .map(|(name, mut tables)| {
            tables.sort();
            tables.dedup();
            NameCollision {
                name: name.clone(),
                tables,
            }
        })
        .filter(|c| c.tables.len() > 1)
        .collect()
}
