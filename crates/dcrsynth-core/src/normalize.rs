//! Schema normalization.
//!
//! Maps raw source columns onto the stream declaration type system.
//!
//! Rules:
//! - columns named in the exclude set are dropped (exact, case-sensitive match)
//! - unique-identifier columns (`guid`, `uniqueidentifier`, `uuid`) are dropped
//! - columns with a blank name are dropped
//! - type lookup is case-insensitive; unknown types become `string` and produce
//!   a [`NormalizeWarning`]
//!
//! This is a pure function. It never fails; an empty result means the table has
//! no usable schema and the caller decides what that implies.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{ColumnDefinition, NormalizedColumn, TargetType};

/// Source types that are removed rather than down-converted.
pub const IDENTIFIER_TYPES: &[&str] = &["guid", "uniqueidentifier", "uuid"];

/// Non-fatal advisory produced while normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeWarning {
    pub column: String,
    pub source_type: String,
    pub message: String,
}

/// Normalized columns plus warnings, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedSchema {
    pub columns: Vec<NormalizedColumn>,
    pub warnings: Vec<NormalizeWarning>,
    /// Names of the columns that were filtered out.
    pub dropped: Vec<String>,
}

impl NormalizedSchema {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Look up a source type. Returns `None` when the type is not recognized.
pub fn map_source_type(source_type: &str) -> Option<TargetType> {
    let t = source_type.trim().to_ascii_lowercase();
    let mapped = match t.as_str() {
        "string" | "str" | "text" | "char" | "nchar" | "varchar" | "nvarchar" | "keyword" => {
            TargetType::String
        }
        "int" | "int32" | "integer" | "smallint" | "tinyint" => TargetType::Int,
        "long" | "int64" | "bigint" => TargetType::Long,
        "real" | "double" | "float" | "decimal" | "number" | "numeric" => TargetType::Real,
        "bool" | "boolean" | "bit" => TargetType::Boolean,
        "datetime" | "date" | "timestamp" | "datetime2" | "datetimeoffset" => TargetType::Datetime,
        "dynamic" | "object" | "array" | "json" | "map" => TargetType::Dynamic,
        _ => return None,
    };
    Some(mapped)
}

pub fn is_identifier_type(source_type: &str) -> bool {
    let t = source_type.trim();
    IDENTIFIER_TYPES.iter().any(|id| t.eq_ignore_ascii_case(id))
}

/// Normalize a raw column list.
pub fn normalize(raw_columns: &[ColumnDefinition], exclude_names: &BTreeSet<String>) -> NormalizedSchema {
    let mut out = NormalizedSchema::default();

    for col in raw_columns {
        if col.name.trim().is_empty() {
            out.warnings.push(NormalizeWarning {
                column: col.name.clone(),
                source_type: col.source_type.clone(),
                message: "column has an empty name and was dropped".to_string(),
            });
            out.dropped.push(col.name.clone());
            continue;
        }

        if exclude_names.contains(&col.name) || is_identifier_type(&col.source_type) {
            out.dropped.push(col.name.clone());
            continue;
        }

        let target_type = match map_source_type(&col.source_type) {
            Some(t) => t,
            None => {
                out.warnings.push(NormalizeWarning {
                    column: col.name.clone(),
                    source_type: col.source_type.clone(),
                    message: format!(
                        "unrecognized source type '{}', falling back to string",
                        col.source_type
                    ),
                });
                TargetType::String
            }
        };

        out.columns.push(NormalizedColumn {
            name: col.name.clone(),
            target_type,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizationConfig;
    use proptest::prelude::*;

    fn cols(pairs: &[(&str, &str)]) -> Vec<ColumnDefinition> {
        pairs
            .iter()
            .map(|(n, t)| ColumnDefinition::new(*n, *t))
            .collect()
    }

    #[test]
    fn maps_aliases_case_insensitively() {
        assert_eq!(map_source_type("Int64"), Some(TargetType::Long));
        assert_eq!(map_source_type(" BOOL "), Some(TargetType::Boolean));
        assert_eq!(map_source_type("DateTime"), Some(TargetType::Datetime));
        assert_eq!(map_source_type("double"), Some(TargetType::Real));
        assert_eq!(map_source_type("timespan"), None);
    }

    #[test]
    fn drops_excluded_and_identifier_columns() {
        let exclude = NormalizationConfig::default_exclude_columns();
        let raw = cols(&[
            ("TimeGenerated", "datetime"),
            ("TenantId", "string"),
            ("ActivityId", "guid"),
            ("CorrelationId", "UniqueIdentifier"),
            ("EventID", "int"),
        ]);

        let n = normalize(&raw, &exclude);
        let names: Vec<_> = n.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["TimeGenerated", "EventID"]);
        assert_eq!(n.dropped, vec!["TenantId", "ActivityId", "CorrelationId"]);
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn exclusion_is_exact_match() {
        let exclude: BTreeSet<String> = ["Type".to_string()].into_iter().collect();
        let n = normalize(&cols(&[("type", "string"), ("Type", "string")]), &exclude);
        assert_eq!(n.columns.len(), 1);
        assert_eq!(n.columns[0].name, "type");
    }

    #[test]
    fn unknown_type_falls_back_with_warning() {
        let n = normalize(&cols(&[("Duration", "timespan")]), &BTreeSet::new());
        assert_eq!(n.columns[0].target_type, TargetType::String);
        assert_eq!(n.warnings.len(), 1);
        assert_eq!(n.warnings[0].source_type, "timespan");
    }

    #[test]
    fn blank_names_are_dropped_and_reported() {
        let n = normalize(
            &cols(&[("", "string"), ("Message", "string"), ("  ", "int")]),
            &BTreeSet::new(),
        );
        assert_eq!(n.columns.len(), 1);
        assert_eq!(n.dropped, vec!["", "  "]);
        assert_eq!(n.warnings.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_schema() {
        let n = normalize(&[], &NormalizationConfig::default_exclude_columns());
        assert!(n.is_empty());
        assert!(n.warnings.is_empty());
    }

    proptest! {
        #[test]
        fn normalization_is_total(name in "[A-Za-z][A-Za-z0-9_]{0,20}", ty in ".{0,16}") {
            let raw = vec![ColumnDefinition::new(name.clone(), ty.clone())];
            let n = normalize(&raw, &BTreeSet::new());
            if is_identifier_type(&ty) {
                prop_assert!(n.columns.is_empty());
            } else {
                prop_assert_eq!(n.columns.len(), 1);
                prop_assert!(!n.columns[0].target_type.as_str().is_empty());
                if map_source_type(&ty).is_none() {
                    prop_assert_eq!(n.columns[0].target_type, TargetType::String);
                    prop_assert_eq!(n.warnings.len(), 1);
                }
            }
        }

        #[test]
        fn filtered_columns_never_survive(
            names in proptest::collection::vec("[A-Za-z_]{1,12}", 0..20),
            excluded in proptest::collection::btree_set("[A-Za-z_]{1,12}", 0..5),
        ) {
            let mut raw: Vec<ColumnDefinition> =
                names.iter().map(|n| ColumnDefinition::new(n.clone(), "string")).collect();
            raw.extend(excluded.iter().map(|n| ColumnDefinition::new(n.clone(), "string")));
            raw.push(ColumnDefinition::new("RowId0", "uuid"));

            let n = normalize(&raw, &excluded);
            for c in &n.columns {
                prop_assert!(!excluded.contains(&c.name));
                prop_assert!(c.name != "RowId0");
            }
        }
    }
}
