use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

use dcrsynth_core::config::{EngineConfig, ProvisioningMode};
use dcrsynth_core::model::ColumnDefinition;
use dcrsynth_core::pipeline::TableInput;
use dcrsynth_core::synthesize::Template;

use crate::args::EngineArgs;

const DIRECT_TEMPLATE: &str = include_str!("../../templates/dcr-direct.json");
const WITH_ENDPOINT_TEMPLATE: &str = include_str!("../../templates/dcr-with-endpoint.json");

/// Declarative schema input: `{"tables": {"<tableId>": [{"name", "type"}]}}`.
#[derive(Debug, Deserialize)]
struct SchemaFile {
    tables: BTreeMap<String, Vec<ColumnDefinition>>,
}

pub async fn resolve_to_json(input: &str) -> Result<serde_json::Value> {
    if looks_like_url(input) {
        return fetch_url_json(input).await;
    }
    read_json_file(input)
}

pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| anyhow!("invalid json in {}: {e}", path.display()))
}

async fn fetch_url_json(url: &str) -> Result<serde_json::Value> {
    let resp = reqwest::get(url).await.with_context(|| format!("fetching {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("http error fetching {url}: {status}"));
    }
    let v = resp.json::<serde_json::Value>().await?;
    Ok(v)
}

fn looks_like_url(s: &str) -> bool {
    Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Config file first (or defaults), then flag overrides.
pub fn load_config(path: Option<&Path>, overrides: &EngineArgs) -> Result<EngineConfig> {
    let mut cfg = match path {
        Some(p) => {
            let v = read_json_file(p)?;
            serde_json::from_value(v).with_context(|| format!("invalid config {}", p.display()))?
        }
        None => EngineConfig::default(),
    };
    apply_overrides(&mut cfg, overrides);
    Ok(cfg)
}

pub fn apply_overrides(cfg: &mut EngineConfig, args: &EngineArgs) {
    if let Some(mode) = args.mode {
        cfg.template.mode = mode;
    }
    if let Some(prefix) = &args.prefix {
        cfg.naming.prefix = prefix.clone();
    }
    if let Some(location) = &args.location {
        cfg.naming.location = location.clone();
    }
    if let Some(suffix) = &args.suffix {
        cfg.naming.suffix = Some(suffix.clone());
    }
    if let Some(max) = args.max_length {
        cfg.naming.max_length = Some(max);
    }
}

pub fn parse_schema(v: serde_json::Value) -> Result<Vec<TableInput>> {
    let file: SchemaFile =
        serde_json::from_value(v).context("schema must be {\"tables\": {\"<table>\": [columns]}}")?;
    Ok(file
        .tables
        .into_iter()
        .map(|(id, columns)| TableInput::new(id, columns))
        .collect())
}

pub async fn load_schema(input: &str) -> Result<Vec<TableInput>> {
    let v = resolve_to_json(input).await?;
    parse_schema(v).with_context(|| format!("loading schema {input}"))
}

pub fn bundled_template(mode: ProvisioningMode) -> &'static str {
    match mode {
        ProvisioningMode::Direct => DIRECT_TEMPLATE,
        ProvisioningMode::WithEndpoint => WITH_ENDPOINT_TEMPLATE,
    }
}

/// Load the template once at startup. Any failure here is fatal to the run.
pub async fn load_template(input: Option<&str>, mode: ProvisioningMode) -> Result<Template> {
    let template = match input {
        Some(src) => {
            let v = resolve_to_json(src).await?;
            Template::from_value(v, mode).with_context(|| format!("loading template {src}"))?
        }
        None => Template::from_json_str(bundled_template(mode), mode)
            .with_context(|| format!("loading bundled {mode} template"))?,
    };
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_http_urls_are_fetched() {
        assert!(looks_like_url("https://example.com/schema.json"));
        assert!(!looks_like_url("schema.json"));
        assert!(!looks_like_url("C:\\data\\schema.json"));
    }

    #[test]
    fn schema_tables_keep_their_columns() {
        let tables = parse_schema(json!({
            "tables": {
                "Syslog": [{"name": "TimeGenerated", "type": "datetime"}],
                "Empty": []
            }
        }))
        .unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].table_id, "Empty");
        assert!(tables[0].columns.is_empty());
        assert_eq!(tables[1].columns[0].name, "TimeGenerated");
    }

    #[test]
    fn malformed_schema_is_an_error() {
        assert!(parse_schema(json!({"Syslog": []})).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"naming": {"prefix": "rule-", "location": "westus2"}, "retention": {"keep": 2}}"#,
        )
        .unwrap();

        let args = EngineArgs {
            location: Some("uksouth".to_string()),
            mode: Some(ProvisioningMode::WithEndpoint),
            ..Default::default()
        };
        let cfg = load_config(Some(&path), &args).unwrap();
        assert_eq!(cfg.naming.prefix, "rule-");
        assert_eq!(cfg.naming.location, "uksouth");
        assert_eq!(cfg.retention.keep, 2);
        assert_eq!(cfg.max_name_length(), 64);
    }

    #[test]
    fn bundled_templates_load() {
        for mode in [ProvisioningMode::Direct, ProvisioningMode::WithEndpoint] {
            let t = Template::from_json_str(bundled_template(mode), mode).unwrap();
            assert_eq!(t.mode(), mode);
        }
    }
}
