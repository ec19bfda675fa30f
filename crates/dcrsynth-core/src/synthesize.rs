//! Template synthesis.
//!
//! Turns one shared, parameterized data collection rule template into a
//! deployment-ready document for a single table:
//!
//! 1. deep-copy the template (the shared [`Template`] is never mutated)
//! 2. replace every stream-name placeholder, in keys and values, in one walk
//! 3. inject the normalized columns into the stream declaration for the table
//! 4. strip parameters that are now literals and set defaults on the rest
//! 5. serialize once to measure the final size
//!
//! Placeholders are matched against whole string values only, so column data
//! that merely contains a placeholder-like substring is never touched.

use serde_json::{Map, Value};

use crate::config::{ProvisioningMode, TemplateParameters};
use crate::errors::{CoreError, CoreResult};
use crate::model::{NormalizedColumn, ResourceName, SynthesizedArtifact};
use crate::pipeline::PipelineContext;

/// Resource type the synthesizer edits.
pub const DCR_RESOURCE_TYPE: &str = "Microsoft.Insights/dataCollectionRules";

/// Suffix marking a custom (non-native) table.
pub const CUSTOM_TABLE_SUFFIX: &str = "_CL";

pub const INPUT_STREAM_PREFIX: &str = "Custom-";
pub const NATIVE_OUTPUT_STREAM_PREFIX: &str = "Microsoft-";

/// An immutable, shared template document.
#[derive(Debug, Clone)]
pub struct Template {
    document: Value,
    mode: ProvisioningMode,
}

impl Template {
    pub fn from_value(document: Value, mode: ProvisioningMode) -> CoreResult<Self> {
        if !document.is_object() {
            return Err(CoreError::invalid_argument(
                "template document must be a JSON object",
            ));
        }
        Ok(Self { document, mode })
    }

    pub fn from_json_str(s: &str, mode: ProvisioningMode) -> CoreResult<Self> {
        let v: Value = serde_json::from_str(s)?;
        Self::from_value(v, mode)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn mode(&self) -> ProvisioningMode {
        self.mode
    }
}

/// Per-table synthesis inputs.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub table_id: &'a str,
    pub resource_name: &'a ResourceName,
    pub columns: &'a [NormalizedColumn],
    pub location: &'a str,
}

/// Run-wide synthesis options.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    pub parameters: TemplateParameters,
    pub detached: bool,
    pub custom_table_output: bool,
}

/// `(input, output)` stream names for a table. The output is always
/// `Microsoft-<id>` unless `custom_table_output` is set and the table is a
/// `_CL` table.
pub fn stream_names(table_id: &str, custom_table_output: bool) -> (String, String) {
    let input = format!("{INPUT_STREAM_PREFIX}{table_id}");
    let output = if custom_table_output && table_id.ends_with(CUSTOM_TABLE_SUFFIX) {
        input.clone()
    } else {
        format!("{NATIVE_OUTPUT_STREAM_PREFIX}{table_id}")
    };
    (input, output)
}

/// Whole-value placeholder forms and what they resolve to.
struct Substitutions {
    rules: Vec<(String, String)>,
}

impl Substitutions {
    fn new(table_param: &str, table_id: &str, input: &str, output: &str) -> Self {
        let mut rules = vec![(format!("[parameters('{table_param}')]"), table_id.to_string())];
        for (prefix, target) in [
            (INPUT_STREAM_PREFIX, input),
            (NATIVE_OUTPUT_STREAM_PREFIX, output),
        ] {
            rules.push((
                format!("[concat('{prefix}',parameters('{table_param}'))]"),
                target.to_string(),
            ));
            rules.push((
                format!("[format('{prefix}{{0}}',parameters('{table_param}'))]"),
                target.to_string(),
            ));
        }
        Self { rules }
    }

    fn resolve(&self, s: &str) -> Option<&str> {
        let compact = strip_whitespace(s);
        self.rules
            .iter()
            .find(|(pattern, _)| *pattern == compact)
            .map(|(_, target)| target.as_str())
    }

    /// Replace placeholders in keys and string values; returns the count replaced.
    /// A substituted key that collides with another key in the same object is an error.
    fn apply(&self, value: &mut Value) -> CoreResult<usize> {
        match value {
            Value::String(s) => Ok(match self.resolve(s) {
                Some(target) => {
                    *s = target.to_string();
                    1
                }
                None => 0,
            }),
            Value::Array(items) => {
                let mut replaced = 0;
                for v in items.iter_mut() {
                    replaced += self.apply(v)?;
                }
                Ok(replaced)
            }
            Value::Object(map) => {
                let mut replaced = 0;
                let entries = std::mem::take(map);
                for (key, mut v) in entries {
                    replaced += self.apply(&mut v)?;
                    let key = match self.resolve(&key) {
                        Some(target) => {
                            replaced += 1;
                            target.to_string()
                        }
                        None => key,
                    };
                    if map.contains_key(&key) {
                        return Err(CoreError::template(format!(
                            "key {key} appears twice after stream substitution"
                        )));
                    }
                    map.insert(key, v);
                }
                Ok(replaced)
            }
            _ => Ok(0),
        }
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn references_parameter(s: &str, param: &str) -> bool {
    strip_whitespace(s).contains(&format!("parameters('{param}')"))
}

/// Find the first string (key or value) that references any of `params`.
fn find_reference<'v>(value: &'v Value, params: &[&str]) -> Option<&'v str> {
    match value {
        Value::String(s) => params
            .iter()
            .any(|p| references_parameter(s, p))
            .then_some(s.as_str()),
        Value::Array(items) => items.iter().find_map(|v| find_reference(v, params)),
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            if params.iter().any(|p| references_parameter(k, p)) {
                Some(k.as_str())
            } else {
                find_reference(v, params)
            }
        }),
        _ => None,
    }
}

fn dcr_properties_mut(doc: &mut Value) -> CoreResult<&mut Map<String, Value>> {
    let resources = doc
        .get_mut("resources")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| CoreError::template("missing resources array"))?;

    let dcr = resources
        .iter_mut()
        .find(|r| {
            r.get("type")
                .and_then(Value::as_str)
                .map(|t| t.eq_ignore_ascii_case(DCR_RESOURCE_TYPE))
                .unwrap_or(false)
        })
        .ok_or_else(|| CoreError::template(format!("no {DCR_RESOURCE_TYPE} resource")))?;

    let props = dcr
        .get_mut("properties")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CoreError::template("data collection rule has no properties object"))?;

    if !props.get("streamDeclarations").map(Value::is_object).unwrap_or(false) {
        return Err(CoreError::template(
            "missing properties.streamDeclarations object",
        ));
    }
    if !props.get("dataFlows").map(Value::is_array).unwrap_or(false) {
        return Err(CoreError::template("missing properties.dataFlows array"));
    }

    Ok(props)
}

fn flow_consumes(flow: &Value, stream: &str) -> bool {
    flow.get("streams")
        .and_then(Value::as_array)
        .map(|streams| streams.iter().any(|s| s.as_str() == Some(stream)))
        .unwrap_or(false)
}

/// Synthesize the deployment-ready document for one table.
pub fn synthesize(
    template: &Template,
    req: &SynthesisRequest<'_>,
    opts: &SynthesisOptions,
    ctx: &mut PipelineContext,
) -> CoreResult<SynthesizedArtifact> {
    let params = &opts.parameters;
    let mut doc = template.document().clone();

    // Structure is checked before any edit so a bad template fails fast.
    dcr_properties_mut(&mut doc)?;

    let (stream_input_name, stream_output_name) =
        stream_names(req.table_id, opts.custom_table_output);
    let subs = Substitutions::new(
        &params.table_name,
        req.table_id,
        &stream_input_name,
        &stream_output_name,
    );
    let replaced = subs.apply(&mut doc)?;
    ctx.push_info(
        "synthesize.substituted",
        format!("replaced {replaced} stream placeholder(s)"),
    );

    let props = dcr_properties_mut(&mut doc)?;

    let columns = serde_json::to_value(req.columns)?;
    let declarations = props
        .get_mut("streamDeclarations")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CoreError::template("missing properties.streamDeclarations object"))?;
    match declarations.get_mut(&stream_input_name) {
        Some(Value::Object(decl)) => {
            decl.insert("columns".to_string(), columns);
        }
        _ => {
            ctx.push_info(
                "synthesize.stream_created",
                format!("template had no declaration for {stream_input_name}; created it"),
            );
            let mut decl = Map::new();
            decl.insert("columns".to_string(), columns);
            declarations.insert(stream_input_name.clone(), Value::Object(decl));
        }
    }

    let consumed = props
        .get("dataFlows")
        .and_then(Value::as_array)
        .map(|flows| flows.iter().any(|f| flow_consumes(f, &stream_input_name)))
        .unwrap_or(false);
    if !consumed {
        ctx.push_warning(
            "synthesize.stream_unused",
            format!("no data flow consumes {stream_input_name}"),
        );
    }

    apply_parameters(&mut doc, req, opts, template.mode(), ctx)?;

    let removed = [params.table_name.as_str(), params.columns.as_str()];
    if let Some(s) = find_reference(&doc, &removed) {
        return Err(CoreError::template(format!(
            "unresolved reference to a removed parameter: {s}"
        )));
    }

    let size_bytes = serde_json::to_vec_pretty(&doc)?.len() as u64;

    Ok(SynthesizedArtifact {
        table_id: req.table_id.to_string(),
        resource_name: req.resource_name.clone(),
        columns: req.columns.to_vec(),
        stream_input_name,
        stream_output_name,
        raw_document: doc,
        size_bytes,
    })
}

fn apply_parameters(
    doc: &mut Value,
    req: &SynthesisRequest<'_>,
    opts: &SynthesisOptions,
    mode: ProvisioningMode,
    ctx: &mut PipelineContext,
) -> CoreResult<()> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| CoreError::template("template document is not an object"))?;
    let parameters = root
        .entry("parameters")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| CoreError::template("parameters is not an object"))?;

    let p = &opts.parameters;
    parameters.remove(&p.table_name);
    parameters.remove(&p.columns);

    let mut set_default = |name: &str, value: Value, ctx: &mut PipelineContext| {
        match parameters.get_mut(name).and_then(Value::as_object_mut) {
            Some(param) => {
                param.insert("defaultValue".to_string(), value);
            }
            None => ctx.push_warning(
                "synthesize.parameter_missing",
                format!("template has no '{name}' parameter"),
            ),
        }
    };

    set_default(
        &p.resource_name,
        Value::String(req.resource_name.to_string()),
        ctx,
    );
    set_default(&p.location, Value::String(req.location.to_string()), ctx);

    if opts.detached {
        for reference in &p.references {
            if let Some(param) = parameters.get_mut(reference).and_then(Value::as_object_mut) {
                param.insert("defaultValue".to_string(), Value::String(String::new()));
            }
        }
        ctx.push_info(
            "synthesize.detached",
            format!("blanked external references for {mode} template"),
        );
    }

    Ok(())
}
