//! Response transforms (spec §4.11): a small path grammar plus five
//! operations, applied in order to a deep-cloned intermediate value.

use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed transform spec: {0}")]
    MalformedSpec(String),

    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    path: String,
    transform: String,
    #[serde(default)]
    map: serde_json::Map<String, Value>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    replacement: Option<String>,
}

enum Op {
    Remove,
    Map(serde_json::Map<String, Value>),
    DateFormat(String),
    Template(String),
    RegexReplace(Regex, String),
}

struct CompiledTransform {
    segments: Vec<Segment>,
    op: Op,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Root,
    Field(String),
    ArrayField(String),
}

fn parse_path(path: &str) -> Vec<Segment> {
    path.split('.')
        .map(|part| {
            if part == "_root[]" {
                Segment::Root
            } else if let Some(name) = part.strip_suffix("[]") {
                Segment::ArrayField(name.to_string())
            } else {
                Segment::Field(part.to_string())
            }
        })
        .collect()
}

fn compile(spec: &Value) -> Result<CompiledTransform, TransformError> {
    let raw: RawSpec = serde_json::from_value(spec.clone())
        .map_err(|e| TransformError::MalformedSpec(e.to_string()))?;

    let op = match raw.transform.as_str() {
        "remove" => Op::Remove,
        "map" => Op::Map(raw.map),
        "date_format" => Op::DateFormat(
            raw.format
                .ok_or_else(|| TransformError::MalformedSpec("date_format needs a format".into()))?,
        ),
        "template" => Op::Template(
            raw.template
                .ok_or_else(|| TransformError::MalformedSpec("template needs a template".into()))?,
        ),
        "regex_replace" => {
            let pattern = raw
                .pattern
                .ok_or_else(|| TransformError::MalformedSpec("regex_replace needs a pattern".into()))?;
            let replacement = raw.replacement.unwrap_or_default();
            Op::RegexReplace(Regex::new(&pattern)?, replacement)
        }
        other => {
            return Err(TransformError::MalformedSpec(format!(
                "unknown transform operation: {other}"
            )))
        }
    };

    Ok(CompiledTransform {
        segments: parse_path(&raw.path),
        op,
    })
}

/// Apply every transform spec, in order, to `value`. Each transform works on
/// the result of the previous one.
pub fn apply_transforms(mut value: Value, specs: &[Value]) -> Result<Value, TransformError> {
    for spec in specs {
        let compiled = compile(spec)?;
        apply_one(&mut value, &compiled.segments, &compiled.op);
    }
    Ok(value)
}

fn apply_one(value: &mut Value, segments: &[Segment], op: &Op) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match head {
        Segment::Root => {
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    apply_one(item, rest, op);
                }
            }
        }
        Segment::ArrayField(name) => {
            if let Value::Object(map) = value {
                if let Some(Value::Array(items)) = map.get_mut(name) {
                    for item in items.iter_mut() {
                        apply_one(item, rest, op);
                    }
                }
            }
        }
        Segment::Field(name) => {
            if let Value::Object(map) = value {
                if rest.is_empty() {
                    apply_leaf(map, name, op);
                } else if let Some(child) = map.get_mut(name) {
                    apply_one(child, rest, op);
                }
            }
        }
    }
}

fn apply_leaf(map: &mut serde_json::Map<String, Value>, key: &str, op: &Op) {
    match op {
        Op::Remove => {
            map.remove(key);
        }
        Op::Map(dictionary) => {
            if let Some(current) = map.get(key).and_then(Value::as_str) {
                if let Some(mapped) = dictionary.get(current) {
                    map.insert(key.to_string(), mapped.clone());
                }
            }
        }
        Op::DateFormat(format) => {
            if let Some(current) = map.get(key).and_then(Value::as_str) {
                if let Ok(formatted) = format_date(current, format) {
                    map.insert(key.to_string(), Value::String(formatted));
                }
            }
        }
        Op::Template(template) => {
            if let Some(current) = map.get(key) {
                let rendered = template.replace("{value}", &stringify(current));
                map.insert(key.to_string(), Value::String(rendered));
            }
        }
        Op::RegexReplace(pattern, replacement) => {
            if let Some(current) = map.get(key).and_then(Value::as_str) {
                let replaced = pattern.replace_all(current, replacement.as_str()).into_owned();
                map.insert(key.to_string(), Value::String(replaced));
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_date(raw: &str, format: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(raw)?;
    let strftime = format
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S");
    Ok(parsed.format(&strftime).to_string())
}
