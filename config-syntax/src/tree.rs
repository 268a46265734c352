// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tree-structured formats: JSON, YAML, and TOML
//!
//! All three parse through `serde_json::Value` as the common in-memory
//! tree.  Nested tables are exposed as dotted keys (`checkpoint.timeout`),
//! matching how database documentation names nested parameters.  Scalars
//! keep their minimal textual form; arrays are carried as compact JSON
//! fragments.  On serialization the dotted keys are folded back into a
//! nested tree and each value is re-interpreted as a JSON scalar where it
//! parses as one, so numbers and booleans survive the trip typed.

use crate::ConfigFormat;
use crate::FormatError;
use crate::Parameters;

pub(crate) fn parse_json(content: &str) -> Result<Parameters, FormatError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| FormatError::Parse {
            format: ConfigFormat::Json,
            line: e.line(),
            message: e.to_string(),
        })?;
    flatten_root(ConfigFormat::Json, value)
}

pub(crate) fn parse_yaml(content: &str) -> Result<Parameters, FormatError> {
    let value: serde_json::Value =
        serde_yaml::from_str(content).map_err(|e| {
            match e.location() {
                Some(location) => FormatError::Parse {
                    format: ConfigFormat::Yaml,
                    line: location.line(),
                    message: e.to_string(),
                },
                None => FormatError::ParseWhole {
                    format: ConfigFormat::Yaml,
                    message: e.to_string(),
                },
            }
        })?;
    flatten_root(ConfigFormat::Yaml, value)
}

pub(crate) fn parse_toml(content: &str) -> Result<Parameters, FormatError> {
    let value: serde_json::Value =
        toml::from_str(content).map_err(|e| FormatError::ParseWhole {
            format: ConfigFormat::Toml,
            message: e.message().to_string(),
        })?;
    flatten_root(ConfigFormat::Toml, value)
}

pub(crate) fn serialize_json(
    params: &Parameters,
) -> Result<String, FormatError> {
    let tree = unflatten(ConfigFormat::Json, params)?;
    let mut rendered = serde_json::to_string_pretty(&tree).map_err(|e| {
        FormatError::Serialize {
            format: ConfigFormat::Json,
            message: e.to_string(),
        }
    })?;
    rendered.push('\n');
    Ok(rendered)
}

pub(crate) fn serialize_yaml(
    params: &Parameters,
) -> Result<String, FormatError> {
    let tree = unflatten(ConfigFormat::Yaml, params)?;
    serde_yaml::to_string(&tree).map_err(|e| FormatError::Serialize {
        format: ConfigFormat::Yaml,
        message: e.to_string(),
    })
}

pub(crate) fn serialize_toml(
    params: &Parameters,
) -> Result<String, FormatError> {
    let tree = unflatten(ConfigFormat::Toml, params)?;
    toml::to_string(&tree).map_err(|e| FormatError::Serialize {
        format: ConfigFormat::Toml,
        message: e.to_string(),
    })
}

fn flatten_root(
    format: ConfigFormat,
    value: serde_json::Value,
) -> Result<Parameters, FormatError> {
    let serde_json::Value::Object(map) = value else {
        return Err(FormatError::ParseWhole {
            format,
            message: "top-level structure must be a table of parameters"
                .to_string(),
        });
    };
    let mut params = Parameters::new();
    flatten_into(&mut params, "", &serde_json::Value::Object(map));
    Ok(params)
}

fn flatten_into(
    params: &mut Parameters,
    prefix: &str,
    value: &serde_json::Value,
) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(params, &path, child);
            }
        }
        serde_json::Value::String(s) => {
            params.insert(prefix.to_string(), s.clone());
        }
        scalar => {
            params.insert(prefix.to_string(), scalar.to_string());
        }
    }
}

fn unflatten(
    format: ConfigFormat,
    params: &Parameters,
) -> Result<serde_json::Value, FormatError> {
    let mut root = serde_json::Map::new();
    for (key, value) in params {
        let mut node = &mut root;
        let mut segments = key.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.insert(segment.to_string(), reparse_scalar(value));
                break;
            }
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| {
                    serde_json::Value::Object(serde_json::Map::new())
                });
            node = match child {
                serde_json::Value::Object(map) => map,
                _ => {
                    return Err(FormatError::Serialize {
                        format,
                        message: format!(
                            "parameter {:?} conflicts with a scalar at {:?}",
                            key, segment
                        ),
                    });
                }
            };
        }
    }
    Ok(serde_json::Value::Object(root))
}

/// Re-interprets a flattened value: anything that parses as a JSON number,
/// boolean, null, or array goes back typed; everything else stays a string.
fn reparse_scalar(value: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed) if !parsed.is_string() => parsed,
        _ => serde_json::Value::String(value.to_string()),
    }
}
