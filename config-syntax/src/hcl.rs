// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HCL parameter files, flat-attribute subset
//!
//! Supports the `key = value` attribute form used by database tuning files
//! (string, number, and boolean values).  Blocks are not parameters and are
//! rejected.  Strings are double-quoted on serialization; numbers and
//! booleans stay bare.

use crate::ConfigFormat;
use crate::FormatError;
use crate::Parameters;

pub(crate) fn parse(content: &str) -> Result<Parameters, FormatError> {
    let mut params = Parameters::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let error = |message: String| FormatError::Parse {
            format: ConfigFormat::Hcl,
            line: index + 1,
            message,
        };
        let Some((key, value)) = line.split_once('=') else {
            return Err(error(format!(
                "expected `key = value`, found {:?} (blocks are not \
                 supported)",
                line
            )));
        };
        let key = key.trim_end();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(error(format!("invalid attribute name {:?}", key)));
        }
        let value = value.trim();
        if value.contains('{') || value.contains('}') {
            return Err(error(format!(
                "attribute {:?} has a block value; only flat attributes \
                 are supported",
                key
            )));
        }
        params.insert(key.to_string(), unquote(value, &error)?);
    }
    Ok(params)
}

fn unquote(
    value: &str,
    error: &impl Fn(String) -> FormatError,
) -> Result<String, FormatError> {
    if let Some(inner) = value.strip_prefix('"') {
        let Some(inner) = inner.strip_suffix('"') else {
            return Err(error(format!("unterminated string {:?}", value)));
        };
        Ok(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
    } else {
        Ok(value.to_string())
    }
}

pub(crate) fn serialize(params: &Parameters) -> String {
    let mut out = String::new();
    for (key, value) in params {
        out.push_str(key);
        out.push_str(" = ");
        if is_bare(value) {
            out.push_str(value);
        } else {
            out.push('"');
            out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        out.push('\n');
    }
    out
}

/// Numbers and booleans are written without quotes, like HCL authors do.
fn is_bare(value: &str) -> bool {
    value == "true"
        || value == "false"
        || value.parse::<f64>().is_ok() && !value.is_empty()
}
