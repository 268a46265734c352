// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XML parameter files
//!
//! Database config files in XML (ZooKeeper, HDFS-style property lists) are
//! a flat list of `<name>value</name>` elements under a single root.  Only
//! that shape is supported; attributes and deeper nesting are rejected.
//! Serialization is canonical under a `<configuration>` root.

use crate::ConfigFormat;
use crate::FormatError;
use crate::Parameters;

const ROOT_ELEMENT: &str = "configuration";

fn error(message: impl Into<String>) -> FormatError {
    FormatError::ParseWhole {
        format: ConfigFormat::Xml,
        message: message.into(),
    }
}

pub(crate) fn parse(content: &str) -> Result<Parameters, FormatError> {
    let mut rest = content.trim();

    // Tolerate a leading XML declaration.
    if let Some(after) = rest.strip_prefix("<?") {
        let end = after
            .find("?>")
            .ok_or_else(|| error("unterminated XML declaration"))?;
        rest = after[end + 2..].trim_start();
    }

    let (root, body) = open_tag(rest)?;
    let close = format!("</{}>", root);
    let inner = body
        .strip_suffix(&close)
        .ok_or_else(|| error(format!("missing closing tag {}", close)))?;

    let mut params = Parameters::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let (name, after) = open_tag(rest)?;
        let close = format!("</{}>", name);
        let end = after
            .find(&close)
            .ok_or_else(|| error(format!("missing closing tag {}", close)))?;
        let value = after[..end].trim();
        if value.contains('<') {
            return Err(error(format!(
                "element <{}> is not a flat parameter",
                name
            )));
        }
        params.insert(name, unescape(value));
        rest = after[end + close.len()..].trim_start();
    }
    Ok(params)
}

/// Splits `<name>rest` into the element name and everything after the `>`.
fn open_tag(input: &str) -> Result<(String, &str), FormatError> {
    let after = input
        .strip_prefix('<')
        .ok_or_else(|| error(format!("expected an element, found {:?}", head(input))))?;
    let end = after
        .find('>')
        .ok_or_else(|| error("unterminated element tag"))?;
    let name = &after[..end];
    if name.is_empty()
        || name.ends_with('/')
        || name.contains(char::is_whitespace)
    {
        return Err(error(format!(
            "unsupported element tag <{}> (attributes and self-closing \
             elements are not parameters)",
            name
        )));
    }
    Ok((name.to_string(), &after[end + 1..]))
}

fn head(input: &str) -> String {
    input.chars().take(20).collect()
}

pub(crate) fn serialize(params: &Parameters) -> String {
    let mut out = String::new();
    out.push('<');
    out.push_str(ROOT_ELEMENT);
    out.push_str(">\n");
    for (key, value) in params {
        out.push_str("  <");
        out.push_str(key);
        out.push('>');
        out.push_str(&escape(value));
        out.push_str("</");
        out.push_str(key);
        out.push_str(">\n");
    }
    out.push_str("</");
    out.push_str(ROOT_ELEMENT);
    out.push_str(">\n");
    out
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
