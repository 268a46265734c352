// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared machinery for the line-oriented formats
//!
//! properties, props-plus, dotenv, and redis.conf are all "one parameter
//! per line" formats differing only in separator, comment markers, and
//! quoting.  Each format is described by a [`LineSyntax`] and handled by
//! the same parse/serialize pair.

use crate::ConfigFormat;
use crate::FormatError;
use crate::Parameters;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Separator {
    /// `key=value` only
    Equals,
    /// `key=value` or `key: value`
    EqualsOrColon,
    /// `key=value`, `key: value`, or `key value`
    EqualsColonOrSpace,
    /// `directive arg arg ...` (first token is the key)
    Whitespace,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LineSyntax {
    pub format: ConfigFormat,
    pub comment_prefixes: &'static [&'static str],
    pub separator: Separator,
    /// strip surrounding quotes on parse and re-quote values containing
    /// whitespace on serialize (dotenv)
    pub quoted_values: bool,
}

pub(crate) static PROPERTIES: LineSyntax = LineSyntax {
    format: ConfigFormat::Properties,
    comment_prefixes: &["#", "!"],
    separator: Separator::EqualsOrColon,
    quoted_values: false,
};

pub(crate) static PROPS_PLUS: LineSyntax = LineSyntax {
    format: ConfigFormat::PropsPlus,
    comment_prefixes: &["#", "!"],
    separator: Separator::EqualsColonOrSpace,
    quoted_values: false,
};

pub(crate) static DOTENV: LineSyntax = LineSyntax {
    format: ConfigFormat::Dotenv,
    comment_prefixes: &["#"],
    separator: Separator::Equals,
    quoted_values: true,
};

pub(crate) static REDIS_CONF: LineSyntax = LineSyntax {
    format: ConfigFormat::RedisConf,
    comment_prefixes: &["#"],
    separator: Separator::Whitespace,
    quoted_values: false,
};

pub(crate) fn parse(
    syntax: &LineSyntax,
    content: &str,
) -> Result<Parameters, FormatError> {
    let mut params = Parameters::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty()
            || syntax.comment_prefixes.iter().any(|p| line.starts_with(p))
        {
            continue;
        }
        let (key, value) = split_line(syntax, line).ok_or_else(|| {
            FormatError::Parse {
                format: syntax.format,
                line: index + 1,
                message: format!("no key/value separator in {:?}", line),
            }
        })?;
        let value = if syntax.quoted_values {
            unquote(value)
        } else {
            value.to_string()
        };
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn split_line<'a>(
    syntax: &LineSyntax,
    line: &'a str,
) -> Option<(&'a str, &'a str)> {
    let split_at = |sep: char| {
        line.split_once(sep).map(|(k, v)| (k.trim_end(), v.trim_start()))
    };
    match syntax.separator {
        Separator::Equals => split_at('='),
        Separator::EqualsOrColon => {
            match (line.find('='), line.find(':')) {
                (Some(e), Some(c)) if c < e => split_at(':'),
                (Some(_), _) => split_at('='),
                (None, Some(_)) => split_at(':'),
                (None, None) => None,
            }
        }
        Separator::EqualsColonOrSpace => {
            match (line.find('='), line.find(':')) {
                (Some(e), Some(c)) if c < e => split_at(':'),
                (Some(_), _) => split_at('='),
                (None, Some(_)) => split_at(':'),
                (None, None) => line
                    .split_once(char::is_whitespace)
                    .map(|(k, v)| (k, v.trim_start())),
            }
        }
        Separator::Whitespace => Some(
            line.split_once(char::is_whitespace)
                .map(|(k, v)| (k, v.trim_start()))
                .unwrap_or((line, "")),
        ),
    }
}

pub(crate) fn serialize(syntax: &LineSyntax, params: &Parameters) -> String {
    let mut out = String::new();
    for (key, value) in params {
        match syntax.separator {
            Separator::Whitespace => {
                if value.is_empty() {
                    out.push_str(key);
                } else {
                    out.push_str(key);
                    out.push(' ');
                    out.push_str(value);
                }
            }
            _ => {
                out.push_str(key);
                out.push('=');
                if syntax.quoted_values && needs_quoting(value) {
                    out.push('"');
                    out.push_str(value);
                    out.push('"');
                } else {
                    out.push_str(value);
                }
            }
        }
        out.push('\n');
    }
    out
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"')
}
