// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing and serialization of database configuration files
//!
//! The reconfiguration engine treats file content as opaque; everything it
//! does operates on the ordered key/value view produced here.  Each
//! supported format parses into a [`Parameters`] map (insertion-ordered, so
//! re-serialization preserves key order) and serializes back out of one.
//!
//! Round-trip guarantee: for well-formed input,
//! `parse(serialize(parse(content))) == parse(content)`.  Serialization is
//! canonical, not byte-preserving: comments and blank lines are dropped,
//! separators and quoting are normalized, and nested structures in the tree
//! formats (json/yaml/toml) are exposed as dotted keys.

mod hcl;
mod ini;
mod lines;
mod markup;
mod tree;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Ordered key -> value view of one config file
pub type Parameters = IndexMap<String, String>;

/// Wire format of a config file
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    JsonSchema,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigFormat {
    Ini,
    Yaml,
    Json,
    Toml,
    Xml,
    Hcl,
    Dotenv,
    Properties,
    /// properties with `:` and whitespace separators also accepted
    PropsPlus,
    /// redis.conf-style whitespace-separated directives
    RedisConf,
}

/// Per-file format metadata: the format plus any format-specific options
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
pub struct FormatDescriptor {
    pub format: ConfigFormat,

    /// for [`ConfigFormat::Ini`]: the section holding this file's
    /// parameters (e.g. `mysqld`); required when the content carries
    /// section headers
    #[serde(default)]
    pub ini_section: Option<String>,
}

impl FormatDescriptor {
    pub fn new(format: ConfigFormat) -> FormatDescriptor {
        FormatDescriptor { format, ini_section: None }
    }

    pub fn ini(section: impl Into<String>) -> FormatDescriptor {
        FormatDescriptor {
            format: ConfigFormat::Ini,
            ini_section: Some(section.into()),
        }
    }
}

/// Failure to read or write a config file in its declared format
///
/// Malformed content is a hard error: the caller aborts the patch for the
/// cycle rather than guessing at partial structure.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("cannot parse {format} content at line {line}: {message}")]
    Parse { format: ConfigFormat, line: usize, message: String },

    #[error("cannot parse {format} content: {message}")]
    ParseWhole { format: ConfigFormat, message: String },

    #[error("cannot serialize {format} content: {message}")]
    Serialize { format: ConfigFormat, message: String },
}

/// Parses `content` into its ordered key/value view.
pub fn parse_config(
    descriptor: &FormatDescriptor,
    content: &str,
) -> Result<Parameters, FormatError> {
    match descriptor.format {
        ConfigFormat::Ini => {
            ini::parse(descriptor.ini_section.as_deref(), content)
        }
        ConfigFormat::Yaml => tree::parse_yaml(content),
        ConfigFormat::Json => tree::parse_json(content),
        ConfigFormat::Toml => tree::parse_toml(content),
        ConfigFormat::Xml => markup::parse(content),
        ConfigFormat::Hcl => hcl::parse(content),
        ConfigFormat::Dotenv => lines::parse(&lines::DOTENV, content),
        ConfigFormat::Properties => lines::parse(&lines::PROPERTIES, content),
        ConfigFormat::PropsPlus => lines::parse(&lines::PROPS_PLUS, content),
        ConfigFormat::RedisConf => lines::parse(&lines::REDIS_CONF, content),
    }
}

/// Serializes a key/value view back into canonical file content.
pub fn serialize_config(
    descriptor: &FormatDescriptor,
    params: &Parameters,
) -> Result<String, FormatError> {
    match descriptor.format {
        ConfigFormat::Ini => {
            Ok(ini::serialize(descriptor.ini_section.as_deref(), params))
        }
        ConfigFormat::Yaml => tree::serialize_yaml(params),
        ConfigFormat::Json => tree::serialize_json(params),
        ConfigFormat::Toml => tree::serialize_toml(params),
        ConfigFormat::Xml => Ok(markup::serialize(params)),
        ConfigFormat::Hcl => Ok(hcl::serialize(params)),
        ConfigFormat::Dotenv => Ok(lines::serialize(&lines::DOTENV, params)),
        ConfigFormat::Properties => {
            Ok(lines::serialize(&lines::PROPERTIES, params))
        }
        ConfigFormat::PropsPlus => {
            Ok(lines::serialize(&lines::PROPS_PLUS, params))
        }
        ConfigFormat::RedisConf => {
            Ok(lines::serialize(&lines::REDIS_CONF, params))
        }
    }
}
