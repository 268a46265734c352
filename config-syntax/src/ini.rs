// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! INI parsing with a single exposed section
//!
//! A database config template owns one section of an INI file (for MySQL,
//! `[mysqld]`).  When the descriptor names a section, only that section's
//! keys are exposed and re-serialized; content carrying section headers
//! without a named section is rejected rather than guessed at.  Bare keys
//! (`skip-name-resolve`) parse to an empty value and serialize back bare.

use crate::ConfigFormat;
use crate::FormatError;
use crate::Parameters;

pub(crate) fn parse(
    section: Option<&str>,
    content: &str,
) -> Result<Parameters, FormatError> {
    let mut params = Parameters::new();
    let mut current_section: Option<String> = None;
    let mut saw_requested_section = false;

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[') {
            let Some(name) = name.strip_suffix(']') else {
                return Err(FormatError::Parse {
                    format: ConfigFormat::Ini,
                    line: index + 1,
                    message: format!("unterminated section header {:?}", line),
                });
            };
            let name = name.trim();
            if section.is_none() {
                return Err(FormatError::Parse {
                    format: ConfigFormat::Ini,
                    line: index + 1,
                    message: format!(
                        "content has section [{}] but no ini section \
                         was configured for this file",
                        name
                    ),
                });
            }
            if Some(name) == section {
                saw_requested_section = true;
            }
            current_section = Some(name.to_string());
            continue;
        }

        // Only keys in the requested section (or, with no section
        // configured, sectionless keys) are this file's parameters.
        if current_section.as_deref() != section {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                params.insert(
                    key.trim_end().to_string(),
                    value.trim_start().to_string(),
                );
            }
            // bare flag key, e.g. mysql's `skip-name-resolve`
            None => {
                params.insert(line.to_string(), String::new());
            }
        }
    }

    if let Some(name) = section {
        if !saw_requested_section && !content.trim().is_empty() {
            return Err(FormatError::ParseWhole {
                format: ConfigFormat::Ini,
                message: format!("section [{}] not found", name),
            });
        }
    }
    Ok(params)
}

pub(crate) fn serialize(section: Option<&str>, params: &Parameters) -> String {
    let mut out = String::new();
    if let Some(name) = section {
        out.push('[');
        out.push_str(name);
        out.push_str("]\n");
    }
    for (key, value) in params {
        if value.is_empty() {
            out.push_str(key);
        } else {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use super::parse;
    use super::serialize;

    #[test]
    fn test_only_named_section_is_exposed() {
        let content = "[client]\nport=3306\n\n[mysqld]\nport=3306\n\
                       max_connections=151\nskip-name-resolve\n";
        let params = parse(Some("mysqld"), content).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("max_connections").unwrap(), "151");
        assert_eq!(params.get("skip-name-resolve").unwrap(), "");

        let rendered = serialize(Some("mysqld"), &params);
        assert_eq!(
            rendered,
            "[mysqld]\nport=3306\nmax_connections=151\nskip-name-resolve\n"
        );
    }

    #[test]
    fn test_sectionless_content() {
        let params = parse(None, "key=value\nflag\n").unwrap();
        assert_eq!(params.get("key").unwrap(), "value");
        assert_eq!(params.get("flag").unwrap(), "");
        assert_eq!(serialize(None, &params), "key=value\nflag\n");
    }

    #[test]
    fn test_sections_require_configuration() {
        assert!(parse(None, "[mysqld]\nport=3306\n").is_err());
    }

    #[test]
    fn test_missing_section_is_an_error() {
        assert!(parse(Some("mysqld"), "[client]\nport=3306\n").is_err());
    }

    #[test]
    fn test_unterminated_header() {
        let error = parse(Some("mysqld"), "[mysqld\nport=1\n").unwrap_err();
        assert!(error.to_string().contains("line 1"));
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let content = "[mysqld]\n# comment\n; also comment\n\nport=3306\n";
        let params = parse(Some("mysqld"), content).unwrap();
        assert_eq!(params.len(), 1);
    }
}
