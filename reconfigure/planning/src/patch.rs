// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diffing two versions of a configuration snapshot into a structured patch

use corral_config_syntax::FormatDescriptor;
use corral_config_syntax::FormatError;
use corral_config_syntax::Parameters;
use corral_config_syntax::parse_config;
use corral_types::ConfigPatchInfo;
use slog::debug;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Malformed content in either version aborts the whole patch for this
    /// cycle; a partial patch must never be produced.
    #[error("malformed {which} content of {file}")]
    Malformed {
        file: String,
        which: &'static str,
        #[source]
        source: FormatError,
    },
}

/// Diffs `old_files` against `new_files` into a [`ConfigPatchInfo`]
///
/// Files appearing in either map are diffed using the format declared for
/// them in `formats`; files with no declared format cannot be reconfigured
/// and are skipped.  Parameters only in the new version land in
/// `add_config`, ones only in the old version in `delete_config`, and ones
/// whose value changed in `update_config` as a raw JSON fragment of the new
/// values.
pub fn create_config_patch(
    log: &slog::Logger,
    old_files: &BTreeMap<String, String>,
    new_files: &BTreeMap<String, String>,
    formats: &BTreeMap<String, FormatDescriptor>,
) -> Result<ConfigPatchInfo, PatchError> {
    let mut patch = ConfigPatchInfo::default();

    let file_names: BTreeSet<&String> =
        old_files.keys().chain(new_files.keys()).collect();
    for file_name in file_names {
        let Some(descriptor) = formats.get(file_name) else {
            debug!(
                log,
                "skipping file with no declared format";
                "file" => %file_name,
            );
            continue;
        };
        let old_params =
            parse_file(descriptor, old_files.get(file_name), file_name, "previous")?;
        let new_params =
            parse_file(descriptor, new_files.get(file_name), file_name, "new")?;

        let mut added = BTreeMap::new();
        let mut deleted = BTreeMap::new();
        let mut updated = serde_json::Map::new();
        for (key, new_value) in &new_params {
            match old_params.get(key) {
                None => {
                    added.insert(key.clone(), new_value.clone());
                }
                Some(old_value) if old_value != new_value => {
                    updated.insert(
                        key.clone(),
                        serde_json::Value::String(new_value.clone()),
                    );
                }
                Some(_) => {}
            }
        }
        for (key, old_value) in &old_params {
            if !new_params.contains_key(key) {
                deleted.insert(key.clone(), old_value.clone());
            }
        }

        if !added.is_empty() {
            patch.add_config.insert(file_name.clone(), added);
        }
        if !deleted.is_empty() {
            patch.delete_config.insert(file_name.clone(), deleted);
        }
        if !updated.is_empty() {
            patch.update_config.insert(
                file_name.clone(),
                serde_json::Value::Object(updated),
            );
        }
    }

    patch.is_modify = !patch.add_config.is_empty()
        || !patch.delete_config.is_empty()
        || !patch.update_config.is_empty();
    Ok(patch)
}

fn parse_file(
    descriptor: &FormatDescriptor,
    content: Option<&String>,
    file_name: &str,
    which: &'static str,
) -> Result<Parameters, PatchError> {
    match content {
        None => Ok(Parameters::new()),
        Some(content) => parse_config(descriptor, content).map_err(|source| {
            PatchError::Malformed {
                file: file_name.to_string(),
                which,
                source,
            }
        }),
    }
}

#[cfg(test)]
mod test {
    use super::create_config_patch;
    use corral_config_syntax::ConfigFormat;
    use corral_config_syntax::FormatDescriptor;
    use corral_test_utils::LogContext;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn mysql_formats() -> BTreeMap<String, FormatDescriptor> {
        [("my.cnf".to_string(), FormatDescriptor::ini("mysqld"))].into()
    }

    #[test]
    fn test_add_update_delete() {
        let logctx = LogContext::new("patch_add_update_delete");
        let old = files(&[(
            "my.cnf",
            "[mysqld]\nmax_connections=100\ngone_soon=1\nstable=x\n",
        )]);
        let new = files(&[(
            "my.cnf",
            "[mysqld]\nmax_connections=200\nstable=x\nbrand_new=yes\n",
        )]);
        let patch =
            create_config_patch(&logctx.log, &old, &new, &mysql_formats())
                .unwrap();

        assert!(patch.is_modify);
        assert_eq!(
            patch.add_config.get("my.cnf").unwrap().get("brand_new").unwrap(),
            "yes"
        );
        assert_eq!(
            patch
                .delete_config
                .get("my.cnf")
                .unwrap()
                .get("gone_soon")
                .unwrap(),
            "1"
        );
        assert_eq!(
            patch.update_config.get("my.cnf").unwrap(),
            &json!({"max_connections": "200"})
        );
        logctx.cleanup_successful();
    }

    #[test]
    fn test_unchanged_content_is_not_a_modification() {
        let logctx = LogContext::new("patch_unchanged");
        let content = files(&[("my.cnf", "[mysqld]\nmax_connections=100\n")]);
        let patch = create_config_patch(
            &logctx.log,
            &content,
            &content,
            &mysql_formats(),
        )
        .unwrap();
        assert!(!patch.is_modify);
        assert!(patch.changed_files().is_empty());
        logctx.cleanup_successful();
    }

    #[test]
    fn test_reordering_keys_is_not_a_modification() {
        let logctx = LogContext::new("patch_reorder");
        let old = files(&[("my.cnf", "[mysqld]\na=1\nb=2\n")]);
        let new = files(&[("my.cnf", "[mysqld]\nb=2\na=1\n")]);
        let patch =
            create_config_patch(&logctx.log, &old, &new, &mysql_formats())
                .unwrap();
        assert!(!patch.is_modify);
        logctx.cleanup_successful();
    }

    #[test]
    fn test_files_without_format_are_ignored() {
        let logctx = LogContext::new("patch_unknown_format");
        let old = files(&[("mystery.bin", "a=1\n")]);
        let new = files(&[("mystery.bin", "a=2\n")]);
        let patch =
            create_config_patch(&logctx.log, &old, &new, &mysql_formats())
                .unwrap();
        assert!(!patch.is_modify);
        logctx.cleanup_successful();
    }

    #[test]
    fn test_new_and_removed_files() {
        let logctx = LogContext::new("patch_whole_files");
        let mut formats = mysql_formats();
        formats.insert(
            "server.properties".to_string(),
            FormatDescriptor::new(ConfigFormat::Properties),
        );
        let old = files(&[("my.cnf", "[mysqld]\na=1\n")]);
        let new = files(&[
            ("my.cnf", "[mysqld]\na=1\n"),
            ("server.properties", "x=1\ny=2\n"),
        ]);
        let patch =
            create_config_patch(&logctx.log, &old, &new, &formats).unwrap();
        assert!(patch.is_modify);
        let added = patch.add_config.get("server.properties").unwrap();
        assert_eq!(added.len(), 2);

        // And the reverse: removing the file deletes its parameters.
        let patch =
            create_config_patch(&logctx.log, &new, &old, &formats).unwrap();
        let deleted = patch.delete_config.get("server.properties").unwrap();
        assert_eq!(deleted.len(), 2);
        logctx.cleanup_successful();
    }

    #[test]
    fn test_malformed_content_aborts_the_patch() {
        let logctx = LogContext::new("patch_malformed");
        let old = files(&[("my.cnf", "[mysqld]\na=1\n")]);
        let new = files(&[("my.cnf", "[mysqld\nbroken")]);
        let error = create_config_patch(
            &logctx.log,
            &old,
            &new,
            &mysql_formats(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("my.cnf"));
        logctx.cleanup_successful();
    }
}
