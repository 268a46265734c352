// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classifying a patch against per-file parameter metadata
//!
//! This is the validation gate: an edit touching an immutable parameter
//! fails here, before any policy is resolved and before anything reaches a
//! replica.  Everything that survives is split into static and dynamic
//! parameter sets per file.

use corral_types::ConfigPatchInfo;
use corral_types::ParametersDefinition;
use slog::warn;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Validation failure, never retried; the message names the offending
    /// parameters because it is what the user sees on the resource status.
    #[error(
        "immutable parameter(s) {parameters:?} of {file} cannot be added, \
         changed, or deleted"
    )]
    ImmutableParameter { file: String, parameters: Vec<String> },
}

/// Per-file classification of one patch
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FileChangeClass {
    pub file_name: String,

    /// no static-parameter change is present in this file
    pub all_dynamic: bool,

    /// changed parameters declared static
    pub static_params: BTreeSet<String>,

    /// changed parameters declared dynamic, or declared not at all: an
    /// unknown parameter is assumed hot-reloadable unless explicitly
    /// marked static
    pub dynamic_params: BTreeSet<String>,
}

/// Classifies every changed file that has a [`ParametersDefinition`]
///
/// Files without a definition get no class; the resolver falls back to a
/// restart for those.  Deleting a parameter counts exactly like changing
/// it: removing a static key still needs a restart to take effect, and
/// removing an immutable key is rejected like any other edit to it.
pub fn classify_patch(
    log: &slog::Logger,
    patch: &ConfigPatchInfo,
    definitions: &BTreeMap<String, ParametersDefinition>,
) -> Result<BTreeMap<String, FileChangeClass>, ClassifyError> {
    let mut classes = BTreeMap::new();
    for file_name in patch.changed_files() {
        let Some(definition) = definitions.get(&file_name) else {
            warn!(
                log,
                "no parameter metadata for changed file";
                "file" => %file_name,
            );
            continue;
        };

        let touched = patch.touched_params(&file_name);
        let immutable: Vec<String> = touched
            .iter()
            .filter(|p| definition.is_immutable(p))
            .cloned()
            .collect();
        if !immutable.is_empty() {
            return Err(ClassifyError::ImmutableParameter {
                file: file_name,
                parameters: immutable,
            });
        }

        let (static_params, dynamic_params): (BTreeSet<_>, BTreeSet<_>) =
            touched.into_iter().partition(|p| definition.is_static(p));
        let all_dynamic = static_params.is_empty();
        classes.insert(
            file_name.clone(),
            FileChangeClass {
                file_name,
                all_dynamic,
                static_params,
                dynamic_params,
            },
        );
    }
    Ok(classes)
}
