// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured configuration changes and per-file parameter metadata

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Structured description of one configuration-file change
///
/// A `ConfigPatchInfo` is produced once per reconcile pass by diffing the
/// last-applied file contents against the newly rendered ones.  It is
/// immutable after creation: the classifier, resolver, and every policy
/// consume it read-only, and a policy either fully converges the patch or
/// reports that it is still in progress.  It is never partially applied.
#[derive(
    Debug, Clone, Default, Eq, PartialEq, JsonSchema, Deserialize, Serialize,
)]
pub struct ConfigPatchInfo {
    /// parameters present only in the new content, keyed by file name
    pub add_config: BTreeMap<String, BTreeMap<String, String>>,

    /// parameters present only in the old content, keyed by file name
    pub delete_config: BTreeMap<String, BTreeMap<String, String>>,

    /// parameters present in both versions with different values, keyed by
    /// file name
    ///
    /// The value is the raw JSON fragment of updated key/value pairs rather
    /// than the whole file so that policies stay format-agnostic.
    pub update_config: BTreeMap<String, serde_json::Value>,

    /// whether any file changed at all
    pub is_modify: bool,
}

impl ConfigPatchInfo {
    /// Returns the names of all files touched by this patch, in a stable
    /// (sorted) order.
    pub fn changed_files(&self) -> BTreeSet<String> {
        self.add_config
            .keys()
            .chain(self.delete_config.keys())
            .chain(self.update_config.keys())
            .cloned()
            .collect()
    }

    /// Returns the updated key/value pairs recorded for `file_name`
    ///
    /// Values that are not JSON strings (numbers, booleans) are rendered in
    /// their compact JSON form.
    pub fn updated_params(&self, file_name: &str) -> BTreeMap<String, String> {
        let Some(fragment) = self.update_config.get(file_name) else {
            return BTreeMap::new();
        };
        let Some(object) = fragment.as_object() else {
            return BTreeMap::new();
        };
        object
            .iter()
            .map(|(k, v)| (k.clone(), json_scalar_to_string(v)))
            .collect()
    }

    /// Returns every parameter name touched in `file_name`, whether added,
    /// deleted, or updated.
    pub fn touched_params(&self, file_name: &str) -> BTreeSet<String> {
        let mut params = BTreeSet::new();
        if let Some(added) = self.add_config.get(file_name) {
            params.extend(added.keys().cloned());
        }
        if let Some(deleted) = self.delete_config.get(file_name) {
            params.extend(deleted.keys().cloned());
        }
        params.extend(self.updated_params(file_name).into_keys());
        params
    }

    /// Returns the parameter names whose values are being set (added or
    /// updated) in `file_name`, excluding pure deletions.
    pub fn written_params(&self, file_name: &str) -> BTreeMap<String, String> {
        let mut params = self
            .add_config
            .get(file_name)
            .cloned()
            .unwrap_or_default();
        params.extend(self.updated_params(file_name));
        params
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a replica's management side-car applies a dynamic parameter change
/// without restarting the database process
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadAction {
    /// deliver a Unix signal to the database process
    UnixSignal { signal: String, process_name: Option<String> },

    /// run a shell command; `sync` selects a synchronous invocation over the
    /// side-car RPC rather than a file-watch trigger
    ShellTrigger { command: Vec<String>, sync: Option<bool> },

    /// run a templated script shipped with the config template
    TplScriptTrigger { script_config_name: String, sync: Option<bool> },

    /// the database engine notices and applies dynamic changes on its own;
    /// no external action is required
    AutoTrigger { process_name: Option<String> },
}

impl ReloadAction {
    /// Whether the database applies dynamic changes itself, with no external
    /// trigger.
    pub fn is_auto(&self) -> bool {
        matches!(self, ReloadAction::AutoTrigger { .. })
    }

    /// Whether this action is a trigger configured for synchronous execution
    /// over the side-car RPC (as opposed to a file-watch-based trigger).
    pub fn is_sync_trigger(&self) -> bool {
        match self {
            ReloadAction::ShellTrigger { sync, .. } => sync.unwrap_or(false),
            ReloadAction::TplScriptTrigger { sync, .. } => {
                sync.unwrap_or(false)
            }
            ReloadAction::UnixSignal { .. }
            | ReloadAction::AutoTrigger { .. } => false,
        }
    }
}

/// Per-file parameter metadata, declared by the database engine's provider
///
/// This mirrors the external schema object and is referenced read-only: it
/// declares which parameter names need a restart, which can be applied hot,
/// which may never be edited, and what reload mechanism (if any) applies.
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
pub struct ParametersDefinition {
    /// config file this definition applies to
    pub file_name: String,

    /// parameters that require a process restart to take effect
    #[serde(default)]
    pub static_parameters: BTreeSet<String>,

    /// parameters applicable without restart
    #[serde(default)]
    pub dynamic_parameters: BTreeSet<String>,

    /// parameters that may never be changed after provisioning
    #[serde(default)]
    pub immutable_parameters: BTreeSet<String>,

    /// how a replica applies dynamic changes; `None` means a file-watch
    /// side-car is expected to pick changes up on its own
    #[serde(default)]
    pub reload_action: Option<ReloadAction>,

    /// when explicitly `false`, a mixed static/dynamic change must apply the
    /// dynamic portion online *and* restart, rather than folding everything
    /// into the restart
    #[serde(default)]
    pub merge_reload_and_restart: Option<bool>,

    /// when `true`, static parameters are also pushed online before the
    /// restart so the restarted process comes up with them already persisted
    #[serde(default)]
    pub reload_static_params_before_restart: Option<bool>,

    /// restrict online reloads to replicas holding one of these roles
    /// (e.g. only primaries); `None` selects every replica
    #[serde(default)]
    pub reload_target_roles: Option<Vec<String>>,
}

impl ParametersDefinition {
    /// Bare definition with no parameter lists and no reload action.
    pub fn new(file_name: impl Into<String>) -> ParametersDefinition {
        ParametersDefinition {
            file_name: file_name.into(),
            static_parameters: BTreeSet::new(),
            dynamic_parameters: BTreeSet::new(),
            immutable_parameters: BTreeSet::new(),
            reload_action: None,
            merge_reload_and_restart: None,
            reload_static_params_before_restart: None,
            reload_target_roles: None,
        }
    }

    /// Whether a mixed change must run the dynamic reload in addition to the
    /// restart (`merge_reload_and_restart` explicitly disabled).
    pub fn need_dynamic_reload_action(&self) -> bool {
        self.merge_reload_and_restart == Some(false)
    }

    pub fn is_static(&self, param: &str) -> bool {
        self.static_parameters.contains(param)
    }

    pub fn is_immutable(&self, param: &str) -> bool {
        self.immutable_parameters.contains(param)
    }

    /// Whether `replica_role` is selected for online reloads.
    pub fn selects_role(&self, replica_role: Option<&str>) -> bool {
        match &self.reload_target_roles {
            None => true,
            Some(roles) => replica_role
                .map(|role| roles.iter().any(|r| r == role))
                .unwrap_or(false),
        }
    }
}
