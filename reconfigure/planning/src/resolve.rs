// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolving a classified patch onto reload policies
//!
//! One task per changed file, in file-name order, so repeated passes over
//! the same inputs produce the same task list.  Restart is the universal
//! fallback: any change the resolver cannot otherwise characterize (no
//! parameter metadata, no reload action for a hot change) collapses into a
//! single restart task covering the whole template.

use crate::classify::FileChangeClass;
use corral_types::ConfigPatchInfo;
use corral_types::ParametersDefinition;
use corral_types::ReloadPolicy;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::info;
use slog::warn;
use std::collections::BTreeMap;

/// How a restart is carried out when one is needed
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    JsonSchema,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RestartStrategy {
    /// annotate the workload object and let its controller roll the
    /// replicas
    #[default]
    Workload,
    /// the engine restarts replicas itself, one bounded window at a time
    Rolling,
    /// the engine restarts every stale replica at once
    Parallel,
}

impl RestartStrategy {
    pub fn policy(&self) -> ReloadPolicy {
        match self {
            RestartStrategy::Workload => ReloadPolicy::Restart,
            RestartStrategy::Rolling => ReloadPolicy::Rolling,
            RestartStrategy::Parallel => ReloadPolicy::Parallel,
        }
    }
}

/// What a task covers
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TaskScope {
    /// one config file's change
    File(String),
    /// the whole template (restart fallback)
    Template,
}

/// One resolved unit of reconfiguration work
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReconfigureTask {
    pub policy: ReloadPolicy,
    pub scope: TaskScope,
    /// parameters to push over the online-update RPC, for the policies
    /// that do so
    pub online_params: BTreeMap<String, String>,
}

impl ReconfigureTask {
    fn template_restart(strategy: RestartStrategy) -> ReconfigureTask {
        ReconfigureTask {
            policy: strategy.policy(),
            scope: TaskScope::Template,
            online_params: BTreeMap::new(),
        }
    }
}

/// Maps each changed file onto a reload policy
///
/// `patch` is `None` when there is nothing to diff against (e.g. a forced
/// reconfiguration); that, like a changed file without usable metadata,
/// resolves to the single whole-template restart fallback.
pub fn resolve_reload_policies(
    log: &slog::Logger,
    patch: Option<&ConfigPatchInfo>,
    classes: &BTreeMap<String, FileChangeClass>,
    definitions: &BTreeMap<String, ParametersDefinition>,
    restart_strategy: RestartStrategy,
) -> Vec<ReconfigureTask> {
    let Some(patch) = patch else {
        info!(log, "no patch available; falling back to restart");
        return vec![ReconfigureTask::template_restart(restart_strategy)];
    };
    if !patch.is_modify {
        return Vec::new();
    }

    let mut tasks = Vec::new();
    for file_name in patch.changed_files() {
        let (Some(class), Some(definition)) =
            (classes.get(&file_name), definitions.get(&file_name))
        else {
            warn!(
                log,
                "changed file has no parameter metadata; falling back to \
                 whole-template restart";
                "file" => %file_name,
            );
            return vec![ReconfigureTask::template_restart(restart_strategy)];
        };

        let task = if !class.all_dynamic
            && definition.need_dynamic_reload_action()
        {
            ReconfigureTask {
                policy: ReloadPolicy::DynamicReloadAndRestart,
                scope: TaskScope::File(file_name.clone()),
                online_params: online_params(patch, class, definition),
            }
        } else if !class.all_dynamic {
            ReconfigureTask {
                policy: restart_strategy.policy(),
                scope: TaskScope::File(file_name.clone()),
                online_params: BTreeMap::new(),
            }
        } else {
            match &definition.reload_action {
                None => {
                    warn!(
                        log,
                        "dynamic change but no reload action declared; \
                         falling back to whole-template restart";
                        "file" => %file_name,
                    );
                    return vec![ReconfigureTask::template_restart(
                        restart_strategy,
                    )];
                }
                Some(action) if action.is_auto() => ReconfigureTask {
                    policy: ReloadPolicy::AsyncDynamicReload,
                    scope: TaskScope::File(file_name.clone()),
                    online_params: BTreeMap::new(),
                },
                Some(action) if action.is_sync_trigger() => ReconfigureTask {
                    policy: ReloadPolicy::SyncDynamicReload,
                    scope: TaskScope::File(file_name.clone()),
                    online_params: online_params(patch, class, definition),
                },
                // A file-watch side-car picks the change up on its own.
                Some(_) => ReconfigureTask {
                    policy: ReloadPolicy::AsyncDynamicReload,
                    scope: TaskScope::File(file_name.clone()),
                    online_params: BTreeMap::new(),
                },
            }
        };
        info!(
            log,
            "resolved reload policy";
            "file" => %file_name,
            "policy" => %task.policy,
        );
        tasks.push(task);
    }
    tasks
}

/// The key/values to push online: written dynamic parameters, plus written
/// static ones when the definition asks for statics to be pre-loaded
/// before the restart.
fn online_params(
    patch: &ConfigPatchInfo,
    class: &FileChangeClass,
    definition: &ParametersDefinition,
) -> BTreeMap<String, String> {
    let include_static =
        definition.reload_static_params_before_restart == Some(true);
    patch
        .written_params(&class.file_name)
        .into_iter()
        .filter(|(key, _)| {
            class.dynamic_params.contains(key)
                || (include_static && class.static_params.contains(key))
        })
        .collect()
}
