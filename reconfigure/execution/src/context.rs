// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-invocation context handed to a policy

use crate::settings::ReconfigureSettings;
use corral_reconfigure_planning::ReconfigureTask;
use corral_reconfigure_planning::TaskScope;
use corral_types::ClusterState;
use corral_types::ComponentRef;
use corral_types::ConfigPatchInfo;
use corral_types::ParametersDefinition;
use corral_types::ReloadAction;
use corral_types::ReplicaAgent;
use corral_types::TemplateRef;
use std::collections::BTreeMap;

/// Everything one policy invocation may look at
///
/// Borrowed for the duration of the invocation; the policy writes nothing
/// here.  Durable effects go through `state` (tags, annotations) and
/// `agent` (side-car calls).
pub struct ReconfigureContext<'a> {
    pub template: &'a TemplateRef,

    /// content hash of the rendered target snapshot; replicas converge
    /// toward carrying this as their version tag
    pub target_version: &'a str,

    /// replica count the component is supposed to have
    pub expected_replicas: usize,

    pub patch: &'a ConfigPatchInfo,
    pub definitions: &'a BTreeMap<String, ParametersDefinition>,
    pub task: &'a ReconfigureTask,
    pub settings: &'a ReconfigureSettings,

    pub state: &'a dyn ClusterState,
    pub agent: &'a dyn ReplicaAgent,
}

impl ReconfigureContext<'_> {
    pub fn component(&self) -> &ComponentRef {
        &self.template.component
    }

    /// The file this task covers, if it is file-scoped.
    pub fn task_file(&self) -> Option<&str> {
        match &self.task.scope {
            TaskScope::File(name) => Some(name),
            TaskScope::Template => None,
        }
    }

    pub fn task_definition(&self) -> Option<&ParametersDefinition> {
        self.task_file().and_then(|file| self.definitions.get(file))
    }

    /// The reload action to fire per replica for restart-style waves, if
    /// one applies.  Auto triggers never apply a static change, so they are
    /// excluded; without a usable action the wave falls back to a process
    /// restart through the side-car.
    pub fn wave_reload_action(&self) -> Option<&ReloadAction> {
        self.task_definition()
            .and_then(|definition| definition.reload_action.as_ref())
            .filter(|action| !action.is_auto())
    }
}
