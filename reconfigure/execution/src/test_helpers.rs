// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated fleet for policy and driver tests
//!
//! [`SimFleet`] implements both external traits over in-memory state and
//! records every side-car call, so tests can assert not just the reported
//! status but exactly which replicas were touched, in what order.

use async_trait::async_trait;
use corral_types::AgentError;
use corral_types::ClusterState;
use corral_types::ComponentRef;
use corral_types::ReloadAction;
use corral_types::ReplicaAgent;
use corral_types::ReplicaObservation;
use corral_types::StoreError;
use corral_types::TemplateRef;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

pub(crate) fn template() -> TemplateRef {
    TemplateRef {
        component: ComponentRef {
            cluster: "orders".to_string(),
            component: "mysql".to_string(),
        },
        name: "mysql-config".to_string(),
    }
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub(crate) fn rolling_task() -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::Rolling,
        scope: corral_reconfigure_planning::TaskScope::Template,
        online_params: BTreeMap::new(),
    }
}

pub(crate) fn restart_task() -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::Restart,
        scope: corral_reconfigure_planning::TaskScope::Template,
        online_params: BTreeMap::new(),
    }
}

pub(crate) fn parallel_task() -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::Parallel,
        scope: corral_reconfigure_planning::TaskScope::Template,
        online_params: BTreeMap::new(),
    }
}

pub(crate) fn parallel_file_task(
    file: &str,
) -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::Parallel,
        scope: corral_reconfigure_planning::TaskScope::File(file.to_string()),
        online_params: BTreeMap::new(),
    }
}

pub(crate) fn sync_task(
    file: &str,
    online: &[(&str, &str)],
) -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::SyncDynamicReload,
        scope: corral_reconfigure_planning::TaskScope::File(file.to_string()),
        online_params: params(online),
    }
}

pub(crate) fn combined_task(
    file: &str,
    online: &[(&str, &str)],
) -> corral_reconfigure_planning::ReconfigureTask {
    corral_reconfigure_planning::ReconfigureTask {
        policy: corral_types::ReloadPolicy::DynamicReloadAndRestart,
        scope: corral_reconfigure_planning::TaskScope::File(file.to_string()),
        online_params: params(online),
    }
}

#[derive(Default)]
struct FleetInner {
    replicas: Vec<ReplicaObservation>,
    component_annotations: BTreeMap<String, String>,
    snapshots: BTreeMap<String, BTreeMap<String, String>>,
    revision_entries: BTreeMap<String, BTreeMap<String, String>>,
    restart_calls: Vec<String>,
    reload_calls: Vec<(String, ReloadAction)>,
    online_update_calls: Vec<(String, String, BTreeMap<String, String>)>,
    failing_replicas: BTreeSet<String>,
    fail_store_writes: bool,
}

pub(crate) struct SimFleet {
    inner: Mutex<FleetInner>,
}

impl SimFleet {
    /// `count` replicas, all ready, available, and on no recorded version.
    pub fn healthy(count: usize) -> SimFleet {
        let replicas = (0..count)
            .map(|index| ReplicaObservation {
                name: format!("replica-{}", index),
                index: index as u32,
                ready: true,
                available: true,
                version_tag: None,
                role: None,
                owner: Some("mysql".to_string()),
            })
            .collect();
        SimFleet {
            inner: Mutex::new(FleetInner {
                replicas,
                ..FleetInner::default()
            }),
        }
    }

    fn with_replica(&self, name: &str, update: impl FnOnce(&mut ReplicaObservation)) {
        let mut inner = self.inner.lock().unwrap();
        let replica = inner
            .replicas
            .iter_mut()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no replica named {}", name));
        update(replica);
    }

    /// A replica that is not ready is certainly not available either.
    pub fn set_ready(&self, name: &str, ready: bool) {
        self.with_replica(name, |replica| {
            replica.ready = ready;
            if !ready {
                replica.available = false;
            }
        });
    }

    pub fn set_available(&self, name: &str, available: bool) {
        self.with_replica(name, |replica| replica.available = available);
    }

    pub fn set_version_tag(&self, name: &str, version: &str) {
        self.with_replica(name, |replica| {
            replica.version_tag = Some(version.to_string())
        });
    }

    pub fn set_role(&self, name: &str, role: &str) {
        self.with_replica(name, |replica| {
            replica.role = Some(role.to_string())
        });
    }

    pub fn fail_agent_calls_for(&self, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_replicas
            .insert(name.to_string());
    }

    pub fn allow_agent_calls_for(&self, name: &str) {
        self.inner.lock().unwrap().failing_replicas.remove(name);
    }

    pub fn fail_store_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_store_writes = fail;
    }

    pub fn restarted(&self) -> Vec<String> {
        self.inner.lock().unwrap().restart_calls.clone()
    }

    pub fn reloaded(&self) -> Vec<(String, ReloadAction)> {
        self.inner.lock().unwrap().reload_calls.clone()
    }

    pub fn online_updates(
        &self,
    ) -> Vec<(String, String, BTreeMap<String, String>)> {
        self.inner.lock().unwrap().online_update_calls.clone()
    }

    pub fn component_annotation(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().component_annotations.get(key).cloned()
    }

    pub fn snapshot_replicas(&self) -> Vec<ReplicaObservation> {
        let mut replicas = self.inner.lock().unwrap().replicas.clone();
        replicas.sort_by_key(|r| r.index);
        replicas
    }

    pub fn seed_snapshot(
        &self,
        template: &TemplateRef,
        files: &BTreeMap<String, String>,
    ) {
        self.inner
            .lock()
            .unwrap()
            .snapshots
            .insert(template.to_string(), files.clone());
    }

    pub fn revision_entries(
        &self,
        template: &TemplateRef,
    ) -> BTreeMap<String, String> {
        self.inner
            .lock()
            .unwrap()
            .revision_entries
            .get(&template.to_string())
            .cloned()
            .unwrap_or_default()
    }

    fn check_agent(&self, name: &str) -> Result<(), AgentError> {
        if self.inner.lock().unwrap().failing_replicas.contains(name) {
            Err(AgentError::Rpc {
                replica: name.to_string(),
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn check_store_write(&self) -> Result<(), StoreError> {
        if self.inner.lock().unwrap().fail_store_writes {
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ClusterState for SimFleet {
    async fn get_replicas(
        &self,
        _component: &ComponentRef,
    ) -> Result<Vec<ReplicaObservation>, StoreError> {
        Ok(self.inner.lock().unwrap().replicas.clone())
    }

    async fn tag_replica(
        &self,
        _component: &ComponentRef,
        replica: &str,
        _key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.check_store_write()?;
        let mut inner = self.inner.lock().unwrap();
        let observation = inner
            .replicas
            .iter_mut()
            .find(|r| r.name == replica)
            .ok_or_else(|| StoreError::NotFound(replica.to_string()))?;
        observation.version_tag = Some(value.to_string());
        Ok(())
    }

    async fn annotate_component(
        &self,
        _component: &ComponentRef,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.check_store_write()?;
        self.inner
            .lock()
            .unwrap()
            .component_annotations
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_last_applied_snapshot(
        &self,
        template: &TemplateRef,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .snapshots
            .get(&template.to_string())
            .cloned())
    }

    async fn set_last_applied_snapshot(
        &self,
        template: &TemplateRef,
        files: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.check_store_write()?;
        self.inner
            .lock()
            .unwrap()
            .snapshots
            .insert(template.to_string(), files.clone());
        Ok(())
    }

    async fn read_revision_entries(
        &self,
        template: &TemplateRef,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .revision_entries
            .get(&template.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn write_revision_entries(
        &self,
        template: &TemplateRef,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.check_store_write()?;
        self.inner
            .lock()
            .unwrap()
            .revision_entries
            .insert(template.to_string(), entries.clone());
        Ok(())
    }
}

#[async_trait]
impl ReplicaAgent for SimFleet {
    async fn invoke_reload(
        &self,
        replica: &ReplicaObservation,
        reload: &ReloadAction,
    ) -> Result<(), AgentError> {
        self.check_agent(&replica.name)?;
        self.inner
            .lock()
            .unwrap()
            .reload_calls
            .push((replica.name.clone(), reload.clone()));
        Ok(())
    }

    async fn invoke_online_update(
        &self,
        replica: &ReplicaObservation,
        file_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), AgentError> {
        self.check_agent(&replica.name)?;
        self.inner.lock().unwrap().online_update_calls.push((
            replica.name.clone(),
            file_name.to_string(),
            params.clone(),
        ));
        Ok(())
    }

    async fn invoke_restart(
        &self,
        replica: &ReplicaObservation,
    ) -> Result<(), AgentError> {
        self.check_agent(&replica.name)?;
        self.inner
            .lock()
            .unwrap()
            .restart_calls
            .push(replica.name.clone());
        Ok(())
    }
}
