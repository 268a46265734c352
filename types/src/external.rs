// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces to the engine's external collaborators
//!
//! The engine owns no store and no network listener.  Everything it reads or
//! writes outside its own arguments goes through these two traits: the
//! resource store that backs cluster state, and the management side-car
//! running next to each replica.  Implementations live in the orchestrator;
//! tests use in-memory fakes.

use crate::config::ReloadAction;
use crate::replicas::ComponentRef;
use crate::replicas::ReplicaObservation;
use crate::replicas::TemplateRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from the backing resource store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflicting write: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether a retry on a later reconcile pass can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::NotFound(_) => false,
            StoreError::Unavailable(_) | StoreError::Conflict(_) => true,
        }
    }
}

/// Errors from a replica's management side-car
///
/// All side-car failures are treated as transient: the call is retried on a
/// later pass, bounded only by the orchestrator's backoff.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("cannot connect to side-car on {replica}: {message}")]
    Connect { replica: String, message: String },

    #[error("reload command on {replica} exited with status {code}: {stderr}")]
    Exec { replica: String, code: i32, stderr: String },

    #[error("online update RPC to {replica} failed: {message}")]
    Rpc { replica: String, message: String },
}

/// Read/write access to the externally persisted cluster state
///
/// All writes are idempotent: the engine may repeat any of them on a later
/// pass after a crash, and the write of a replica's version tag doubles as
/// that replica's atomic "done" marker.
#[async_trait]
pub trait ClusterState: Send + Sync {
    /// Current replicas of `component`, in no particular order.
    async fn get_replicas(
        &self,
        component: &ComponentRef,
    ) -> Result<Vec<ReplicaObservation>, StoreError>;

    /// Idempotent label/annotation write on one replica.
    async fn tag_replica(
        &self,
        component: &ComponentRef,
        replica: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Idempotent annotation write on the component's desired-state object
    /// (used by the restart policy; the workload controller reacts to it).
    async fn annotate_component(
        &self,
        component: &ComponentRef,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// The file contents most recently applied for `template`, if any.
    async fn get_last_applied_snapshot(
        &self,
        template: &TemplateRef,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError>;

    async fn set_last_applied_snapshot(
        &self,
        template: &TemplateRef,
        files: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Bounded revision-history entries stored on the owning resource,
    /// keyed by stringified revision number.
    async fn read_revision_entries(
        &self,
        template: &TemplateRef,
    ) -> Result<BTreeMap<String, String>, StoreError>;

    async fn write_revision_entries(
        &self,
        template: &TemplateRef,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;
}

/// Connection to the management side-car of a live replica
#[async_trait]
pub trait ReplicaAgent: Send + Sync {
    /// Fire the file-level reload mechanism on one replica (signal, shell
    /// command, or templated script).
    async fn invoke_reload(
        &self,
        replica: &ReplicaObservation,
        reload: &ReloadAction,
    ) -> Result<(), AgentError>;

    /// Push updated parameters for one file to the replica's side-car.
    async fn invoke_online_update(
        &self,
        replica: &ReplicaObservation,
        file_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), AgentError>;

    /// Restart the database process on one replica (used by the restart
    /// policies that drive replicas directly instead of going through the
    /// workload controller).
    async fn invoke_restart(
        &self,
        replica: &ReplicaObservation,
    ) -> Result<(), AgentError>;
}
