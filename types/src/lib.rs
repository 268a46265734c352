// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared across corral's configuration reconfiguration engine
//!
//! This crate defines the data model that flows through a reconfiguration:
//! the structured patch produced from a config-file change, the per-file
//! parameter metadata that drives policy selection, the policy and status
//! enums, the per-revision phase machine, and the revision/version tracker.
//! It also defines the traits through which the engine reaches the outside
//! world (the resource store and each replica's management side-car); the
//! engine itself holds no state between reconcile passes, so everything it
//! needs must be reconstructable from these types and those traits.

mod config;
mod external;
mod phase;
mod policy;
mod replicas;
mod versioning;

pub use config::ConfigPatchInfo;
pub use config::ParametersDefinition;
pub use config::ReloadAction;
pub use external::AgentError;
pub use external::ClusterState;
pub use external::ReplicaAgent;
pub use external::StoreError;
pub use phase::ParameterPhase;
pub use policy::ExecStatus;
pub use policy::PolicyExecStatus;
pub use policy::ReloadPolicy;
pub use policy::UNCONFIRMED_COUNT;
pub use replicas::ComponentRef;
pub use replicas::ReplicaObservation;
pub use replicas::TemplateRef;
pub use replicas::CONFIG_VERSION_TAG;
pub use replicas::restart_annotation_key;
pub use versioning::compute_version_hash;
pub use versioning::ConfigurationRevision;
pub use versioning::ReconfigureResult;
pub use versioning::RevisionHistory;
pub use versioning::DEFAULT_REVISION_HISTORY_LIMIT;
