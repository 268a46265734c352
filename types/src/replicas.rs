// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identities and observations of the replicas being reconfigured

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Tag key under which each replica records the config version it has
/// applied.  This tag is the authoritative, externally persisted "done"
/// marker for that replica: the engine is re-invoked fresh each reconcile
/// pass and reconstructs all progress from it.
pub const CONFIG_VERSION_TAG: &str = "config.corral.dev/version";

/// Annotation key used by the restart policy to nudge the workload
/// controller for `template`.  The value is the target version hash, so
/// repeated writes for the same revision are idempotent.
pub fn restart_annotation_key(template: &str) -> String {
    format!("config.corral.dev/restart-{}", template)
}

/// Identifies one database component within a cluster
#[derive(
    Debug,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    JsonSchema,
    Deserialize,
    Serialize,
)]
pub struct ComponentRef {
    pub cluster: String,
    pub component: String,
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.component)
    }
}

/// Identifies one rendered config template of a component
#[derive(
    Debug,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    JsonSchema,
    Deserialize,
    Serialize,
)]
pub struct TemplateRef {
    pub component: ComponentRef,
    pub name: String,
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.name)
    }
}

/// One reconcile pass's view of a single replica
///
/// `available` means the replica has been ready for at least the configured
/// `min_ready_seconds`; `ready` alone means it passes its readiness checks
/// but has not yet been ready that long.  The distinction is what keeps the
/// rolling window from advancing onto a replica that only just came up.
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
pub struct ReplicaObservation {
    pub name: String,

    /// stable ordinal of this replica within its component; rolling updates
    /// sweep in ordinal order
    pub index: u32,

    pub ready: bool,
    pub available: bool,

    /// config version recorded on the replica (the [`CONFIG_VERSION_TAG`]
    /// tag), if any
    pub version_tag: Option<String>,

    /// replica role reported by the database (e.g. "primary"), if known
    pub role: Option<String>,

    /// owning workload object, for debugging
    pub owner: Option<String>,
}

impl ReplicaObservation {
    /// Whether this replica has recorded `version` as applied.
    pub fn on_version(&self, version: &str) -> bool {
        self.version_tag.as_deref() == Some(version)
    }
}
