// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconfiguration policies and per-invocation execution status

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Replica counts below zero mean "not yet confirmed": the policy has not
/// observed enough state to know how many replicas it covers.
pub const UNCONFIRMED_COUNT: i32 = -1;

/// How a configuration change is driven out to the fleet
///
/// This is a pure function of the patch classification and the file's
/// declared reload capability.  It is recomputed on every reconcile pass and
/// never persisted as intent, so a change to the parameter metadata takes
/// effect on the very next pass.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    JsonSchema,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ReloadPolicy {
    /// nothing to do
    None,
    /// annotate the workload and let its controller restart the replicas
    Restart,
    /// apply the dynamic portion online, then restart (combined)
    DynamicReloadAndRestart,
    /// a file-watch side-car or the database itself applies the change
    AsyncDynamicReload,
    /// push parameters to each replica's side-car over RPC
    SyncDynamicReload,
    /// restart replicas one bounded window at a time
    Rolling,
    /// restart every stale replica immediately, no windowing
    Parallel,
}

/// Outcome of one policy invocation
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    JsonSchema,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "PascalCase")]
pub enum ExecStatus {
    /// fully converged; no further invocations needed for this revision
    None,
    /// in progress; re-invoke on a later reconcile pass
    Retry,
    /// terminal failure; do not retry
    Failed,
    /// transient failure; safe to re-invoke
    FailedAndRetry,
    /// the resolved policy has no implementation (configuration error)
    NotSupport,
}

impl ExecStatus {
    /// Whether the caller should schedule another reconcile pass.
    pub fn needs_retry(&self) -> bool {
        matches!(self, ExecStatus::Retry | ExecStatus::FailedAndRetry)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecStatus::Failed
                | ExecStatus::FailedAndRetry
                | ExecStatus::NotSupport
        )
    }
}

/// Execution status plus per-replica progress counts
///
/// Progress is always counted per replica so that a reconfiguration that has
/// converged 3 of 5 replicas reports exactly that, not an opaque boolean.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, JsonSchema, Deserialize, Serialize,
)]
pub struct PolicyExecStatus {
    pub exec_status: ExecStatus,
    /// replicas confirmed on the target version ([`UNCONFIRMED_COUNT`] until
    /// known)
    pub succeed_count: i32,
    /// replicas this policy must converge ([`UNCONFIRMED_COUNT`] until known)
    pub expected_count: i32,
}

impl PolicyExecStatus {
    /// Fully converged: every expected replica is on the target version.
    pub fn converged(expected_count: i32) -> PolicyExecStatus {
        PolicyExecStatus {
            exec_status: ExecStatus::None,
            succeed_count: expected_count,
            expected_count,
        }
    }

    /// In progress; the caller should re-invoke later.
    pub fn retrying(succeed_count: i32, expected_count: i32) -> PolicyExecStatus {
        PolicyExecStatus {
            exec_status: ExecStatus::Retry,
            succeed_count,
            expected_count,
        }
    }

    /// Transient failure with whatever progress was observed.
    pub fn failed_and_retry(
        succeed_count: i32,
        expected_count: i32,
    ) -> PolicyExecStatus {
        PolicyExecStatus {
            exec_status: ExecStatus::FailedAndRetry,
            succeed_count,
            expected_count,
        }
    }

    /// Terminal failure.
    pub fn failed(succeed_count: i32, expected_count: i32) -> PolicyExecStatus {
        PolicyExecStatus {
            exec_status: ExecStatus::Failed,
            succeed_count,
            expected_count,
        }
    }

    /// Status with no confirmed counts at all.
    pub fn unconfirmed(exec_status: ExecStatus) -> PolicyExecStatus {
        PolicyExecStatus {
            exec_status,
            succeed_count: UNCONFIRMED_COUNT,
            expected_count: UNCONFIRMED_COUNT,
        }
    }

    pub fn not_supported() -> PolicyExecStatus {
        PolicyExecStatus::unconfirmed(ExecStatus::NotSupport)
    }
}
