// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Execution of resolved reconfiguration policies
//!
//! Each policy makes one attempt per invocation to move the fleet toward
//! the target config version and reports how far it got; the caller runs
//! the reconcile pass in a loop to deal with transient errors and changes
//! in the underlying system.  Policies are stateless: all progress lives in
//! externally persisted per-replica version tags and is reconstructed from
//! observation on every pass.

use async_trait::async_trait;
use corral_types::AgentError;
use corral_types::PolicyExecStatus;
use corral_types::ReloadPolicy;
use corral_types::StoreError;
use slog::warn;
use std::collections::BTreeMap;
use thiserror::Error;

mod combined;
mod context;
mod online;
mod reconcile;
mod restart;
mod rolling;
mod settings;
#[cfg(test)]
mod test_helpers;

pub use context::ReconfigureContext;
pub use reconcile::ReconcileOutcome;
pub use reconcile::ReconcilePassArgs;
pub use reconcile::run_reconfigure_pass;
pub use settings::ReconfigureSettings;
pub use settings::RollingOrder;
pub use settings::SettingsError;

use combined::CombinedPolicy;
use online::AsyncReloadPolicy;
use online::SyncReloadPolicy;
use restart::ParallelRestartPolicy;
use restart::WorkloadRestartPolicy;
use rolling::RollingUpgradePolicy;

/// Failure inside a policy invocation
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("cannot access cluster state")]
    Store(#[from] StoreError),

    #[error("side-car call failed")]
    Agent(#[from] AgentError),
}

impl PolicyError {
    /// Whether re-invoking on a later pass can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PolicyError::Store(error) => error.is_transient(),
            PolicyError::Agent(_) => true,
        }
    }
}

/// One reconfiguration policy
///
/// Implementations take the current observations and make bounded forward
/// progress; they must be idempotent, since the same invocation is repeated
/// until the fleet converges.
#[async_trait]
pub trait UpgradePolicy: Send + Sync {
    fn policy(&self) -> ReloadPolicy;

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError>;
}

/// Dispatch table from policy kind to implementation
///
/// Built explicitly at startup; there is no global registry, so the set of
/// supported policies is visible right here.
pub struct PolicyTable {
    policies: BTreeMap<ReloadPolicy, Box<dyn UpgradePolicy>>,
}

impl PolicyTable {
    pub fn new() -> PolicyTable {
        let implementations: Vec<Box<dyn UpgradePolicy>> = vec![
            Box::new(AsyncReloadPolicy),
            Box::new(SyncReloadPolicy),
            Box::new(WorkloadRestartPolicy),
            Box::new(ParallelRestartPolicy),
            Box::new(RollingUpgradePolicy),
            Box::new(CombinedPolicy),
        ];
        let policies = implementations
            .into_iter()
            .map(|implementation| (implementation.policy(), implementation))
            .collect();
        PolicyTable { policies }
    }

    /// Runs the policy resolved for `ctx.task`
    ///
    /// A policy with no implementation reports `NotSupport`: that is a
    /// configuration error, not a transient one.
    pub async fn execute(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        match self.policies.get(&ctx.task.policy) {
            Some(implementation) => implementation.upgrade(log, ctx).await,
            None => {
                warn!(
                    log,
                    "no implementation for resolved reload policy";
                    "policy" => %ctx.task.policy,
                );
                Ok(PolicyExecStatus::not_supported())
            }
        }
    }
}

impl Default for PolicyTable {
    fn default() -> PolicyTable {
        PolicyTable::new()
    }
}

/// Merges the statuses of an ordered chain of sub-policies
///
/// The rule is "the last sub-policy's status wins", faithful to how the
/// combined policy has always reported.  Note the known anomaly: a chain of
/// `Retry` followed by `None` reports `None` even though the earlier leg is
/// still in progress.  Changing that precedence needs a product decision;
/// this function exists so the rule is explicit and tested rather than an
/// accident of control flow.
pub fn merge_exec_status(statuses: &[PolicyExecStatus]) -> PolicyExecStatus {
    statuses
        .last()
        .copied()
        .unwrap_or_else(|| PolicyExecStatus::converged(0))
}

pub(crate) fn count_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod test {
    use super::PolicyTable;
    use super::merge_exec_status;
    use corral_types::ExecStatus;
    use corral_types::PolicyExecStatus;
    use corral_types::ReloadPolicy;

    #[test]
    fn test_table_covers_every_executable_policy() {
        let table = PolicyTable::new();
        for policy in [
            ReloadPolicy::AsyncDynamicReload,
            ReloadPolicy::SyncDynamicReload,
            ReloadPolicy::Restart,
            ReloadPolicy::Parallel,
            ReloadPolicy::Rolling,
            ReloadPolicy::DynamicReloadAndRestart,
        ] {
            assert!(
                table.policies.contains_key(&policy),
                "missing implementation for {}",
                policy
            );
        }
        // `None` means "nothing to do"; the resolver never emits a task for
        // it, so there is intentionally no implementation.
        assert!(!table.policies.contains_key(&ReloadPolicy::None));
    }

    #[test]
    fn test_merge_takes_last_status() {
        let merged = merge_exec_status(&[
            PolicyExecStatus::converged(3),
            PolicyExecStatus::retrying(1, 3),
        ]);
        assert_eq!(merged.exec_status, ExecStatus::Retry);

        // The documented anomaly: an in-progress leg is masked by a
        // converged final leg.
        let merged = merge_exec_status(&[
            PolicyExecStatus::retrying(1, 3),
            PolicyExecStatus::converged(3),
        ]);
        assert_eq!(merged.exec_status, ExecStatus::None);
    }
}
