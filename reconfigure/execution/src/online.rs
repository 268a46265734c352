// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Online application of dynamic-only changes
//!
//! The async flavor has nothing to drive: either the database notices the
//! change itself or a file-watch side-car does, so the policy reports
//! convergence immediately.  The sync flavor pushes the changed parameters
//! to each selected replica's side-car and tags it, deferring replicas that
//! are not ready rather than counting them failed.

use crate::PolicyError;
use crate::UpgradePolicy;
use crate::context::ReconfigureContext;
use crate::count_i32;
use async_trait::async_trait;
use corral_types::CONFIG_VERSION_TAG;
use corral_types::PolicyExecStatus;
use corral_types::ReloadPolicy;
use slog::debug;
use slog::info;
use slog::warn;
use slog_error_chain::InlineErrorChain;

pub(crate) struct AsyncReloadPolicy;

#[async_trait]
impl UpgradePolicy for AsyncReloadPolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::AsyncDynamicReload
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        info!(
            log,
            "dynamic change applies without engine action";
            "template" => %ctx.template,
        );
        Ok(PolicyExecStatus::converged(count_i32(ctx.expected_replicas)))
    }
}

pub(crate) struct SyncReloadPolicy;

#[async_trait]
impl UpgradePolicy for SyncReloadPolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::SyncDynamicReload
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        let Some(file_name) = ctx.task_file() else {
            // Template-scoped tasks are restart fallbacks; the resolver
            // never hands one to this policy.
            warn!(log, "online update requires a file-scoped task");
            return Ok(PolicyExecStatus::not_supported());
        };
        let definition = ctx.task_definition();

        let mut replicas = ctx.state.get_replicas(ctx.component()).await?;
        replicas.sort_by_key(|r| r.index);
        let selected: Vec<_> = replicas
            .iter()
            .filter(|r| match definition {
                Some(definition) => definition.selects_role(r.role.as_deref()),
                None => true,
            })
            .collect();

        // Progress counts against the selected subset, not the whole
        // fleet.
        let expected = count_i32(selected.len());
        let target = ctx.target_version;
        let mut succeeded = 0;
        for replica in selected {
            if replica.on_version(target) {
                succeeded += 1;
                continue;
            }
            if !replica.ready {
                debug!(
                    log,
                    "deferring online update for replica that is not ready";
                    "replica" => %replica.name,
                );
                continue;
            }
            if let Err(error) = ctx
                .agent
                .invoke_online_update(replica, file_name, &ctx.task.online_params)
                .await
            {
                warn!(
                    log,
                    "online update failed; will retry on a later pass";
                    "replica" => %replica.name,
                    InlineErrorChain::new(&error),
                );
                return Ok(PolicyExecStatus::failed_and_retry(
                    succeeded, expected,
                ));
            }
            ctx.state
                .tag_replica(
                    ctx.component(),
                    &replica.name,
                    CONFIG_VERSION_TAG,
                    target,
                )
                .await?;
            succeeded += 1;
        }

        if succeeded == expected {
            Ok(PolicyExecStatus::converged(expected))
        } else {
            Ok(PolicyExecStatus::retrying(succeeded, expected))
        }
    }
}

#[cfg(test)]
mod test {
    use crate::PolicyTable;
    use crate::context::ReconfigureContext;
    use crate::settings::ReconfigureSettings;
    use crate::test_helpers::SimFleet;
    use crate::test_helpers::sync_task;
    use crate::test_helpers::template;
    use corral_test_utils::LogContext;
    use corral_types::ExecStatus;
    use corral_types::ParametersDefinition;
    use corral_types::PolicyExecStatus;
    use std::collections::BTreeMap;

    async fn run_pass(
        log: &slog::Logger,
        fleet: &SimFleet,
        definitions: &BTreeMap<String, ParametersDefinition>,
        expected_replicas: usize,
    ) -> PolicyExecStatus {
        let table = PolicyTable::new();
        let template = template();
        let task = sync_task("my.cnf", &[("max_connections", "200")]);
        let patch = Default::default();
        let settings = ReconfigureSettings::default();
        let ctx = ReconfigureContext {
            template: &template,
            target_version: "target-v2",
            expected_replicas,
            patch: &patch,
            definitions,
            task: &task,
            settings: &settings,
            state: fleet,
            agent: fleet,
        };
        table.execute(log, &ctx).await.expect("sync pass runs")
    }

    fn definitions() -> BTreeMap<String, ParametersDefinition> {
        [("my.cnf".to_string(), ParametersDefinition::new("my.cnf"))].into()
    }

    #[tokio::test]
    async fn test_pushes_params_and_tags_each_replica() {
        let logctx = LogContext::new("sync_pushes_params");
        let fleet = SimFleet::healthy(3);
        let status =
            run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(status.exec_status, ExecStatus::None);
        assert_eq!(status.succeed_count, 3);

        let updates = fleet.online_updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].0, "replica-0");
        assert_eq!(updates[0].1, "my.cnf");
        assert_eq!(updates[0].2.get("max_connections").unwrap(), "200");
        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_already_tagged_replicas_are_skipped() {
        let logctx = LogContext::new("sync_idempotent");
        let fleet = SimFleet::healthy(3);
        let first = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(first.exec_status, ExecStatus::None);

        // Re-invoking with no intervening change issues no further calls.
        let second = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(first, second);
        assert_eq!(fleet.online_updates().len(), 3);
        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_unready_replicas_are_deferred_not_failed() {
        let logctx = LogContext::new("sync_defers_unready");
        let fleet = SimFleet::healthy(3);
        fleet.set_ready("replica-1", false);
        let status = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(status.exec_status, ExecStatus::Retry);
        assert_eq!(status.succeed_count, 2);
        assert_eq!(status.expected_count, 3);

        fleet.set_ready("replica-1", true);
        let status = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(status.exec_status, ExecStatus::None);
        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_role_restriction_shrinks_expected() {
        let logctx = LogContext::new("sync_role_restricted");
        let fleet = SimFleet::healthy(3);
        fleet.set_role("replica-0", "primary");
        fleet.set_role("replica-1", "secondary");
        fleet.set_role("replica-2", "secondary");

        let mut definitions = definitions();
        definitions.get_mut("my.cnf").unwrap().reload_target_roles =
            Some(vec!["primary".to_string()]);

        let status = run_pass(&logctx.log, &fleet, &definitions, 3).await;
        assert_eq!(status.exec_status, ExecStatus::None);
        assert_eq!(status.succeed_count, 1);
        assert_eq!(status.expected_count, 1);
        assert_eq!(fleet.online_updates().len(), 1);
        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rpc_failure_is_transient_with_progress() {
        let logctx = LogContext::new("sync_rpc_failure");
        let fleet = SimFleet::healthy(3);
        fleet.fail_agent_calls_for("replica-1");
        let status = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(status.exec_status, ExecStatus::FailedAndRetry);
        assert_eq!(status.succeed_count, 1, "replica-0 had converged");

        fleet.allow_agent_calls_for("replica-1");
        let status = run_pass(&logctx.log, &fleet, &definitions(), 3).await;
        assert_eq!(status.exec_status, ExecStatus::None);
        logctx.cleanup_successful();
    }
}
