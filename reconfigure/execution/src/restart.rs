// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Restart-based policies
//!
//! The workload flavor is a single idempotent annotation write: the
//! workload controller notices the changed value and rolls the replicas on
//! its own, so convergence is delegated rather than observed here.  The
//! parallel flavor drives every stale replica itself, all at once, for
//! components where simultaneous unavailability is acceptable.

use crate::PolicyError;
use crate::UpgradePolicy;
use crate::context::ReconfigureContext;
use crate::count_i32;
use async_trait::async_trait;
use corral_types::CONFIG_VERSION_TAG;
use corral_types::PolicyExecStatus;
use corral_types::ReloadPolicy;
use corral_types::restart_annotation_key;
use slog::info;
use slog::warn;
use slog_error_chain::InlineErrorChain;

pub(crate) struct WorkloadRestartPolicy;

#[async_trait]
impl UpgradePolicy for WorkloadRestartPolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::Restart
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        let key = restart_annotation_key(&ctx.template.name);
        ctx.state
            .annotate_component(ctx.component(), &key, ctx.target_version)
            .await?;
        info!(
            log,
            "requested workload restart";
            "template" => %ctx.template,
            "target" => ctx.target_version,
        );
        Ok(PolicyExecStatus::converged(count_i32(ctx.expected_replicas)))
    }
}

pub(crate) struct ParallelRestartPolicy;

#[async_trait]
impl UpgradePolicy for ParallelRestartPolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::Parallel
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        let expected = count_i32(ctx.expected_replicas);
        let mut replicas = ctx.state.get_replicas(ctx.component()).await?;
        replicas.sort_by_key(|r| r.index);

        let target = ctx.target_version;
        let mut succeeded =
            count_i32(replicas.iter().filter(|r| r.on_version(target)).count());
        for replica in &replicas {
            if replica.on_version(target) {
                continue;
            }
            info!(
                log,
                "restarting replica";
                "replica" => %replica.name,
                "target" => target,
            );
            let result = match ctx.wave_reload_action() {
                Some(action) => ctx.agent.invoke_reload(replica, action).await,
                None => ctx.agent.invoke_restart(replica).await,
            };
            if let Err(error) = result {
                warn!(
                    log,
                    "restart failed; will retry on a later pass";
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
            // Replicas are missing from observation (scale-up in flight);
            // let a later pass pick them up.
            Ok(PolicyExecStatus::retrying(succeeded, expected))
        }
    }
}
