// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The combined reload-then-restart policy
//!
//! For mixed changes whose definition keeps dynamic reload separate from
//! the restart: first the dynamic portion goes out online (sync or async,
//! per the declared reload action), then the restart runs.  Any sub-policy
//! error aborts the chain; otherwise the chain reports through
//! [`merge_exec_status`].

use crate::PolicyError;
use crate::UpgradePolicy;
use crate::context::ReconfigureContext;
use crate::merge_exec_status;
use crate::online::AsyncReloadPolicy;
use crate::online::SyncReloadPolicy;
use crate::restart::ParallelRestartPolicy;
use crate::restart::WorkloadRestartPolicy;
use crate::rolling::RollingUpgradePolicy;
use async_trait::async_trait;
use corral_reconfigure_planning::RestartStrategy;
use corral_types::PolicyExecStatus;
use corral_types::ReloadPolicy;
use slog::info;

pub(crate) struct CombinedPolicy;

#[async_trait]
impl UpgradePolicy for CombinedPolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::DynamicReloadAndRestart
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        let sync_reload = ctx
            .task_definition()
            .and_then(|definition| definition.reload_action.as_ref())
            .map(|action| action.is_sync_trigger())
            .unwrap_or(false);

        info!(
            log,
            "running combined reload and restart";
            "template" => %ctx.template,
            "sync_reload" => sync_reload,
        );
        let reload_status = if sync_reload {
            SyncReloadPolicy.upgrade(log, ctx).await?
        } else {
            AsyncReloadPolicy.upgrade(log, ctx).await?
        };
        if reload_status.exec_status.is_failure() {
            // A failed leg aborts the chain; the restart must not run
            // ahead of the dynamic portion it was supposed to follow.
            return Ok(reload_status);
        }

        let restart_status = match ctx.settings.restart_strategy {
            RestartStrategy::Workload => {
                WorkloadRestartPolicy.upgrade(log, ctx).await?
            }
            RestartStrategy::Rolling => {
                RollingUpgradePolicy.upgrade(log, ctx).await?
            }
            RestartStrategy::Parallel => {
                ParallelRestartPolicy.upgrade(log, ctx).await?
            }
        };

        Ok(merge_exec_status(&[reload_status, restart_status]))
    }
}
