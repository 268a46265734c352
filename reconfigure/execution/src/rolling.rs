// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rolling upgrade with a bounded concurrency window
//!
//! The wave is re-derived from observed state on every invocation; there is
//! no plan object to drift from reality.  Each replica's version tag is the
//! atomic "done" marker: a crash between reload and tag write leaves the
//! replica looking stale, so the next pass simply retries it.

use crate::PolicyError;
use crate::UpgradePolicy;
use crate::context::ReconfigureContext;
use crate::count_i32;
use crate::settings::RollingOrder;
use async_trait::async_trait;
use corral_types::CONFIG_VERSION_TAG;
use corral_types::PolicyExecStatus;
use corral_types::ReloadPolicy;
use corral_types::ReplicaObservation;
use corral_types::UNCONFIRMED_COUNT;
use slog::info;
use slog::warn;
use slog_error_chain::InlineErrorChain;

pub(crate) struct RollingUpgradePolicy;

#[async_trait]
impl UpgradePolicy for RollingUpgradePolicy {
    fn policy(&self) -> ReloadPolicy {
        ReloadPolicy::Rolling
    }

    async fn upgrade(
        &self,
        log: &slog::Logger,
        ctx: &ReconfigureContext<'_>,
    ) -> Result<PolicyExecStatus, PolicyError> {
        let expected = count_i32(ctx.expected_replicas);
        let mut replicas = ctx.state.get_replicas(ctx.component()).await?;
        if replicas.len() != ctx.expected_replicas {
            info!(
                log,
                "topology not settled; deferring rolling wave";
                "observed" => replicas.len(),
                "expected" => ctx.expected_replicas,
            );
            return Ok(PolicyExecStatus {
                exec_status: corral_types::ExecStatus::Retry,
                succeed_count: UNCONFIRMED_COUNT,
                expected_count: expected,
            });
        }

        // Order the slice so the wave always starts at its far end.
        replicas.sort_by_key(|r| r.index);
        if ctx.settings.rolling_order == RollingOrder::LowestFirst {
            replicas.reverse();
        }

        let target = ctx.target_version;

        // Scan from the wave end: replicas already carrying the target tag
        // and available are done; the first replica that is neither bounds
        // the window.
        let mut window_end = replicas.len();
        while window_end > 0 {
            let replica = &replicas[window_end - 1];
            if replica.on_version(target) && replica.available {
                window_end -= 1;
            } else {
                break;
            }
        }
        if window_end == 0 {
            info!(log, "rolling wave complete"; "target" => target);
            return Ok(PolicyExecStatus::converged(expected));
        }

        let updated = replicas.len() - window_end;
        let updating = replicas[..window_end]
            .iter()
            .filter(|r| r.on_version(target))
            .count();
        let succeeded = count_i32(updated + updating);

        let window = ctx.settings.max_concurrent_rolling_replicas;
        let window_begin = window_end.saturating_sub(window);

        // Never widen the blast radius while replicas outside (before) the
        // window are unstable.
        if let Some(unstable) =
            replicas[..window_begin].iter().find(|r| !r.ready)
        {
            warn!(
                log,
                "replica outside the rolling window is not ready; \
                 holding the wave";
                "replica" => %unstable.name,
            );
            return Ok(PolicyExecStatus::retrying(succeeded, expected));
        }

        let candidates: Vec<&ReplicaObservation> = replicas
            [window_begin..window_end]
            .iter()
            .filter(|r| !r.on_version(target))
            .collect();
        if candidates.is_empty() {
            // Everything in the window is tagged and merely waiting to
            // come back up available.
            return Ok(PolicyExecStatus::retrying(succeeded, expected));
        }

        for replica in candidates {
            info!(
                log,
                "rolling replica to target version";
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
                    "reload failed; will retry on a later pass";
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
        }

        Ok(PolicyExecStatus::retrying(succeeded, expected))
    }
}
