// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One reconcile pass over a config template
//!
//! The orchestrator calls [`run_reconfigure_pass`] whenever the rendered
//! content of a template may have changed, and re-queues the template while
//! the outcome asks for a retry.  One pass is one synchronous walk through
//! patch -> classify -> resolve -> execute -> record; the pass never blocks
//! waiting for replicas, it just reports how far the fleet has converged.

use crate::PolicyTable;
use crate::context::ReconfigureContext;
use crate::count_i32;
use crate::settings::ReconfigureSettings;
use anyhow::Context;
use chrono::Utc;
use corral_config_syntax::FormatDescriptor;
use corral_reconfigure_planning::classify_patch;
use corral_reconfigure_planning::create_config_patch;
use corral_reconfigure_planning::resolve_reload_policies;
use corral_types::ClusterState;
use corral_types::ConfigurationRevision;
use corral_types::ExecStatus;
use corral_types::ParameterPhase;
use corral_types::ParametersDefinition;
use corral_types::PolicyExecStatus;
use corral_types::ReconfigureResult;
use corral_types::ReloadPolicy;
use corral_types::ReplicaAgent;
use corral_types::RevisionHistory;
use corral_types::TemplateRef;
use corral_types::compute_version_hash;
use slog::info;
use slog::warn;
use slog_error_chain::InlineErrorChain;
use std::collections::BTreeMap;

/// Inputs to one reconcile pass
pub struct ReconcilePassArgs<'a> {
    pub log: &'a slog::Logger,
    pub state: &'a dyn ClusterState,
    pub agent: &'a dyn ReplicaAgent,
    pub template: &'a TemplateRef,

    /// newly rendered content of every file in the template
    pub rendered_files: &'a BTreeMap<String, String>,
    pub formats: &'a BTreeMap<String, FormatDescriptor>,
    pub definitions: &'a BTreeMap<String, ParametersDefinition>,

    pub expected_replicas: usize,

    /// monotonically increasing identifier of this reconfiguration attempt
    pub revision: i64,

    pub settings: &'a ReconfigureSettings,
    pub policies: &'a PolicyTable,
}

/// What one pass concluded, ready to persist on the owning resource
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReconcileOutcome {
    pub phase: ParameterPhase,
    pub policy: Option<ReloadPolicy>,
    pub status: PolicyExecStatus,
    pub target_version: String,
    pub message: String,
}

impl ReconcileOutcome {
    /// Whether the orchestrator should re-queue this template.
    pub fn needs_retry(&self) -> bool {
        self.status.exec_status.needs_retry()
    }
}

/// Makes one attempt to converge the fleet onto the rendered configuration
///
/// Validation failures (malformed content, immutable-parameter edits) come
/// back as a `MergeFailed` outcome, not an error; `Err` is reserved for
/// infrastructure problems (the store being unreachable) where not even an
/// outcome could be recorded.
pub async fn run_reconfigure_pass(
    args: ReconcilePassArgs<'_>,
) -> Result<ReconcileOutcome, anyhow::Error> {
    let log = args.log;
    let target_version = compute_version_hash(args.rendered_files);
    info!(
        log,
        "reconfigure pass";
        "template" => %args.template,
        "revision" => args.revision,
        "target" => %target_version,
    );

    let previous = args
        .state
        .get_last_applied_snapshot(args.template)
        .await
        .context("reading last applied snapshot")?;

    let outcome = match previous {
        None => {
            // Nothing was ever applied: record the rendered content as the
            // baseline.  The replicas were provisioned from it.
            args.state
                .set_last_applied_snapshot(args.template, args.rendered_files)
                .await
                .context("recording initial snapshot")?;
            ReconcileOutcome {
                phase: ParameterPhase::Finished,
                policy: None,
                status: PolicyExecStatus::converged(count_i32(
                    args.expected_replicas,
                )),
                target_version,
                message: "initial configuration recorded".to_string(),
            }
        }
        Some(previous) => {
            converge_from(&args, &previous, target_version).await?
        }
    };

    record_revision(&args, &outcome).await?;
    Ok(outcome)
}

async fn converge_from(
    args: &ReconcilePassArgs<'_>,
    previous: &BTreeMap<String, String>,
    target_version: String,
) -> Result<ReconcileOutcome, anyhow::Error> {
    let log = args.log;

    let patch = match create_config_patch(
        log,
        previous,
        args.rendered_files,
        args.formats,
    ) {
        Ok(patch) => patch,
        Err(error) => {
            return Ok(merge_failed(target_version, &error));
        }
    };
    if !patch.is_modify {
        // The rendered content normalizes to what is already applied.
        args.state
            .set_last_applied_snapshot(args.template, args.rendered_files)
            .await
            .context("recording unchanged snapshot")?;
        return Ok(ReconcileOutcome {
            phase: ParameterPhase::Finished,
            policy: None,
            status: PolicyExecStatus::converged(count_i32(
                args.expected_replicas,
            )),
            target_version,
            message: "configuration unchanged".to_string(),
        });
    }

    let classes = match classify_patch(log, &patch, args.definitions) {
        Ok(classes) => classes,
        Err(error) => {
            return Ok(merge_failed(target_version, &error));
        }
    };
    let tasks = resolve_reload_policies(
        log,
        Some(&patch),
        &classes,
        args.definitions,
        args.settings.restart_strategy,
    );

    // Tasks run in their stable (file-name) order, and execution stops at
    // the first task that has not converged; later files wait for earlier
    // ones the same way later passes wait for earlier windows.
    let mut policy = None;
    let mut overall =
        PolicyExecStatus::converged(count_i32(args.expected_replicas));
    let mut message = String::new();
    for task in &tasks {
        let ctx = ReconfigureContext {
            template: args.template,
            target_version: &target_version,
            expected_replicas: args.expected_replicas,
            patch: &patch,
            definitions: args.definitions,
            task,
            settings: args.settings,
            state: args.state,
            agent: args.agent,
        };
        policy = Some(task.policy);
        let status = match args.policies.execute(log, &ctx).await {
            Ok(status) => status,
            Err(error) => {
                let exec_status = if error.is_transient() {
                    ExecStatus::FailedAndRetry
                } else {
                    ExecStatus::Failed
                };
                warn!(
                    log,
                    "policy execution failed";
                    "policy" => %task.policy,
                    InlineErrorChain::new(&error),
                );
                message = InlineErrorChain::new(&error).to_string();
                overall = PolicyExecStatus::unconfirmed(exec_status);
                break;
            }
        };
        overall = status;
        if status.exec_status != ExecStatus::None {
            break;
        }
    }

    let phase = match overall.exec_status {
        ExecStatus::None => ParameterPhase::Finished,
        ExecStatus::Retry => ParameterPhase::Upgrading,
        ExecStatus::FailedAndRetry => ParameterPhase::FailedAndRetry,
        ExecStatus::Failed | ExecStatus::NotSupport => {
            ParameterPhase::FailedAndPause
        }
    };
    if message.is_empty() {
        message = match overall.exec_status {
            ExecStatus::None => "configuration converged".to_string(),
            ExecStatus::Retry => format!(
                "in progress: {}/{} replicas on target version",
                overall.succeed_count, overall.expected_count
            ),
            ExecStatus::FailedAndRetry => {
                "transient failure; will retry".to_string()
            }
            ExecStatus::Failed => "reconfiguration failed".to_string(),
            ExecStatus::NotSupport => {
                "resolved reload policy is not supported".to_string()
            }
        };
    }

    if phase == ParameterPhase::Finished {
        args.state
            .set_last_applied_snapshot(args.template, args.rendered_files)
            .await
            .context("recording applied snapshot")?;
    }

    Ok(ReconcileOutcome {
        phase,
        policy,
        status: overall,
        target_version,
        message,
    })
}

fn merge_failed(
    target_version: String,
    error: &dyn std::error::Error,
) -> ReconcileOutcome {
    ReconcileOutcome {
        phase: ParameterPhase::MergeFailed,
        policy: None,
        status: PolicyExecStatus::unconfirmed(ExecStatus::Failed),
        target_version,
        // The cause lands in the persisted message, not just the log: it
        // is what the user sees on the resource status.
        message: InlineErrorChain::new(error).to_string(),
    }
}

async fn record_revision(
    args: &ReconcilePassArgs<'_>,
    outcome: &ReconcileOutcome,
) -> Result<(), anyhow::Error> {
    let stored = args
        .state
        .read_revision_entries(args.template)
        .await
        .context("reading revision history")?;
    let mut history = RevisionHistory::from_entries(
        args.settings.revision_history_limit,
        &stored,
    );
    if let Some(previous) = history.get(args.revision) {
        if previous.phase != outcome.phase
            && !previous.phase.can_transition_to(outcome.phase)
        {
            warn!(
                args.log,
                "unexpected phase transition";
                "revision" => args.revision,
                "from" => %previous.phase,
                "to" => %outcome.phase,
            );
        }
    }
    history.record(ConfigurationRevision {
        revision: args.revision,
        phase: outcome.phase,
        result: ReconfigureResult {
            policy: outcome.policy,
            exec_status: outcome.status.exec_status,
            succeed_count: outcome.status.succeed_count,
            expected_count: outcome.status.expected_count,
            message: outcome.message.clone(),
        },
        timestamp: Some(Utc::now()),
    });
    args.state
        .write_revision_entries(args.template, &history.to_entries())
        .await
        .context("writing revision history")?;
    Ok(())
}
