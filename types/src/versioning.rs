// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Version hashing and bounded per-revision history
//!
//! The version hash is the value replicas converge toward: it is written as
//! each replica's version tag and as the restart annotation value.  The
//! revision history is a small, bounded map persisted on the owning config
//! resource's metadata; this module owns its round-trip format and its
//! eviction rule so the persistence mechanism behind it stays swappable.

use crate::phase::ParameterPhase;
use crate::policy::ExecStatus;
use crate::policy::ReloadPolicy;
use crate::policy::UNCONFIRMED_COUNT;
use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::str::FromStr;

/// How many revisions are retained per config resource before the oldest
/// are evicted.
pub const DEFAULT_REVISION_HISTORY_LIMIT: usize = 10;

/// Deterministic content hash of a configuration snapshot
///
/// Iteration over the `BTreeMap` fixes the file order, and each name and
/// content is length-prefixed so that moving bytes between adjacent fields
/// cannot collide.  The result is truncated: 64 hash bits are plenty for
/// distinguishing config versions and keep tag values short.
pub fn compute_version_hash(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in files {
        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update((content.len() as u64).to_be_bytes());
        hasher.update(content.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Outcome of one reconfiguration attempt, as persisted in history
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
pub struct ReconfigureResult {
    /// policy that drove the attempt (`None` before one was resolved)
    pub policy: Option<ReloadPolicy>,
    pub exec_status: ExecStatus,
    pub succeed_count: i32,
    pub expected_count: i32,
    /// human-readable detail, notably the cause of a failure (e.g. which
    /// parameter was immutable)
    pub message: String,
}

impl Default for ReconfigureResult {
    fn default() -> ReconfigureResult {
        ReconfigureResult {
            policy: None,
            exec_status: ExecStatus::None,
            succeed_count: UNCONFIRMED_COUNT,
            expected_count: UNCONFIRMED_COUNT,
            message: String::new(),
        }
    }
}

/// One revision's entry in the bounded history
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
pub struct ConfigurationRevision {
    pub revision: i64,
    pub phase: ParameterPhase,
    #[serde(default)]
    pub result: ReconfigureResult,
    /// when this entry was last written (absent in entries migrated from the
    /// legacy bare-phase format)
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Bounded, append-only history of reconfiguration revisions
///
/// Entries are keyed by revision number.  Recording an existing revision
/// replaces its entry (phases progress within a revision); recording a new
/// one appends and then evicts the numerically oldest entries beyond the
/// retention limit.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RevisionHistory {
    limit: usize,
    entries: BTreeMap<i64, ConfigurationRevision>,
}

impl RevisionHistory {
    pub fn new(limit: usize) -> RevisionHistory {
        assert!(limit > 0, "revision history must retain at least one entry");
        RevisionHistory { limit, entries: BTreeMap::new() }
    }

    /// Parses history from stored metadata entries
    ///
    /// Keys that do not parse as a revision number are ignored (the owning
    /// resource's metadata may carry unrelated entries).  A value that is
    /// not valid JSON is read as a bare phase name, the format older
    /// versions stored; anything else unreadable is dropped.
    pub fn from_entries(
        limit: usize,
        stored: &BTreeMap<String, String>,
    ) -> RevisionHistory {
        let mut history = RevisionHistory::new(limit);
        for (key, value) in stored {
            let Ok(revision) = key.parse::<i64>() else {
                continue;
            };
            let entry = match serde_json::from_str::<ConfigurationRevision>(
                value,
            ) {
                Ok(entry) => entry,
                Err(_) => match ParameterPhase::from_str(value.trim()) {
                    Ok(phase) => ConfigurationRevision {
                        revision,
                        phase,
                        result: ReconfigureResult::default(),
                        timestamp: None,
                    },
                    Err(_) => continue,
                },
            };
            history.entries.insert(revision, entry);
        }
        history.gc();
        history
    }

    /// Serializes history back into metadata entries.
    pub fn to_entries(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(revision, entry)| {
                let serialized = serde_json::to_string(entry)
                    .expect("revision entries always serialize");
                (revision.to_string(), serialized)
            })
            .collect()
    }

    /// Records `entry`, evicting the oldest revisions beyond the limit.
    pub fn record(&mut self, entry: ConfigurationRevision) {
        self.entries.insert(entry.revision, entry);
        self.gc();
    }

    /// Removes the numerically oldest entries beyond the retention limit,
    /// returning the evicted revision numbers.
    pub fn gc(&mut self) -> Vec<i64> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.limit {
            let oldest = *self
                .entries
                .keys()
                .next()
                .expect("non-empty map has a first key");
            self.entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    pub fn get(&self, revision: i64) -> Option<&ConfigurationRevision> {
        self.entries.get(&revision)
    }

    /// The highest-numbered revision on record.
    pub fn latest(&self) -> Option<&ConfigurationRevision> {
        self.entries.values().next_back()
    }

    pub fn in_phase(
        &self,
        phase: ParameterPhase,
    ) -> impl Iterator<Item = &ConfigurationRevision> {
        self.entries.values().filter(move |e| e.phase == phase)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RevisionHistory {
    fn default() -> RevisionHistory {
        RevisionHistory::new(DEFAULT_REVISION_HISTORY_LIMIT)
    }
}
