// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-revision phase machine for a reconfiguration

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Lifecycle phase of one configuration revision
///
/// ```text
/// Creating -> Init -> {Pending | Merged | MergeFailed}
///                       -> Upgrading -> {FailedAndRetry <-> Upgrading
///                                        | FailedAndPause}
///                       -> Finished
/// ```
///
/// `Finished` and `FailedAndPause` are terminal *for a given revision*; a
/// new revision restarts the cycle at `Pending`/`Upgrading`.  `Deleting` is
/// reachable from any non-terminal phase when the owning resource goes away
/// and means "stop scheduling new work", not "roll anything back".
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
    strum::EnumIter,
)]
#[serde(rename_all = "PascalCase")]
pub enum ParameterPhase {
    Creating,
    Init,
    Pending,
    Merged,
    MergeFailed,
    Upgrading,
    FailedAndRetry,
    FailedAndPause,
    Finished,
    Deleting,
}

impl ParameterPhase {
    /// Whether this phase ends the lifecycle of its revision.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParameterPhase::Finished
                | ParameterPhase::FailedAndPause
                | ParameterPhase::MergeFailed
                | ParameterPhase::Deleting
        )
    }

    /// Whether the driver may move a revision from `self` to `next`
    ///
    /// Terminal phases admit `Pending`/`Upgrading` because a *new* revision
    /// restarts the cycle there; within one revision the driver never leaves
    /// a terminal phase.
    pub fn can_transition_to(&self, next: ParameterPhase) -> bool {
        use ParameterPhase::*;
        if next == Deleting {
            return *self != Deleting;
        }
        match self {
            Creating => matches!(next, Init),
            Init => matches!(next, Pending | Merged | MergeFailed),
            Pending => matches!(next, Merged | MergeFailed | Upgrading),
            Merged => matches!(next, Upgrading),
            MergeFailed => matches!(next, Pending | Upgrading),
            Upgrading => {
                matches!(next, FailedAndRetry | FailedAndPause | Finished)
            }
            FailedAndRetry => matches!(next, Upgrading | FailedAndPause),
            FailedAndPause => matches!(next, Pending | Upgrading),
            Finished => matches!(next, Pending | Upgrading),
            Deleting => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::ParameterPhase;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_phase_display_round_trip() {
        for phase in ParameterPhase::iter() {
            let rendered = phase.to_string();
            assert_eq!(ParameterPhase::from_str(&rendered).unwrap(), phase);
        }
        // These strings are persisted; older stored values were a bare phase
        // name, so the rendering must stay stable.
        assert_eq!(ParameterPhase::FailedAndRetry.to_string(), "FailedAndRetry");
        assert_eq!(ParameterPhase::Upgrading.to_string(), "Upgrading");
    }

    #[test]
    fn test_happy_path_transitions() {
        use ParameterPhase::*;
        let path = [Creating, Init, Pending, Merged, Upgrading, Finished];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "expected {} -> {} to be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_retry_loop_and_terminals() {
        use ParameterPhase::*;
        assert!(Upgrading.can_transition_to(FailedAndRetry));
        assert!(FailedAndRetry.can_transition_to(Upgrading));
        assert!(FailedAndRetry.can_transition_to(FailedAndPause));

        // Terminal for the revision: only a new revision (Pending/Upgrading)
        // or deletion may follow.
        assert!(!Finished.can_transition_to(Merged));
        assert!(Finished.can_transition_to(Pending));
        assert!(FailedAndPause.can_transition_to(Upgrading));

        // Deletion is reachable from everywhere except itself, and final.
        for phase in ParameterPhase::iter() {
            if phase == Deleting {
                assert!(!phase.can_transition_to(Deleting));
            } else {
                assert!(phase.can_transition_to(Deleting));
            }
            assert!(!Deleting.can_transition_to(phase));
        }
    }
}
