// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planning half of a reconfiguration
//!
//! Everything here is a pure function of its inputs: diff the last-applied
//! file contents against the newly rendered ones into a structured patch,
//! classify the changed parameters against the per-file metadata, and
//! resolve which reload policy drives each change out to the fleet.  The
//! execution crate then runs the resolved tasks against live state.

mod classify;
mod patch;
mod render;
mod resolve;

pub use classify::ClassifyError;
pub use classify::FileChangeClass;
pub use classify::classify_patch;
pub use patch::PatchError;
pub use patch::create_config_patch;
pub use render::merge_file_params;
pub use resolve::ReconfigureTask;
pub use resolve::RestartStrategy;
pub use resolve::TaskScope;
pub use resolve::resolve_reload_policies;
