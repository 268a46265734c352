// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Folding a patch back into file content
//!
//! Used to produce the merged target content replicas converge toward:
//! deletions are dropped, updates rewritten in place (keeping their
//! position in the file), and additions appended.

use corral_config_syntax::FormatDescriptor;
use corral_config_syntax::FormatError;
use corral_config_syntax::parse_config;
use corral_config_syntax::serialize_config;
use corral_types::ConfigPatchInfo;

/// Applies `patch`'s entries for `file_name` to `base` content.
pub fn merge_file_params(
    descriptor: &FormatDescriptor,
    base: &str,
    patch: &ConfigPatchInfo,
    file_name: &str,
) -> Result<String, FormatError> {
    let mut params = parse_config(descriptor, base)?;
    if let Some(deleted) = patch.delete_config.get(file_name) {
        for key in deleted.keys() {
            params.shift_remove(key);
        }
    }
    for (key, value) in patch.updated_params(file_name) {
        params.insert(key, value);
    }
    if let Some(added) = patch.add_config.get(file_name) {
        for (key, value) in added {
            params.insert(key.clone(), value.clone());
        }
    }
    serialize_config(descriptor, &params)
}
