// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared support for corral test suites

use slog::Drain;
use slog::Logger;
use slog::o;

/// Logging context for a test
///
/// Wraps a terminal logger named for the test so that interleaved output
/// from concurrently running tests stays attributable.
pub struct LogContext {
    pub log: Logger,
}

impl LogContext {
    pub fn new(test_name: &'static str) -> LogContext {
        let decorator = slog_term::TermDecorator::new().stderr().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let log = Logger::root(drain, o!("test" => test_name));
        LogContext { log }
    }

    /// Called at the end of a successful test; failing tests skip it and
    /// keep their output.
    pub fn cleanup_successful(self) {}
}
