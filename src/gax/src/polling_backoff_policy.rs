// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the trait for polling backoff policies and a common implementation.
//!
//! The client libraries can automatically poll long-running operations until
//! completion. When doing so they wait between polls to avoid overloading the
//! service.
//!
//! The default implementation waits for a fixed interval between polls. The
//! expected execution time of most operations is not known in advance, but
//! the services report progress frequently enough that a short, constant
//! delay works well.
//!
//! # Example
//! ```
//! # use doublecloud_gax::polling_backoff_policy::*;
//! use std::time::Duration;
//!
//! let policy = FixedInterval::new(Duration::from_millis(500));
//! let start = std::time::Instant::now();
//! assert_eq!(policy.wait_period(start, 1), Duration::from_millis(500));
//! assert_eq!(policy.wait_period(start, 10), Duration::from_millis(500));
//! ```

use std::sync::Arc;
use std::time::Duration;

/// The default interval between polls.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(1);

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the delay before the next poll.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of poll queries. This method is always
    ///   called after the first attempt.
    fn wait_period(&self, loop_start: std::time::Instant, attempt_count: u32) -> Duration;
}

/// Waits the same amount of time between each poll.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(DEFAULT_POLLING_INTERVAL)
    }
}

impl PollingBackoffPolicy for FixedInterval {
    fn wait_period(&self, _loop_start: std::time::Instant, _attempt_count: u32) -> Duration {
        self.interval
    }
}

/// A helper type to use [PollingBackoffPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(Arc<dyn PollingBackoffPolicy>);

impl PollingBackoffPolicyArg {
    /// Returns the wrapped policy.
    pub fn into_inner(self) -> Arc<dyn PollingBackoffPolicy> {
        self.0
    }
}

impl<T: PollingBackoffPolicy + 'static> std::convert::From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

impl std::convert::From<Duration> for PollingBackoffPolicyArg {
    fn from(value: Duration) -> Self {
        Self(Arc::new(FixedInterval::new(value)))
    }
}
