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

//! Track long-running operations until they reach a terminal state.
//!
//! Many DoubleCloud RPCs start work on the service side and return an
//! [OperationDescriptor] right away. The descriptor names the operation and
//! reports its current status. Each service exposes a "get operation" RPC to
//! refresh the descriptor, abstracted here by [OperationClient].
//!
//! [Operation] pairs a descriptor with the client that can refresh it. The
//! state queries ([done][Operation::done], [ok][Operation::ok],
//! [failed][Operation::failed], and [error][Operation::error]) never perform
//! I/O. [wait][Operation::wait] polls until the operation is done.
//!
//! # Example
//! ```
//! # use doublecloud_lro::Operation;
//! async fn sample(mut op: Operation) -> gax::Result<()> {
//!     op.wait().await?;
//!     if let Some(e) = op.error() {
//!         println!("operation {} failed: {e}", op.id());
//!     }
//!     Ok(())
//! }
//! ```

use gax::Result;
use gax::error::{Error, Status};
use gax::polling_backoff_policy::{FixedInterval, PollingBackoffPolicy, PollingBackoffPolicyArg};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The status of an operation as reported by the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation is still running.
    #[default]
    Pending,
    /// The operation has finished.
    Done,
    /// The operation is in an invalid state, typically because it failed.
    Invalid,
}

/// The server-side view of an operation.
///
/// Descriptors are never modified in place. Polling replaces the descriptor
/// held by an [Operation] with a fresh copy from the service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationDescriptor {
    /// The operation id. Its prefix identifies the owning service.
    pub id: String,
    /// The project that owns the operation.
    pub project_id: String,
    /// A human-readable description.
    pub description: String,
    /// The resource created or modified by this operation.
    pub resource_id: String,
    pub status: OperationStatus,
    /// The error reported by the service, if any.
    pub error: Option<Status>,
    /// Service-specific metadata, if any.
    pub metadata: Option<prost_types::Any>,
}

impl OperationDescriptor {
    /// Creates a descriptor with the given id.
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn set_status(mut self, v: OperationStatus) -> Self {
        self.status = v;
        self
    }

    pub fn set_error(mut self, v: Status) -> Self {
        self.error = Some(v);
        self
    }

    pub fn set_metadata(mut self, v: prost_types::Any) -> Self {
        self.metadata = Some(v);
        self
    }

    pub fn set_description<T: Into<String>>(mut self, v: T) -> Self {
        self.description = v.into();
        self
    }

    pub fn set_resource_id<T: Into<String>>(mut self, v: T) -> Self {
        self.resource_id = v.into();
        self
    }
}

/// Refreshes operation descriptors from the owning service.
#[async_trait::async_trait]
pub trait OperationClient: std::fmt::Debug + Send + Sync {
    /// Fetches the current descriptor for the operation `id`.
    async fn get(&self, id: &str) -> Result<OperationDescriptor>;
}

/// A long-running operation and the client used to refresh it.
#[derive(Clone, Debug)]
pub struct Operation {
    client: Arc<dyn OperationClient>,
    descriptor: OperationDescriptor,
    polling_policy: Arc<dyn PollingBackoffPolicy>,
}

impl Operation {
    /// Creates a new operation from its initial descriptor.
    ///
    /// The operation polls every [DEFAULT_POLLING_INTERVAL] unless configured
    /// otherwise.
    ///
    /// [DEFAULT_POLLING_INTERVAL]: gax::polling_backoff_policy::DEFAULT_POLLING_INTERVAL
    pub fn new(client: Arc<dyn OperationClient>, descriptor: OperationDescriptor) -> Self {
        Self {
            client,
            descriptor,
            polling_policy: Arc::new(FixedInterval::default()),
        }
    }

    /// Changes the interval between polls.
    ///
    /// # Example
    /// ```
    /// # use doublecloud_lro::Operation;
    /// # use std::time::Duration;
    /// fn sample(op: Operation) -> Operation {
    ///     op.with_polling_policy(Duration::from_millis(250))
    /// }
    /// ```
    pub fn with_polling_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.polling_policy = v.into().into_inner();
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn resource_id(&self) -> &str {
        &self.descriptor.resource_id
    }

    /// The service-specific metadata, `None` when the service sent none.
    pub fn metadata(&self) -> Option<&prost_types::Any> {
        self.descriptor.metadata.as_ref()
    }

    /// The most recent descriptor received from the service.
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Consumes the operation, returning the most recent descriptor.
    pub fn into_descriptor(self) -> OperationDescriptor {
        self.descriptor
    }

    /// Returns true if the operation reached a terminal state.
    pub fn done(&self) -> bool {
        self.descriptor.status == OperationStatus::Done || self.failed()
    }

    /// Returns true if the operation finished without errors.
    pub fn ok(&self) -> bool {
        self.descriptor.status == OperationStatus::Done && self.descriptor.error.is_none()
    }

    /// Returns true if the operation failed.
    pub fn failed(&self) -> bool {
        self.descriptor.status == OperationStatus::Invalid || self.descriptor.error.is_some()
    }

    /// The error reported by the service, if any.
    pub fn error(&self) -> Option<Error> {
        self.descriptor.error.clone().map(Error::service)
    }

    /// Refreshes the descriptor from the service.
    ///
    /// On error the previous descriptor is kept.
    pub async fn poll(&mut self) -> Result<&OperationDescriptor> {
        let descriptor = self.client.get(&self.descriptor.id).await?;
        tracing::debug!("operation {} is {:?}", descriptor.id, descriptor.status);
        self.descriptor = descriptor;
        Ok(&self.descriptor)
    }

    /// Polls the operation until it reaches a terminal state.
    ///
    /// A failed operation is still a successful wait: use [failed][Self::failed]
    /// and [error][Self::error] to examine the outcome. Errors polling the
    /// service are returned immediately.
    pub async fn wait(&mut self) -> Result<()> {
        let loop_start = std::time::Instant::now();
        let mut attempt_count = 0_u32;
        while !self.done() {
            attempt_count = attempt_count.saturating_add(1);
            let period = self.polling_policy.wait_period(loop_start, attempt_count);
            tokio::time::sleep(period).await;
            self.poll().await?;
        }
        tracing::debug!("operation {} done, ok={}", self.descriptor.id, self.ok());
        Ok(())
    }

    /// Like [wait][Self::wait], but gives up when `cancel` is triggered.
    pub async fn wait_with_cancellation(&mut self, cancel: &CancellationToken) -> Result<()> {
        let id = self.descriptor.id.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(Error::cancelled(format!("stopped waiting for operation {id}")))
            }
            r = self.wait() => r,
        }
    }

    /// Like [wait][Self::wait], but gives up after `timeout`.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(Error::timeout)?
    }
}
