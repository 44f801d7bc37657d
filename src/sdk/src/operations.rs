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

//! Route operations to the service that owns them.

use crate::endpoints::ServiceId;
use crate::model::{GetOperationRequest, Operation};
use crate::Sdk;
use gax::Result;
use lro::{OperationClient, OperationDescriptor};

/// The services with an `OperationService`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OperationKind {
    ClickHouse,
    Kafka,
    Transfer,
    Network,
}

// Transfer operations come in two flavors, endpoints and jobs.
const PREFIXES: &[(&str, OperationKind)] = &[
    ("chi", OperationKind::ClickHouse),
    ("kfk", OperationKind::Kafka),
    ("dte", OperationKind::Transfer),
    ("dtj", OperationKind::Transfer),
];

impl OperationKind {
    /// Finds the service that owns the operation `id`.
    ///
    /// Most ids start with a service-specific prefix. Network operations use
    /// bare UUIDs.
    pub fn from_operation_id(id: &str) -> Option<Self> {
        PREFIXES
            .iter()
            .find(|(prefix, _)| id.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .or_else(|| {
                uuid::Uuid::parse_str(id)
                    .ok()
                    .map(|_| OperationKind::Network)
            })
    }

    /// The service hosting the `OperationService` for this kind.
    pub fn service(&self) -> ServiceId {
        match self {
            Self::ClickHouse => ServiceId::CLICKHOUSE,
            Self::Kafka => ServiceId::KAFKA,
            Self::Transfer => ServiceId::TRANSFER,
            Self::Network => ServiceId::VPC,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Self::ClickHouse => "/doublecloud.clickhouse.v1.OperationService/Get",
            Self::Kafka => "/doublecloud.kafka.v1.OperationService/Get",
            Self::Transfer => "/doublecloud.transfer.v1.OperationService/Get",
            Self::Network => "/doublecloud.network.v1.OperationService/Get",
        }
    }
}

/// The operation id does not match any known service.
#[derive(thiserror::Error, Debug)]
#[error("Unknown operation type, opID: {0:?}")]
pub struct UnknownOperation(String);

impl UnknownOperation {
    pub(crate) fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Fetches operations from one service.
///
/// The connection to the service is established on the first call.
#[derive(Clone, Debug)]
pub struct OperationServiceClient {
    sdk: Sdk,
    kind: OperationKind,
}

impl OperationServiceClient {
    pub(crate) fn new(sdk: Sdk, kind: OperationKind) -> Self {
        Self { sdk, kind }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Fetches the operation `id`.
    pub async fn get_operation(&self, id: &str) -> Result<Operation> {
        let request = GetOperationRequest {
            operation_id: id.to_string(),
        };
        self.sdk
            .execute(
                &self.kind.service(),
                http::uri::PathAndQuery::from_static(self.kind.path()),
                request,
            )
            .await
    }
}

#[async_trait::async_trait]
impl OperationClient for OperationServiceClient {
    async fn get(&self, id: &str) -> Result<OperationDescriptor> {
        self.get_operation(id)
            .await
            .map(OperationDescriptor::from)
    }
}
