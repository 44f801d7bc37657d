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

//! Messages used by the "get operation" RPCs.
//!
//! Every DoubleCloud service exposes an `OperationService` with the same
//! request and response shape. Only the fully-qualified service name changes.

/// The request for `OperationService.Get`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetOperationRequest {
    /// The id of the operation to fetch.
    #[prost(string, tag = "1")]
    pub operation_id: String,
}

/// A long-running operation, as reported by the service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Operation {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub project_id: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(message, optional, tag = "4")]
    pub metadata: Option<prost_types::Any>,
    #[prost(enumeration = "operation::Status", tag = "5")]
    pub status: i32,
    #[prost(message, optional, tag = "6")]
    pub error: Option<Status>,
    #[prost(string, tag = "7")]
    pub resource_id: String,
}

/// Nested types for [Operation].
pub mod operation {
    /// The operation status.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Unspecified = 0,
        Pending = 1,
        Done = 2,
        Invalid = 3,
    }
}

/// The error details of a failed operation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Status {
    /// The status code, using the gRPC numbering.
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl From<Operation> for lro::OperationDescriptor {
    fn from(value: Operation) -> Self {
        use lro::OperationStatus;
        let status = match operation::Status::try_from(value.status) {
            Ok(operation::Status::Done) => OperationStatus::Done,
            Ok(operation::Status::Invalid) => OperationStatus::Invalid,
            // Unknown values are not terminal, keep polling.
            _ => OperationStatus::Pending,
        };
        Self {
            id: value.id,
            project_id: value.project_id,
            description: value.description,
            resource_id: value.resource_id,
            status,
            error: value
                .error
                .map(|e| gax::error::Status::new(e.code, e.message)),
            metadata: value.metadata,
        }
    }
}
