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

//! Resolves DoubleCloud service names to network addresses.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Identifies a DoubleCloud service.
///
/// The SDK knows about the services listed as associated constants. Other
/// services can be named with [ServiceId::new], but the SDK cannot resolve
/// their addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Cow<'static, str>);

impl ServiceId {
    pub const CLICKHOUSE: ServiceId = ServiceId::from_static("clickhouse");
    pub const KAFKA: ServiceId = ServiceId::from_static("kafka");
    pub const VPC: ServiceId = ServiceId::from_static("vpc");
    pub const TRANSFER: ServiceId = ServiceId::from_static("transfer");
    pub const VISUALIZATION: ServiceId = ServiceId::from_static("visualization");

    const KNOWN: [ServiceId; 5] = [
        Self::CLICKHOUSE,
        Self::KAFKA,
        Self::VPC,
        Self::TRANSFER,
        Self::VISUALIZATION,
    ];

    pub fn new<T: Into<String>>(name: T) -> Self {
        Self(Cow::Owned(name.into()))
    }

    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The network address of a DoubleCloud service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub id: ServiceId,
    pub address: String,
}

/// The requested service has no known address.
#[derive(thiserror::Error, Debug)]
#[error(
    "Service \"{service}\" is not available at Cloud API endpoint \"{api_endpoint}\". Available services: [{}]",
    .available.join(" ")
)]
pub struct ServiceIsNotAvailable {
    service: ServiceId,
    api_endpoint: String,
    available: Vec<String>,
}

impl ServiceIsNotAvailable {
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// The base endpoint used by the SDK.
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    /// The services known to the SDK, sorted by name.
    pub fn available_services(&self) -> &[String] {
        &self.available
    }
}

/// The addresses of all known services, computed on first use.
#[derive(Debug)]
pub(crate) struct Endpoints {
    base: String,
    override_endpoint: bool,
    map: OnceLock<HashMap<ServiceId, ApiEndpoint>>,
}

impl Endpoints {
    pub(crate) fn new(base: String, override_endpoint: bool) -> Self {
        Self {
            base,
            override_endpoint,
            map: OnceLock::new(),
        }
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    pub(crate) fn get(&self, service: &ServiceId) -> Option<&ApiEndpoint> {
        self.map().get(service)
    }

    pub(crate) fn resolve(
        &self,
        service: &ServiceId,
    ) -> Result<&ApiEndpoint, ServiceIsNotAvailable> {
        self.get(service).ok_or_else(|| ServiceIsNotAvailable {
            service: service.clone(),
            api_endpoint: self.base.clone(),
            available: self.known_services(),
        })
    }

    pub(crate) fn known_services(&self) -> Vec<String> {
        let mut names = self
            .map()
            .keys()
            .map(|k| k.as_str().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    fn map(&self) -> &HashMap<ServiceId, ApiEndpoint> {
        self.map.get_or_init(|| {
            tracing::debug!("resolving service endpoints for {}", self.base);
            ServiceId::KNOWN
                .into_iter()
                .map(|id| {
                    let address = if self.override_endpoint {
                        self.base.clone()
                    } else {
                        format!("{id}.{}", self.base)
                    };
                    (id.clone(), ApiEndpoint { id, address })
                })
                .collect()
        })
    }
}
