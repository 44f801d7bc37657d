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

//! A fake `OperationService` for the end-to-end tests.

use doublecloud_sdk::model::operation::Status;
use doublecloud_sdk::model::{GetOperationRequest, Operation};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tonic::codegen::{Body, BoxFuture, Context, Poll, Service, StdError, http};

const GET_PATH: &str = "/doublecloud.kafka.v1.OperationService/Get";

/// A request received by the fake service.
#[derive(Clone, Debug, PartialEq)]
pub struct Received {
    pub authorization: Option<String>,
    pub operation_id: String,
}

/// Returns canned responses, in order, and records the requests.
#[derive(Clone, Debug, Default)]
pub struct FakeOperations {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    responses: VecDeque<tonic::Result<Operation>>,
    received: Vec<Received>,
}

impl FakeOperations {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = tonic::Result<Operation>>,
    {
        let state = State {
            responses: responses.into_iter().collect(),
            received: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    fn get(
        &self,
        request: tonic::Request<GetOperationRequest>,
    ) -> tonic::Result<tonic::Response<Operation>> {
        let authorization = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut state = self.state.lock().unwrap();
        state.received.push(Received {
            authorization,
            operation_id: request.into_inner().operation_id,
        });
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(tonic::Status::resource_exhausted("no more responses")))
            .map(tonic::Response::new)
    }
}

impl tonic::server::NamedService for FakeOperations {
    const NAME: &'static str = "doublecloud.kafka.v1.OperationService";
}

struct GetSvc(FakeOperations);

impl tonic::server::UnaryService<GetOperationRequest> for GetSvc {
    type Response = Operation;
    type Future = BoxFuture<tonic::Response<Operation>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<GetOperationRequest>) -> Self::Future {
        let result = self.0.get(request);
        Box::pin(async move { result })
    }
}

impl<B> Service<http::Request<B>> for FakeOperations
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        if request.uri().path() != GET_PATH {
            let status = tonic::Status::unimplemented(request.uri().path().to_string());
            return Box::pin(async move { Ok(status.into_http()) });
        }
        let service = GetSvc(self.clone());
        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(tonic_prost::ProstCodec::default());
            Ok(grpc.unary(service, request).await)
        })
    }
}

/// Starts serving `fake` on a random loopback port.
///
/// Returns the address, in `host:port` format, and the server task.
pub async fn start(fake: FakeOperations) -> anyhow::Result<(String, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let stream = tokio_stream::wrappers::TcpListenerStream::new(listener);
        let _ = tonic::transport::Server::builder()
            .add_service(fake)
            .serve_with_incoming(stream)
            .await;
    });
    Ok((addr.to_string(), server))
}

pub fn pending(id: &str) -> Operation {
    operation(id, Status::Pending)
}

pub fn done(id: &str) -> Operation {
    operation(id, Status::Done)
}

pub fn operation(id: &str, status: Status) -> Operation {
    Operation {
        id: id.to_string(),
        status: status as i32,
        ..Default::default()
    }
}
