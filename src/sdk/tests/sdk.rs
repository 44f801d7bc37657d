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

mod fake;

use auth::credentials::service_account::{self, ServiceAccountKey};
use auth::credentials::{Credentials, iam_token};
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use doublecloud_sdk::endpoints::ServiceId;
use doublecloud_sdk::model::{self, operation::Status};
use doublecloud_sdk::{OperationDescriptor, Sdk};
use fake::{FakeOperations, Received, done, operation, pending};
use httptest::{Expectation, Server, matchers::*, responders::*};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type TestResult = anyhow::Result<()>;

fn enable_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn service_account() -> anyhow::Result<Credentials> {
    let private_key = RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 2048)?;
    let key = ServiceAccountKey {
        id: "test-key-id".into(),
        service_account_id: Some("test-sa-id".into()),
        private_key: private_key.to_pkcs8_pem(LineEnding::LF)?.to_string(),
        ..Default::default()
    };
    Ok(service_account::Builder::new(key).build()?)
}

fn builder(address: &str, credentials: Credentials) -> doublecloud_sdk::builder::Builder {
    Sdk::builder()
        .with_credentials(credentials)
        .with_endpoint(address)
        .with_override_endpoint(true)
        .with_plaintext(true)
        .with_dial_timeout(Duration::from_secs(5))
        .with_polling_interval(Duration::from_millis(10))
}

fn bearer(token: &str) -> Received {
    Received {
        authorization: Some(format!("Bearer {token}")),
        operation_id: "kfk-1".into(),
    }
}

#[tokio::test]
async fn no_credentials_fail_before_dial() -> TestResult {
    // Nothing listens on this port, a dial would fail with a connect error.
    let sdk = builder("127.0.0.1:1", Credentials::none()).build()?;
    let mut op = sdk.wrap_operation(OperationDescriptor::new("kfk-1"))?;
    let err = op.poll().await.unwrap_err();
    assert!(err.is_authentication(), "{err:?}");
    assert!(!err.is_connect(), "{err:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_account_token_is_cached() -> TestResult {
    enable_tracing();
    let auth_server = Server::run();
    auth_server.expect(
        Expectation::matching(request::method_path("POST", "/oauth/token"))
            .times(1)
            .respond_with(json_encoded(json!({
                "access_token": "abc",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
    );
    let fake = FakeOperations::new([Ok(pending("kfk-1")), Ok(pending("kfk-1")), Ok(done("kfk-1"))]);
    let (address, _server) = fake::start(fake.clone()).await?;

    let sdk = builder(&address, service_account()?)
        .with_auth_endpoint(auth_server.url_str("/oauth/token"))
        .build()?;
    let mut op = sdk.wrap_operation(pending("kfk-1"))?;
    op.wait().await?;
    assert!(op.ok(), "{op:?}");

    assert_eq!(fake.received(), vec![bearer("abc"); 3]);
    sdk.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_operation() -> TestResult {
    let mut failed = operation("kfk-1", Status::Invalid);
    failed.error = Some(model::Status {
        code: 13,
        message: "internal error".into(),
    });
    let fake = FakeOperations::new([Ok(failed)]);
    let (address, _server) = fake::start(fake.clone()).await?;

    let sdk = builder(&address, iam_token::Builder::new("test-token").build()).build()?;
    let mut op = sdk.wrap_operation(pending("kfk-1"))?;
    op.wait().await?;
    assert!(op.done(), "{op:?}");
    assert!(op.failed(), "{op:?}");
    let status = op.error().and_then(|e| e.status().cloned());
    assert_eq!(status, Some(gax::error::Status::new(13, "internal error")));

    assert_eq!(fake.received(), vec![bearer("test-token")]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_error() -> TestResult {
    let fake = FakeOperations::new([Err(tonic::Status::not_found("kfk-1 not found"))]);
    let (address, _server) = fake::start(fake.clone()).await?;

    let sdk = builder(&address, iam_token::Builder::new("test-token").build()).build()?;
    let mut op = sdk.wrap_operation(pending("kfk-1"))?;
    let err = op.wait().await.unwrap_err();
    let status = err.status().cloned();
    assert_eq!(status.map(|s| s.code), Some(tonic::Code::NotFound as i32), "{err:?}");
    assert!(!op.done(), "{op:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_cancelled() -> TestResult {
    let responses = std::iter::repeat_with(|| Ok(pending("kfk-1"))).take(1000);
    let fake = FakeOperations::new(responses);
    let (address, _server) = fake::start(fake.clone()).await?;

    let sdk = builder(&address, iam_token::Builder::new("test-token").build()).build()?;
    let mut op = sdk.wrap_operation(pending("kfk-1"))?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let err = op.wait_with_cancellation(&cancel).await.unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert!(!fake.received().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn check_endpoint_connection() -> TestResult {
    let fake = FakeOperations::new([]);
    let (address, _server) = fake::start(fake).await?;
    let sdk = builder(&address, iam_token::Builder::new("test-token").build()).build()?;
    sdk.check_endpoint_connection(&ServiceId::KAFKA).await?;
    // Override endpoints map every service to the same address.
    sdk.check_endpoint_connection(&ServiceId::CLICKHOUSE).await?;

    let sdk = builder("127.0.0.1:1", iam_token::Builder::new("test-token").build()).build()?;
    let err = sdk
        .check_endpoint_connection(&ServiceId::KAFKA)
        .await
        .unwrap_err();
    assert!(err.is_connect(), "{err:?}");
    assert_eq!(err.address(), Some("127.0.0.1:1"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_after_shutdown() -> TestResult {
    let fake = FakeOperations::new([Ok(pending("kfk-1")), Ok(pending("kfk-1"))]);
    let (address, _server) = fake::start(fake.clone()).await?;
    let sdk = builder(&address, iam_token::Builder::new("test-token").build()).build()?;
    let mut op = sdk.wrap_operation(pending("kfk-1"))?;
    op.poll().await?;

    let (a, b) = tokio::join!(sdk.shutdown(), sdk.shutdown());
    a?;
    b?;

    let err = op.poll().await.unwrap_err();
    assert!(err.is_closed(), "{err:?}");
    assert_eq!(fake.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn create_iam_token_is_not_cached() -> TestResult {
    let auth_server = Server::run();
    auth_server.expect(
        Expectation::matching(request::method_path("POST", "/oauth/token"))
            .times(2)
            .respond_with(json_encoded(json!({
                "access_token": "abc",
                "expires_in": 3600,
            }))),
    );
    let sdk = Sdk::builder()
        .with_credentials(service_account()?)
        .with_auth_endpoint(auth_server.url_str("/oauth/token"))
        .build()?;
    for _ in 0..2 {
        let token = sdk.create_iam_token().await?;
        assert_eq!(token.token, "abc");
        assert!(token.expires_at.is_some(), "{token:?}");
    }
    Ok(())
}

// Returns the `aud` claim of a signed assertion.
fn audience(jwt: &str) -> Option<String> {
    let claims = jwt.split('.').nth(1)?;
    let claims = BASE64_URL_SAFE_NO_PAD.decode(claims).ok()?;
    let claims = serde_json::from_slice::<serde_json::Value>(&claims).ok()?;
    claims["aud"].as_str().map(str::to_string)
}

// httptest only implements `Matcher` for closures over sized inputs; this
// adapts a `&str` predicate to `Matcher<str>`.
struct StrFn<F>(F);

impl<F: Fn(&str) -> bool + Send> Matcher<str> for StrFn<F> {
    fn matches(&mut self, input: &str, _ctx: &mut ExecutionContext) -> bool {
        (self.0)(input)
    }

    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "fn(&str) -> bool")
    }
}

#[tokio::test]
async fn assertion_audience_is_auth_endpoint() -> TestResult {
    let auth_server = Server::run();
    let auth_endpoint = auth_server.url_str("/oauth/token");
    let want = auth_endpoint.clone();
    auth_server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/oauth/token"),
            request::body(url_decoded(contains((
                "assertion",
                StrFn(move |jwt: &str| audience(jwt).as_deref() == Some(want.as_str())),
            )))),
        ])
        .times(1)
        .respond_with(json_encoded(json!({
            "access_token": "abc",
            "expires_in": 3600,
        }))),
    );
    let sdk = Sdk::builder()
        .with_credentials(service_account()?)
        .with_auth_endpoint(auth_endpoint)
        .build()?;
    let token = sdk.create_iam_token().await?;
    assert_eq!(token.token, "abc");
    Ok(())
}

#[tokio::test]
async fn unknown_operation() -> TestResult {
    let sdk = builder("127.0.0.1:1", Credentials::none()).build()?;
    let err = sdk
        .wrap_operation(model::Operation {
            id: "not-an-operation".into(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(
        err.to_string()
            .contains(r#"Unknown operation type, opID: "not-an-operation""#),
        "{err}"
    );
    Ok(())
}
