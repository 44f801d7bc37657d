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

use super::CredentialsError;
use std::error::Error as StdError;
use std::sync::Arc;

type BoxError = Box<dyn StdError + Send + Sync>;
type SharedError = Arc<dyn StdError + Send + Sync>;

fn shared<T: Into<BoxError>>(source: T) -> SharedError {
    Arc::from(source.into())
}

/// The core error returned by all client libraries.
///
/// The client libraries report errors from multiple sources. For example, the
/// credentials may be unable to produce a token, the transport may be unable
/// to create the necessary connection, the client may have been shut down, or
/// the service may reject the request.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a series of predicates to determine the error
/// kind. Applications can query the error [source][std::error::Error::source]
/// for deeper information.
///
/// Errors are cheap to clone. The same error is often reported to several
/// callers waiting on a shared operation, such as a connection dial.
///
/// # Example
/// ```
/// use doublecloud_gax::error::Error;
/// match example_function() {
///     Err(e) if e.is_closed() => { println!("the client was shut down"); },
///     Err(e) if e.is_cancelled() => { println!("gave up waiting {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::closed())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<SharedError>,
}

impl Error {
    /// Creates an error with the status returned by the service.
    ///
    /// # Example
    /// ```
    /// use doublecloud_gax::error::{Error, Status};
    /// let status = Status::new(5, "NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(status),
            source: None,
        }
    }

    /// Creates an error with the status returned by the service, preserving
    /// the original transport-level error as its source.
    pub fn service_with_source<T: Into<BoxError>>(status: Status, source: T) -> Self {
        Self {
            kind: ErrorKind::Service(status),
            source: Some(shared(source)),
        }
    }

    /// The [Status] returned by the service, if any.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s),
            _ => None,
        }
    }

    /// Cannot create the authentication headers.
    pub fn authentication(source: CredentialsError) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            source: Some(Arc::new(source)),
        }
    }

    /// Could not create the authentication headers before sending the request.
    ///
    /// # Troubleshooting
    ///
    /// Typically this indicates misconfigured credentials: a client built with
    /// `NoCredentials`, an invalid service account key, or a federation flow
    /// that did not complete.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// Could not establish a connection to `address`.
    ///
    /// # Example
    /// ```
    /// use doublecloud_gax::error::Error;
    /// let error = Error::connect("kafka.api.double.cloud:443", "connection refused");
    /// assert!(error.is_connect());
    /// assert_eq!(error.address(), Some("kafka.api.double.cloud:443"));
    /// ```
    pub fn connect<A: Into<String>, T: Into<BoxError>>(address: A, source: T) -> Self {
        Self {
            kind: ErrorKind::Connect(address.into()),
            source: Some(shared(source)),
        }
    }

    /// The request could not be sent because the connection failed.
    pub fn is_connect(&self) -> bool {
        matches!(self.kind, ErrorKind::Connect(_))
    }

    /// The address of the endpoint, for connection errors.
    pub fn address(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Connect(a) => Some(a.as_str()),
            _ => None,
        }
    }

    /// The client, or the connection pool it uses, is shut down.
    pub fn closed() -> Self {
        Self {
            kind: ErrorKind::Closed,
            source: None,
        }
    }

    /// The request was rejected because the client is shut down.
    ///
    /// This error is terminal, create a new client to make more requests.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed)
    }

    /// The operation was cancelled before it completed.
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(shared(source)),
        }
    }

    /// The operation was cancelled, either by the application or by a client
    /// shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a timeout.
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(shared(source)),
        }
    }

    /// The request could not be completed before its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// The response could not be deserialized.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(shared(source)),
        }
    }

    /// The response could not be deserialized.
    ///
    /// # Troubleshooting
    ///
    /// This may indicate the endpoint is not a DoubleCloud API endpoint, or
    /// the client library is out of date with respect to the service.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// A problem in the transport layer after the connection was established.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(shared(source)),
        }
    }

    /// The transport reported an error while sending or receiving data.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// An uncategorized error.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(shared(source)),
        }
    }

    /// Finds the first error of type `T` in the chain of sources.
    ///
    /// # Example
    /// ```
    /// use doublecloud_gax::error::{CredentialsError, Error};
    /// let error = Error::authentication(CredentialsError::from_msg(false, "test-only"));
    /// let inner = error.as_inner::<CredentialsError>();
    /// assert!(inner.is_some_and(|e| !e.is_retryable()));
    /// ```
    pub fn as_inner<T: StdError + 'static>(&self) -> Option<&T> {
        let mut e: &(dyn StdError + 'static) = self.source.as_deref()?;
        // Guard against cycles in the chain of sources.
        for _ in 0..32 {
            if let Some(value) = e.downcast_ref::<T>() {
                return Some(value);
            }
            e = e.source()?;
        }
        None
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Closed, _) => write!(f, "client connection context closed"),
            (ErrorKind::Service(s), _) => write!(
                f,
                "the service reports an error with code {} described as: {}",
                s.code, s.message
            ),
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers {e}")
            }
            (ErrorKind::Connect(address), Some(e)) => {
                write!(f, "error dialing endpoint '{address}': {e}")
            }
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the operation was cancelled: {e}"),
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Io, Some(e)) => write!(f, "the transport reports an error: {e}"),
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The status reported by a service when it rejects a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
    /// The status code, using the gRPC numbering.
    pub code: i32,
    /// A developer-facing error message.
    pub message: String,
}

impl Status {
    /// Creates a new status.
    pub fn new<T: Into<String>>(code: i32, message: T) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// The type of error held by an [Error] instance.
#[derive(Clone, Debug)]
enum ErrorKind {
    Authentication,
    Connect(String),
    Closed,
    Cancelled,
    Timeout,
    Deserialization,
    Io,
    Service(Status),
    /// A uncategorized error.
    Other,
}
