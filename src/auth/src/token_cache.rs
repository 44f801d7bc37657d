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

use crate::Result;
use crate::clock::Clock;
use crate::token::{Token, TokenProvider};
use gax::single_flight::Group;
use std::sync::{Arc, Mutex, PoisonError};

/// Caches the last good token returned by a [TokenProvider].
///
/// The cached token is returned while it is valid. Once it expires, the first
/// caller starts a refresh and any concurrent callers await the result of that
/// refresh. Errors are not cached, the next call after a failure starts a new
/// refresh.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    // The last good token, if any.
    token: Arc<Mutex<Option<Token>>>,

    // At most one refresh is in flight.
    refresh: Group<(), Result<Token>>,

    // The token provider. This thing does the refreshing.
    inner: Arc<T>,

    clock: Arc<dyn Clock>,
}

// We manually implement the `Clone` trait because the Rust compiler will
// squawk if `T` is not `Clone`, even though we only hold an `Arc<T>`.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            token: self.token.clone(),
            refresh: self.refresh.clone(),
            inner: self.inner.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T: TokenProvider + 'static> TokenCache<T> {
    pub fn new(inner: T, clock: Arc<dyn Clock>) -> TokenCache<T> {
        Self::with_token(inner, None, clock)
    }

    /// Creates a cache seeded with `initial`, typically loaded from disk.
    pub fn with_token(inner: T, initial: Option<Token>, clock: Arc<dyn Clock>) -> TokenCache<T> {
        TokenCache {
            token: Arc::new(Mutex::new(initial)),
            refresh: Group::new(),
            inner: Arc::new(inner),
            clock,
        }
    }

    // Clones the current token, if it is still valid.
    fn current_token(&self) -> Option<Token> {
        let now = self.clock.now();
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .cloned()
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        if let Some(token) = self.current_token() {
            return Ok(token);
        }

        let inner = self.inner.clone();
        let slot = self.token.clone();
        self.refresh
            .run((), move || async move {
                let token = inner.token().await?;
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
                Ok(token)
            })
            .await
    }
}
