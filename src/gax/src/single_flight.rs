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

//! Deduplicates concurrent calls with the same key.
//!
//! The client libraries need to run some operations at most once at a time:
//! dialing a connection to a given address, shutting down a connection pool,
//! or refreshing an access token. When multiple tasks request the same
//! operation concurrently, only the first one starts the work. The other tasks
//! await the in-flight operation and receive a clone of its result.
//!
//! Results are not cached. Once an operation completes, the next call with
//! the same key starts a new operation.
//!
//! Dropping every caller cancels the operation: it is removed from the group
//! and dropped, and the next call with the same key starts a new one.
//!
//! # Example
//! ```
//! # use doublecloud_gax::single_flight::Group;
//! # tokio_test::block_on(async {
//! let group = Group::<&'static str, u64>::new();
//! let value = group.run("answer", || async { 42 }).await;
//! assert_eq!(value, 42);
//! # });
//! ```

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

type Calls<K, V> = Arc<Mutex<HashMap<K, Call<V>>>>;

struct Call<V> {
    generation: u64,
    waiters: usize,
    future: Shared<BoxFuture<'static, V>>,
}

// Registers one caller of an in-flight operation. The last one to drop,
// before the operation completes, removes it from the group.
struct Waiter<K: Eq + Hash, V> {
    calls: Calls<K, V>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash, V> Drop for Waiter<K, V> {
    fn drop(&mut self) {
        let cancelled = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            match calls.get_mut(&self.key) {
                Some(call) if call.generation == self.generation => {
                    call.waiters -= 1;
                    if call.waiters == 0 {
                        calls.remove(&self.key)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        // The operation is dropped outside the lock.
        drop(cancelled);
    }
}

/// A set of keyed, in-flight operations.
///
/// Cloning a `Group` returns a handle to the same set of operations.
pub struct Group<K, V> {
    calls: Calls<K, V>,
    next: Arc<Mutex<u64>>,
}

impl<K, V> Clone for Group<K, V> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            next: self.next.clone(),
        }
    }
}

impl<K, V> std::fmt::Debug for Group<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Group")
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl<K, V> Default for Group<K, V> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            next: Arc::new(Mutex::new(0)),
        }
    }
}

impl<K, V> Group<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the operation created by `f`, unless an operation for `key` is
    /// already in flight.
    ///
    /// If there is an operation in flight for `key` this function awaits its
    /// result and `f` is never called.
    ///
    /// The operation keeps running while any caller awaits its result. If all
    /// the callers are dropped the operation is dropped too, and the next call
    /// for `key` starts a new operation.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (future, _waiter) = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let call = calls.entry(key.clone()).or_insert_with(|| {
                let generation = self.next_generation();
                let future = Self::track(self.calls.clone(), key.clone(), generation, f())
                    .boxed()
                    .shared();
                Call {
                    generation,
                    waiters: 0,
                    future,
                }
            });
            call.waiters += 1;
            let waiter = Waiter {
                calls: self.calls.clone(),
                key,
                generation: call.generation,
            };
            (call.future.clone(), waiter)
        };
        future.await
    }

    /// Returns `true` if there is an operation in flight for `key`.
    pub fn in_flight(&self, key: &K) -> bool {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn next_generation(&self) -> u64 {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        *next
    }

    // Removes the entry for `key` as soon as the operation completes, before
    // any waiter observes the result. A caller arriving after that starts a
    // new operation.
    async fn track<Fut>(calls: Calls<K, V>, key: K, generation: u64, future: Fut) -> V
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let value = future.await;
        let mut calls = calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(&key).is_some_and(|c| c.generation == generation) {
            calls.remove(&key);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn single_call() {
        let group = Group::<String, i32>::new();
        let got = group.run("a".to_string(), || async { 7 }).await;
        assert_eq!(got, 7);
        assert!(!group.in_flight(&"a".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_calls_share_result() {
        let group = Group::<String, Result<usize, String>>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..100)
            .map(|_| {
                let group = group.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    group
                        .run("key".to_string(), move || async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(calls.fetch_add(1, Ordering::SeqCst))
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let got = task.await.expect("task should not panic");
            assert_eq!(got, Ok(0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_errors_are_shared() {
        let group = Group::<&'static str, Result<(), String>>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20)
            .map(|_| {
                let group = group.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    group
                        .run("key", move || async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err("epic fail".to_string())
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let got = task.await.expect("task should not panic");
            assert_eq!(got, Err("epic fail".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn results_are_not_cached() {
        let group = Group::<u32, usize>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for want in 0..3 {
            let calls = calls.clone();
            let got = group
                .run(1, move || async move { calls.fetch_add(1, Ordering::SeqCst) })
                .await;
            assert_eq!(got, want);
        }
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let group = Group::<u32, u32>::new();
        let (a, b) = tokio::join!(
            group.run(1, || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                1
            }),
            group.run(2, || async { 2 }),
        );
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_callers_cancel_the_operation() {
        let group = Group::<u32, u32>::new();
        let dropped = Arc::new(AtomicUsize::new(0));
        let guard = DropCounter(dropped.clone());
        let pending = group.run(1, move || async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        });
        let got = tokio::time::timeout(Duration::from_secs(10), pending).await;
        assert!(got.is_err(), "{got:?}");
        assert!(!group.in_flight(&1));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);

        // The next call starts a new operation.
        let got = group.run(1, || async { 99 }).await;
        assert_eq!(got, 99);
        assert!(!group.in_flight(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_callers_keep_the_operation() {
        let group = Group::<u32, u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let make = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                1
            }
        };
        let mut first = Box::pin(group.run(1, make(calls.clone())));
        let mut second = Box::pin(group.run(1, make(calls.clone())));

        // Start both callers, then give up on the first one.
        tokio::select! {
            biased;
            _ = &mut first => panic!("the operation should not complete"),
            _ = &mut second => panic!("the operation should not complete"),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        drop(first);
        assert!(group.in_flight(&1));

        assert_eq!(second.await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!group.in_flight(&1));
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
