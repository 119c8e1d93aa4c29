//! Call memoization - Reuse loader and initializer results by call signature

use std::collections::HashMap;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::signature::CallSignature;
use crate::error::ResolveResult;

type MemoizedCall<'a, T> = Shared<BoxFuture<'a, ResolveResult<T>>>;

/// Outcome of a memoized call
#[derive(Debug, Clone)]
pub struct MemoOutcome<T> {
    pub result: ResolveResult<T>,
    /// Whether the result came from the memo rather than a new invocation
    pub hit: bool,
}

/// Memo table of one entity type, scoped to a single load.
///
/// Entries are stored as shared futures, so a resolved result and a call
/// that is still in flight look the same to later callers.
pub struct CallMemo<'a, T> {
    calls: Mutex<HashMap<CallSignature, MemoizedCall<'a, T>>>,
}

impl<'a, T> Default for CallMemo<'a, T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<'a, T> CallMemo<'a, T>
where
    T: Clone + Send + Sync + 'a,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` unless `signature` is already memoized.
    ///
    /// With `share_pending` the entry is written before the call is awaited,
    /// and concurrent callers with the same signature await that one call.
    /// Without it the memo is checked, the call awaited and only then the
    /// result written, so callers racing between check and write each
    /// invoke `call`.
    pub async fn run<F>(&self, signature: CallSignature, share_pending: bool, call: F) -> MemoOutcome<T>
    where
        F: FnOnce() -> BoxFuture<'a, ResolveResult<T>>,
    {
        if share_pending {
            let (pending, hit) = {
                let mut calls = self.calls.lock();
                match calls.get(&signature) {
                    Some(existing) => (existing.clone(), true),
                    None => {
                        let pending = call().shared();
                        calls.insert(signature, pending.clone());
                        (pending, false)
                    }
                }
            };
            return MemoOutcome {
                result: pending.await,
                hit,
            };
        }

        let existing = self.calls.lock().get(&signature).cloned();
        if let Some(existing) = existing {
            return MemoOutcome {
                result: existing.await,
                hit: true,
            };
        }

        let result = call().await;
        let settled = future::ready(result.clone()).boxed().shared();
        self.calls.lock().insert(signature, settled);
        MemoOutcome { result, hit: false }
    }

    pub fn contains(&self, signature: &CallSignature) -> bool {
        self.calls.lock().contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}
