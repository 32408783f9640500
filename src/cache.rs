//! Grammar load cache - at most one fetch per scope
//!
//! The first request for a scope spawns the fetch-and-register task and
//! stores its shared outcome in the map before anything is awaited. Every
//! later caller, concurrent or not, awaits that outcome instead of fetching
//! again. The task does not belong to any caller: a caller that gives up
//! waiting leaves the load running. Outcomes, failures included, are kept for
//! the lifetime of the cache.

use crate::loader::GrammarLoader;
use crate::scope::ScopeName;
use crate::store::GrammarStore;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type LoadOutcome = Shared<BoxFuture<'static, Result<()>>>;

/// Memoizes fetch-and-register per scope name.
///
/// Loads run as tokio tasks, so `ensure_loaded` must be awaited inside a
/// tokio runtime.
pub struct GrammarLoadCache {
    loader: Arc<dyn GrammarLoader>,
    entries: Mutex<HashMap<ScopeName, LoadOutcome>>,
    fetches: Arc<AtomicUsize>,
}

impl GrammarLoadCache {
    pub fn new(loader: Arc<dyn GrammarLoader>) -> Self {
        Self {
            loader,
            entries: Mutex::new(HashMap::new()),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make sure the loader was asked for `scope` and its answer registered
    /// with `store`.
    ///
    /// A loader answering "no grammar" is not an error here; the scope is
    /// simply absent from the store afterwards.
    pub async fn ensure_loaded<S>(&self, scope: &ScopeName, store: &Arc<S>) -> Result<()>
    where
        S: GrammarStore + ?Sized + 'static,
    {
        let outcome = {
            let mut entries = self.entries.lock();
            entries
                .entry(scope.clone())
                .or_insert_with(|| self.spawn_load(scope, store))
                .clone()
        };
        outcome.await
    }

    fn spawn_load<S>(&self, scope: &ScopeName, store: &Arc<S>) -> LoadOutcome
    where
        S: GrammarStore + ?Sized + 'static,
    {
        let task = tokio::spawn(fetch_and_register(
            self.loader.clone(),
            store.clone(),
            scope.clone(),
            self.fetches.clone(),
        ));
        let scope = scope.clone();
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Loader {
                    scope,
                    cause: Arc::new(anyhow::anyhow!("load task failed: {}", e)),
                }),
            }
        }
        .boxed()
        .shared()
    }

    /// True once the load of `scope` completed, successfully or not
    pub fn is_settled(&self, scope: &ScopeName) -> bool {
        self.entries
            .lock()
            .get(scope)
            .is_some_and(|outcome| outcome.peek().is_some())
    }

    /// Scopes whose load completed, sorted
    pub fn settled_scopes(&self) -> Vec<ScopeName> {
        let mut scopes: Vec<ScopeName> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, outcome)| outcome.peek().is_some())
            .map(|(scope, _)| scope.clone())
            .collect();
        scopes.sort();
        scopes
    }

    /// Number of times the loader has been called
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

async fn fetch_and_register<S>(
    loader: Arc<dyn GrammarLoader>,
    store: Arc<S>,
    scope: ScopeName,
    fetches: Arc<AtomicUsize>,
) -> Result<()>
where
    S: GrammarStore + ?Sized,
{
    fetches.fetch_add(1, Ordering::SeqCst);
    tracing::debug!("Fetching grammar {}", scope);

    match loader.load_grammar(&scope).await {
        Ok(Some(grammar)) => {
            let injections = loader.injections(&scope);
            store.add_grammar(grammar, injections);
            Ok(())
        }
        Ok(None) => {
            tracing::debug!("Loader has no grammar for {}", scope);
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Loading {} failed: {:#}", scope, e);
            Err(Error::Loader {
                scope,
                cause: Arc::new(e),
            })
        }
    }
}

impl std::fmt::Debug for GrammarLoadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarLoadCache")
            .field("entries", &self.entries.lock().len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::RawGrammar;
    use crate::store::MemoryStore;
    use crate::testing::{CountingLoader, scope};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_requests_fetch_once() {
        let loader = Arc::new(
            CountingLoader::new()
                .with_grammar(RawGrammar::new(scope("source.a")))
                .with_delay(Duration::from_millis(20)),
        );
        let cache = GrammarLoadCache::new(loader.clone());
        let store = Arc::new(MemoryStore::default());
        let a = scope("source.a");

        let results =
            futures::future::join_all((0..8).map(|_| cache.ensure_loaded(&a, &store))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(loader.fetches("source.a"), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert!(store.lookup(&a).is_some());

        cache.ensure_loaded(&a, &store).await.unwrap();
        assert_eq!(loader.fetches("source.a"), 1);
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_restart_fetch() {
        let loader = Arc::new(
            CountingLoader::new()
                .with_grammar(RawGrammar::new(scope("source.a")))
                .with_delay(Duration::from_millis(50)),
        );
        let cache = GrammarLoadCache::new(loader.clone());
        let store = Arc::new(MemoryStore::default());
        let a = scope("source.a");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), cache.ensure_loaded(&a, &store)).await;
        assert!(abandoned.is_err());
        assert!(!cache.is_settled(&a));

        cache.ensure_loaded(&a, &store).await.unwrap();
        assert_eq!(loader.fetches("source.a"), 1);
        assert!(store.lookup(&a).is_some());
    }

    #[tokio::test]
    async fn test_load_finishes_without_waiters() {
        let loader = Arc::new(
            CountingLoader::new()
                .with_grammar(RawGrammar::new(scope("source.a")))
                .with_delay(Duration::from_millis(20)),
        );
        let cache = GrammarLoadCache::new(loader.clone());
        let store = Arc::new(MemoryStore::default());
        let a = scope("source.a");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), cache.ensure_loaded(&a, &store)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.lookup(&a).is_some());
        assert_eq!(loader.total_fetches(), 1);
    }

    #[tokio::test]
    async fn test_absent_grammar_is_not_an_error() {
        let loader = Arc::new(CountingLoader::new());
        let cache = GrammarLoadCache::new(loader.clone());
        let store = Arc::new(MemoryStore::default());

        cache.ensure_loaded(&scope("source.none"), &store).await.unwrap();
        assert!(store.lookup(&scope("source.none")).is_none());
        assert!(cache.is_settled(&scope("source.none")));
    }

    #[tokio::test]
    async fn test_failure_is_cached() {
        let loader = Arc::new(CountingLoader::new().failing_on("source.bad"));
        let cache = GrammarLoadCache::new(loader.clone());
        let store = Arc::new(MemoryStore::default());
        let bad = scope("source.bad");

        let first = cache.ensure_loaded(&bad, &store).await;
        let second = cache.ensure_loaded(&bad, &store).await;

        match (first, second) {
            (Err(Error::Loader { scope, cause }), Err(Error::Loader { cause: again, .. })) => {
                assert_eq!(scope, bad);
                assert!(cause.to_string().contains("backend unavailable"));
                assert!(Arc::ptr_eq(&cause, &again));
            }
            other => panic!("expected cached loader errors, got {:?}", other),
        }
        assert_eq!(loader.fetches("source.bad"), 1);
    }

    #[tokio::test]
    async fn test_injections_are_registered() {
        let loader = Arc::new(
            CountingLoader::new()
                .with_grammar(RawGrammar::new(scope("source.c")))
                .with_injections("source.c", &["source.d"]),
        );
        let cache = GrammarLoadCache::new(loader);
        let store = Arc::new(MemoryStore::default());

        cache.ensure_loaded(&scope("source.c"), &store).await.unwrap();
        assert_eq!(store.injections(&scope("source.c")), vec![scope("source.d")]);
        assert_eq!(cache.settled_scopes(), vec![scope("source.c")]);
    }
}
