//! # Sync engine (C8)
//!
//! Orchestrates local-store ↔ remote-store reconciliation across N remote
//! stores, with background write-behind and per-remote single-flight
//! coalescing (spec.md §4.8). Concurrency primitives: `tokio::sync::{Mutex,
//! Notify}` plus a `futures_util::future::Shared` future for in-flight
//! coalescing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{FutureExt, Shared};
use log::{debug, warn};
use tokio::sync::{Mutex, Notify};

use crate::errors::WalletError;
use crate::merge::{self, MergeOutcome};
use crate::providers::RemoteStoreProvider;
use crate::store::TokenStore;

/// Per-remote connection/reconciliation state (spec.md §4.8 state diagram).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Idle,
    Ready,
    Merging,
    Error(String),
}

type SyncFuture = Shared<Pin<Box<dyn Future<Output = Result<MergeOutcome, WalletError>> + Send>>>;

/// One remote store plus the bookkeeping needed for single-flight coalescing.
struct RemoteHandle {
    name: String,
    provider: Arc<Mutex<Box<dyn RemoteStoreProvider>>>,
    state: Arc<Mutex<SyncState>>,
    inflight: Arc<Mutex<Option<SyncFuture>>>,
}

/// Orchestrates reconciliation between one local [`TokenStore`] and any
/// number of remote stores.
pub struct SyncEngine {
    local: Arc<Mutex<TokenStore>>,
    remotes: Vec<RemoteHandle>,
    dirty: Arc<AtomicBool>,
    debounce: Duration,
    notify: Arc<Notify>,
}

impl SyncEngine {
    pub fn new(local: TokenStore, debounce: Duration) -> Self {
        SyncEngine {
            local: Arc::new(Mutex::new(local)),
            remotes: Vec::new(),
            dirty: Arc::new(AtomicBool::new(false)),
            debounce,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Register a remote store. Per spec.md §9's "Write-behind vs manual
    /// sync" caveat: registering a provider *after* a burst of writes can
    /// mean a partial state gets pushed by the next debounce tick before an
    /// explicit `sync()` — this is a documented caveat, not something this
    /// port works around.
    pub fn add_remote(&mut self, name: impl Into<String>, provider: Box<dyn RemoteStoreProvider>) {
        self.remotes.push(RemoteHandle {
            name: name.into(),
            provider: Arc::new(Mutex::new(provider)),
            state: Arc::new(Mutex::new(SyncState::Disconnected)),
            inflight: Arc::new(Mutex::new(None)),
        });
    }

    pub async fn local_snapshot(&self) -> TokenStore {
        self.local.lock().await.clone()
    }

    /// Apply `f` to the local store and mark it dirty, waking the
    /// write-behind task. Writes issued from one caller in sequence apply
    /// to the in-memory store in that order (spec.md §5 "Ordering
    /// guarantees") because `self.local` is a single mutex-guarded value.
    pub async fn mutate_local<F, T>(&self, f: F) -> Result<T, WalletError>
    where
        F: FnOnce(&mut TokenStore) -> Result<T, WalletError>,
    {
        let mut guard = self.local.lock().await;
        let result = f(&mut guard)?;
        drop(guard);
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(result)
    }

    pub fn remote_state(&self, index: usize) -> Option<Arc<Mutex<SyncState>>> {
        self.remotes.get(index).map(|r| r.state.clone())
    }

    async fn connect(handle: &RemoteHandle) -> Result<(), WalletError> {
        let mut provider = handle.provider.lock().await;
        provider.initialize().await?;
        *handle.state.lock().await = SyncState::Idle;
        Ok(())
    }

    pub async fn connect_all(&self) -> Result<(), WalletError> {
        for remote in &self.remotes {
            Self::connect(remote).await?;
        }
        Ok(())
    }

    /// Reconcile the local store against remote `index`, honoring `timeout`.
    ///
    /// A concurrent call while a merge is already in flight is coalesced:
    /// it awaits the same [`Shared`] future rather than starting a second
    /// merge (spec.md §4.8 "At-most-one sync per remote in flight"). On
    /// timeout the local store is left untouched and the call reports
    /// failure (spec.md §4.8 "Cancellation"); the `inflight` slot is also
    /// cleared so a later `sync()` starts a fresh merge over a fresh
    /// snapshot rather than coalescing onto — and eventually reviving — the
    /// stale, pre-timeout computation (which would otherwise overwrite
    /// `local` with a merge that predates any writes applied meanwhile).
    pub async fn sync(&self, index: usize, timeout: Duration) -> Result<MergeOutcome, WalletError> {
        let remote = self
            .remotes
            .get(index)
            .ok_or_else(|| WalletError::provider_unavailable("remote-store", "no such remote"))?;

        let shared = {
            let mut inflight = remote.inflight.lock().await;
            if let Some(existing) = inflight.as_ref() {
                debug!(target: "wallet::sync", "coalescing sync request for {}", remote.name);
                existing.clone()
            } else {
                let local = self.local.clone();
                let provider = remote.provider.clone();
                let state = remote.state.clone();
                let dirty = self.dirty.clone();
                let inflight_cell = remote.inflight.clone();

                let fut: Pin<Box<dyn Future<Output = Result<MergeOutcome, WalletError>> + Send>> =
                    Box::pin(async move {
                        *state.lock().await = SyncState::Merging;
                        let snapshot = local.lock().await.clone();

                        let mut provider_guard = provider.lock().await;
                        let result = provider_guard.sync(&snapshot).await;
                        drop(provider_guard);

                        match &result {
                            Ok(outcome) => {
                                *local.lock().await = outcome.merged.clone();
                                dirty.store(false, Ordering::SeqCst);
                                *state.lock().await = SyncState::Ready;
                            }
                            Err(e) => {
                                warn!(target: "wallet::sync", "merge failed: {e}");
                                *state.lock().await = SyncState::Error(e.to_string());
                            }
                        }

                        *inflight_cell.lock().await = None;
                        result
                    });

                let shared = fut.shared();
                *inflight = Some(shared.clone());
                shared
            }
        };

        match tokio::time::timeout(timeout, shared).await {
            Ok(result) => result,
            Err(_) => {
                *remote.inflight.lock().await = None;
                Err(WalletError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Sync every registered remote, best-effort (a single remote's failure
    /// does not abort the others).
    pub async fn sync_all(&self, timeout: Duration) -> Vec<(String, Result<MergeOutcome, WalletError>)> {
        let mut results = Vec::with_capacity(self.remotes.len());
        for (index, remote) in self.remotes.iter().enumerate() {
            let outcome = self.sync(index, timeout).await;
            results.push((remote.name.clone(), outcome));
        }
        results
    }

    /// Background write-behind loop: wait for a dirty mark or the debounce
    /// window, then flush to every remote. Callers spawn this once via
    /// `tokio::spawn(engine.write_behind_loop())`.
    pub async fn write_behind_loop(self: Arc<Self>) {
        loop {
            self.notify.notified().await;
            tokio::time::sleep(self.debounce).await;
            if self.dirty.load(Ordering::SeqCst) {
                let _ = self.sync_all(Duration::from_secs(30)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreMeta;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn meta(version: u64) -> StoreMeta {
        StoreMeta {
            version,
            address: "alpha1abc".into(),
            ipns_name: "12D3KooWabc".into(),
            format_version: "2.0".into(),
            last_cid: None,
            device_id: None,
        }
    }

    struct CountingRemote {
        calls: Arc<AtomicUsize>,
        remote_store: TokenStore,
    }

    #[async_trait]
    impl RemoteStoreProvider for CountingRemote {
        fn name(&self) -> &str {
            "counting"
        }

        async fn initialize(&mut self) -> Result<(), WalletError> {
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), WalletError> {
            Ok(())
        }

        async fn load(&self, _cid: Option<&str>) -> Result<TokenStore, WalletError> {
            Ok(self.remote_store.clone())
        }

        async fn save(&mut self, _data: &TokenStore) -> Result<Option<String>, WalletError> {
            Ok(None)
        }

        async fn sync(&mut self, local_snapshot: &TokenStore) -> Result<MergeOutcome, WalletError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            merge::merge(local_snapshot, &self.remote_store, 0)
        }
    }

    #[tokio::test]
    async fn concurrent_sync_calls_coalesce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = SyncEngine::new(TokenStore::new(meta(1)), Duration::from_millis(250));
        engine.add_remote(
            "r1",
            Box::new(CountingRemote {
                calls: calls.clone(),
                remote_store: TokenStore::new(meta(1)),
            }),
        );
        let engine = Arc::new(engine);

        let e1 = engine.clone();
        let e2 = engine.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { e1.sync(0, Duration::from_secs(5)).await }),
            tokio::spawn(async move { e2.sync(0, Duration::from_secs(5)).await }),
        );

        a.unwrap().unwrap();
        b.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second call coalesced onto the first");
    }

    #[tokio::test]
    async fn sync_timeout_leaves_local_untouched() {
        struct SlowRemote;
        #[async_trait]
        impl RemoteStoreProvider for SlowRemote {
            fn name(&self) -> &str {
                "slow"
            }
            async fn initialize(&mut self) -> Result<(), WalletError> {
                Ok(())
            }
            async fn shutdown(&mut self) -> Result<(), WalletError> {
                Ok(())
            }
            async fn load(&self, _cid: Option<&str>) -> Result<TokenStore, WalletError> {
                Ok(TokenStore::new(StoreMeta {
                    version: 1,
                    address: "alpha1abc".into(),
                    ipns_name: "12D3KooWabc".into(),
                    format_version: "2.0".into(),
                    last_cid: None,
                    device_id: None,
                }))
            }
            async fn save(&mut self, _data: &TokenStore) -> Result<Option<String>, WalletError> {
                Ok(None)
            }
            async fn sync(&mut self, _local_snapshot: &TokenStore) -> Result<MergeOutcome, WalletError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                unreachable!("timeout should fire first");
            }
        }

        let mut engine = SyncEngine::new(TokenStore::new(meta(1)), Duration::from_millis(250));
        engine.add_remote("slow", Box::new(SlowRemote));
        let engine = Arc::new(engine);

        let before = engine.local_snapshot().await.meta().unwrap().version;
        let result = engine.sync(0, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(WalletError::Timeout(_))));

        let after = engine.local_snapshot().await.meta().unwrap().version;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn write_after_timeout_survives_next_sync() {
        // A remote whose first `sync()` call sleeps long enough to blow the
        // caller's timeout, then resolves instantly on the second call. If
        // the engine coalesced the second `sync()` onto the first call's
        // abandoned future, the merge it eventually produces would be based
        // on the pre-timeout snapshot and would not see `bump_balance`.
        struct OnceSlowRemote {
            calls: Arc<AtomicUsize>,
        }
        #[async_trait]
        impl RemoteStoreProvider for OnceSlowRemote {
            fn name(&self) -> &str {
                "once-slow"
            }
            async fn initialize(&mut self) -> Result<(), WalletError> {
                Ok(())
            }
            async fn shutdown(&mut self) -> Result<(), WalletError> {
                Ok(())
            }
            async fn load(&self, _cid: Option<&str>) -> Result<TokenStore, WalletError> {
                Ok(TokenStore::new(meta(1)))
            }
            async fn save(&mut self, _data: &TokenStore) -> Result<Option<String>, WalletError> {
                Ok(None)
            }
            async fn sync(&mut self, local_snapshot: &TokenStore) -> Result<MergeOutcome, WalletError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                merge::merge(local_snapshot, &TokenStore::new(meta(1)), 0)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = SyncEngine::new(TokenStore::new(meta(1)), Duration::from_millis(250));
        engine.add_remote("once-slow", Box::new(OnceSlowRemote { calls }));
        let engine = Arc::new(engine);

        let first = engine.sync(0, Duration::from_millis(10)).await;
        assert!(matches!(first, Err(WalletError::Timeout(_))));

        engine
            .mutate_local(|store| {
                let mut meta = store.meta()?;
                meta.device_id = Some("device-after-timeout".into());
                store.set_meta(&meta)
            })
            .await
            .unwrap();

        let outcome = engine.sync(0, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            outcome.merged.meta().unwrap().device_id.as_deref(),
            Some("device-after-timeout"),
            "second sync must merge the post-timeout snapshot, not a stale one"
        );
    }
}
