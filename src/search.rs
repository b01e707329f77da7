use crate::api::catalog::CatalogStore;
use crate::api::models::Song;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Latest published search outcome.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SearchSnapshot {
    pub generation: u64,
    pub query: String,
    pub results: Vec<Song>,
    /// Set when the last lookup failed; earlier results are kept.
    pub error: Option<String>,
}

/// Debounced title search behind the search overlay.
///
/// Every keystroke goes through `submit`. Only the newest query is ever
/// published: older pending lookups are cancelled, and a lookup that
/// finishes after a newer `submit` is dropped.
pub struct SearchController<C> {
    catalog: Arc<C>,
    debounce: Duration,
    limit: u32,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    snapshot: Arc<watch::Sender<SearchSnapshot>>,
    open: AtomicBool,
}

impl<C: CatalogStore + 'static> SearchController<C> {
    pub fn new(catalog: Arc<C>, debounce: Duration, limit: u32) -> Self {
        let (tx, _) = watch::channel(SearchSnapshot::default());
        Self {
            catalog,
            debounce,
            limit,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            snapshot: Arc::new(tx),
            open: AtomicBool::new(false),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn submit(&self, query: &str) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            previous.abort();
        }

        let query = query.to_string();
        if query.trim().is_empty() {
            self.snapshot.send_replace(SearchSnapshot {
                generation,
                query,
                results: Vec::new(),
                error: None,
            });
            return generation;
        }

        let catalog = Arc::clone(&self.catalog);
        let latest = Arc::clone(&self.generation);
        let snapshot = Arc::clone(&self.snapshot);
        let debounce = self.debounce;
        let limit = self.limit;

        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let outcome = catalog.search(&query, limit).await;
            snapshot.send_if_modified(|current| {
                if latest.load(Ordering::SeqCst) != generation || current.generation > generation {
                    log::debug!("dropping stale results for {:?}", query);
                    return false;
                }
                current.generation = generation;
                current.query = query.clone();
                match &outcome {
                    Ok(results) => {
                        log::debug!("search {:?}: {} results", query, results.len());
                        current.results = results.clone();
                        current.error = None;
                    }
                    Err(e) => {
                        log::warn!("Search for {:?} failed: {}", query, e);
                        current.error = Some(e.to_string());
                    }
                }
                true
            });
        });
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        generation
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn result(&self, index: usize) -> Option<(Vec<Song>, Song)> {
        let snapshot = self.snapshot.borrow();
        let picked = snapshot.results.get(index)?.clone();
        Some((snapshot.results.clone(), picked))
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Returns whether the overlay is now open.
    pub fn toggle(&self) -> bool {
        !self.open.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl<C> Drop for SearchController<C> {
    fn drop(&mut self) {
        if let Some(task) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
