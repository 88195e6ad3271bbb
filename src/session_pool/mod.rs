//! Fixed-size pool of reusable renderer sessions.
//!
//! The pool is sized to the crawl's concurrency limit and filled eagerly at
//! startup, so steady-state acquire/release never pays session-creation
//! cost. A leased session is returned on guard drop on every code path,
//! navigation failures included; sessions are only destroyed at pool
//! shutdown.

pub mod chrome;

use std::collections::VecDeque;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

pub use chrome::ChromeSession;

/// A stateful, single-concurrent-use handle onto one rendering surface
/// (browser page/tab): navigate to a URL, then query the resulting document.
///
/// This is the seam between the crawl engine and the browser; tests drive
/// the engine with in-memory implementations.
pub trait RendererSession: Send + Sync + 'static {
    /// Navigate to a URL and wait for the document's core content to load.
    fn navigate(&self, url: &str) -> impl Future<Output = Result<()>> + Send;

    /// The document title, empty if the page has none.
    fn title(&self) -> impl Future<Output = Result<String>> + Send;

    /// Inner HTML of the document body.
    fn body_html(&self) -> impl Future<Output = Result<String>> + Send;

    /// Resolved absolute `href` of every anchor element in the document.
    fn link_hrefs(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Destroy the session. Called only at pool teardown.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Fixed-size session pool. Acquisition suspends until a session frees;
/// the pool never grows beyond the sessions it was constructed with.
#[derive(Debug)]
pub struct SessionPool<S> {
    available: Arc<Mutex<VecDeque<S>>>,
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl<S: RendererSession> SessionPool<S> {
    /// Build the pool from eagerly-created sessions. Pool size is fixed to
    /// `sessions.len()` for the pool's lifetime.
    #[must_use]
    pub fn new(sessions: Vec<S>) -> Self {
        let size = sessions.len();
        Self {
            available: Arc::new(Mutex::new(sessions.into())),
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sessions currently checked in.
    #[must_use]
    pub fn available_count(&self) -> usize {
        lock_queue(&self.available).len()
    }

    /// Lease a session, suspending until one is available. The guard returns
    /// the session to the pool when dropped.
    pub async fn acquire(&self) -> Result<SessionGuard<S>> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("session pool semaphore closed")?;

        let session = lock_queue(&self.available)
            .pop_front()
            .context("session pool empty while holding a permit")?;
        debug!("leased renderer session ({} idle)", self.available_count());

        Ok(SessionGuard {
            session: Some(session),
            available: Arc::clone(&self.available),
            _permit: permit,
        })
    }

    /// Tear the pool down, closing every session. All leases must have been
    /// returned; the engine's batch join guarantees that.
    pub async fn shutdown(self) -> Result<()> {
        let sessions: Vec<S> = {
            let mut queue = lock_queue(&self.available);
            queue.drain(..).collect()
        };
        for session in sessions {
            if let Err(e) = session.close().await {
                warn!("failed to close renderer session: {e:#}");
            }
        }
        Ok(())
    }
}

fn lock_queue<S>(queue: &Mutex<VecDeque<S>>) -> std::sync::MutexGuard<'_, VecDeque<S>> {
    // The queue is only ever locked for a push or pop; a poisoned lock still
    // holds a structurally intact queue.
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// RAII lease on a pooled session.
pub struct SessionGuard<S> {
    session: Option<S>,
    available: Arc<Mutex<VecDeque<S>>>,
    _permit: OwnedSemaphorePermit,
}

impl<S> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session present until drop")
    }
}

impl<S> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            lock_queue(&self.available).push_back(session);
        }
        // The permit releases after the session is back in the queue, so an
        // unblocked acquirer always finds one.
    }
}
