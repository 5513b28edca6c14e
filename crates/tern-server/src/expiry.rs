use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use tern_shared::constants::{AUTH_GRACE, REAPER_PERIOD};

use crate::session::Conn;

/// Connections that have opened a stream but not yet authenticated, keyed by
/// connection id with their admit timestamp. Successful AUTH removes the
/// entry; the reaper closes whatever outlives the grace window.
#[derive(Default)]
pub struct ExpiryMap {
    inner: Mutex<HashMap<u64, (Arc<Conn>, Instant)>>,
}

impl ExpiryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, conn: Arc<Conn>) {
        self.inner.lock().await.insert(conn.id, (conn, Instant::now()));
    }

    pub async fn remove(&self, conn_id: u64) {
        self.inner.lock().await.remove(&conn_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Closes and drops every entry older than the grace window. Removal
    /// happens inside the scan, under the same lock as insertions.
    pub async fn sweep(&self, grace: Duration) {
        let mut inner = self.inner.lock().await;
        inner.retain(|id, (conn, opened)| {
            if opened.elapsed() > grace {
                debug!(conn = *id, "authentication deadline passed, closing");
                conn.close();
                false
            } else {
                true
            }
        });
    }
}

/// Periodic sweep of the expiry map. Each tick runs under a panic guard so
/// one bad scan cannot kill the reaper.
pub fn spawn_reaper(expiry: Arc<ExpiryMap>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAPER_PERIOD);
        loop {
            interval.tick().await;
            let tick = std::panic::AssertUnwindSafe(expiry.sweep(AUTH_GRACE)).catch_unwind();
            if tick.await.is_err() {
                error!("reaper tick panicked");
            }
        }
    })
}
