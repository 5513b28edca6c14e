use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, error};

use tern_shared::ack::Ack;

/// What the per-connection writer task is asked to do next.
#[derive(Debug, PartialEq)]
pub enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// Non-owning handle to a streaming connection. The transport owns the
/// socket; everything else holds this and talks through the channel, so a
/// write to a closed peer degrades to a dropped message.
#[derive(Debug)]
pub struct Conn {
    pub id: u64,
    tx: UnboundedSender<Outbound>,
}

impl Conn {
    pub fn channel(id: u64) -> (Arc<Self>, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { id, tx }), rx)
    }

    pub fn send_frame(&self, frame: Vec<u8>) {
        if self.tx.send(Outbound::Frame(frame)).is_err() {
            debug!(conn = self.id, "send to closed connection dropped");
        }
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

pub fn next_conn_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Registry of authenticated streaming connections. Presence in the map IS
/// the "authenticated" bit: the auth handler inserts, close removes. A
/// separate gauge tracks every live stream, authenticated or not, so the
/// connection cap can trip on floods that never send AUTH.
#[derive(Default)]
pub struct SessionRegistry {
    conns: RwLock<HashMap<u64, Arc<Conn>>>,
    streams: AtomicUsize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly opened stream and returns the number now live.
    pub fn stream_opened(&self) -> usize {
        self.streams.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn stream_closed(&self) {
        self.streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn open_streams(&self) -> usize {
        self.streams.load(Ordering::Relaxed)
    }

    pub async fn put_ws(&self, conn: Arc<Conn>) {
        self.conns.write().await.insert(conn.id, conn);
    }

    pub async fn has_ws(&self, conn_id: u64) -> bool {
        self.conns.read().await.contains_key(&conn_id)
    }

    pub async fn del_ws(&self, conn_id: u64) {
        self.conns.write().await.remove(&conn_id);
    }

    pub async fn count_connections(&self) -> usize {
        self.conns.read().await.len()
    }

    /// Encodes and queues an ack for a registered connection. Unregistered
    /// ids are a no-op, matching write-to-closed-peer semantics.
    pub async fn send_ws(&self, conn_id: u64, ack: &Ack, text: bool) -> bool {
        let conns = self.conns.read().await;
        let Some(conn) = conns.get(&conn_id) else {
            return false;
        };
        match ack.encode(text) {
            Ok(frame) => {
                conn.send_frame(frame);
                true
            }
            Err(e) => {
                error!(conn = conn_id, error = %e, "ack encoding failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_shared::error::ErrKind;
    use tern_shared::frame::FrameType;

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = Conn::channel(next_conn_id());

        assert!(!registry.has_ws(conn.id).await);
        assert_eq!(registry.count_connections().await, 0);

        registry.put_ws(conn.clone()).await;
        assert!(registry.has_ws(conn.id).await);
        assert_eq!(registry.count_connections().await, 1);

        registry.del_ws(conn.id).await;
        assert!(!registry.has_ws(conn.id).await);
    }

    #[tokio::test]
    async fn test_send_ws_delivers_encoded_ack() {
        let registry = SessionRegistry::new();
        let (conn, mut rx) = Conn::channel(next_conn_id());
        registry.put_ws(conn.clone()).await;

        let ack = Ack::failure(FrameType::Message.tag() as i8, ErrKind::Overload);
        assert!(registry.send_ws(conn.id, &ack, false).await);

        match rx.recv().await.unwrap() {
            Outbound::Frame(bs) => {
                assert_eq!(Ack::decode(&bs, false).unwrap(), ack);
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_ws_unknown_connection() {
        let registry = SessionRegistry::new();
        let ack = Ack::success(FrameType::Ping);
        assert!(!registry.send_ws(404, &ack, true).await);
    }

    #[test]
    fn test_stream_gauge_counts_unauthenticated_streams() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.open_streams(), 0);

        // Streams count from open, long before any AUTH arrives.
        assert_eq!(registry.stream_opened(), 1);
        assert_eq!(registry.stream_opened(), 2);
        assert_eq!(registry.open_streams(), 2);

        registry.stream_closed();
        assert_eq!(registry.open_streams(), 1);
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_is_swallowed() {
        let (conn, rx) = Conn::channel(next_conn_id());
        drop(rx);
        conn.send_frame(vec![1, 2, 3]);
        conn.close();
    }
}
