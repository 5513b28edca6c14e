use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tern_shared::ack::Ack;
use tern_shared::error::ErrKind;
use tern_shared::frame::FrameType;
use tern_shared::identity::{
    check_node, check_password_hash, create_uuid, new_random_uuid, node_to_uuid, password,
    uuid_to_node,
};
use tern_shared::protocol::{AuthEnvelope, RegisterEnvelope};

use crate::session::{Conn, SessionRegistry};

/// The modules the dispatch core routes into. Storage, rosters, offline
/// queues and room semantics live behind this seam; the core only cares
/// about the error kind coming back.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn register_handle(&self, bs: &[u8]) -> Result<String, ErrKind>;
    async fn token_handle(&self, bs: &[u8]) -> Result<String, ErrKind>;
    async fn auth_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn ack_handle(&self, bs: &[u8]) -> Result<(), ErrKind>;
    async fn ping_handle(&self, conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn offlinemsg_handle(&self, conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn pull_message_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn broad_presence_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn business_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn vroom_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn node_info_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn message_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn presence_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
    async fn stream_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind>;
}

/// In-memory reference backend: an account table and single-use tokens,
/// enough to provision identities and authenticate streams. Deployments
/// swap in their own `Backend` for everything durable.
pub struct MemoryBackend {
    salt: String,
    sessions: Arc<SessionRegistry>,
    /// node -> password hash
    accounts: RwLock<HashMap<String, String>>,
    /// token -> node
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new(salt: &str, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            salt: salt.to_string(),
            sessions,
            accounts: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    async fn verify_password(&self, node: &str, pwd: &str, domain: Option<&str>) -> bool {
        let accounts = self.accounts.read().await;
        let Some(hash) = accounts.get(node) else {
            return false;
        };
        check_password_hash(node_to_uuid(node), pwd, &self.salt, domain, hash)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn register_handle(&self, bs: &[u8]) -> Result<String, ErrKind> {
        let env = RegisterEnvelope::decode(bs).map_err(|_| ErrKind::BadParams)?;
        if env.name.is_empty() || env.pwd.is_empty() {
            return Err(ErrKind::BadParams);
        }
        let uuid = create_uuid(&env.name, &self.salt, env.domain.as_deref());
        let node = uuid_to_node(uuid);

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&node) {
            return Err(ErrKind::AccountExists);
        }
        let hash = password(uuid, &env.pwd, &self.salt, env.domain.as_deref())
            .map_err(|_| ErrKind::BadParams)?;
        accounts.insert(node.clone(), hash);

        info!(node = %node, "account registered");
        Ok(node)
    }

    async fn token_handle(&self, bs: &[u8]) -> Result<String, ErrKind> {
        let env = RegisterEnvelope::decode(bs).map_err(|_| ErrKind::BadParams)?;
        let uuid = create_uuid(&env.name, &self.salt, env.domain.as_deref());
        let node = uuid_to_node(uuid);

        if !self.accounts.read().await.contains_key(&node) {
            return Err(ErrKind::NoAccount);
        }
        if !self.verify_password(&node, &env.pwd, env.domain.as_deref()).await {
            return Err(ErrKind::AuthFailed);
        }

        let token = uuid_to_node(new_random_uuid(&self.salt));
        self.tokens.write().await.insert(token.clone(), node);
        Ok(token)
    }

    async fn auth_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        let env = AuthEnvelope::decode(bs).map_err(|_| ErrKind::BadParams)?;

        if let Some(token) = env.token.as_deref() {
            // Tokens are single-use.
            if self.tokens.write().await.remove(token).is_none() {
                return Err(ErrKind::TokenInvalid);
            }
        } else {
            let (Some(node), Some(pwd)) = (env.node.as_deref(), env.pwd.as_deref()) else {
                return Err(ErrKind::BadParams);
            };
            if !check_node(node) {
                return Err(ErrKind::BadParams);
            }
            if !self.verify_password(node, pwd, env.domain.as_deref()).await {
                return Err(ErrKind::AuthFailed);
            }
        }

        self.sessions.put_ws(conn.clone()).await;
        debug!(conn = conn.id, "stream authenticated");
        Ok(())
    }

    async fn ack_handle(&self, _bs: &[u8]) -> Result<(), ErrKind> {
        Ok(())
    }

    async fn ping_handle(&self, conn: &Arc<Conn>) -> Result<(), ErrKind> {
        let pong = Ack::success(FrameType::Ping)
            .encode(false)
            .map_err(|_| ErrKind::BadParams)?;
        conn.send_frame(pong);
        Ok(())
    }

    async fn offlinemsg_handle(&self, conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, "offline queue drain requested");
        Ok(())
    }

    async fn pull_message_handle(&self, _bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, "pull window requested");
        Ok(())
    }

    async fn broad_presence_handle(&self, _bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, "presence broadcast requested");
        Ok(())
    }

    async fn business_handle(&self, _bs: &[u8], _conn: &Arc<Conn>) -> Result<(), ErrKind> {
        Ok(())
    }

    async fn vroom_handle(&self, _bs: &[u8], _conn: &Arc<Conn>) -> Result<(), ErrKind> {
        Ok(())
    }

    async fn node_info_handle(&self, _bs: &[u8], _conn: &Arc<Conn>) -> Result<(), ErrKind> {
        Ok(())
    }

    async fn message_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, len = bs.len(), "message accepted");
        Ok(())
    }

    async fn presence_handle(&self, _bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, "presence accepted");
        Ok(())
    }

    async fn stream_handle(&self, bs: &[u8], conn: &Arc<Conn>) -> Result<(), ErrKind> {
        debug!(conn = conn.id, len = bs.len(), "stream chunk accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::next_conn_id;
    use tern_shared::frame::FrameType;

    fn backend() -> MemoryBackend {
        MemoryBackend::new("test-salt", Arc::new(SessionRegistry::new()))
    }

    fn register_frame(name: &str, pwd: &str) -> Vec<u8> {
        RegisterEnvelope {
            name: name.into(),
            pwd: pwd.into(),
            domain: None,
        }
        .encode(FrameType::Register, true)
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_yields_valid_node() {
        let backend = backend();
        let node = backend
            .register_handle(&register_frame("alice", "hunter2"))
            .await
            .unwrap();
        assert!(check_node(&node));
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let backend = backend();
        let frame = register_frame("alice", "hunter2");
        backend.register_handle(&frame).await.unwrap();
        assert_eq!(
            backend.register_handle(&frame).await,
            Err(ErrKind::AccountExists)
        );
    }

    #[tokio::test]
    async fn test_token_requires_valid_password() {
        let backend = backend();
        backend
            .register_handle(&register_frame("alice", "hunter2"))
            .await
            .unwrap();

        assert!(backend
            .token_handle(&register_frame("alice", "hunter2"))
            .await
            .is_ok());
        assert_eq!(
            backend.token_handle(&register_frame("alice", "wrong")).await,
            Err(ErrKind::AuthFailed)
        );
        assert_eq!(
            backend.token_handle(&register_frame("mallory", "x")).await,
            Err(ErrKind::NoAccount)
        );
    }

    #[tokio::test]
    async fn test_auth_with_token_is_single_use() {
        let backend = backend();
        backend
            .register_handle(&register_frame("alice", "hunter2"))
            .await
            .unwrap();
        let token = backend
            .token_handle(&register_frame("alice", "hunter2"))
            .await
            .unwrap();

        let auth = AuthEnvelope {
            token: Some(token),
            ..Default::default()
        }
        .encode(false)
        .unwrap();

        let (conn, _rx) = Conn::channel(next_conn_id());
        backend.auth_handle(&auth, &conn).await.unwrap();
        assert!(backend.sessions.has_ws(conn.id).await);

        // Replaying the same token must fail.
        let (conn2, _rx2) = Conn::channel(next_conn_id());
        assert_eq!(
            backend.auth_handle(&auth, &conn2).await,
            Err(ErrKind::TokenInvalid)
        );
    }

    #[tokio::test]
    async fn test_auth_with_password() {
        let backend = backend();
        let node = backend
            .register_handle(&register_frame("alice", "hunter2"))
            .await
            .unwrap();

        let auth = AuthEnvelope {
            node: Some(node),
            pwd: Some("hunter2".into()),
            ..Default::default()
        }
        .encode(true)
        .unwrap();

        let (conn, _rx) = Conn::channel(next_conn_id());
        backend.auth_handle(&auth, &conn).await.unwrap();
        assert!(backend.sessions.has_ws(conn.id).await);
    }

    #[tokio::test]
    async fn test_auth_rejects_malformed_node() {
        let backend = backend();
        let auth = AuthEnvelope {
            node: Some("!!not-a-node!!".into()),
            pwd: Some("x".into()),
            ..Default::default()
        }
        .encode(true)
        .unwrap();

        let (conn, _rx) = Conn::channel(next_conn_id());
        assert_eq!(
            backend.auth_handle(&auth, &conn).await,
            Err(ErrKind::BadParams)
        );
        assert!(!backend.sessions.has_ws(conn.id).await);
    }
}
