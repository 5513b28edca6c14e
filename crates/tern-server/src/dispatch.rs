use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::StatusCode;
use futures::FutureExt;
use tracing::error;

use tern_shared::ack::Ack;
use tern_shared::error::ErrKind;
use tern_shared::frame::{jtp, FrameType};
use tern_shared::protocol::AuthEnvelope;

use crate::admission::admit;
use crate::api::AppState;
use crate::session::Conn;
use crate::stats::TxGuard;

/// Spawns a handler task under a top-level panic guard: a panic inside one
/// frame's handling is logged and swallowed, never torn through a peer.
pub(crate) fn spawn_guarded<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            let msg = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("non-string panic payload");
            error!(panic = msg, "dispatched task panicked");
        }
    });
}

/// Encodes an ack and queues it on the connection itself. Acks owed before
/// authentication (over-hertz, failed AUTH, failed PING) must not go
/// through the registry, which only knows authenticated streams.
fn send_ack(conn: &Conn, ack: &Ack, text: bool) {
    match ack.encode(text) {
        Ok(frame) => conn.send_frame(frame),
        Err(e) => error!(conn = conn.id, error = %e, "ack encoding failed"),
    }
}

/// Syntactic pre-check of an AUTH frame: the envelope must decode under the
/// encoding its flag byte selects and must name a credential.
fn connect_auth(bs: &[u8]) -> bool {
    AuthEnvelope::decode(bs)
        .map(|env| env.has_credentials())
        .unwrap_or(false)
}

/// Streaming dispatcher. Pre-handler checks run inline on the read path;
/// everything past them is handed to an independent task, so handlers for
/// different frames from one connection may complete in any order.
pub async fn dispatch_ws_frame(state: &AppState, conn: &Arc<Conn>, bs: Vec<u8>) {
    state.stats.ib(bs.len() as u64);
    if bs.len() > state.config.max_frame_size {
        conn.close();
        return;
    }
    if bs.is_empty() {
        conn.close();
        return;
    }

    let text = jtp(bs[0]);
    let tag = (bs[0] & 0x7f) as i8;
    let frame_type = FrameType::from_byte(bs[0]);

    // Everything but AUTH and PING requires an authenticated stream.
    // Violations close the connection without an ack.
    let pre_auth_allowed = matches!(frame_type, Some(FrameType::Auth) | Some(FrameType::Ping));
    if !pre_auth_allowed && !state.sessions.has_ws(conn.id).await {
        conn.close();
        return;
    }

    if !state.limiter.check(conn.id).await {
        let conn = conn.clone();
        spawn_guarded(async move {
            send_ack(&conn, &Ack::failure(tag, ErrKind::OverHertz), text);
        });
        return;
    }

    match frame_type {
        Some(t) if t.is_data_plane() => {
            if admit(&state.stats, state.config.task_limit).await {
                let st = state.clone();
                let conn = conn.clone();
                spawn_guarded(async move {
                    let _guard = TxGuard::new(st.stats.clone());
                    let res = match t {
                        FrameType::Message | FrameType::RevokeMessage | FrameType::BurnMessage => {
                            st.backend.message_handle(&bs, &conn).await
                        }
                        FrameType::Presence => st.backend.presence_handle(&bs, &conn).await,
                        _ => st.backend.stream_handle(&bs, &conn).await,
                    };
                    if let Err(kind) = res {
                        st.sessions
                            .send_ws(conn.id, &Ack::failure(tag, kind), text)
                            .await;
                    }
                });
            } else {
                let st = state.clone();
                let id = conn.id;
                spawn_guarded(async move {
                    let _guard = TxGuard::new(st.stats.clone());
                    st.sessions
                        .send_ws(id, &Ack::failure(tag, ErrKind::Overload), text)
                        .await;
                });
            }
        }
        _ => {
            let st = state.clone();
            let conn = conn.clone();
            spawn_guarded(async move {
                let _guard = TxGuard::new(st.stats.clone());
                let res = match frame_type {
                    Some(FrameType::Auth) => {
                        if !connect_auth(&bs) {
                            conn.close();
                            return;
                        }
                        match st.backend.auth_handle(&bs, &conn).await {
                            Ok(()) => {
                                st.expiry.remove(conn.id).await;
                                Ok(())
                            }
                            Err(kind) => {
                                // Failed credentials ack; the stream stays
                                // open until the reaper rules.
                                send_ack(&conn, &Ack::failure(tag, kind), text);
                                return;
                            }
                        }
                    }
                    Some(FrameType::Ack) => st.backend.ack_handle(&bs).await,
                    Some(FrameType::Ping) => st.backend.ping_handle(&conn).await,
                    Some(FrameType::OfflineMsg) => st.backend.offlinemsg_handle(&conn).await,
                    Some(FrameType::PullMessage) => {
                        st.backend.pull_message_handle(&bs, &conn).await
                    }
                    Some(FrameType::BroadPresence) => {
                        st.backend.broad_presence_handle(&bs, &conn).await
                    }
                    Some(FrameType::Business) => st.backend.business_handle(&bs, &conn).await,
                    Some(FrameType::VRoom) => st.backend.vroom_handle(&bs, &conn).await,
                    Some(FrameType::Nodes) => st.backend.node_info_handle(&bs, &conn).await,
                    _ => Err(ErrKind::BadParams),
                };
                if let Err(kind) = res {
                    // Direct send: PING (and failed AUTH above) may owe an
                    // ack to a stream the registry has never seen.
                    send_ack(&conn, &Ack::failure(tag, kind), text);
                }
            });
        }
    }
}

/// Request/response dispatcher for the identity-provisioning transport.
/// Oversize and unrecognised bodies are dropped without a hint; admission
/// failure is the only 500.
pub async fn dispatch_http_frame(state: &AppState, bs: &[u8]) -> (StatusCode, Vec<u8>) {
    if bs.is_empty() || bs.len() > state.config.max_frame_size {
        return (StatusCode::OK, Vec::new());
    }
    if !admit(&state.stats, state.config.task_limit).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
    }
    let _guard = TxGuard::new(state.stats.clone());

    let text = jtp(bs[0]);
    let tag = (bs[0] & 0x7f) as i8;
    match FrameType::from_byte(bs[0]) {
        Some(FrameType::Register) => {
            if state.config.forbid_register {
                return (StatusCode::FORBIDDEN, Vec::new());
            }
            let ack = match state.backend.register_handle(bs).await {
                Ok(node) => Ack::success(FrameType::Register).with_node(node),
                Err(kind) => Ack::failure(tag, kind),
            };
            respond_ack(&ack, text)
        }
        Some(FrameType::Token) => {
            if state.config.forbid_token {
                return (StatusCode::FORBIDDEN, Vec::new());
            }
            let ack = match state.backend.token_handle(bs).await {
                Ok(token) => Ack::success(FrameType::Token).with_token(token),
                Err(kind) => Ack::failure(tag, kind),
            };
            respond_ack(&ack, text)
        }
        _ => (StatusCode::OK, Vec::new()),
    }
}

fn respond_ack(ack: &Ack, text: bool) -> (StatusCode, Vec<u8>) {
    match ack.encode(text) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "ack encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}
