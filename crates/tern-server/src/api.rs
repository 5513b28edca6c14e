use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::ServerConfig;
use crate::dispatch::{dispatch_http_frame, dispatch_ws_frame};
use crate::error::ServerError;
use crate::expiry::ExpiryMap;
use crate::rate_limit::RateLimiter;
use crate::session::{next_conn_id, Conn, Outbound, SessionRegistry};
use crate::stats::Stats;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub stats: Arc<Stats>,
    pub sessions: Arc<SessionRegistry>,
    pub expiry: Arc<ExpiryMap>,
    pub limiter: RateLimiter,
    pub backend: Arc<dyn Backend>,
    pub closed: Arc<AtomicBool>,
}

pub fn build_router(state: AppState) -> Router {
    // Our own cap does the rejecting; the axum limit only bounds the drain.
    let body_cap = state.config.max_frame_size.saturating_mul(2);

    Router::new()
        .route("/tim", get(stream_handler))
        .route("/tim2", post(frame_handler))
        .layer(DefaultBodyLimit::max(body_cap))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn origin_allowed(config: &ServerConfig, headers: &HeaderMap) -> bool {
    if config.origin.is_empty() {
        return true;
    }
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|origin| origin == config.origin)
        .unwrap_or(false)
}

/// `/tim2`: a single frame per request, used only for identity provisioning.
async fn frame_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !origin_allowed(&state.config, &headers) {
        // Misuse gets neither an ack nor a hint.
        return StatusCode::OK.into_response();
    }
    let (status, body) = dispatch_http_frame(&state, &body).await;
    (status, body).into_response()
}

/// `/tim`: the long-lived framed stream.
async fn stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !origin_allowed(&state.config, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| handle_stream(state, socket))
}

async fn handle_stream(state: AppState, socket: WebSocket) {
    // The cap gates on every live stream, not just authenticated ones,
    // so a flood of sockets that never send AUTH still trips it.
    if state.sessions.stream_opened() > state.config.connect_limit {
        state.sessions.stream_closed();
        debug!("connection cap reached, dropping new stream");
        return;
    }

    let (conn, rx) = Conn::channel(next_conn_id());
    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, rx));

    // The connection now owes us an AUTH (or PING) within the grace window.
    state.expiry.insert(conn.clone()).await;
    debug!(conn = conn.id, "stream opened");

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Binary(bs)) => dispatch_ws_frame(&state, &conn, bs.to_vec()).await,
            Ok(Message::Text(s)) => dispatch_ws_frame(&state, &conn, s.as_bytes().to_vec()).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.sessions.del_ws(conn.id).await;
    state.expiry.remove(conn.id).await;
    state.limiter.remove(conn.id).await;
    state.sessions.stream_closed();
    conn.close();
    let _ = writer.await;
    debug!(conn = conn.id, "stream closed");
}

/// Drains the outbound channel onto the socket. In-flight handlers keep
/// queueing after closure; their frames simply never leave the channel.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: UnboundedReceiver<Outbound>) {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Frame(bs) => {
                if sink.send(Message::Binary(bs.into())).await.is_err() {
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn load_tls(
    crt: &std::path::Path,
    key: &std::path::Path,
) -> Result<RustlsConfig, ServerError> {
    if crt.is_file() && key.is_file() {
        info!(crt = %crt.display(), "loading tls credentials from disk");
        return Ok(RustlsConfig::from_pem_file(crt, key).await?);
    }
    warn!("configured tls credential files missing, using generated self-signed pair");
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Tls(e.to_string()))?;
    Ok(RustlsConfig::from_pem(
        cert.cert.pem().into_bytes(),
        cert.key_pair.serialize_pem().into_bytes(),
    )
    .await?)
}

/// Binds the single listening port. With TLS configured the secure listener
/// runs first; if it returns and nobody called for shutdown, a plaintext
/// start is attempted. A start failure without explicit shutdown is fatal.
pub async fn serve(state: AppState) -> Result<(), ServerError> {
    let app = build_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));

    if let (Some(crt), Some(key)) = (&state.config.ssl_crt, &state.config.ssl_crt_key) {
        let rustls = load_tls(crt, key).await?;
        info!(addr = %addr, "tern listening (tls)");
        if let Err(e) = axum_server::bind_rustls(addr, rustls)
            .serve(app.clone().into_make_service())
            .await
        {
            if state.closed.load(Ordering::SeqCst) {
                return Ok(());
            }
            warn!(error = %e, "tls listener exited, falling back to plaintext");
        }
    }

    if state.closed.load(Ordering::SeqCst) {
        return Ok(());
    }
    info!(addr = %addr, "tern listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
