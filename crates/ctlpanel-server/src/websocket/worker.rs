//! Per-connection protocol state machine.
//!
//! `Connecting → Active → Draining → Closed`. A connection that cannot get
//! a slot goes from `Connecting` straight to `Closed` after the sentinel
//! reply. The handshake and the idle wait for the next message also wake on
//! the unit's stop token; a command call or an audio playback in progress
//! is never interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ctlpanel_core::protocol::SOUND_RECEIVED;
use ctlpanel_core::{CommandResponse, PcmClip};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::context::ServerContext;
use crate::errors::{Closure, WorkerError};
use crate::metrics::{
    AUDIO_CLIPS_TOTAL, CONNECTIONS_TOTAL, REJECTIONS_TOTAL, SESSION_DURATION_SECONDS,
    SESSIONS_ACTIVE,
};
use crate::registry::Session;
use crate::websocket::handler::handle_text;

/// How long to wait for the peer to finish a close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type Ws = WebSocketStream<TcpStream>;

enum State {
    Connecting(TcpStream),
    Active(Ws, Session),
    Draining(Ws, Session, DrainReason),
    Closed,
}

/// Why a session left `Active`.
#[derive(Debug)]
enum DrainReason {
    /// Shutdown signal or unit stop token.
    Shutdown,
    /// Close frame or end of stream.
    Closed,
    /// Transport error or protocol violation.
    Failed(WorkerError),
}

/// Serve one accepted connection until it closes or the server stops.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn run(
    ctx: Arc<ServerContext>,
    stream: TcpStream,
    peer: SocketAddr,
    stop: CancellationToken,
) {
    counter!(CONNECTIONS_TOTAL).increment(1);

    let mut state = State::Connecting(stream);
    loop {
        state = match state {
            State::Connecting(stream) => connect(&ctx, stream, peer, &stop).await,
            State::Active(mut ws, session) => {
                let reason = serve(&ctx, &mut ws, &stop).await;
                State::Draining(ws, session, reason)
            }
            State::Draining(ws, session, reason) => {
                drain(&ctx, ws, &session, reason).await;
                State::Closed
            }
            State::Closed => break,
        };
    }
}

async fn connect(
    ctx: &ServerContext,
    stream: TcpStream,
    peer: SocketAddr,
    stop: &CancellationToken,
) -> State {
    let handshake = tokio::select! {
        biased;
        () = stop.cancelled() => {
            debug!("stopped during handshake");
            return State::Closed;
        }
        handshake = tokio_tungstenite::accept_async(stream) => handshake,
    };
    let mut ws = match handshake {
        Ok(ws) => ws,
        Err(source) => {
            let err = WorkerError::Handshake { peer, source };
            warn!(error = %err, "handshake failed");
            return State::Closed;
        }
    };

    match ctx.registry.acquire(peer) {
        Ok(session) => {
            record_active(ctx);
            info!(
                session_id = %session.id(),
                slot = session.slot(),
                "session admitted"
            );
            State::Active(ws, session)
        }
        Err(err) => {
            counter!(REJECTIONS_TOTAL).increment(1);
            info!(error = %err, "connection rejected");
            if let Err(e) = reject(&mut ws).await {
                debug!(error = %e, "rejection not delivered");
            }
            State::Closed
        }
    }
}

async fn reject(ws: &mut Ws) -> Result<(), tungstenite::Error> {
    ws.send(Message::text(CommandResponse::sentinel().to_json()))
        .await?;
    ws.close(None).await?;
    finish_close(ws).await;
    Ok(())
}

async fn serve(ctx: &ServerContext, ws: &mut Ws, stop: &CancellationToken) -> DrainReason {
    loop {
        if ctx.shutdown.is_shutting_down() {
            return DrainReason::Shutdown;
        }

        let next = tokio::select! {
            biased;
            () = stop.cancelled() => return DrainReason::Shutdown,
            next = ws.next() => next,
        };
        let message = match next {
            None => return DrainReason::Closed,
            Some(Err(e)) => return DrainReason::Failed(e.into()),
            Some(Ok(message)) => message,
        };

        let sent = match message {
            Message::Text(text) => {
                let reply = handle_text(&ctx.commands, text.as_str());
                ws.send(Message::text(reply.to_json())).await
            }
            Message::Binary(bytes) => match ws.send(Message::text(SOUND_RECEIVED)).await {
                Ok(()) => {
                    play(ctx, bytes).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(frame) => {
                debug!(?frame, "close frame received");
                return DrainReason::Closed;
            }
            Message::Frame(_) => {
                return DrainReason::Failed(WorkerError::UnsupportedMessageType {
                    kind: "raw frame",
                });
            }
        };

        if let Err(e) = sent {
            return DrainReason::Failed(e.into());
        }
    }
}

/// Play one inbound clip on a blocking thread and wait for it.
async fn play(ctx: &ServerContext, bytes: Bytes) {
    let clip = PcmClip::from_wire(bytes);
    let frames = clip.frame_count();
    let audio = Arc::clone(&ctx.audio);

    let outcome = match tokio::task::spawn_blocking(move || audio.play(&clip)).await {
        Ok(Ok(())) => {
            debug!(frames, "clip played");
            "ok"
        }
        Ok(Err(e)) => {
            warn!(frames, error = %e, "playback failed");
            "error"
        }
        Err(e) => {
            error!(error = %e, "playback task failed");
            "error"
        }
    };
    counter!(AUDIO_CLIPS_TOTAL, "outcome" => outcome).increment(1);
}

async fn drain(ctx: &ServerContext, mut ws: Ws, session: &Session, reason: DrainReason) {
    match &reason {
        DrainReason::Shutdown => info!("draining on shutdown"),
        DrainReason::Closed => info!(closure = ?Closure::Clean, "client disconnected"),
        DrainReason::Failed(WorkerError::Transport(e)) => match WorkerError::closure(e) {
            Closure::Clean => info!(closure = ?Closure::Clean, "client disconnected"),
            Closure::Dirty => warn!(closure = ?Closure::Dirty, error = %e, "client disconnected"),
        },
        DrainReason::Failed(e) => warn!(error = %e, "connection failed"),
    }

    if matches!(reason, DrainReason::Shutdown) {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "server shutting down".into(),
        };
        if let Err(e) = ws.close(Some(frame)).await {
            debug!(error = %e, "close frame not delivered");
        }
    }

    if let Err(e) = ctx.registry.release(session) {
        warn!(error = %e, "slot release failed");
    }
    record_active(ctx);
    histogram!(SESSION_DURATION_SECONDS).record(session.age().as_secs_f64());
    info!(
        session_id = %session.id(),
        slot = session.slot(),
        "session closed"
    );

    if !matches!(reason, DrainReason::Failed(_)) {
        finish_close(&mut ws).await;
    }
}

/// Read until the peer completes the close handshake or the grace expires.
/// Also flushes a pending close reply.
async fn finish_close(ws: &mut Ws) {
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

#[allow(clippy::cast_precision_loss)]
fn record_active(ctx: &ServerContext) {
    gauge!(SESSIONS_ACTIVE).set(ctx.registry.active_count() as f64);
}
