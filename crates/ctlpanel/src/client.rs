//! Minimal client for the control panel protocol.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ctlpanel_core::protocol::{CHANNELS, CommandRequest, SAMPLE_RATE_HZ};
use ctlpanel_core::{AudioDevice, CommandResponse, PcmClip};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Longest clip `record_clip` will capture.
pub const MAX_RECORD_SECONDS: f64 = 600.0;

/// Open client connection.
pub type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to `url` (e.g. `ws://localhost:9000`).
pub async fn connect(url: &str) -> Result<Connection> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    debug!(url, "connected");
    Ok(ws)
}

/// Send one command and wait for its reply.
///
/// A rejected connection yields the sentinel reply.
pub async fn send_command(ws: &mut Connection, id: i64, data: Value) -> Result<CommandResponse> {
    let request = CommandRequest { command: id, data };
    let text = serde_json::to_string(&request).context("failed to encode request")?;
    ws.send(Message::text(text))
        .await
        .context("failed to send command")?;

    let reply = next_text(ws).await?;
    serde_json::from_str(&reply).with_context(|| format!("unexpected reply: {reply}"))
}

/// Send one clip as a binary message and return the acknowledgement text.
pub async fn send_clip(ws: &mut Connection, clip: &PcmClip) -> Result<String> {
    ws.send(Message::binary(clip.bytes().clone()))
        .await
        .context("failed to send audio")?;
    next_text(ws).await
}

/// Capture `seconds` of wire-format audio from `device`.
pub async fn record_clip(device: Arc<dyn AudioDevice>, seconds: f64) -> Result<PcmClip> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("recording length must be positive, got {seconds}");
    }
    if seconds > MAX_RECORD_SECONDS {
        bail!("recording length {seconds}s exceeds the {MAX_RECORD_SECONDS}s limit");
    }
    let frames = frames_for(Duration::from_secs_f64(seconds));
    let samples = tokio::task::spawn_blocking(move || device.record(frames, SAMPLE_RATE_HZ, CHANNELS))
        .await
        .context("recording task failed")?
        .context("recording failed")?;
    Ok(PcmClip::from_samples(&samples, SAMPLE_RATE_HZ, CHANNELS))
}

/// Close the connection politely.
pub async fn close(mut ws: Connection) -> Result<()> {
    ws.close(None).await.context("failed to close connection")?;
    while let Some(Ok(_)) = ws.next().await {}
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn frames_for(length: Duration) -> usize {
    (length.as_secs_f64() * f64::from(SAMPLE_RATE_HZ)).round() as usize
}

async fn next_text(ws: &mut Connection) -> Result<String> {
    while let Some(message) = ws.next().await {
        match message.context("connection failed")? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Close(frame) => bail!("server closed the connection: {frame:?}"),
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
        }
    }
    bail!("connection ended before a reply")
}
