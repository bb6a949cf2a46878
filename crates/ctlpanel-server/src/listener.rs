//! Accept loop: one tracked worker unit per accepted connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ServerContext;
use crate::errors::ServerError;
use crate::units::UnitKind;
use crate::websocket::worker;

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind a TCP listener on `addr`.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_owned(),
            source,
        })
}

/// Accept connections until `stop` is cancelled, then close the socket.
///
/// Already-accepted connections keep running in their own units.
pub async fn accept_loop(listener: TcpListener, ctx: Arc<ServerContext>, stop: CancellationToken) {
    info!(addr = ?listener.local_addr().ok(), "listening");

    loop {
        let accepted = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "connection accepted");
                let worker_ctx = Arc::clone(&ctx);
                let unit = ctx
                    .shutdown
                    .units()
                    .spawn(UnitKind::Worker, move |stop| {
                        worker::run(worker_ctx, stream, peer, stop)
                    });
                debug!(%peer, unit, "worker spawned");
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::select! {
                    () = stop.cancelled() => break,
                    () = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }

    drop(listener);
    info!("listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ctlpanel_core::{CommandTable, NullAudioDevice};
    use tokio::net::TcpStream;

    fn make_ctx() -> Arc<ServerContext> {
        Arc::new(ServerContext::new(
            1,
            CommandTable::with_defaults(),
            Arc::new(NullAudioDevice::instant()),
        ))
    }

    #[tokio::test]
    async fn bind_reports_address_on_failure() {
        let taken = bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        assert_matches!(bind(&addr).await, Err(ServerError::Bind { addr: a, .. }) if a == addr);
    }

    #[tokio::test]
    async fn stop_closes_accept_socket() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, make_ctx(), stop.clone()));

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn accepted_connection_becomes_worker_unit() {
        let ctx = make_ctx();
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, ctx.clone(), stop.clone()));

        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while ctx.shutdown.units().count(UnitKind::Worker) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop.cancel();
        task.await.unwrap();
        ctx.shutdown.stop_all().await;
        assert!(ctx.shutdown.units().is_empty());
    }
}
