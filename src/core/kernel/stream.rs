use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::ws::WsSession;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

/// Resolves once the stream's read task has fully terminated
#[derive(Debug, Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<bool>,
}

impl DoneSignal {
    /// Wait until the stream has terminated, for any reason
    pub async fn wait(&mut self) {
        // A dropped sender means the task is gone, which also counts as done
        let _ = self.rx.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Requests termination of a running stream
///
/// Calling `stop` more than once, or after the stream already ended, is a no-op.
/// Dropping the handle does not stop the stream.
#[derive(Debug, Clone)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.notify.notify_one();
    }
}

/// Drive a connected session on a background task
///
/// Every data frame goes through `codec`; decoded messages reach `handler` and
/// per-frame decode failures reach `err_handler`, both synchronously and in
/// arrival order, so the handler for one frame returns before the next frame
/// is decoded. A transport error is passed to `err_handler` and ends the
/// stream. The session is closed before the done signal fires.
pub fn serve<S, C, H, E>(
    mut session: S,
    codec: C,
    mut handler: H,
    mut err_handler: E,
) -> (DoneSignal, StopHandle)
where
    S: WsSession + 'static,
    C: WsCodec,
    H: FnMut(C::Message) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    let notify = Arc::new(Notify::new());
    let stop_requested = Arc::clone(&notify);
    let (done_tx, done_rx) = watch::channel(false);

    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                () = stop_requested.notified() => {
                    debug!("Stream stop requested");
                    break;
                }
                frame = session.next_raw() => frame,
            };

            match frame {
                Some(Ok(message)) => match codec.decode_message(message) {
                    Ok(Some(decoded)) => handler(decoded),
                    Ok(None) => {}
                    Err(e) => err_handler(e),
                },
                Some(Err(e)) => {
                    warn!("Stream transport error: {}", e);
                    err_handler(e);
                    break;
                }
                None => {
                    debug!("Stream ended by peer");
                    break;
                }
            }
        }

        if let Err(e) = session.close().await {
            debug!("Error while closing stream: {}", e);
        }
        done_tx.send_replace(true);
    });

    (DoneSignal { rx: done_rx }, StopHandle { notify })
}
