use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::SessionController;

use super::decoder::decode_raw;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

const RAW_CHANNEL_CAPACITY: usize = 64;

/// Sender half handed to the webview glue; raw tracker messages pushed here
/// are decoded and dispatched in FIFO order.
pub type RawMessageSender = mpsc::Sender<String>;

/// Owns the channel from the embedded pose-tracking surface and the
/// background loop that decodes and dispatches its messages.
///
/// One loop per bridge: starting while one is running is an error, and
/// `stop` cancels and joins the loop before returning.
pub struct TrackerBridge {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TrackerBridge {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the decode/dispatch loop feeding `controller`. Returns the
    /// sender the host pushes raw messages into.
    pub fn start(&mut self, controller: SessionController) -> Result<RawMessageSender> {
        if self.handle.is_some() {
            bail!("tracker bridge already running");
        }

        let (raw_tx, raw_rx) = mpsc::channel(RAW_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(bridge_loop(raw_rx, controller, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(raw_tx)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("bridge loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for TrackerBridge {
    fn default() -> Self {
        Self::new()
    }
}

async fn bridge_loop(
    mut raw_rx: mpsc::Receiver<String>,
    controller: SessionController,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            message = raw_rx.recv() => {
                match message {
                    Some(raw) => {
                        // Decode anomalies are absorbed here: decode is total
                        // and unknown events mutate nothing downstream.
                        controller.handle_event(decode_raw(&raw)).await;
                    }
                    None => {
                        log_info!("tracker channel closed, bridge loop exiting");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("bridge loop shutting down");
                break;
            }
        }
    }
}
