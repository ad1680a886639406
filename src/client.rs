//! Reconnecting WebSocket client for deck observers.
//!
//! Opens a connection to the gateway's `/ws` endpoint and re-establishes
//! it on failure under a bounded retry policy. Exhausting the retry budget
//! is not an error to the caller; it is observable only as the terminal
//! `Disconnected` status. A successful connection resets the budget.

use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::BroadcastEvent;

/// Connection status surfaced for external display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    Disconnected,
}

/// Retry policy for the observer connection.
#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_interval: Duration,
    /// Jitter ratio (0.0..=1.0) applied symmetrically to the delay.
    pub jitter_ratio: f64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::from_millis(2000),
            jitter_ratio: 0.0,
        }
    }
}

impl ReconnectOptions {
    /// The delay before the next attempt, with jitter applied.
    fn delay(&self) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return self.retry_interval;
        }
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        let millis = self.retry_interval.as_millis() as f64;
        let spread = millis * ratio;
        let low = (millis - spread).max(0.0);
        let high = millis + spread;
        let sampled = if high <= low {
            low
        } else {
            rand::random::<f64>() * (high - low) + low
        };
        Duration::from_millis(sampled.round() as u64)
    }
}

/// Handle to a running observer connection.
pub struct GatewayClient {
    status_rx: watch::Receiver<ConnectionStatus>,
    events_rx: mpsc::UnboundedReceiver<BroadcastEvent>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl GatewayClient {
    /// Start connecting to `url` in the background and return immediately.
    pub fn connect(url: impl Into<String>, options: ReconnectOptions) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Reconnecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            url.into(),
            options,
            status_tx,
            events_tx,
            cancel.clone(),
        ));
        Self {
            status_rx,
            events_rx,
            cancel,
            task,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch channel for status transitions, for UI display.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Next decoded broadcast event, or None once the connection is
    /// terminally down.
    pub async fn next_event(&mut self) -> Option<BroadcastEvent> {
        self.events_rx.recv().await
    }

    /// Deliberate teardown: cancels any pending reconnect timer and waits
    /// for the background task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run_loop(
    url: String,
    options: ReconnectOptions,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<BroadcastEvent>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = status.send(ConnectionStatus::Disconnected);
                return;
            }
            attempt = connect_async(url.as_str()) => attempt,
        };

        match attempt {
            Ok((stream, _response)) => {
                failures = 0;
                info!(url = %url, "connected to gateway");
                let _ = status.send(ConnectionStatus::Connected);

                read_events(stream, &events, &cancel).await;

                if cancel.is_cancelled() {
                    let _ = status.send(ConnectionStatus::Disconnected);
                    return;
                }
                warn!(url = %url, "gateway connection closed, reconnecting");
            }
            Err(err) => {
                failures += 1;
                debug!(url = %url, error = %err, failures, "connection attempt failed");
                if failures >= options.max_retries {
                    warn!(url = %url, failures, "retry budget exhausted, giving up");
                    let _ = status.send(ConnectionStatus::Disconnected);
                    return;
                }
            }
        }

        let _ = status.send(ConnectionStatus::Reconnecting);
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = status.send(ConnectionStatus::Disconnected);
                return;
            }
            _ = tokio::time::sleep(options.delay()) => {}
        }
    }
}

/// Pump one established connection: decode text frames into events until
/// the peer closes, the transport errors, or we are cancelled.
async fn read_events<S>(
    mut stream: S,
    events: &mpsc::UnboundedSender<BroadcastEvent>,
    cancel: &CancellationToken,
) where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                // A dropped consumer leaves the connection alive for
                // status reporting only.
                Ok(event) => {
                    let _ = events.send(event);
                }
                Err(err) => warn!(error = %err, "undecodable frame from gateway"),
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(error = %err, "gateway transport error");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_jitter_keeps_the_exact_interval() {
        let options = ReconnectOptions {
            retry_interval: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(options.delay(), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_the_spread() {
        let options = ReconnectOptions {
            retry_interval: Duration::from_millis(1000),
            jitter_ratio: 0.2,
            ..Default::default()
        };
        for _ in 0..100 {
            let delay = options.delay().as_millis();
            assert!((800..=1200).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn default_options_match_the_ui_contract() {
        let options = ReconnectOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_interval, Duration::from_millis(2000));
    }
}
