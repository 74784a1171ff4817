use async_trait::async_trait;
use tokio::sync::mpsc;

use super::messages::Envelope;
use crate::error::ProtocolError;

const LOG_TARGET: &str = "mental_poker::game::transport";

/// Ordered, reliable, sender-authenticated channel to the peer.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, envelope: Envelope) -> Result<(), ProtocolError>;
    async fn recv(&mut self) -> Result<Envelope, ProtocolError>;
}

/// In-memory transport carrying JSON frames over bounded Tokio channels.
pub struct ChannelTransport {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
}

impl ChannelTransport {
    /// Two connected endpoints.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (
            Self {
                outbound: a_tx,
                inbound: a_rx,
            },
            Self {
                outbound: b_tx,
                inbound: b_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, envelope: Envelope) -> Result<(), ProtocolError> {
        let frame = serde_json::to_string(&envelope)
            .map_err(|err| ProtocolError::Format(format!("failed to encode envelope: {err}")))?;
        tracing::trace!(target: LOG_TARGET, kind = envelope.message.kind(), bytes = frame.len(), "send");
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ProtocolError::Transport("peer hung up".to_string()))
    }

    async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        let frame = self
            .inbound
            .recv()
            .await
            .ok_or_else(|| ProtocolError::Transport("channel closed".to_string()))?;
        serde_json::from_str(&frame)
            .map_err(|err| ProtocolError::Format(format!("malformed envelope: {err}")))
    }
}
