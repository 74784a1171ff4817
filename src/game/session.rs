//! Async driver that runs one [`GameRound`] against a peer over a [`Transport`].

use std::time::Duration;

use super::card_ranking::ShowdownJudge;
use super::game_phases::RoundPhase;
use super::messages::ProtocolMessage;
use super::round::{GameRound, HandOutcome};
use super::transport::Transport;
use crate::error::{AbortReason, ProtocolError};

const LOG_TARGET: &str = "mental_poker::game::session";

pub struct PlayerSession<T: Transport> {
    round: GameRound,
    transport: T,
    timeout: Duration,
}

impl<T: Transport> PlayerSession<T> {
    pub fn new(round: GameRound, transport: T) -> Self {
        let timeout = round.config().message_timeout();
        Self {
            round,
            transport,
            timeout,
        }
    }

    pub fn round(&self) -> &GameRound {
        &self.round
    }

    pub fn into_round(self) -> GameRound {
        self.round
    }

    /// Plays the round to completion. Any failure leaves the round aborted and,
    /// unless the peer ended it, tells the peer why.
    #[tracing::instrument(
        target = LOG_TARGET,
        skip_all,
        fields(round_id = self.round.round_id(), local = self.round.local())
    )]
    pub async fn run<J>(&mut self, judge: &J) -> Result<HandOutcome, ProtocolError>
    where
        J: ShowdownJudge + Sync + ?Sized,
    {
        let opening = match self.round.start() {
            Ok(messages) => messages,
            Err(err) => return Err(self.fail(err).await),
        };
        self.send_all(opening).await?;

        loop {
            match self.round.phase() {
                RoundPhase::Opened => return self.round.complete(judge),
                RoundPhase::Aborted(info) => return Err(ProtocolError::PeerAborted(info.reason)),
                RoundPhase::Complete => {
                    return Err(ProtocolError::sequence("an open round", "completed round"))
                }
                _ => {}
            }

            let envelope = match tokio::time::timeout(self.timeout, self.transport.recv()).await {
                Ok(Ok(envelope)) => envelope,
                Ok(Err(err)) => {
                    let offender =
                        matches!(err, ProtocolError::Format(_)).then(|| self.round.peer());
                    self.round.abort(err.abort_reason(), offender);
                    self.notify_peer().await;
                    return Err(err);
                }
                Err(_) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        timeout_ms = self.timeout.as_millis() as u64,
                        phase = self.round.phase().description(),
                        "peer went silent"
                    );
                    self.round.abort(AbortReason::Timeout, None);
                    self.notify_peer().await;
                    return Err(ProtocolError::Timeout);
                }
            };

            match self.round.handle(envelope) {
                Ok(out) => self.send_all(out).await?,
                Err(err @ ProtocolError::PeerAborted(_)) => return Err(err),
                Err(err) => {
                    self.notify_peer().await;
                    return Err(err);
                }
            }
        }
    }

    async fn send_all(&mut self, messages: Vec<ProtocolMessage>) -> Result<(), ProtocolError> {
        for message in messages {
            let envelope = self.round.envelope(message);
            if let Err(err) = self.transport.send(envelope).await {
                self.round.abort(err.abort_reason(), None);
                return Err(err);
            }
        }
        Ok(())
    }

    async fn fail(&mut self, err: ProtocolError) -> ProtocolError {
        self.round.abort(err.abort_reason(), None);
        self.notify_peer().await;
        err
    }

    /// Best effort; the peer may already be gone.
    async fn notify_peer(&mut self) {
        let Some(notice) = self.round.abort_notice() else {
            return;
        };
        let envelope = self.round.envelope(notice);
        match tokio::time::timeout(self.timeout, self.transport.send(envelope)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(target: LOG_TARGET, error = %err, "abort notice not delivered")
            }
            Err(_) => tracing::debug!(target: LOG_TARGET, "abort notice timed out"),
        }
    }
}
