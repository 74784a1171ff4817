//! Per-hand state machine sequencing deck agreement, shuffles, draws and the
//! showdown. It performs no I/O: inbound envelopes go to [`GameRound::handle`]
//! and every returned message must be delivered to the peer in order.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::card_ranking::ShowdownJudge;
use super::game_phases::{AbortInfo, RoundPhase};
use super::messages::{Envelope, ProtocolMessage, RoundId};
use crate::config::{DrawStep, ProtocolConfig, SEATS};
use crate::dealing::{
    finish_draw, open_hand, strip_own_layer, verify_hand, CardOpening, ClaimedIndexSets,
    DrawMode, HandCard, LayerSet,
};
use crate::error::{AbortReason, PlayerId, ProtocolError};
use crate::shuffling::group::GroupElement;
use crate::shuffling::{
    prove, shuffle, verify, Card, Deck, DeckCodec, Digest, MaskingKey, RoundOpening,
    ShuffleProof, ShuffleWitness,
};

const LOG_TARGET: &str = "mental_poker::game::round";

/// Local part in the shuffle currently in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShuffleRole {
    Shuffler,
    Verifier,
}

/// Local part in the draw step currently in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawRole {
    Recipient,
    Counterpart,
}

#[derive(Debug, Default)]
enum ShuffleStage {
    #[default]
    Idle,
    AwaitingAck {
        deck: Deck,
        openings: Vec<RoundOpening>,
    },
    AwaitingAcceptance {
        deck: Deck,
    },
    CollectingOpenings {
        deck: Vec<GroupElement>,
        commitments: Vec<Digest>,
        openings: Vec<RoundOpening>,
    },
}

#[derive(Debug, Default)]
enum DrawStage {
    #[default]
    Idle,
    AwaitingResponse {
        indices: Vec<usize>,
    },
}

/// Result of a completed round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandOutcome {
    pub round_id: RoundId,
    pub hands: BTreeMap<PlayerId, Vec<Card>>,
    pub winners: Vec<PlayerId>,
}

pub struct GameRound {
    round_id: RoundId,
    local: PlayerId,
    seats: Vec<PlayerId>,
    config: ProtocolConfig,
    codec: &'static DeckCodec,
    rng: StdRng,
    key: MaskingKey,
    phase: RoundPhase,
    deck_init_sent: bool,
    peer_public_key: Option<GroupElement>,
    deck: Deck,
    deck_layers: LayerSet,
    shuffle_stage: ShuffleStage,
    shuffles_done: usize,
    claims: ClaimedIndexSets,
    draw_stage: DrawStage,
    draws_done: usize,
    hand: Vec<HandCard>,
    handed_out: BTreeMap<usize, GroupElement>,
    reveal_sent: bool,
    peer_openings: Vec<CardOpening>,
    peer_revealed: Option<BTreeMap<usize, Card>>,
}

impl GameRound {
    pub fn new(
        round_id: RoundId,
        local: PlayerId,
        seats: Vec<PlayerId>,
        config: ProtocolConfig,
        mut rng: StdRng,
    ) -> Result<Self, ProtocolError> {
        config.validate()?;
        if seats.len() != SEATS {
            return Err(ProtocolError::Config(format!(
                "a round needs exactly {SEATS} seats, got {}",
                seats.len()
            )));
        }
        if seats[0] == seats[1] {
            return Err(ProtocolError::Config("seats must be distinct players".to_string()));
        }
        if !seats.contains(&local) {
            return Err(ProtocolError::Config(format!(
                "local player {local} is not seated"
            )));
        }
        let codec = DeckCodec::global();
        let key = MaskingKey::generate(&mut rng);
        Ok(Self {
            round_id,
            local,
            seats,
            config,
            codec,
            rng,
            key,
            phase: RoundPhase::Init,
            deck_init_sent: false,
            peer_public_key: None,
            deck: codec.encoded_deck(),
            deck_layers: LayerSet::new(),
            shuffle_stage: ShuffleStage::Idle,
            shuffles_done: 0,
            claims: ClaimedIndexSets::new(),
            draw_stage: DrawStage::Idle,
            draws_done: 0,
            hand: Vec::new(),
            handed_out: BTreeMap::new(),
            reveal_sent: false,
            peer_openings: Vec::new(),
            peer_revealed: None,
        })
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn local(&self) -> PlayerId {
        self.local
    }

    pub fn peer(&self) -> PlayerId {
        if self.seats[0] == self.local {
            self.seats[1]
        } else {
            self.seats[0]
        }
    }

    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Current agreed deck.
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn hand(&self) -> &[HandCard] {
        &self.hand
    }

    pub fn claims(&self) -> &ClaimedIndexSets {
        &self.claims
    }

    /// Wraps an outbound message for the peer.
    pub fn envelope(&self, message: ProtocolMessage) -> Envelope {
        Envelope {
            round_id: self.round_id,
            sender: self.local,
            message,
        }
    }

    /// Opens the round: sends the local deck commitment and any action that is
    /// already due.
    pub fn start(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.deck_init_sent {
            return Err(ProtocolError::sequence("a fresh round", "second start"));
        }
        self.deck_init_sent = true;
        tracing::info!(
            target: LOG_TARGET,
            round_id = self.round_id,
            local = self.local,
            "round started"
        );
        let mut out = vec![ProtocolMessage::DeckInit {
            deck_commitment: self.codec.commitment(),
            public_key: self.key.public_key(),
        }];
        self.check_deck_prepared();
        out.extend(self.advance()?);
        Ok(out)
    }

    /// Applies one inbound envelope. On any error the round is aborted before
    /// the error is returned.
    #[tracing::instrument(
        target = LOG_TARGET,
        skip_all,
        fields(local = self.local, kind = envelope.message.kind())
    )]
    pub fn handle(&mut self, envelope: Envelope) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.phase.is_terminal() {
            return Err(ProtocolError::sequence(
                "no further messages",
                envelope.message.kind(),
            ));
        }
        if envelope.round_id != self.round_id {
            let err = ProtocolError::sequence(
                format!("round {}", self.round_id),
                format!("round {}", envelope.round_id),
            );
            self.abort(err.abort_reason(), None);
            return Err(err);
        }
        if envelope.sender != self.peer() {
            let err = ProtocolError::sequence(
                format!("sender {}", self.peer()),
                format!("sender {}", envelope.sender),
            );
            self.abort(err.abort_reason(), None);
            return Err(err);
        }

        let result = self.dispatch(envelope.message).and_then(|mut out| {
            out.extend(self.advance_inner()?);
            Ok(out)
        });
        match result {
            Ok(out) => Ok(out),
            Err(err) => {
                let offender = err.blames_sender().then(|| self.peer());
                self.abort(err.abort_reason(), offender);
                Err(err)
            }
        }
    }

    /// Emits every local action that is due in the current phase.
    pub fn advance(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.phase.is_terminal() {
            return Ok(Vec::new());
        }
        match self.advance_inner() {
            Ok(out) => Ok(out),
            Err(err) => {
                self.abort(err.abort_reason(), None);
                Err(err)
            }
        }
    }

    /// Settles the showdown once both hands are open.
    pub fn complete<J: ShowdownJudge + ?Sized>(
        &mut self,
        judge: &J,
    ) -> Result<HandOutcome, ProtocolError> {
        if self.phase != RoundPhase::Opened {
            return Err(ProtocolError::sequence(
                "opened hands",
                self.phase.description(),
            ));
        }
        let peer_cards: Vec<Card> = self
            .peer_revealed
            .as_ref()
            .map(|cards| cards.values().copied().collect())
            .unwrap_or_default();
        let mut hands = BTreeMap::new();
        hands.insert(self.local, self.hand.iter().map(|held| held.card).collect());
        hands.insert(self.peer(), peer_cards);
        let winners = judge.winners(&hands);

        self.phase = RoundPhase::Complete;
        self.retire_secrets();
        tracing::info!(target: LOG_TARGET, round_id = self.round_id, ?winners, "round complete");
        Ok(HandOutcome {
            round_id: self.round_id,
            hands,
            winners,
        })
    }

    /// Ends the round locally, e.g. when the driver gives up waiting.
    pub fn abort(&mut self, reason: AbortReason, offender: Option<PlayerId>) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::warn!(
            target: LOG_TARGET,
            round_id = self.round_id,
            ?reason,
            ?offender,
            phase = self.phase.description(),
            "round aborted"
        );
        self.phase = RoundPhase::Aborted(AbortInfo { reason, offender });
        self.retire_secrets();
        self.shuffle_stage = ShuffleStage::Idle;
        self.draw_stage = DrawStage::Idle;
    }

    /// Wipes the masking scalar and reseeds the RNG that produced it and every
    /// shuffle secret, so neither outlives the round.
    fn retire_secrets(&mut self) {
        self.key.zeroize();
        self.rng = StdRng::from_seed([0u8; 32]);
    }

    pub fn cancel(&mut self) {
        self.abort(AbortReason::Cancelled, None);
    }

    /// `Abort` message to tell the peer why this round ended, if it did.
    pub fn abort_notice(&self) -> Option<ProtocolMessage> {
        match &self.phase {
            RoundPhase::Aborted(info) => Some(ProtocolMessage::Abort {
                reason: info.reason,
                offender: info.offender,
            }),
            _ => None,
        }
    }

    pub fn shuffle_role(&self) -> Option<ShuffleRole> {
        match self.phase {
            RoundPhase::DeckPrepared | RoundPhase::Shuffled { .. } => {
                let shuffler = self.seats.get(self.shuffles_done)?;
                Some(if *shuffler == self.local {
                    ShuffleRole::Shuffler
                } else {
                    ShuffleRole::Verifier
                })
            }
            _ => None,
        }
    }

    fn current_step(&self) -> Option<DrawStep> {
        if self.phase != RoundPhase::Verified {
            return None;
        }
        self.config.draw_plan.steps.get(self.draws_done).copied()
    }

    pub fn draw_role(&self) -> Option<DrawRole> {
        self.current_step().map(|step| {
            if self.seats[step.seat] == self.local {
                DrawRole::Recipient
            } else {
                DrawRole::Counterpart
            }
        })
    }

    fn advance_inner(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let mut out = Vec::new();
        loop {
            let before = self.phase.clone();
            let emitted = match self.phase {
                RoundPhase::DeckPrepared | RoundPhase::Shuffled { .. } => self.start_shuffle()?,
                RoundPhase::Verified => self.start_draw()?,
                RoundPhase::HandsDrawn => self.reveal_hand()?,
                _ => Vec::new(),
            };
            if emitted.is_empty() && self.phase == before {
                return Ok(out);
            }
            out.extend(emitted);
        }
    }

    fn dispatch(&mut self, message: ProtocolMessage) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        match message {
            ProtocolMessage::DeckInit {
                deck_commitment,
                public_key,
            } => self.on_deck_init(deck_commitment, public_key),
            ProtocolMessage::ShuffleCommit { deck, commitments } => {
                self.on_shuffle_commit(deck, commitments)
            }
            ProtocolMessage::ShuffleChallengeAck => self.on_challenge_ack(),
            ProtocolMessage::ShuffleOpening { round, opening } => {
                self.on_shuffle_opening(round, opening)
            }
            ProtocolMessage::ShuffleAccepted { deck_digest } => self.on_shuffle_accepted(deck_digest),
            ProtocolMessage::DrawRequest { indices, for_self } => {
                self.on_draw_request(indices, for_self)
            }
            ProtocolMessage::DrawResponse {
                indices,
                ciphertexts,
            } => self.on_draw_response(indices, ciphertexts),
            ProtocolMessage::OpenReveal {
                index,
                card,
                proof,
            } => self.on_open_reveal(CardOpening {
                index,
                encoded_card: card,
                proof,
            }),
            ProtocolMessage::Abort { reason, offender } => {
                tracing::warn!(target: LOG_TARGET, ?reason, ?offender, "peer aborted the round");
                self.phase = RoundPhase::Aborted(AbortInfo { reason, offender });
                self.retire_secrets();
                self.shuffle_stage = ShuffleStage::Idle;
                self.draw_stage = DrawStage::Idle;
                Err(ProtocolError::PeerAborted(reason))
            }
        }
    }

    fn unexpected(&self, got: &str) -> ProtocolError {
        ProtocolError::sequence(self.phase.description(), got)
    }

    // Deck agreement

    fn on_deck_init(
        &mut self,
        commitment: Digest,
        public_key: GroupElement,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.phase != RoundPhase::Init || self.peer_public_key.is_some() {
            return Err(self.unexpected("deck_init"));
        }
        if commitment != self.codec.commitment() {
            tracing::warn!(target: LOG_TARGET, %commitment, "peer uses a different card table");
            return Err(ProtocolError::UnknownCard);
        }
        self.peer_public_key = Some(public_key);
        self.check_deck_prepared();
        Ok(Vec::new())
    }

    fn check_deck_prepared(&mut self) {
        if self.phase == RoundPhase::Init && self.deck_init_sent && self.peer_public_key.is_some() {
            tracing::debug!(target: LOG_TARGET, "deck prepared");
            self.phase = RoundPhase::DeckPrepared;
        }
    }

    // Shuffling

    fn start_shuffle(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.shuffle_role() != Some(ShuffleRole::Shuffler)
            || !matches!(self.shuffle_stage, ShuffleStage::Idle)
        {
            return Ok(Vec::new());
        }
        let (shuffled, permutation) = shuffle(&self.deck, &self.key, &mut self.rng)?;
        let witness = ShuffleWitness {
            permutation,
            key: self.key.clone(),
        };
        let ShuffleProof {
            commitments,
            openings,
        } = prove(
            &self.deck,
            &shuffled,
            &witness,
            self.config.shuffle_rounds,
            &mut self.rng,
        )?;
        drop(witness);

        let message = ProtocolMessage::ShuffleCommit {
            deck: shuffled.as_slice().to_vec(),
            commitments,
        };
        self.shuffle_stage = ShuffleStage::AwaitingAck {
            deck: shuffled,
            openings,
        };
        Ok(vec![message])
    }

    fn on_shuffle_commit(
        &mut self,
        deck: Vec<GroupElement>,
        commitments: Vec<Digest>,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.shuffle_role() != Some(ShuffleRole::Verifier)
            || !matches!(self.shuffle_stage, ShuffleStage::Idle)
        {
            return Err(self.unexpected("shuffle_commit"));
        }
        if commitments.len() != self.config.shuffle_rounds {
            return Err(ProtocolError::shuffle_proof(format!(
                "expected {} commitments, got {}",
                self.config.shuffle_rounds,
                commitments.len()
            )));
        }
        self.shuffle_stage = ShuffleStage::CollectingOpenings {
            deck,
            commitments,
            openings: Vec::with_capacity(self.config.shuffle_rounds),
        };
        Ok(vec![ProtocolMessage::ShuffleChallengeAck])
    }

    fn on_challenge_ack(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        match std::mem::take(&mut self.shuffle_stage) {
            ShuffleStage::AwaitingAck { deck, openings } => {
                let messages = openings
                    .into_iter()
                    .enumerate()
                    .map(|(round, opening)| ProtocolMessage::ShuffleOpening { round, opening })
                    .collect();
                self.shuffle_stage = ShuffleStage::AwaitingAcceptance { deck };
                Ok(messages)
            }
            other => {
                self.shuffle_stage = other;
                Err(self.unexpected("shuffle_challenge_ack"))
            }
        }
    }

    fn on_shuffle_opening(
        &mut self,
        round: usize,
        opening: RoundOpening,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let rounds = self.config.shuffle_rounds;
        let ShuffleStage::CollectingOpenings { openings, .. } = &mut self.shuffle_stage else {
            return Err(self.unexpected("shuffle_opening"));
        };
        if round != openings.len() {
            return Err(ProtocolError::sequence(
                format!("shuffle opening {}", openings.len()),
                format!("shuffle opening {round}"),
            ));
        }
        openings.push(opening);
        if openings.len() < rounds {
            return Ok(Vec::new());
        }

        let ShuffleStage::CollectingOpenings {
            deck,
            commitments,
            openings,
        } = std::mem::take(&mut self.shuffle_stage)
        else {
            return Err(self.unexpected("shuffle_opening"));
        };
        let proof = ShuffleProof {
            commitments,
            openings,
        };
        let accepted = verify(&self.deck, &deck, &proof, rounds)?;
        let shuffler = self.peer();
        let deck_digest = accepted.digest();
        self.accept_shuffle(shuffler, accepted);
        Ok(vec![ProtocolMessage::ShuffleAccepted { deck_digest }])
    }

    fn on_shuffle_accepted(&mut self, digest: Digest) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        match std::mem::take(&mut self.shuffle_stage) {
            ShuffleStage::AwaitingAcceptance { deck } => {
                if deck.digest() != digest {
                    return Err(ProtocolError::sequence(
                        format!("acceptance of deck {}", deck.digest()),
                        format!("acceptance of deck {digest}"),
                    ));
                }
                self.accept_shuffle(self.local, deck);
                Ok(Vec::new())
            }
            other => {
                self.shuffle_stage = other;
                Err(self.unexpected("shuffle_accepted"))
            }
        }
    }

    fn accept_shuffle(&mut self, shuffler: PlayerId, deck: Deck) {
        self.deck = deck;
        self.deck_layers.add(shuffler);
        self.shuffles_done += 1;
        if let Some(next) = self.phase.after_shuffle(self.seats.len()) {
            self.phase = next;
        }
        tracing::info!(
            target: LOG_TARGET,
            shuffler,
            digest = %self.deck.digest(),
            phase = self.phase.description(),
            "shuffle accepted"
        );
    }

    // Drawing

    fn start_draw(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let Some(step) = self.current_step() else {
            if self.draws_done >= self.config.draw_plan.steps.len() {
                self.enter_hands_drawn();
            }
            return Ok(Vec::new());
        };
        if !matches!(self.draw_stage, DrawStage::Idle) {
            return Ok(Vec::new());
        }
        match (step.mode, self.draw_role()) {
            (DrawMode::Blind, Some(DrawRole::Recipient)) => {
                let indices = self.claims.select_fresh(step.count)?;
                self.draw_stage = DrawStage::AwaitingResponse {
                    indices: indices.clone(),
                };
                Ok(vec![ProtocolMessage::DrawRequest {
                    indices,
                    for_self: true,
                }])
            }
            (DrawMode::Dealt, Some(DrawRole::Counterpart)) => {
                let indices = self.claims.select_fresh(step.count)?;
                let ciphertexts = self.hand_out(&indices)?;
                self.finish_step();
                Ok(vec![
                    ProtocolMessage::DrawRequest {
                        indices: indices.clone(),
                        for_self: false,
                    },
                    ProtocolMessage::DrawResponse {
                        indices,
                        ciphertexts,
                    },
                ])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Claims `indices` for the peer and strips the local layer from them.
    fn hand_out(&mut self, indices: &[usize]) -> Result<Vec<GroupElement>, ProtocolError> {
        self.deck_layers.clone().strip(self.local)?;
        self.claims.claim(self.peer(), indices)?;
        let partials = strip_own_layer(&self.deck, indices, &self.key)?;
        for (index, partial) in indices.iter().zip(&partials) {
            self.handed_out.insert(*index, *partial);
        }
        tracing::debug!(target: LOG_TARGET, peer = self.peer(), ?indices, "handed out cards");
        Ok(partials)
    }

    fn on_draw_request(
        &mut self,
        indices: Vec<usize>,
        for_self: bool,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let Some(step) = self.current_step() else {
            return Err(self.unexpected("draw_request"));
        };
        if indices.len() != step.count {
            return Err(ProtocolError::Format(format!(
                "draw of {} cards, plan expects {}",
                indices.len(),
                step.count
            )));
        }
        let idle = matches!(self.draw_stage, DrawStage::Idle);
        match (step.mode, self.draw_role(), for_self, idle) {
            (DrawMode::Blind, Some(DrawRole::Counterpart), true, true) => {
                let ciphertexts = self.hand_out(&indices)?;
                self.finish_step();
                Ok(vec![ProtocolMessage::DrawResponse {
                    indices,
                    ciphertexts,
                }])
            }
            (DrawMode::Dealt, Some(DrawRole::Recipient), false, true) => {
                self.draw_stage = DrawStage::AwaitingResponse { indices };
                Ok(Vec::new())
            }
            _ => Err(self.unexpected("draw_request")),
        }
    }

    fn on_draw_response(
        &mut self,
        indices: Vec<usize>,
        ciphertexts: Vec<GroupElement>,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let DrawStage::AwaitingResponse { indices: pending } = &self.draw_stage else {
            return Err(self.unexpected("draw_response"));
        };
        if *pending != indices {
            return Err(ProtocolError::sequence(
                format!("response for {pending:?}"),
                format!("response for {indices:?}"),
            ));
        }

        let mut layers = self.deck_layers.clone();
        layers.strip(self.peer())?;
        layers.strip(self.local)?;
        if !layers.is_plaintext() {
            return Err(ProtocolError::sequence(
                "two-layer ciphertexts",
                "ciphertexts with extra layers",
            ));
        }

        self.claims.claim(self.local, &indices)?;
        let cards = finish_draw(&ciphertexts, &indices, &self.key, self.codec)?;
        tracing::debug!(target: LOG_TARGET, count = cards.len(), "drew cards");
        self.hand.extend(cards);
        self.draw_stage = DrawStage::Idle;
        self.finish_step();
        Ok(Vec::new())
    }

    fn finish_step(&mut self) {
        self.draws_done += 1;
        if self.draws_done >= self.config.draw_plan.steps.len() {
            self.enter_hands_drawn();
        }
    }

    fn enter_hands_drawn(&mut self) {
        self.phase = RoundPhase::HandsDrawn;
        if self.claims.claimed_by(self.peer()).is_empty() {
            self.peer_revealed = Some(BTreeMap::new());
        }
        tracing::info!(
            target: LOG_TARGET,
            held = self.hand.len(),
            claimed = self.claims.total_claimed(),
            "hands drawn"
        );
    }

    // Opening

    fn reveal_hand(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.reveal_sent {
            return Ok(Vec::new());
        }
        self.reveal_sent = true;
        let messages = open_hand(&self.hand, &self.key, self.codec)
            .into_iter()
            .map(ProtocolMessage::from)
            .collect();
        self.check_opened();
        Ok(messages)
    }

    fn on_open_reveal(&mut self, opening: CardOpening) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        if self.phase != RoundPhase::HandsDrawn || self.peer_revealed.is_some() {
            return Err(self.unexpected("open_reveal"));
        }
        self.peer_openings.push(opening);
        let claimed: BTreeSet<usize> = self.claims.claimed_by(self.peer());
        if self.peer_openings.len() < claimed.len() {
            return Ok(Vec::new());
        }

        let peer_key = self
            .peer_public_key
            .ok_or_else(|| ProtocolError::sequence("peer public key", "open_reveal"))?;
        let revealed = verify_hand(
            &self.peer_openings,
            &claimed,
            &self.handed_out,
            &peer_key,
            self.codec,
        )?;
        tracing::info!(target: LOG_TARGET, cards = revealed.len(), "peer hand verified");
        self.peer_revealed = Some(revealed);
        self.check_opened();
        Ok(Vec::new())
    }

    fn check_opened(&mut self) {
        if self.phase == RoundPhase::HandsDrawn && self.reveal_sent && self.peer_revealed.is_some()
        {
            self.phase = RoundPhase::Opened;
        }
    }
}

impl Drop for GameRound {
    fn drop(&mut self) {
        self.retire_secrets();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrawPlan;
    use crate::game::card_ranking::HighCardJudge;
    use crate::test_utils::{pump, round_pair, Tamper};
    use rand::Rng;

    fn config(plan: DrawPlan) -> ProtocolConfig {
        ProtocolConfig {
            draw_plan: plan,
            ..ProtocolConfig::default()
        }
    }

    fn distinct_cards(a: &GameRound, b: &GameRound) -> usize {
        a.hand()
            .iter()
            .chain(b.hand())
            .map(|held| held.card)
            .collect::<BTreeSet<_>>()
            .len()
    }

    #[test]
    fn heads_up_round_reaches_showdown() {
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(5)), 100);
        pump(&mut a, &mut b, Tamper::none());

        assert_eq!(a.phase(), &RoundPhase::Opened);
        assert_eq!(b.phase(), &RoundPhase::Opened);
        assert_eq!(a.hand().len(), 5);
        assert_eq!(b.hand().len(), 5);
        assert_eq!(distinct_cards(&a, &b), 10);
        assert_eq!(a.deck(), b.deck());

        let outcome_a = a.complete(&HighCardJudge).unwrap();
        let outcome_b = b.complete(&HighCardJudge).unwrap();
        assert_eq!(outcome_a, outcome_b);
        assert_eq!(a.phase(), &RoundPhase::Complete);
    }

    #[test]
    fn dealt_plan_draws_the_same_positions_on_both_sides() {
        let (mut a, mut b) = round_pair(config(DrawPlan::dealt(3)), 101);
        pump(&mut a, &mut b, Tamper::none());
        assert_eq!(a.phase(), &RoundPhase::Opened);
        assert_eq!(a.claims(), b.claims());
        assert_eq!(distinct_cards(&a, &b), 6);
    }

    #[test]
    fn one_sided_plan_opens_immediately_for_the_empty_hand() {
        let plan = DrawPlan {
            steps: vec![DrawStep {
                mode: DrawMode::Blind,
                seat: 1,
                count: 2,
            }],
        };
        let (mut a, mut b) = round_pair(config(plan), 102);
        pump(&mut a, &mut b, Tamper::none());
        assert_eq!(a.phase(), &RoundPhase::Opened);
        assert_eq!(b.phase(), &RoundPhase::Opened);
        assert!(a.hand().is_empty());
        let outcome = a.complete(&HighCardJudge).unwrap();
        assert_eq!(outcome.winners, vec![b.local()]);
    }

    #[test]
    fn duplicated_shuffle_output_aborts_with_shuffler_as_offender() {
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(2)), 103);
        pump(
            &mut a,
            &mut b,
            Tamper::outgoing(1, |message| {
                if let ProtocolMessage::ShuffleCommit { deck, .. } = message {
                    deck[1] = deck[0];
                }
            }),
        );
        let expected = RoundPhase::Aborted(AbortInfo {
            reason: AbortReason::ShuffleProofFailed,
            offender: Some(1),
        });
        assert_eq!(b.phase(), &expected);
        assert_eq!(a.phase(), &expected);
    }

    #[test]
    fn forged_reveal_aborts_with_revealer_as_offender() {
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(2)), 104);
        let other = DeckCodec::global().encoded_deck().into_inner();
        pump(
            &mut a,
            &mut b,
            Tamper::outgoing(2, move |message| {
                if let ProtocolMessage::OpenReveal { card, .. } = message {
                    *card = if *card == other[0] { other[1] } else { other[0] };
                }
            }),
        );
        assert_eq!(
            a.phase(),
            &RoundPhase::Aborted(AbortInfo {
                reason: AbortReason::InvalidOpening,
                offender: Some(2),
            })
        );
    }

    #[test]
    fn conflicting_draw_request_aborts() {
        // Seat 1 asks for a position seat 0 already holds.
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(2)), 105);
        pump(
            &mut a,
            &mut b,
            Tamper::outgoing(2, |message| {
                if let ProtocolMessage::DrawRequest { indices, .. } = message {
                    indices[0] = 0;
                }
            }),
        );
        assert_eq!(
            a.phase(),
            &RoundPhase::Aborted(AbortInfo {
                reason: AbortReason::IndexConflict,
                offender: Some(2),
            })
        );
    }

    #[test]
    fn out_of_turn_message_is_a_sequence_error() {
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(1)), 106);
        a.start().unwrap();
        b.start().unwrap();
        let premature = b.envelope(ProtocolMessage::ShuffleChallengeAck);
        let err = a.handle(premature).unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolSequence { .. }));
        assert!(matches!(
            a.phase(),
            RoundPhase::Aborted(AbortInfo {
                reason: AbortReason::ProtocolSequence,
                ..
            })
        ));
        assert!(a.abort_notice().is_some());
    }

    #[test]
    fn foreign_round_and_sender_are_rejected() {
        let (mut a, b) = round_pair(config(DrawPlan::heads_up(1)), 107);
        let mut envelope = b.envelope(ProtocolMessage::DeckInit {
            deck_commitment: DeckCodec::global().commitment(),
            public_key: b.key.public_key(),
        });
        envelope.round_id += 1;
        assert!(a.handle(envelope).is_err());
        assert_eq!(
            a.phase(),
            &RoundPhase::Aborted(AbortInfo {
                reason: AbortReason::ProtocolSequence,
                offender: None,
            })
        );

        let (mut a, _b) = round_pair(config(DrawPlan::heads_up(1)), 108);
        let intruder = Envelope {
            round_id: a.round_id(),
            sender: 99,
            message: ProtocolMessage::ShuffleChallengeAck,
        };
        assert!(a.handle(intruder).is_err());
    }

    #[test]
    fn mismatched_card_table_aborts() {
        let (mut a, b) = round_pair(config(DrawPlan::heads_up(1)), 109);
        a.start().unwrap();
        let envelope = b.envelope(ProtocolMessage::DeckInit {
            deck_commitment: Digest::new([0u8; 32]),
            public_key: b.key.public_key(),
        });
        assert_eq!(a.handle(envelope), Err(ProtocolError::UnknownCard));
    }

    #[test]
    fn peer_abort_is_recorded() {
        let (mut a, b) = round_pair(config(DrawPlan::heads_up(1)), 110);
        a.start().unwrap();
        let envelope = b.envelope(ProtocolMessage::Abort {
            reason: AbortReason::Timeout,
            offender: None,
        });
        assert_eq!(
            a.handle(envelope),
            Err(ProtocolError::PeerAborted(AbortReason::Timeout))
        );
        assert!(a.phase().is_terminal());
    }

    #[test]
    fn construction_validates_seats() {
        let rng = crate::test_utils::seeded_rng(1);
        assert!(matches!(
            GameRound::new(1, 1, vec![1, 2, 3], ProtocolConfig::default(), rng.clone()),
            Err(ProtocolError::Config(_))
        ));
        assert!(matches!(
            GameRound::new(1, 3, vec![1, 2], ProtocolConfig::default(), rng.clone()),
            Err(ProtocolError::Config(_))
        ));
        assert!(matches!(
            GameRound::new(1, 1, vec![1, 1], ProtocolConfig::default(), rng),
            Err(ProtocolError::Config(_))
        ));
    }

    fn reseeded_draw() -> u64 {
        StdRng::from_seed([0u8; 32]).gen()
    }

    #[test]
    fn secrets_are_retired_when_the_round_ends() {
        let (mut a, mut b) = round_pair(config(DrawPlan::heads_up(1)), 112);
        pump(&mut a, &mut b, Tamper::none());
        let live_key = a.key.public_key();

        a.complete(&HighCardJudge).unwrap();
        assert_eq!(a.rng.gen::<u64>(), reseeded_draw());
        assert_ne!(a.key.public_key(), live_key);

        b.cancel();
        assert_eq!(b.rng.gen::<u64>(), reseeded_draw());

        let (mut c, d) = round_pair(config(DrawPlan::heads_up(1)), 113);
        c.start().unwrap();
        let notice = d.envelope(ProtocolMessage::Abort {
            reason: AbortReason::Cancelled,
            offender: None,
        });
        assert!(c.handle(notice).is_err());
        assert_eq!(c.rng.gen::<u64>(), reseeded_draw());
    }

    #[test]
    fn complete_requires_opened_hands() {
        let (mut a, _b) = round_pair(config(DrawPlan::heads_up(1)), 111);
        assert!(a.complete(&HighCardJudge).is_err());
        assert_eq!(a.phase(), &RoundPhase::Init);
    }
}
