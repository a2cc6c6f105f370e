use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DuelConfig;
use crate::game::{
    CardId, DuelEvent, DuelSession, FieldState, GameResult, Intent, PlayerId, PresenceMonitor,
    ResultReason, RuleEngine, RuleError,
};
use crate::protocol::{Action, ActionLog, IgnoreReason, Transport, TransportError};
use crate::room::{MatchRecord, MatchResultSink, RoomData};

#[derive(Debug, Error)]
pub enum DuelError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("field accounts for {actual} cards, deck had {expected}")]
    CardCountMismatch { expected: usize, actual: usize },
    #[error("card {card_id} from the deck is missing from the field")]
    MissingCard { card_id: CardId },
    #[error("negative life {value}")]
    NegativeLife { value: i32 },
}

/// Result of handing one delivered payload to the duel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiveOutcome {
    Applied,
    Ignored(IgnoreReason),
}

/// One client's side of a duel: the session, its action log, the disconnect policy, and the
/// sink that learns the final result. Network callbacks and gesture handlers hold a handle
/// to this object and always see its current state.
pub struct Duel {
    room: RoomData,
    config: DuelConfig,
    engine: RuleEngine,
    session: DuelSession,
    log: ActionLog,
    presence: PresenceMonitor,
    sink: Option<Box<dyn MatchResultSink>>,
    result_recorded: bool,
    deck_ids: Vec<CardId>,
}

impl Duel {
    pub fn new(room: RoomData, config: DuelConfig) -> Self {
        let mut my_cards = room.my_deck().cards.clone();
        if config.shuffle_decks {
            let mut rng = match config.shuffle_seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_entropy(),
            };
            my_cards.shuffle(&mut rng);
        }
        let deck_ids = my_cards.iter().map(|card| card.id.clone()).collect();

        let mut my_field = FieldState::new(my_cards, config.starting_life);
        my_field.draw_many(config.opening_hand);
        // The opponent shuffled privately; only counts are reliable here.
        let mut opponent_field =
            FieldState::new(room.opponent_deck().cards.clone(), config.starting_life);
        opponent_field.draw_many(config.opening_hand);

        let session = DuelSession::new(my_field, opponent_field, room.is_host);
        info!(
            room = %room.room_id,
            local = %room.local_id(),
            opponent = %room.opponent_id(),
            first = room.is_host,
            "duel session created"
        );

        Self {
            log: ActionLog::new(room.local_id().clone()),
            presence: PresenceMonitor::new(config.forfeit_grace_ms),
            room,
            config,
            engine: RuleEngine::new(),
            session,
            sink: None,
            result_recorded: false,
            deck_ids,
        }
    }

    pub fn with_result_sink(mut self, sink: Box<dyn MatchResultSink>) -> Self {
        self.set_result_sink(sink);
        self
    }

    pub fn set_result_sink(&mut self, sink: Box<dyn MatchResultSink>) {
        self.sink = Some(sink);
    }

    pub fn session(&self) -> &DuelSession {
        &self.session
    }

    pub fn room(&self) -> &RoomData {
        &self.room
    }

    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    pub fn local_id(&self) -> &PlayerId {
        self.log.local_id()
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.log
    }

    pub fn result(&self) -> Option<GameResult> {
        self.session.game_result
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    pub fn take_events(&mut self) -> Vec<DuelEvent> {
        self.session.take_events()
    }

    /// Applies a local intent and returns the unsequenced action describing it.
    pub fn submit(&mut self, intent: Intent, now_ms: u64) -> Result<Action, RuleError> {
        let kind = match self.engine.apply_local(&mut self.session, intent) {
            Ok(kind) => kind,
            Err(error) => {
                debug!(%error, "local intent refused");
                return Err(error);
            }
        };
        info!(action = kind.name(), turn = self.session.turn, "applied local action");
        let action = self.log.stamp(kind, now_ms);
        self.settle();
        Ok(action)
    }

    /// Local intent end to end: apply, queue, then publish everything still queued in
    /// order. A publish failure keeps the action queued for the next flush.
    pub fn submit_and_publish<T: Transport + ?Sized>(
        &mut self,
        intent: Intent,
        transport: &mut T,
        now_ms: u64,
    ) -> Result<Action, DuelError> {
        let action = self.submit(intent, now_ms)?;
        self.log.enqueue(action.clone());
        let mut published = self.flush_pending(transport)?;
        Ok(published.pop().unwrap_or(action))
    }

    /// Publishes queued local actions oldest first and returns them with their room
    /// sequence numbers. Stops at the first failure; the rest stay queued.
    pub fn flush_pending<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Vec<Action>, TransportError> {
        let scope = self.room.scope();
        let mut published = Vec::new();
        while let Some(action) = self.log.next_pending() {
            let seq = match transport.publish(&scope, action) {
                Ok(seq) => seq,
                Err(error) => {
                    warn!(
                        %error,
                        pending = self.log.pending_len(),
                        "publish failed, keeping actions queued"
                    );
                    return Err(error);
                }
            };
            if let Some(action) = self.log.pop_pending() {
                debug!(action = action.kind.name(), seq, "published local action");
                published.push(action.with_seq(seq));
            }
        }
        Ok(published)
    }

    pub fn pending_len(&self) -> usize {
        self.log.pending_len()
    }

    /// Handles one raw payload from the room subscription.
    pub fn receive(&mut self, raw: &str) -> ReceiveOutcome {
        match Action::decode(raw) {
            Ok(action) => self.receive_action(action),
            Err(error) => {
                warn!(%error, "dropping malformed action");
                ReceiveOutcome::Ignored(IgnoreReason::Malformed {
                    detail: error.to_string(),
                })
            }
        }
    }

    pub fn receive_action(&mut self, action: Action) -> ReceiveOutcome {
        if let Err(reason) = self.log.admit(&action) {
            debug!(?reason, seq = ?action.seq, "action not applied");
            return ReceiveOutcome::Ignored(reason);
        }
        self.presence.peer_seen();

        if !self.engine.apply_remote(&mut self.session, &action.kind) {
            info!(action = action.kind.name(), seq = ?action.seq, "dropping action after duel end");
            return ReceiveOutcome::Ignored(IgnoreReason::Finished);
        }
        info!(
            action = action.kind.name(),
            seq = ?action.seq,
            turn = self.session.turn,
            "applied remote action"
        );
        self.settle();
        ReceiveOutcome::Applied
    }

    pub fn on_link_change(&mut self, connected: bool, now_ms: u64) {
        debug!(connected, "link status changed");
        self.presence.on_link_change(connected, now_ms);
    }

    /// Link came back: resume the presence clock and send what queued up while offline.
    pub fn on_link_restored<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        now_ms: u64,
    ) -> Result<Vec<Action>, TransportError> {
        self.on_link_change(true, now_ms);
        self.flush_pending(transport)
    }

    pub fn on_peer_presence(&mut self, present: bool, now_ms: u64) {
        debug!(present, "peer presence changed");
        self.presence.on_peer_presence(present, now_ms);
    }

    /// Evaluates the disconnect policy. Returns the current result, if any.
    pub fn tick(&mut self, now_ms: u64) -> Option<GameResult> {
        if !self.session.is_finished() {
            if let Some(outcome) = self.presence.check(now_ms) {
                warn!(?outcome, "disconnect grace expired, settling duel");
                self.session.declare_result(outcome, ResultReason::Disconnect);
                self.settle();
            }
        }
        self.session.game_result
    }

    /// Card conservation for the local field.
    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let field = &self.session.my_field;
        let actual = field.card_count();
        if actual != self.deck_ids.len() {
            return Err(IntegrityError::CardCountMismatch {
                expected: self.deck_ids.len(),
                actual,
            });
        }
        if let Some(card_id) = self.deck_ids.iter().find(|id| !field.contains_card(id)) {
            return Err(IntegrityError::MissingCard {
                card_id: card_id.clone(),
            });
        }
        for field in [&self.session.my_field, &self.session.opponent_field] {
            if field.life < 0 {
                return Err(IntegrityError::NegativeLife { value: field.life });
            }
        }
        Ok(())
    }

    /// Externalises the result the first time one appears.
    fn settle(&mut self) {
        if self.result_recorded {
            return;
        }
        let Some(result) = self.session.game_result else {
            return;
        };
        self.result_recorded = true;
        info!(outcome = ?result.outcome, reason = ?result.reason, "duel finished");
        let record = MatchRecord {
            opponent_name: self.room.opponent_name().to_string(),
            mode: self.config.mode.clone(),
            result: result.outcome,
            reason: result.reason,
            deck_used: self.room.my_deck().name.clone(),
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.record_result(&record);
        }
    }
}
