use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::game::{Deck, GameOutcome, PlayerId, ResultReason};
use crate::protocol::RoomScope;

/// Finalised room handed over by the lobby: both identities, both decks, and which side
/// this client is. The host moves first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomData {
    #[serde(default)]
    pub room_id: String,
    pub host_id: PlayerId,
    pub host_name: String,
    pub host_deck: Deck,
    pub guest_id: PlayerId,
    pub guest_name: String,
    pub guest_deck: Deck,
    pub is_host: bool,
}

impl RoomData {
    pub fn scope(&self) -> RoomScope {
        RoomScope::new(self.room_id.clone())
    }

    pub fn local_id(&self) -> &PlayerId {
        if self.is_host {
            &self.host_id
        } else {
            &self.guest_id
        }
    }

    pub fn opponent_id(&self) -> &PlayerId {
        if self.is_host {
            &self.guest_id
        } else {
            &self.host_id
        }
    }

    pub fn opponent_name(&self) -> &str {
        if self.is_host {
            &self.guest_name
        } else {
            &self.host_name
        }
    }

    pub fn my_deck(&self) -> &Deck {
        if self.is_host {
            &self.host_deck
        } else {
            &self.guest_deck
        }
    }

    pub fn opponent_deck(&self) -> &Deck {
        if self.is_host {
            &self.guest_deck
        } else {
            &self.host_deck
        }
    }

    /// The same room as seen from the other client.
    pub fn flipped(&self) -> Self {
        Self {
            is_host: !self.is_host,
            ..self.clone()
        }
    }
}

/// What the storage collaborator persists once a duel ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRecord {
    pub opponent_name: String,
    pub mode: String,
    pub result: GameOutcome,
    pub reason: ResultReason,
    pub deck_used: String,
}

/// Receives the match record exactly once per duel.
pub trait MatchResultSink {
    fn record_result(&mut self, record: &MatchRecord);
}

/// Shared in-process sink, handy for tests and for callers that poll.
pub type RecordingSink = Rc<RefCell<Vec<MatchRecord>>>;

impl MatchResultSink for RecordingSink {
    fn record_result(&mut self, record: &MatchRecord) {
        self.borrow_mut().push(record.clone());
    }
}
