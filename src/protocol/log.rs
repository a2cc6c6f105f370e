use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::action::{Action, ActionKind};
use crate::game::PlayerId;

/// Why an incoming action was not applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Our own write coming back from the transport.
    Echo,
    /// The sender's stream already delivered this sequence number or a later one.
    Duplicate { seq: u64, last_seen: u64 },
    /// The duel already has a result.
    Finished,
    Malformed { detail: String },
}

/// Receive-side bookkeeping for the room's action log, plus the outbox of local actions
/// that are applied but not yet published.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    local_id: PlayerId,
    #[serde(default)]
    last_seen: HashMap<PlayerId, u64>,
    #[serde(default)]
    outbox: VecDeque<Action>,
}

impl ActionLog {
    pub fn new(local_id: impl Into<PlayerId>) -> Self {
        Self {
            local_id: local_id.into(),
            last_seen: HashMap::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// Builds an unsequenced action authored by the local player.
    pub fn stamp(&self, kind: ActionKind, timestamp: u64) -> Action {
        Action::new(self.local_id.clone(), kind, timestamp)
    }

    /// Queues an applied local action until the transport accepts it.
    pub fn enqueue(&mut self, action: Action) {
        self.outbox.push_back(action);
    }

    pub fn next_pending(&self) -> Option<&Action> {
        self.outbox.front()
    }

    pub fn last_pending(&self) -> Option<&Action> {
        self.outbox.back()
    }

    pub fn pop_pending(&mut self) -> Option<Action> {
        self.outbox.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn last_seen(&self, sender: &str) -> Option<u64> {
        self.last_seen.get(sender).copied()
    }

    /// Decides whether a delivered action is a genuine remote event. Each sender's stream is
    /// ordered, so a sequence number at or below the last one seen from that sender is a
    /// redelivery. Gaps are expected: both peers draw from the same room counter.
    pub fn admit(&mut self, action: &Action) -> Result<(), IgnoreReason> {
        if action.player_id == self.local_id {
            return Err(IgnoreReason::Echo);
        }
        if let Some(seq) = action.seq {
            if let Some(&last_seen) = self.last_seen.get(&action.player_id) {
                if seq <= last_seen {
                    return Err(IgnoreReason::Duplicate { seq, last_seen });
                }
            }
            self.last_seen.insert(action.player_id.clone(), seq);
        } else {
            debug!(sender = %action.player_id, "admitting unsequenced action");
        }
        Ok(())
    }
}
