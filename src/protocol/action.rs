use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::{AttackTarget, Card, Phase, PlayerId, Zone};

const KNOWN_TYPES: [&str; 7] = [
    "draw",
    "place_card",
    "place_scenario",
    "attack",
    "end_turn",
    "phase_change",
    "surrender",
];

/// Variant-specific payload of one move. Serialised as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ActionKind {
    Draw,
    PlaceCard {
        card: Card,
        zone: Zone,
        slot: usize,
    },
    PlaceScenario {
        card: Card,
    },
    Attack {
        attacker_slot: usize,
        target: AttackTarget,
        /// The attacker's DP at the moment it struck, as seen by its owner.
        damage: i32,
    },
    EndTurn,
    PhaseChange {
        phase: Phase,
    },
    Surrender,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Draw => "draw",
            ActionKind::PlaceCard { .. } => "place_card",
            ActionKind::PlaceScenario { .. } => "place_scenario",
            ActionKind::Attack { .. } => "attack",
            ActionKind::EndTurn => "end_turn",
            ActionKind::PhaseChange { .. } => "phase_change",
            ActionKind::Surrender => "surrender",
        }
    }
}

/// One entry of the room's append-only action log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// Room-scoped sequence number, assigned by the transport on publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed action payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("action payload is missing a `type` tag")]
    MissingType,
    #[error("unknown action type `{0}`")]
    UnknownType(String),
}

impl Action {
    pub fn new(player_id: impl Into<PlayerId>, kind: ActionKind, timestamp: u64) -> Self {
        Self {
            seq: None,
            player_id: player_id.into(),
            timestamp,
            kind,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a wire payload, telling an unknown `type` apart from a broken body.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        let action_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !KNOWN_TYPES.contains(&action_type) {
            return Err(ProtocolError::UnknownType(action_type.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}
