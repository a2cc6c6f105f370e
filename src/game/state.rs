use serde::{Deserialize, Serialize};

use super::card::{Card, CardId};
use super::field::{DamageTarget, FieldState, Zone};

/// Stable player identity as supplied by the room.
pub type PlayerId = String;

/// Whose field something lives on, from the local client's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Mine,
    Opponent,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Mine => Side::Opponent,
            Side::Opponent => Side::Mine,
        }
    }
}

/// Per-turn phase, owned by the active player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Draw,
    Main,
    Battle,
    End,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Draw
    }
}

impl Phase {
    /// The phase a manual advance may move to.
    pub fn next_manual(self) -> Option<Phase> {
        match self {
            Phase::Main => Some(Phase::Battle),
            Phase::Battle => Some(Phase::End),
            Phase::Draw | Phase::End => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultReason {
    Combat,
    Surrender,
    Disconnect,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameResult {
    pub outcome: GameOutcome,
    pub reason: ResultReason,
}

/// Engine event stream consumed by presentation adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DuelEvent {
    CardDrawn {
        side: Side,
        #[serde(skip_serializing_if = "Option::is_none")]
        card_id: Option<CardId>,
    },
    CardPlaced {
        side: Side,
        card: Card,
        zone: Zone,
        slot: usize,
    },
    PhaseChanged {
        side: Side,
        phase: Phase,
    },
    AttackDeclared {
        side: Side,
        attacker_slot: usize,
        target: DamageTarget,
    },
    DamageResolved {
        side: Side,
        target: DamageTarget,
        amount: i32,
    },
    UnitDestroyed {
        side: Side,
        slot: usize,
        card: Card,
    },
    LifeChanged {
        side: Side,
        life: i32,
    },
    TurnEnded {
        side: Side,
        turn: u32,
    },
    DuelFinished {
        result: GameResult,
    },
}

/// Shared duel clock and terminal flag, plus both battlefields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelSession {
    pub turn: u32,
    pub phase: Phase,
    pub is_my_turn: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_result: Option<GameResult>,
    pub my_field: FieldState,
    pub opponent_field: FieldState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<DuelEvent>,
}

impl DuelSession {
    pub fn new(my_field: FieldState, opponent_field: FieldState, is_my_turn: bool) -> Self {
        Self {
            turn: 1,
            phase: Phase::default(),
            is_my_turn,
            game_result: None,
            my_field,
            opponent_field,
            event_log: Vec::new(),
        }
    }

    pub fn field(&self, side: Side) -> &FieldState {
        match side {
            Side::Mine => &self.my_field,
            Side::Opponent => &self.opponent_field,
        }
    }

    pub fn field_mut(&mut self, side: Side) -> &mut FieldState {
        match side {
            Side::Mine => &mut self.my_field,
            Side::Opponent => &mut self.opponent_field,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game_result.is_some()
    }

    pub fn record_event(&mut self, event: DuelEvent) {
        self.event_log.push(event);
    }

    pub fn take_events(&mut self) -> Vec<DuelEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Sets the terminal result once. Later calls leave the first result in place and return
    /// `false`.
    pub fn declare_result(&mut self, outcome: GameOutcome, reason: ResultReason) -> bool {
        if self.game_result.is_some() {
            return false;
        }
        let result = GameResult { outcome, reason };
        self.game_result = Some(result);
        self.record_event(DuelEvent::DuelFinished { result });
        true
    }

    /// Life-based win check; a no-op once a result exists.
    pub fn evaluate_victory(&mut self) -> Option<GameResult> {
        if self.game_result.is_none() {
            if self.my_field.is_defeated() {
                self.declare_result(GameOutcome::Lost, ResultReason::Combat);
            } else if self.opponent_field.is_defeated() {
                self.declare_result(GameOutcome::Won, ResultReason::Combat);
            }
        }
        self.game_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_set_once() {
        let mut session = DuelSession::new(FieldState::default(), FieldState::default(), true);
        assert!(session.declare_result(GameOutcome::Lost, ResultReason::Surrender));
        assert!(!session.declare_result(GameOutcome::Won, ResultReason::Combat));

        session.opponent_field.life = 0;
        let result = session.evaluate_victory().expect("result should stay set");
        assert_eq!(result.outcome, GameOutcome::Lost);
        assert_eq!(result.reason, ResultReason::Surrender);
        assert_eq!(
            session
                .event_log
                .iter()
                .filter(|e| matches!(e, DuelEvent::DuelFinished { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn own_defeat_is_checked_first() {
        let mut session = DuelSession::new(FieldState::default(), FieldState::default(), true);
        session.my_field.life = 0;
        session.opponent_field.life = 0;
        let result = session.evaluate_victory().expect("someone lost");
        assert_eq!(result.outcome, GameOutcome::Lost);
    }

    #[test]
    fn only_main_and_battle_advance_manually() {
        assert_eq!(Phase::Main.next_manual(), Some(Phase::Battle));
        assert_eq!(Phase::Battle.next_manual(), Some(Phase::End));
        assert_eq!(Phase::Draw.next_manual(), None);
        assert_eq!(Phase::End.next_manual(), None);
    }
}
