use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    card::{Card, CardId},
    field::{DamageOutcome, DamageTarget, Zone},
    state::{DuelEvent, DuelSession, GameOutcome, Phase, ResultReason, Side},
};
use crate::protocol::ActionKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttackTarget {
    Unit { slot: usize },
    Direct,
}

impl AttackTarget {
    fn damage_target(self) -> DamageTarget {
        match self {
            AttackTarget::Unit { slot } => DamageTarget::Unit { slot },
            AttackTarget::Direct => DamageTarget::Life,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Draw,
    PlaceCard {
        card_id: CardId,
        zone: Zone,
        slot: usize,
    },
    PlaceScenario {
        card_id: CardId,
    },
    Attack {
        attacker_slot: usize,
        target: AttackTarget,
    },
    AdvancePhase,
    EndTurn,
    Surrender,
}

/// Why a local intent was refused. These never reach the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the duel is already over")]
    GameFinished,
    #[error("it is not your turn")]
    NotPlayerTurn,
    #[error("expected phase {expected:?}, currently {actual:?}")]
    InvalidPhase { expected: Phase, actual: Phase },
    #[error("no manual advance from phase {phase:?}")]
    NoPhaseAfter { phase: Phase },
    #[error("card {card_id} is not in hand")]
    CardNotFound { card_id: CardId },
    #[error("card cannot be placed into {zone:?} slot {slot}")]
    IllegalPlacement { zone: Zone, slot: usize },
    #[error("no unit in slot {slot}")]
    AttackerNotFound { slot: usize },
    #[error("unit in slot {slot} cannot attack right now")]
    AttackerNotReady { slot: usize },
    #[error("no opposing unit in slot {slot}")]
    InvalidAttackTarget { slot: usize },
}

/// Turn, phase and combat rules. Local intents and replayed remote actions run through the
/// same transitions with the sides swapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_active(session: &DuelSession, intent: &Intent) -> Result<(), RuleError> {
        if session.is_finished() {
            return Err(RuleError::GameFinished);
        }
        // Surrender is the one intent allowed on the opponent's turn.
        if !session.is_my_turn && !matches!(intent, Intent::Surrender) {
            return Err(RuleError::NotPlayerTurn);
        }
        Ok(())
    }

    fn ensure_phase(session: &DuelSession, expected: Phase) -> Result<(), RuleError> {
        if session.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: session.phase,
            });
        }
        Ok(())
    }

    /// Checks and applies a local intent, returning the payload to broadcast.
    pub fn apply_local(
        &self,
        session: &mut DuelSession,
        intent: Intent,
    ) -> Result<ActionKind, RuleError> {
        Self::ensure_active(session, &intent)?;
        match intent {
            Intent::Draw => {
                Self::ensure_phase(session, Phase::Draw)?;
                Self::draw(session, Side::Mine);
                Ok(ActionKind::Draw)
            }
            Intent::PlaceCard {
                card_id,
                zone,
                slot,
            } => {
                if zone == Zone::Scenario {
                    return Err(RuleError::IllegalPlacement { zone, slot });
                }
                let card = Self::place_local(session, &card_id, zone, slot)?;
                Ok(ActionKind::PlaceCard { card, zone, slot })
            }
            Intent::PlaceScenario { card_id } => {
                let card = Self::place_local(session, &card_id, Zone::Scenario, 0)?;
                Ok(ActionKind::PlaceScenario { card })
            }
            Intent::AdvancePhase => {
                let phase = session
                    .phase
                    .next_manual()
                    .ok_or(RuleError::NoPhaseAfter {
                        phase: session.phase,
                    })?;
                Self::change_phase(session, Side::Mine, phase);
                Ok(ActionKind::PhaseChange { phase })
            }
            Intent::Attack {
                attacker_slot,
                target,
            } => {
                Self::ensure_phase(session, Phase::Battle)?;
                let attacker = session
                    .my_field
                    .unit(attacker_slot)
                    .ok_or(RuleError::AttackerNotFound {
                        slot: attacker_slot,
                    })?;
                if !attacker.is_ready() {
                    return Err(RuleError::AttackerNotReady {
                        slot: attacker_slot,
                    });
                }
                let damage = attacker.current_dp;
                if let AttackTarget::Unit { slot } = target {
                    if session.opponent_field.unit(slot).is_none() {
                        return Err(RuleError::InvalidAttackTarget { slot });
                    }
                }
                Self::resolve_attack(session, Side::Mine, attacker_slot, target, damage);
                Ok(ActionKind::Attack {
                    attacker_slot,
                    target,
                    damage,
                })
            }
            Intent::EndTurn => {
                Self::hand_over(session, Side::Mine);
                Ok(ActionKind::EndTurn)
            }
            Intent::Surrender => {
                session.declare_result(GameOutcome::Lost, ResultReason::Surrender);
                Ok(ActionKind::Surrender)
            }
        }
    }

    /// Replays the opponent's action against the mirror. Never fails: a reference to state
    /// the mirror does not have degrades to a logged no-op. Returns `false` when the duel
    /// already has a result and nothing was touched.
    pub fn apply_remote(&self, session: &mut DuelSession, kind: &ActionKind) -> bool {
        if session.is_finished() {
            return false;
        }
        match kind {
            ActionKind::Draw => Self::draw(session, Side::Opponent),
            ActionKind::PlaceCard { card, zone, slot } => {
                Self::place_remote(session, card.clone(), *zone, *slot)
            }
            ActionKind::PlaceScenario { card } => {
                Self::place_remote(session, card.clone(), Zone::Scenario, 0)
            }
            ActionKind::PhaseChange { phase } => Self::change_phase(session, Side::Opponent, *phase),
            ActionKind::Attack {
                attacker_slot,
                target,
                damage,
            } => Self::resolve_attack(session, Side::Opponent, *attacker_slot, *target, *damage),
            // Only the rightful turn-holder can have sent this.
            ActionKind::EndTurn => Self::hand_over(session, Side::Opponent),
            ActionKind::Surrender => {
                session.declare_result(GameOutcome::Won, ResultReason::Surrender);
            }
        }
        true
    }

    fn draw(session: &mut DuelSession, side: Side) {
        let drawn = session.field_mut(side).draw();
        if drawn.is_none() {
            debug!(?side, "draw from empty deck");
        }
        let card_id = match side {
            Side::Mine => drawn.map(|card| card.id),
            Side::Opponent => None,
        };
        session.record_event(DuelEvent::CardDrawn { side, card_id });
        Self::change_phase(session, side, Phase::Main);
    }

    fn place_local(
        session: &mut DuelSession,
        card_id: &str,
        zone: Zone,
        slot: usize,
    ) -> Result<Card, RuleError> {
        Self::ensure_phase(session, Phase::Main)?;
        let field = &session.my_field;
        let idx = field
            .find_card_in_hand_index(card_id)
            .ok_or_else(|| RuleError::CardNotFound {
                card_id: card_id.to_string(),
            })?;
        if !field.can_place(&field.hand[idx], zone, slot) {
            return Err(RuleError::IllegalPlacement { zone, slot });
        }
        let turn = session.turn;
        let card = session
            .my_field
            .place(card_id, zone, slot, turn)
            .ok_or(RuleError::IllegalPlacement { zone, slot })?;
        session.record_event(DuelEvent::CardPlaced {
            side: Side::Mine,
            card: card.clone(),
            zone,
            slot,
        });
        Ok(card)
    }

    fn place_remote(session: &mut DuelSession, card: Card, zone: Zone, slot: usize) {
        let turn = session.turn;
        if session
            .opponent_field
            .place_mirrored(card.clone(), zone, slot, turn)
        {
            session.record_event(DuelEvent::CardPlaced {
                side: Side::Opponent,
                card,
                zone,
                slot,
            });
        } else {
            warn!(card = %card.id, ?zone, slot, "mirror slot unavailable, placement skipped");
        }
    }

    fn change_phase(session: &mut DuelSession, side: Side, phase: Phase) {
        session.phase = phase;
        if phase == Phase::Battle {
            let turn = session.turn;
            session.field_mut(side).arm_units(turn);
        }
        session.record_event(DuelEvent::PhaseChanged { side, phase });
    }

    fn resolve_attack(
        session: &mut DuelSession,
        attacker_side: Side,
        attacker_slot: usize,
        target: AttackTarget,
        damage: i32,
    ) {
        let defender_side = attacker_side.other();
        session.record_event(DuelEvent::AttackDeclared {
            side: attacker_side,
            attacker_slot,
            target: target.damage_target(),
        });

        let counter = match target {
            AttackTarget::Unit { slot } => match session.field(defender_side).unit(slot) {
                Some(defender) => Some(defender.current_dp),
                None => {
                    warn!(?defender_side, slot, "attack target missing on field, ignored");
                    None
                }
            },
            AttackTarget::Direct => None,
        };
        if matches!(target, AttackTarget::Unit { .. }) && counter.is_none() {
            session.field_mut(attacker_side).mark_attacked(attacker_slot);
            return;
        }

        let outcome = session
            .field_mut(defender_side)
            .resolve_combat_damage(target.damage_target(), damage);
        Self::record_damage(session, defender_side, target.damage_target(), damage, outcome);

        if let Some(counter) = counter {
            let back = DamageTarget::Unit {
                slot: attacker_slot,
            };
            let outcome = session
                .field_mut(attacker_side)
                .resolve_combat_damage(back, counter);
            Self::record_damage(session, attacker_side, back, counter, outcome);
        }

        session.field_mut(attacker_side).mark_attacked(attacker_slot);

        if target == AttackTarget::Direct {
            session.evaluate_victory();
        }
    }

    fn record_damage(
        session: &mut DuelSession,
        side: Side,
        target: DamageTarget,
        amount: i32,
        outcome: DamageOutcome,
    ) {
        match outcome {
            DamageOutcome::Missed => {
                warn!(?side, ?target, "damage target missing on field");
            }
            DamageOutcome::Unit {
                slot, destroyed, ..
            } => {
                session.record_event(DuelEvent::DamageResolved {
                    side,
                    target,
                    amount,
                });
                if let Some(card) = destroyed {
                    session.record_event(DuelEvent::UnitDestroyed { side, slot, card });
                }
            }
            DamageOutcome::Life { remaining, .. } => {
                session.record_event(DuelEvent::DamageResolved {
                    side,
                    target,
                    amount,
                });
                session.record_event(DuelEvent::LifeChanged {
                    side,
                    life: remaining,
                });
            }
        }
    }

    fn hand_over(session: &mut DuelSession, ending: Side) {
        let turn = session.turn;
        session.field_mut(ending).disable_units();
        session.turn += 1;
        let next_turn = session.turn;
        session.field_mut(ending.other()).enable_units(next_turn);
        session.is_my_turn = ending == Side::Opponent;
        session.phase = Phase::Draw;
        session.record_event(DuelEvent::TurnEnded { side: ending, turn });
    }
}
