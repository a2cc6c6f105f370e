//! Pointer gestures to discrete intents.
//!
//! The presentation layer reports pointer events together with the topmost element under
//! the pointer. The tracker turns a drag from hand into a placement, a drag from a ready
//! unit into an attack, and a long press into a read-only inspection. Anything that does not
//! resolve to a legal intent is cancelled and nothing is sent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DuelConfig;
use crate::game::{AttackTarget, CardId, DuelSession, Intent, Phase, Side, Zone};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Topmost element under the pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitTarget {
    HandCard { card_id: CardId },
    Slot { side: Side, zone: Zone, slot: usize },
    DirectAttack,
    Nothing,
}

/// A card the player pressed on, wherever it sits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardRef {
    Hand { card_id: CardId },
    Slot { side: Side, zone: Zone, slot: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureOutcome {
    None,
    Intent { intent: Intent },
    Inspect { card: CardRef },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
enum GestureState {
    Idle,
    Pressed {
        origin: CardRef,
        start: Point,
        at_ms: u64,
    },
    DraggingCard {
        card_id: CardId,
        pos: Point,
    },
    Aiming {
        attacker_slot: usize,
        pos: Point,
    },
}

#[derive(Debug, Clone)]
pub struct GestureTracker {
    state: GestureState,
    long_press_ms: u64,
    drag_threshold_px: f64,
}

impl GestureTracker {
    pub fn new(config: &DuelConfig) -> Self {
        Self {
            state: GestureState::Idle,
            long_press_ms: config.long_press_ms,
            drag_threshold_px: config.drag_threshold_px,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == GestureState::Idle
    }

    /// Card being dragged from hand and where it is.
    pub fn dragging(&self) -> Option<(&CardId, Point)> {
        match &self.state {
            GestureState::DraggingCard { card_id, pos } => Some((card_id, *pos)),
            _ => None,
        }
    }

    /// Attacker slot and pointer position while an attack arrow is drawn.
    pub fn aiming(&self) -> Option<(usize, Point)> {
        match self.state {
            GestureState::Aiming { attacker_slot, pos } => Some((attacker_slot, pos)),
            _ => None,
        }
    }

    pub fn pointer_down(
        &mut self,
        session: &DuelSession,
        target: &HitTarget,
        pos: Point,
        now_ms: u64,
    ) {
        let origin = match target {
            HitTarget::HandCard { card_id } => {
                if session.my_field.find_card_in_hand_index(card_id).is_none() {
                    return;
                }
                CardRef::Hand {
                    card_id: card_id.clone(),
                }
            }
            HitTarget::Slot { side, zone, slot } => {
                if !slot_has_card(session, *side, *zone, *slot) {
                    return;
                }
                CardRef::Slot {
                    side: *side,
                    zone: *zone,
                    slot: *slot,
                }
            }
            HitTarget::DirectAttack | HitTarget::Nothing => return,
        };
        self.state = GestureState::Pressed {
            origin,
            start: pos,
            at_ms: now_ms,
        };
    }

    pub fn pointer_move(&mut self, session: &DuelSession, pos: Point) {
        match &mut self.state {
            GestureState::Pressed { origin, start, .. } => {
                if start.distance(pos) < self.drag_threshold_px {
                    return;
                }
                self.state = match origin.clone() {
                    CardRef::Hand { card_id } => GestureState::DraggingCard { card_id, pos },
                    CardRef::Slot {
                        side: Side::Mine,
                        zone: Zone::Unit,
                        slot,
                    } if can_start_attack(session, slot) => GestureState::Aiming {
                        attacker_slot: slot,
                        pos,
                    },
                    _ => GestureState::Idle,
                };
            }
            GestureState::DraggingCard { pos: current, .. }
            | GestureState::Aiming { pos: current, .. } => *current = pos,
            GestureState::Idle => {}
        }
    }

    /// Fires the inspection view once a press has been held long enough, without waiting
    /// for release.
    pub fn poll_long_press(&mut self, now_ms: u64) -> GestureOutcome {
        if let GestureState::Pressed { origin, at_ms, .. } = &self.state {
            if now_ms.saturating_sub(*at_ms) >= self.long_press_ms {
                let card = origin.clone();
                self.state = GestureState::Idle;
                return GestureOutcome::Inspect { card };
            }
        }
        GestureOutcome::None
    }

    pub fn pointer_up(
        &mut self,
        session: &DuelSession,
        target: &HitTarget,
        now_ms: u64,
    ) -> GestureOutcome {
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        match state {
            GestureState::Idle => GestureOutcome::None,
            GestureState::Pressed { origin, at_ms, .. } => {
                if now_ms.saturating_sub(at_ms) >= self.long_press_ms {
                    GestureOutcome::Inspect { card: origin }
                } else {
                    GestureOutcome::None
                }
            }
            GestureState::DraggingCard { card_id, .. } => {
                match resolve_drop(session, &card_id, target) {
                    Some(intent) => GestureOutcome::Intent { intent },
                    None => {
                        debug!(card = %card_id, ?target, "drop has no legal target");
                        GestureOutcome::Cancelled
                    }
                }
            }
            GestureState::Aiming { attacker_slot, .. } => {
                match resolve_attack(session, attacker_slot, target) {
                    Some(intent) => GestureOutcome::Intent { intent },
                    None => {
                        debug!(attacker_slot, ?target, "attack released on invalid target");
                        GestureOutcome::Cancelled
                    }
                }
            }
        }
    }

    /// Abandons whatever is in progress, e.g. when the board view unmounts.
    pub fn cancel(&mut self) -> GestureOutcome {
        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => GestureOutcome::None,
            _ => GestureOutcome::Cancelled,
        }
    }
}

fn slot_has_card(session: &DuelSession, side: Side, zone: Zone, slot: usize) -> bool {
    let field = session.field(side);
    match zone {
        Zone::Unit => field.unit(slot).is_some(),
        Zone::Function => matches!(field.function_zone.get(slot), Some(Some(_))),
        Zone::Equip => slot == 0 && field.equip_zone.is_some(),
        Zone::Scenario => slot == 0 && field.scenario_zone.is_some(),
    }
}

/// Whether a press on our unit in `slot` may turn into an attack.
pub fn can_start_attack(session: &DuelSession, slot: usize) -> bool {
    !session.is_finished()
        && session.is_my_turn
        && session.phase == Phase::Battle
        && session.my_field.unit(slot).is_some_and(|unit| unit.is_ready())
}

/// Capability match for a card dropped from hand.
pub fn resolve_drop(session: &DuelSession, card_id: &str, target: &HitTarget) -> Option<Intent> {
    if session.is_finished() || !session.is_my_turn || session.phase != Phase::Main {
        return None;
    }
    let HitTarget::Slot {
        side: Side::Mine,
        zone,
        slot,
    } = *target
    else {
        return None;
    };
    let field = &session.my_field;
    let card = &field.hand[field.find_card_in_hand_index(card_id)?];
    if !field.can_place(card, zone, slot) {
        return None;
    }
    Some(match zone {
        Zone::Scenario => Intent::PlaceScenario {
            card_id: card.id.clone(),
        },
        _ => Intent::PlaceCard {
            card_id: card.id.clone(),
            zone,
            slot,
        },
    })
}

/// Resolves an attack release against an opposing unit or the direct-attack region.
pub fn resolve_attack(
    session: &DuelSession,
    attacker_slot: usize,
    target: &HitTarget,
) -> Option<Intent> {
    if !can_start_attack(session, attacker_slot) {
        return None;
    }
    let target = match *target {
        HitTarget::Slot {
            side: Side::Opponent,
            zone: Zone::Unit,
            slot,
        } if session.opponent_field.unit(slot).is_some() => AttackTarget::Unit { slot },
        HitTarget::DirectAttack => AttackTarget::Direct,
        _ => return None,
    };
    Some(Intent::Attack {
        attacker_slot,
        target,
    })
}
