use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::card::{Card, CardId};

pub const UNIT_SLOTS: usize = 4;
pub const FUNCTION_SLOTS: usize = 4;
pub const DEFAULT_STARTING_LIFE: i32 = 20;

/// Positional region of a battlefield.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Unit,
    Function,
    Equip,
    Scenario,
}

impl Zone {
    /// Zone a card of this shape is allowed to enter. The equip slot has no entry rule.
    pub fn for_card(card: &Card) -> Zone {
        if card.card_type.is_unit() {
            Zone::Unit
        } else if card.card_type.is_scenario() {
            Zone::Scenario
        } else {
            Zone::Function
        }
    }
}

/// A card sitting in the unit zone, with its combat attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldCard {
    pub card: Card,
    pub current_dp: i32,
    #[serde(default)]
    pub can_attack: bool,
    #[serde(default)]
    pub has_attacked: bool,
    /// The unit may attack only once the shared turn counter exceeds this value.
    pub can_attack_turn: u32,
}

impl FieldCard {
    pub fn summon(card: Card, turn: u32) -> Self {
        Self {
            current_dp: card.dp,
            card,
            can_attack: false,
            has_attacked: false,
            can_attack_turn: turn,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.can_attack && !self.has_attacked
    }

    fn refresh(&mut self, turn: u32) {
        self.has_attacked = false;
        self.can_attack = turn > self.can_attack_turn;
    }
}

/// Where combat damage lands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DamageTarget {
    Unit { slot: usize },
    Life,
}

/// Result of one damage application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DamageOutcome {
    Unit {
        slot: usize,
        remaining_dp: i32,
        destroyed: Option<Card>,
    },
    Life {
        applied: i32,
        remaining: i32,
    },
    Missed,
}

/// One player's battlefield. Used both for "my" field and for the mirror of the opponent's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldState {
    #[serde(default)]
    pub unit_zone: [Option<FieldCard>; UNIT_SLOTS],
    #[serde(default)]
    pub function_zone: [Option<Card>; FUNCTION_SLOTS],
    #[serde(default)]
    pub equip_zone: Option<Card>,
    #[serde(default)]
    pub scenario_zone: Option<Card>,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub deck: VecDeque<Card>,
    #[serde(default)]
    pub graveyard: Vec<Card>,
    pub life: i32,
}

impl Default for FieldState {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_STARTING_LIFE)
    }
}

impl FieldState {
    pub fn new(deck: Vec<Card>, life: i32) -> Self {
        Self {
            unit_zone: Default::default(),
            function_zone: Default::default(),
            equip_zone: None,
            scenario_zone: None,
            hand: Vec::new(),
            deck: deck.into(),
            graveyard: Vec::new(),
            life: life.max(0),
        }
    }

    pub fn find_card_in_hand_index(&self, card_id: &str) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn unit(&self, slot: usize) -> Option<&FieldCard> {
        self.unit_zone.get(slot).and_then(Option::as_ref)
    }

    pub fn unit_mut(&mut self, slot: usize) -> Option<&mut FieldCard> {
        self.unit_zone.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn is_slot_empty(&self, zone: Zone, slot: usize) -> bool {
        match zone {
            Zone::Unit => matches!(self.unit_zone.get(slot), Some(None)),
            Zone::Function => matches!(self.function_zone.get(slot), Some(None)),
            Zone::Equip => slot == 0 && self.equip_zone.is_none(),
            Zone::Scenario => slot == 0 && self.scenario_zone.is_none(),
        }
    }

    /// Zone/slot legality. Occupancy and card shape are the only gates.
    pub fn can_place(&self, card: &Card, zone: Zone, slot: usize) -> bool {
        zone != Zone::Equip && Zone::for_card(card) == zone && self.is_slot_empty(zone, slot)
    }

    /// Moves a card from hand into a slot. Returns the placed card, or `None` when the card
    /// is not in hand or the slot does not accept it.
    pub fn place(&mut self, card_id: &str, zone: Zone, slot: usize, turn: u32) -> Option<Card> {
        let idx = self.find_card_in_hand_index(card_id)?;
        if !self.can_place(&self.hand[idx], zone, slot) {
            return None;
        }
        let card = self.hand.remove(idx);
        self.put_in_slot(card.clone(), zone, slot, turn);
        Some(card)
    }

    /// Mirror-side placement. The broadcast card replaces whichever hand entry matches its
    /// id, or the oldest hand entry when the mirror never learned that card's identity.
    pub fn place_mirrored(&mut self, card: Card, zone: Zone, slot: usize, turn: u32) -> bool {
        if zone == Zone::Equip || !self.is_slot_empty(zone, slot) {
            return false;
        }
        match self.find_card_in_hand_index(&card.id) {
            Some(idx) => {
                self.hand.remove(idx);
            }
            None if !self.hand.is_empty() => {
                self.hand.remove(0);
            }
            None => {}
        }
        self.put_in_slot(card, zone, slot, turn);
        true
    }

    fn put_in_slot(&mut self, card: Card, zone: Zone, slot: usize, turn: u32) {
        match zone {
            Zone::Unit => self.unit_zone[slot] = Some(FieldCard::summon(card, turn)),
            Zone::Function => self.function_zone[slot] = Some(card),
            Zone::Equip => self.equip_zone = Some(card),
            Zone::Scenario => self.scenario_zone = Some(card),
        }
    }

    /// Pops the front of the deck into hand. An empty deck is a no-op, not a loss.
    pub fn draw(&mut self) -> Option<Card> {
        let card = self.deck.pop_front()?;
        self.hand.push(card.clone());
        Some(card)
    }

    pub fn draw_many(&mut self, count: usize) -> Vec<Card> {
        (0..count).map_while(|_| self.draw()).collect()
    }

    /// Applies `damage` to a unit or to life. A unit whose DP drops to zero or below is moved
    /// to the graveyard and its slot cleared; life never goes below zero.
    pub fn resolve_combat_damage(&mut self, target: DamageTarget, damage: i32) -> DamageOutcome {
        match target {
            DamageTarget::Life => {
                let before = self.life;
                self.life = (self.life - damage).max(0);
                DamageOutcome::Life {
                    applied: before - self.life,
                    remaining: self.life,
                }
            }
            DamageTarget::Unit { slot } => {
                let Some(unit) = self.unit_mut(slot) else {
                    return DamageOutcome::Missed;
                };
                unit.current_dp -= damage;
                let remaining_dp = unit.current_dp;
                let destroyed = if remaining_dp <= 0 {
                    self.destroy_unit(slot)
                } else {
                    None
                };
                DamageOutcome::Unit {
                    slot,
                    remaining_dp,
                    destroyed,
                }
            }
        }
    }

    pub fn destroy_unit(&mut self, slot: usize) -> Option<Card> {
        let unit = self.unit_zone.get_mut(slot)?.take()?;
        self.graveyard.push(unit.card.clone());
        Some(unit.card)
    }

    pub fn mark_attacked(&mut self, slot: usize) {
        if let Some(unit) = self.unit_mut(slot) {
            unit.has_attacked = true;
            unit.can_attack = false;
        }
    }

    /// Readies units whose summoning gate has passed for `turn`.
    pub fn enable_units(&mut self, turn: u32) {
        for unit in self.unit_zone.iter_mut().flatten() {
            unit.refresh(turn);
        }
    }

    pub fn disable_units(&mut self) {
        for unit in self.unit_zone.iter_mut().flatten() {
            unit.can_attack = false;
            unit.has_attacked = false;
        }
    }

    /// Battle-phase flip: only units past their gate gain `can_attack`.
    pub fn arm_units(&mut self, turn: u32) {
        for unit in self.unit_zone.iter_mut().flatten() {
            if turn > unit.can_attack_turn {
                unit.can_attack = true;
            }
        }
    }

    pub fn occupied_slots(&self) -> usize {
        self.unit_zone.iter().flatten().count()
            + self.function_zone.iter().flatten().count()
            + usize::from(self.equip_zone.is_some())
            + usize::from(self.scenario_zone.is_some())
    }

    /// Every card this field accounts for, wherever it sits.
    pub fn card_count(&self) -> usize {
        self.hand.len() + self.deck.len() + self.graveyard.len() + self.occupied_slots()
    }

    pub fn contains_card(&self, card_id: &CardId) -> bool {
        self.hand.iter().any(|card| &card.id == card_id)
            || self.deck.iter().any(|card| &card.id == card_id)
            || self.graveyard.iter().any(|card| &card.id == card_id)
            || self
                .unit_zone
                .iter()
                .flatten()
                .any(|unit| &unit.card.id == card_id)
            || self
                .function_zone
                .iter()
                .flatten()
                .chain(self.equip_zone.iter())
                .chain(self.scenario_zone.iter())
                .any(|card| &card.id == card_id)
    }

    pub fn is_defeated(&self) -> bool {
        self.life <= 0
    }
}
