use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical-copy identifier, e.g. `"ember-drake#2"`.
pub type CardId = String;

pub const MIN_DECK_SIZE: usize = 10;
pub const MAX_DECK_SIZE: usize = 20;

const COPY_SEPARATOR: char = '#';

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Rarity {
    R,
    SR,
    UR,
    LR,
}

impl Default for Rarity {
    fn default() -> Self {
        Rarity::R
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    Unit,
    Troops,
    Magic,
    Action,
    UltimateGear,
    UltimateGuardian,
    UltimateElemental,
    Item,
    Scenario,
}

impl Default for CardType {
    fn default() -> Self {
        CardType::Unit
    }
}

impl CardType {
    /// Card types that fight from the unit zone.
    pub fn is_unit(self) -> bool {
        matches!(self, CardType::Unit | CardType::Troops)
    }

    pub fn is_scenario(self) -> bool {
        matches!(self, CardType::Scenario)
    }

    /// Non-unit permanents that live in the function zone.
    pub fn is_function(self) -> bool {
        !self.is_unit() && !self.is_scenario()
    }
}

/// Immutable card value. Ability and attack text are display-only; the engine never
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default, rename = "type")]
    pub card_type: CardType,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub dp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_text: Option<String>,
}

impl Card {
    pub fn new(
        id: impl Into<CardId>,
        name: impl Into<String>,
        rarity: Rarity,
        card_type: CardType,
        element: impl Into<String>,
        dp: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rarity,
            card_type,
            element: element.into(),
            dp,
            ability: None,
            attack_text: None,
        }
    }

    pub fn unit(id: impl Into<CardId>, name: impl Into<String>, dp: i32) -> Self {
        Self::new(id, name, Rarity::R, CardType::Unit, "neutral", dp)
    }

    pub fn with_ability(mut self, text: impl Into<String>) -> Self {
        self.ability = Some(text.into());
        self
    }

    /// Definition id shared by every physical copy of this card.
    pub fn definition_id(&self) -> &str {
        match self.id.split_once(COPY_SEPARATOR) {
            Some((definition, _)) => definition,
            None => &self.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum DeckError {
    #[error("deck has {size} cards, expected between {min} and {max}")]
    InvalidSize { size: usize, min: usize, max: usize },
}

/// Ordered list of card instances. Size limits are checked here, at build time, and
/// never again during a duel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deck {
    #[serde(default)]
    pub name: String,
    pub cards: Vec<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playmat: Option<String>,
}

impl Deck {
    pub fn new(name: impl Into<String>, cards: Vec<Card>) -> Result<Self, DeckError> {
        let deck = Self {
            name: name.into(),
            cards,
            playmat: None,
        };
        deck.validate()?;
        Ok(deck)
    }

    pub fn validate(&self) -> Result<(), DeckError> {
        let size = self.cards.len();
        if !(MIN_DECK_SIZE..=MAX_DECK_SIZE).contains(&size) {
            return Err(DeckError::InvalidSize {
                size,
                min: MIN_DECK_SIZE,
                max: MAX_DECK_SIZE,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Builds a deck of `size` plain units named after `prefix`, with DP cycling 1..=5.
    pub fn sample(prefix: &str, size: usize) -> Self {
        let cards = (0..size)
            .map(|idx| {
                Card::unit(
                    format!("{prefix}-{}#{}", idx % 5, idx / 5 + 1),
                    format!("{prefix} Soldier {}", idx % 5),
                    (idx % 5) as i32 + 1,
                )
            })
            .collect();
        Self {
            name: format!("{prefix} starter"),
            cards,
            playmat: None,
        }
    }
}
