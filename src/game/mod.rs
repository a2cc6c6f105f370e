//! Duel core: card model, battlefields, session state and the rule engine.

pub mod card;
pub mod field;
pub mod presence;
pub mod rules;
pub mod state;

pub use card::{Card, CardId, CardType, Deck, DeckError, Rarity, MAX_DECK_SIZE, MIN_DECK_SIZE};
pub use field::{
    DamageOutcome, DamageTarget, FieldCard, FieldState, Zone, FUNCTION_SLOTS, UNIT_SLOTS,
};
pub use presence::PresenceMonitor;
pub use rules::{AttackTarget, Intent, RuleEngine, RuleError};
pub use state::{
    DuelEvent, DuelSession, GameOutcome, GameResult, Phase, PlayerId, ResultReason, Side,
};
