use serde::{Deserialize, Serialize};

use crate::game::field::DEFAULT_STARTING_LIFE;

/// Tunables for one duel. Every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuelConfig {
    pub starting_life: i32,
    pub opening_hand: usize,
    pub shuffle_decks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_seed: Option<u64>,
    /// Label written into the match record.
    pub mode: String,
    /// `None` disables the disconnect forfeit.
    pub forfeit_grace_ms: Option<u64>,
    pub long_press_ms: u64,
    pub drag_threshold_px: f64,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            starting_life: DEFAULT_STARTING_LIFE,
            opening_hand: 5,
            shuffle_decks: true,
            shuffle_seed: None,
            mode: "pvp".to_string(),
            forfeit_grace_ms: Some(60_000),
            long_press_ms: 500,
            drag_threshold_px: 8.0,
        }
    }
}

impl DuelConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deterministic setup: no shuffling, no disconnect forfeit.
    pub fn deterministic() -> Self {
        Self {
            shuffle_decks: false,
            forfeit_grace_ms: None,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DuelConfig::from_json(r#"{"opening_hand":3,"forfeit_grace_ms":null}"#)
            .expect("config should parse");
        assert_eq!(config.opening_hand, 3);
        assert_eq!(config.forfeit_grace_ms, None);
        assert_eq!(config.starting_life, 20);
        assert_eq!(config.mode, "pvp");
    }
}
