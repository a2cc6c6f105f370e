pub mod config;
pub mod duel;
pub mod game;
pub mod interaction;
pub mod protocol;
pub mod room;
pub mod telemetry;
pub mod utils;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::js_sys::{Function, Promise};

pub use config::DuelConfig;
pub use duel::{Duel, DuelError, IntegrityError, ReceiveOutcome};
pub use game::{
    AttackTarget, Card, CardId, CardType, Deck, DeckError, DuelEvent, DuelSession, FieldCard,
    FieldState, GameOutcome, GameResult, Intent, Phase, PlayerId, Rarity, ResultReason,
    RuleEngine, RuleError, Side, Zone,
};
pub use interaction::{GestureOutcome, GestureTracker, HitTarget, Point};
pub use protocol::{
    Action, ActionKind, ActionLog, IgnoreReason, InMemoryRoom, ProtocolError, RoomScope,
    Transport, TransportError,
};
pub use room::{MatchRecord, MatchResultSink, RoomData};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    telemetry::init_logging();
}

fn to_js_error<E: Serialize + std::fmt::Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

/// Forwards the final match record to a JS callback. The call runs as a microtask, after
/// the handle method that settled the duel has returned, so the callback may call back
/// into the handle.
struct JsResultSink {
    callback: Function,
}

impl MatchResultSink for JsResultSink {
    fn record_result(&mut self, record: &MatchRecord) {
        let value = match to_value(record) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "match record could not be converted");
                return;
            }
        };
        let callback = self.callback.clone();
        spawn_local(async move {
            if let Err(error) = callback.call1(&JsValue::NULL, &value) {
                warn!(?error, "result callback threw");
            }
        });
    }
}

/// Publishes through a JS function `(room, payload) => seq` backed by the realtime channel.
struct JsPublisher {
    callback: Function,
}

impl Transport for JsPublisher {
    fn publish(&mut self, room: &RoomScope, action: &Action) -> Result<u64, TransportError> {
        let payload = action.encode()?;
        let returned = self
            .callback
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(room.as_str()),
                &JsValue::from_str(&payload),
            )
            .map_err(|error| TransportError::Rejected(format!("{error:?}")))?;
        returned
            .as_f64()
            .map(|seq| seq as u64)
            .ok_or_else(|| TransportError::Rejected("publisher returned no sequence number".into()))
    }
}

/// One client's duel as seen from JavaScript. Network callbacks, timers and pointer
/// handlers all go through the same handle, so each sees the current state.
#[wasm_bindgen]
pub struct DuelHandle {
    duel: Rc<RefCell<Duel>>,
    gestures: GestureTracker,
    publisher: Option<JsPublisher>,
}

#[wasm_bindgen]
impl DuelHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(room_json: &str, config_json: Option<String>) -> Result<DuelHandle, JsValue> {
        let room: RoomData = serde_json::from_str(room_json).map_err(serde_to_js_error)?;
        room.host_deck.validate().map_err(to_js_error)?;
        room.guest_deck.validate().map_err(to_js_error)?;
        let config = match config_json {
            Some(json) => DuelConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => DuelConfig::default(),
        };
        let gestures = GestureTracker::new(&config);
        Ok(DuelHandle {
            duel: Rc::new(RefCell::new(Duel::new(room, config))),
            gestures,
            publisher: None,
        })
    }

    pub fn set_result_callback(&mut self, callback: Function) {
        self.duel
            .borrow_mut()
            .set_result_sink(Box::new(JsResultSink { callback }));
    }

    pub fn set_publisher(&mut self, callback: Function) {
        self.publisher = Some(JsPublisher { callback });
    }

    /// Applies a local intent and returns the action JSON. With a publisher installed the
    /// action is queued and published after anything still queued, and carries its room
    /// sequence number. If the publisher fails the action stays queued and is returned
    /// without a sequence number.
    pub fn submit_json(&mut self, intent_json: &str, now: f64) -> Result<String, JsValue> {
        let intent: Intent = serde_json::from_str(intent_json).map_err(serde_to_js_error)?;
        let mut duel = self.duel.borrow_mut();
        let Some(publisher) = self.publisher.as_mut() else {
            let action = duel.submit(intent, now as u64).map_err(to_js_error)?;
            return action.encode().map_err(serde_to_js_error);
        };
        let action = match duel.submit_and_publish(intent, publisher, now as u64) {
            Ok(action) => action,
            Err(DuelError::Rule(error)) => return Err(to_js_error(error)),
            Err(DuelError::Transport(error)) => {
                warn!(
                    %error,
                    pending = duel.pending_len(),
                    "action queued until the publisher recovers"
                );
                duel.action_log()
                    .last_pending()
                    .cloned()
                    .ok_or_else(|| serde_to_js_error(error))?
            }
        };
        action.encode().map_err(serde_to_js_error)
    }

    /// Publishes actions queued while the publisher was failing. Returns how many went out.
    pub fn flush_pending(&mut self) -> Result<usize, JsValue> {
        let Some(publisher) = self.publisher.as_mut() else {
            return Ok(0);
        };
        let sent = self
            .duel
            .borrow_mut()
            .flush_pending(publisher)
            .map_err(serde_to_js_error)?;
        Ok(sent.len())
    }

    /// Feeds one payload from the room subscription; never fails.
    pub fn receive_json(&mut self, raw: &str) -> Result<String, JsValue> {
        let outcome = self.duel.borrow_mut().receive(raw);
        to_json(&outcome)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_value(self.duel.borrow().session()).map_err(JsValue::from)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.duel.borrow().session())
    }

    pub fn take_events_json(&mut self) -> Result<String, JsValue> {
        let events = self.duel.borrow_mut().take_events();
        to_json(&events)
    }

    pub fn result(&self) -> Result<JsValue, JsValue> {
        to_value(&self.duel.borrow().result()).map_err(JsValue::from)
    }

    /// Records a link change. When the link comes back with a publisher installed, queued
    /// actions are flushed; a failed flush leaves them queued.
    pub fn set_link_status(&mut self, connected: bool, now: f64) {
        let mut duel = self.duel.borrow_mut();
        match self.publisher.as_mut() {
            Some(publisher) if connected => {
                if let Err(error) = duel.on_link_restored(publisher, now as u64) {
                    warn!(%error, pending = duel.pending_len(), "flush after reconnect failed");
                }
            }
            _ => duel.on_link_change(connected, now as u64),
        }
    }

    pub fn set_peer_presence(&mut self, present: bool, now: f64) {
        self.duel.borrow_mut().on_peer_presence(present, now as u64);
    }

    pub fn tick(&mut self, now: f64) -> Result<JsValue, JsValue> {
        let result = self.duel.borrow_mut().tick(now as u64);
        to_value(&result).map_err(JsValue::from)
    }

    /// Re-evaluates the disconnect policy after `delay_ms` and resolves with the result.
    pub fn schedule_presence_check(&self, delay_ms: u32) -> Promise {
        let duel = Rc::clone(&self.duel);
        future_to_promise(async move {
            TimeoutFuture::new(delay_ms).await;
            let result = duel.borrow_mut().tick(utils::now_ms());
            to_value(&result).map_err(JsValue::from)
        })
    }

    pub fn validate(&self) -> Result<(), JsValue> {
        self.duel.borrow().integrity_check().map_err(to_js_error)
    }

    pub fn pointer_down(
        &mut self,
        target: JsValue,
        x: f64,
        y: f64,
        now: f64,
    ) -> Result<(), JsValue> {
        let target: HitTarget = from_value(target).map_err(JsValue::from)?;
        let duel = self.duel.borrow();
        self.gestures.pointer_down(duel.session(), &target, Point::new(x, y), now as u64);
        Ok(())
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let duel = self.duel.borrow();
        self.gestures.pointer_move(duel.session(), Point::new(x, y));
    }

    pub fn poll_long_press(&mut self, now: f64) -> Result<JsValue, JsValue> {
        let outcome = self.gestures.poll_long_press(now as u64);
        to_value(&outcome).map_err(JsValue::from)
    }

    /// Resolves the gesture. An `intent` outcome is not applied here; pass it to
    /// `submit_json`.
    pub fn pointer_up(&mut self, target: JsValue, now: f64) -> Result<JsValue, JsValue> {
        let target: HitTarget = from_value(target).map_err(JsValue::from)?;
        let duel = self.duel.borrow();
        let outcome = self.gestures.pointer_up(duel.session(), &target, now as u64);
        to_value(&outcome).map_err(JsValue::from)
    }

    pub fn cancel_gesture(&mut self) -> Result<JsValue, JsValue> {
        to_value(&self.gestures.cancel()).map_err(JsValue::from)
    }
}

#[wasm_bindgen(js_name = "validateDeck")]
pub fn validate_deck(deck: JsValue) -> Result<(), JsValue> {
    let deck: Deck = from_value(deck).map_err(JsValue::from)?;
    deck.validate().map_err(to_js_error)
}

#[wasm_bindgen(js_name = "sampleDeck")]
pub fn sample_deck(prefix: &str, size: usize) -> Result<JsValue, JsValue> {
    to_value(&Deck::sample(prefix, size)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "decodeAction")]
pub fn decode_action(raw: &str) -> Result<JsValue, JsValue> {
    let action = Action::decode(raw).map_err(serde_to_js_error)?;
    to_value(&action).map_err(JsValue::from)
}
