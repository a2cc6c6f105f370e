use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::action::{Action, ProtocolError};

/// Per-room channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomScope(pub String);

impl RoomScope {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self(room_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("room `{0}` is closed")]
    Closed(String),
    #[error("publish to `{requested}` on a channel scoped to `{scope}`")]
    WrongRoom { requested: String, scope: String },
    #[error("channel rejected publish: {0}")]
    Rejected(String),
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Outbound half of the realtime channel: ordered, at-least-once, room-scoped. Publishing
/// assigns the room sequence number and fans the action out to every subscriber, the sender
/// included.
pub trait Transport {
    fn publish(&mut self, room: &RoomScope, action: &Action) -> Result<u64, TransportError>;
}

#[derive(Debug)]
struct RoomLog {
    scope: RoomScope,
    next_seq: u64,
    entries: Vec<String>,
    closed: bool,
}

/// Single-threaded in-memory room: an append-only list of wire payloads that subscribers
/// read with their own cursor.
#[derive(Debug, Clone)]
pub struct InMemoryRoom {
    inner: Rc<RefCell<RoomLog>>,
}

impl InMemoryRoom {
    pub fn new(scope: RoomScope) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RoomLog {
                scope,
                next_seq: 0,
                entries: Vec::new(),
                closed: false,
            })),
        }
    }

    pub fn scope(&self) -> RoomScope {
        self.inner.borrow().scope.clone()
    }

    /// A subscriber that starts at the current end of the log.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            room: self.clone(),
            cursor: self.inner.borrow().entries.len(),
        }
    }

    /// Appends a raw payload as-is, bypassing sequencing. Lets callers model redelivery or
    /// garbage on the wire.
    pub fn inject_raw(&self, raw: impl Into<String>) {
        self.inner.borrow_mut().entries.push(raw.into());
    }

    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }

    pub fn reopen(&self) {
        self.inner.borrow_mut().closed = false;
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for InMemoryRoom {
    fn publish(&mut self, room: &RoomScope, action: &Action) -> Result<u64, TransportError> {
        let mut log = self.inner.borrow_mut();
        if log.closed {
            return Err(TransportError::Closed(log.scope.0.clone()));
        }
        if &log.scope != room {
            return Err(TransportError::WrongRoom {
                requested: room.0.clone(),
                scope: log.scope.0.clone(),
            });
        }
        log.next_seq += 1;
        let seq = log.next_seq;
        let payload = action.clone().with_seq(seq).encode()?;
        debug!(room = %log.scope.0, seq, action = action.kind.name(), "published");
        log.entries.push(payload);
        Ok(seq)
    }
}

/// Read cursor over an [`InMemoryRoom`].
#[derive(Debug, Clone)]
pub struct Subscription {
    room: InMemoryRoom,
    cursor: usize,
}

impl Subscription {
    /// Everything appended since the last poll, in log order.
    pub fn poll(&mut self) -> Vec<String> {
        let log = self.room.inner.borrow();
        let fresh = log.entries[self.cursor..].to_vec();
        self.cursor = log.entries.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ActionKind;

    #[test]
    fn publish_assigns_monotonic_sequence_across_senders() {
        let scope = RoomScope::new("room-1");
        let mut room = InMemoryRoom::new(scope.clone());
        let mut reader = room.subscribe();

        let a = room
            .publish(&scope, &Action::new("host", ActionKind::Draw, 1))
            .expect("publish");
        let b = room
            .publish(&scope, &Action::new("guest", ActionKind::Draw, 2))
            .expect("publish");
        assert!(b > a);

        let delivered: Vec<Action> = reader
            .poll()
            .iter()
            .map(|raw| Action::decode(raw).expect("decode"))
            .collect();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].seq, Some(a));
        assert_eq!(delivered[1].player_id, "guest");
        assert!(reader.poll().is_empty());
    }

    #[test]
    fn publish_is_room_scoped_and_fails_when_closed() {
        let mut room = InMemoryRoom::new(RoomScope::new("room-1"));
        let action = Action::new("host", ActionKind::Surrender, 1);
        assert!(matches!(
            room.publish(&RoomScope::new("room-2"), &action),
            Err(TransportError::WrongRoom { .. })
        ));
        room.close();
        assert!(matches!(
            room.publish(&RoomScope::new("room-1"), &action),
            Err(TransportError::Closed(_))
        ));
        assert!(room.is_empty());
    }
}
