//! Wire contract for one player's moves and the receive-side rules for replaying them.

pub mod action;
pub mod log;
pub mod transport;

pub use action::{Action, ActionKind, ProtocolError};
pub use log::{ActionLog, IgnoreReason};
pub use transport::{InMemoryRoom, RoomScope, Subscription, Transport, TransportError};
