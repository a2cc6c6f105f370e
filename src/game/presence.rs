use serde::{Deserialize, Serialize};

use super::state::GameOutcome;

/// Disconnect policy. There is no resync handshake, so a duel whose link stays broken past
/// the grace period is settled as a forfeit: the side that lost its own link loses, the side
/// that still has a link but no peer wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceMonitor {
    grace_ms: Option<u64>,
    link_down_since: Option<u64>,
    peer_absent_since: Option<u64>,
}

impl PresenceMonitor {
    pub fn new(grace_ms: Option<u64>) -> Self {
        Self {
            grace_ms,
            link_down_since: None,
            peer_absent_since: None,
        }
    }

    pub fn on_link_change(&mut self, connected: bool, now_ms: u64) {
        if connected {
            self.link_down_since = None;
        } else if self.link_down_since.is_none() {
            self.link_down_since = Some(now_ms);
        }
    }

    pub fn on_peer_presence(&mut self, present: bool, now_ms: u64) {
        if present {
            self.peer_absent_since = None;
        } else if self.peer_absent_since.is_none() {
            self.peer_absent_since = Some(now_ms);
        }
    }

    /// Any delivered remote action proves the peer is alive.
    pub fn peer_seen(&mut self) {
        self.peer_absent_since = None;
    }

    pub fn is_link_up(&self) -> bool {
        self.link_down_since.is_none()
    }

    /// Forfeit verdict at `now_ms`, if the grace period has run out.
    pub fn check(&self, now_ms: u64) -> Option<GameOutcome> {
        let grace = self.grace_ms?;
        let expired = |since: Option<u64>| since.is_some_and(|t| now_ms.saturating_sub(t) >= grace);
        if expired(self.link_down_since) {
            return Some(GameOutcome::Lost);
        }
        if self.is_link_up() && expired(self.peer_absent_since) {
            return Some(GameOutcome::Won);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_absence_past_grace_is_a_win() {
        let mut monitor = PresenceMonitor::new(Some(1_000));
        monitor.on_peer_presence(false, 10);
        assert_eq!(monitor.check(500), None);
        assert_eq!(monitor.check(1_010), Some(GameOutcome::Won));

        monitor.peer_seen();
        assert_eq!(monitor.check(5_000), None);
    }

    #[test]
    fn own_link_loss_wins_over_peer_absence() {
        let mut monitor = PresenceMonitor::new(Some(1_000));
        monitor.on_peer_presence(false, 0);
        monitor.on_link_change(false, 100);
        assert_eq!(monitor.check(1_050), None, "no peer verdict while our own link is down");
        assert_eq!(monitor.check(1_100), Some(GameOutcome::Lost));

        monitor.on_link_change(true, 1_200);
        assert_eq!(monitor.check(1_300), Some(GameOutcome::Won));
    }

    #[test]
    fn repeated_disconnect_keeps_first_timestamp() {
        let mut monitor = PresenceMonitor::new(Some(100));
        monitor.on_link_change(false, 0);
        monitor.on_link_change(false, 90);
        assert_eq!(monitor.check(100), Some(GameOutcome::Lost));
    }

    #[test]
    fn disabled_policy_never_fires() {
        let mut monitor = PresenceMonitor::new(None);
        monitor.on_link_change(false, 0);
        assert_eq!(monitor.check(u64::MAX), None);
    }
}
