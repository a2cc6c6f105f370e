use duel_core::protocol::Subscription;
use duel_core::room::RecordingSink;
use duel_core::{
    Action, AttackTarget, Card, Deck, Duel, DuelConfig, DuelError, GameOutcome, IgnoreReason,
    InMemoryRoom, Intent, Phase, ReceiveOutcome, ResultReason, RoomData, RoomScope, RuleError,
    TransportError, Zone,
};

struct Table {
    room: InMemoryRoom,
    host: Duel,
    guest: Duel,
    host_sub: Subscription,
    guest_sub: Subscription,
    host_results: RecordingSink,
    guest_results: RecordingSink,
    clock: u64,
}

impl Table {
    fn new(host_deck: Deck, guest_deck: Deck, config: DuelConfig) -> Self {
        let room_data = RoomData {
            room_id: "room-42".into(),
            host_id: "host".into(),
            host_name: "Aki".into(),
            host_deck,
            guest_id: "guest".into(),
            guest_name: "Bea".into(),
            guest_deck,
            is_host: true,
        };
        let room = InMemoryRoom::new(RoomScope::new("room-42"));
        let host_results = RecordingSink::default();
        let guest_results = RecordingSink::default();
        let host = Duel::new(room_data.clone(), config.clone())
            .with_result_sink(Box::new(host_results.clone()));
        let guest = Duel::new(room_data.flipped(), config)
            .with_result_sink(Box::new(guest_results.clone()));
        Self {
            host_sub: room.subscribe(),
            guest_sub: room.subscribe(),
            room,
            host,
            guest,
            host_results,
            guest_results,
            clock: 1_000,
        }
    }

    fn standard() -> Self {
        Self::new(
            Deck::sample("host", 10),
            Deck::sample("guest", 10),
            DuelConfig::deterministic(),
        )
    }

    fn host(&mut self, intent: Intent) -> Action {
        self.clock += 1;
        self.host
            .submit_and_publish(intent, &mut self.room, self.clock)
            .expect("host intent should be accepted")
    }

    fn guest(&mut self, intent: Intent) -> Action {
        self.clock += 1;
        self.guest
            .submit_and_publish(intent, &mut self.room, self.clock)
            .expect("guest intent should be accepted")
    }

    /// Delivers everything pending to both clients; returns the guest's outcomes.
    fn pump(&mut self) -> Vec<ReceiveOutcome> {
        for raw in self.host_sub.poll() {
            self.host.receive(&raw);
        }
        self.guest_sub
            .poll()
            .iter()
            .map(|raw| self.guest.receive(raw))
            .collect()
    }

    fn assert_mirrored(&self) {
        let pairs = [
            (&self.host.session().my_field, &self.guest.session().opponent_field),
            (&self.host.session().opponent_field, &self.guest.session().my_field),
        ];
        for (real, mirror) in pairs {
            assert_eq!(real.life, mirror.life, "life diverged");
            assert_eq!(real.hand.len(), mirror.hand.len(), "hand size diverged");
            assert_eq!(real.deck.len(), mirror.deck.len(), "deck size diverged");
            let graveyard = |field: &duel_core::FieldState| {
                field.graveyard.iter().map(|card| card.id.clone()).collect::<Vec<_>>()
            };
            assert_eq!(graveyard(real), graveyard(mirror), "graveyard diverged");
            let units = |field: &duel_core::FieldState| {
                field
                    .unit_zone
                    .iter()
                    .enumerate()
                    .filter_map(|(slot, unit)| {
                        unit.as_ref()
                            .map(|unit| (slot, unit.card.id.clone(), unit.current_dp))
                    })
                    .collect::<Vec<_>>()
            };
            assert_eq!(units(real), units(mirror), "unit zone diverged");
        }
        assert_eq!(self.host.session().turn, self.guest.session().turn);
        assert_eq!(self.host.session().phase, self.guest.session().phase);
        assert_ne!(self.host.session().is_my_turn, self.guest.session().is_my_turn);
    }

    /// Host summons `host_card` on turn 1, guest optionally summons on turn 2, and the host
    /// is left in its battle phase on turn 3.
    fn to_host_battle(&mut self, host_card: &str, guest_card: Option<(&str, usize)>) {
        self.host(Intent::Draw);
        self.host(place(host_card, 0));
        self.host(Intent::EndTurn);
        self.pump();

        self.guest(Intent::Draw);
        if let Some((card_id, slot)) = guest_card {
            self.guest(place(card_id, slot));
        }
        self.guest(Intent::EndTurn);
        self.pump();

        self.host(Intent::Draw);
        self.host(Intent::AdvancePhase);
        self.pump();
        assert_eq!(self.host.session().phase, Phase::Battle);
        self.assert_mirrored();
    }
}

fn place(card_id: &str, slot: usize) -> Intent {
    Intent::PlaceCard {
        card_id: card_id.into(),
        zone: Zone::Unit,
        slot,
    }
}

#[test]
fn opening_state_is_mirrored_and_host_moves_first() {
    let table = Table::standard();
    assert!(table.host.session().is_my_turn);
    assert!(!table.guest.session().is_my_turn);
    assert_eq!(table.host.session().my_field.hand.len(), 5);
    table.assert_mirrored();
}

#[test]
fn freshly_summoned_unit_waits_for_the_next_own_turn() {
    let mut table = Table::standard();
    table.host(Intent::Draw);
    table.host(place("host-0#1", 0));
    table.host(Intent::AdvancePhase);

    let refused = table.host.submit(
        Intent::Attack {
            attacker_slot: 0,
            target: AttackTarget::Direct,
        },
        0,
    );
    assert_eq!(refused, Err(RuleError::AttackerNotReady { slot: 0 }));

    table.host(Intent::EndTurn);
    table.pump();
    table.assert_mirrored();

    table.guest(Intent::Draw);
    table.guest(Intent::EndTurn);
    table.pump();

    table.host(Intent::Draw);
    table.host(Intent::AdvancePhase);
    table.host(Intent::Attack {
        attacker_slot: 0,
        target: AttackTarget::Direct,
    });
    table.pump();

    assert_eq!(table.host.session().turn, 3);
    assert_eq!(table.guest.session().my_field.life, 19);
    assert_eq!(table.host.session().opponent_field.life, 19);
    table.assert_mirrored();
}

#[test]
fn weaker_attacker_dies_and_defender_keeps_the_difference() {
    let mut table = Table::standard();
    table.to_host_battle("host-2#1", Some(("guest-4#1", 1)));

    table.host(Intent::Attack {
        attacker_slot: 0,
        target: AttackTarget::Unit { slot: 1 },
    });
    table.pump();

    let host = table.host.session();
    assert!(host.my_field.unit(0).is_none());
    assert_eq!(host.my_field.graveyard[0].id, "host-2#1");
    assert_eq!(
        host.opponent_field.unit(1).map(|unit| unit.current_dp),
        Some(2)
    );

    let guest = table.guest.session();
    assert_eq!(guest.my_field.unit(1).map(|unit| unit.current_dp), Some(2));
    assert!(guest.opponent_field.unit(0).is_none());
    table.assert_mirrored();
}

#[test]
fn lethal_direct_attack_settles_both_ends() {
    let mut cards = vec![Card::unit("drake#1", "Ember Drake", 7)];
    cards.extend(Deck::sample("host", 9).cards);
    let host_deck = Deck::new("Dragons", cards).expect("ten cards is a legal deck");
    let config = DuelConfig {
        starting_life: 5,
        ..DuelConfig::deterministic()
    };
    let mut table = Table::new(host_deck, Deck::sample("guest", 10), config);
    table.to_host_battle("drake#1", None);

    table.host(Intent::Attack {
        attacker_slot: 0,
        target: AttackTarget::Direct,
    });
    table.pump();

    assert_eq!(table.guest.session().my_field.life, 0);
    let host_result = table.host.result().expect("host should have a result");
    assert_eq!(host_result.outcome, GameOutcome::Won);
    assert_eq!(host_result.reason, ResultReason::Combat);
    let guest_result = table.guest.result().expect("guest should have a result");
    assert_eq!(guest_result.outcome, GameOutcome::Lost);
    assert_eq!(guest_result.reason, ResultReason::Combat);

    let host_records = table.host_results.borrow();
    assert_eq!(host_records.len(), 1);
    assert_eq!(host_records[0].opponent_name, "Bea");
    assert_eq!(host_records[0].deck_used, "Dragons");
    assert_eq!(table.guest_results.borrow()[0].result, GameOutcome::Lost);
}

#[test]
fn attack_after_surrender_is_dropped_by_the_loser() {
    let mut table = Table::standard();
    table.to_host_battle("host-4#1", None);

    table.guest(Intent::Surrender);
    // Host has not seen the surrender yet.
    table.host(Intent::Attack {
        attacker_slot: 0,
        target: AttackTarget::Direct,
    });
    let outcomes = table.pump();

    assert_eq!(
        outcomes.last(),
        Some(&ReceiveOutcome::Ignored(IgnoreReason::Finished))
    );
    assert_eq!(table.guest.session().my_field.life, 20);
    let host_result = table.host.result().expect("host learns of the surrender");
    assert_eq!(host_result.outcome, GameOutcome::Won);
    assert_eq!(host_result.reason, ResultReason::Surrender);
    assert_eq!(
        table.guest.result().map(|result| result.outcome),
        Some(GameOutcome::Lost)
    );

    // Neither end can act any more, and no second record is written.
    assert_eq!(
        table.guest.submit(Intent::Surrender, 0),
        Err(RuleError::GameFinished)
    );
    assert_eq!(table.host.tick(u64::MAX), Some(host_result));
    assert_eq!(table.host_results.borrow().len(), 1);
    assert_eq!(table.guest_results.borrow().len(), 1);
}

#[test]
fn redelivered_action_is_applied_once() {
    let mut table = Table::standard();
    table.host(Intent::Draw);
    let placed = table.host(place("host-1#1", 2));
    table.pump();
    let hand_before = table.guest.session().opponent_field.hand.len();

    table
        .room
        .inject_raw(placed.encode().expect("action should encode"));
    let outcomes = table.pump();

    assert_eq!(
        outcomes,
        vec![ReceiveOutcome::Ignored(IgnoreReason::Duplicate {
            seq: placed.seq.unwrap_or_default(),
            last_seen: placed.seq.unwrap_or_default(),
        })]
    );
    assert_eq!(table.guest.session().opponent_field.hand.len(), hand_before);
    assert_eq!(table.guest.session().opponent_field.occupied_slots(), 1);
    table.assert_mirrored();
}

#[test]
fn moves_made_while_the_room_is_down_reach_the_peer_after_reconnect() {
    let mut table = Table::standard();
    table.room.close();
    table.clock += 1;
    let failed = table
        .host
        .submit_and_publish(Intent::Draw, &mut table.room, table.clock);
    assert!(matches!(
        failed,
        Err(DuelError::Transport(TransportError::Closed(_)))
    ));
    assert_eq!(table.host.session().my_field.hand.len(), 6);
    assert_eq!(table.host.pending_len(), 1);

    // The draw already happened locally, so a retry is refused rather than drawing twice.
    let retry = table.host.submit_and_publish(Intent::Draw, &mut table.room, 0);
    assert!(matches!(
        retry,
        Err(DuelError::Rule(RuleError::InvalidPhase {
            expected: Phase::Draw,
            actual: Phase::Main,
        }))
    ));
    assert!(table.pump().is_empty());
    assert_eq!(table.guest.session().opponent_field.hand.len(), 5);

    table.room.reopen();
    let placed = table.host(place("host-1#1", 0));
    assert_eq!(table.host.pending_len(), 0);
    let outcomes = table.pump();
    assert_eq!(outcomes, vec![ReceiveOutcome::Applied, ReceiveOutcome::Applied]);
    assert_eq!(
        table.guest.action_log().last_seen("host"),
        placed.seq
    );
    table.assert_mirrored();

    table.room.close();
    table.host.on_link_change(false, table.clock);
    let _ = table
        .host
        .submit_and_publish(Intent::EndTurn, &mut table.room, table.clock);
    table.room.reopen();
    let sent = table
        .host
        .on_link_restored(&mut table.room, table.clock)
        .expect("flush after reconnect");
    assert_eq!(sent.len(), 1);
    table.pump();
    assert!(table.guest.session().is_my_turn);
    table.assert_mirrored();
}

#[test]
fn garbage_on_the_channel_changes_nothing() {
    let mut table = Table::standard();
    let before = table.guest.session().clone();
    table.room.inject_raw("not json");
    table.room.inject_raw(r#"{"playerId":"host","timestamp":1}"#);

    let outcomes = table.pump();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| matches!(
        outcome,
        ReceiveOutcome::Ignored(IgnoreReason::Malformed { .. })
    )));
    assert_eq!(table.guest.session(), &before);
}

#[test]
fn full_rounds_keep_both_clients_consistent() {
    let mut table = Table::standard();
    table.to_host_battle("host-3#1", Some(("guest-1#1", 0)));
    table.host(Intent::Attack {
        attacker_slot: 0,
        target: AttackTarget::Unit { slot: 0 },
    });
    table.host(Intent::EndTurn);
    table.pump();
    table.assert_mirrored();

    table.guest(Intent::Draw);
    table.guest(place("guest-2#1", 3));
    table.guest(Intent::EndTurn);
    table.pump();
    table.assert_mirrored();

    assert!(table.host.integrity_check().is_ok());
    assert!(table.guest.integrity_check().is_ok());
    assert_eq!(table.host.session().turn, 5);
}
