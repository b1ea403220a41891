//! 随机操作序列下的牌数守恒与 Kaboo 单调性。

use proptest::prelude::*;

use super::{CardId, GamePhase, GameSettings, Player, Table, DECK_SIZE};

#[derive(Debug, Clone)]
enum Step {
    Draw(usize),
    DrawDiscard(usize),
    Swap(usize, usize),
    Discard(usize),
    Pair(usize, usize, usize),
    Resolve(usize, CardId),
    Confirm(usize),
    Decline(usize),
    Tap(usize),
    TapSelect(usize, CardId),
    TapConfirm(usize),
    TapGive(usize, CardId),
    TapSkip(usize),
    Kaboo(usize),
    EndTurn(usize),
    Wait(u64),
}

fn step() -> impl Strategy<Value = Step> {
    let seat = 0..3usize;
    let slot = 0..6usize;
    let card = 0..DECK_SIZE as CardId;
    prop_oneof![
        4 => seat.clone().prop_map(Step::Draw),
        1 => seat.clone().prop_map(Step::DrawDiscard),
        3 => (seat.clone(), slot.clone()).prop_map(|(p, s)| Step::Swap(p, s)),
        2 => seat.clone().prop_map(Step::Discard),
        1 => (seat.clone(), slot.clone(), slot).prop_map(|(p, a, b)| Step::Pair(p, a, b)),
        2 => (seat.clone(), card.clone()).prop_map(|(p, c)| Step::Resolve(p, c)),
        1 => seat.clone().prop_map(Step::Confirm),
        1 => seat.clone().prop_map(Step::Decline),
        1 => seat.clone().prop_map(Step::Tap),
        1 => (seat.clone(), card.clone()).prop_map(|(p, c)| Step::TapSelect(p, c)),
        1 => seat.clone().prop_map(Step::TapConfirm),
        1 => (seat.clone(), card).prop_map(|(p, c)| Step::TapGive(p, c)),
        1 => seat.clone().prop_map(Step::TapSkip),
        1 => seat.clone().prop_map(Step::Kaboo),
        3 => seat.prop_map(Step::EndTurn),
        2 => (0..12_000u64).prop_map(Step::Wait),
    ]
}

fn slot_card(table: &Table, player: usize, slot: usize) -> CardId {
    table
        .state()
        .players
        .get(player)
        .and_then(|p| p.cards.get(slot))
        .map(|card| card.id)
        .unwrap_or(CardId::MAX)
}

fn apply(table: &mut Table, step: &Step) {
    match *step {
        Step::Draw(p) => table.draw_card(p),
        Step::DrawDiscard(p) => table.draw_from_discard(p),
        Step::Swap(p, s) => {
            let card_id = slot_card(table, p, s);
            table.swap_card(p, card_id)
        }
        Step::Discard(p) => table.discard_held_card(p),
        Step::Pair(p, a, b) => {
            let (first, second) = (slot_card(table, p, a), slot_card(table, p, b));
            table.discard_pair(p, first, second)
        }
        Step::Resolve(p, c) => table.resolve_effect(p, c),
        Step::Confirm(p) => table.confirm_effect(p),
        Step::Decline(p) => table.decline_effect(p),
        Step::Tap(p) => table.activate_tap(p),
        Step::TapSelect(p, c) => table.tap_select_card(p, c),
        Step::TapConfirm(p) => table.confirm_tap_discard(p),
        Step::TapGive(p, c) => table.tap_swap_card(p, c),
        Step::TapSkip(p) => table.skip_tap_swap(p),
        Step::Kaboo(p) => table.call_kaboo(p),
        Step::EndTurn(p) => table.end_turn(p),
        Step::Wait(ms) => table.advance(ms),
    };
}

fn table(seed: u64) -> Table {
    let settings = GameSettings {
        pairs_rule: true,
        ..GameSettings::default()
    };
    let players = vec![
        Player::new(0, "Ada", "#e57373"),
        Player::new(1, "Ben", "#64b5f6"),
        Player::bot(2, "Bot 2", "#81c784"),
    ];
    let mut table = Table::new(settings, players, Some(seed)).expect("valid table");
    table.start_next_round();
    table.advance(5_000);
    table
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cards_are_conserved(seed in any::<u64>(), steps in prop::collection::vec(step(), 1..120)) {
        let mut table = table(seed);
        for step in &steps {
            apply(&mut table, step);
            prop_assert_eq!(table.state().total_cards(), DECK_SIZE, "after {:?}", step);
            prop_assert_eq!(table.state().integrity_check(), Ok(()), "after {:?}", step);
        }
    }

    #[test]
    fn kaboo_is_never_withdrawn(seed in any::<u64>(), steps in prop::collection::vec(step(), 1..120)) {
        let mut table = table(seed);
        for step in &steps {
            let round = table.state().round_number;
            let called = table.state().kaboo_called;
            apply(&mut table, step);
            let state = table.state();
            if called && state.round_number == round {
                prop_assert!(state.kaboo_called, "kaboo withdrawn by {:?}", step);
                prop_assert!(
                    matches!(state.game_phase, GamePhase::KabooFinal | GamePhase::Reveal),
                    "phase {:?} after kaboo", state.game_phase
                );
            }
        }
    }
}
