#![cfg(target_arch = "wasm32")]

use kaboo_core::{GamePhase, KabooEngine, PlayerView};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn engine_deals_and_hides_opponent_cards() {
    let engine = KabooEngine::new(None, Some("Ada".into()), Some(7)).expect("engine");
    engine.start_next_round().expect("round starts");

    let view: PlayerView = serde_json::from_str(&engine.view_json(None).expect("view")).expect("view json");
    assert_eq!(view.game_phase, GamePhase::InitialLook);
    assert!(view.seats[1].cards.iter().all(|card| !card.is_known()));

    engine.advance(5_000).expect("advance");
    let view: PlayerView = serde_json::from_str(&engine.view_json(None).expect("view")).expect("view json");
    assert_eq!(view.game_phase, GamePhase::Playing);
}

#[wasm_bindgen_test]
fn bad_action_json_is_rejected() {
    let engine = KabooEngine::new(None, None, Some(1)).expect("engine");
    assert!(engine.act_json("{\"type\":\"fly\"}").is_err());
}
