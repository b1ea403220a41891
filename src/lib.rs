pub mod ai;
pub mod game;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{BotAgent, BotConfig, BotDifficulty, BotMemory};
pub use game::{
    create_deck, hand_value, Card, CardId, ConfigError, EffectType, EngineState, GameEvent,
    GamePhase, GameSettings, Player, PlayerView, Rank, RuleEngine, RuleError, Suit, Table,
    TableAction, TurnPhase,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// 前端传入的 JSON 有误时同时打到浏览器控制台。
fn decode_to_js_error<E: std::fmt::Display>(context: &str, error: E) -> JsValue {
    let message = format!("{context}: {error}");
    web_sys::console::warn_1(&message.clone().into());
    JsValue::from_str(&message)
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

#[derive(Serialize)]
struct ActionResponse<'a> {
    events: &'a [GameEvent],
    view: PlayerView,
}

fn respond(table: &Table, viewer: usize, events: &[GameEvent]) -> Result<String, JsValue> {
    let response = ActionResponse {
        events,
        view: table.view_for(viewer),
    };
    serde_json::to_string(&response).map_err(serde_to_js_error)
}

/// 单人对战机器人的牌桌，人类玩家坐 0 号位。
#[wasm_bindgen]
pub struct KabooEngine {
    table: Rc<RefCell<Table>>,
    viewer: usize,
}

#[wasm_bindgen]
impl KabooEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        settings_json: Option<String>,
        human_name: Option<String>,
        seed: Option<u32>,
    ) -> Result<KabooEngine, JsValue> {
        let settings = match settings_json {
            Some(json) => GameSettings::from_json(&json)
                .map_err(|error| decode_to_js_error("invalid settings", error))?,
            None => GameSettings::default(),
        };
        let name = human_name.unwrap_or_else(|| "You".to_string());
        let table = Table::with_bots(settings, &name, seed.map(u64::from))
            .map_err(|error| decode_to_js_error("invalid table", error))?;
        Ok(KabooEngine {
            table: Rc::new(RefCell::new(table)),
            viewer: 0,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        self.with_table(|table| serde_json::to_string(table.state()).map_err(serde_to_js_error))
    }

    pub fn view_json(&self, viewer: Option<usize>) -> Result<String, JsValue> {
        let viewer = viewer.unwrap_or(self.viewer);
        self.with_table(|table| serde_json::to_string(&table.view_for(viewer)).map_err(serde_to_js_error))
    }

    pub fn turn_log_json(&self) -> Result<String, JsValue> {
        self.with_table(|table| serde_json::to_string(&table.turn_log()).map_err(serde_to_js_error))
    }

    pub fn settings_json(&self) -> Result<String, JsValue> {
        self.with_table(|table| serde_json::to_string(table.settings()).map_err(serde_to_js_error))
    }

    /// 执行一个 `TableAction`，返回事件与最新视图。无效动作返回空事件列表。
    pub fn act_json(&self, action_json: &str) -> Result<String, JsValue> {
        let action: TableAction = serde_json::from_str(action_json)
            .map_err(|error| decode_to_js_error("invalid action", error))?;
        self.act(action)
    }

    pub fn start_next_round(&self) -> Result<String, JsValue> {
        self.act(TableAction::StartNextRound)
    }

    pub fn reset_match(&self) -> Result<String, JsValue> {
        self.act(TableAction::ResetMatch)
    }

    pub fn draw_card(&self) -> Result<String, JsValue> {
        self.act(TableAction::DrawCard { player: self.viewer })
    }

    pub fn end_turn(&self) -> Result<String, JsValue> {
        self.act(TableAction::EndTurn { player: self.viewer })
    }

    pub fn call_kaboo(&self) -> Result<String, JsValue> {
        self.act(TableAction::CallKaboo { player: self.viewer })
    }

    pub fn advance(&self, elapsed_ms: u32) -> Result<String, JsValue> {
        self.act(TableAction::Advance {
            ms: u64::from(elapsed_ms),
        })
    }

    /// 真实等待 `delay_ms` 后推进同样长的虚拟时间。
    pub fn advance_after(&self, delay_ms: u32) -> Promise {
        let table = Rc::clone(&self.table);
        let viewer = self.viewer;
        future_to_promise(async move {
            if delay_ms > 0 {
                TimeoutFuture::new(delay_ms).await;
            }
            let mut table = table.try_borrow_mut().map_err(serde_to_js_error)?;
            let events = table.advance(u64::from(delay_ms));
            let json = respond(&table, viewer, &events)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn now_ms(&self) -> Result<f64, JsValue> {
        self.with_table(|table| Ok(table.now_ms() as f64))
    }
}

impl KabooEngine {
    fn with_table<T>(&self, f: impl FnOnce(&mut Table) -> Result<T, JsValue>) -> Result<T, JsValue> {
        let mut table = self.table.try_borrow_mut().map_err(serde_to_js_error)?;
        f(&mut table)
    }

    fn act(&self, action: TableAction) -> Result<String, JsValue> {
        let viewer = self.viewer;
        self.with_table(|table| {
            let events = table.apply(action);
            respond(table, viewer, &events)
        })
    }
}

/// 返回一副未洗的新牌。
#[wasm_bindgen(js_name = "createDeck")]
pub fn create_deck_js() -> Result<JsValue, JsValue> {
    to_value(&create_deck()).map_err(JsValue::from)
}

/// 计算一手牌的分数（红 K 为 0，J/Q/K 为 11/12/13）。
#[wasm_bindgen(js_name = "scoreHand")]
pub fn score_hand(cards: JsValue) -> Result<i32, JsValue> {
    let cards: Vec<Card> = from_value(cards).map_err(JsValue::from)?;
    Ok(hand_value(&cards))
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: EngineState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
