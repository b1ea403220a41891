//! 游戏核心逻辑模块（状态机、规则引擎、抢拍与计分）。

pub mod cards;
pub mod effects;
pub mod rules;
pub mod scoring;
pub mod settings;
pub mod state;
pub mod table;
pub mod tap;
pub mod timers;
pub mod view;

#[cfg(test)]
mod tests_props;

pub use cards::{
    card_value, create_deck, effect_for_rank, hand_value, shuffle_deck, shuffled_deck, Card,
    CardId, Rank, Suit, DECK_SIZE, HAND_SIZE,
};
pub use effects::{ActiveEffect, EffectEngine, EffectStep, EffectType};
pub use rules::{RuleEngine, RuleError};
pub use scoring::{
    apply_kaboo_penalty, is_match_over, match_winners, resolve_round, round_scores, RoundResult,
    KABOO_PENALTY,
};
pub use settings::{ConfigError, GameSettings, Timing, MAX_PLAYERS, MIN_PLAYERS};
pub use state::{
    CardLocation, EngineState, GameEvent, GamePhase, IntegrityError, Player, PlayerId,
    RoundEndReason, TurnPhase,
};
pub use table::{Table, TableAction, TimerKind};
pub use tap::{TapEngine, TapPhase, TapState};
pub use timers::{FiredTimer, Scheduler, TimerId};
pub use view::{CardView, PlayerView, SeatView, TapView};
