//! 对局设置与时间常量。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::{BotConfig, BotDifficulty};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;
pub const ALLOWED_TURN_TIMERS: [u32; 3] = [15, 30, 60];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("player count {0} outside 2..=6")]
    PlayerCount(usize),
    #[error("turn timer must be one of 15, 30 or 60 seconds, got {0}")]
    TurnTimer(u32),
    #[error("target score must be positive")]
    TargetScore,
    #[error("timing value `{0}` must be positive")]
    Timing(&'static str),
}

/// 各阶段的计时窗口（毫秒）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timing {
    pub effect_timeout_ms: u64,
    pub tap_window_ms: u64,
    pub peek_reveal_ms: u64,
    pub kaboo_banner_ms: u64,
    pub bot_think_ms: u64,
    pub initial_look_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            effect_timeout_ms: 10_000,
            tap_window_ms: 3_000,
            peek_reveal_ms: 2_000,
            kaboo_banner_ms: 3_000,
            bot_think_ms: 1_200,
            initial_look_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    /// 人类玩家回合计时（秒）。
    pub turn_timer: u32,
    pub target_score: i32,
    pub bot_difficulty: BotDifficulty,
    pub player_count: usize,
    pub effect_cards: bool,
    /// 允许一次弃掉两张同点数手牌。
    pub pairs_rule: bool,
    pub timing: Timing,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            turn_timer: 30,
            target_score: 100,
            bot_difficulty: BotDifficulty::Medium,
            player_count: 4,
            effect_cards: true,
            pairs_rule: false,
            timing: Timing::default(),
        }
    }
}

impl GameSettings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: GameSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.player_count) {
            return Err(ConfigError::PlayerCount(self.player_count));
        }
        if !ALLOWED_TURN_TIMERS.contains(&self.turn_timer) {
            return Err(ConfigError::TurnTimer(self.turn_timer));
        }
        if self.target_score <= 0 {
            return Err(ConfigError::TargetScore);
        }
        let timing = &self.timing;
        for (name, value) in [
            ("effect_timeout_ms", timing.effect_timeout_ms),
            ("tap_window_ms", timing.tap_window_ms),
            ("peek_reveal_ms", timing.peek_reveal_ms),
            ("kaboo_banner_ms", timing.kaboo_banner_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Timing(name));
            }
        }
        if !BotConfig::from_difficulty(self.bot_difficulty).is_valid() {
            return Err(ConfigError::Timing("bot tap delay"));
        }
        Ok(())
    }

    pub fn turn_timer_ms(&self) -> u64 {
        u64::from(self.turn_timer) * 1_000
    }

    pub fn with_players(mut self, player_count: usize) -> Self {
        self.player_count = player_count;
        self
    }

    pub fn with_difficulty(mut self, difficulty: BotDifficulty) -> Self {
        self.bot_difficulty = difficulty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings = GameSettings::from_json(r#"{"player_count": 2, "pairs_rule": true}"#)
            .expect("settings should parse");
        assert_eq!(settings.player_count, 2);
        assert!(settings.pairs_rule);
        assert!(settings.effect_cards);
        assert_eq!(settings.timing.tap_window_ms, 3_000);
        assert_eq!(settings.turn_timer_ms(), 30_000);
    }

    #[test]
    fn difficulty_accepts_lowercase_names() {
        let settings = GameSettings::from_json(r#"{"bot_difficulty": "hard"}"#)
            .expect("settings should parse");
        assert_eq!(settings.bot_difficulty, BotDifficulty::Hard);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            GameSettings::from_json(r#"{"player_count": 9}"#),
            Err(ConfigError::PlayerCount(9))
        ));
        assert!(matches!(
            GameSettings::from_json(r#"{"turn_timer": 45}"#),
            Err(ConfigError::TurnTimer(45))
        ));
        assert!(matches!(
            GameSettings::from_json(r#"{"target_score": 0}"#),
            Err(ConfigError::TargetScore)
        ));
        assert!(matches!(
            GameSettings::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
