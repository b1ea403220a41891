use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Easy,
    #[serde(alias = "normal")]
    Medium,
    Hard,
}

impl Default for BotDifficulty {
    fn default() -> Self {
        BotDifficulty::Medium
    }
}

impl FromStr for BotDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(BotDifficulty::Easy),
            "medium" | "normal" => Ok(BotDifficulty::Medium),
            "hard" => Ok(BotDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// 机器人难度参数。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// 开局偷看的手牌数。
    pub initial_peek_count: usize,
    /// 每次回忆时记忆仍然可靠的概率。
    pub memory_reliability: f64,
    /// 超过这么多回合的记忆会被遗忘，`None` 表示永不遗忘。
    pub memory_decay_turns: Option<u32>,
    /// 抽到不高于此值的牌一律换入。
    pub low_swap_threshold: i32,
    /// 中等牌至少比已知最差牌低这么多才换入。
    pub swap_margin: i32,
    pub gamble_on_unknown: bool,
    pub effect_use_chance: f64,
    pub kaboo_min_turn: u32,
    pub kaboo_threshold_all_known: i32,
    pub kaboo_threshold_partial: i32,
    pub kaboo_call_chance: f64,
    pub tap_chance: f64,
    pub tap_min_delay_ms: u64,
    pub tap_max_delay_ms: u64,
}

impl BotConfig {
    pub fn from_difficulty(difficulty: BotDifficulty) -> Self {
        match difficulty {
            BotDifficulty::Easy => Self {
                initial_peek_count: 1,
                memory_reliability: 0.6,
                memory_decay_turns: Some(5),
                low_swap_threshold: 2,
                swap_margin: 4,
                gamble_on_unknown: false,
                effect_use_chance: 0.3,
                kaboo_min_turn: 10,
                kaboo_threshold_all_known: 9,
                kaboo_threshold_partial: 7,
                kaboo_call_chance: 0.5,
                tap_chance: 0.3,
                tap_min_delay_ms: 1_500,
                tap_max_delay_ms: 3_000,
            },
            BotDifficulty::Medium => Self {
                initial_peek_count: 2,
                memory_reliability: 0.85,
                memory_decay_turns: Some(10),
                low_swap_threshold: 3,
                swap_margin: 2,
                gamble_on_unknown: false,
                effect_use_chance: 0.7,
                kaboo_min_turn: 8,
                kaboo_threshold_all_known: 11,
                kaboo_threshold_partial: 9,
                kaboo_call_chance: 0.75,
                tap_chance: 0.6,
                tap_min_delay_ms: 800,
                tap_max_delay_ms: 2_000,
            },
            BotDifficulty::Hard => Self {
                initial_peek_count: 2,
                memory_reliability: 1.0,
                memory_decay_turns: None,
                low_swap_threshold: 4,
                swap_margin: 1,
                gamble_on_unknown: true,
                effect_use_chance: 0.95,
                kaboo_min_turn: 6,
                kaboo_threshold_all_known: 13,
                kaboo_threshold_partial: 10,
                kaboo_call_chance: 0.9,
                tap_chance: 0.9,
                tap_min_delay_ms: 200,
                tap_max_delay_ms: 900,
            },
        }
    }

    pub fn with_memory_decay(mut self, turns: Option<u32>) -> Self {
        self.memory_decay_turns = turns;
        self
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.memory_reliability = reliability.clamp(0.0, 1.0);
        self
    }

    /// 延时区间有序、概率在 [0, 1] 内。
    pub fn is_valid(&self) -> bool {
        let probability = |value: f64| (0.0..=1.0).contains(&value);
        self.tap_min_delay_ms <= self.tap_max_delay_ms
            && probability(self.memory_reliability)
            && probability(self.effect_use_chance)
            && probability(self.kaboo_call_chance)
            && probability(self.tap_chance)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig::from_difficulty(BotDifficulty::Medium)
    }
}
