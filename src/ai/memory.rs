//! 机器人对桌面牌值的记忆，按牌 id 记录，与牌当前的位置无关。

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::difficulty::BotConfig;
use crate::game::CardId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryFact {
    pub value: i32,
    pub turn_learned: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotMemory {
    facts: HashMap<CardId, MemoryFact>,
}

impl BotMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, card_id: CardId, value: i32, turn: u32) {
        self.facts.insert(
            card_id,
            MemoryFact {
                value,
                turn_learned: turn,
            },
        );
    }

    pub fn forget(&mut self, card_id: CardId) {
        self.facts.remove(&card_id);
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    fn expired(fact: &MemoryFact, turn: u32, decay: Option<u32>) -> bool {
        match decay {
            Some(window) => turn.saturating_sub(fact.turn_learned) > window,
            None => false,
        }
    }

    /// 不掷骰子的查询：只考虑遗忘窗口。
    pub fn knows(&self, card_id: CardId, turn: u32, decay: Option<u32>) -> Option<i32> {
        self.facts
            .get(&card_id)
            .filter(|fact| !Self::expired(fact, turn, decay))
            .map(|fact| fact.value)
    }

    /// 回忆一张牌。超过遗忘窗口，或可靠性检定失败，记忆都会被永久抹去。
    pub fn recall<R: Rng + ?Sized>(
        &mut self,
        card_id: CardId,
        turn: u32,
        config: &BotConfig,
        rng: &mut R,
    ) -> Option<i32> {
        let fact = *self.facts.get(&card_id)?;
        if Self::expired(&fact, turn, config.memory_decay_turns) {
            self.facts.remove(&card_id);
            return None;
        }
        if config.memory_reliability < 1.0 && !rng.gen_bool(config.memory_reliability.clamp(0.0, 1.0)) {
            self.facts.remove(&card_id);
            return None;
        }
        Some(fact.value)
    }
}
