use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::difficulty::BotConfig;
use super::memory::BotMemory;
use crate::game::{Card, CardId, EffectType, EngineState, GamePhase, Rank};

/// 不记得的牌按这个值估算。
pub const UNKNOWN_CARD_ESTIMATE: i32 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawChoice {
    DrawPile,
    Discard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayDecision {
    Swap { card_id: CardId },
    Discard,
}

/// 效果的第一步选择。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectPlan {
    Peek { card_id: CardId },
    /// 半盲换：先翻开一张对手的牌，再决定是否交换。
    Reveal { card_id: CardId },
    Swap { own: CardId, target: CardId },
    Decline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TapPlan {
    pub cards: Vec<CardId>,
    pub delay_ms: u64,
}

/// 手牌中一张牌和机器人对它的估值。
#[derive(Debug, Clone, Copy)]
struct Belief {
    card_id: CardId,
    value: Option<i32>,
}

impl Belief {
    fn estimate(&self) -> i32 {
        self.value.unwrap_or(UNKNOWN_CARD_ESTIMATE)
    }
}

/// 记住的牌值是否与点数一致。红 K 记作 0。
fn value_matches_rank(value: i32, rank: Rank) -> bool {
    value == rank.pips() || (rank == Rank::King && value == 0)
}

pub struct BotAgent {
    config: BotConfig,
    rng: SmallRng,
}

impl BotAgent {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: BotConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn read_hand(&mut self, state: &EngineState, seat: usize, memory: &mut BotMemory) -> Vec<Belief> {
        let Some(player) = state.players.get(seat) else {
            return Vec::new();
        };
        let turn = state.turn_number;
        let mut beliefs = Vec::with_capacity(player.cards.len());
        for card in &player.cards {
            let value = if card.face_up {
                Some(card.value())
            } else {
                memory.recall(card.id, turn, &self.config, &mut self.rng)
            };
            beliefs.push(Belief {
                card_id: card.id,
                value,
            });
        }
        beliefs
    }

    fn worst_known(hand: &[Belief]) -> Option<(CardId, i32)> {
        hand.iter()
            .filter_map(|belief| belief.value.map(|value| (belief.card_id, value)))
            .max_by_key(|(_, value)| *value)
    }

    /// 已知值或估值最大的一张。
    fn worst_estimated(hand: &[Belief]) -> Option<CardId> {
        hand.iter()
            .max_by_key(|belief| belief.estimate())
            .map(|belief| belief.card_id)
    }

    fn first_unknown(hand: &[Belief]) -> Option<CardId> {
        hand.iter()
            .find(|belief| belief.value.is_none())
            .map(|belief| belief.card_id)
    }

    fn opponent_cards(state: &EngineState, seat: usize) -> Vec<CardId> {
        state
            .players
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != seat)
            .flat_map(|(_, player)| player.cards.iter().map(|card| card.id))
            .collect()
    }

    /// 开局要看的格位：先看靠近自己的两张。
    pub fn choose_initial_peeks(&self, state: &EngineState, seat: usize) -> Vec<CardId> {
        let Some(player) = state.players.get(seat) else {
            return Vec::new();
        };
        [2usize, 3, 0, 1]
            .iter()
            .filter_map(|slot| player.cards.get(*slot))
            .take(self.config.initial_peek_count)
            .map(|card| card.id)
            .collect()
    }

    /// 弃牌堆顶足够小且能替换掉更差的牌时拿弃牌，否则抽新牌。
    pub fn choose_draw_source(
        &mut self,
        state: &EngineState,
        seat: usize,
        memory: &mut BotMemory,
    ) -> DrawChoice {
        let Some(top) = state.top_discard() else {
            return DrawChoice::DrawPile;
        };
        if state.draw_pile.is_empty() {
            return DrawChoice::Discard;
        }
        let value = top.value();
        if value > self.config.low_swap_threshold {
            return DrawChoice::DrawPile;
        }
        let hand = self.read_hand(state, seat, memory);
        let improves = Self::worst_known(&hand)
            .map(|(_, worst)| worst > value)
            .unwrap_or(false);
        if improves || (self.config.gamble_on_unknown && Self::first_unknown(&hand).is_some()) {
            DrawChoice::Discard
        } else {
            DrawChoice::DrawPile
        }
    }

    pub fn decide_drawn_card(
        &mut self,
        state: &EngineState,
        seat: usize,
        memory: &mut BotMemory,
        drawn: &Card,
        from_discard: bool,
    ) -> PlayDecision {
        let value = drawn.value();
        let hand = self.read_hand(state, seat, memory);
        let worst = Self::worst_known(&hand);

        if value <= self.config.low_swap_threshold {
            if let Some((card_id, worst_value)) = worst.filter(|(_, worst_value)| *worst_value > value) {
                debug!(seat, value, worst_value, "swapping out worst known card");
                return PlayDecision::Swap { card_id };
            }
            if self.config.gamble_on_unknown {
                if let Some(card_id) = Self::first_unknown(&hand) {
                    return PlayDecision::Swap { card_id };
                }
            }
        }

        if let Some((card_id, worst_value)) = worst {
            if worst_value - value >= self.config.swap_margin {
                return PlayDecision::Swap { card_id };
            }
        }

        // 拿了弃牌就一定换进手里。
        if from_discard {
            let slot = worst
                .map(|(card_id, _)| card_id)
                .or_else(|| Self::first_unknown(&hand));
            if let Some(card_id) = slot {
                return PlayDecision::Swap { card_id };
            }
        }

        if drawn.effect() != EffectType::None && !self.chance(self.config.effect_use_chance) {
            if let Some((card_id, worst_value)) = worst {
                if worst_value > value {
                    return PlayDecision::Swap { card_id };
                }
            }
        }
        PlayDecision::Discard
    }

    /// 已知的牌加上未知牌的估值，低于阈值时按概率叫 Kaboo。
    pub fn should_call_kaboo(&mut self, state: &EngineState, seat: usize, memory: &mut BotMemory) -> bool {
        if state.kaboo_called || state.game_phase != GamePhase::Playing {
            return false;
        }
        if state.turn_number < self.config.kaboo_min_turn {
            return false;
        }
        let hand = self.read_hand(state, seat, memory);
        let unknown = hand.iter().filter(|belief| belief.value.is_none()).count();
        let estimate: i32 = hand.iter().map(Belief::estimate).sum();
        let threshold = match unknown {
            0 => self.config.kaboo_threshold_all_known,
            1 => self.config.kaboo_threshold_partial,
            _ => return false,
        };
        if estimate > threshold {
            return false;
        }
        let call = self.chance(self.config.kaboo_call_chance);
        debug!(seat, estimate, threshold, unknown, call, "kaboo considered");
        call
    }

    pub fn plan_effect(
        &mut self,
        state: &EngineState,
        seat: usize,
        memory: &mut BotMemory,
        effect: EffectType,
    ) -> EffectPlan {
        if effect == EffectType::None || !self.chance(self.config.effect_use_chance) {
            return EffectPlan::Decline;
        }
        let turn = state.turn_number;
        let decay = self.config.memory_decay_turns;
        let opponents = Self::opponent_cards(state, seat);
        let unseen_opponents: Vec<CardId> = opponents
            .iter()
            .copied()
            .filter(|card_id| memory.knows(*card_id, turn, decay).is_none())
            .collect();

        match effect {
            EffectType::None => EffectPlan::Decline,
            EffectType::PeekOwn => {
                let hand = self.read_hand(state, seat, memory);
                let unknown: Vec<CardId> = hand
                    .iter()
                    .filter(|belief| belief.value.is_none())
                    .map(|belief| belief.card_id)
                    .collect();
                let all: Vec<CardId> = hand.iter().map(|belief| belief.card_id).collect();
                match self.pick(&unknown, &all) {
                    Some(card_id) => EffectPlan::Peek { card_id },
                    None => EffectPlan::Decline,
                }
            }
            EffectType::PeekOpponent => match self.pick(&unseen_opponents, &opponents) {
                Some(card_id) => EffectPlan::Peek { card_id },
                None => EffectPlan::Decline,
            },
            EffectType::SemiBlindSwap => match opponents.choose(&mut self.rng) {
                Some(card_id) => EffectPlan::Reveal { card_id: *card_id },
                None => EffectPlan::Decline,
            },
            EffectType::BlindSwap | EffectType::FullVisionSwap => {
                let hand = self.read_hand(state, seat, memory);
                let own = Self::worst_estimated(&hand);
                let target = opponents.choose(&mut self.rng).copied();
                match (own, target) {
                    (Some(own), Some(target)) => EffectPlan::Swap { own, target },
                    _ => EffectPlan::Decline,
                }
            }
        }
    }

    /// 优先从 `preferred` 里随机挑，空了再从 `fallback` 里挑。
    fn pick(&mut self, preferred: &[CardId], fallback: &[CardId]) -> Option<CardId> {
        preferred
            .choose(&mut self.rng)
            .or_else(|| fallback.choose(&mut self.rng))
            .copied()
    }

    /// 半盲换第二步：翻开的牌比自己最差的已知牌小才交换。
    pub fn choose_semi_blind_partner(
        &mut self,
        state: &EngineState,
        seat: usize,
        memory: &mut BotMemory,
        revealed_value: i32,
    ) -> Option<CardId> {
        let hand = self.read_hand(state, seat, memory);
        if let Some((card_id, worst)) = Self::worst_known(&hand) {
            if revealed_value < worst {
                return Some(card_id);
            }
        }
        if self.config.gamble_on_unknown && revealed_value <= self.config.low_swap_threshold {
            return Self::first_unknown(&hand);
        }
        None
    }

    /// 全视换：两张牌都亮出后，换来的牌更小才确认。
    pub fn accept_revealed_swap(&self, own_value: i32, target_value: i32) -> bool {
        target_value < own_value
    }

    /// 每张记得与弃牌同点数的牌各自按概率决定是否抢拍。弃牌者不能拍自己的牌。
    pub fn plan_tap(&mut self, state: &EngineState, seat: usize, memory: &mut BotMemory) -> Option<TapPlan> {
        let tap = state.tap.as_ref()?;
        if tap.discarder == seat {
            return None;
        }
        let rank = tap.rank;
        let hand = self.read_hand(state, seat, memory);
        let mut cards = Vec::new();
        for belief in &hand {
            let matches = belief
                .value
                .map(|value| value_matches_rank(value, rank))
                .unwrap_or(false);
            if matches && self.chance(self.config.tap_chance) {
                cards.push(belief.card_id);
            }
        }
        if cards.is_empty() {
            return None;
        }
        let delay_ms = self
            .rng
            .gen_range(self.config.tap_min_delay_ms..=self.config.tap_max_delay_ms.max(self.config.tap_min_delay_ms));
        Some(TapPlan { cards, delay_ms })
    }

    /// 抢拍欠牌时交出估值最高的一张。
    pub fn choose_card_to_give(
        &mut self,
        state: &EngineState,
        seat: usize,
        memory: &mut BotMemory,
    ) -> Option<CardId> {
        let hand = self.read_hand(state, seat, memory);
        let mut best: Option<Belief> = None;
        for belief in hand {
            if best.map_or(true, |current| belief.estimate() > current.estimate()) {
                best = Some(belief);
            }
        }
        best.map(|belief| belief.card_id)
    }
}
