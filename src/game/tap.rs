//! 抢拍（Tap）子状态机：弃牌后任何玩家都可以抢先弃掉同点数的牌。

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cards::{CardId, Rank};
use super::rules::RuleError;
use super::state::{EngineState, GameEvent, TurnPhase};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TapPhase {
    Window,
    Selecting,
    Swapping,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TapState {
    pub phase: TapPhase,
    pub discarder: usize,
    /// 开窗时弃牌堆顶的点数。
    pub rank: Rank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tapper: Option<usize>,
    #[serde(default)]
    pub selected_card_ids: Vec<CardId>,
    /// 抢拍者欠牌的玩家，每张被拍掉的牌对应一项。
    #[serde(default)]
    pub swap_targets: Vec<usize>,
    #[serde(default)]
    pub swaps_remaining: usize,
}

impl TapState {
    pub fn new(discarder: usize, rank: Rank) -> Self {
        Self {
            phase: TapPhase::Window,
            discarder,
            rank,
            tapper: None,
            selected_card_ids: Vec::new(),
            swap_targets: Vec::new(),
            swaps_remaining: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TapEngine;

impl TapEngine {
    fn ensure_tap(state: &EngineState, phase: TapPhase) -> Result<&TapState, RuleError> {
        if state.turn_phase != TurnPhase::TapWindow {
            return Err(RuleError::InvalidTurnPhase {
                expected: TurnPhase::TapWindow,
                actual: state.turn_phase,
            });
        }
        let tap = state.tap.as_ref().ok_or(RuleError::NoTapWindow)?;
        if tap.phase != phase {
            return Err(RuleError::TapPhaseMismatch {
                expected: phase,
                actual: tap.phase,
            });
        }
        Ok(tap)
    }

    fn ensure_tapper(tap: &TapState, player: usize) -> Result<(), RuleError> {
        if tap.tapper != Some(player) {
            return Err(RuleError::NotTapper);
        }
        Ok(())
    }

    /// 非效果弃牌后开启抢拍窗口。弃牌堆为空时不开窗，直接进入回合结束。
    pub fn open(&self, state: &mut EngineState, discarder: usize) -> Vec<GameEvent> {
        let Some(rank) = state.top_discard().map(|card| card.rank) else {
            state.turn_phase = TurnPhase::EndTurn;
            return Vec::new();
        };
        state.tap = Some(TapState::new(discarder, rank));
        state.turn_phase = TurnPhase::TapWindow;
        let event = GameEvent::TapWindowOpened { discarder };
        state.record_event(event.clone());
        vec![event]
    }

    pub fn activate(&self, state: &mut EngineState, player: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_tap(state, TapPhase::Window)?;
        if player >= state.player_count() {
            return Err(RuleError::PlayerNotFound { player });
        }
        if let Some(tap) = state.tap.as_mut() {
            tap.phase = TapPhase::Selecting;
            tap.tapper = Some(player);
        }
        let event = GameEvent::TapActivated { player };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    /// 切换一张候选牌。弃牌者不能选自己的牌。
    pub fn select(
        &self,
        state: &mut EngineState,
        player: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let tap = Self::ensure_tap(state, TapPhase::Selecting)?;
        Self::ensure_tapper(tap, player)?;
        let owner = state
            .owner_of(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;
        if owner == tap.discarder && player == tap.discarder {
            return Err(RuleError::SelfTapForbidden);
        }
        if let Some(tap) = state.tap.as_mut() {
            if let Some(pos) = tap.selected_card_ids.iter().position(|id| *id == card_id) {
                tap.selected_card_ids.remove(pos);
            } else {
                tap.selected_card_ids.push(card_id);
            }
        }
        Ok(Vec::new())
    }

    /// 结算选择：同点数的牌进入弃牌堆，一张都不匹配则罚抽一张。
    pub fn confirm(&self, state: &mut EngineState, player: usize) -> Result<Vec<GameEvent>, RuleError> {
        let tap = Self::ensure_tap(state, TapPhase::Selecting)?;
        Self::ensure_tapper(tap, player)?;
        let rank = tap.rank;
        let discarder = tap.discarder;
        let selected = tap.selected_card_ids.clone();

        let matching: Vec<CardId> = selected
            .into_iter()
            .filter(|card_id| {
                state
                    .hand_card(*card_id)
                    .map(|card| card.rank == rank)
                    .unwrap_or(false)
            })
            .collect();

        let mut events = Vec::new();
        if matching.is_empty() {
            let penalty_card = state.draw_pile.pop().map(|mut card| {
                card.face_up = false;
                let id = card.id;
                state.players[player].cards.push(card);
                id
            });
            debug!(player, ?rank, ?penalty_card, "tap missed");
            let event = GameEvent::TapFailed {
                tapper: player,
                penalty_card,
            };
            state.record_event(event.clone());
            events.push(event);
            events.extend(self.finalize(state));
            return Ok(events);
        }

        let mut owed = Vec::new();
        for card_id in matching {
            let Some(owner) = state.owner_of(card_id) else {
                continue;
            };
            let Some(mut card) = state.players[owner].remove_card(card_id) else {
                continue;
            };
            card.face_up = true;
            state.discard_pile.push(card.clone());
            // 拍走弃牌者的牌不欠牌。
            if owner != player && owner != discarder {
                owed.push(owner);
            }
            let event = GameEvent::TapDiscarded {
                tapper: player,
                owner,
                card,
            };
            state.record_event(event.clone());
            events.push(event);
        }

        if owed.is_empty() || state.players[player].cards.is_empty() {
            events.extend(self.finalize(state));
            return Ok(events);
        }

        if let Some(tap) = state.tap.as_mut() {
            tap.phase = TapPhase::Swapping;
            tap.selected_card_ids.clear();
            tap.swaps_remaining = owed.len();
            tap.swap_targets = owed;
        }
        Ok(events)
    }

    /// 把自己的一张牌背面朝上交给下一位被拍牌的玩家。
    pub fn give_card(
        &self,
        state: &mut EngineState,
        player: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let tap = Self::ensure_tap(state, TapPhase::Swapping)?;
        Self::ensure_tapper(tap, player)?;
        let target = *tap.swap_targets.first().ok_or(RuleError::NoSwapOwed)?;
        if !state.players[player].owns(card_id) {
            return Err(RuleError::CardNotOwned { card_id });
        }

        let mut events = Vec::new();
        if let Some(mut card) = state.players[player].remove_card(card_id) {
            card.face_up = false;
            state.players[target].cards.push(card);
        }
        let event = GameEvent::TapCardGiven {
            from: player,
            to: target,
            card_id,
        };
        state.record_event(event.clone());
        events.push(event);

        let done = match state.tap.as_mut() {
            Some(tap) => {
                tap.swap_targets.remove(0);
                tap.swaps_remaining = tap.swaps_remaining.saturating_sub(1);
                tap.swaps_remaining == 0
            }
            None => true,
        };
        if done || state.players[player].cards.is_empty() {
            events.extend(self.finalize(state));
        }
        Ok(events)
    }

    pub fn skip(&self, state: &mut EngineState, player: usize) -> Result<Vec<GameEvent>, RuleError> {
        let tap = Self::ensure_tap(state, TapPhase::Swapping)?;
        Self::ensure_tapper(tap, player)?;
        Ok(self.finalize(state))
    }

    /// 关闭窗口；若有人手牌清空且尚未宣布 Kaboo，则自动宣布。
    pub fn finalize(&self, state: &mut EngineState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if state.tap.is_none() {
            return events;
        }
        if let Some(empty) = state.first_empty_hand() {
            if let Some(event) = state.declare_kaboo(Some(empty), true) {
                events.push(event);
            }
        }
        state.tap = None;
        state.turn_phase = TurnPhase::EndTurn;
        state.record_event(GameEvent::TapClosed);
        events.push(GameEvent::TapClosed);
        events
    }
}
