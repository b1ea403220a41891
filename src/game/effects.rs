use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cards::CardId;
use super::rules::RuleError;
use super::state::{EngineState, GameEvent, TurnPhase};

/// 弃牌点数触发的特殊能力。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    None,
    PeekOwn,
    PeekOpponent,
    BlindSwap,
    SemiBlindSwap,
    FullVisionSwap,
}

impl Default for EffectType {
    fn default() -> Self {
        EffectType::None
    }
}

impl EffectType {
    pub fn is_peek(self) -> bool {
        matches!(self, EffectType::PeekOwn | EffectType::PeekOpponent)
    }

    pub fn is_swap(self) -> bool {
        matches!(
            self,
            EffectType::BlindSwap | EffectType::SemiBlindSwap | EffectType::FullVisionSwap
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            EffectType::None => "no effect",
            EffectType::PeekOwn => "peek own",
            EffectType::PeekOpponent => "peek opponent",
            EffectType::BlindSwap => "blind swap",
            EffectType::SemiBlindSwap => "semi-blind swap",
            EffectType::FullVisionSwap => "full vision swap",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EffectStep {
    Select,
    Preview,
}

/// 正在结算的效果，各变体携带自己的选择进度。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActiveEffect {
    PeekOwn {
        actor: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<CardId>,
    },
    PeekOpponent {
        actor: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<CardId>,
    },
    BlindSwap {
        actor: usize,
        #[serde(default)]
        selected: Vec<CardId>,
    },
    SemiBlindSwap {
        actor: usize,
        step: EffectStep,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revealed: Option<CardId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partner: Option<CardId>,
    },
    FullVisionSwap {
        actor: usize,
        step: EffectStep,
        #[serde(default)]
        selected: Vec<CardId>,
    },
}

impl ActiveEffect {
    pub fn new(effect: EffectType, actor: usize) -> Option<Self> {
        let active = match effect {
            EffectType::None => return None,
            EffectType::PeekOwn => ActiveEffect::PeekOwn {
                actor,
                target: None,
            },
            EffectType::PeekOpponent => ActiveEffect::PeekOpponent {
                actor,
                target: None,
            },
            EffectType::BlindSwap => ActiveEffect::BlindSwap {
                actor,
                selected: Vec::new(),
            },
            EffectType::SemiBlindSwap => ActiveEffect::SemiBlindSwap {
                actor,
                step: EffectStep::Select,
                revealed: None,
                partner: None,
            },
            EffectType::FullVisionSwap => ActiveEffect::FullVisionSwap {
                actor,
                step: EffectStep::Select,
                selected: Vec::new(),
            },
        };
        Some(active)
    }

    pub fn actor(&self) -> usize {
        match self {
            ActiveEffect::PeekOwn { actor, .. }
            | ActiveEffect::PeekOpponent { actor, .. }
            | ActiveEffect::BlindSwap { actor, .. }
            | ActiveEffect::SemiBlindSwap { actor, .. }
            | ActiveEffect::FullVisionSwap { actor, .. } => *actor,
        }
    }

    pub fn effect_type(&self) -> EffectType {
        match self {
            ActiveEffect::PeekOwn { .. } => EffectType::PeekOwn,
            ActiveEffect::PeekOpponent { .. } => EffectType::PeekOpponent,
            ActiveEffect::BlindSwap { .. } => EffectType::BlindSwap,
            ActiveEffect::SemiBlindSwap { .. } => EffectType::SemiBlindSwap,
            ActiveEffect::FullVisionSwap { .. } => EffectType::FullVisionSwap,
        }
    }

    /// 纯查看效果没有步骤。
    pub fn step(&self) -> Option<EffectStep> {
        match self {
            ActiveEffect::PeekOwn { .. } | ActiveEffect::PeekOpponent { .. } => None,
            ActiveEffect::BlindSwap { .. } => Some(EffectStep::Select),
            ActiveEffect::SemiBlindSwap { step, .. } | ActiveEffect::FullVisionSwap { step, .. } => {
                Some(*step)
            }
        }
    }

    pub fn selected_cards(&self) -> Vec<CardId> {
        match self {
            ActiveEffect::PeekOwn { target, .. } | ActiveEffect::PeekOpponent { target, .. } => {
                target.iter().copied().collect()
            }
            ActiveEffect::BlindSwap { selected, .. }
            | ActiveEffect::FullVisionSwap { selected, .. } => selected.clone(),
            ActiveEffect::SemiBlindSwap {
                revealed, partner, ..
            } => revealed.iter().chain(partner.iter()).copied().collect(),
        }
    }

    /// 已经向行动者亮出的牌。盲换永远为空。
    pub fn preview_card_ids(&self) -> Vec<CardId> {
        match self {
            ActiveEffect::PeekOwn { target, .. } | ActiveEffect::PeekOpponent { target, .. } => {
                target.iter().copied().collect()
            }
            ActiveEffect::BlindSwap { .. } => Vec::new(),
            ActiveEffect::SemiBlindSwap { revealed, .. } => revealed.iter().copied().collect(),
            ActiveEffect::FullVisionSwap { step, selected, .. } => match step {
                EffectStep::Preview => selected.clone(),
                EffectStep::Select => Vec::new(),
            },
        }
    }

    pub fn peek_target(&self) -> Option<CardId> {
        match self {
            ActiveEffect::PeekOwn { target, .. } | ActiveEffect::PeekOpponent { target, .. } => {
                *target
            }
            _ => None,
        }
    }
}

fn toggle(selected: &mut Vec<CardId>, card_id: CardId, limit: usize) -> bool {
    if let Some(pos) = selected.iter().position(|id| *id == card_id) {
        selected.remove(pos);
        true
    } else if selected.len() < limit {
        selected.push(card_id);
        true
    } else {
        false
    }
}

/// 效果结算子状态机。所有方法先校验再修改，返回 `Err` 时状态不变。
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectEngine;

impl EffectEngine {
    fn ensure_effect<'a>(
        state: &'a EngineState,
        actor: usize,
    ) -> Result<&'a ActiveEffect, RuleError> {
        if state.turn_phase != TurnPhase::Effect {
            return Err(RuleError::InvalidTurnPhase {
                expected: TurnPhase::Effect,
                actual: state.turn_phase,
            });
        }
        let effect = state.effect.as_ref().ok_or(RuleError::NoActiveEffect)?;
        if effect.actor() != actor {
            return Err(RuleError::NotPlayerTurn);
        }
        Ok(effect)
    }

    pub fn begin(&self, state: &mut EngineState, actor: usize, effect: EffectType) -> Vec<GameEvent> {
        let Some(active) = ActiveEffect::new(effect, actor) else {
            return Vec::new();
        };
        state.effect = Some(active);
        state.turn_phase = TurnPhase::Effect;
        let event = GameEvent::EffectStarted {
            player: actor,
            effect,
        };
        state.record_event(event.clone());
        vec![event]
    }

    /// 选择一张牌作为当前效果的目标。
    pub fn resolve(
        &self,
        state: &mut EngineState,
        actor: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let effect = Self::ensure_effect(state, actor)?.clone();
        let owner = state
            .owner_of(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;

        let mut revealed = Vec::new();
        let next = match effect {
            ActiveEffect::PeekOwn { target, .. } => {
                if target.is_some() {
                    return Err(RuleError::SelectionComplete);
                }
                if owner != actor {
                    return Err(RuleError::CardNotOwned { card_id });
                }
                revealed.push((owner, card_id));
                ActiveEffect::PeekOwn {
                    actor,
                    target: Some(card_id),
                }
            }
            ActiveEffect::PeekOpponent { target, .. } => {
                if target.is_some() {
                    return Err(RuleError::SelectionComplete);
                }
                if owner == actor {
                    return Err(RuleError::InvalidTarget);
                }
                revealed.push((owner, card_id));
                ActiveEffect::PeekOpponent {
                    actor,
                    target: Some(card_id),
                }
            }
            ActiveEffect::BlindSwap { mut selected, .. } => {
                if !toggle(&mut selected, card_id, 2) {
                    return Err(RuleError::SelectionComplete);
                }
                ActiveEffect::BlindSwap { actor, selected }
            }
            ActiveEffect::SemiBlindSwap {
                step: EffectStep::Select,
                ..
            } => {
                revealed.push((owner, card_id));
                ActiveEffect::SemiBlindSwap {
                    actor,
                    step: EffectStep::Preview,
                    revealed: Some(card_id),
                    partner: None,
                }
            }
            ActiveEffect::SemiBlindSwap {
                step: EffectStep::Preview,
                revealed,
                partner,
                ..
            } => {
                if revealed == Some(card_id) {
                    return Err(RuleError::InvalidTarget);
                }
                let partner = if partner == Some(card_id) {
                    None
                } else {
                    Some(card_id)
                };
                ActiveEffect::SemiBlindSwap {
                    actor,
                    step: EffectStep::Preview,
                    revealed,
                    partner,
                }
            }
            ActiveEffect::FullVisionSwap {
                step: EffectStep::Select,
                mut selected,
                ..
            } => {
                if !toggle(&mut selected, card_id, 2) {
                    return Err(RuleError::SelectionComplete);
                }
                let step = if selected.len() == 2 {
                    for id in &selected {
                        if let Some(owner) = state.owner_of(*id) {
                            revealed.push((owner, *id));
                        }
                    }
                    EffectStep::Preview
                } else {
                    EffectStep::Select
                };
                ActiveEffect::FullVisionSwap {
                    actor,
                    step,
                    selected,
                }
            }
            ActiveEffect::FullVisionSwap {
                step: EffectStep::Preview,
                ..
            } => return Err(RuleError::SelectionComplete),
        };

        state.effect = Some(next);
        let mut events = Vec::new();
        for (owner, card_id) in revealed {
            let event = GameEvent::CardPeeked {
                viewer: actor,
                owner,
                card_id,
            };
            state.record_event(event.clone());
            events.push(event);
        }
        Ok(events)
    }

    /// 确认效果。交换类效果执行交换，查看类效果直接结束。
    pub fn confirm(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        let effect = Self::ensure_effect(state, actor)?.clone();
        let pair = match &effect {
            ActiveEffect::PeekOwn { target, .. } | ActiveEffect::PeekOpponent { target, .. } => {
                if target.is_none() {
                    return Err(RuleError::EffectIncomplete);
                }
                None
            }
            ActiveEffect::BlindSwap { selected, .. } => match selected.as_slice() {
                [first, second] => Some((*first, *second)),
                _ => return Err(RuleError::EffectIncomplete),
            },
            ActiveEffect::SemiBlindSwap {
                step: EffectStep::Preview,
                revealed: Some(revealed),
                partner,
                ..
            } => partner.map(|partner| (*revealed, partner)),
            ActiveEffect::SemiBlindSwap { .. } => return Err(RuleError::EffectIncomplete),
            ActiveEffect::FullVisionSwap {
                step: EffectStep::Preview,
                selected,
                ..
            } => match selected.as_slice() {
                [first, second] => Some((*first, *second)),
                _ => return Err(RuleError::EffectIncomplete),
            },
            ActiveEffect::FullVisionSwap { .. } => return Err(RuleError::EffectIncomplete),
        };

        if let Some((first, second)) = pair {
            if state.locate_card(first).is_none() {
                return Err(RuleError::CardNotFound { card_id: first });
            }
            if state.locate_card(second).is_none() {
                return Err(RuleError::CardNotFound { card_id: second });
            }
        }

        let mut events = Vec::new();
        let applied = match pair {
            Some((first, second)) => {
                state.swap_positions(first, second);
                let event = GameEvent::CardsSwapped {
                    actor,
                    first,
                    second,
                    seen: effect.preview_card_ids(),
                };
                state.record_event(event.clone());
                events.push(event);
                true
            }
            None => effect.effect_type().is_peek(),
        };
        events.extend(self.finish(state, &effect, applied));
        Ok(events)
    }

    pub fn decline(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        let effect = Self::ensure_effect(state, actor)?.clone();
        let applied = effect.peek_target().is_some();
        Ok(self.finish(state, &effect, applied))
    }

    /// 查看展示时间结束后自动收尾。
    pub fn complete_peek(&self, state: &mut EngineState) -> Result<Vec<GameEvent>, RuleError> {
        let actor = state
            .effect
            .as_ref()
            .map(ActiveEffect::actor)
            .ok_or(RuleError::NoActiveEffect)?;
        let effect = Self::ensure_effect(state, actor)?.clone();
        if effect.peek_target().is_none() {
            return Err(RuleError::EffectIncomplete);
        }
        Ok(self.finish(state, &effect, true))
    }

    fn finish(&self, state: &mut EngineState, effect: &ActiveEffect, applied: bool) -> Vec<GameEvent> {
        state.effect = None;
        state.turn_phase = TurnPhase::EndTurn;
        debug!(player = effect.actor(), effect = ?effect.effect_type(), applied, "effect finished");
        let event = GameEvent::EffectEnded {
            player: effect.actor(),
            effect: effect.effect_type(),
            applied,
        };
        state.record_event(event.clone());
        vec![event]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::create_deck;
    use crate::game::state::{GamePhase, Player};

    fn effect_state(effect: EffectType) -> EngineState {
        let players = vec![
            Player::new(0, "Ada", "#e57373"),
            Player::new(1, "Ben", "#64b5f6"),
            Player::new(2, "Cy", "#81c784"),
        ];
        let mut state = EngineState::deal(players, create_deck(), 1, 0);
        state.game_phase = GamePhase::Playing;
        EffectEngine.begin(&mut state, 0, effect);
        state
    }

    fn card(state: &EngineState, player: usize, slot: usize) -> CardId {
        state.players[player].cards[slot].id
    }

    #[test]
    fn peek_own_rejects_opponent_cards() {
        let mut state = effect_state(EffectType::PeekOwn);
        assert_eq!(state.effect_step(), None);
        let foreign = card(&state, 1, 0);
        assert_eq!(
            EffectEngine.resolve(&mut state, 0, foreign),
            Err(RuleError::CardNotOwned { card_id: foreign })
        );
        let own = card(&state, 0, 2);
        let events = EffectEngine
            .resolve(&mut state, 0, own)
            .expect("own card can be peeked");
        assert!(matches!(
            events.as_slice(),
            [GameEvent::CardPeeked { viewer: 0, owner: 0, .. }]
        ));
        assert_eq!(state.peeked_cards(), vec![own]);

        EffectEngine
            .complete_peek(&mut state)
            .expect("peek should complete");
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
        assert!(state.effect.is_none());
    }

    #[test]
    fn peek_opponent_rejects_own_cards() {
        let mut state = effect_state(EffectType::PeekOpponent);
        let own = card(&state, 0, 0);
        assert_eq!(
            EffectEngine.resolve(&mut state, 0, own),
            Err(RuleError::InvalidTarget)
        );
        let foreign = card(&state, 2, 1);
        assert!(EffectEngine.resolve(&mut state, 0, foreign).is_ok());
        let another = card(&state, 1, 1);
        assert_eq!(
            EffectEngine.resolve(&mut state, 0, another),
            Err(RuleError::SelectionComplete)
        );
    }

    #[test]
    fn blind_swap_across_two_opponents() {
        let mut state = effect_state(EffectType::BlindSwap);
        let first = card(&state, 1, 0);
        let second = card(&state, 2, 3);
        EffectEngine.resolve(&mut state, 0, first).expect("first pick");
        EffectEngine.resolve(&mut state, 0, second).expect("second pick");
        assert_eq!(state.peeked_cards(), Vec::<CardId>::new());
        let third = card(&state, 0, 0);
        assert_eq!(
            EffectEngine.resolve(&mut state, 0, third),
            Err(RuleError::SelectionComplete)
        );

        let events = EffectEngine.confirm(&mut state, 0).expect("swap applies");
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::CardsSwapped { seen, .. } if seen.is_empty()
        )));
        assert_eq!(state.locate_card(first), Some((2, 3)));
        assert_eq!(state.locate_card(second), Some((1, 0)));
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
        assert!(state.selected_cards().is_empty());
    }

    #[test]
    fn blind_swap_decline_leaves_hands_untouched() {
        let mut state = effect_state(EffectType::BlindSwap);
        let hands_before: Vec<_> = state.players.iter().map(|p| p.cards.clone()).collect();
        let pick = card(&state, 1, 0);
        EffectEngine.resolve(&mut state, 0, pick).expect("pick");
        EffectEngine.decline(&mut state, 0).expect("decline");
        let hands_after: Vec<_> = state.players.iter().map(|p| p.cards.clone()).collect();
        assert_eq!(hands_before, hands_after);
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
    }

    #[test]
    fn semi_blind_swap_reveals_then_swaps_partner() {
        let mut state = effect_state(EffectType::SemiBlindSwap);
        let revealed = card(&state, 1, 2);
        let own = card(&state, 0, 1);
        EffectEngine.resolve(&mut state, 0, revealed).expect("reveal");
        assert_eq!(state.effect_step(), Some(EffectStep::Preview));
        assert_eq!(state.peeked_cards(), vec![revealed]);
        EffectEngine.resolve(&mut state, 0, own).expect("partner");
        let events = EffectEngine.confirm(&mut state, 0).expect("swap");
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::CardsSwapped { seen, .. } if seen == &vec![revealed]
        )));
        assert_eq!(state.locate_card(revealed), Some((0, 1)));
    }

    #[test]
    fn semi_blind_confirm_without_partner_swaps_nothing() {
        let mut state = effect_state(EffectType::SemiBlindSwap);
        let revealed = card(&state, 1, 2);
        EffectEngine.resolve(&mut state, 0, revealed).expect("reveal");
        let events = EffectEngine.confirm(&mut state, 0).expect("confirm");
        assert!(!events
            .iter()
            .any(|event| matches!(event, GameEvent::CardsSwapped { .. })));
        assert_eq!(state.locate_card(revealed), Some((1, 2)));
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
    }

    #[test]
    fn full_vision_swap_reveals_both_and_advances() {
        let mut state = effect_state(EffectType::FullVisionSwap);
        let a = card(&state, 0, 0);
        let b = card(&state, 2, 0);
        EffectEngine.resolve(&mut state, 0, a).expect("first");
        assert_eq!(state.effect_step(), Some(EffectStep::Select));
        let events = EffectEngine.resolve(&mut state, 0, b).expect("second");
        assert_eq!(events.len(), 2, "both cards are revealed at once");
        assert_eq!(state.effect_step(), Some(EffectStep::Preview));
        EffectEngine.confirm(&mut state, 0).expect("swap");
        assert_eq!(state.locate_card(a), Some((2, 0)));
    }

    #[test]
    fn only_the_actor_may_resolve() {
        let mut state = effect_state(EffectType::BlindSwap);
        let pick = card(&state, 1, 0);
        assert_eq!(
            EffectEngine.resolve(&mut state, 1, pick),
            Err(RuleError::NotPlayerTurn)
        );
        assert_eq!(EffectEngine.confirm(&mut state, 0), Err(RuleError::EffectIncomplete));
    }
}
