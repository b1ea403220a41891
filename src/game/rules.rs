use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    cards::{effect_for_rank, shuffled_deck, Card, CardId, Rank},
    effects::{EffectEngine, EffectType},
    scoring,
    settings::GameSettings,
    state::{EngineState, GameEvent, GamePhase, IntegrityError, Player, RoundEndReason, TurnPhase},
    tap::{TapEngine, TapPhase},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("round is not in play (phase {actual:?})")]
    InvalidGamePhase { actual: GamePhase },
    #[error("expected turn phase {expected:?}, found {actual:?}")]
    InvalidTurnPhase {
        expected: TurnPhase,
        actual: TurnPhase,
    },
    #[error("not this player's turn")]
    NotPlayerTurn,
    #[error("no player at seat {player}")]
    PlayerNotFound { player: usize },
    #[error("card {card_id} is not on the table")]
    CardNotFound { card_id: CardId },
    #[error("card {card_id} does not belong to the acting player")]
    CardNotOwned { card_id: CardId },
    #[error("invalid target")]
    InvalidTarget,
    #[error("selection already complete")]
    SelectionComplete,
    #[error("effect needs more selections before confirming")]
    EffectIncomplete,
    #[error("no effect is being resolved")]
    NoActiveEffect,
    #[error("pile is empty")]
    EmptyPile,
    #[error("no card is held")]
    NoHeldCard,
    #[error("rule is disabled in the current settings")]
    RuleDisabled,
    #[error("cards do not share a rank")]
    RankMismatch,
    #[error("kaboo was already called this round")]
    KabooAlreadyCalled,
    #[error("no tap window is open")]
    NoTapWindow,
    #[error("expected tap phase {expected:?}, found {actual:?}")]
    TapPhaseMismatch { expected: TapPhase, actual: TapPhase },
    #[error("only the tapping player may act")]
    NotTapper,
    #[error("the discarder cannot snap their own card")]
    SelfTapForbidden,
    #[error("no player is owed a card")]
    NoSwapOwed,
    #[error("state integrity violated: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

/// 回合状态机。所有操作先校验后修改，返回 `Err` 时状态保持不变。
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    settings: GameSettings,
    effects: EffectEngine,
    taps: TapEngine,
}

impl RuleEngine {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            settings,
            effects: EffectEngine,
            taps: TapEngine,
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn ensure_round_active(state: &EngineState) -> Result<(), RuleError> {
        if !state.is_round_active() {
            return Err(RuleError::InvalidGamePhase {
                actual: state.game_phase,
            });
        }
        Ok(())
    }

    fn ensure_turn_phase(state: &EngineState, expected: TurnPhase) -> Result<(), RuleError> {
        if state.turn_phase != expected {
            return Err(RuleError::InvalidTurnPhase {
                expected,
                actual: state.turn_phase,
            });
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &EngineState, actor: usize) -> Result<(), RuleError> {
        if actor >= state.player_count() {
            return Err(RuleError::PlayerNotFound { player: actor });
        }
        if state.current_player != actor {
            return Err(RuleError::NotPlayerTurn);
        }
        Ok(())
    }

    fn ensure_integrity(state: &EngineState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_active_turn(
        state: &EngineState,
        actor: usize,
        phase: TurnPhase,
    ) -> Result<(), RuleError> {
        Self::ensure_round_active(state)?;
        Self::ensure_turn_owner(state, actor)?;
        Self::ensure_turn_phase(state, phase)
    }

    /// 新一局：洗牌、发牌，起手玩家按局数轮转。
    pub fn deal_round<R: Rng + ?Sized>(
        &self,
        players: Vec<Player>,
        round_number: u32,
        rng: &mut R,
    ) -> EngineState {
        self.deal_with_deck(players, round_number, shuffled_deck(rng))
    }

    /// 用给定牌堆发牌（牌堆顶在末尾）。
    pub fn deal_with_deck(&self, players: Vec<Player>, round_number: u32, deck: Vec<Card>) -> EngineState {
        let starting_player = if players.is_empty() {
            0
        } else {
            round_number.saturating_sub(1) as usize % players.len()
        };
        let state = EngineState::deal(players, deck, round_number, starting_player);
        info!(
            round = round_number,
            starting_player,
            players = state.player_count(),
            "round dealt"
        );
        state
    }

    pub fn finish_initial_look(&self, state: &mut EngineState) -> Result<Vec<GameEvent>, RuleError> {
        if state.game_phase != GamePhase::InitialLook {
            return Err(RuleError::InvalidGamePhase {
                actual: state.game_phase,
            });
        }
        state.game_phase = GamePhase::Playing;
        state.turn_phase = TurnPhase::Draw;

        let events = vec![
            GameEvent::InitialLookFinished,
            GameEvent::TurnStarted {
                player: state.current_player,
                turn: state.turn_number,
            },
        ];
        for event in &events {
            state.record_event(event.clone());
        }
        Ok(events)
    }

    pub fn draw_card(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        self.take_card(state, actor, false)
    }

    pub fn draw_from_discard(
        &self,
        state: &mut EngineState,
        actor: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.take_card(state, actor, true)
    }

    fn take_card(
        &self,
        state: &mut EngineState,
        actor: usize,
        from_discard: bool,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_active_turn(state, actor, TurnPhase::Draw)?;

        let pile = if from_discard {
            &mut state.discard_pile
        } else {
            &mut state.draw_pile
        };
        let mut card = pile.pop().ok_or(RuleError::EmptyPile)?;
        card.face_up = true;
        let card_id = card.id;

        state.held_card = Some(card);
        state.held_from_discard = from_discard;
        state.turn_phase = TurnPhase::Action;

        let event = GameEvent::CardDrawn {
            player: actor,
            card_id,
            from_discard,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    /// 用手上的牌替换自己的一张牌，被换下的牌翻开进入弃牌堆。
    pub fn swap_card(
        &self,
        state: &mut EngineState,
        actor: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_active_turn(state, actor, TurnPhase::Action)?;
        if state.held_card.is_none() {
            return Err(RuleError::NoHeldCard);
        }
        let slot = state.players[actor]
            .find_card_index(card_id)
            .ok_or(RuleError::CardNotOwned { card_id })?;

        let Some(mut held) = state.held_card.take() else {
            return Err(RuleError::NoHeldCard);
        };
        held.face_up = false;
        let placed = held.id;
        let mut discarded = std::mem::replace(&mut state.players[actor].cards[slot], held);
        discarded.face_up = true;
        let rank = discarded.rank;
        state.discard_pile.push(discarded.clone());
        state.held_from_discard = false;

        let mut events = Vec::new();
        let event = GameEvent::CardSwapped {
            player: actor,
            card_id: placed,
            discarded,
        };
        state.record_event(event.clone());
        events.push(event);
        events.extend(self.after_discard(state, actor, rank));
        Ok(events)
    }

    pub fn discard_held_card(
        &self,
        state: &mut EngineState,
        actor: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_active_turn(state, actor, TurnPhase::Action)?;
        let mut card = state.held_card.take().ok_or(RuleError::NoHeldCard)?;
        card.face_up = true;
        let rank = card.rank;
        state.discard_pile.push(card.clone());
        state.held_from_discard = false;

        let mut events = Vec::new();
        let event = GameEvent::CardDiscarded {
            player: actor,
            card,
        };
        state.record_event(event.clone());
        events.push(event);
        events.extend(self.after_discard(state, actor, rank));
        Ok(events)
    }

    /// 一次弃掉两张同点数手牌：手上的牌补进第一张的位置，不开抢拍窗口。
    pub fn discard_pair(
        &self,
        state: &mut EngineState,
        actor: usize,
        first: CardId,
        second: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if !self.settings.pairs_rule {
            return Err(RuleError::RuleDisabled);
        }
        Self::ensure_active_turn(state, actor, TurnPhase::Action)?;
        if state.held_card.is_none() {
            return Err(RuleError::NoHeldCard);
        }
        if first == second {
            return Err(RuleError::InvalidTarget);
        }
        let hand = &state.players[actor];
        let first_slot = hand
            .find_card_index(first)
            .ok_or(RuleError::CardNotOwned { card_id: first })?;
        let second_slot = hand
            .find_card_index(second)
            .ok_or(RuleError::CardNotOwned { card_id: second })?;
        if hand.cards[first_slot].rank != hand.cards[second_slot].rank {
            return Err(RuleError::RankMismatch);
        }

        let Some(mut held) = state.held_card.take() else {
            return Err(RuleError::NoHeldCard);
        };
        held.face_up = false;
        let hand = &mut state.players[actor].cards;
        let mut pair = vec![std::mem::replace(&mut hand[first_slot], held)];
        if let Some(slot) = hand.iter().position(|card| card.id == second) {
            pair.push(hand.remove(slot));
        }
        for card in &mut pair {
            card.face_up = true;
            state.discard_pile.push(card.clone());
        }
        state.held_from_discard = false;
        state.turn_phase = TurnPhase::EndTurn;

        let event = GameEvent::PairDiscarded {
            player: actor,
            cards: pair,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    fn after_discard(&self, state: &mut EngineState, actor: usize, rank: Rank) -> Vec<GameEvent> {
        let effect = effect_for_rank(rank);
        if self.settings.effect_cards && effect != EffectType::None {
            debug!(player = actor, ?effect, "effect triggered");
            return self.effects.begin(state, actor, effect);
        }
        self.taps.open(state, actor)
    }

    pub fn resolve_effect(
        &self,
        state: &mut EngineState,
        actor: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.effects.resolve(state, actor, card_id)
    }

    pub fn confirm_effect(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.effects.confirm(state, actor)
    }

    pub fn decline_effect(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.effects.decline(state, actor)
    }

    pub fn complete_peek(&self, state: &mut EngineState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.effects.complete_peek(state)
    }

    pub fn activate_tap(&self, state: &mut EngineState, player: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.taps.activate(state, player)
    }

    pub fn tap_select_card(
        &self,
        state: &mut EngineState,
        player: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.taps.select(state, player, card_id)
    }

    pub fn confirm_tap_discard(
        &self,
        state: &mut EngineState,
        player: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.taps.confirm(state, player)
    }

    pub fn tap_swap_card(
        &self,
        state: &mut EngineState,
        player: usize,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.taps.give_card(state, player, card_id)
    }

    pub fn skip_tap_swap(&self, state: &mut EngineState, player: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        self.taps.skip(state, player)
    }

    /// 计时结束或无人继续时关闭抢拍窗口。
    pub fn finalize_tap(&self, state: &mut EngineState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_round_active(state)?;
        Self::ensure_turn_phase(state, TurnPhase::TapWindow)?;
        if state.tap.is_none() {
            return Err(RuleError::NoTapWindow);
        }
        Ok(self.taps.finalize(state))
    }

    /// 当前玩家在抽牌前主动叫 Kaboo，本回合随即结束。
    pub fn call_kaboo(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        if state.kaboo_called {
            return Err(RuleError::KabooAlreadyCalled);
        }
        if state.game_phase != GamePhase::Playing {
            return Err(RuleError::InvalidGamePhase {
                actual: state.game_phase,
            });
        }
        Self::ensure_turn_owner(state, actor)?;
        Self::ensure_turn_phase(state, TurnPhase::Draw)?;

        let events: Vec<GameEvent> = state.declare_kaboo(Some(actor), false).into_iter().collect();
        state.turn_phase = TurnPhase::EndTurn;
        info!(
            round = state.round_number,
            turn = state.turn_number,
            player = actor,
            "kaboo called"
        );
        Ok(events)
    }

    pub fn end_turn(&self, state: &mut EngineState, actor: usize) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_active_turn(state, actor, TurnPhase::EndTurn)?;

        let mut events = Vec::new();
        let ended = GameEvent::TurnEnded { player: actor };
        state.record_event(ended.clone());
        events.push(ended);

        if let Some(empty) = state.first_empty_hand() {
            if let Some(event) = state.declare_kaboo(Some(empty), true) {
                info!(round = state.round_number, player = empty, "hand emptied, automatic kaboo");
                events.push(event);
            }
        }

        if state.draw_pile.is_empty() {
            state.kaboo_caller = None;
            events.extend(self.finish_round(state, RoundEndReason::DeckExhausted));
            return Ok(events);
        }

        if state.kaboo_called && state.kaboo_turn != Some(state.turn_number) {
            state.final_round_turns_left = state.final_round_turns_left.saturating_sub(1);
            if state.final_round_turns_left == 0 {
                events.extend(self.finish_round(state, RoundEndReason::KabooFinished));
                return Ok(events);
            }
        }

        events.extend(Self::advance_turn(state));
        Ok(events)
    }

    fn advance_turn(state: &mut EngineState) -> Vec<GameEvent> {
        let count = state.player_count().max(1);
        let mut next = (state.current_player + 1) % count;
        if state.kaboo_called && state.kaboo_caller == Some(next) && count > 1 {
            next = (next + 1) % count;
        }

        state.current_player = next;
        state.turn_number += 1;
        state.turn_phase = TurnPhase::Draw;
        state.held_card = None;
        state.held_from_discard = false;
        state.effect = None;
        state.tap = None;

        debug!(turn = state.turn_number, player = next, "turn started");
        let event = GameEvent::TurnStarted {
            player: next,
            turn: state.turn_number,
        };
        state.record_event(event.clone());
        vec![event]
    }

    fn finish_round(&self, state: &mut EngineState, reason: RoundEndReason) -> Vec<GameEvent> {
        state.game_phase = GamePhase::Reveal;
        state.turn_phase = TurnPhase::EndTurn;
        state.effect = None;
        state.tap = None;

        let mut events = vec![GameEvent::RoundEnded { reason }];
        state.record_event(GameEvent::RoundEnded { reason });
        events.extend(self.reveal_all_cards(state).unwrap_or_default());
        events.extend(scoring::resolve_round(state, self.settings.target_score));

        if let Some(result) = &state.round_result {
            info!(
                round = result.round,
                ?reason,
                scores = ?result.scores,
                match_over = result.match_over,
                "round finished"
            );
        }
        events
    }

    /// 翻开所有手牌。只在亮牌阶段有效，重复调用无事件。
    pub fn reveal_all_cards(&self, state: &mut EngineState) -> Result<Vec<GameEvent>, RuleError> {
        if state.game_phase != GamePhase::Reveal {
            return Err(RuleError::InvalidGamePhase {
                actual: state.game_phase,
            });
        }
        let hidden = state
            .players
            .iter()
            .flat_map(|player| player.cards.iter())
            .any(|card| !card.face_up);
        if !hidden {
            return Ok(Vec::new());
        }
        state.reveal_all();
        state.record_event(GameEvent::CardsRevealed);
        Ok(vec![GameEvent::CardsRevealed])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::{create_deck, Card};

    // 倒序牌堆发牌后：P0 = A♥ 3♥ 5♥ 7♥ (id 0,2,4,6)，P1 = 2♥ 4♥ 6♥ 8♥ (id 1,3,5,7)，
    // 弃牌堆顶 9♥ (id 8)，抽牌堆顶依次为 10♥ J♥ Q♥ K♥ A♦ ...
    fn dealt(engine: &RuleEngine) -> EngineState {
        let mut deck = create_deck();
        deck.reverse();
        let players = vec![Player::new(0, "Ada", "#e57373"), Player::new(1, "Ben", "#64b5f6")];
        let mut state = EngineState::deal(players, deck, 1, 0);
        engine
            .finish_initial_look(&mut state)
            .expect("initial look should finish");
        state
    }

    fn no_effects() -> RuleEngine {
        RuleEngine::new(GameSettings {
            effect_cards: false,
            ..GameSettings::default()
        })
    }

    fn with_pairs() -> RuleEngine {
        RuleEngine::new(GameSettings {
            pairs_rule: true,
            ..GameSettings::default()
        })
    }

    #[test]
    fn swapping_in_a_card_opens_the_tap_window() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        engine.draw_card(&mut state, 0).expect("draw");
        assert_eq!(state.turn_phase, TurnPhase::Action);
        assert_eq!(state.held_card.as_ref().map(|card| (card.id, card.face_up)), Some((9, true)));

        engine.swap_card(&mut state, 0, 0).expect("swap");
        assert_eq!(state.players[0].cards[0].id, 9);
        assert!(!state.players[0].cards[0].face_up);
        assert_eq!(state.discard_pile.len(), 2);
        assert_eq!(state.top_discard().map(|card| (card.id, card.face_up)), Some((0, true)));
        assert_eq!(state.turn_phase, TurnPhase::TapWindow);
        assert_eq!(state.tap.as_ref().map(|tap| tap.discarder), Some(0));
        assert_eq!(state.integrity_check(), Ok(()));
    }

    #[test]
    fn invalid_actions_leave_state_untouched() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        let before = state.clone();
        assert_eq!(engine.draw_card(&mut state, 1), Err(RuleError::NotPlayerTurn));
        assert!(matches!(
            engine.swap_card(&mut state, 0, 0),
            Err(RuleError::InvalidTurnPhase { .. })
        ));
        assert!(matches!(
            engine.end_turn(&mut state, 0),
            Err(RuleError::InvalidTurnPhase { .. })
        ));
        assert_eq!(engine.discard_pair(&mut state, 0, 0, 2), Err(RuleError::RuleDisabled));
        assert_eq!(state, before);

        engine.draw_card(&mut state, 0).expect("draw");
        assert_eq!(
            engine.swap_card(&mut state, 0, 1),
            Err(RuleError::CardNotOwned { card_id: 1 })
        );
    }

    #[test]
    fn discarding_an_effect_card_starts_the_effect() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        engine.draw_card(&mut state, 0).expect("draw");
        engine.discard_held_card(&mut state, 0).expect("discard");
        assert_eq!(state.turn_phase, TurnPhase::Effect);
        assert_eq!(state.effect_type(), EffectType::PeekOpponent);
        assert_eq!(state.effect_step(), None);
        assert!(state.held_card.is_none());
    }

    #[test]
    fn disabled_effects_open_the_tap_window_instead() {
        let engine = no_effects();
        let mut state = dealt(&engine);
        engine.draw_card(&mut state, 0).expect("draw");
        engine.discard_held_card(&mut state, 0).expect("discard");
        assert_eq!(state.turn_phase, TurnPhase::TapWindow);
        assert!(state.effect.is_none());
    }

    #[test]
    fn drawing_from_the_discard_pile() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        engine.draw_from_discard(&mut state, 0).expect("take discard");
        assert!(state.held_from_discard);
        assert_eq!(state.held_card.as_ref().map(|card| card.id), Some(8));
        assert!(state.discard_pile.is_empty());
        assert_eq!(state.integrity_check(), Ok(()));
    }

    #[test]
    fn discarding_a_pair_shrinks_the_hand() {
        let engine = with_pairs();
        let mut state = dealt(&engine);
        // 把 A♦ (id 13) 与 P0 的 3♥ 对调，凑出一对 A
        let pos = state
            .draw_pile
            .iter()
            .position(|card| card.id == 13)
            .expect("A♦ in draw pile");
        let ace: Card = std::mem::replace(&mut state.draw_pile[pos], state.players[0].cards[1].clone());
        state.players[0].cards[1] = ace;

        engine.draw_card(&mut state, 0).expect("draw");
        assert_eq!(engine.discard_pair(&mut state, 0, 0, 4), Err(RuleError::RankMismatch));
        engine.discard_pair(&mut state, 0, 0, 13).expect("pair");
        assert_eq!(state.players[0].cards.len(), 3);
        assert_eq!(state.players[0].cards[0].id, 9);
        assert_eq!(state.discard_pile.len(), 3);
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
        assert!(state.tap.is_none());
        assert_eq!(state.integrity_check(), Ok(()));
    }

    #[test]
    fn end_turn_hands_over_to_the_next_player() {
        let engine = no_effects();
        let mut state = dealt(&engine);
        engine.draw_card(&mut state, 0).expect("draw");
        engine.discard_held_card(&mut state, 0).expect("discard");
        engine.finalize_tap(&mut state).expect("close window");
        assert_eq!(state.turn_phase, TurnPhase::EndTurn);
        engine.end_turn(&mut state, 0).expect("end turn");
        assert_eq!(state.current_player, 1);
        assert_eq!(state.turn_number, 2);
        assert_eq!(state.turn_phase, TurnPhase::Draw);
    }

    #[test]
    fn kaboo_final_round_then_reveal() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        engine.call_kaboo(&mut state, 0).expect("kaboo");
        assert_eq!(state.game_phase, GamePhase::KabooFinal);
        assert_eq!(state.final_round_turns_left, 1);
        assert_eq!(engine.call_kaboo(&mut state, 0), Err(RuleError::KabooAlreadyCalled));

        engine.end_turn(&mut state, 0).expect("caller's turn ends");
        assert_eq!(state.current_player, 1);
        assert_eq!(state.final_round_turns_left, 1);

        engine.draw_card(&mut state, 1).expect("draw");
        engine.discard_held_card(&mut state, 1).expect("discard");
        engine.decline_effect(&mut state, 1).expect("decline");
        engine.end_turn(&mut state, 1).expect("last turn ends");

        assert_eq!(state.game_phase, GamePhase::Reveal);
        assert!(state
            .players
            .iter()
            .flat_map(|player| player.cards.iter())
            .all(|card| card.face_up));
        let result = state.round_result.as_ref().expect("round scored");
        assert_eq!(result.scores, vec![16, 20]);
        assert_eq!(result.penalized, None);
        assert_eq!(state.players[0].total_score, 16);
    }

    #[test]
    fn running_out_of_cards_forces_a_reveal() {
        let engine = no_effects();
        let mut state = dealt(&engine);
        let rest: Vec<Card> = state.draw_pile.drain(1..).collect();
        state.discard_pile.splice(0..0, rest);

        engine.draw_card(&mut state, 0).expect("draw last card");
        engine.discard_held_card(&mut state, 0).expect("discard");
        engine.finalize_tap(&mut state).expect("close window");
        let events = engine.end_turn(&mut state, 0).expect("end turn");

        assert_eq!(state.game_phase, GamePhase::Reveal);
        assert_eq!(state.kaboo_caller, None);
        assert!(events.contains(&GameEvent::RoundEnded {
            reason: RoundEndReason::DeckExhausted
        }));
        assert_eq!(state.integrity_check(), Ok(()));
    }

    #[test]
    fn empty_hand_calls_kaboo_on_end_turn() {
        let engine = RuleEngine::default();
        let mut state = dealt(&engine);
        let emptied: Vec<Card> = state.players[1].cards.drain(..).collect();
        state.discard_pile.splice(0..0, emptied);
        state.turn_phase = TurnPhase::EndTurn;

        let events = engine.end_turn(&mut state, 0).expect("end turn");
        assert!(events.contains(&GameEvent::KabooCalled {
            caller: Some(1),
            automatic: true
        }));
        assert_eq!(state.game_phase, GamePhase::KabooFinal);
        assert_eq!(state.current_player, 0, "caller is skipped in the final round");
        assert_eq!(state.turn_number, 2);
    }

    #[test]
    fn deal_round_rotates_the_starting_player() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let engine = RuleEngine::default();
        let players = vec![
            Player::new(0, "Ada", "#e57373"),
            Player::new(1, "Ben", "#64b5f6"),
            Player::new(2, "Cy", "#81c784"),
        ];
        let mut rng = SmallRng::seed_from_u64(3);
        let round_two = engine.deal_round(players.clone(), 2, &mut rng);
        assert_eq!(round_two.current_player, 1);
        let round_four = engine.deal_round(players, 4, &mut rng);
        assert_eq!(round_four.current_player, 0);
        assert_eq!(round_four.integrity_check(), Ok(()));
    }
}
