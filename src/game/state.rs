use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::cards::{card_value, Card, CardId, DECK_SIZE, HAND_SIZE};
use super::effects::{ActiveEffect, EffectStep, EffectType};
use super::scoring::RoundResult;
use super::tap::TapState;

/// 玩家标识。
pub type PlayerId = u8;

/// 玩家状态。`cards` 的顺序对应桌面上的格位。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar_color: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub total_score: i32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, avatar_color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_color: avatar_color.into(),
            cards: Vec::new(),
            is_host: false,
            is_ready: false,
            is_bot: false,
            score: 0,
            total_score: 0,
        }
    }

    pub fn bot(id: PlayerId, name: impl Into<String>, avatar_color: impl Into<String>) -> Self {
        let mut player = Self::new(id, name, avatar_color);
        player.is_bot = true;
        player.is_ready = true;
        player
    }

    pub fn find_card_index(&self, card_id: CardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == card_id)
    }

    pub fn owns(&self, card_id: CardId) -> bool {
        self.find_card_index(card_id).is_some()
    }

    pub fn remove_card(&mut self, card_id: CardId) -> Option<Card> {
        let idx = self.find_card_index(card_id)?;
        Some(self.cards.remove(idx))
    }

    pub fn hand_value(&self) -> i32 {
        self.cards.iter().map(card_value).sum()
    }
}

/// 对局阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Dealing,
    InitialLook,
    Playing,
    KabooFinal,
    Reveal,
}

impl Default for GamePhase {
    fn default() -> Self {
        Self::Waiting
    }
}

/// 回合内阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Draw,
    Action,
    Effect,
    TapWindow,
    EndTurn,
}

impl Default for TurnPhase {
    fn default() -> Self {
        Self::Draw
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    KabooFinished,
    DeckExhausted,
}

/// 游戏事件流，同时用于生成可读的回合日志。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    RoundDealt {
        round: u32,
        starting_player: usize,
    },
    InitialLookFinished,
    TurnStarted {
        player: usize,
        turn: u32,
    },
    CardDrawn {
        player: usize,
        card_id: CardId,
        from_discard: bool,
    },
    CardSwapped {
        player: usize,
        card_id: CardId,
        discarded: Card,
    },
    CardDiscarded {
        player: usize,
        card: Card,
    },
    PairDiscarded {
        player: usize,
        cards: Vec<Card>,
    },
    EffectStarted {
        player: usize,
        effect: EffectType,
    },
    CardPeeked {
        viewer: usize,
        owner: usize,
        card_id: CardId,
    },
    CardsSwapped {
        actor: usize,
        first: CardId,
        second: CardId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        seen: Vec<CardId>,
    },
    EffectEnded {
        player: usize,
        effect: EffectType,
        applied: bool,
    },
    TapWindowOpened {
        discarder: usize,
    },
    TapActivated {
        player: usize,
    },
    TapDiscarded {
        tapper: usize,
        owner: usize,
        card: Card,
    },
    TapFailed {
        tapper: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        penalty_card: Option<CardId>,
    },
    TapCardGiven {
        from: usize,
        to: usize,
        card_id: CardId,
    },
    TapClosed,
    KabooCalled {
        #[serde(skip_serializing_if = "Option::is_none")]
        caller: Option<usize>,
        automatic: bool,
    },
    TurnEnded {
        player: usize,
    },
    RoundEnded {
        reason: RoundEndReason,
    },
    CardsRevealed,
    RoundScored {
        scores: Vec<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        penalized: Option<usize>,
    },
    MatchFinished {
        winners: Vec<usize>,
    },
}

impl GameEvent {
    /// 生成一条面向玩家的日志文本，不泄露暗牌点数。
    pub fn describe(&self, players: &[Player]) -> String {
        let name = |idx: &usize| {
            players
                .get(*idx)
                .map(|player| player.name.clone())
                .unwrap_or_else(|| format!("Seat {idx}"))
        };
        match self {
            GameEvent::RoundDealt { round, starting_player } => {
                format!("Round {round} dealt, {} starts", name(starting_player))
            }
            GameEvent::InitialLookFinished => "Initial look finished".to_string(),
            GameEvent::TurnStarted { player, turn } => {
                format!("Turn {turn}: {}", name(player))
            }
            GameEvent::CardDrawn {
                player,
                from_discard,
                ..
            } => {
                if *from_discard {
                    format!("{} took the top discard", name(player))
                } else {
                    format!("{} drew a card", name(player))
                }
            }
            GameEvent::CardSwapped {
                player, discarded, ..
            } => format!("{} swapped a card and discarded {discarded}", name(player)),
            GameEvent::CardDiscarded { player, card } => {
                format!("{} discarded {card}", name(player))
            }
            GameEvent::PairDiscarded { player, cards } => {
                let labels: Vec<String> = cards.iter().map(ToString::to_string).collect();
                format!("{} discarded a pair: {}", name(player), labels.join(" "))
            }
            GameEvent::EffectStarted { player, effect } => {
                format!("{} may use {}", name(player), effect.label())
            }
            GameEvent::CardPeeked { viewer, owner, .. } => {
                if viewer == owner {
                    format!("{} peeked at one of their cards", name(viewer))
                } else {
                    format!("{} peeked at a card of {}", name(viewer), name(owner))
                }
            }
            GameEvent::CardsSwapped { actor, .. } => format!("{} swapped two cards", name(actor)),
            GameEvent::EffectEnded {
                player,
                effect,
                applied,
            } => {
                if *applied {
                    format!("{} finished {}", name(player), effect.label())
                } else {
                    format!("{} passed on {}", name(player), effect.label())
                }
            }
            GameEvent::TapWindowOpened { .. } => "Tap window open".to_string(),
            GameEvent::TapActivated { player } => format!("{} tapped!", name(player)),
            GameEvent::TapDiscarded { tapper, owner, card } => {
                if tapper == owner {
                    format!("{} snapped their {card}", name(tapper))
                } else {
                    format!("{} snapped {card} from {}", name(tapper), name(owner))
                }
            }
            GameEvent::TapFailed { tapper, .. } => {
                format!("{} tapped wrong and takes a penalty card", name(tapper))
            }
            GameEvent::TapCardGiven { from, to, .. } => {
                format!("{} gave a card to {}", name(from), name(to))
            }
            GameEvent::TapClosed => "Tap window closed".to_string(),
            GameEvent::KabooCalled { caller, automatic } => match (caller, automatic) {
                (Some(caller), false) => format!("{} called KABOO!", name(caller)),
                (Some(caller), true) => format!("{} is out of cards: KABOO!", name(caller)),
                (None, _) => "KABOO!".to_string(),
            },
            GameEvent::TurnEnded { player } => format!("{} ended their turn", name(player)),
            GameEvent::RoundEnded { reason } => match reason {
                RoundEndReason::KabooFinished => "Final round complete".to_string(),
                RoundEndReason::DeckExhausted => "The draw pile ran out".to_string(),
            },
            GameEvent::CardsRevealed => "All cards revealed".to_string(),
            GameEvent::RoundScored { scores, penalized } => {
                let parts: Vec<String> = scores
                    .iter()
                    .enumerate()
                    .map(|(idx, score)| format!("{} {score}", name(&idx)))
                    .collect();
                match penalized {
                    Some(idx) => format!("Scores: {} ({} penalized)", parts.join(", "), name(idx)),
                    None => format!("Scores: {}", parts.join(", ")),
                }
            }
            GameEvent::MatchFinished { winners } => {
                let names: Vec<String> = winners.iter().map(name).collect();
                format!("Match over, winner: {}", names.join(" & "))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    InvalidPlayerIndex { index: usize },
    DuplicateCardId { card_id: CardId },
    CardCountMismatch { expected: usize, actual: usize },
    HeldCardOutsideAction,
    EffectPhaseMismatch,
    TapPhaseMismatch,
}

/// 桌面上一张手牌的位置：(玩家索引, 格位)。
pub type CardLocation = (usize, usize);

/// 一局游戏的完整状态。每局开始时重新创建。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineState {
    #[serde(default)]
    pub players: Vec<Player>,
    pub game_phase: GamePhase,
    pub turn_phase: TurnPhase,
    pub current_player: usize,
    #[serde(default)]
    pub draw_pile: Vec<Card>,
    #[serde(default)]
    pub discard_pile: Vec<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_card: Option<Card>,
    #[serde(default)]
    pub held_from_discard: bool,
    #[serde(default)]
    pub kaboo_called: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaboo_caller: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaboo_turn: Option<u32>,
    #[serde(default)]
    pub final_round_turns_left: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<ActiveEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap: Option<TapState>,
    pub turn_number: u32,
    pub round_number: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_result: Option<RoundResult>,
}

impl EngineState {
    /// 尚未发牌的等待状态。
    pub fn waiting(players: Vec<Player>) -> Self {
        Self {
            players,
            game_phase: GamePhase::Waiting,
            turn_phase: TurnPhase::Draw,
            current_player: 0,
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
            held_card: None,
            held_from_discard: false,
            kaboo_called: false,
            kaboo_caller: None,
            kaboo_turn: None,
            final_round_turns_left: 0,
            effect: None,
            tap: None,
            turn_number: 0,
            round_number: 0,
            event_log: Vec::new(),
            round_result: None,
        }
    }

    /// 用给定牌堆发牌：每人四张背面朝上，再翻开一张作为弃牌堆起点。
    /// 牌堆顶为 `deck` 的末尾。
    pub fn deal(
        mut players: Vec<Player>,
        mut deck: Vec<Card>,
        round_number: u32,
        starting_player: usize,
    ) -> Self {
        for player in &mut players {
            player.cards.clear();
            player.score = 0;
        }
        for card in &mut deck {
            card.face_up = false;
        }
        for _ in 0..HAND_SIZE {
            for player in &mut players {
                if let Some(card) = deck.pop() {
                    player.cards.push(card);
                }
            }
        }
        let mut discard_pile = Vec::new();
        if let Some(mut first) = deck.pop() {
            first.face_up = true;
            discard_pile.push(first);
        }

        let starting_player = if players.is_empty() {
            0
        } else {
            starting_player % players.len()
        };
        let mut state = Self::waiting(players);
        state.game_phase = GamePhase::InitialLook;
        state.current_player = starting_player;
        state.draw_pile = deck;
        state.discard_pile = discard_pile;
        state.turn_number = 1;
        state.round_number = round_number;
        state.record_event(GameEvent::RoundDealt {
            round: round_number,
            starting_player,
        });
        state
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current(&self) -> Option<&Player> {
        self.players.get(self.current_player)
    }

    pub fn is_round_active(&self) -> bool {
        matches!(self.game_phase, GamePhase::Playing | GamePhase::KabooFinal)
    }

    pub fn top_discard(&self) -> Option<&Card> {
        self.discard_pile.last()
    }

    pub fn locate_card(&self, card_id: CardId) -> Option<CardLocation> {
        self.players.iter().enumerate().find_map(|(player_idx, player)| {
            player
                .find_card_index(card_id)
                .map(|slot| (player_idx, slot))
        })
    }

    pub fn owner_of(&self, card_id: CardId) -> Option<usize> {
        self.locate_card(card_id).map(|(owner, _)| owner)
    }

    pub fn card_at(&self, location: CardLocation) -> Option<&Card> {
        self.players.get(location.0)?.cards.get(location.1)
    }

    pub fn hand_card(&self, card_id: CardId) -> Option<&Card> {
        self.locate_card(card_id)
            .and_then(|location| self.card_at(location))
    }

    /// 在桌面任意位置（手牌、持牌、牌堆）查找一张牌。
    pub fn find_card(&self, card_id: CardId) -> Option<&Card> {
        self.hand_card(card_id)
            .or_else(|| self.held_card.as_ref().filter(|card| card.id == card_id))
            .or_else(|| self.discard_pile.iter().find(|card| card.id == card_id))
            .or_else(|| self.draw_pile.iter().find(|card| card.id == card_id))
    }

    /// 交换两张手牌的位置，牌面一律翻回背面。
    pub fn swap_positions(&mut self, first: CardId, second: CardId) -> bool {
        let (Some(a), Some(b)) = (self.locate_card(first), self.locate_card(second)) else {
            return false;
        };
        if a == b {
            return false;
        }
        let mut card_a = self.players[a.0].cards[a.1].clone();
        let mut card_b = self.players[b.0].cards[b.1].clone();
        card_a.face_up = false;
        card_b.face_up = false;
        self.players[a.0].cards[a.1] = card_b;
        self.players[b.0].cards[b.1] = card_a;
        true
    }

    pub fn first_empty_hand(&self) -> Option<usize> {
        self.players.iter().position(|player| player.cards.is_empty())
    }

    /// 宣布 Kaboo。每局只生效一次。
    pub fn declare_kaboo(&mut self, caller: Option<usize>, automatic: bool) -> Option<GameEvent> {
        if self.kaboo_called {
            return None;
        }
        self.kaboo_called = true;
        self.kaboo_caller = caller;
        self.kaboo_turn = Some(self.turn_number);
        self.final_round_turns_left = self.players.len().saturating_sub(1);
        self.game_phase = GamePhase::KabooFinal;
        let event = GameEvent::KabooCalled { caller, automatic };
        self.record_event(event.clone());
        Some(event)
    }

    pub fn reveal_all(&mut self) {
        for player in &mut self.players {
            for card in &mut player.cards {
                card.face_up = true;
            }
        }
    }

    pub fn effect_type(&self) -> EffectType {
        self.effect
            .as_ref()
            .map(ActiveEffect::effect_type)
            .unwrap_or(EffectType::None)
    }

    pub fn effect_step(&self) -> Option<EffectStep> {
        self.effect.as_ref().and_then(ActiveEffect::step)
    }

    pub fn selected_cards(&self) -> Vec<CardId> {
        self.effect
            .as_ref()
            .map(ActiveEffect::selected_cards)
            .unwrap_or_default()
    }

    /// 当前效果中已向行动者亮出的牌。
    pub fn peeked_cards(&self) -> Vec<CardId> {
        self.effect
            .as_ref()
            .map(ActiveEffect::preview_card_ids)
            .unwrap_or_default()
    }

    pub fn total_cards(&self) -> usize {
        self.draw_pile.len()
            + self.discard_pile.len()
            + self
                .players
                .iter()
                .map(|player| player.cards.len())
                .sum::<usize>()
            + usize::from(self.held_card.is_some())
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if !self.players.is_empty() && self.current_player >= self.players.len() {
            return Err(IntegrityError::InvalidPlayerIndex {
                index: self.current_player,
            });
        }

        if self.game_phase != GamePhase::Waiting {
            let actual = self.total_cards();
            if actual != DECK_SIZE {
                return Err(IntegrityError::CardCountMismatch {
                    expected: DECK_SIZE,
                    actual,
                });
            }
        }

        let mut seen = HashSet::new();
        let all_cards = self
            .players
            .iter()
            .flat_map(|player| player.cards.iter())
            .chain(self.draw_pile.iter())
            .chain(self.discard_pile.iter())
            .chain(self.held_card.iter());
        for card in all_cards {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
        }

        if self.held_card.is_some() && self.turn_phase != TurnPhase::Action {
            return Err(IntegrityError::HeldCardOutsideAction);
        }
        if self.effect.is_some() != (self.turn_phase == TurnPhase::Effect) {
            return Err(IntegrityError::EffectPhaseMismatch);
        }
        if self.tap.is_some() != (self.turn_phase == TurnPhase::TapWindow) {
            return Err(IntegrityError::TapPhaseMismatch);
        }

        Ok(())
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::waiting(Vec::new())
    }
}
