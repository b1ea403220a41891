//! 按玩家裁剪的状态投影：隐藏他人看不到的牌面。

use serde::{Deserialize, Serialize};

use super::cards::{Card, CardId, Rank, Suit};
use super::effects::{EffectStep, EffectType};
use super::scoring::RoundResult;
use super::state::{EngineState, GamePhase, TurnPhase};
use super::tap::TapPhase;

/// 开局查看阶段玩家可以看到的自己的格位。
pub const INITIAL_LOOK_SLOTS: [usize; 2] = [2, 3];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardView {
    pub id: CardId,
    pub face_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suit: Option<Suit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
}

impl CardView {
    fn visible(card: &Card) -> Self {
        Self {
            id: card.id,
            face_up: card.face_up,
            suit: Some(card.suit),
            rank: Some(card.rank),
            value: Some(card.value()),
        }
    }

    fn hidden(card: &Card) -> Self {
        Self {
            id: card.id,
            face_up: false,
            suit: None,
            rank: None,
            value: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.rank.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatView {
    pub index: usize,
    pub name: String,
    pub avatar_color: String,
    pub is_bot: bool,
    pub is_host: bool,
    pub cards: Vec<CardView>,
    pub score: i32,
    pub total_score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TapView {
    pub phase: TapPhase,
    pub discarder: usize,
    pub rank: Rank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tapper: Option<usize>,
    pub selected_card_ids: Vec<CardId>,
    pub swap_targets: Vec<usize>,
    pub swaps_remaining: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerView {
    pub viewer: usize,
    pub game_phase: GamePhase,
    pub turn_phase: TurnPhase,
    pub current_player: usize,
    pub seats: Vec<SeatView>,
    pub draw_pile_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_discard: Option<Card>,
    pub discard_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_card: Option<CardView>,
    pub held_from_discard: bool,
    pub kaboo_called: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaboo_caller: Option<usize>,
    pub final_round_turns_left: usize,
    pub effect_type: EffectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_step: Option<EffectStep>,
    /// 只有效果的行动者能看到自己的选择。
    pub selected_cards: Vec<CardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap: Option<TapView>,
    pub turn_number: u32,
    pub round_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_result: Option<RoundResult>,
}

impl PlayerView {
    pub fn for_player(state: &EngineState, viewer: usize) -> Self {
        let acting = state
            .effect
            .as_ref()
            .map(|effect| effect.actor() == viewer)
            .unwrap_or(false);
        let previews = if acting {
            state.peeked_cards()
        } else {
            Vec::new()
        };
        let initial_look = state.game_phase == GamePhase::InitialLook;

        let seats = state
            .players
            .iter()
            .enumerate()
            .map(|(index, player)| {
                let cards = player
                    .cards
                    .iter()
                    .enumerate()
                    .map(|(slot, card)| {
                        let own_look =
                            initial_look && index == viewer && INITIAL_LOOK_SLOTS.contains(&slot);
                        if card.face_up || own_look || previews.contains(&card.id) {
                            CardView::visible(card)
                        } else {
                            CardView::hidden(card)
                        }
                    })
                    .collect();
                SeatView {
                    index,
                    name: player.name.clone(),
                    avatar_color: player.avatar_color.clone(),
                    is_bot: player.is_bot,
                    is_host: player.is_host,
                    cards,
                    score: player.score,
                    total_score: player.total_score,
                }
            })
            .collect();

        let held_card = state.held_card.as_ref().map(|card| {
            if state.current_player == viewer || state.held_from_discard {
                CardView::visible(card)
            } else {
                CardView::hidden(card)
            }
        });

        let tap = state.tap.as_ref().map(|tap| TapView {
            phase: tap.phase,
            discarder: tap.discarder,
            rank: tap.rank,
            tapper: tap.tapper,
            selected_card_ids: tap.selected_card_ids.clone(),
            swap_targets: tap.swap_targets.clone(),
            swaps_remaining: tap.swaps_remaining,
        });

        Self {
            viewer,
            game_phase: state.game_phase,
            turn_phase: state.turn_phase,
            current_player: state.current_player,
            seats,
            draw_pile_count: state.draw_pile.len(),
            top_discard: state.top_discard().cloned(),
            discard_count: state.discard_pile.len(),
            held_card,
            held_from_discard: state.held_from_discard,
            kaboo_called: state.kaboo_called,
            kaboo_caller: state.kaboo_caller,
            final_round_turns_left: state.final_round_turns_left,
            effect_type: state.effect_type(),
            effect_step: state.effect_step(),
            selected_cards: if acting {
                state.selected_cards()
            } else {
                Vec::new()
            },
            tap,
            turn_number: state.turn_number,
            round_number: state.round_number,
            round_result: state.round_result.clone(),
        }
    }

    pub fn seat(&self, index: usize) -> Option<&SeatView> {
        self.seats.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::create_deck;
    use crate::game::effects::EffectEngine;
    use crate::game::state::Player;

    fn dealt() -> EngineState {
        let players = vec![Player::new(0, "Ada", "#e57373"), Player::bot(1, "Bot", "#64b5f6")];
        EngineState::deal(players, create_deck(), 1, 0)
    }

    #[test]
    fn face_down_cards_hide_their_identity() {
        let mut state = dealt();
        state.game_phase = GamePhase::Playing;
        let view = PlayerView::for_player(&state, 0);
        assert!(view
            .seats
            .iter()
            .flat_map(|seat| seat.cards.iter())
            .all(|card| !card.is_known()));
        assert!(view.top_discard.is_some());

        let json = serde_json::to_string(&view).expect("view serializes");
        assert!(!json.contains("\"rank\":\"K\""), "face-down king leaked: {json}");
    }

    #[test]
    fn initial_look_shows_own_bottom_row_only() {
        let state = dealt();
        let view = PlayerView::for_player(&state, 0);
        let own = view.seat(0).expect("own seat");
        let known: Vec<bool> = own.cards.iter().map(CardView::is_known).collect();
        assert_eq!(known, vec![false, false, true, true]);
        assert!(view.seat(1).map(|seat| seat.cards.iter().all(|card| !card.is_known())).unwrap_or(false));
    }

    #[test]
    fn held_card_is_private_unless_taken_from_discard() {
        let mut state = dealt();
        state.game_phase = GamePhase::Playing;
        state.turn_phase = TurnPhase::Action;
        let mut card = state.draw_pile.pop().expect("draw pile");
        card.face_up = true;
        state.held_card = Some(card);
        assert!(PlayerView::for_player(&state, 0).held_card.map(|card| card.is_known()).unwrap_or(false));
        assert!(!PlayerView::for_player(&state, 1).held_card.map(|card| card.is_known()).unwrap_or(true));
        state.held_from_discard = true;
        assert!(PlayerView::for_player(&state, 1).held_card.map(|card| card.is_known()).unwrap_or(false));
    }

    #[test]
    fn peeked_card_is_visible_to_the_actor_only() {
        let mut state = dealt();
        state.game_phase = GamePhase::Playing;
        EffectEngine.begin(&mut state, 0, EffectType::PeekOpponent);
        let target = state.players[1].cards[0].id;
        EffectEngine.resolve(&mut state, 0, target).expect("peek");

        let actor_view = PlayerView::for_player(&state, 0);
        assert!(actor_view.seats[1].cards[0].is_known());
        assert_eq!(actor_view.selected_cards, vec![target]);

        let other_view = PlayerView::for_player(&state, 1);
        assert!(!other_view.seats[1].cards[0].is_known());
        assert!(other_view.selected_cards.is_empty());
    }
}
