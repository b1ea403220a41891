//! 回合计分与 Kaboo 惩罚。

use serde::{Deserialize, Serialize};

use super::state::{EngineState, GameEvent};

/// 叫 Kaboo 却不是唯一最低分时追加的罚分。
pub const KABOO_PENALTY: i32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundResult {
    pub round: u32,
    /// 未加罚分的手牌点数。
    pub raw_scores: Vec<i32>,
    pub scores: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalized: Option<usize>,
    pub totals: Vec<i32>,
    pub match_over: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub winners: Vec<usize>,
}

pub fn round_scores(state: &EngineState) -> Vec<i32> {
    state.players.iter().map(|player| player.hand_value()).collect()
}

/// 叫牌者分数不是严格最低时加罚，返回被罚的玩家。
pub fn apply_kaboo_penalty(scores: &mut [i32], caller: Option<usize>) -> Option<usize> {
    let caller = caller.filter(|idx| *idx < scores.len())?;
    let caller_score = scores[caller];
    let strictly_lowest = scores
        .iter()
        .enumerate()
        .all(|(idx, score)| idx == caller || caller_score < *score);
    if strictly_lowest {
        return None;
    }
    scores[caller] += KABOO_PENALTY;
    Some(caller)
}

pub fn is_match_over(totals: &[i32], target_score: i32) -> bool {
    totals.iter().any(|total| *total >= target_score)
}

/// 总分最低者获胜，可能并列。
pub fn match_winners(totals: &[i32]) -> Vec<usize> {
    let Some(best) = totals.iter().min().copied() else {
        return Vec::new();
    };
    totals
        .iter()
        .enumerate()
        .filter(|(_, total)| **total == best)
        .map(|(idx, _)| idx)
        .collect()
}

/// 结算本回合：写入每位玩家的 `score` 与 `total_score`，并记录事件。
pub fn resolve_round(state: &mut EngineState, target_score: i32) -> Vec<GameEvent> {
    let raw_scores = round_scores(state);
    let mut scores = raw_scores.clone();
    let penalized = apply_kaboo_penalty(&mut scores, state.kaboo_caller);

    for (player, score) in state.players.iter_mut().zip(&scores) {
        player.score = *score;
        player.total_score += *score;
    }
    let totals: Vec<i32> = state.players.iter().map(|player| player.total_score).collect();
    let match_over = is_match_over(&totals, target_score);
    let winners = if match_over {
        match_winners(&totals)
    } else {
        Vec::new()
    };

    let mut events = vec![GameEvent::RoundScored {
        scores: scores.clone(),
        penalized,
    }];
    if match_over {
        events.push(GameEvent::MatchFinished {
            winners: winners.clone(),
        });
    }
    for event in &events {
        state.record_event(event.clone());
    }

    state.round_result = Some(RoundResult {
        round: state.round_number,
        raw_scores,
        scores,
        penalized,
        totals,
        match_over,
        winners,
    });
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::{Card, Rank, Suit};
    use crate::game::state::Player;

    #[test]
    fn caller_with_strictly_lowest_score_is_not_penalized() {
        let mut scores = vec![15, 20];
        assert_eq!(apply_kaboo_penalty(&mut scores, Some(0)), None);
        assert_eq!(scores, vec![15, 20]);
    }

    #[test]
    fn tied_caller_takes_the_penalty() {
        let mut scores = vec![20, 20];
        assert_eq!(apply_kaboo_penalty(&mut scores, Some(0)), Some(0));
        assert_eq!(scores, vec![40, 20]);
    }

    #[test]
    fn system_kaboo_penalizes_nobody() {
        let mut scores = vec![30, 2, 9];
        assert_eq!(apply_kaboo_penalty(&mut scores, None), None);
        assert_eq!(scores, vec![30, 2, 9]);
    }

    #[test]
    fn winners_share_the_lowest_total() {
        assert_eq!(match_winners(&[104, 57, 57]), vec![1, 2]);
        assert!(is_match_over(&[104, 57, 57], 100));
        assert!(!is_match_over(&[99, 57], 100));
    }

    #[test]
    fn resolve_round_accumulates_totals() {
        let mut ada = Player::new(0, "Ada", "#e57373");
        ada.cards = vec![
            Card::new(0, Suit::Hearts, Rank::Two),
            Card::new(1, Suit::Clubs, Rank::Seven),
            Card::new(2, Suit::Hearts, Rank::King),
            Card::new(3, Suit::Spades, Rank::Nine),
        ];
        ada.total_score = 90;
        let mut ben = Player::new(1, "Ben", "#64b5f6");
        ben.cards = vec![Card::new(4, Suit::Clubs, Rank::Ace)];
        let mut state = EngineState::waiting(vec![ada, ben]);
        state.kaboo_caller = Some(0);

        let events = resolve_round(&mut state, 100);
        let result = state.round_result.clone().expect("round result stored");
        assert_eq!(result.raw_scores, vec![18, 1]);
        assert_eq!(result.scores, vec![38, 1]);
        assert_eq!(result.totals, vec![128, 1]);
        assert!(result.match_over);
        assert_eq!(result.winners, vec![1]);
        assert!(matches!(events.last(), Some(GameEvent::MatchFinished { .. })));
    }
}
