//! 牌组构建、洗牌与计分工具。

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::effects::EffectType;

/// 全局唯一的卡牌标识（单副牌内 0..52）。
pub type CardId = u32;

pub const DECK_SIZE: usize = 52;
pub const HAND_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }

    fn symbol(self) -> char {
        match self {
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
            Suit::Spades => '♠',
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// 牌面点数，A=1，J/Q/K 为 11/12/13。
    pub fn pips(self) -> i32 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }
}

/// 桌面上的一张牌。身份由 `id` 决定，花色与点数创建后不再改变。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub suit: Suit,
    pub rank: Rank,
    #[serde(default)]
    pub face_up: bool,
}

impl Card {
    pub fn new(id: CardId, suit: Suit, rank: Rank) -> Self {
        Self {
            id,
            suit,
            rank,
            face_up: false,
        }
    }

    pub fn value(&self) -> i32 {
        card_value(self)
    }

    pub fn effect(&self) -> EffectType {
        effect_for_rank(self.rank)
    }

    pub fn is_red_king(&self) -> bool {
        self.rank == Rank::King && self.suit.is_red()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.label(), self.suit.symbol())
    }
}

/// 按花色、点数顺序构建 52 张牌，全部背面朝上。
pub fn create_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    let mut next_id: CardId = 0;
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card::new(next_id, suit, rank));
            next_id += 1;
        }
    }
    deck
}

pub fn shuffle_deck<R: Rng + ?Sized>(deck: &mut [Card], rng: &mut R) {
    deck.shuffle(rng);
}

/// 洗好的一副新牌。洗牌后再编号，id 不再泄露花色与点数。
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = create_deck();
    shuffle_deck(&mut deck, rng);
    for (idx, card) in deck.iter_mut().enumerate() {
        card.id = idx as CardId;
    }
    deck
}

/// 红色 K 记 0 分，其余按牌面点数计分。
pub fn card_value(card: &Card) -> i32 {
    if card.is_red_king() {
        0
    } else {
        card.rank.pips()
    }
}

pub fn hand_value(cards: &[Card]) -> i32 {
    cards.iter().map(card_value).sum()
}

pub fn effect_for_rank(rank: Rank) -> EffectType {
    match rank {
        Rank::Seven | Rank::Eight => EffectType::PeekOwn,
        Rank::Nine | Rank::Ten => EffectType::PeekOpponent,
        Rank::Jack => EffectType::BlindSwap,
        Rank::Queen => EffectType::SemiBlindSwap,
        Rank::King => EffectType::FullVisionSwap,
        _ => EffectType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn deck_has_unique_ids_and_full_composition() {
        let deck = create_deck();
        assert_eq!(deck.len(), DECK_SIZE);
        let ids: HashSet<CardId> = deck.iter().map(|card| card.id).collect();
        assert_eq!(ids.len(), DECK_SIZE, "card ids should be unique");
        assert!(deck.iter().all(|card| !card.face_up));
        for rank in Rank::ALL {
            assert_eq!(deck.iter().filter(|card| card.rank == rank).count(), 4);
        }
    }

    #[test]
    fn shuffle_is_deterministic_for_a_seed() {
        let mut first = create_deck();
        let mut second = create_deck();
        shuffle_deck(&mut first, &mut SmallRng::seed_from_u64(7));
        shuffle_deck(&mut second, &mut SmallRng::seed_from_u64(7));
        assert_eq!(first, second);
        assert_ne!(first, create_deck(), "shuffle should reorder the deck");
    }

    #[test]
    fn shuffled_deck_ids_follow_deal_order() {
        let deck = shuffled_deck(&mut SmallRng::seed_from_u64(11));
        let ids: Vec<CardId> = deck.iter().map(|card| card.id).collect();
        assert_eq!(ids, (0..DECK_SIZE as CardId).collect::<Vec<_>>());
        let ranks: HashSet<(Suit, Rank)> = deck.iter().map(|card| (card.suit, card.rank)).collect();
        assert_eq!(ranks.len(), DECK_SIZE);
    }

    #[test]
    fn red_king_is_worth_zero() {
        assert_eq!(card_value(&Card::new(0, Suit::Hearts, Rank::King)), 0);
        assert_eq!(card_value(&Card::new(1, Suit::Diamonds, Rank::King)), 0);
        assert_eq!(card_value(&Card::new(2, Suit::Spades, Rank::King)), 13);
        assert_eq!(card_value(&Card::new(3, Suit::Clubs, Rank::Queen)), 12);
        assert_eq!(card_value(&Card::new(4, Suit::Clubs, Rank::Ace)), 1);
    }

    #[test]
    fn sample_hand_scores_eighteen() {
        let hand = vec![
            Card::new(0, Suit::Hearts, Rank::Two),
            Card::new(1, Suit::Clubs, Rank::Seven),
            Card::new(2, Suit::Hearts, Rank::King),
            Card::new(3, Suit::Spades, Rank::Nine),
        ];
        assert_eq!(hand_value(&hand), 18);
    }

    #[test]
    fn effect_lookup_by_rank() {
        assert_eq!(effect_for_rank(Rank::Seven), EffectType::PeekOwn);
        assert_eq!(effect_for_rank(Rank::Eight), EffectType::PeekOwn);
        assert_eq!(effect_for_rank(Rank::Nine), EffectType::PeekOpponent);
        assert_eq!(effect_for_rank(Rank::Ten), EffectType::PeekOpponent);
        assert_eq!(effect_for_rank(Rank::Jack), EffectType::BlindSwap);
        assert_eq!(effect_for_rank(Rank::Queen), EffectType::SemiBlindSwap);
        assert_eq!(effect_for_rank(Rank::King), EffectType::FullVisionSwap);
        assert_eq!(effect_for_rank(Rank::Six), EffectType::None);
        assert_eq!(effect_for_rank(Rank::Ace), EffectType::None);
    }
}
