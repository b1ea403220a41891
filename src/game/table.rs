//! 牌桌调度：持有唯一的 `EngineState`，驱动计时器与机器人。

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cards::{Card, CardId, HAND_SIZE};
use super::effects::{ActiveEffect, EffectStep, EffectType};
use super::rules::{RuleEngine, RuleError};
use super::settings::{ConfigError, GameSettings, Timing, MAX_PLAYERS, MIN_PLAYERS};
use super::state::{EngineState, GameEvent, GamePhase, Player, TurnPhase};
use super::tap::TapPhase;
use super::timers::{FiredTimer, Scheduler, TimerId};
use super::view::PlayerView;
use crate::ai::{BotAgent, BotConfig, BotMemory, DrawChoice, EffectPlan, PlayDecision};

const AVATAR_COLORS: [&str; MAX_PLAYERS] = [
    "#e57373", "#64b5f6", "#81c784", "#ffb74d", "#ba68c8", "#4db6ac",
];

/// 一次阶段同步最多连续进入的阶段数。
const MAX_SYNC_STEPS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerKind {
    InitialLook,
    /// 人类玩家回合计时，以 (局, 回合) 而不是阶段代数判断是否过期。
    TurnTimeout { round: u32, turn: u32 },
    EffectTimeout,
    PeekReveal,
    TapWindow,
    TapStall,
    KabooBanner,
    BotTurn { player: usize },
    BotEffect { player: usize },
    BotTap { player: usize, cards: Vec<CardId> },
}

/// 外部可提交的一个动作，JSON 形如 `{"type":"draw_card","player":0}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableAction {
    FinishInitialLook,
    DrawCard { player: usize },
    DrawFromDiscard { player: usize },
    SwapCard { player: usize, card_id: CardId },
    DiscardHeldCard { player: usize },
    DiscardPair { player: usize, first: CardId, second: CardId },
    ResolveEffect { player: usize, card_id: CardId },
    ConfirmEffect { player: usize },
    DeclineEffect { player: usize },
    ActivateTap { player: usize },
    TapSelectCard { player: usize, card_id: CardId },
    ConfirmTapDiscard { player: usize },
    TapSwapCard { player: usize, card_id: CardId },
    SkipTapSwap { player: usize },
    CallKaboo { player: usize },
    EndTurn { player: usize },
    RevealAllCards,
    StartNextRound,
    ResetMatch,
    Advance { ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseKey {
    round: u32,
    turn: u32,
    game_phase: GamePhase,
    turn_phase: TurnPhase,
    effect_step: Option<EffectStep>,
    previews: usize,
    tap_phase: Option<TapPhase>,
}

impl PhaseKey {
    fn of(state: &EngineState) -> Self {
        Self {
            round: state.round_number,
            turn: state.turn_number,
            game_phase: state.game_phase,
            turn_phase: state.turn_phase,
            effect_step: state.effect_step(),
            previews: state.peeked_cards().len(),
            tap_phase: state.tap.as_ref().map(|tap| tap.phase),
        }
    }
}

struct BotSeat {
    agent: BotAgent,
    memory: BotMemory,
}

pub struct Table {
    rules: RuleEngine,
    state: EngineState,
    scheduler: Scheduler<TimerKind>,
    bots: Vec<Option<BotSeat>>,
    generation: u64,
    phase_key: Option<PhaseKey>,
    /// 当前阶段安排的计时器，离开阶段时取消。
    phase_timers: Vec<TimerId>,
    /// 回合计时器只在回合变化时取消。
    turn_timer: Option<(u32, u32, TimerId)>,
    rng: SmallRng,
}

impl Table {
    pub fn new(
        mut settings: GameSettings,
        players: Vec<Player>,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) {
            return Err(ConfigError::PlayerCount(players.len()));
        }
        settings.player_count = players.len();
        settings.validate()?;

        let config = BotConfig::from_difficulty(settings.bot_difficulty);
        let bots = players
            .iter()
            .enumerate()
            .map(|(idx, player)| {
                player.is_bot.then(|| BotSeat {
                    agent: match seed {
                        Some(seed) => BotAgent::with_seed(config.clone(), seed.wrapping_add(idx as u64 + 1)),
                        None => BotAgent::new(config.clone()),
                    },
                    memory: BotMemory::new(),
                })
            })
            .collect();
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Ok(Self {
            rules: RuleEngine::new(settings),
            state: EngineState::waiting(players),
            scheduler: Scheduler::new(),
            bots,
            generation: 0,
            phase_key: None,
            phase_timers: Vec::new(),
            turn_timer: None,
            rng,
        })
    }

    /// 一名人类玩家坐 0 号位，其余座位由机器人填满。
    pub fn with_bots(
        settings: GameSettings,
        human_name: &str,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let count = settings.player_count;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(ConfigError::PlayerCount(count));
        }
        let mut players = Vec::with_capacity(count);
        let mut human = Player::new(0, human_name, AVATAR_COLORS[0]);
        human.is_host = true;
        human.is_ready = true;
        players.push(human);
        for idx in 1..count {
            players.push(Player::bot(idx as u8, format!("Bot {idx}"), AVATAR_COLORS[idx]));
        }
        Self::new(settings, players, seed)
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn settings(&self) -> &GameSettings {
        self.rules.settings()
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn is_bot(&self, seat: usize) -> bool {
        matches!(self.bots.get(seat), Some(Some(_)))
    }

    pub fn view_for(&self, viewer: usize) -> PlayerView {
        PlayerView::for_player(&self.state, viewer)
    }

    pub fn turn_log(&self) -> Vec<String> {
        self.state
            .event_log
            .iter()
            .map(|event| event.describe(&self.state.players))
            .collect()
    }

    fn timing(&self) -> Timing {
        self.rules.settings().timing.clone()
    }

    fn match_over(&self) -> bool {
        self.state
            .round_result
            .as_ref()
            .map(|result| result.match_over)
            .unwrap_or(false)
    }

    /// 发下一局。只在等待开局或上一局亮牌且比赛未结束时有效。
    pub fn start_next_round(&mut self) -> Vec<GameEvent> {
        let ready = match self.state.game_phase {
            GamePhase::Waiting => true,
            GamePhase::Reveal => !self.match_over(),
            _ => false,
        };
        if !ready {
            debug!(phase = ?self.state.game_phase, "next round ignored");
            return Vec::new();
        }
        let players = self.state.players.clone();
        let round = self.state.round_number + 1;
        let state = self.rules.deal_round(players, round, &mut self.rng);
        self.begin_round(state)
    }

    /// 用指定牌堆开始下一局（牌堆顶为末尾），用于回放与测试。
    pub fn start_round_with_deck(&mut self, deck: Vec<Card>) -> Vec<GameEvent> {
        let players = self.state.players.clone();
        let round = self.state.round_number + 1;
        let state = self.rules.deal_with_deck(players, round, deck);
        self.begin_round(state)
    }

    /// 清空总分，从第一局重新开始。
    pub fn reset_match(&mut self) -> Vec<GameEvent> {
        let mut players = self.state.players.clone();
        for player in &mut players {
            player.cards.clear();
            player.score = 0;
            player.total_score = 0;
        }
        info!("match reset");
        let state = self.rules.deal_round(players, 1, &mut self.rng);
        self.begin_round(state)
    }

    fn begin_round(&mut self, state: EngineState) -> Vec<GameEvent> {
        self.state = state;
        self.scheduler.clear();
        self.phase_timers.clear();
        self.turn_timer = None;
        self.phase_key = None;
        for seat in self.bots.iter_mut().flatten() {
            seat.memory.clear();
        }
        let mut events = self.state.event_log.clone();
        events.extend(self.sync());
        events
    }

    pub fn apply(&mut self, action: TableAction) -> Vec<GameEvent> {
        match action {
            TableAction::FinishInitialLook => self.finish_initial_look(),
            TableAction::DrawCard { player } => self.draw_card(player),
            TableAction::DrawFromDiscard { player } => self.draw_from_discard(player),
            TableAction::SwapCard { player, card_id } => self.swap_card(player, card_id),
            TableAction::DiscardHeldCard { player } => self.discard_held_card(player),
            TableAction::DiscardPair {
                player,
                first,
                second,
            } => self.discard_pair(player, first, second),
            TableAction::ResolveEffect { player, card_id } => self.resolve_effect(player, card_id),
            TableAction::ConfirmEffect { player } => self.confirm_effect(player),
            TableAction::DeclineEffect { player } => self.decline_effect(player),
            TableAction::ActivateTap { player } => self.activate_tap(player),
            TableAction::TapSelectCard { player, card_id } => self.tap_select_card(player, card_id),
            TableAction::ConfirmTapDiscard { player } => self.confirm_tap_discard(player),
            TableAction::TapSwapCard { player, card_id } => self.tap_swap_card(player, card_id),
            TableAction::SkipTapSwap { player } => self.skip_tap_swap(player),
            TableAction::CallKaboo { player } => self.call_kaboo(player),
            TableAction::EndTurn { player } => self.end_turn(player),
            TableAction::RevealAllCards => self.reveal_all_cards(),
            TableAction::StartNextRound => self.start_next_round(),
            TableAction::ResetMatch => self.reset_match(),
            TableAction::Advance { ms } => self.advance(ms),
        }
    }

    pub fn finish_initial_look(&mut self) -> Vec<GameEvent> {
        self.act(|rules, state| rules.finish_initial_look(state))
    }

    pub fn draw_card(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.draw_card(state, actor))
    }

    pub fn draw_from_discard(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.draw_from_discard(state, actor))
    }

    pub fn swap_card(&mut self, actor: usize, card_id: CardId) -> Vec<GameEvent> {
        self.act(|rules, state| rules.swap_card(state, actor, card_id))
    }

    pub fn discard_held_card(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.discard_held_card(state, actor))
    }

    pub fn discard_pair(&mut self, actor: usize, first: CardId, second: CardId) -> Vec<GameEvent> {
        self.act(|rules, state| rules.discard_pair(state, actor, first, second))
    }

    pub fn resolve_effect(&mut self, actor: usize, card_id: CardId) -> Vec<GameEvent> {
        self.act(|rules, state| rules.resolve_effect(state, actor, card_id))
    }

    pub fn confirm_effect(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.confirm_effect(state, actor))
    }

    pub fn decline_effect(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.decline_effect(state, actor))
    }

    pub fn activate_tap(&mut self, player: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.activate_tap(state, player))
    }

    pub fn tap_select_card(&mut self, player: usize, card_id: CardId) -> Vec<GameEvent> {
        self.act(|rules, state| rules.tap_select_card(state, player, card_id))
    }

    pub fn confirm_tap_discard(&mut self, player: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.confirm_tap_discard(state, player))
    }

    pub fn tap_swap_card(&mut self, player: usize, card_id: CardId) -> Vec<GameEvent> {
        self.act(|rules, state| rules.tap_swap_card(state, player, card_id))
    }

    pub fn skip_tap_swap(&mut self, player: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.skip_tap_swap(state, player))
    }

    pub fn call_kaboo(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.call_kaboo(state, actor))
    }

    pub fn end_turn(&mut self, actor: usize) -> Vec<GameEvent> {
        self.act(|rules, state| rules.end_turn(state, actor))
    }

    pub fn reveal_all_cards(&mut self) -> Vec<GameEvent> {
        self.act(|rules, state| rules.reveal_all_cards(state))
    }

    /// 推进虚拟时钟，依次触发到期的计时器。
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<GameEvent> {
        let until = self.scheduler.now_ms().saturating_add(elapsed_ms);
        let mut events = Vec::new();
        while let Some(timer) = self.scheduler.pop_due(until) {
            events.extend(self.fire(timer));
            events.extend(self.sync());
        }
        self.scheduler.set_now(until);
        events
    }

    fn act<F>(&mut self, action: F) -> Vec<GameEvent>
    where
        F: FnOnce(&RuleEngine, &mut EngineState) -> Result<Vec<GameEvent>, RuleError>,
    {
        let mut events = self.run(action);
        events.extend(self.sync());
        events
    }

    /// 执行一个操作；被拒绝的操作静默忽略。
    fn run<F>(&mut self, action: F) -> Vec<GameEvent>
    where
        F: FnOnce(&RuleEngine, &mut EngineState) -> Result<Vec<GameEvent>, RuleError>,
    {
        match action(&self.rules, &mut self.state) {
            Ok(events) => {
                self.absorb(&events);
                events
            }
            Err(error) => {
                debug!(
                    round = self.state.round_number,
                    turn = self.state.turn_number,
                    %error,
                    "action ignored"
                );
                Vec::new()
            }
        }
    }

    /// 把公开或私有的信息写进各机器人的记忆。
    fn absorb(&mut self, events: &[GameEvent]) {
        let turn = self.state.turn_number;
        for event in events {
            match event {
                GameEvent::CardDrawn {
                    player,
                    card_id,
                    from_discard,
                } => {
                    let Some(value) = self.state.find_card(*card_id).map(Card::value) else {
                        continue;
                    };
                    for (seat, bot) in self.bots.iter_mut().enumerate() {
                        if let Some(bot) = bot {
                            if seat == *player || *from_discard {
                                bot.memory.remember(*card_id, value, turn);
                            }
                        }
                    }
                }
                GameEvent::CardSwapped { discarded, .. } => self.forget_everywhere(&[discarded.id]),
                GameEvent::CardDiscarded { card, .. } | GameEvent::TapDiscarded { card, .. } => {
                    self.forget_everywhere(&[card.id])
                }
                GameEvent::PairDiscarded { cards, .. } => {
                    let ids: Vec<CardId> = cards.iter().map(|card| card.id).collect();
                    self.forget_everywhere(&ids);
                }
                GameEvent::CardPeeked {
                    viewer, card_id, ..
                } => {
                    let value = self.state.find_card(*card_id).map(Card::value);
                    if let (Some(value), Some(Some(bot))) = (value, self.bots.get_mut(*viewer)) {
                        bot.memory.remember(*card_id, value, turn);
                    }
                }
                GameEvent::CardsSwapped {
                    actor,
                    first,
                    second,
                    seen,
                } => {
                    self.forget_everywhere(&[*first, *second]);
                    let learned: Vec<(CardId, i32)> = seen
                        .iter()
                        .filter_map(|id| self.state.find_card(*id).map(|card| (*id, card.value())))
                        .collect();
                    if let Some(Some(bot)) = self.bots.get_mut(*actor) {
                        for (card_id, value) in learned {
                            bot.memory.remember(card_id, value, turn);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn forget_everywhere(&mut self, card_ids: &[CardId]) {
        for bot in self.bots.iter_mut().flatten() {
            for card_id in card_ids {
                bot.memory.forget(*card_id);
            }
        }
    }

    /// 阶段变化时作废旧计时器并进入新阶段，直到状态稳定。
    fn sync(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..MAX_SYNC_STEPS {
            let key = PhaseKey::of(&self.state);
            if self.phase_key == Some(key) {
                return events;
            }
            self.phase_key = Some(key);
            self.cancel_stale_timers(key);
            self.generation += 1;
            debug!(
                generation = self.generation,
                round = key.round,
                turn = key.turn,
                game_phase = ?key.game_phase,
                turn_phase = ?key.turn_phase,
                "phase entered"
            );
            events.extend(self.on_enter(key));
        }
        debug!("phase sync did not settle");
        events
    }

    fn schedule(&mut self, delay_ms: u64, kind: TimerKind) {
        let turn_guard = match &kind {
            TimerKind::TurnTimeout { round, turn } => Some((*round, *turn)),
            _ => None,
        };
        let id = self.scheduler.schedule(delay_ms, self.generation, kind);
        match turn_guard {
            Some((round, turn)) => {
                if let Some((_, _, previous)) = self.turn_timer.replace((round, turn, id)) {
                    self.scheduler.cancel(previous);
                }
            }
            None => self.phase_timers.push(id),
        }
    }

    fn cancel_stale_timers(&mut self, key: PhaseKey) {
        for id in self.phase_timers.drain(..) {
            self.scheduler.cancel(id);
        }
        if let Some((round, turn, id)) = self.turn_timer {
            if round != key.round || turn != key.turn {
                self.scheduler.cancel(id);
                self.turn_timer = None;
            }
        }
    }

    fn on_enter(&mut self, key: PhaseKey) -> Vec<GameEvent> {
        let timing = self.timing();
        match key.game_phase {
            GamePhase::InitialLook => {
                self.bot_initial_look();
                self.schedule(timing.initial_look_ms, TimerKind::InitialLook);
                Vec::new()
            }
            GamePhase::Playing | GamePhase::KabooFinal => self.enter_turn_phase(key, &timing),
            GamePhase::Waiting | GamePhase::Dealing | GamePhase::Reveal => Vec::new(),
        }
    }

    fn enter_turn_phase(&mut self, key: PhaseKey, timing: &Timing) -> Vec<GameEvent> {
        let current = self.state.current_player;
        match key.turn_phase {
            TurnPhase::Draw => {
                if self.is_bot(current) {
                    self.schedule(timing.bot_think_ms, TimerKind::BotTurn { player: current });
                } else {
                    let turn_ms = self.rules.settings().turn_timer_ms();
                    self.schedule(
                        turn_ms,
                        TimerKind::TurnTimeout {
                            round: key.round,
                            turn: key.turn,
                        },
                    );
                }
                Vec::new()
            }
            TurnPhase::Action => Vec::new(),
            TurnPhase::Effect => {
                let Some(effect) = self.state.effect.as_ref() else {
                    return Vec::new();
                };
                let actor = effect.actor();
                if effect.peek_target().is_some() {
                    self.schedule(timing.peek_reveal_ms, TimerKind::PeekReveal);
                } else {
                    self.schedule(timing.effect_timeout_ms, TimerKind::EffectTimeout);
                    if self.is_bot(actor) {
                        self.schedule(timing.bot_think_ms, TimerKind::BotEffect { player: actor });
                    }
                }
                Vec::new()
            }
            TurnPhase::TapWindow => match key.tap_phase {
                Some(TapPhase::Window) => {
                    self.schedule(timing.tap_window_ms, TimerKind::TapWindow);
                    self.plan_bot_taps();
                    Vec::new()
                }
                Some(TapPhase::Selecting) => {
                    self.schedule(timing.effect_timeout_ms, TimerKind::TapStall);
                    Vec::new()
                }
                Some(TapPhase::Swapping) => {
                    self.schedule(timing.effect_timeout_ms, TimerKind::TapStall);
                    match self.state.tap.as_ref().and_then(|tap| tap.tapper) {
                        Some(tapper) if self.is_bot(tapper) => self.bot_settle_tap_debt(tapper),
                        _ => Vec::new(),
                    }
                }
                None => Vec::new(),
            },
            TurnPhase::EndTurn => {
                if self.state.kaboo_called && self.state.kaboo_turn == Some(key.turn) {
                    self.schedule(timing.kaboo_banner_ms, TimerKind::KabooBanner);
                    Vec::new()
                } else if self.is_bot(current) {
                    self.run(|rules, state| rules.end_turn(state, current))
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn fire(&mut self, timer: FiredTimer<TimerKind>) -> Vec<GameEvent> {
        let stale = match &timer.kind {
            TimerKind::TurnTimeout { round, turn } => {
                *round != self.state.round_number || *turn != self.state.turn_number
            }
            _ => timer.generation != self.generation,
        };
        if stale {
            debug!(kind = ?timer.kind, at = timer.due_ms, "stale timer ignored");
            return Vec::new();
        }

        match timer.kind {
            TimerKind::InitialLook => self.run(|rules, state| rules.finish_initial_look(state)),
            TimerKind::TurnTimeout { .. } => self.auto_play_turn(),
            TimerKind::EffectTimeout => {
                let actor = self
                    .state
                    .effect
                    .as_ref()
                    .map(ActiveEffect::actor)
                    .unwrap_or(self.state.current_player);
                debug!(player = actor, "effect timed out");
                self.run(|rules, state| rules.decline_effect(state, actor))
            }
            TimerKind::PeekReveal => self.run(|rules, state| rules.complete_peek(state)),
            TimerKind::TapWindow | TimerKind::TapStall => {
                self.run(|rules, state| rules.finalize_tap(state))
            }
            TimerKind::KabooBanner => {
                let current = self.state.current_player;
                self.run(|rules, state| rules.end_turn(state, current))
            }
            TimerKind::BotTurn { player } => self.bot_take_turn(player),
            TimerKind::BotEffect { player } => self.bot_resolve_effect(player),
            TimerKind::BotTap { player, cards } => self.bot_tap(player, &cards),
        }
    }

    /// 回合计时耗尽：替人类玩家走完本回合剩余的步骤。
    fn auto_play_turn(&mut self) -> Vec<GameEvent> {
        let round = self.state.round_number;
        let turn = self.state.turn_number;
        let player = self.state.current_player;
        info!(round, turn, player, "turn timer expired");

        let mut events = Vec::new();
        for _ in 0..8 {
            if !self.state.is_round_active()
                || self.state.round_number != round
                || self.state.turn_number != turn
            {
                break;
            }
            let step = match self.state.turn_phase {
                TurnPhase::Draw => self.run(|rules, state| rules.draw_card(state, player)),
                TurnPhase::Action => self.run(|rules, state| rules.discard_held_card(state, player)),
                TurnPhase::Effect => {
                    let actor = self
                        .state
                        .effect
                        .as_ref()
                        .map(ActiveEffect::actor)
                        .unwrap_or(player);
                    self.run(|rules, state| rules.decline_effect(state, actor))
                }
                TurnPhase::TapWindow => self.run(|rules, state| rules.finalize_tap(state)),
                TurnPhase::EndTurn => self.run(|rules, state| rules.end_turn(state, player)),
            };
            if step.is_empty() {
                break;
            }
            events.extend(step);
        }
        events
    }

    fn bot_initial_look(&mut self) {
        let turn = self.state.turn_number;
        for (seat, bot) in self.bots.iter_mut().enumerate() {
            let Some(bot) = bot else {
                continue;
            };
            for card_id in bot.agent.choose_initial_peeks(&self.state, seat) {
                if let Some(card) = self.state.hand_card(card_id) {
                    bot.memory.remember(card_id, card.value(), turn);
                }
            }
        }
    }

    fn plan_bot_taps(&mut self) {
        for seat in 0..self.bots.len() {
            let plan = match self.bots[seat].as_mut() {
                Some(bot) => bot.agent.plan_tap(&self.state, seat, &mut bot.memory),
                None => None,
            };
            if let Some(plan) = plan {
                debug!(player = seat, delay_ms = plan.delay_ms, "bot plans a tap");
                self.schedule(
                    plan.delay_ms,
                    TimerKind::BotTap {
                        player: seat,
                        cards: plan.cards,
                    },
                );
            }
        }
    }

    fn bot_take_turn(&mut self, player: usize) -> Vec<GameEvent> {
        if !self.state.is_round_active()
            || self.state.current_player != player
            || self.state.turn_phase != TurnPhase::Draw
        {
            return Vec::new();
        }
        let (call, source) = match self.bots.get_mut(player).and_then(Option::as_mut) {
            Some(bot) => {
                let call = bot.agent.should_call_kaboo(&self.state, player, &mut bot.memory);
                let source = if call {
                    DrawChoice::DrawPile
                } else {
                    bot.agent.choose_draw_source(&self.state, player, &mut bot.memory)
                };
                (call, source)
            }
            None => return Vec::new(),
        };
        if call {
            return self.run(|rules, state| rules.call_kaboo(state, player));
        }

        let mut events = match source {
            DrawChoice::Discard => self.run(|rules, state| rules.draw_from_discard(state, player)),
            DrawChoice::DrawPile => self.run(|rules, state| rules.draw_card(state, player)),
        };
        if events.is_empty() {
            events = self.run(|rules, state| rules.draw_card(state, player));
        }
        let Some(held) = self.state.held_card.clone() else {
            return events;
        };
        let from_discard = self.state.held_from_discard;

        let decision = match self.bots.get_mut(player).and_then(Option::as_mut) {
            Some(bot) => bot
                .agent
                .decide_drawn_card(&self.state, player, &mut bot.memory, &held, from_discard),
            None => PlayDecision::Discard,
        };
        debug!(player, card = %held, ?decision, "bot plays drawn card");
        events.extend(match decision {
            PlayDecision::Swap { card_id } => {
                self.run(|rules, state| rules.swap_card(state, player, card_id))
            }
            PlayDecision::Discard => self.run(|rules, state| rules.discard_held_card(state, player)),
        });
        if self.state.held_card.is_some() {
            events.extend(self.run(|rules, state| rules.discard_held_card(state, player)));
        }
        events
    }

    fn bot_resolve_effect(&mut self, player: usize) -> Vec<GameEvent> {
        let Some(effect) = self.state.effect.clone() else {
            return Vec::new();
        };
        if effect.actor() != player || self.state.turn_phase != TurnPhase::Effect {
            return Vec::new();
        }
        let before = PhaseKey::of(&self.state);
        let mut events = Vec::new();

        match (effect.effect_type(), effect.step()) {
            (EffectType::SemiBlindSwap, Some(EffectStep::Preview)) => {
                let revealed_value = effect
                    .preview_card_ids()
                    .first()
                    .and_then(|card_id| self.state.find_card(*card_id))
                    .map(Card::value);
                let partner = match (revealed_value, self.bots.get_mut(player).and_then(Option::as_mut)) {
                    (Some(value), Some(bot)) => {
                        bot.agent
                            .choose_semi_blind_partner(&self.state, player, &mut bot.memory, value)
                    }
                    _ => None,
                };
                match partner {
                    Some(card_id) => {
                        events.extend(self.run(|rules, state| rules.resolve_effect(state, player, card_id)));
                        events.extend(self.run(|rules, state| rules.confirm_effect(state, player)));
                    }
                    None => events.extend(self.run(|rules, state| rules.decline_effect(state, player))),
                }
            }
            (EffectType::FullVisionSwap, Some(EffectStep::Preview)) => {
                let selected = effect.selected_cards();
                let own = selected
                    .iter()
                    .copied()
                    .find(|card_id| self.state.owner_of(*card_id) == Some(player));
                let other = selected.iter().copied().find(|card_id| Some(*card_id) != own);
                let value = |card_id: Option<CardId>| {
                    card_id
                        .and_then(|id| self.state.find_card(id))
                        .map(Card::value)
                };
                let accept = match (value(own), value(other), self.bots.get(player)) {
                    (Some(own_value), Some(target_value), Some(Some(bot))) => {
                        bot.agent.accept_revealed_swap(own_value, target_value)
                    }
                    _ => false,
                };
                events.extend(if accept {
                    self.run(|rules, state| rules.confirm_effect(state, player))
                } else {
                    self.run(|rules, state| rules.decline_effect(state, player))
                });
            }
            (effect_type, _) => {
                let plan = match self.bots.get_mut(player).and_then(Option::as_mut) {
                    Some(bot) => bot
                        .agent
                        .plan_effect(&self.state, player, &mut bot.memory, effect_type),
                    None => EffectPlan::Decline,
                };
                debug!(player, ?effect_type, ?plan, "bot resolves effect");
                match plan {
                    EffectPlan::Decline => {
                        events.extend(self.run(|rules, state| rules.decline_effect(state, player)))
                    }
                    EffectPlan::Peek { card_id } | EffectPlan::Reveal { card_id } => {
                        events.extend(self.run(|rules, state| rules.resolve_effect(state, player, card_id)))
                    }
                    EffectPlan::Swap { own, target } => {
                        events.extend(self.run(|rules, state| rules.resolve_effect(state, player, own)));
                        events.extend(self.run(|rules, state| rules.resolve_effect(state, player, target)));
                        if effect_type == EffectType::BlindSwap {
                            events.extend(self.run(|rules, state| rules.confirm_effect(state, player)));
                        }
                    }
                }
            }
        }

        if self.state.turn_phase == TurnPhase::Effect && PhaseKey::of(&self.state) == before {
            events.extend(self.run(|rules, state| rules.decline_effect(state, player)));
        }
        events
    }

    fn bot_tap(&mut self, player: usize, cards: &[CardId]) -> Vec<GameEvent> {
        let open = self
            .state
            .tap
            .as_ref()
            .map(|tap| tap.phase == TapPhase::Window)
            .unwrap_or(false);
        if !open {
            return Vec::new();
        }
        let mut events = self.run(|rules, state| rules.activate_tap(state, player));
        if events.is_empty() {
            return events;
        }
        for card_id in cards.iter().copied() {
            events.extend(self.run(|rules, state| rules.tap_select_card(state, player, card_id)));
        }
        events.extend(self.run(|rules, state| rules.confirm_tap_discard(state, player)));
        events
    }

    fn bot_settle_tap_debt(&mut self, tapper: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..HAND_SIZE * 2 {
            let owes = self
                .state
                .tap
                .as_ref()
                .map(|tap| tap.phase == TapPhase::Swapping && tap.tapper == Some(tapper))
                .unwrap_or(false);
            if !owes {
                break;
            }
            let give = match self.bots.get_mut(tapper).and_then(Option::as_mut) {
                Some(bot) => bot
                    .agent
                    .choose_card_to_give(&self.state, tapper, &mut bot.memory),
                None => None,
            };
            let step = match give {
                Some(card_id) => self.run(|rules, state| rules.tap_swap_card(state, tapper, card_id)),
                None => Vec::new(),
            };
            if step.is_empty() {
                events.extend(self.run(|rules, state| rules.skip_tap_swap(state, tapper)));
                break;
            }
            events.extend(step);
        }
        events
    }
}
