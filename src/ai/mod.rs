//! 机器人对手：难度参数、牌值记忆与决策。

pub mod agent;
pub mod difficulty;
pub mod memory;

pub use agent::{BotAgent, DrawChoice, EffectPlan, PlayDecision, TapPlan, UNKNOWN_CARD_ESTIMATE};
pub use difficulty::{BotConfig, BotDifficulty};
pub use memory::{BotMemory, MemoryFact};
