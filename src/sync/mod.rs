//! 轮询同步核心
//!
//! 统一的会话游标 + 按角色分派的轮询引擎。三处各自为政的水位策略
//! （最后消息ID / 长度差 / 时间阈值）在这里收敛为每会话一份
//! `(last_seen_id, last_seen_at)` 游标，新旧判定一律以消息 id 为准。

pub mod cursor;
pub mod engine;

pub use cursor::{ConversationCursor, CursorStore};
pub use engine::{EngineOptions, PollOutcome, SyncEngine};
