use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::model::ChatMessage;

/// 会话游标
///
/// 记录该会话"已经作为通知浮现过"的最新位置。只前进不后退：
/// 远端短暂返回比上次更少的消息时，游标保持原位，同一条消息
/// 不会二次触发。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationCursor {
    pub last_seen_id: Option<u64>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl ConversationCursor {
    /// 消息是否在游标之后（尚未被观察）
    pub fn is_new(&self, message: &ChatMessage) -> bool {
        match self.last_seen_id {
            Some(id) => message.id > id,
            None => true,
        }
    }

    /// 吸收一条已观察的消息，单调推进
    pub fn observe(&mut self, message: &ChatMessage) {
        if self.last_seen_id.map_or(true, |id| message.id > id) {
            self.last_seen_id = Some(message.id);
        }
        if self.last_seen_at.map_or(true, |at| message.created_at > at) {
            self.last_seen_at = Some(message.created_at);
        }
    }
}

/// 游标存储：对端用户ID -> 会话游标
///
/// DashMap 支撑引擎与调用方并发读取，无须整体加锁。
pub struct CursorStore {
    inner: DashMap<u64, ConversationCursor>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// 读取会话游标（尚无记录时返回空游标）
    pub fn get(&self, peer_id: u64) -> ConversationCursor {
        self.inner
            .get(&peer_id)
            .map(|c| *c.value())
            .unwrap_or_default()
    }

    /// 吸收一次完整的会话快照
    ///
    /// 无论是否发现新消息都要调用，游标始终追踪最近一次观察到的状态。
    pub fn observe_snapshot(&self, peer_id: u64, messages: &[ChatMessage]) {
        if messages.is_empty() {
            return;
        }
        let mut entry = self.inner.entry(peer_id).or_default();
        for message in messages {
            entry.observe(message);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for CursorStore {
    fn default() -> Self {
        Self::new()
    }
}
