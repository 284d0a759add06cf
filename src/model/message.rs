use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 聊天消息
///
/// 由远端 API 在发送时创建，客户端只读；`id` 在会话内唯一且随时间递增，
/// 可作为高水位游标使用。`created_at` 由服务端赋值，是排序的唯一依据，
/// 客户端不做任何重排。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// 创建消息（测试与回显用；线上消息一律来自远端）
    pub fn new(
        id: u64,
        sender_id: u64,
        receiver_id: u64,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            message: message.into(),
            created_at,
        }
    }

    /// 是否由指定用户发出
    pub fn is_from(&self, user_id: u64) -> bool {
        self.sender_id == user_id
    }

    /// 生成通知预览（按字符截断，避免在多字节边界上切断）
    pub fn preview(&self, max_chars: usize) -> String {
        if self.message.chars().count() <= max_chars {
            return self.message.clone();
        }
        let truncated: String = self.message.chars().take(max_chars).collect();
        format!("{}…", truncated)
    }
}
