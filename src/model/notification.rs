use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::ChatMessage;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 新聊天消息
    Message,
    /// 系统提示（如会话过期）
    System,
}

/// 通知条目
///
/// 仅存在于客户端内存，随进程生命周期销毁；与远端持久化的
/// `ChatMessage` 是两回事。`id` 沿用触发消息的 id，插入前按 id 去重。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub id: u64,
    pub title: String,
    /// 截断后的内容预览
    pub message: String,
    pub time: DateTime<Utc>,
    pub read: bool,
    pub kind: NotificationKind,
    /// 所属会话（对端用户ID）
    pub conversation: u64,
}

impl NotificationEntry {
    /// 由入站消息构造通知
    pub fn from_message(
        msg: &ChatMessage,
        conversation: u64,
        title: impl Into<String>,
        preview_chars: usize,
    ) -> Self {
        Self {
            id: msg.id,
            title: title.into(),
            message: msg.preview(preview_chars),
            time: msg.created_at,
            read: false,
            kind: NotificationKind::Message,
            conversation,
        }
    }

    /// 系统通知（不挂在任何会话上，conversation = 0）
    pub fn system(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            message: message.into(),
            time: Utc::now(),
            read: false,
            kind: NotificationKind::System,
            conversation: 0,
        }
    }
}
