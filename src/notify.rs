use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::NotificationEntry;

/// 声音提示能力
///
/// 可注入、可在测试中替换；同步器不持有任何全局音频单例。
/// 引擎保证每个轮询周期至多调用一次 `play`。
pub trait Notifier: Send + Sync {
    /// 播放一次提示音
    fn play(&self);
}

/// 终端响铃提示
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn play(&self) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

/// 静默实现（配置关闭声音时使用）
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn play(&self) {}
}

/// 会话读取状态机
///
/// `Unseen → Unread →（已读/打开会话）→ Seen → Unread → …`
/// 没有终止态，随会话生命周期循环。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unseen,
    Unread,
    Seen,
}

#[derive(Default)]
struct CenterState {
    entries: Vec<NotificationEntry>,
    /// 对端用户ID -> 未读条数
    unread: HashMap<u64, usize>,
    read_state: HashMap<u64, ReadState>,
    /// 全量已读水位（铃铛"全部已读"专用轴）
    last_read_at: Option<DateTime<Utc>>,
}

/// 通知中心
///
/// 持有通知条目列表与各会话的未读状态，全部在内存中，实例私有；
/// 多开实例各自独立，不做跨实例协调。
pub struct NotificationCenter {
    state: RwLock<CenterState>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CenterState::default()),
        }
    }

    /// 插入通知
    ///
    /// 按 id 去重（远端保证 id 唯一，重复即静默丢弃第二次出现）；
    /// 早于全量已读水位的消息不再触发。返回是否真正插入。
    pub fn push(&self, entry: NotificationEntry) -> bool {
        let mut state = self.state.write();
        if state.entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        if let Some(read_at) = state.last_read_at {
            if entry.time <= read_at {
                return false;
            }
        }
        state.entries.push(entry);
        true
    }

    /// 记录会话出现新的入站消息
    pub fn mark_unread(&self, peer_id: u64, count: usize) {
        let mut state = self.state.write();
        *state.unread.entry(peer_id).or_insert(0) += count;
        state.read_state.insert(peer_id, ReadState::Unread);
    }

    /// 已读单个会话
    ///
    /// 只影响该会话：摘除其未读计数与通知条目，其余会话原样保留。
    pub fn mark_read(&self, peer_id: u64) {
        let mut state = self.state.write();
        state.unread.remove(&peer_id);
        state.read_state.insert(peer_id, ReadState::Seen);
        state.entries.retain(|e| e.conversation != peer_id);
    }

    /// 全部已读（铃铛关闭时的粗粒度轴）
    ///
    /// 清空通知列表、清零未读、推进全量已读水位到当前时刻；
    /// 此后 created_at 早于该水位的消息不再触发。
    pub fn mark_all_read(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.unread.clear();
        for value in state.read_state.values_mut() {
            if *value == ReadState::Unread {
                *value = ReadState::Seen;
            }
        }
        state.last_read_at = Some(Utc::now());
    }

    /// 会话当前读取状态
    pub fn state_of(&self, peer_id: u64) -> ReadState {
        self.state
            .read()
            .read_state
            .get(&peer_id)
            .copied()
            .unwrap_or(ReadState::Unseen)
    }

    pub fn unread_for(&self, peer_id: u64) -> usize {
        self.state.read().unread.get(&peer_id).copied().unwrap_or(0)
    }

    pub fn unread_total(&self) -> usize {
        self.state.read().unread.values().sum()
    }

    /// 当前有未读消息的会话集合
    pub fn unread_conversations(&self) -> Vec<u64> {
        let state = self.state.read();
        let mut peers: Vec<u64> = state.unread.keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    /// 通知列表快照
    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.state.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn last_read_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_read_at
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
