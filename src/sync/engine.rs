use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::ChatApi;
use crate::context::Identity;
use crate::error::{Result, SyncError};
use crate::model::{ChatMessage, NotificationEntry, Role, User};
use crate::notify::{NotificationCenter, Notifier};
use crate::sync::cursor::CursorStore;

/// 引擎选项
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 客户侧只检查快照的最后一条（兼容旧行为；默认对整个尾部做差分）
    pub latest_only: bool,
    /// 通知预览最大字符数
    pub preview_chars: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            latest_only: false,
            preview_chars: 80,
        }
    }
}

/// 单次轮询的结果摘要
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    /// 本轮新发现的入站消息数
    pub inbound: usize,
    /// 本轮实际产生的通知条目数（去重后）
    pub notified: usize,
    /// 扫描的对端数
    pub scanned_peers: usize,
    /// 拉取失败的对端数（管理端扇出）
    pub failed_peers: usize,
    /// 是否播放了提示音
    pub alerted: bool,
}

impl PollOutcome {
    fn merge(&mut self, other: PollOutcome) {
        self.inbound += other.inbound;
        self.notified += other.notified;
        self.scanned_peers += other.scanned_peers;
        self.failed_peers += other.failed_peers;
    }
}

/// 轮询同步引擎
///
/// 两种部署形态共用一套游标与通知逻辑：
/// - customer：固定对端是管理员，轮询单一会话
/// - admin：对全部客户逐个拉取（扇出），单个失败不打断整轮
pub struct SyncEngine {
    identity: Identity,
    api: Arc<dyn ChatApi>,
    notifier: Arc<dyn Notifier>,
    cursors: CursorStore,
    center: Arc<NotificationCenter>,
    options: EngineOptions,
}

impl SyncEngine {
    pub fn new(
        identity: Identity,
        api: Arc<dyn ChatApi>,
        notifier: Arc<dyn Notifier>,
        options: EngineOptions,
    ) -> Self {
        Self {
            identity,
            api,
            notifier,
            cursors: CursorStore::new(),
            center: Arc::new(NotificationCenter::new()),
            options,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// 通知中心（与 UI 层共享）
    pub fn notifications(&self) -> Arc<NotificationCenter> {
        Arc::clone(&self.center)
    }

    /// 会话游标（只读视图）
    pub fn cursor_for(&self, peer_id: u64) -> crate::sync::cursor::ConversationCursor {
        self.cursors.get(peer_id)
    }

    /// 执行一次轮询
    ///
    /// 一个周期内无论多少会话出现新消息，提示音至多播放一次。
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let mut outcome = match self.identity.role {
            Role::Customer => self.poll_customer().await?,
            Role::Admin => self.poll_admin().await?,
        };
        if outcome.inbound > 0 {
            self.notifier.play();
            outcome.alerted = true;
        }
        Ok(outcome)
    }

    /// 客户形态：轮询与固定管理员的单一会话
    async fn poll_customer(&self) -> Result<PollOutcome> {
        let peer = self.identity.admin_id;
        let messages = self.api.fetch_conversation(Role::Customer, peer).await?;
        Ok(self.absorb(peer, "客服新消息", &messages))
    }

    /// 管理形态：对全部客户做顺序扇出
    ///
    /// 单个客户的拉取失败只记日志，游标保持原位，下个周期自然重试；
    /// 会话过期是全局性失败，立刻中止整轮上抛。
    async fn poll_admin(&self) -> Result<PollOutcome> {
        let users = self.api.list_users().await?;
        let mut outcome = PollOutcome::default();

        for user in users.iter().filter(|u| self.is_fanout_target(u)) {
            match self.api.fetch_conversation(Role::Admin, user.user_id).await {
                Ok(messages) => {
                    let title = format!("{} 的新消息", user.display_name());
                    outcome.merge(self.absorb(user.user_id, &title, &messages));
                }
                Err(SyncError::SessionExpired) => return Err(SyncError::SessionExpired),
                Err(e) => {
                    warn!("⚠️ 会话拉取失败: peer={}, err={}", user.user_id, e);
                    outcome.scanned_peers += 1;
                    outcome.failed_peers += 1;
                }
            }
        }

        Ok(outcome)
    }

    fn is_fanout_target(&self, user: &User) -> bool {
        user.is_customer() && user.user_id != self.identity.self_id
    }

    /// 吸收一个会话的最新快照
    ///
    /// 找出游标之后的消息，过滤掉本端发出的，生成通知并推进游标。
    /// 游标无条件推进到快照末尾：即使尾部全是自己发的消息，同一条
    /// 消息也不会在下个周期再次参与差分。
    fn absorb(&self, peer_id: u64, title: &str, messages: &[ChatMessage]) -> PollOutcome {
        let cursor = self.cursors.get(peer_id);

        let fresh: Vec<&ChatMessage> = if self.options.latest_only {
            // 旧行为：只看最后一条，周期间隔内到达的更早消息被有意放弃
            messages
                .last()
                .filter(|m| cursor.is_new(m))
                .into_iter()
                .collect()
        } else {
            messages.iter().filter(|m| cursor.is_new(m)).collect()
        };

        let inbound: Vec<&&ChatMessage> = fresh
            .iter()
            .filter(|m| !self.identity.is_self(m.sender_id))
            .collect();

        let mut notified = 0;
        for message in &inbound {
            let entry = NotificationEntry::from_message(
                message,
                peer_id,
                title,
                self.options.preview_chars,
            );
            if self.center.push(entry) {
                notified += 1;
            }
        }
        if !inbound.is_empty() {
            self.center.mark_unread(peer_id, inbound.len());
            debug!(
                "🔔 新入站消息: peer={}, count={}, notified={}",
                peer_id,
                inbound.len(),
                notified
            );
        }

        self.cursors.observe_snapshot(peer_id, messages);

        PollOutcome {
            inbound: inbound.len(),
            notified,
            scanned_peers: 1,
            failed_peers: 0,
            alerted: false,
        }
    }

    /// 已读单个会话
    pub fn mark_read(&self, peer_id: u64) {
        self.center.mark_read(peer_id);
    }

    /// 全部已读（铃铛关闭）
    pub fn mark_all_read(&self) {
        self.center.mark_all_read();
    }

    /// 发送消息并立即回拉该会话
    ///
    /// 回拉让发送方视图不必等待下个周期，同时让游标吸收自己刚发的
    /// 消息。回拉失败不影响发送结果，下个周期会补上。发送本身的
    /// 失败向调用方传播，调用方保留输入以便重试。
    pub async fn send(&self, receiver_id: u64, text: &str) -> Result<()> {
        self.api
            .send_message(self.identity.role, self.identity.self_id, receiver_id, text)
            .await?;

        match self.api.fetch_conversation(self.identity.role, receiver_id).await {
            Ok(messages) => {
                let title = format!("用户 {} 的新消息", receiver_id);
                self.absorb(receiver_id, &title, &messages);
            }
            Err(e) => debug!("发送后回拉失败，等待下个周期: {}", e),
        }
        Ok(())
    }
}
