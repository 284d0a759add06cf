//! 轮询引擎集成测试
//!
//! 测试场景：
//! 1. 首次未读检测与游标推进
//! 2. 自己发出的消息不触发通知
//! 3. 重复轮询的幂等性（无重复通知）
//! 4. 游标单调不回退
//! 5. 管理端扇出：单个对端失败隔离
//! 6. 管理端扇出：长度差场景（3 -> 5）
//! 7. 已读只清一个会话 / 全部已读
//! 8. 发送后立即回拉
//! 9. 每轮至多一次提示音
//! 10. 身份解析前置条件

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use rentchat_sync::{
    ChatApi, ChatMessage, EngineOptions, Identity, Notifier, Profile, ReadState, Role, SyncEngine,
    SyncError, User,
};

/// 可编排的远端 API 假实现
struct MockChatApi {
    profile_id: u64,
    fail_profile: AtomicBool,
    users: Mutex<Vec<User>>,
    conversations: Mutex<HashMap<u64, Vec<ChatMessage>>>,
    /// 拉取这些对端的会话时返回网络错误
    fail_peers: Mutex<HashSet<u64>>,
    /// 拉取这些对端的会话时返回会话过期
    expired_peers: Mutex<HashSet<u64>>,
    sent: Mutex<Vec<(Role, u64, u64, String)>>,
    next_id: AtomicU64,
}

impl MockChatApi {
    fn new(profile_id: u64) -> Self {
        Self {
            profile_id,
            fail_profile: AtomicBool::new(false),
            users: Mutex::new(Vec::new()),
            conversations: Mutex::new(HashMap::new()),
            fail_peers: Mutex::new(HashSet::new()),
            expired_peers: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
        }
    }

    fn set_conversation(&self, peer: u64, messages: Vec<ChatMessage>) {
        self.conversations.lock().insert(peer, messages);
    }

    fn set_users(&self, users: Vec<User>) {
        *self.users.lock() = users;
    }

    fn fail_peer(&self, peer: u64) {
        self.fail_peers.lock().insert(peer);
    }

    fn heal_peer(&self, peer: u64) {
        self.fail_peers.lock().remove(&peer);
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn fetch_profile(&self, _role: Role) -> Result<Profile, SyncError> {
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(SyncError::Network("profile unavailable".to_string()));
        }
        Ok(Profile {
            user_id: self.profile_id,
        })
    }

    async fn fetch_user(&self, user_id: u64) -> Result<User, SyncError> {
        self.users
            .lock()
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| SyncError::Api(404, "user not found".to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>, SyncError> {
        Ok(self.users.lock().clone())
    }

    async fn fetch_conversation(
        &self,
        _role: Role,
        peer_id: u64,
    ) -> Result<Vec<ChatMessage>, SyncError> {
        if self.expired_peers.lock().contains(&peer_id) {
            return Err(SyncError::SessionExpired);
        }
        if self.fail_peers.lock().contains(&peer_id) {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        Ok(self
            .conversations
            .lock()
            .get(&peer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        role: Role,
        sender_id: u64,
        receiver_id: u64,
        text: &str,
    ) -> Result<(), SyncError> {
        self.sent
            .lock()
            .push((role, sender_id, receiver_id, text.to_string()));
        // 远端立即落库：追加到会话尾部
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = ChatMessage::new(id, sender_id, receiver_id, text, Utc::now());
        self.conversations.lock().entry(receiver_id).or_default().push(msg);
        Ok(())
    }
}

/// 只计数的提示器
#[derive(Default)]
struct CountingNotifier {
    plays: AtomicUsize,
}

impl Notifier for CountingNotifier {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

fn msg(id: u64, sender: u64, receiver: u64, secs: i64) -> ChatMessage {
    let at = Utc.timestamp_opt(secs, 0).unwrap();
    ChatMessage::new(id, sender, receiver, format!("msg-{}", id), at)
}

const ADMIN_ID: u64 = 7;
const CUSTOMER_ID: u64 = 55;

fn customer_engine(
    api: Arc<MockChatApi>,
    notifier: Arc<CountingNotifier>,
    options: EngineOptions,
) -> SyncEngine {
    SyncEngine::new(
        Identity::new(CUSTOMER_ID, Role::Customer, ADMIN_ID),
        api,
        notifier,
        options,
    )
}

fn admin_engine(api: Arc<MockChatApi>, notifier: Arc<CountingNotifier>) -> SyncEngine {
    SyncEngine::new(
        Identity::new(1, Role::Admin, 1),
        api,
        notifier,
        EngineOptions::default(),
    )
}

// ============================================================
// 场景 1: 首次未读检测
// ============================================================

#[tokio::test]
async fn test_first_unread_detection() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_conversation(ADMIN_ID, vec![msg(501, ADMIN_ID, CUSTOMER_ID, 100)]);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = customer_engine(api, Arc::clone(&notifier), EngineOptions::default());

    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.inbound, 1);
    assert_eq!(outcome.notified, 1);
    let entries = engine.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 501);
    assert_eq!(engine.cursor_for(ADMIN_ID).last_seen_id, Some(501));
    assert_eq!(engine.notifications().unread_total(), 1);
    assert_eq!(notifier.plays.load(Ordering::SeqCst), 1);
}

// ============================================================
// 场景 2: 自己发出的消息不触发通知（游标仍然推进）
// ============================================================

#[tokio::test]
async fn test_own_message_advances_cursor_without_notification() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_conversation(ADMIN_ID, vec![msg(502, CUSTOMER_ID, ADMIN_ID, 101)]);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = customer_engine(api, Arc::clone(&notifier), EngineOptions::default());

    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.inbound, 0);
    assert_eq!(outcome.notified, 0);
    assert!(engine.notifications().is_empty());
    // 游标追踪最新观察位置，与消息作者无关
    assert_eq!(engine.cursor_for(ADMIN_ID).last_seen_id, Some(502));
    assert_eq!(engine.notifications().unread_total(), 0);
    assert_eq!(notifier.plays.load(Ordering::SeqCst), 0);
}

// ============================================================
// 场景 3: 幂等性：数据未变化的轮询不产生新通知
// ============================================================

#[tokio::test]
async fn test_unchanged_polls_are_idempotent() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_conversation(
        ADMIN_ID,
        vec![
            msg(10, ADMIN_ID, CUSTOMER_ID, 100),
            msg(11, ADMIN_ID, CUSTOMER_ID, 110),
        ],
    );
    let notifier = Arc::new(CountingNotifier::default());
    let engine = customer_engine(api, Arc::clone(&notifier), EngineOptions::default());

    engine.poll_once().await.expect("轮询失败");
    engine.poll_once().await.expect("轮询失败");
    engine.poll_once().await.expect("轮询失败");

    assert_eq!(engine.notifications().len(), 2);
    assert_eq!(engine.notifications().unread_for(ADMIN_ID), 2);
    assert_eq!(notifier.plays.load(Ordering::SeqCst), 1);
}

// ============================================================
// 场景 4: 游标单调不回退
// ============================================================

#[tokio::test]
async fn test_cursor_survives_shrunken_snapshot() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_conversation(
        ADMIN_ID,
        vec![
            msg(1, ADMIN_ID, CUSTOMER_ID, 100),
            msg(2, ADMIN_ID, CUSTOMER_ID, 110),
            msg(3, ADMIN_ID, CUSTOMER_ID, 120),
        ],
    );
    let notifier = Arc::new(CountingNotifier::default());
    let engine = customer_engine(Arc::clone(&api), notifier, EngineOptions::default());

    engine.poll_once().await.expect("轮询失败");
    assert_eq!(engine.cursor_for(ADMIN_ID).last_seen_id, Some(3));

    // 远端临时返回缺尾快照
    api.set_conversation(ADMIN_ID, vec![msg(1, ADMIN_ID, CUSTOMER_ID, 100)]);
    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.inbound, 0);
    assert_eq!(engine.cursor_for(ADMIN_ID).last_seen_id, Some(3));
    assert_eq!(engine.notifications().len(), 3);
}

// ============================================================
// 场景 5: 管理端扇出：单个对端失败不打断整轮
// ============================================================

#[tokio::test]
async fn test_fanout_isolates_per_peer_failure() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![
        User::new(5, "alice").with_role_id(2),
        User::new(6, "bob").with_role_id(2),
        User::new(8, "carol").with_role_id(2),
    ]);
    api.set_conversation(5, vec![msg(100, 5, 1, 100)]);
    api.set_conversation(6, vec![msg(200, 6, 1, 100)]);
    api.set_conversation(8, vec![msg(300, 8, 1, 100)]);
    api.fail_peer(6);

    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(Arc::clone(&api), notifier);

    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.scanned_peers, 3);
    assert_eq!(outcome.failed_peers, 1);
    assert_eq!(outcome.inbound, 2);
    // A 与 C 正常推进，B 的游标保持原位
    assert_eq!(engine.cursor_for(5).last_seen_id, Some(100));
    assert_eq!(engine.cursor_for(6).last_seen_id, None);
    assert_eq!(engine.cursor_for(8).last_seen_id, Some(300));
    assert_eq!(engine.notifications().unread_for(5), 1);
    assert_eq!(engine.notifications().unread_for(8), 1);

    // 故障恢复后，下个周期补上 B
    api.heal_peer(6);
    let outcome = engine.poll_once().await.expect("轮询失败");
    assert_eq!(outcome.inbound, 1);
    assert_eq!(engine.cursor_for(6).last_seen_id, Some(200));
}

// ============================================================
// 场景 6: 管理端扇出：长度差（3 -> 5，混合作者）
// ============================================================

#[tokio::test]
async fn test_fanout_delta_with_mixed_authors() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![User::new(5, "alice").with_role_id(2)]);
    // 先吸收 3 条管理员发出的历史
    api.set_conversation(
        5,
        vec![msg(1, 1, 5, 10), msg(2, 1, 5, 20), msg(3, 1, 5, 30)],
    );
    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(Arc::clone(&api), Arc::clone(&notifier));

    engine.poll_once().await.expect("轮询失败");
    assert_eq!(engine.cursor_for(5).last_seen_id, Some(3));
    assert_eq!(engine.notifications().unread_for(5), 0);

    // 快照增长到 5 条：第 4 条是管理员发的，第 5 条来自客户
    api.set_conversation(
        5,
        vec![
            msg(1, 1, 5, 10),
            msg(2, 1, 5, 20),
            msg(3, 1, 5, 30),
            msg(4, 1, 5, 40),
            msg(5, 5, 1, 50),
        ],
    );
    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.inbound, 1);
    assert_eq!(engine.notifications().unread_for(5), 1);
    assert_eq!(engine.notifications().state_of(5), ReadState::Unread);
    let entries = engine.notifications().entries();
    assert_eq!(entries.len(), 1);
    // 通知引用过滤后（非管理员发出）的最后一条消息
    assert_eq!(entries[0].id, 5);
    assert_eq!(engine.cursor_for(5).last_seen_id, Some(5));
}

// ============================================================
// 场景 7: 已读语义
// ============================================================

#[tokio::test]
async fn test_mark_read_clears_exactly_one_conversation() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![
        User::new(5, "alice").with_role_id(2),
        User::new(6, "bob").with_role_id(2),
    ]);
    api.set_conversation(5, vec![msg(100, 5, 1, 100)]);
    api.set_conversation(6, vec![msg(200, 6, 1, 100)]);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(api, notifier);

    engine.poll_once().await.expect("轮询失败");
    assert_eq!(engine.notifications().unread_total(), 2);

    engine.mark_read(5);

    assert_eq!(engine.notifications().unread_for(5), 0);
    assert_eq!(engine.notifications().state_of(5), ReadState::Seen);
    assert_eq!(engine.notifications().unread_for(6), 1);
    assert_eq!(engine.notifications().state_of(6), ReadState::Unread);
    let entries = engine.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].conversation, 6);
}

#[tokio::test]
async fn test_mark_all_read_resets_bell_state() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![
        User::new(5, "alice").with_role_id(2),
        User::new(6, "bob").with_role_id(2),
    ]);
    api.set_conversation(5, vec![msg(100, 5, 1, 100)]);
    api.set_conversation(6, vec![msg(200, 6, 1, 100)]);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(Arc::clone(&api), notifier);

    engine.poll_once().await.expect("轮询失败");
    assert_eq!(engine.notifications().unread_total(), 2);

    engine.mark_all_read();

    assert!(engine.notifications().is_empty());
    assert_eq!(engine.notifications().unread_total(), 0);
    assert!(engine.notifications().last_read_at().is_some());

    // 同一批消息再轮询一次：游标已过，不再触发
    let outcome = engine.poll_once().await.expect("轮询失败");
    assert_eq!(outcome.inbound, 0);
    assert!(engine.notifications().is_empty());
}

// ============================================================
// 场景 8: 发送后立即回拉
// ============================================================

#[tokio::test]
async fn test_send_refetches_and_absorbs_own_message() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    let notifier = Arc::new(CountingNotifier::default());
    let engine = customer_engine(Arc::clone(&api), Arc::clone(&notifier), EngineOptions::default());

    engine.send(ADMIN_ID, "押金可以退吗？").await.expect("发送失败");

    let sent = api.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, Role::Customer);
    assert_eq!(sent[0].1, CUSTOMER_ID);
    assert_eq!(sent[0].2, ADMIN_ID);

    // 回拉吸收了自己刚发的消息：游标前移、不产生通知
    assert!(engine.cursor_for(ADMIN_ID).last_seen_id.is_some());
    assert!(engine.notifications().is_empty());
    assert_eq!(notifier.plays.load(Ordering::SeqCst), 0);
}

// ============================================================
// 场景 9: 每轮至多一次提示音
// ============================================================

#[tokio::test]
async fn test_alert_plays_once_per_sweep() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![
        User::new(5, "alice").with_role_id(2),
        User::new(6, "bob").with_role_id(2),
        User::new(8, "carol").with_role_id(2),
    ]);
    api.set_conversation(5, vec![msg(100, 5, 1, 100)]);
    api.set_conversation(6, vec![msg(200, 6, 1, 100)]);
    api.set_conversation(8, vec![msg(300, 8, 1, 100)]);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(api, Arc::clone(&notifier));

    let outcome = engine.poll_once().await.expect("轮询失败");

    assert_eq!(outcome.inbound, 3);
    assert!(outcome.alerted);
    assert_eq!(notifier.plays.load(Ordering::SeqCst), 1);
}

// ============================================================
// 场景 10: 旧行为开关：只看最后一条
// ============================================================

#[tokio::test]
async fn test_latest_only_surfaces_single_message() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_conversation(
        ADMIN_ID,
        vec![
            msg(1, ADMIN_ID, CUSTOMER_ID, 100),
            msg(2, ADMIN_ID, CUSTOMER_ID, 110),
            msg(3, ADMIN_ID, CUSTOMER_ID, 120),
        ],
    );
    let notifier = Arc::new(CountingNotifier::default());
    let options = EngineOptions {
        latest_only: true,
        ..EngineOptions::default()
    };
    let engine = customer_engine(api, notifier, options);

    let outcome = engine.poll_once().await.expect("轮询失败");

    // 周期间隔内到达的前两条被有意放弃，只浮现最新一条
    assert_eq!(outcome.inbound, 1);
    let entries = engine.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 3);
    // 游标仍推进到快照末尾
    assert_eq!(engine.cursor_for(ADMIN_ID).last_seen_id, Some(3));
}

// ============================================================
// 会话过期：全局性失败，中止整轮
// ============================================================

#[tokio::test]
async fn test_session_expiry_aborts_sweep() {
    let api = Arc::new(MockChatApi::new(1));
    api.set_users(vec![
        User::new(5, "alice").with_role_id(2),
        User::new(6, "bob").with_role_id(2),
    ]);
    api.set_conversation(5, vec![msg(100, 5, 1, 100)]);
    api.expired_peers.lock().insert(6);
    let notifier = Arc::new(CountingNotifier::default());
    let engine = admin_engine(api, notifier);

    let result = engine.poll_once().await;
    assert!(matches!(result, Err(SyncError::SessionExpired)));
}

// ============================================================
// 身份解析：轮询启动的前置条件
// ============================================================

#[tokio::test]
async fn test_identity_resolution_success() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_users(vec![User::new(CUSTOMER_ID, "dave").with_role_id(2)]);

    let identity = Identity::resolve(api.as_ref(), Role::Customer, ADMIN_ID)
        .await
        .expect("解析失败");

    assert_eq!(identity.self_id, CUSTOMER_ID);
    assert_eq!(identity.role, Role::Customer);
    assert_eq!(identity.counterparty(), Some(ADMIN_ID));
}

#[tokio::test]
async fn test_identity_role_mismatch_rejected() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.set_users(vec![User::new(CUSTOMER_ID, "dave").with_role_id(2)]);

    let result = Identity::resolve(api.as_ref(), Role::Admin, 1).await;
    assert!(matches!(result, Err(SyncError::Identity(_))));
}

#[tokio::test]
async fn test_identity_profile_failure_disables_start() {
    let api = Arc::new(MockChatApi::new(CUSTOMER_ID));
    api.fail_profile.store(true, Ordering::SeqCst);

    let result = Identity::resolve(api.as_ref(), Role::Customer, ADMIN_ID).await;
    assert!(matches!(result, Err(SyncError::Identity(_))));
}
