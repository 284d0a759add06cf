//! 远端聊天/用户 API 访问层
//!
//! 远端是消息、用户与角色的唯一事实来源；本模块只定义客户端消费的契约
//! 与其 HTTP 实现，内部业务逻辑（定价、库存、支付结算）全部在远端。

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ChatMessage, Profile, Role, User};

pub mod http;

pub use http::HttpChatApi;

/// 远端聊天 API 契约
///
/// 测试通过替换该 trait 的实现注入会话数据与故障。
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// 解析当前登录身份（轮询启动的前置条件）
    async fn fetch_profile(&self, role: Role) -> Result<Profile>;

    /// 查询单个用户（用于角色判定）
    async fn fetch_user(&self, user_id: u64) -> Result<User>;

    /// 列出全部用户（管理端扇出目标集合）
    async fn list_users(&self) -> Result<Vec<User>>;

    /// 拉取与某个对端的完整会话（服务端保证按时间升序返回）
    async fn fetch_conversation(&self, role: Role, peer_id: u64) -> Result<Vec<ChatMessage>>;

    /// 发送一条消息
    ///
    /// 管理端的 sender 在远端隐式固定，customer 端需显式携带 sender_id。
    async fn send_message(
        &self,
        role: Role,
        sender_id: u64,
        receiver_id: u64,
        text: &str,
    ) -> Result<()>;
}
