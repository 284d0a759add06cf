use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::ChatApi;
use crate::error::{Result, SyncError};
use crate::model::Role;

/// 已解析的本端身份
///
/// 轮询开始之前必须解析完成：缺少 self_id 或角色就无法判定消息的
/// 方向归属。固定管理员身份来自配置，解析一次后贯穿整个同步器，
/// 不在各调用点重复声明。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// 本端用户ID
    pub self_id: u64,
    /// 本端角色
    pub role: Role,
    /// 固定管理员用户ID
    pub admin_id: u64,
    /// 解析时间
    pub resolved_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(self_id: u64, role: Role, admin_id: u64) -> Self {
        Self {
            self_id,
            role,
            admin_id,
            resolved_at: Utc::now(),
        }
    }

    /// 判断消息是否本端发出
    pub fn is_self(&self, sender_id: u64) -> bool {
        sender_id == self.self_id
    }

    /// 客户侧唯一对端即固定管理员；管理端没有单一对端
    pub fn counterparty(&self) -> Option<u64> {
        match self.role {
            Role::Customer => Some(self.admin_id),
            Role::Admin => None,
        }
    }

    /// 通过远端接口解析身份
    ///
    /// 1. profile 接口拿到 user_id
    /// 2. users/{id} 接口确认角色（role_id == 2 ⇒ customer）
    ///
    /// 任一步失败都返回错误，调用方据此拒绝启动轮询。角色确认失败时
    /// 退回配置声明的角色；远端部分部署不对 customer 开放该接口。
    pub async fn resolve(api: &dyn ChatApi, configured: Role, admin_id: u64) -> Result<Self> {
        let profile = match api.fetch_profile(configured).await {
            Ok(profile) => profile,
            // 会话过期是全局性失败，保留原语义交给上层统一处理
            Err(SyncError::SessionExpired) => return Err(SyncError::SessionExpired),
            Err(e) => return Err(SyncError::Identity(format!("profile 拉取失败: {}", e))),
        };

        let role = match api.fetch_user(profile.user_id).await {
            Ok(user) => {
                let resolved = if user.is_customer() {
                    Role::Customer
                } else {
                    Role::Admin
                };
                if resolved != configured {
                    return Err(SyncError::Identity(format!(
                        "配置角色 {} 与远端角色 {} 不一致",
                        configured, resolved
                    )));
                }
                resolved
            }
            Err(SyncError::SessionExpired) => return Err(SyncError::SessionExpired),
            Err(e) => {
                tracing::debug!("角色确认接口不可用，沿用配置角色: {}", e);
                configured
            }
        };

        info!("👤 身份解析完成: user_id={}, role={}", profile.user_id, role);
        Ok(Self::new(profile.user_id, role, admin_id))
    }
}
