use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// 客户角色的 role_id（远端 API 约定）
pub const CUSTOMER_ROLE_ID: u32 = 2;

/// 运行角色
///
/// 决定同步器的部署形态：customer 只有一个固定对端（管理员），
/// admin 对全部客户做扇出轮询。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(SyncError::Configuration(format!(
                "未知角色: {}（支持 admin / customer）",
                other
            ))),
        }
    }
}

/// 用户信息（users 接口返回）
///
/// 远端在不同接口下返回 `role_id` 或文本 `role`，两种形态都要兼容。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户ID（部分接口字段名为 id）
    #[serde(alias = "id")]
    pub user_id: u64,
    /// 用户名
    #[serde(default)]
    pub username: Option<String>,
    /// 角色ID（role_id == 2 表示客户）
    #[serde(default)]
    pub role_id: Option<u32>,
    /// 角色名（"admin" 以外一律视为客户）
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    pub fn new(user_id: u64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: Some(username.into()),
            role_id: None,
            role: None,
        }
    }

    pub fn with_role_id(mut self, role_id: u32) -> Self {
        self.role_id = Some(role_id);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// 是否为客户（统一两种返回形态的判定）
    ///
    /// role_id 优先；两者都缺失时不视为客户，避免把身份不明的账号
    /// 纳入管理端扇出。
    pub fn is_customer(&self) -> bool {
        if let Some(role_id) = self.role_id {
            return role_id == CUSTOMER_ROLE_ID;
        }
        if let Some(role) = &self.role {
            return role != "admin";
        }
        false
    }

    /// 展示名（缺失用户名时退回用户ID）
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => format!("用户 {}", self.user_id),
        }
    }
}

/// 个人资料（profile 接口返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: u64,
}
