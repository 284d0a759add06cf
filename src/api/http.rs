use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::api::ChatApi;
use crate::error::{Result, SyncError};
use crate::model::{ChatMessage, Profile, Role, User};

/// profile 接口的包装结构
#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    profile: Profile,
}

/// users/{id} 接口的包装结构
#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

/// 远端 API 的 HTTP 实现
///
/// Bearer token 通过 Client 默认请求头统一注入，等价于共享请求拦截器；
/// 401 的语义在 `check` 里集中处理一次，不在各调用点重复。
pub struct HttpChatApi {
    client: Client,
    base_url: Url,
    has_token: bool,
}

impl HttpChatApi {
    /// 创建 HTTP 客户端
    ///
    /// base_url 需以 `/` 结尾（配置加载时已补齐），否则 join 会吃掉末段路径。
    pub fn new(base_url: Url, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SyncError::Configuration("token 含非法字符".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("HTTP 客户端构建失败: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            has_token: token.is_some(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// 统一状态码检查
    ///
    /// - 401 + 有 token：会话过期（全局处理一次：清除会话、提示、停止）
    /// - 401 + 无 token：匿名请求，不作为错误向用户呈现
    /// - 其他非 2xx：携带状态码与响应体上抛
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(if self.has_token {
                SyncError::SessionExpired
            } else {
                SyncError::Unauthenticated
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Api(status.as_u16(), body));
        }
        Ok(resp)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self.client.get(self.url(path)?).send().await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }
}

/// 防御性归一化 users 接口的响应
///
/// 依次尝试：裸数组 → `{ users: [...] }` → `{ customers: [...] }`；
/// 都不匹配则降级为空列表而不是报错。个别解析失败的条目跳过。
pub(crate) fn normalize_users(value: Value) -> Vec<User> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map
            .remove("users")
            .or_else(|| map.remove("customers"))
        {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("⚠️ users 响应形态未知，按空列表处理");
                return Vec::new();
            }
        },
        _ => {
            warn!("⚠️ users 响应形态未知，按空列表处理");
            return Vec::new();
        }
    };

    let total = items.len();
    let users: Vec<User> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if users.len() < total {
        warn!("⚠️ users 响应中 {} 个条目无法解析，已跳过", total - users.len());
    }
    users
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_profile(&self, role: Role) -> Result<Profile> {
        let path = match role {
            Role::Admin => "api/admin/profile",
            Role::Customer => "api/customer/profile",
        };
        let resp = self.client.get(self.url(path)?).send().await?;
        let resp = self.check(resp).await?;
        let envelope: ProfileEnvelope = resp.json().await?;
        Ok(envelope.profile)
    }

    async fn fetch_user(&self, user_id: u64) -> Result<User> {
        let path = format!("api/admin/users/{}", user_id);
        let resp = self.client.get(self.url(&path)?).send().await?;
        let resp = self.check(resp).await?;
        let envelope: UserEnvelope = resp.json().await?;
        Ok(envelope.user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let value = self.get_json("api/admin/users").await?;
        Ok(normalize_users(value))
    }

    async fn fetch_conversation(&self, role: Role, peer_id: u64) -> Result<Vec<ChatMessage>> {
        let path = match role {
            Role::Admin => format!("api/admin/chats/{}", peer_id),
            Role::Customer => format!("api/customer/chats/{}", peer_id),
        };
        let resp = self.client.get(self.url(&path)?).send().await?;
        let resp = self.check(resp).await?;
        let messages: Vec<ChatMessage> = resp.json().await?;
        debug!("📥 会话拉取完成: peer={}, messages={}", peer_id, messages.len());
        Ok(messages)
    }

    async fn send_message(
        &self,
        role: Role,
        sender_id: u64,
        receiver_id: u64,
        text: &str,
    ) -> Result<()> {
        // 管理端 sender 由远端按 token 推定；customer 端契约要求显式携带
        let (path, body) = match role {
            Role::Admin => (
                "api/admin/chats/send",
                json!({ "receiver_id": receiver_id, "message": text }),
            ),
            Role::Customer => (
                "api/customer/chats/send",
                json!({ "sender_id": sender_id, "receiver_id": receiver_id, "message": text }),
            ),
        };
        let resp = self.client.post(self.url(path)?).json(&body).send().await?;
        self.check(resp).await?;
        Ok(())
    }
}
