use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::Identity;
use crate::error::Result;
use crate::model::Role;

/// 持久化的会话镜像
///
/// 只镜像标识（user_id / role），用于进程重启后的会话连续性；
/// 消息、游标与通知都不落盘。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub user_id: u64,
    pub role: Role,
    pub saved_at: DateTime<Utc>,
}

/// 会话存储（状态目录下的 session.json）
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("session.json"),
        }
    }

    /// 读取已保存的会话；文件缺失或损坏一律视为无会话
    pub fn load(&self) -> Option<SessionFile> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("⚠️ 会话文件损坏，忽略: {}", e);
                None
            }
        }
    }

    /// 保存当前身份
    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let session = SessionFile {
            user_id: identity.self_id,
            role: identity.role,
            saved_at: Utc::now(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&session)?)?;
        debug!("💾 会话已保存: {:?}", self.path);
        Ok(())
    }

    /// 清除会话（token 失效时调用）
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}
