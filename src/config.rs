use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::SyncError;
use crate::model::Role;

/// 同步器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 远端 API 基础地址（加载时自动补齐末尾的 /）
    pub api_base_url: String,
    /// Bearer token（建议通过环境变量 RENTCHAT_API_TOKEN 注入）
    pub api_token: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 运行角色：admin / customer
    pub role: String,
    /// 固定管理员用户ID
    pub admin_user_id: u64,
    /// 轮询间隔（秒），线上观察值 10~15
    pub poll_interval_secs: u64,
    /// 客户侧只检查最后一条消息（兼容旧行为）
    pub latest_only: bool,
    /// 通知预览最大字符数
    pub preview_chars: usize,
    /// 是否播放声音提示
    pub sound: bool,
    /// 状态目录（会话镜像等）
    pub state_dir: String,
    /// 日志级别
    pub log_level: String,
    /// 启用监控指标
    pub enable_metrics: bool,
    /// 监控端口
    pub metrics_port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/".to_string(),
            api_token: None,
            request_timeout_secs: 10,
            role: "customer".to_string(),
            admin_user_id: 1,
            poll_interval_secs: 12,
            latest_only: false,
            preview_chars: 80,
            sound: true,
            state_dir: "./state".to_string(),
            log_level: "info".to_string(),
            enable_metrics: false,
            metrics_port: 9100,
        }
    }
}

impl SyncConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析运行角色
    pub fn parsed_role(&self) -> std::result::Result<Role, SyncError> {
        Role::from_str(&self.role)
    }

    /// 解析 API 基础地址（补齐末尾 /，否则 join 会吃掉末段路径）
    pub fn api_base(&self) -> std::result::Result<Url, SyncError> {
        let raw = if self.api_base_url.ends_with('/') {
            self.api_base_url.clone()
        } else {
            format!("{}/", self.api_base_url)
        };
        Ok(Url::parse(&raw)?)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.api_base().context("api_base_url 无效")?;
        self.parsed_role().context("role 无效")?;
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs 必须大于 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs 必须大于 0");
        }
        Ok(())
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(content).with_context(|| "配置文件格式错误")?;
        Ok(toml_config.into())
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// 从环境变量合并配置（RENTCHAT_ 前缀）
    pub fn merge_from_env(&mut self) {
        if let Ok(base_url) = env::var("RENTCHAT_API_BASE_URL") {
            self.api_base_url = base_url;
        }
        if let Ok(token) = env::var("RENTCHAT_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Ok(role) = env::var("RENTCHAT_ROLE") {
            self.role = role;
        }
        if let Ok(admin_id) = env::var("RENTCHAT_ADMIN_USER_ID") {
            self.admin_user_id = admin_id.parse().unwrap_or(self.admin_user_id);
        }
        if let Ok(interval) = env::var("RENTCHAT_POLL_INTERVAL") {
            self.poll_interval_secs = interval.parse().unwrap_or(self.poll_interval_secs);
        }
        if let Ok(state_dir) = env::var("RENTCHAT_STATE_DIR") {
            self.state_dir = state_dir;
        }
        if let Ok(log_level) = env::var("RENTCHAT_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// 从命令行参数合并配置
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.api_base_url {
            self.api_base_url = base_url.clone();
        }
        if let Some(token) = &cli.api_token {
            self.api_token = Some(token.clone());
        }
        if let Some(role) = &cli.role {
            self.role = role.clone();
        }
        if let Some(admin_id) = cli.admin_user_id {
            self.admin_user_id = admin_id;
        }
        if let Some(interval) = cli.poll_interval {
            self.poll_interval_secs = interval;
        }
        if cli.latest_only {
            self.latest_only = true;
        }
        if cli.no_sound {
            self.sound = false;
        }
        if let Some(state_dir) = &cli.state_dir {
            self.state_dir = state_dir.clone();
        }
        if cli.enable_metrics {
            self.enable_metrics = true;
        }
        if let Some(port) = cli.metrics_port {
            self.metrics_port = port;
        }
        if let Some(log_level) = cli.get_log_level() {
            self.log_level = log_level;
        }
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        // 1. 从默认配置开始
        let mut config = Self::new();

        // 2. 从配置文件加载（如果指定）
        if let Some(config_file) = &cli.config_file {
            if Path::new(config_file).exists() {
                info!("📄 从配置文件加载: {}", config_file);
                config = Self::from_toml_file(config_file)?;
            } else {
                tracing::warn!("⚠️ 配置文件不存在: {}", config_file);
            }
        } else if Path::new("config.toml").exists() {
            // 尝试加载默认配置文件
            info!("📄 从默认配置文件加载: config.toml");
            config = Self::from_toml_file("config.toml")?;
        }

        // 3. 从环境变量合并（优先级高于配置文件）
        config.merge_from_env();

        // 4. 从命令行参数合并（最高优先级）
        config.merge_from_cli(cli);

        config.validate()?;
        Ok(config)
    }
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    api: Option<TomlApiConfig>,
    sync: Option<TomlSyncConfig>,
    notify: Option<TomlNotifyConfig>,
    metrics: Option<TomlMetricsConfig>,
    session: Option<TomlSessionConfig>,
    logging: Option<TomlLoggingConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlApiConfig {
    base_url: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlSyncConfig {
    role: Option<String>,
    admin_user_id: Option<u64>,
    poll_interval_secs: Option<u64>,
    latest_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlNotifyConfig {
    sound: Option<bool>,
    preview_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TomlMetricsConfig {
    enabled: Option<bool>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct TomlSessionConfig {
    state_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl From<TomlConfig> for SyncConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(api) = toml.api {
            if let Some(base_url) = api.base_url {
                config.api_base_url = base_url;
            }
            if let Some(token) = api.token {
                config.api_token = Some(token);
            }
            if let Some(timeout) = api.request_timeout_secs {
                config.request_timeout_secs = timeout;
            }
        }

        if let Some(sync) = toml.sync {
            if let Some(role) = sync.role {
                config.role = role;
            }
            if let Some(admin_id) = sync.admin_user_id {
                config.admin_user_id = admin_id;
            }
            if let Some(interval) = sync.poll_interval_secs {
                config.poll_interval_secs = interval;
            }
            if let Some(latest_only) = sync.latest_only {
                config.latest_only = latest_only;
            }
        }

        if let Some(notify) = toml.notify {
            if let Some(sound) = notify.sound {
                config.sound = sound;
            }
            if let Some(preview) = notify.preview_chars {
                config.preview_chars = preview;
            }
        }

        if let Some(metrics) = toml.metrics {
            if let Some(enabled) = metrics.enabled {
                config.enable_metrics = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics_port = port;
            }
        }

        if let Some(session) = toml.session {
            if let Some(state_dir) = session.state_dir {
                config.state_dir = state_dir;
            }
        }

        if let Some(logging) = toml.logging {
            if let Some(level) = logging.level {
                config.log_level = level;
            }
        }

        config
    }
}

/// 早期日志配置（完整配置加载之前先把日志定下来）
#[derive(Debug, Default)]
pub struct EarlyLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
}

/// 快速读取配置文件的 [logging] 段，不做完整加载
pub fn load_early_logging_config(config_file: Option<&str>) -> EarlyLoggingConfig {
    let path = config_file.unwrap_or("config.toml");
    let Ok(content) = fs::read_to_string(path) else {
        return EarlyLoggingConfig::default();
    };
    let Ok(toml_config) = toml::from_str::<TomlConfig>(&content) else {
        return EarlyLoggingConfig::default();
    };
    match toml_config.logging {
        Some(logging) => EarlyLoggingConfig {
            level: logging.level,
            format: logging.format,
            file: logging.file,
        },
        None => EarlyLoggingConfig::default(),
    }
}
