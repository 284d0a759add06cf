use clap::{Parser, Subcommand};

// 确保 Parser trait 被使用
impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// RentChat Sync - 租赁平台聊天/通知轮询同步器
#[derive(Parser, Debug)]
#[command(name = "rentchat-sync")]
#[command(version)]
#[command(about = "租赁平台的轮询式聊天与通知同步器", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, value_name = "FILE", help = "指定配置文件路径")]
    pub config_file: Option<String>,

    /// 远端 API 基础地址
    #[arg(long, value_name = "URL", help = "远端租赁平台 API 基础地址")]
    pub api_base_url: Option<String>,

    /// Bearer token
    #[arg(
        long,
        value_name = "TOKEN",
        help = "Bearer token（建议改用环境变量 RENTCHAT_API_TOKEN）"
    )]
    pub api_token: Option<String>,

    /// 运行角色
    #[arg(long, value_name = "ROLE", help = "运行角色: admin, customer")]
    pub role: Option<String>,

    /// 固定管理员用户ID
    #[arg(long, value_name = "ID", help = "固定管理员用户ID")]
    pub admin_user_id: Option<u64>,

    /// 轮询间隔
    #[arg(long, value_name = "SECS", help = "轮询间隔（秒）")]
    pub poll_interval: Option<u64>,

    /// 兼容旧行为：客户侧只检查最后一条消息
    #[arg(long, help = "客户侧只检查快照的最后一条消息")]
    pub latest_only: bool,

    /// 关闭声音提示
    #[arg(long, help = "关闭声音提示")]
    pub no_sound: bool,

    /// 状态目录
    #[arg(long, value_name = "DIR", help = "状态目录（会话镜像等）")]
    pub state_dir: Option<String>,

    /// 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, value_name = "PATH", help = "日志输出文件路径")]
    pub log_file: Option<String>,

    /// 启用监控指标
    #[arg(long, help = "启用 Prometheus 监控指标")]
    pub enable_metrics: bool,

    /// 监控端口
    #[arg(long, value_name = "PORT", help = "监控指标服务端口")]
    pub metrics_port: Option<u16>,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', help = "静默模式（不输出日志）")]
    pub quiet: bool,

    /// 开发模式（等同于 --log-level debug --log-format pretty）
    #[arg(long, help = "启用开发模式")]
    pub dev: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 生成默认配置文件
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 验证配置文件
    ValidateConfig {
        /// 配置文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 显示最终配置（合并后的配置）
    ShowConfig,
    /// 发送一条消息后退出
    Send {
        /// 接收方用户ID
        #[arg(long, value_name = "ID")]
        to: u64,
        /// 消息内容
        #[arg(value_name = "TEXT")]
        message: String,
    },
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }

        if self.dev {
            return Some("debug".to_string());
        }

        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }

        // 根据 verbose 级别设置
        match self.verbose {
            0 => None, // 使用默认或配置文件
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }

    /// 获取日志格式
    pub fn get_log_format(&self) -> Option<String> {
        if self.dev {
            return Some("pretty".to_string());
        }
        self.log_format.clone()
    }
}
