use anyhow::{Context, Result};
use rentchat_sync::{
    cli::{Cli, Commands},
    config::{self, SyncConfig},
    logging, metrics, SyncService,
};
use std::fs;
use std::process;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    // 解析命令行参数
    let cli = Cli::parse();

    // 处理子命令
    if let Some(command) = &cli.command {
        match command {
            Commands::GenerateConfig { path } => {
                return generate_config(path);
            }
            Commands::ValidateConfig { path } => {
                return validate_config(path);
            }
            Commands::ShowConfig => {
                return show_config(&cli);
            }
            Commands::Send { to, message } => {
                return run_send(&cli, *to, message.clone()).await;
            }
        }
    }

    // 快速读取 config.toml 的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > config.toml > 默认值）
    let log_level = cli
        .get_log_level()
        .or(early_log.level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli.get_log_format().or(early_log.format);
    let log_file = cli.log_file.as_deref().or(early_log.file.as_deref());

    logging::init_logging(&log_level, log_format.as_deref(), log_file, cli.quiet)?;

    tracing::info!("🚀 RentChat Sync starting...");

    // 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    let config = SyncConfig::load(&cli).context("加载配置失败")?;

    // 如果开发模式，应用开发友好设置
    if cli.dev {
        tracing::info!("🔧 开发模式已启用");
    }

    // 显示配置信息
    tracing::info!("📊 Sync Configuration:");
    tracing::info!("  - API Base: {}", config.api_base_url);
    tracing::info!("  - Role: {}", config.role);
    tracing::info!("  - Admin User: {}", config.admin_user_id);
    tracing::info!("  - Poll Interval: {}s", config.poll_interval_secs);
    tracing::info!("  - Latest Only: {}", config.latest_only);
    tracing::info!("  - Sound: {}", config.sound);
    tracing::info!("  - State Dir: {}", config.state_dir);
    tracing::info!("  - Log Level: {}", config.log_level);
    tracing::info!(
        "  - Log Format: {:?}",
        log_format.as_deref().unwrap_or("compact")
    );
    if let Some(f) = log_file {
        tracing::info!("  - Log File: {}", f);
    }
    tracing::info!("  - Metrics: {}", config.enable_metrics);

    // 启动监控指标（可选）
    if config.enable_metrics {
        match metrics::init(config.metrics_port) {
            Ok(()) => tracing::info!("📈 Metrics listening on :{}", config.metrics_port),
            Err(e) => tracing::warn!("⚠️ 指标初始化失败（继续运行）: {}", e),
        }
    }

    // 创建同步服务（身份解析失败会打印错误并退出，轮询不会启动）
    let service = match SyncService::new(config).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("❌ 同步服务初始化失败: {}", e);
            tracing::error!("💡 请检查远端 API 地址与 token 后重试");
            process::exit(1);
        }
    };

    // 运行轮询循环
    if let Err(e) = service.run().await {
        tracing::error!("❌ 同步服务运行失败: {}", e);
        process::exit(1);
    }

    Ok(())
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    let default_config = r#"# RentChat Sync 配置文件
# 此文件由 rentchat-sync generate-config 生成

[api]
base_url = "http://localhost:8000"
# token = "your_bearer_token"
request_timeout_secs = 10

[sync]
role = "customer"
admin_user_id = 1
poll_interval_secs = 12
latest_only = false

[notify]
sound = true
preview_chars = 80

[metrics]
enabled = false
port = 9100

[session]
state_dir = "./state"

[logging]
level = "info"
format = "compact"
# file = "./logs/rentchat-sync.log"
"#;

    fs::write(path, default_config).with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = SyncConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;
    config.validate()?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - API Base: {}", config.api_base_url);
    println!("  - Role: {}", config.role);
    println!("  - Poll Interval: {}s", config.poll_interval_secs);
    println!("  - Admin User: {}", config.admin_user_id);

    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(cli: &Cli) -> Result<()> {
    // 初始化基本日志（用于显示配置）
    logging::init_logging("info", None, None, false)?;

    let config = SyncConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

/// 发送一条消息后退出
async fn run_send(cli: &Cli, to: u64, message: String) -> Result<()> {
    logging::init_logging("info", None, None, cli.quiet)?;

    let config = SyncConfig::load(cli).context("加载配置失败")?;
    let service = SyncService::new(config)
        .await
        .context("同步服务初始化失败")?;

    match service.send(to, &message).await {
        Ok(()) => {
            println!("✅ 已发送给用户 {}", to);
            Ok(())
        }
        Err(e) => {
            // 发送失败保留原文，方便用户直接重试
            eprintln!("❌ 发送失败: {}", e);
            eprintln!("📝 未发送的内容: {}", message);
            process::exit(1);
        }
    }
}
