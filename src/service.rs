use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ChatApi, HttpChatApi};
use crate::config::SyncConfig;
use crate::context::Identity;
use crate::error::Result;
use crate::metrics;
use crate::model::{NotificationEntry, Role};
use crate::notify::{Notifier, SilentNotifier, TerminalBell};
use crate::session::SessionStore;
use crate::sync::{EngineOptions, SyncEngine};

/// 同步服务
///
/// 装配身份、API 客户端与轮询引擎，并拥有唯一的轮询任务。
/// 定时任务归实例所有、显式取消，不会跨生命周期泄漏。
pub struct SyncService {
    config: SyncConfig,
    engine: Arc<SyncEngine>,
    session: SessionStore,
    shutdown: watch::Sender<bool>,
}

impl SyncService {
    /// 创建同步服务
    ///
    /// 身份解析成功之前不会开始任何轮询：没有 self_id 与角色就无法
    /// 判定消息方向归属。
    pub async fn new(config: SyncConfig) -> Result<Self> {
        let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(
            config.api_base()?,
            config.api_token.as_deref(),
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let notifier: Arc<dyn Notifier> = if config.sound {
            Arc::new(TerminalBell)
        } else {
            Arc::new(SilentNotifier)
        };
        Self::with_api(config, api, notifier).await
    }

    /// 注入自定义 API 实现与提示器（测试与扩展用）
    pub async fn with_api(
        config: SyncConfig,
        api: Arc<dyn ChatApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let role = config.parsed_role()?;
        let session = SessionStore::new(Path::new(&config.state_dir));
        if let Some(prev) = session.load() {
            info!(
                "📂 发现已保存的会话: user_id={}, role={}",
                prev.user_id, prev.role
            );
        }

        let identity = Identity::resolve(api.as_ref(), role, config.admin_user_id).await?;
        if let Err(e) = session.save(&identity) {
            warn!("⚠️ 会话镜像保存失败（不影响同步）: {}", e);
        }

        let options = EngineOptions {
            latest_only: config.latest_only,
            preview_chars: config.preview_chars,
        };
        let engine = Arc::new(SyncEngine::new(identity, api, notifier, options));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            engine,
            session,
            shutdown,
        })
    }

    /// 轮询引擎（通知中心、已读操作经由它暴露给 UI 层）
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// 运行轮询循环
    ///
    /// 启动后立刻执行一次轮询（首屏不用等一个完整间隔），之后按固定
    /// 间隔循环；不做指数退避，失败的周期在下个间隔自然重试。
    /// ctrl-c 或 `stop()` 退出。
    pub async fn run(&self) -> Result<()> {
        let identity = self.engine.identity();
        info!(
            "🔄 轮询启动: role={}, self_id={}, interval={}s",
            identity.role, identity.self_id, self.config.poll_interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match self.engine.poll_once().await {
                        Ok(outcome) => {
                            debug!(
                                "✅ 轮询完成: peers={}, inbound={}, notified={}, failed={}",
                                outcome.scanned_peers,
                                outcome.inbound,
                                outcome.notified,
                                outcome.failed_peers
                            );
                            metrics::record_poll(&outcome, started.elapsed().as_secs_f64());
                            metrics::record_unread(self.engine.notifications().unread_total());
                        }
                        Err(e) if e.is_recoverable() => {
                            // 后台轮询失败对用户不可见，仅记录
                            warn!("⚠️ 轮询失败: {}", e);
                            metrics::record_poll_failure();
                        }
                        Err(e) => {
                            // 会话过期全局处理一次：清除本地镜像、提示、停止
                            warn!("🔒 会话已过期，请重新登录");
                            self.session.clear();
                            self.engine.notifications().push(NotificationEntry::system(
                                "会话已过期",
                                "登录状态失效，请重新登录",
                            ));
                            return Err(e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("🛑 收到停止信号，轮询结束");
                    return Ok(());
                }
                _ = &mut ctrl_c => {
                    info!("🛑 收到 Ctrl-C，轮询结束");
                    return Ok(());
                }
            }
        }
    }

    /// 请求停止轮询（显式取消自有的定时任务）
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// 发送消息（用户主动操作）
    ///
    /// 失败向调用方传播，调用方保留输入内容以便重试。
    pub async fn send(&self, receiver_id: u64, text: &str) -> Result<()> {
        self.engine.send(receiver_id, text).await?;
        metrics::record_message_sent();
        Ok(())
    }

    /// 当前配置
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 运行角色
    pub fn role(&self) -> Role {
        self.engine.identity().role
    }
}
