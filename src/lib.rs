pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod service;
pub mod session;
pub mod sync;

pub use api::{ChatApi, HttpChatApi};
pub use config::SyncConfig;
pub use context::Identity;
pub use error::{Result, SyncError};
pub use model::*;
pub use notify::{NotificationCenter, Notifier, ReadState, SilentNotifier, TerminalBell};
pub use service::SyncService;
pub use session::{SessionFile, SessionStore};
pub use sync::{ConversationCursor, CursorStore, EngineOptions, PollOutcome, SyncEngine};
