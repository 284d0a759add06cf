//! 数据模型模块

// 消息与用户（远端接口返回）
pub mod message;
pub mod user;

// 通知条目（仅客户端内存）
pub mod notification;

// 重新导出常用类型
pub use message::*;
pub use notification::*;
pub use user::*;
