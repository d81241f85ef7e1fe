//! 行程通知服务
//!
//! 负责 AuraTravel 行程相关推送通知的完整链路：
//!
//! - `registry`: 设备令牌登记与停用
//! - `template`: 按通知类型和语言查找本地化模板并替换占位符
//! - `dispatcher`: 组装多接收方推送消息、调用推送服务、处理逐条结果
//! - `scheduler`: 定时通知的持久化与到期扫描
//! - `service`: 天气预警、延误、行程提醒、预订确认、行程广播等便捷发送入口
//! - `worker`: 单实例轮询到期定时通知的后台任务

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod push;
pub mod registry;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod template;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use error::{NotificationError, Result};
pub use registry::DeviceRegistry;
pub use scheduler::Scheduler;
pub use service::TripNotificationService;
pub use template::TemplateEngine;
