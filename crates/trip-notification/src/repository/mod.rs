//! 数据库仓储层
//!
//! 设备令牌、定时通知、发送历史和行程成员的数据访问。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - PostgreSQL 实现使用 SQLx，内存实现使用 DashMap（测试与本地开发）
//! - 定义 trait 接口以支持 mock 测试

mod device_token_repo;
mod history_repo;
pub mod memory;
mod scheduled_repo;
mod traits;
mod trip_member_repo;

pub use device_token_repo::DeviceTokenRepository;
pub use history_repo::NotificationHistoryRepository;
pub use scheduled_repo::ScheduledNotificationRepository;
pub use traits::*;
pub use trip_member_repo::TripMemberRepository;
