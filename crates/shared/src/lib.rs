//! 共享库
//!
//! 包含行程通知服务共用的配置、错误处理、数据库连接、Redis 客户端和可观测性基础设施。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
