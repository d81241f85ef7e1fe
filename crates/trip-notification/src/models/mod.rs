//! 行程通知数据模型
//!
//! 包含设备令牌、通知请求、发送结果、定时通知和发送历史等实体。

mod device;
mod enums;
mod history;
mod notification;
mod scheduled;

pub use device::*;
pub use enums::*;
pub use history::*;
pub use notification::*;
pub use scheduled::*;
