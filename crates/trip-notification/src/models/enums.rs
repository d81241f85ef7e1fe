//! 通知相关枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 设备平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            other => Err(format!("未知平台: {}", other)),
        }
    }
}

/// 通知类型
///
/// 决定本地化模板的查找键和推送数据中的 `kind` 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NotificationKind {
    /// 天气预警
    WeatherAlert,
    /// 行程变更
    ItineraryUpdate,
    /// 行程提醒
    TripReminder,
    /// 航班/交通延误
    DelayAlert,
    /// 预订确认
    BookingConfirmation,
    /// 一般更新
    GeneralUpdate,
    /// 紧急警报
    EmergencyAlert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeatherAlert => "weather_alert",
            Self::ItineraryUpdate => "itinerary_update",
            Self::TripReminder => "trip_reminder",
            Self::DelayAlert => "delay_alert",
            Self::BookingConfirmation => "booking_confirmation",
            Self::GeneralUpdate => "general_update",
            Self::EmergencyAlert => "emergency_alert",
        }
    }
}

/// 通知优先级
///
/// 推送时映射为各平台的紧急程度和提示音
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// 是否需要以高紧急程度投递
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}
