//! 通知构建器
//!
//! 为各类行程事件构造固定类型、优先级和数据结构的通知请求

use chrono::Duration;

use crate::models::{NotificationKind, NotificationRequest, Priority};

/// 天气预警
#[derive(Debug, Clone)]
pub struct WeatherAlert {
    pub alert_type: String,
    /// emergency / warning / watch / advisory
    pub severity: String,
    pub description: String,
    pub location: String,
}

impl WeatherAlert {
    /// 严重程度映射为通知优先级
    pub fn priority(&self) -> Priority {
        match self.severity.to_ascii_lowercase().as_str() {
            "emergency" => Priority::Critical,
            "warning" => Priority::High,
            "watch" => Priority::Normal,
            _ => Priority::Low,
        }
    }
}

/// 航班延误信息
#[derive(Debug, Clone)]
pub struct FlightDelay {
    pub flight_number: String,
    /// delayed / cancelled / ...
    pub status: String,
    pub delay_minutes: i64,
}

impl FlightDelay {
    pub fn is_cancelled(&self) -> bool {
        self.status.eq_ignore_ascii_case("cancelled")
    }

    /// 取消为 critical，延误超过一小时为 high，其余为 normal
    pub fn priority(&self) -> Priority {
        if self.is_cancelled() {
            Priority::Critical
        } else if self.delay_minutes > 60 {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

/// 相对时间描述，向下取整到最大的整单位
///
/// 满 24 小时用天，满 1 小时用小时，否则用分钟；恰好为 1 时用单数。
/// 负值按 0 分钟处理。
pub fn format_relative_time(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);

    let (value, unit) = if minutes >= 24 * 60 {
        (minutes / (24 * 60), "day")
    } else if minutes >= 60 {
        (minutes / 60, "hour")
    } else {
        (minutes, "minute")
    };

    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn trip_action_url(trip_id: &str) -> String {
    format!("/trips/{}", trip_id)
}

/// 通知构建器
pub struct NotificationBuilder;

impl NotificationBuilder {
    /// 天气预警通知
    pub fn weather_alert(
        user_id: impl Into<String>,
        trip_id: &str,
        alert: &WeatherAlert,
    ) -> NotificationRequest {
        NotificationRequest::new(
            user_id,
            NotificationKind::WeatherAlert,
            alert.priority(),
            format!("Weather Alert: {}", alert.alert_type),
            format!("{} in {}", alert.description, alert.location),
        )
        .with_trip(trip_id)
        .with_action_url(trip_action_url(trip_id))
        .with_data("alert_type", &alert.alert_type)
        .with_data("severity", &alert.severity)
        .with_data("description", &alert.description)
        .with_data("location", &alert.location)
    }

    /// 航班延误或取消通知
    pub fn delay_alert(
        user_id: impl Into<String>,
        trip_id: &str,
        delay: &FlightDelay,
    ) -> NotificationRequest {
        let (title, body) = if delay.is_cancelled() {
            (
                format!("Flight {} Cancelled", delay.flight_number),
                format!(
                    "Your flight {} has been cancelled. Please check rebooking options.",
                    delay.flight_number
                ),
            )
        } else {
            (
                format!("Flight {} Delayed", delay.flight_number),
                format!(
                    "Your flight {} is delayed by {}. Status: {}",
                    delay.flight_number,
                    format_relative_time(Duration::minutes(delay.delay_minutes)),
                    delay.status
                ),
            )
        };

        NotificationRequest::new(
            user_id,
            NotificationKind::DelayAlert,
            delay.priority(),
            title,
            body,
        )
        .with_trip(trip_id)
        .with_action_url(trip_action_url(trip_id))
        .with_data("flight_number", &delay.flight_number)
        .with_data("status", &delay.status)
        .with_data("delay_minutes", delay.delay_minutes.to_string())
    }

    /// 行程提醒
    ///
    /// reminder_type 支持 departure、check_in（checkin）、activity，其余使用通用提醒文案
    pub fn trip_reminder(
        user_id: impl Into<String>,
        trip_id: &str,
        destination: &str,
        reminder_type: &str,
        time_until: Duration,
    ) -> NotificationRequest {
        let when = format_relative_time(time_until);

        let (title, body) = match reminder_type.to_ascii_lowercase().as_str() {
            "departure" => (
                "Trip Departure Reminder".to_string(),
                format!(
                    "Your trip to {} starts in {}. Don't forget to check your itinerary!",
                    destination, when
                ),
            ),
            "check_in" | "checkin" => (
                "Check-in Reminder".to_string(),
                format!("Check-in for your trip to {} opens in {}.", destination, when),
            ),
            "activity" => (
                "Upcoming Activity".to_string(),
                format!("Your next activity in {} starts in {}.", destination, when),
            ),
            _ => (
                "Trip Reminder".to_string(),
                format!("Reminder for your trip to {} in {}.", destination, when),
            ),
        };

        NotificationRequest::new(
            user_id,
            NotificationKind::TripReminder,
            Priority::Normal,
            title,
            body,
        )
        .with_trip(trip_id)
        .with_action_url(trip_action_url(trip_id))
        .with_data("destination", destination)
        .with_data("reminder_type", reminder_type)
        .with_data("time_until", when)
    }

    /// 预订确认
    pub fn booking_confirmation(
        user_id: impl Into<String>,
        trip_id: &str,
        booking_type: &str,
        confirmation_number: &str,
    ) -> NotificationRequest {
        NotificationRequest::new(
            user_id,
            NotificationKind::BookingConfirmation,
            Priority::High,
            format!("{} Booking Confirmed", capitalize(booking_type)),
            format!(
                "Your {} booking has been confirmed. Confirmation number: {}",
                booking_type, confirmation_number
            ),
        )
        .with_trip(trip_id)
        .with_action_url(trip_action_url(trip_id))
        .with_data("booking_type", booking_type)
        .with_data("confirmation_number", confirmation_number)
    }

    /// 行程变更
    pub fn trip_update(
        user_id: impl Into<String>,
        trip_id: &str,
        message: &str,
    ) -> NotificationRequest {
        NotificationRequest::new(
            user_id,
            NotificationKind::ItineraryUpdate,
            Priority::Normal,
            "Trip Update",
            message,
        )
        .with_trip(trip_id)
        .with_action_url(trip_action_url(trip_id))
        .with_data("message", message)
    }
}
