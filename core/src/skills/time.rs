//! Time skill: answers `get_time` with speech-friendly formats for the
//! current time or a time referenced in the query.

use async_trait::async_trait;
use chrono::{Local, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{SkillHandler, SkillOutput, SkillRequest};
use crate::error::Result;

/// "2 PM", "2 oh 5 PM", "2 30 PM".
pub fn format_time_for_speech(time: NaiveTime) -> String {
    let (hour_12, period) = twelve_hour(time.hour());
    let minute = time.minute();

    if minute == 0 {
        format!("{} {}", hour_12, period)
    } else if minute < 10 {
        format!("{} oh {} {}", hour_12, minute, period)
    } else {
        format!("{} {} {}", hour_12, minute, period)
    }
}

/// "quarter past 2 in the afternoon", "10 minutes to 5 in the evening".
pub fn format_time_words(time: NaiveTime) -> String {
    let hour = time.hour();
    let minute = time.minute();

    let hour_12 = if hour % 12 == 0 { 12 } else { hour % 12 };
    let next_hour = (hour_12 % 12) + 1;
    let period = match hour {
        5..=11 => "in the morning",
        12..=16 => "in the afternoon",
        17..=20 => "in the evening",
        _ => "at night",
    };

    match minute {
        0 => format!("{} o'clock {}", hour_12, period),
        15 => format!("quarter past {} {}", hour_12, period),
        30 => format!("half past {} {}", hour_12, period),
        45 => format!("quarter to {} {}", next_hour, period),
        m if m < 30 => format!("{} minutes past {} {}", m, hour_12, period),
        m => format!("{} minutes to {} {}", 60 - m, next_hour, period),
    }
}

pub fn time_period(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

fn twelve_hour(hour: u32) -> (u32, &'static str) {
    let period = if hour < 12 { "AM" } else { "PM" };
    let hour_12 = if hour % 12 == 0 { 12 } else { hour % 12 };
    (hour_12, period)
}

static O_CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})\s*o['`]?\s*clock").unwrap());
static PAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:(quarter)|(\d{1,2}))\s*past\s*(\d{1,2})").unwrap());
static TO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:(quarter)|(\d{1,2}))\s*to\s*(\d{1,2})").unwrap());
static HALF_PAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"half\s*past\s*(\d{1,2})").unwrap());

/// Parse clock strings ("14:30", "2:30 PM") and a few natural forms
/// ("3 o'clock", "quarter past 3", "10 to 4", "half past 3").
pub fn parse_time_string(text: &str) -> Option<NaiveTime> {
    const FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p", "%I %p"];

    let trimmed = text.trim();
    for format in FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(trimmed, format) {
            return Some(time);
        }
        if let Ok(time) = NaiveTime::parse_from_str(&trimmed.to_uppercase(), format) {
            return Some(time);
        }
    }

    let lower = trimmed.to_lowercase();
    let pm_shift = |hour: u32| -> u32 {
        if lower.contains("pm") {
            hour % 12 + 12
        } else {
            hour % 12
        }
    };

    if let Some(caps) = HALF_PAST.captures(&lower) {
        let hour: u32 = caps[1].parse().ok()?;
        return NaiveTime::from_hms_opt(pm_shift(hour), 30, 0);
    }

    if let Some(caps) = O_CLOCK.captures(&lower) {
        let hour: u32 = caps[1].parse().ok()?;
        return NaiveTime::from_hms_opt(pm_shift(hour), 0, 0);
    }

    if let Some(caps) = PAST.captures(&lower) {
        let minute = if caps.get(1).is_some() {
            15
        } else {
            caps[2].parse().ok()?
        };
        let hour: u32 = caps[3].parse().ok()?;
        return NaiveTime::from_hms_opt(pm_shift(hour), minute, 0);
    }

    if let Some(caps) = TO.captures(&lower) {
        let minute: u32 = if caps.get(1).is_some() {
            45
        } else {
            60u32.checked_sub(caps[2].parse().ok()?)?
        };
        let hour: u32 = caps[3].parse().ok()?;
        let target = pm_shift(hour);
        let previous = if target == 0 { 23 } else { target - 1 };
        return NaiveTime::from_hms_opt(previous, minute % 60, 0);
    }

    None
}

static TIME_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}:\d{2}(?::\d{2})?\s*(?:am|pm|AM|PM)?)\b").unwrap());

pub struct TimeSkill;

#[async_trait]
impl SkillHandler for TimeSkill {
    async fn handle(&self, request: SkillRequest<'_>) -> Result<SkillOutput> {
        let now = Local::now();
        let mut target = now.time();
        let mut is_specific = false;
        let mut original: Option<String> = None;

        if let Some(time_entity) = request
            .entities
            .get("time")
            .and_then(|matches| matches.first())
        {
            if let Some(time_str) = time_entity.value.get("time").and_then(|v| v.as_str()) {
                original = Some(time_str.to_string());
                if let Some(parsed) = parse_time_string(time_str) {
                    target = parsed;
                    is_specific = true;
                }
            }
        } else if let Some(found) = TIME_IN_TEXT.find(request.text) {
            original = Some(found.as_str().to_string());
            if let Some(parsed) = parse_time_string(found.as_str()) {
                target = parsed;
                is_specific = true;
            }
        }

        let (hour_12, period) = twelve_hour(target.hour());
        let formatted = format!("{}:{:02} {}", hour_12, target.minute(), period);

        let minute_diff = (target.hour() as i64 - now.hour() as i64) * 60
            + (target.minute() as i64 - now.minute() as i64);
        let relative = if !is_specific {
            "now".to_string()
        } else if (-5..0).contains(&minute_diff) {
            format!("{} minutes ago", -minute_diff)
        } else if (1..=5).contains(&minute_diff) {
            format!("in {} minutes", minute_diff)
        } else {
            String::new()
        };

        let mut output = SkillOutput::default();
        output.data = json!({
            "time": target.format("%H:%M:%S").to_string(),
            "formatted_time": formatted,
            "digital_time": target.format("%H:%M").to_string(),
            "speech_time": format_time_for_speech(target),
            "natural_time": format_time_words(target),
            "hour": target.hour(),
            "minute": target.minute(),
            "second": target.second(),
            "hour_12": hour_12,
            "period": period,
            "time_of_day": time_period(target.hour()),
            "is_specific_time": is_specific,
            "is_current_time": !is_specific,
            "original_time_str": original,
            "relative_description": relative,
            "timezone": "local",
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::config::AppConfig;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn speech_format_handles_minute_shapes() {
        assert_eq!(format_time_for_speech(time(14, 0)), "2 PM");
        assert_eq!(format_time_for_speech(time(14, 5)), "2 oh 5 PM");
        assert_eq!(format_time_for_speech(time(14, 30)), "2 30 PM");
        assert_eq!(format_time_for_speech(time(0, 0)), "12 AM");
    }

    #[test]
    fn word_format_uses_quarter_and_half() {
        assert_eq!(
            format_time_words(time(14, 15)),
            "quarter past 2 in the afternoon"
        );
        assert_eq!(
            format_time_words(time(14, 30)),
            "half past 2 in the afternoon"
        );
        assert_eq!(
            format_time_words(time(14, 45)),
            "quarter to 3 in the afternoon"
        );
        assert_eq!(format_time_words(time(9, 0)), "9 o'clock in the morning");
    }

    #[test]
    fn parses_digital_and_am_pm() {
        assert_eq!(parse_time_string("14:30"), Some(time(14, 30)));
        assert_eq!(parse_time_string("2:30 PM"), Some(time(14, 30)));
        assert_eq!(parse_time_string("2:30 pm"), Some(time(14, 30)));
    }

    #[test]
    fn parses_natural_phrases() {
        assert_eq!(parse_time_string("3 o'clock"), Some(time(3, 0)));
        assert_eq!(parse_time_string("3 o'clock pm"), Some(time(15, 0)));
        assert_eq!(parse_time_string("quarter past 3"), Some(time(3, 15)));
        assert_eq!(parse_time_string("half past 3 pm"), Some(time(15, 30)));
        assert_eq!(parse_time_string("10 to 4"), Some(time(3, 50)));
    }

    #[test]
    fn unparseable_strings_are_none() {
        assert_eq!(parse_time_string("sometime later"), None);
    }

    #[test]
    fn period_buckets() {
        assert_eq!(time_period(9), "morning");
        assert_eq!(time_period(13), "afternoon");
        assert_eq!(time_period(19), "evening");
        assert_eq!(time_period(23), "night");
        assert_eq!(time_period(3), "night");
    }

    #[tokio::test]
    async fn handler_reports_the_current_hour() {
        let config = AppConfig::default();
        let entities = HashMap::new();
        let request = SkillRequest {
            intent: "get_time",
            entities: &entities,
            text: "what time is it",
            user_id: "default",
            device_id: "unknown",
            config: &config,
        };

        let output = TimeSkill.handle(request).await.unwrap();
        let now = Local::now();
        let hour = output.data["hour"].as_u64().unwrap() as u32;

        // Allow a rollover between the call and the assertion.
        assert!(hour == now.hour() || hour == now.time().hour().saturating_sub(1) || hour == (now.hour() + 23) % 24);
        assert!(output.data["formatted_time"].as_str().unwrap().contains(':'));
        assert_eq!(output.data["is_current_time"], json!(true));
        assert_eq!(output.data["relative_description"], json!("now"));
    }

    #[tokio::test]
    async fn handler_honours_a_time_in_the_text() {
        let config = AppConfig::default();
        let entities = HashMap::new();
        let request = SkillRequest {
            intent: "get_time",
            entities: &entities,
            text: "what time is 2:30 pm",
            user_id: "default",
            device_id: "unknown",
            config: &config,
        };

        let output = TimeSkill.handle(request).await.unwrap();
        assert_eq!(output.data["formatted_time"], json!("2:30 PM"));
        assert_eq!(output.data["is_specific_time"], json!(true));
    }
}
