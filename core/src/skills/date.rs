//! Date skill: answers `get_date` for the current date or a date referenced
//! in the query, with a speech-friendly rendering.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{SkillHandler, SkillOutput, SkillRequest};
use crate::error::Result;

pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// "June 5th, 2025".
pub fn format_date_for_speech(date: NaiveDate) -> String {
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        date.day(),
        ordinal_suffix(date.day()),
        date.year()
    )
}

pub fn parse_date_string(text: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%d %B %Y",
        "%d %b %Y",
        "%B %d %Y",
        "%b %d %Y",
    ];

    let trimmed = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    Some(match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    })
}

/// Resolve "next friday", "last monday", "this wednesday" against `today`.
/// "this" means the occurrence in the current week, "next" the one after
/// it, "last" the most recent one before today.
pub fn resolve_day_reference(today: NaiveDate, relative: &str, day: &str) -> Option<NaiveDate> {
    let target = weekday_from_name(day)?;

    let today_index = today.weekday().num_days_from_monday() as i64;
    let target_index = target.num_days_from_monday() as i64;
    let this_week = today + Duration::days(target_index - today_index);

    match relative {
        "this" => Some(this_week),
        "next" => Some(this_week + Duration::days(7)),
        "last" => {
            if this_week < today {
                Some(this_week)
            } else {
                Some(this_week - Duration::days(7))
            }
        }
        _ => None,
    }
}

static ISO_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static SLASH_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{4})\b").unwrap());

pub struct DateSkill;

#[async_trait]
impl SkillHandler for DateSkill {
    async fn handle(&self, request: SkillRequest<'_>) -> Result<SkillOutput> {
        let today = Local::now().date_naive();
        let mut target = today;
        let mut is_specific = false;
        let mut original: Option<String> = None;

        if let Some(date_entity) = request
            .entities
            .get("date")
            .and_then(|matches| matches.first())
        {
            let value = &date_entity.value;
            match value.get("type").and_then(|v| v.as_str()) {
                Some("relative") => {
                    match value.get("relative").and_then(|v| v.as_str()) {
                        Some("tomorrow") => target = today + Duration::days(1),
                        Some("yesterday") => target = today - Duration::days(1),
                        _ => {}
                    }
                }
                Some("day_reference") => {
                    let relative = value.get("relative").and_then(|v| v.as_str()).unwrap_or("");
                    let day = value.get("day").and_then(|v| v.as_str()).unwrap_or("");
                    if let Some(resolved) = resolve_day_reference(today, relative, day) {
                        target = resolved;
                        is_specific = true;
                    }
                }
                _ => {
                    if let Some(date_str) = value.get("date").and_then(|v| v.as_str()) {
                        original = Some(date_str.to_string());
                        if let Some(parsed) = parse_date_string(date_str) {
                            target = parsed;
                            is_specific = true;
                        }
                    }
                }
            }
        } else {
            let found = ISO_IN_TEXT
                .find(request.text)
                .or_else(|| SLASH_IN_TEXT.find(request.text));
            if let Some(found) = found {
                original = Some(found.as_str().to_string());
                if let Some(parsed) = parse_date_string(found.as_str()) {
                    target = parsed;
                    is_specific = true;
                }
            }
        }

        let days_from_today = (target - today).num_days();
        let relative = match days_from_today {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            -1 => "yesterday".to_string(),
            2..=7 => format!("{} days from now", days_from_today),
            -7..=-2 => format!("{} days ago", -days_from_today),
            _ => String::new(),
        };

        let mut output = SkillOutput::default();
        output.data = json!({
            "date": target.to_string(),
            "formatted_date": format_date_for_speech(target),
            "day_of_week": target.format("%A").to_string(),
            "is_specific_date": is_specific,
            "original_date_str": original,
            "is_today": days_from_today == 0,
            "is_future": days_from_today > 0,
            "is_past": days_from_today < 0,
            "days_from_today": days_from_today,
            "relative_description": relative,
            "timezone": "local",
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        Ok(output)
    }
}
