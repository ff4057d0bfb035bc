//! Built-in response-key selectors, registered into the engine at startup.
//! Each maps a handler's data context to `<intent>.<context>`.

use chrono::{Local, Timelike};
use echo::{Context, SelectorFn};

pub fn standard() -> Vec<(&'static str, SelectorFn)> {
    vec![
        ("get_time", get_time_key),
        ("get_date", get_date_key),
        ("get_weather", get_weather_key),
        ("get_temperature", get_temperature_key),
        ("get_precipitation", get_precipitation_key),
        ("get_wind", get_wind_key),
        ("greeting", greeting_key),
    ]
}

fn context_hour(context: &Context) -> u32 {
    context
        .get("hour")
        .and_then(|v| v.as_u64())
        .map(|h| h as u32)
        .unwrap_or_else(|| Local::now().hour())
}

fn is_formal(context: &Context) -> bool {
    context
        .get("formal_mode")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// A location counts only when the user actually named one; IP-resolved
/// locations set `location_requested = false`.
fn has_location(context: &Context) -> bool {
    let named = context
        .get("location")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let requested = context
        .get("location_requested")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    named && requested
}

fn has_date(context: &Context) -> bool {
    context
        .get("date")
        .and_then(|v| v.as_str())
        .map(|d| d != "today")
        .unwrap_or(false)
}

fn has_precipitation(context: &Context) -> bool {
    context
        .get("has_precipitation")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn get_time_key(context: &Context) -> String {
    if is_formal(context) {
        return "get_time.formal".to_string();
    }

    let hour = context_hour(context);
    if hour < 12 {
        "get_time.morning".to_string()
    } else if hour >= 18 {
        "get_time.evening".to_string()
    } else {
        "get_time.casual".to_string()
    }
}

fn get_date_key(context: &Context) -> String {
    let include_day = context
        .get("include_day_of_week")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    if include_day {
        "get_date.with_day".to_string()
    } else {
        "get_date.standard".to_string()
    }
}

fn get_weather_key(context: &Context) -> String {
    let location = has_location(context);

    if has_precipitation(context) {
        return if location {
            "get_weather.with_precipitation_location".to_string()
        } else {
            "get_weather.with_precipitation".to_string()
        };
    }

    let wind = context.get("wind").and_then(|v| v.as_str()).unwrap_or("");
    if wind.contains("strong") {
        return if location {
            "get_weather.with_strong_wind_location".to_string()
        } else {
            "get_weather.with_strong_wind".to_string()
        };
    }

    match (location, has_date(context)) {
        (true, true) => "get_weather.with_location_date".to_string(),
        (true, false) => "get_weather.with_location".to_string(),
        (false, true) => "get_weather.with_date".to_string(),
        (false, false) => "get_weather.default".to_string(),
    }
}

fn get_temperature_key(context: &Context) -> String {
    let location = has_location(context);

    let feels_like = context
        .get("feels_like")
        .map(|v| !v.is_null())
        .unwrap_or(false);
    if feels_like {
        return if location {
            "get_temperature.with_feels_like_location".to_string()
        } else {
            "get_temperature.with_feels_like".to_string()
        };
    }

    match (location, has_date(context)) {
        (true, true) => "get_temperature.with_location_date".to_string(),
        (true, false) => "get_temperature.with_location".to_string(),
        (false, true) => "get_temperature.with_date".to_string(),
        (false, false) => "get_temperature.default".to_string(),
    }
}

fn get_precipitation_key(context: &Context) -> String {
    let location = has_location(context);

    if !has_precipitation(context) {
        return if location {
            "get_precipitation.no_rain_location".to_string()
        } else {
            "get_precipitation.no_rain".to_string()
        };
    }

    let text = context.get("text").and_then(|v| v.as_str()).unwrap_or("");
    if text.to_lowercase().contains("umbrella") {
        return "get_precipitation.with_umbrella".to_string();
    }

    match (location, has_date(context)) {
        (true, true) => "get_precipitation.with_location_date".to_string(),
        (true, false) => "get_precipitation.with_location".to_string(),
        (false, true) => "get_precipitation.with_date".to_string(),
        (false, false) => "get_precipitation.default".to_string(),
    }
}

fn get_wind_key(context: &Context) -> String {
    match (has_location(context), has_date(context)) {
        (true, true) => "get_wind.with_location_date".to_string(),
        (true, false) => "get_wind.with_location".to_string(),
        (false, true) => "get_wind.with_date".to_string(),
        (false, false) => "get_wind.default".to_string(),
    }
}

fn greeting_key(context: &Context) -> String {
    if is_formal(context) {
        return "greeting.default".to_string();
    }

    match context_hour(context) {
        5..=11 => "greeting.morning".to_string(),
        12..=17 => "greeting.afternoon".to_string(),
        _ => "greeting.evening".to_string(),
    }
}
