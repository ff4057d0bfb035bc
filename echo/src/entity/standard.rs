//! Value normalisers for the standard entity kinds.
//!
//! Every normaliser returns a JSON object. Surface forms that are not
//! recognised come back with `type: "unknown"` rather than an error; the
//! matcher's confidence is unaffected by normalisation outcomes.

use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::EntityKind;

pub fn process_value(kind: EntityKind, raw: &str) -> Value {
    match kind {
        EntityKind::Date => process_date(raw),
        EntityKind::Time => process_time(raw),
        EntityKind::Duration => process_duration(raw),
        EntityKind::Location => json!({ "name": raw, "type": "location" }),
        EntityKind::Number => process_number(raw),
        EntityKind::WeatherCondition => process_condition(raw),
        EntityKind::Temperature => process_temperature(raw),
        EntityKind::Precipitation => process_precipitation(raw),
        EntityKind::Wind => process_wind(raw),
        EntityKind::Other => json!({ "value": raw }),
    }
}

static DAY_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(next|last|this)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)")
        .unwrap()
});
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2,4})").unwrap());

fn process_date(raw: &str) -> Value {
    let lower = raw.to_lowercase();
    let today = Local::now().date_naive();

    let relative = |date: NaiveDate, name: &str| {
        json!({ "date": date.to_string(), "type": "relative", "relative": name })
    };

    match lower.as_str() {
        "today" => return relative(today, "today"),
        "tomorrow" => return relative(today + Duration::days(1), "tomorrow"),
        "yesterday" => return relative(today - Duration::days(1), "yesterday"),
        _ => {}
    }

    if let Some(caps) = DAY_REFERENCE.captures(&lower) {
        return json!({
            "date": lower,
            "type": "day_reference",
            "relative": &caps[1],
            "day": &caps[2],
        });
    }

    if let Some(caps) = NUMERIC_DATE.captures(&lower) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        let mut year: i32 = caps[3].parse().unwrap_or(0);
        if year < 100 {
            year += 2000;
        }

        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return json!({
                "date": date.to_string(),
                "type": "specific",
                "month": month,
                "day": day,
                "year": year,
            });
        }
    }

    json!({ "date": raw, "type": "unknown" })
}

static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*(am|pm)?").unwrap());

fn process_time(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(caps) = CLOCK_TIME.captures(&lower) {
        let mut hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps[2].parse().unwrap_or(0);

        match caps.get(3).map(|m| m.as_str()) {
            Some("pm") if hour < 12 => hour += 12,
            Some("am") if hour == 12 => hour = 0,
            _ => {}
        }

        return json!({
            "time": format!("{:02}:{:02}", hour, minute),
            "type": "specific",
            "hour": hour,
            "minute": minute,
        });
    }

    let named = match lower.as_str() {
        "morning" => Some("09:00"),
        "noon" => Some("12:00"),
        "afternoon" => Some("15:00"),
        "evening" => Some("19:00"),
        "night" => Some("22:00"),
        "midnight" => Some("00:00"),
        _ => None,
    };

    if let Some(time) = named {
        return json!({ "time": time, "type": "period", "period": lower });
    }

    json!({ "time": raw, "type": "unknown" })
}

static SPECIFIC_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s+(second|minute|hour|day|week|month|year)s?").unwrap());
static INDEFINITE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(a|an|one)\s+(second|minute|hour|day|week|month|year)").unwrap());

fn process_duration(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(caps) = SPECIFIC_DURATION.captures(&lower) {
        let amount: u64 = caps[1].parse().unwrap_or(0);
        return json!({
            "duration": raw,
            "type": "specific",
            "amount": amount,
            "unit": &caps[2],
        });
    }

    if let Some(caps) = INDEFINITE_DURATION.captures(&lower) {
        return json!({
            "duration": raw,
            "type": "indefinite",
            "amount": 1,
            "unit": &caps[2],
        });
    }

    json!({ "duration": raw, "type": "unknown" })
}

fn word_number(word: &str) -> Option<i64> {
    Some(match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "hundred" => 100,
        "thousand" => 1000,
        _ => return None,
    })
}

fn process_number(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(n) = word_number(&lower) {
        return json!({ "value": n, "type": "integer", "raw": raw });
    }

    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return json!({ "value": f, "type": "float", "raw": raw });
        }
    } else if let Ok(i) = raw.parse::<i64>() {
        return json!({ "value": i, "type": "integer", "raw": raw });
    }

    json!({ "value": raw, "type": "unknown", "raw": raw })
}

fn process_condition(raw: &str) -> Value {
    let condition = match raw.to_lowercase().as_str() {
        "sunny" | "clear" => Some("clear"),
        "cloudy" | "overcast" => Some("cloudy"),
        "rainy" | "raining" | "rain" | "showers" => Some("rain"),
        "snowy" | "snowing" | "snow" => Some("snow"),
        "stormy" | "thunderstorm" | "thunderstorms" => Some("storm"),
        "windy" => Some("windy"),
        "foggy" | "misty" => Some("fog"),
        "hailing" | "hail" => Some("hail"),
        "sleeting" | "sleet" => Some("sleet"),
        _ => None,
    };

    json!({
        "condition": condition.unwrap_or("unknown"),
        "description": raw,
    })
}

static DEGREES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*(?:degrees|°)\s*(c|f|celsius|fahrenheit)?").unwrap());

fn process_temperature(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(caps) = DEGREES.captures(&lower) {
        let value: i64 = caps[1].parse().unwrap_or(0);
        let unit = match caps.get(2).map(|m| m.as_str()) {
            Some("c") | Some("celsius") => "C",
            _ => "F",
        };
        return json!({ "value": value, "unit": unit, "description": raw });
    }

    let described = match lower.as_str() {
        "freezing" => Some(("below_freezing", 32)),
        "cold" => Some(("cold", 40)),
        "cool" => Some(("cool", 55)),
        "mild" => Some(("mild", 65)),
        "warm" => Some(("warm", 75)),
        "hot" => Some(("hot", 85)),
        "boiling" => Some(("very_hot", 95)),
        _ => None,
    };

    if let Some((range, estimate)) = described {
        return json!({
            "range": range,
            "estimate": estimate,
            "unit": "F",
            "description": raw,
        });
    }

    json!({ "description": raw, "value": null })
}

static CHANCE_OF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)%\s+chance of (rain|snow|sleet|hail|showers|thunderstorms)").unwrap()
});
static INTENSITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(light|moderate|heavy)\s+(rain|snow|sleet|hail|showers|drizzle|downpour)")
        .unwrap()
});

fn process_precipitation(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(caps) = CHANCE_OF.captures(&lower) {
        let chance: u64 = caps[1].parse().unwrap_or(0);
        return json!({
            "type": &caps[2],
            "chance": chance,
            "intensity": "unknown",
            "description": raw,
        });
    }

    if let Some(caps) = INTENSITY.captures(&lower) {
        return json!({
            "type": &caps[2],
            "intensity": &caps[1],
            "chance": 100,
            "description": raw,
        });
    }

    json!({ "description": raw })
}

static WIND_SPEED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d+)\s+(mph|kmh|knots)\s+(north|south|east|west|northeast|northwest|southeast|southwest)?\s*wind",
    )
    .unwrap()
});
static WIND_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(light|moderate|strong|high|gale force)\s+(winds?|breeze)").unwrap());

fn process_wind(raw: &str) -> Value {
    let lower = raw.to_lowercase();

    if let Some(caps) = WIND_SPEED.captures(&lower) {
        let speed: u64 = caps[1].parse().unwrap_or(0);
        return json!({
            "speed": speed,
            "unit": &caps[2],
            "direction": caps.get(3).map(|m| m.as_str()).unwrap_or("unknown"),
            "description": raw,
        });
    }

    if let Some(caps) = WIND_DESCRIPTION.captures(&lower) {
        let intensity = caps[1].to_string();
        let speed = match intensity.as_str() {
            "light" => 5,
            "moderate" => 15,
            "strong" => 25,
            "high" => 35,
            "gale force" => 45,
            _ => 0,
        };
        return json!({
            "intensity": intensity,
            "type": &caps[2],
            "speed": speed,
            "unit": "mph",
            "description": raw,
        });
    }

    json!({ "description": raw })
}
