//! Weather skill: serves `get_weather`, `get_temperature`,
//! `get_precipitation` and `get_wind` from one shared data context. The
//! template selectors pick the variant; the handler resolves the location,
//! fetches a report and shapes the render data.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::json;

use super::geocoding::{GeoLocation, GeocodingBackend};
use super::weather_service::WeatherBackend;
use super::{SkillData, SkillHandler, SkillOutput, SkillRequest};
use crate::config::AppConfig;
use crate::error::{CoreError, Result};

const HERE_ALIASES: &[&str] = &["here", "current location", "this place", "your current location"];

/// A "location" that actually means "wherever I am" and resolves via IP.
fn is_here_alias(name: &str) -> bool {
    HERE_ALIASES.contains(&name.to_lowercase().as_str())
}

pub struct WeatherSkill {
    service: WeatherBackend,
    geocoding: GeocodingBackend,
    units: String,
}

impl WeatherSkill {
    pub fn from_config(config: &AppConfig) -> Self {
        WeatherSkill {
            service: WeatherBackend::from_config(&config.weather),
            geocoding: GeocodingBackend::from_config(&config.geocoding),
            units: config.weather.units.clone(),
        }
    }

    async fn resolve_location(&self, requested: Option<&str>) -> Result<GeoLocation> {
        let use_ip = match requested {
            None => true,
            Some(name) => is_here_alias(name),
        };

        if use_ip {
            return self
                .geocoding
                .location_from_ip()
                .await?
                .ok_or_else(|| CoreError::Geocoding("Could not determine current location".into()));
        }

        let name = requested.unwrap_or_default();
        self.geocoding
            .geocode(name)
            .await?
            .ok_or_else(|| CoreError::Geocoding(format!("Unknown location: {}", name)))
    }
}

/// The date a query refers to, derived from a date entity if present.
struct QueryDate {
    label: String,
    forecast_date: Option<NaiveDate>,
}

fn query_date(request: &SkillRequest<'_>) -> QueryDate {
    let today = Local::now().date_naive();

    let Some(entity) = request.entities.get("date").and_then(|m| m.first()) else {
        return QueryDate {
            label: "today".to_string(),
            forecast_date: None,
        };
    };

    let value = &entity.value;
    let label = value
        .get("relative")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| entity.raw_value.clone());

    let date = value
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<NaiveDate>().ok());

    match date {
        Some(date) if date > today => QueryDate {
            label,
            forecast_date: Some(date),
        },
        _ => QueryDate {
            label,
            forecast_date: None,
        },
    }
}

fn wind_descriptor(speed: f64, units: &str) -> &'static str {
    // OpenWeatherMap reports m/s for metric, mph for imperial.
    let mph = if units == "metric" { speed * 2.237 } else { speed };
    match mph {
        s if s < 8.0 => "light breeze",
        s if s < 20.0 => "moderate wind",
        _ => "strong winds",
    }
}

#[async_trait]
impl SkillHandler for WeatherSkill {
    async fn handle(&self, request: SkillRequest<'_>) -> Result<SkillOutput> {
        let requested = request
            .entities
            .get("location")
            .and_then(|matches| matches.first())
            .and_then(|m| m.value.get("name"))
            .and_then(|v| v.as_str());

        let location = self.resolve_location(requested).await?;
        let when = query_date(&request);

        let display_name = location
            .city
            .clone()
            .or_else(|| requested.map(str::to_string))
            .unwrap_or_else(|| location.name.clone());

        let temp_unit = if self.units == "metric" {
            "celsius"
        } else {
            "fahrenheit"
        };

        let mut data: SkillData;

        if let Some(date) = when.forecast_date {
            let forecast = self
                .service
                .forecast(location.lat, location.lon, &self.units)
                .await?;

            let day = forecast
                .daily
                .iter()
                .find(|d| d.date == date)
                .ok_or_else(|| {
                    CoreError::Weather(format!("No forecast available for {}", date))
                })?;

            data = json!({
                "location": display_name,
                "date": when.label,
                "condition": day.condition,
                "description": day.description,
                "temperature": day.temp_max,
                "temp_min": day.temp_min,
                "temp_max": day.temp_max,
                "temp_unit": temp_unit,
                "has_precipitation": day.pop > 0.3,
                "precipitation_chance": (day.pop * 100.0).round() as i64,
                "wind": "",
                "wind_speed": Option::<f64>::None,
            })
            .as_object()
            .cloned()
            .unwrap_or_default();
        } else {
            let report = self
                .service
                .current_weather(location.lat, location.lon, &self.units)
                .await?;

            let wind = wind_descriptor(report.wind_speed, &self.units);
            data = json!({
                "location": display_name,
                "date": when.label,
                "condition": report.condition,
                "description": report.description,
                "temperature": report.temperature,
                "feels_like": report.feels_like,
                "humidity": report.humidity,
                "temp_unit": temp_unit,
                "has_precipitation": report.rain > 0.0 || report.snow > 0.0,
                "precipitation_chance": if report.rain > 0.0 || report.snow > 0.0 { 100 } else { 0 },
                "wind": wind,
                "wind_speed": report.wind_speed,
                "wind_direction": report.wind_direction,
            })
            .as_object()
            .cloned()
            .unwrap_or_default();
        }

        // Only a location the user actually named should steer template
        // selection towards the with_location variants; "here" and friends
        // resolve via IP and do not count.
        if requested.map(is_here_alias).unwrap_or(true) {
            data.insert("location_requested".to_string(), json!(false));
        }

        log::debug!(
            "Weather data for intent '{}' at {}: {:?}",
            request.intent,
            display_name,
            data.get("condition")
        );

        Ok(SkillOutput {
            data,
            action: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn here_aliases_are_recognised_in_any_case() {
        assert!(is_here_alias("here"));
        assert!(is_here_alias("Here"));
        assert!(is_here_alias("Current Location"));
        assert!(is_here_alias("your current location"));
        assert!(!is_here_alias("Seattle"));
        assert!(!is_here_alias("hereford"));
    }

    #[test]
    fn wind_descriptor_scales_with_units() {
        assert_eq!(wind_descriptor(2.0, "metric"), "light breeze");
        assert_eq!(wind_descriptor(5.0, "metric"), "moderate wind");
        assert_eq!(wind_descriptor(12.0, "metric"), "strong winds");
        assert_eq!(wind_descriptor(25.0, "imperial"), "strong winds");
        assert_eq!(wind_descriptor(5.0, "imperial"), "light breeze");
    }
}
