//! Weather backends behind one tagged type: the OpenWeatherMap API and a
//! mock that fabricates plausible reports for keyless deployments and
//! tests.

use chrono::{Duration, Local, NaiveDate};
use rand::Rng;
use serde_json::Value;

use crate::config::WeatherConfig;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub feels_like: f64,
    pub pressure: i64,
    pub humidity: i64,
    /// Coarse condition, e.g. "Clear", "Rain".
    pub condition: String,
    /// Human description, e.g. "light rain".
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: i64,
    pub clouds: i64,
    pub rain: f64,
    pub snow: f64,
    pub units: String,
}

#[derive(Debug, Clone)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub condition: String,
    pub description: String,
    /// Probability of precipitation in `[0, 1]`.
    pub pop: f64,
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub daily: Vec<DailyForecast>,
    pub units: String,
}

pub enum WeatherBackend {
    OpenWeatherMap(OpenWeatherMapService),
    Mock(MockWeatherService),
}

impl WeatherBackend {
    pub fn from_config(config: &WeatherConfig) -> Self {
        match config.implementation.as_str() {
            "openweathermap" if !config.api_key.is_empty() => {
                WeatherBackend::OpenWeatherMap(OpenWeatherMapService::new(config))
            }
            "mock" => WeatherBackend::Mock(MockWeatherService),
            other => {
                if other == "openweathermap" {
                    log::warn!("No weather API key configured, using mock weather data");
                } else {
                    log::warn!("Unknown weather implementation '{}', using mock", other);
                }
                WeatherBackend::Mock(MockWeatherService)
            }
        }
    }

    pub async fn current_weather(&self, lat: f64, lon: f64, units: &str) -> Result<CurrentWeather> {
        match self {
            WeatherBackend::OpenWeatherMap(s) => s.current_weather(lat, lon, units).await,
            WeatherBackend::Mock(s) => Ok(s.current_weather(units)),
        }
    }

    pub async fn forecast(&self, lat: f64, lon: f64, units: &str) -> Result<Forecast> {
        match self {
            WeatherBackend::OpenWeatherMap(s) => s.forecast(lat, lon, units).await,
            WeatherBackend::Mock(s) => Ok(s.forecast(units)),
        }
    }
}

pub struct OpenWeatherMapService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMapService {
    pub fn new(config: &WeatherConfig) -> Self {
        OpenWeatherMapService {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn fetch(&self, endpoint: &str, lat: f64, lon: f64, units: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", units.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Weather(format!(
                "OpenWeatherMap API error: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    pub async fn current_weather(&self, lat: f64, lon: f64, units: &str) -> Result<CurrentWeather> {
        let data = self.fetch("weather", lat, lon, units).await?;

        Ok(CurrentWeather {
            temperature: data["main"]["temp"].as_f64().unwrap_or(0.0),
            feels_like: data["main"]["feels_like"].as_f64().unwrap_or(0.0),
            pressure: data["main"]["pressure"].as_i64().unwrap_or(0),
            humidity: data["main"]["humidity"].as_i64().unwrap_or(0),
            condition: data["weather"][0]["main"]
                .as_str()
                .unwrap_or("Unknown")
                .to_string(),
            description: data["weather"][0]["description"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            wind_speed: data["wind"]["speed"].as_f64().unwrap_or(0.0),
            wind_direction: data["wind"]["deg"].as_i64().unwrap_or(0),
            clouds: data["clouds"]["all"].as_i64().unwrap_or(0),
            rain: data["rain"]["1h"].as_f64().unwrap_or(0.0),
            snow: data["snow"]["1h"].as_f64().unwrap_or(0.0),
            units: units.to_string(),
        })
    }

    /// The free forecast endpoint returns 3-hourly entries; aggregate them
    /// into daily min/max and the worst precipitation probability.
    pub async fn forecast(&self, lat: f64, lon: f64, units: &str) -> Result<Forecast> {
        let data = self.fetch("forecast", lat, lon, units).await?;

        let mut daily: Vec<DailyForecast> = Vec::new();

        for item in data["list"].as_array().into_iter().flatten() {
            let Some(date) = item["dt_txt"]
                .as_str()
                .and_then(|s| s.split(' ').next())
                .and_then(|d| d.parse::<NaiveDate>().ok())
            else {
                continue;
            };

            let temp_min = item["main"]["temp_min"].as_f64().unwrap_or(0.0);
            let temp_max = item["main"]["temp_max"].as_f64().unwrap_or(0.0);
            let pop = item["pop"].as_f64().unwrap_or(0.0);

            match daily.iter_mut().find(|d| d.date == date) {
                Some(day) => {
                    day.temp_min = day.temp_min.min(temp_min);
                    day.temp_max = day.temp_max.max(temp_max);
                    day.pop = day.pop.max(pop);
                }
                None => daily.push(DailyForecast {
                    date,
                    temp_min,
                    temp_max,
                    condition: item["weather"][0]["main"]
                        .as_str()
                        .unwrap_or("Unknown")
                        .to_string(),
                    description: item["weather"][0]["description"]
                        .as_str()
                        .unwrap_or("unknown")
                        .to_string(),
                    pop,
                }),
            }
        }

        Ok(Forecast {
            daily,
            units: units.to_string(),
        })
    }
}

pub struct MockWeatherService;

impl MockWeatherService {
    fn random_condition(rng: &mut impl Rng) -> (&'static str, &'static str) {
        const CONDITIONS: &[(&str, &str)] = &[
            ("Clear", "clear sky"),
            ("Clouds", "scattered clouds"),
            ("Clouds", "overcast clouds"),
            ("Rain", "light rain"),
            ("Rain", "moderate rain"),
            ("Drizzle", "light intensity drizzle"),
            ("Thunderstorm", "thunderstorm"),
            ("Snow", "light snow"),
            ("Mist", "mist"),
        ];
        CONDITIONS[rng.gen_range(0..CONDITIONS.len())]
    }

    pub fn current_weather(&self, units: &str) -> CurrentWeather {
        let mut rng = rand::thread_rng();

        let temperature = if units == "metric" {
            rng.gen_range(10.0..30.0)
        } else {
            rng.gen_range(50.0..86.0)
        };
        let (condition, description) = Self::random_condition(&mut rng);

        CurrentWeather {
            temperature: round1(temperature),
            feels_like: round1(temperature + rng.gen_range(-2.0..2.0)),
            pressure: rng.gen_range(990..1030),
            humidity: rng.gen_range(30..95),
            condition: condition.to_string(),
            description: description.to_string(),
            wind_speed: round1(rng.gen_range(0.0..15.0)),
            wind_direction: rng.gen_range(0..360),
            clouds: rng.gen_range(0..100),
            rain: if condition == "Rain" {
                round1(rng.gen_range(0.0..5.0))
            } else {
                0.0
            },
            snow: if condition == "Snow" {
                round1(rng.gen_range(0.0..5.0))
            } else {
                0.0
            },
            units: units.to_string(),
        }
    }

    pub fn forecast(&self, units: &str) -> Forecast {
        let mut rng = rand::thread_rng();
        let today = Local::now().date_naive();

        let daily = (0..7)
            .map(|offset| {
                let (temp_min, temp_max) = if units == "metric" {
                    (rng.gen_range(10.0..18.0), rng.gen_range(20.0..30.0))
                } else {
                    (rng.gen_range(50.0..65.0), rng.gen_range(68.0..86.0))
                };
                let (condition, description) = Self::random_condition(&mut rng);

                DailyForecast {
                    date: today + Duration::days(offset),
                    temp_min: round1(temp_min),
                    temp_max: round1(temp_max),
                    condition: condition.to_string(),
                    description: description.to_string(),
                    pop: rng.gen_range(0.0..1.0),
                }
            })
            .collect();

        Forecast {
            daily,
            units: units.to_string(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
