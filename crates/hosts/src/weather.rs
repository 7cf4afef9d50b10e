//! Weather host backed by the OpenWeatherMap 2.5 API.

use std::sync::Arc;

use chrono::DateTime;
use mcp::{Arguments, Param, ParamKind, ToolDescriptor, ToolError, ToolRegistry};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::http;
use crate::settings::Settings;

/// Days covered by `get_forecast`.
const FORECAST_DAYS: usize = 5;

pub fn registry(settings: &Settings) -> Result<ToolRegistry> {
    let api = Arc::new(WeatherApi::new(settings)?);
    let mut registry = ToolRegistry::new().with_call_timeout(settings.call_timeout);

    registry.register(
        coordinates("get_forecast", "Get 5-day weather forecast for a location."),
        crate::bind(&api, WeatherApi::forecast),
    )?;
    registry.register(
        coordinates(
            "get_current_conditions",
            "Get current weather conditions for a location.",
        ),
        crate::bind(&api, WeatherApi::current_conditions),
    )?;
    registry.register(
        ToolDescriptor::new("get_weather_by_city", "Get current weather for a city by name.")
            .param(
                Param::required("city", ParamKind::String)
                    .describe("City name (e.g., \"London\", \"New York\")"),
            )
            .param(
                Param::optional("country_code", ParamKind::String)
                    .describe("Optional ISO 3166 country code (e.g., \"GB\", \"US\")"),
            ),
        crate::bind(&api, WeatherApi::by_city),
    )?;
    Ok(registry)
}

fn coordinates(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, description)
        .param(Param::required("latitude", ParamKind::Number).describe("Latitude of the location"))
        .param(
            Param::required("longitude", ParamKind::Number).describe("Longitude of the location"),
        )
}

struct WeatherApi {
    http: Client,
    base: Url,
    api_key: String,
}

impl WeatherApi {
    fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .openweathermap_api_key
            .clone()
            .ok_or(Error::MissingCredential("OPENWEATHERMAP_API_KEY"))?;
        Ok(Self {
            http: http::client(settings.http_timeout)?,
            base: http::base_url(&settings.openweathermap_api_base)?,
            api_key,
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<T, ToolError> {
        query.push(("appid", self.api_key.clone()));
        query.push(("units", "metric".to_string()));
        let url = http::with_query(http::endpoint(&self.base, &[path]), &query);
        http::get_json(&self.http, url).await
    }

    async fn forecast(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let query = vec![
            ("lat", args.f64("latitude")?.to_string()),
            ("lon", args.f64("longitude")?.to_string()),
        ];
        let forecast: Forecast = self.fetch("forecast", query).await?;
        Ok(forecast.render())
    }

    async fn current_conditions(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let query = vec![
            ("lat", args.f64("latitude")?.to_string()),
            ("lon", args.f64("longitude")?.to_string()),
        ];
        let current: Current = self.fetch("weather", query).await?;
        Ok(current.render_conditions())
    }

    async fn by_city(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let city = args.str("city")?.trim();
        if city.is_empty() {
            return Err(ToolError::invalid("city", "must not be empty"));
        }
        let q = match args.opt_str("country_code").map(str::trim) {
            Some(code) if !code.is_empty() => format!("{city},{code}"),
            _ => city.to_string(),
        };
        let current: Current = self.fetch("weather", vec![("q", q)]).await?;
        Ok(current.render_city(city))
    }
}

// --- Upstream shapes ---

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    city: Option<City>,
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct City {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: String,
    main: Readings,
    #[serde(default)]
    weather: Vec<Condition>,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct Readings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    #[serde(default)]
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Current {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    weather: Vec<Condition>,
    main: Readings,
    wind: Wind,
    #[serde(default)]
    clouds: Option<Clouds>,
    #[serde(default)]
    sys: Option<Sys>,
    #[serde(default)]
    coord: Option<Coord>,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct Sys {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Coord {
    lat: f64,
    lon: f64,
}

fn describe(conditions: &[Condition]) -> String {
    match conditions.first() {
        Some(c) => format!("{} - {}", c.main, c.description),
        None => "Unknown".to_string(),
    }
}

fn or_na(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn clock(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map_or_else(|| "N/A".to_string(), |t| t.format("%H:%M UTC").to_string())
}

impl Forecast {
    /// One entry per day, preferring the midday reading.
    fn days(&self) -> Vec<&ForecastEntry> {
        let mut days: Vec<(&str, &ForecastEntry)> = Vec::new();
        for entry in &self.list {
            let (date, time) = entry.dt_txt.split_once(' ').unwrap_or((entry.dt_txt.as_str(), ""));
            match days.iter().position(|(d, _)| *d == date) {
                Some(i) if time == "12:00:00" => days[i].1 = entry,
                Some(_) => {}
                None if days.len() < FORECAST_DAYS => days.push((date, entry)),
                None => break,
            }
        }
        days.into_iter().map(|(_, entry)| entry).collect()
    }

    fn render(&self) -> String {
        let city = self
            .city
            .as_ref()
            .map_or("Unknown location", |c| c.name.as_str());
        let days = self.days();
        if days.is_empty() {
            return format!("No forecast data available for {city}.");
        }

        let mut blocks = vec![format!("5-Day Forecast for {city}:")];
        blocks.extend(days.into_iter().map(|entry| {
            format!(
                "Date: {}\nTemperature: {}°C (feels like {}°C)\nWeather: {}\nHumidity: {}%\nWind: {} m/s",
                entry.dt_txt,
                entry.main.temp,
                entry.main.feels_like,
                describe(&entry.weather),
                entry.main.humidity,
                entry.wind.speed,
            )
        }));
        blocks.join("\n---\n")
    }
}

impl Current {
    fn render_conditions(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Unknown location");
        let sys = self.sys.as_ref();
        format!(
            "Current Weather in {name}:\n\
             Temperature: {}°C (feels like {}°C)\n\
             Weather: {}\n\
             Humidity: {}%\n\
             Pressure: {} hPa\n\
             Wind Speed: {} m/s\n\
             Wind Direction: {}°\n\
             Cloudiness: {}%\n\
             Sunrise: {}\n\
             Sunset: {}",
            self.main.temp,
            self.main.feels_like,
            describe(&self.weather),
            self.main.humidity,
            or_na(self.main.pressure),
            self.wind.speed,
            or_na(self.wind.deg),
            or_na(self.clouds.as_ref().map(|c| c.all)),
            clock(sys.and_then(|s| s.sunrise)),
            clock(sys.and_then(|s| s.sunset)),
        )
    }

    fn render_city(&self, city: &str) -> String {
        let name = self.name.as_deref().unwrap_or(city);
        let country = self
            .sys
            .as_ref()
            .and_then(|s| s.country.as_deref())
            .unwrap_or("");
        let coordinates = self.coord.as_ref().map_or_else(
            || "N/A".to_string(),
            |c| format!("lat={}, lon={}", c.lat, c.lon),
        );
        format!(
            "Current Weather in {name}, {country}:\n\
             Temperature: {}°C (feels like {}°C)\n\
             Weather: {}\n\
             Humidity: {}%\n\
             Pressure: {} hPa\n\
             Wind Speed: {} m/s\n\
             Coordinates: {coordinates}",
            self.main.temp,
            self.main.feels_like,
            describe(&self.weather),
            self.main.humidity,
            or_na(self.main.pressure),
            self.wind.speed,
        )
    }
}
