use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::model::{Measurements, WeatherCondition, WeatherRecord};

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: i64,
    pressure: i64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: i64,
    main: String,
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    dt: Option<i64>,
    main: Option<OwMain>,
    weather: Option<Vec<OwWeather>>,
    wind: Option<OwWind>,
    sys: Option<OwSys>,
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

/// Decode a current-weather payload.
///
/// Missing `main`/`weather` blocks are not a decode error; they produce an
/// invalid record.
pub(crate) fn decode_current(body: &str) -> Result<WeatherRecord, serde_json::Error> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let measurements = parsed.main.map(|m| Measurements {
        temperature_c: m.temp,
        feels_like_c: m.feels_like,
        humidity_pct: m.humidity,
        pressure_hpa: m.pressure,
    });

    let conditions = parsed
        .weather
        .unwrap_or_default()
        .into_iter()
        .map(|w| WeatherCondition {
            id: w.id,
            main: w.main,
            description: w.description,
            icon: w.icon,
        })
        .collect();

    Ok(WeatherRecord {
        city: parsed.name,
        country: parsed.sys.and_then(|s| s.country),
        measurements,
        conditions,
        wind_speed_mps: parsed.wind.map(|w| w.speed),
        observed_at: parsed.dt.and_then(unix_to_utc),
    })
}

/// Message for a non-2xx response: the provider's `message` field, the raw body, or the reason phrase.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    if let Ok(OwErrorBody { message: Some(message) }) = serde_json::from_str::<OwErrorBody>(body) {
        if !message.trim().is_empty() {
            return message;
        }
    }

    if !body.trim().is_empty() {
        return truncate_body(body.trim());
    }

    reason_phrase(status)
}

pub(crate) fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status")
        .to_string()
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
