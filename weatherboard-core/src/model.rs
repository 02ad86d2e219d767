use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Level name used when a score is added without one.
pub const DEFAULT_LEVEL: &str = "Default";

/// Number of rows returned by leaderboard queries when the caller has no preference.
pub const DEFAULT_LIMIT: i64 = 10;

/// Core measurement block of a weather snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: i64,
    pub pressure_hpa: i64,
}

/// One weather-condition descriptor, e.g. `Rain` / "light shower rain".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i64,
    /// Short condition code.
    pub main: String,
    pub description: String,
    pub icon: Option<String>,
}

/// Decoded current-weather snapshot for one city.
///
/// Decoding succeeds even when the measurement block or the condition list is
/// absent. Callers must check [`WeatherRecord::is_valid`] before using it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub country: Option<String>,
    pub measurements: Option<Measurements>,
    pub conditions: Vec<WeatherCondition>,
    pub wind_speed_mps: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherRecord {
    /// A record is usable only with measurements and at least one condition.
    pub fn is_valid(&self) -> bool {
        self.measurements.is_some() && !self.conditions.is_empty()
    }

    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.conditions.first()
    }

    pub fn primary_description(&self) -> &str {
        self.primary_condition()
            .map(|c| c.description.as_str())
            .unwrap_or("Unknown")
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.measurements.as_ref().map(|m| m.temperature_c)
    }
}

/// One persisted high-score row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub player_name: String,
    pub score: i64,
    pub level_name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(measurements: Option<Measurements>, conditions: Vec<WeatherCondition>) -> WeatherRecord {
        WeatherRecord {
            city: "London".into(),
            country: None,
            measurements,
            conditions,
            wind_speed_mps: None,
            observed_at: None,
        }
    }

    fn measurements() -> Measurements {
        Measurements {
            temperature_c: 12.5,
            feels_like_c: 11.0,
            humidity_pct: 80,
            pressure_hpa: 1012,
        }
    }

    fn rain() -> WeatherCondition {
        WeatherCondition {
            id: 520,
            main: "Rain".into(),
            description: "light intensity shower rain".into(),
            icon: Some("09d".into()),
        }
    }

    #[test]
    fn valid_only_with_measurements_and_condition() {
        assert!(record(Some(measurements()), vec![rain()]).is_valid());
        assert!(!record(None, vec![rain()]).is_valid());
        assert!(!record(Some(measurements()), vec![]).is_valid());
    }

    #[test]
    fn primary_description_falls_back_to_unknown() {
        let r = record(Some(measurements()), vec![]);
        assert_eq!(r.primary_description(), "Unknown");

        let r = record(Some(measurements()), vec![rain()]);
        assert_eq!(r.primary_description(), "light intensity shower rain");
        assert_eq!(r.temperature_c(), Some(12.5));
    }
}
