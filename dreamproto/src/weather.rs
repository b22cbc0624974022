//! Weather information relayed from the observatory to DREAM
//!
//! Weather is sent one way, control system to instrument, as the parameters of
//! the setWeatherInfo command.

use serde::{Deserialize, Serialize};

use crate::error::{DreamError, DreamResult};

const HUMIDITY_MAX: f64 = 100.0;
const WIND_DIRECTION_MAX: f64 = 360.0;
const CLOUDCOVER_MAX: f64 = 100.0;

/// Latest weather conditions at the observatory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeatherInfo {
    /// Air temperature (ºC)
    pub temperature: f64,
    /// Relative humidity (0 - 100 %)
    pub humidity: f64,
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Wind direction (0 - 360º azimuth)
    pub wind_direction: f64,
    /// Air pressure (Pa)
    pub pressure: f64,
    /// Rain (>= 0 mm)
    pub rain: f64,
    /// Cloud cover (0 - 100 %)
    pub cloudcover: f64,
    /// Whether the observatory considers it safe to observe
    pub safe_observing_conditions: bool,
}

impl WeatherInfo {
    /// Check every field against its physical range
    pub fn validate(&self) -> DreamResult<()> {
        check_finite("temperature", self.temperature)?;
        check_range("humidity", self.humidity, 0.0, HUMIDITY_MAX)?;
        check_range("wind_speed", self.wind_speed, 0.0, f64::MAX)?;
        check_range("wind_direction", self.wind_direction, 0.0, WIND_DIRECTION_MAX)?;
        check_finite("pressure", self.pressure)?;
        if self.pressure <= 0.0 {
            return Err(DreamError::validation(format!(
                "pressure {} must be positive",
                self.pressure
            )));
        }
        check_range("rain", self.rain, 0.0, f64::MAX)?;
        check_range("cloudcover", self.cloudcover, 0.0, CLOUDCOVER_MAX)?;
        Ok(())
    }

    /// Conservative weather to report when no source is available
    pub fn unsafe_default() -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
            pressure: 101_325.0,
            rain: 0.0,
            cloudcover: 100.0,
            safe_observing_conditions: false,
        }
    }
}

fn check_finite(name: &str, value: f64) -> DreamResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DreamError::validation(format!("{} is not a finite number", name)))
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> DreamResult<()> {
    check_finite(name, value)?;
    if value < min || value > max {
        return Err(DreamError::validation(format!(
            "{} {} out of range [{}, {}]",
            name, value, min, max
        )));
    }
    Ok(())
}
