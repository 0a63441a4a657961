//! `get_weather`: current conditions for a city.
//!
//! Offline implementation: returns deterministic mock data derived from the
//! city name, so exchanges can be exercised end-to-end without network
//! access or an API token.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};

pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather in a city: temperature, conditions, humidity and wind."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city to get the weather for"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: Option<&ToolContext>,
    ) -> Result<Value, ToolError> {
        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'city' argument".into()))?;

        serde_json::to_value(mock_weather(city)).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[derive(serde::Serialize)]
struct WeatherData {
    city: String,
    temperature_c: f64,
    feels_like_c: f64,
    conditions: String,
    humidity: u32,
    wind_speed_ms: f64,
    wind_direction: String,
}

/// Deterministic mock weather keyed on the (case-insensitive) city name.
fn mock_weather(city: &str) -> WeatherData {
    let hash: u32 = city
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let conditions_list = [
        "Clear skies",
        "Partly cloudy",
        "Overcast",
        "Light rain",
        "Heavy rain",
        "Thunderstorms",
        "Snow",
        "Foggy",
    ];

    let wind_dirs = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let temperature = ((hash % 40) as f64) - 5.0; // -5 to 34°C
    let wind_speed = ((hash % 15) as f64) + 1.0;

    WeatherData {
        city: city.to_string(),
        temperature_c: temperature,
        feels_like_c: temperature - (wind_speed / 3.0).round(),
        conditions: conditions_list[(hash as usize / 7) % conditions_list.len()].to_string(),
        humidity: 30 + (hash % 60),
        wind_speed_ms: wind_speed,
        wind_direction: wind_dirs[(hash as usize / 3) % wind_dirs.len()].to_string(),
    }
}
