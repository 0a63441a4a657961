//! Clock tools: `get_only_time` and `get_full_time`.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};

/// Local wall-clock time as `HH:MM:SS`.
pub struct GetOnlyTimeTool;

#[async_trait]
impl Tool for GetOnlyTimeTool {
    fn name(&self) -> &str {
        "get_only_time"
    }

    fn description(&self) -> &str {
        "Return the current local time on the server as HH:MM:SS."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: Option<&ToolContext>,
    ) -> Result<Value, ToolError> {
        Ok(serde_json::json!({ "time": Local::now().format("%H:%M:%S").to_string() }))
    }
}

/// Full local date and time breakdown.
pub struct GetFullTimeTool;

#[async_trait]
impl Tool for GetFullTimeTool {
    fn name(&self) -> &str {
        "get_full_time"
    }

    fn description(&self) -> &str {
        "Return the current local date and time: year, month, day, hour, minute, \
         second, millisecond, day of week, ISO timestamp and UTC offset."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: Option<&ToolContext>,
    ) -> Result<Value, ToolError> {
        Ok(breakdown(&Local::now()))
    }
}

fn breakdown<Tz: TimeZone>(now: &DateTime<Tz>) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    serde_json::json!({
        "year": now.year(),
        "month": now.month(),
        "day": now.day(),
        "hour": now.hour(),
        "minute": now.minute(),
        "seconds": now.second(),
        "milliSeconds": now.timestamp_subsec_millis(),
        "dayOfWeek": now.weekday().to_string(),
        "dateTime": now.to_rfc3339(),
        "utcOffset": now.offset().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[tokio::test]
    async fn only_time_format() {
        let result = GetOnlyTimeTool.execute(Map::new(), None).await.unwrap();
        let time = result["time"].as_str().unwrap();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
    }

    #[test]
    fn full_breakdown_fields() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let at = tz.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let value = breakdown(&at);

        assert_eq!(value["year"], 2024);
        assert_eq!(value["month"], 3);
        assert_eq!(value["day"], 9);
        assert_eq!(value["hour"], 14);
        assert_eq!(value["minute"], 5);
        assert_eq!(value["seconds"], 7);
        assert_eq!(value["dayOfWeek"], "Sat");
        assert_eq!(value["utcOffset"], "+03:00");
        assert!(value["dateTime"].as_str().unwrap().starts_with("2024-03-09T14:05:07"));
    }

    #[tokio::test]
    async fn full_time_runs() {
        let result = GetFullTimeTool.execute(Map::new(), None).await.unwrap();
        assert!(result["year"].as_i64().unwrap() >= 2024);
    }
}
