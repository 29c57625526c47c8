use crate::tools::{
    get_object_param, get_string_param, ParameterSchema, ParameterType, ToolContext,
    ToolDeclaration, ToolError, ToolHandler, ToolResult,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const FETCH_WEATHER: &str = "fetchWeather";

const DEFAULT_LATENCY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
}

/// Canned weather lookup. Stands in for a real weather API, including the
/// network latency.
pub struct FetchWeatherTool {
    latency: Duration,
}

impl FetchWeatherTool {
    pub fn new() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    fn extract(params: &Value) -> Result<(Location, NaiveDate), ToolError> {
        let invalid = |reason: &str| ToolError::validation(FETCH_WEATHER, reason);

        let location = get_object_param(params, "location")
            .ok_or_else(|| invalid("location is required"))?;
        let location: Location = serde_json::from_value(location.clone())
            .map_err(|e| invalid(&format!("location: {}", e)))?;

        let date = get_string_param(params, "date").ok_or_else(|| invalid("date is required"))?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|_| invalid(&format!("date must be YYYY-MM-DD, got {:?}", date)))?;

        Ok((location, date))
    }

    pub async fn fetch_weather(&self, location: &Location, date: NaiveDate) -> Value {
        tracing::debug!(city = %location.city, state = %location.state, %date, "fetching weather");
        tokio::time::sleep(self.latency).await;

        serde_json::json!({
            "temperature": 38,
            "chancePrecipitation": "56%",
            "cloudConditions": "partlyCloudy"
        })
    }
}

impl Default for FetchWeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for FetchWeatherTool {
    fn definition(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            FETCH_WEATHER,
            "Get the weather conditions for a specific city on a specific date.",
        )
        .with_parameter(ParameterSchema::required(
            "location",
            "The name of the city and its state for which to get the weather. Only cities in the USA are supported.",
            ParameterType::Object(vec![
                ParameterSchema::required("city", "The city of the location.", ParameterType::String),
                ParameterSchema::required("state", "The US state of the location.", ParameterType::String),
            ]),
        ))
        .with_parameter(ParameterSchema::required(
            "date",
            "The date for which to get the weather. Date must be in the format: YYYY-MM-DD.",
            ParameterType::String,
        ))
    }

    fn progress_hint(&self) -> String {
        "Tool: Fetching weather...".to_string()
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled(ctx.tool_name.clone()));
        }
        let (location, date) = Self::extract(&params)?;
        tracing::debug!(conversation = %ctx.conversation_id, tool = %ctx.tool_name, "running tool");

        let output = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled(ctx.tool_name.clone())),
            output = self.fetch_weather(&location, date) => output,
        };

        Ok(ToolResult::new(
            format!("Weather: {}, {} on {}", location.city, location.state, date),
            output,
        ))
    }
}
