use async_trait::async_trait;
use parley_core::{
    ParamType, ParleyError, Result, ToolContext, ToolDeclaration, ToolHandler, ToolInvocation,
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::http_client;

pub const NAME: &str = "getCurrentWeather";

/// Current conditions from wttr.in's JSON feed.
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherTool {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            base_url: "https://wttr.in".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            NAME,
            "Get the current weather conditions for a city or location.",
        )
        .param(
            "city",
            ParamType::String,
            "The city name, province, or general location (e.g., Jakarta, Jawa Barat, London, Mount Everest).",
            true,
        )
    }

    async fn invoke(&self, inv: &ToolInvocation, _ctx: &ToolContext) -> Result<Value> {
        let city = inv
            .str_arg("city")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| tool_error("no location given; ask the user which city they mean"))?;

        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| tool_error(format!("bad weather service url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| tool_error("bad weather service url"))?
            .pop_if_empty()
            .push(city);

        debug!(city, "fetching weather");
        let resp = self
            .client
            .get(url)
            .query(&[("format", "j1")])
            .send()
            .await
            .map_err(|e| tool_error(format!("weather service unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(city, %status, "wttr.in returned an error");
            return Err(tool_error(format!(
                "could not get weather for {city}; the service may not recognise that location (HTTP {status})"
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| tool_error(format!("unreadable weather response: {e}")))?;
        summarize(city, &data)
    }
}

/// Reduce a wttr.in `j1` document to the fields the model needs.
pub fn summarize(requested: &str, data: &Value) -> Result<Value> {
    let current = data["current_condition"]
        .get(0)
        .ok_or_else(|| tool_error(format!("no current conditions available for {requested}")))?;

    let area = data["nearest_area"].get(0);
    let area_field = |key: &str| {
        area.and_then(|a| a[key][0]["value"].as_str())
            .filter(|v| !v.is_empty())
    };
    let city = area_field("areaName").unwrap_or(requested);
    let mut location = city.to_string();
    if let Some(region) = area_field("region") {
        if !region.eq_ignore_ascii_case(city) {
            location.push_str(&format!(", {region}"));
        }
    }
    if let Some(country) = area_field("country") {
        location.push_str(&format!(", {country}"));
    }

    let description = current["weatherDesc"][0]["value"]
        .as_str()
        .filter(|d| !d.is_empty())
        .or_else(|| data["weather"][0]["hourly"][0]["weatherDesc"][0]["value"].as_str())
        .unwrap_or("No description");

    let field = |key: &str| current[key].as_str().unwrap_or("?");

    Ok(json!({
        "location": location,
        "temperature": format!("{}°C", field("temp_C")),
        "feels_like": format!("{}°C", field("FeelsLikeC")),
        "description": description,
        "humidity": format!("{}%", field("humidity")),
        "wind_speed": format!("{} km/h ({})", field("windspeedKmph"), field("winddir16Point")),
        "precipitation_mm": format!("{} mm", field("precipMM")),
        "visibility_km": format!("{} km", field("visibility")),
        "pressure_mb": format!("{} mb", field("pressure")),
        "observation_time": field("observation_time"),
    }))
}

fn tool_error(reason: impl Into<String>) -> ParleyError {
    ParleyError::ToolExecution {
        tool: NAME.into(),
        reason: reason.into(),
    }
}
