use serde_json::{json, Map, Value};

use umami_core::filters::filter_schema_properties;
use umami_core::params::{
    ActiveQuery, Compare, MetricType, MetricsQuery, PageviewsQuery, StatsQuery, Unit,
    WebsitesParams,
};
use umami_core::time_range::RangeName;
use umami_core::{UmamiClient, UmamiError};

use crate::protocol::{ContentBlock, ToolCallResult, ToolDefinition};

// ---------------------------------------------------------------------------
// State passed into every tool handler
// ---------------------------------------------------------------------------

pub struct ToolState {
    pub client: UmamiClient,
}

// ---------------------------------------------------------------------------
// Tool definitions (advertised via tools/list)
// ---------------------------------------------------------------------------

pub fn all_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        get_websites_def(),
        get_stats_def(),
        get_pageviews_def(),
        get_metrics_def(),
        get_active_def(),
    ]
}

const RANGE_DESCRIPTION: &str = "Convenience range in UTC: last_24h, last_7d, last_30d, \
     this_month, last_month. Use this instead of startAt/endAt to avoid timestamp mistakes.";

fn website_id_property() -> Value {
    json!({ "type": "string", "description": "Website UUID" })
}

/// `websiteId`, time range, extra properties and every filter.
fn windowed_properties(extra: Value) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("websiteId".to_string(), website_id_property());
    props.insert(
        "startAt".to_string(),
        json!({ "type": "integer", "description": "Start timestamp in Unix milliseconds" }),
    );
    props.insert(
        "endAt".to_string(),
        json!({ "type": "integer", "description": "End timestamp in Unix milliseconds" }),
    );
    props.insert(
        "range".to_string(),
        json!({
            "type": "string",
            "enum": RangeName::names(),
            "description": RANGE_DESCRIPTION
        }),
    );
    if let Value::Object(extra) = extra {
        props.extend(extra);
    }
    props.extend(filter_schema_properties());
    props
}

fn compare_property() -> Value {
    json!({
        "type": "string",
        "enum": Compare::names(),
        "description": "Compare with previous period ('prev') or year-over-year ('yoy')"
    })
}

fn get_websites_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_websites".to_string(),
        description: "List all tracked websites in your Umami account.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "search": {
                    "type": "string",
                    "description": "Optional search text to filter websites by name or domain"
                },
                "page": {
                    "type": "integer",
                    "description": "Page number for pagination (default: 1)"
                },
                "pageSize": {
                    "type": "integer",
                    "description": "Number of results per page"
                },
                "includeTeams": {
                    "type": "boolean",
                    "description": "Include team-owned websites"
                }
            },
            "required": []
        }),
    }
}

fn get_stats_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_stats".to_string(),
        description: "Get summary statistics (pageviews, visitors, visits, bounces, totaltime) for a website over a date range. Timestamps are Unix milliseconds.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": windowed_properties(json!({ "compare": compare_property() })),
            "required": ["websiteId"]
        }),
    }
}

fn get_pageviews_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_pageviews".to_string(),
        description: "Get time-series pageview and session data for a website, bucketed by the chosen time unit.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": windowed_properties(json!({
                "unit": {
                    "type": "string",
                    "enum": Unit::names(),
                    "description": "Time bucket granularity"
                },
                "timezone": {
                    "type": "string",
                    "description": "Timezone for bucketing (e.g. 'America/New_York', 'UTC')"
                },
                "compare": compare_property()
            })),
            "required": ["websiteId", "unit", "timezone"]
        }),
    }
}

fn get_metrics_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_metrics".to_string(),
        description: "Get a breakdown of metrics by a given dimension (url, referrer, browser, os, device, country, event, etc.) for a website.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": windowed_properties(json!({
                "type": {
                    "type": "string",
                    "enum": MetricType::names(),
                    "description": "Metric dimension to break down by"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 500)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of results to skip for pagination"
                }
            })),
            "required": ["websiteId", "type"]
        }),
    }
}

fn get_active_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_active".to_string(),
        description: "Get the number of currently active visitors on a website (last 5 minutes).".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "websiteId": website_id_property()
            },
            "required": ["websiteId"]
        }),
    }
}

// ---------------------------------------------------------------------------
// Tool dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch_tool(name: &str, args: Value, state: &ToolState) -> ToolCallResult {
    let result = match name {
        "get_websites" => handle_get_websites(&args, state).await,
        "get_stats" => handle_get_stats(&args, state).await,
        "get_pageviews" => handle_get_pageviews(&args, state).await,
        "get_metrics" => handle_get_metrics(&args, state).await,
        "get_active" => handle_get_active(&args, state).await,
        unknown => return tool_error(format!("Unknown tool: {unknown}")),
    };

    match result {
        Ok(value) => json_ok(&value),
        Err(e) if e.is_upstream() => {
            tracing::warn!(tool = name, error = %e, "upstream call failed");
            tool_error(e.to_string())
        }
        Err(e) => {
            tracing::warn!(tool = name, error = %e, "tool call failed");
            tool_error(format!("Error: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tool_ok(text: String) -> ToolCallResult {
    ToolCallResult {
        content: vec![ContentBlock::Text { text }],
        is_error: None,
    }
}

fn tool_error(message: String) -> ToolCallResult {
    ToolCallResult {
        content: vec![ContentBlock::Text { text: message }],
        is_error: Some(true),
    }
}

fn json_ok<T: serde::Serialize>(value: &T) -> ToolCallResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => tool_ok(json),
        Err(e) => tool_error(format!("Serialization error: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_get_websites(args: &Value, state: &ToolState) -> Result<Value, UmamiError> {
    let params = WebsitesParams::from_args(args)?;
    state.client.get_websites(&params).await
}

async fn handle_get_stats(args: &Value, state: &ToolState) -> Result<Value, UmamiError> {
    let query = StatsQuery::from_args(args, state.client.now_ms())?;
    state.client.get_stats(&query).await
}

async fn handle_get_pageviews(args: &Value, state: &ToolState) -> Result<Value, UmamiError> {
    let query = PageviewsQuery::from_args(args, state.client.now_ms())?;
    state.client.get_pageviews(&query).await
}

async fn handle_get_metrics(args: &Value, state: &ToolState) -> Result<Value, UmamiError> {
    let query = MetricsQuery::from_args(args, state.client.now_ms())?;
    state.client.get_metrics(&query).await
}

async fn handle_get_active(args: &Value, state: &ToolState) -> Result<Value, UmamiError> {
    let query = ActiveQuery::from_args(args)?;
    state.client.get_active(&query).await
}
