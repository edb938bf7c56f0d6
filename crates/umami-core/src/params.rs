//! Typed parameters for each tool.
//!
//! Arguments arrive as loosely-typed JSON. Every query is parsed and
//! validated here, before any network call is made.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::UmamiError;
use crate::filters::FilterSet;
use crate::time_range::{self, TimeRange};

type Query = Vec<(String, String)>;

/// Deserialize tool arguments into `T`, mapping failures to a validation error.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, UmamiError> {
    serde_json::from_value(args.clone())
        .map_err(|e| UmamiError::Validation(format!("Invalid arguments for {tool}: {e}")))
}

/// Accept a non-negative integer given either as a JSON number or a digit string.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid = |got: &dyn std::fmt::Display| -> D::Error {
        serde::de::Error::custom(format!("expected a non-negative integer, got {got}"))
    };
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| invalid(&n)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(&format!("\"{s}\""))),
        Some(other) => Err(invalid(&other)),
    }
}

/// Treat a missing, null or empty-string value as absent.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Comparison period for stats and pageviews.
    Compare {
        Prev => "prev",
        Yoy => "yoy",
    }
);

string_enum!(
    /// Time bucket granularity for pageviews.
    Unit {
        Minute => "minute",
        Hour => "hour",
        Day => "day",
        Month => "month",
        Year => "year",
    }
);

string_enum!(
    /// Dimension a metrics query breaks down by.
    MetricType {
        Path => "path",
        Url => "url",
        Entry => "entry",
        Exit => "exit",
        Referrer => "referrer",
        Domain => "domain",
        Title => "title",
        Query => "query",
        Event => "event",
        Tag => "tag",
        Hostname => "hostname",
        Browser => "browser",
        Os => "os",
        Device => "device",
        Screen => "screen",
        Language => "language",
        Country => "country",
        Region => "region",
        City => "city",
        Channel => "channel",
    }
);

impl MetricType {
    /// The name the other Umami version uses for the same dimension.
    ///
    /// Older servers call the page dimension `url`, newer ones `path`.
    pub fn alias(self) -> Option<MetricType> {
        match self {
            MetricType::Url => Some(MetricType::Path),
            MetricType::Path => Some(MetricType::Url),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// get_websites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsitesParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub include_teams: Option<bool>,
}

impl WebsitesParams {
    pub fn from_args(args: &Value) -> Result<Self, UmamiError> {
        parse_args("get_websites", args)
    }

    pub fn query(&self) -> Query {
        let mut query = Query::new();
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            query.push(("pageSize".to_string(), page_size.to_string()));
        }
        if let Some(include_teams) = self.include_teams {
            query.push(("includeTeams".to_string(), include_teams.to_string()));
        }
        query
    }
}

// ---------------------------------------------------------------------------
// Shared window: time range + filters
// ---------------------------------------------------------------------------

/// Time range and filters shared by stats, pageviews and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub range: TimeRange,
    pub filters: FilterSet,
}

impl Window {
    pub fn from_args(args: &Value, now_ms: i64) -> Result<Self, UmamiError> {
        Ok(Self {
            range: time_range::resolve(args, now_ms)?,
            filters: FilterSet::from_args(args)?,
        })
    }

    fn base_query(&self) -> Query {
        vec![
            ("startAt".to_string(), self.range.start_ms.to_string()),
            ("endAt".to_string(), self.range.end_ms.to_string()),
        ]
    }
}

fn website_path(website_id: &Uuid, endpoint: &str) -> String {
    format!("/websites/{website_id}/{endpoint}")
}

// ---------------------------------------------------------------------------
// get_stats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsArgs {
    website_id: Uuid,
    #[serde(default, deserialize_with = "blank_as_none")]
    compare: Option<Compare>,
}

#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub website_id: Uuid,
    pub window: Window,
    pub compare: Option<Compare>,
}

impl StatsQuery {
    pub fn from_args(args: &Value, now_ms: i64) -> Result<Self, UmamiError> {
        let parsed: StatsArgs = parse_args("get_stats", args)?;
        Ok(Self {
            website_id: parsed.website_id,
            window: Window::from_args(args, now_ms)?,
            compare: parsed.compare,
        })
    }

    pub fn path(&self) -> String {
        website_path(&self.website_id, "stats")
    }

    pub fn query(&self) -> Query {
        let mut query = self.window.base_query();
        self.window.filters.extend_query(&mut query);
        if let Some(compare) = self.compare {
            query.push(("compare".to_string(), compare.to_string()));
        }
        query
    }
}

// ---------------------------------------------------------------------------
// get_pageviews
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageviewsArgs {
    website_id: Uuid,
    unit: Unit,
    timezone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    compare: Option<Compare>,
}

#[derive(Debug, Clone)]
pub struct PageviewsQuery {
    pub website_id: Uuid,
    pub window: Window,
    pub unit: Unit,
    pub timezone: String,
    pub compare: Option<Compare>,
}

impl PageviewsQuery {
    pub fn from_args(args: &Value, now_ms: i64) -> Result<Self, UmamiError> {
        let parsed: PageviewsArgs = parse_args("get_pageviews", args)?;
        if parsed.timezone.trim().is_empty() {
            return Err(UmamiError::Validation(
                "timezone must not be empty".to_string(),
            ));
        }
        Ok(Self {
            website_id: parsed.website_id,
            window: Window::from_args(args, now_ms)?,
            unit: parsed.unit,
            timezone: parsed.timezone,
            compare: parsed.compare,
        })
    }

    pub fn path(&self) -> String {
        website_path(&self.website_id, "pageviews")
    }

    pub fn query(&self) -> Query {
        let mut query = self.window.base_query();
        query.push(("unit".to_string(), self.unit.to_string()));
        query.push(("timezone".to_string(), self.timezone.clone()));
        self.window.filters.extend_query(&mut query);
        if let Some(compare) = self.compare {
            query.push(("compare".to_string(), compare.to_string()));
        }
        query
    }
}

// ---------------------------------------------------------------------------
// get_metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsArgs {
    website_id: Uuid,
    #[serde(rename = "type")]
    metric_type: MetricType,
    #[serde(default, deserialize_with = "lenient_u64")]
    limit: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    offset: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MetricsQuery {
    pub website_id: Uuid,
    pub window: Window,
    pub metric_type: MetricType,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl MetricsQuery {
    pub fn from_args(args: &Value, now_ms: i64) -> Result<Self, UmamiError> {
        let parsed: MetricsArgs = parse_args("get_metrics", args)?;
        Ok(Self {
            website_id: parsed.website_id,
            window: Window::from_args(args, now_ms)?,
            metric_type: parsed.metric_type,
            limit: parsed.limit,
            offset: parsed.offset,
        })
    }

    /// The same query with a different dimension.
    pub fn with_type(&self, metric_type: MetricType) -> Self {
        Self {
            metric_type,
            ..self.clone()
        }
    }

    pub fn path(&self) -> String {
        website_path(&self.website_id, "metrics")
    }

    pub fn query(&self) -> Query {
        let mut query = self.window.base_query();
        query.push(("type".to_string(), self.metric_type.to_string()));
        self.window.filters.extend_query(&mut query);
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset".to_string(), offset.to_string()));
        }
        query
    }
}

// ---------------------------------------------------------------------------
// get_active
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuery {
    pub website_id: Uuid,
}

impl ActiveQuery {
    pub fn from_args(args: &Value) -> Result<Self, UmamiError> {
        parse_args("get_active", args)
    }

    pub fn path(&self) -> String {
        website_path(&self.website_id, "active")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SITE: &str = "5b1d0e4a-3c2f-4e7b-9a11-0c2d3e4f5a6b";
    const NOW: i64 = 1_710_496_800_000;

    fn value_of<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn websites_forwards_only_present_fields() {
        let params = WebsitesParams::from_args(&json!({ "search": "blog", "page": 2 })).unwrap();
        let query = params.query();
        assert_eq!(query.len(), 2);
        assert_eq!(value_of(&query, "search"), Some("blog"));
        assert_eq!(value_of(&query, "page"), Some("2"));
        assert_eq!(value_of(&query, "pageSize"), None);
    }

    #[test]
    fn websites_accepts_numeric_strings_and_nulls() {
        let params = WebsitesParams::from_args(
            &json!({ "pageSize": "50", "includeTeams": true, "search": null }),
        )
        .unwrap();
        let query = params.query();
        assert_eq!(value_of(&query, "pageSize"), Some("50"));
        assert_eq!(value_of(&query, "includeTeams"), Some("true"));
        assert_eq!(value_of(&query, "search"), None);
    }

    #[test]
    fn websites_with_no_args_has_empty_query() {
        assert!(WebsitesParams::from_args(&json!({})).unwrap().query().is_empty());
    }

    #[test]
    fn websites_rejects_negative_page() {
        let err = WebsitesParams::from_args(&json!({ "page": -1 })).unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn stats_builds_path_and_query() {
        let q = StatsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_7d", "country": "DE", "compare": "prev" }),
            NOW,
        )
        .unwrap();
        assert_eq!(q.path(), format!("/websites/{SITE}/stats"));
        let query = q.query();
        assert_eq!(value_of(&query, "startAt"), Some("1709892000000"));
        assert_eq!(value_of(&query, "endAt"), Some(NOW.to_string().as_str()));
        assert_eq!(value_of(&query, "country"), Some("DE"));
        assert_eq!(value_of(&query, "compare"), Some("prev"));
    }

    #[test]
    fn stats_requires_website_id() {
        let err = StatsQuery::from_args(&json!({ "range": "last_7d" }), NOW).unwrap_err();
        assert!(err.to_string().contains("websiteId"), "{err}");
    }

    #[test]
    fn website_id_must_be_a_uuid() {
        let err = StatsQuery::from_args(
            &json!({ "websiteId": "../admin", "range": "last_7d" }),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn empty_compare_is_absent() {
        let query = StatsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_7d", "compare": "" }),
            NOW,
        )
        .unwrap();
        assert_eq!(query.compare, None);
        assert_eq!(value_of(&query.query(), "compare"), None);

        let query = PageviewsQuery::from_args(
            &json!({
                "websiteId": SITE,
                "range": "last_7d",
                "unit": "day",
                "timezone": "UTC",
                "compare": ""
            }),
            NOW,
        )
        .unwrap();
        assert_eq!(query.compare, None);
    }

    #[test]
    fn stats_rejects_unknown_compare() {
        let err = StatsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_7d", "compare": "mom" }),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn stats_propagates_time_range_errors() {
        let err = StatsQuery::from_args(&json!({ "websiteId": SITE, "startAt": 1 }), NOW)
            .unwrap_err();
        assert!(err.to_string().contains("Provide both startAt and endAt"));
    }

    #[test]
    fn pageviews_requires_unit_and_timezone() {
        let missing_unit = PageviewsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_24h", "timezone": "UTC" }),
            NOW,
        )
        .unwrap_err();
        assert!(missing_unit.to_string().contains("unit"), "{missing_unit}");

        let missing_tz = PageviewsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_24h", "unit": "hour" }),
            NOW,
        )
        .unwrap_err();
        assert!(missing_tz.to_string().contains("timezone"), "{missing_tz}");
    }

    #[test]
    fn pageviews_rejects_unknown_unit() {
        let err = PageviewsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_24h", "unit": "week", "timezone": "UTC" }),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn pageviews_query_carries_unit_and_timezone() {
        let q = PageviewsQuery::from_args(
            &json!({
                "websiteId": SITE,
                "startAt": 100,
                "endAt": 200,
                "unit": "day",
                "timezone": "Europe/Berlin"
            }),
            NOW,
        )
        .unwrap();
        let query = q.query();
        assert_eq!(q.path(), format!("/websites/{SITE}/pageviews"));
        assert_eq!(value_of(&query, "unit"), Some("day"));
        assert_eq!(value_of(&query, "timezone"), Some("Europe/Berlin"));
        assert_eq!(value_of(&query, "startAt"), Some("100"));
        assert_eq!(value_of(&query, "compare"), None);
    }

    #[test]
    fn metrics_query_carries_type_and_paging() {
        let q = MetricsQuery::from_args(
            &json!({
                "websiteId": SITE,
                "range": "last_30d",
                "type": "browser",
                "limit": 10,
                "offset": "20",
                "os": "Linux"
            }),
            NOW,
        )
        .unwrap();
        let query = q.query();
        assert_eq!(value_of(&query, "type"), Some("browser"));
        assert_eq!(value_of(&query, "limit"), Some("10"));
        assert_eq!(value_of(&query, "offset"), Some("20"));
        assert_eq!(value_of(&query, "os"), Some("Linux"));
    }

    #[test]
    fn metrics_rejects_unknown_dimension() {
        let err = MetricsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_30d", "type": "weather" }),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn metrics_with_type_swaps_only_the_dimension() {
        let q = MetricsQuery::from_args(
            &json!({ "websiteId": SITE, "range": "last_30d", "type": "url", "limit": 5 }),
            NOW,
        )
        .unwrap();
        let swapped = q.with_type(MetricType::Path);
        assert_eq!(value_of(&swapped.query(), "type"), Some("path"));
        assert_eq!(swapped.limit, Some(5));
        assert_eq!(swapped.window, q.window);
    }

    #[test]
    fn metric_type_aliases() {
        assert_eq!(MetricType::Url.alias(), Some(MetricType::Path));
        assert_eq!(MetricType::Path.alias(), Some(MetricType::Url));
        assert_eq!(MetricType::Country.alias(), None);
        assert_eq!(MetricType::ALL.len(), 20);
    }

    #[test]
    fn active_builds_path() {
        let q = ActiveQuery::from_args(&json!({ "websiteId": SITE })).unwrap();
        assert_eq!(q.path(), format!("/websites/{SITE}/active"));
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = ActiveQuery::from_args(&json!("oops")).unwrap_err();
        assert!(err.to_string().contains("Invalid arguments for get_active"));
    }
}
