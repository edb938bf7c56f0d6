use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::UmamiError;

/// A filterable dimension accepted by stats, pageviews and metrics queries.
#[derive(Debug, Clone, Copy)]
pub struct FilterDef {
    pub name: &'static str,
    pub description: &'static str,
}

/// Whitelist of dimension filters, in the order they are advertised.
pub const FILTERS: &[FilterDef] = &[
    FilterDef {
        name: "path",
        description: "Filter by URL path",
    },
    FilterDef {
        name: "referrer",
        description: "Filter by referrer",
    },
    FilterDef {
        name: "title",
        description: "Filter by page title",
    },
    FilterDef {
        name: "query",
        description: "Filter by query string",
    },
    FilterDef {
        name: "browser",
        description: "Filter by browser name",
    },
    FilterDef {
        name: "os",
        description: "Filter by operating system",
    },
    FilterDef {
        name: "device",
        description: "Filter by device type (desktop, mobile, tablet)",
    },
    FilterDef {
        name: "country",
        description: "Filter by country code (e.g. US, DE)",
    },
    FilterDef {
        name: "region",
        description: "Filter by region",
    },
    FilterDef {
        name: "city",
        description: "Filter by city",
    },
    FilterDef {
        name: "hostname",
        description: "Filter by hostname",
    },
    FilterDef {
        name: "language",
        description: "Filter by language",
    },
    FilterDef {
        name: "event",
        description: "Filter by event name",
    },
    FilterDef {
        name: "tag",
        description: "Filter by tag",
    },
];

/// Filters picked from a tool call's arguments.
///
/// Only whitelisted names with a non-null value are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet(BTreeMap<&'static str, String>);

impl FilterSet {
    pub fn from_args(args: &Value) -> Result<Self, UmamiError> {
        let mut picked = BTreeMap::new();
        for def in FILTERS {
            let value = match args.get(def.name) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.clone(),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
                Some(_) => {
                    return Err(UmamiError::Validation(format!(
                        "Filter '{}' must be a string",
                        def.name
                    )))
                }
            };
            picked.insert(def.name, value);
        }
        Ok(Self(picked))
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }

    /// Append the filters as query pairs.
    pub fn extend_query(&self, query: &mut Vec<(String, String)>) {
        query.extend(self.0.iter().map(|(k, v)| (k.to_string(), v.clone())));
    }
}

/// JSON-schema `properties` entries for every filter.
pub fn filter_schema_properties() -> serde_json::Map<String, Value> {
    FILTERS
        .iter()
        .map(|def| {
            (
                def.name.to_string(),
                serde_json::json!({ "type": "string", "description": def.description }),
            )
        })
        .collect()
}
